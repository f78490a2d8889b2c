//! Built-in rule tables.
//!
//! Each table is plain data; [`super::CommandValidator::new`] compiles every
//! entry once and rejects the validator if any entry fails.

use super::{ConfirmationLevel, WhitelistEntry};

/// A named critical pattern.
pub(crate) struct CriticalRule {
    pub(crate) name: &'static str,
    pub(crate) pattern: &'static str,
}

/// Patterns that block a command regardless of whitelist membership.
///
/// Matched against the raw command string.
pub(crate) const CRITICAL_PATTERNS: &[CriticalRule] = &[
    CriticalRule {
        name: "recursive delete of root or home",
        pattern: r"\brm\s+(?:-[-\w]*\s+)*(?:/|/\*|~|~/|\$HOME)(?:\s|;|&|\||$)",
    },
    CriticalRule {
        name: "fork bomb",
        pattern: r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
    },
    CriticalRule {
        name: "raw disk overwrite",
        pattern: r"\bdd\b.*\bof=/dev/(?:sd|hd|vd|nvme|disk|mmcblk)",
    },
    CriticalRule {
        name: "filesystem format",
        pattern: r"\b(?:mkfs(?:\.\w+)?|mke2fs|wipefs)\b",
    },
    CriticalRule {
        name: "redirect onto block device",
        pattern: r">\s*/dev/(?:sd|hd|vd|nvme|disk|mmcblk)",
    },
    CriticalRule {
        name: "world-writable root",
        pattern: r"\bchmod\s+(?:-[-\w]*\s+)*0?777\s+/(?:\s|$)",
    },
    CriticalRule {
        name: "ownership change of root",
        pattern: r"\bchown\s+(?:-[-\w]*\s+)*\S+\s+/(?:\s|$)",
    },
    CriticalRule {
        name: "remote script piped to shell",
        pattern: r"\b(?:curl|wget)\b[^|]*\|\s*(?:sudo\s+)?(?:ba|z|da|k)?sh\b",
    },
    CriticalRule {
        name: "power state change",
        pattern: r"(?:^|[;&|]\s*)(?:sudo\s+)?(?:shutdown|reboot|halt|poweroff)\b",
    },
    CriticalRule {
        name: "kill every process",
        pattern: r"\bkill\s+-(?:9|KILL|SIGKILL)\s+-1\b",
    },
    CriticalRule {
        name: "overwrite of account database",
        pattern: r">\s*/etc/(?:passwd|shadow|sudoers)\b",
    },
];

/// Paths no command may touch.
pub(crate) const BLOCKED_PATHS: &[&str] = &[
    "/etc/shadow",
    "/etc/gshadow",
    "/etc/sudoers",
    "/etc/sudoers.d",
    "/etc/sudoers.d/**",
    "/boot",
    "/boot/**",
    "/sys",
    "/sys/**",
    "/proc",
    "/proc/**",
    "/dev/sd*",
    "/dev/nvme*",
    "/dev/mem",
    "/dev/kmem",
    "**/.ssh",
    "**/.ssh/**",
    "**/.gnupg",
    "**/.gnupg/**",
    "**/.aws/credentials",
];

fn entry(command: &str, level: ConfirmationLevel, description: &str) -> WhitelistEntry {
    WhitelistEntry {
        command: command.to_string(),
        allowed_args: Vec::new(),
        blocked_args: Vec::new(),
        confirmation_level: level,
        description: Some(description.to_string()),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// The built-in command whitelist.
#[must_use]
pub fn default_whitelist() -> Vec<WhitelistEntry> {
    use ConfirmationLevel::{HighRisk, LowRisk, MediumRisk, None};

    let mut ls = entry("ls", LowRisk, "List directory contents");
    ls.allowed_args = strings(&["-l", "-a", "-la", "-al", "-h", "-R", "-1", "-t", "-S", "--color"]);

    let mut find = entry("find", LowRisk, "Search for files");
    find.blocked_args = strings(&["-delete", "-exec", "-execdir", "-ok"]);

    let mut git = entry("git", LowRisk, "Version control");
    git.blocked_args = strings(&["push --force", "push -f", "reset --hard", "clean -fd", "clean -f -d"]);

    let mut rm = entry("rm", HighRisk, "Remove files");
    rm.blocked_args = strings(&["--no-preserve-root"]);

    vec![
        ls,
        entry("cat", LowRisk, "Print file contents"),
        entry("head", LowRisk, "Print the start of a file"),
        entry("tail", LowRisk, "Print the end of a file"),
        entry("grep", LowRisk, "Search file contents"),
        find,
        entry("ps", LowRisk, "List processes"),
        entry("du", LowRisk, "Disk usage"),
        entry("df", LowRisk, "Free disk space"),
        entry("env", LowRisk, "Print the environment"),
        entry("diff", LowRisk, "Compare files"),
        entry("pwd", None, "Print working directory"),
        entry("echo", None, "Print text"),
        entry("wc", None, "Count lines and words"),
        entry("which", None, "Locate a command"),
        entry("date", None, "Print the date"),
        entry("whoami", None, "Print the user name"),
        entry("sort", None, "Sort lines"),
        entry("uniq", None, "Filter repeated lines"),
        git,
        entry("cargo", LowRisk, "Rust build tool"),
        entry("mkdir", LowRisk, "Create directories"),
        entry("touch", LowRisk, "Create or touch files"),
        entry("npm", MediumRisk, "Node package manager"),
        entry("node", MediumRisk, "Run JavaScript"),
        entry("python", MediumRisk, "Run Python"),
        entry("python3", MediumRisk, "Run Python"),
        entry("cp", MediumRisk, "Copy files"),
        entry("mv", MediumRisk, "Move files"),
        entry("tar", MediumRisk, "Archive files"),
        entry("curl", MediumRisk, "Transfer a URL"),
        rm,
    ]
}
