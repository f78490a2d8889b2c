//! Configuration types for Warden.
//!
//! All types in this module are self-contained with no dependencies on other
//! internal warden crates. Enumerated values (decisions, durations, risks,
//! scopes) are kept as strings here, checked by [`crate::validate`], and
//! converted into domain types at the CLI boundary. Every struct implements
//! [`Default`] so that a bare `[section]` header produces a working config.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Decision policy.
    pub policy: PolicySection,
    /// Shell command validator rules.
    pub validator: ValidatorSection,
    /// Per-session command rate limiting.
    pub rate_limit: RateLimitSection,
    /// Grant and audit file locations.
    pub storage: StorageSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// PolicySection
// ---------------------------------------------------------------------------

/// Policy thresholds applied by the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySection {
    /// `"deny"` or `"prompt"` for operations no rule decides.
    pub default_decision: String,
    /// Automatically allow operations whose risk is `safe`.
    pub auto_approve_safe: bool,
    /// Duration stamped on automatic grants.
    pub max_auto_approve_duration: String,
    /// Scopes that always go to a human.
    pub always_prompt_scopes: Vec<String>,
    /// Risk levels that always go to a human.
    pub always_prompt_risks: Vec<String>,
    /// Scopes that are never allowed.
    pub blocked_scopes: Vec<String>,
    /// How long a pending approval waits before resolving on its own.
    pub approval_timeout_ms: u64,
    /// `"deny"` or `"allow"` when an approval times out.
    pub timeout_decision: String,
    /// Match grants on caller context as well as scope, action, and resource.
    pub enable_contextual_permissions: bool,
    /// Upper bound on cached grants.
    pub max_cached_permissions: usize,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            default_decision: "prompt".to_owned(),
            auto_approve_safe: true,
            max_auto_approve_duration: "session".to_owned(),
            always_prompt_scopes: Vec::new(),
            always_prompt_risks: vec!["high".to_owned(), "critical".to_owned()],
            blocked_scopes: Vec::new(),
            approval_timeout_ms: 60_000,
            timeout_decision: "deny".to_owned(),
            enable_contextual_permissions: true,
            max_cached_permissions: 1000,
        }
    }
}

// ---------------------------------------------------------------------------
// ValidatorSection
// ---------------------------------------------------------------------------

/// Command validator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorSection {
    /// Only whitelisted commands may run.
    pub strict_mode: bool,
    /// Longest accepted command string, in bytes.
    pub max_command_length: usize,
    /// Additional critical regexes appended to the built-in set.
    pub extra_blocked_patterns: Vec<String>,
    /// Glob patterns for paths that may never be touched. Empty means the
    /// built-in list.
    pub blocked_paths: Vec<String>,
    /// If non-empty, working directories must live under one of these.
    pub allowed_working_dirs: Vec<String>,
    /// Whitelisted commands. Empty means the built-in whitelist.
    pub whitelist: Vec<WhitelistEntryConfig>,
}

impl Default for ValidatorSection {
    fn default() -> Self {
        Self {
            strict_mode: true,
            max_command_length: 4096,
            extra_blocked_patterns: Vec::new(),
            blocked_paths: Vec::new(),
            allowed_working_dirs: Vec::new(),
            whitelist: Vec::new(),
        }
    }
}

/// One `[[validator.whitelist]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhitelistEntryConfig {
    /// Base command name (no path).
    pub command: String,
    /// Flags that are accepted, by exact or prefix match. Empty accepts any.
    #[serde(default)]
    pub allowed_args: Vec<String>,
    /// Substrings that reject the command when present in its arguments.
    #[serde(default)]
    pub blocked_args: Vec<String>,
    /// `none`, `low_risk`, `medium_risk`, `high_risk`, or `always`.
    #[serde(default = "default_confirmation_level")]
    pub confirmation_level: String,
    /// Free-form note shown by the CLI.
    #[serde(default)]
    pub description: Option<String>,
}

fn default_confirmation_level() -> String {
    "none".to_owned()
}

// ---------------------------------------------------------------------------
// RateLimitSection
// ---------------------------------------------------------------------------

/// Sliding-window and burst limits for command execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    /// Disable to admit every request.
    pub enabled: bool,
    /// Length of the main window in milliseconds.
    pub window_ms: u64,
    /// Requests admitted per window.
    pub max_requests: u32,
    /// Requests admitted per rolling second.
    pub burst_limit: u32,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 60_000,
            max_requests: 60,
            burst_limit: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// StorageSection
// ---------------------------------------------------------------------------

/// Where grants and audit entries live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Grant file. Defaults to `~/.warden/permissions.json`.
    pub grants_path: Option<String>,
    /// Audit log. Defaults to `~/.warden/audit.jsonl`.
    pub audit_path: Option<String>,
    /// Write grants to disk.
    pub persist: bool,
    /// Seconds between expired-grant sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            grants_path: None,
            audit_path: None,
            persist: true,
            sweep_interval_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"`, or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["warden_approval=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
