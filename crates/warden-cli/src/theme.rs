//! CLI theme and styling.

use colored::Colorize;
use warden_core::RiskLevel;

/// CLI theme configuration.
pub(crate) struct Theme;

impl Theme {
    /// Format a header.
    pub(crate) fn header(text: &str) -> String {
        format!("{}", text.bold().cyan())
    }

    /// Format a success message.
    pub(crate) fn success(text: &str) -> String {
        format!("{} {}", "✓".green(), text)
    }

    /// Format an error message.
    pub(crate) fn error(text: &str) -> String {
        format!("{} {}", "✗".red(), text.red())
    }

    /// Format a warning message.
    pub(crate) fn warning(text: &str) -> String {
        format!("{} {}", "!".yellow(), text.yellow())
    }

    /// Format an info message.
    pub(crate) fn info(text: &str) -> String {
        format!("{} {}", "i".blue(), text)
    }

    /// Format a dimmed message.
    pub(crate) fn dimmed(text: &str) -> String {
        format!("{}", text.dimmed())
    }

    /// Format a separator line.
    pub(crate) fn separator() -> String {
        "━".repeat(50).dimmed().to_string()
    }

    /// Format a key-value pair.
    pub(crate) fn kv(key: &str, value: &str) -> String {
        format!("{}: {}", key.bold(), value)
    }

    /// Format a risk level.
    pub(crate) fn risk_level(level: RiskLevel) -> String {
        let text = level.as_str();
        match level {
            RiskLevel::Safe | RiskLevel::Low => text.green().to_string(),
            RiskLevel::Medium => text.yellow().to_string(),
            RiskLevel::High => text.red().to_string(),
            RiskLevel::Critical | RiskLevel::Blocked => text.red().bold().to_string(),
        }
    }

    /// Format an allow/deny verdict.
    pub(crate) fn verdict(allowed: bool, requires_approval: bool) -> String {
        if allowed {
            "ALLOW".green().bold().to_string()
        } else if requires_approval {
            "ASK".yellow().bold().to_string()
        } else {
            "DENY".red().bold().to_string()
        }
    }

    /// Format an id (shortened).
    pub(crate) fn short_id(id: &str) -> String {
        let short = id.get(..8).unwrap_or(id);
        format!("{}", short.cyan())
    }

    /// Format a timestamp.
    pub(crate) fn timestamp(dt: &chrono::DateTime<chrono::Utc>) -> String {
        dt.format("%Y-%m-%d %H:%M:%S").to_string().dimmed().to_string()
    }

    /// Format a box around an approval prompt.
    pub(crate) fn approval_box(title: &str, content: &str, risk: RiskLevel) -> String {
        let paint = |s: &str| match risk {
            RiskLevel::Safe | RiskLevel::Low => s.green().to_string(),
            RiskLevel::Medium => s.yellow().to_string(),
            RiskLevel::High => s.red().to_string(),
            RiskLevel::Critical | RiskLevel::Blocked => s.red().bold().to_string(),
        };

        let rule = "─".repeat(58);
        let mut lines = vec![
            paint(&format!("╭{rule}╮")),
            format!("  {}", title.bold()),
            String::new(),
        ];
        lines.extend(content.lines().map(|line| format!("  {line}")));
        lines.push(paint(&format!("╰{rule}╯")));
        lines.join("\n")
    }
}
