//! Shell command safety validation.
//!
//! [`CommandValidator`] decides whether a raw shell string may be spawned.
//! Checks run in a fixed order and the first decisive one wins:
//!
//! 1. Length limit (and empty input)
//! 2. Critical patterns on the raw string, regardless of whitelist
//! 3. Split on unquoted `;`, `&&`, `||`, `|`, `&`, newline
//! 4. Per segment: whitelist membership (strict mode), blocked arguments,
//!    allowed flags, blocked paths
//! 5. Command substitution escalates to a confirmed high-risk warning
//!
//! The most severe segment decides the result.

mod parse;
mod rules;

pub use rules::default_whitelist;

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use tracing::debug;
use warden_core::RiskLevel;

use crate::error::{ApprovalError, ApprovalResult};
use parse::ParsedCommand;

/// How much confirmation a whitelisted command needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationLevel {
    /// Runs without asking.
    #[default]
    None,
    /// Low risk, no confirmation.
    LowRisk,
    /// Medium risk, confirm.
    MediumRisk,
    /// High risk, confirm.
    HighRisk,
    /// Always confirm.
    Always,
}

impl ConfirmationLevel {
    /// Risk implied by this level.
    #[must_use]
    pub fn risk(self) -> RiskLevel {
        match self {
            Self::None => RiskLevel::Safe,
            Self::LowRisk => RiskLevel::Low,
            Self::MediumRisk => RiskLevel::Medium,
            Self::HighRisk | Self::Always => RiskLevel::High,
        }
    }

    /// Whether a human must confirm before the command runs.
    #[must_use]
    pub fn requires_confirmation(self) -> bool {
        matches!(self, Self::MediumRisk | Self::HighRisk | Self::Always)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::LowRisk => "low_risk",
            Self::MediumRisk => "medium_risk",
            Self::HighRisk => "high_risk",
            Self::Always => "always",
        }
    }
}

impl fmt::Display for ConfirmationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfirmationLevel {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "low_risk" => Ok(Self::LowRisk),
            "medium_risk" => Ok(Self::MediumRisk),
            "high_risk" => Ok(Self::HighRisk),
            "always" => Ok(Self::Always),
            other => Err(ApprovalError::Internal(format!(
                "unknown confirmation level '{other}'"
            ))),
        }
    }
}

/// A whitelisted command and its argument constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhitelistEntry {
    /// Bare command name.
    pub command: String,
    /// Flags that may be passed (exact or prefix match). Empty means any.
    #[serde(default)]
    pub allowed_args: Vec<String>,
    /// Substrings that must not appear in the joined arguments.
    #[serde(default)]
    pub blocked_args: Vec<String>,
    /// Confirmation requirement.
    #[serde(default)]
    pub confirmation_level: ConfirmationLevel,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// How bad a validation result is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Nothing to report.
    Info,
    /// Allowed with caution.
    Warning,
    /// Refused.
    Blocked,
}

/// Outcome of validating a command string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandValidationResult {
    /// Whether the command may run (possibly after confirmation).
    pub allowed: bool,
    /// Why.
    pub reason: String,
    /// Severity.
    pub severity: Severity,
    /// Assessed risk.
    pub risk_level: RiskLevel,
    /// The rule that fired, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_pattern: Option<String>,
    /// Whether a human must confirm.
    pub requires_confirmation: bool,
}

impl CommandValidationResult {
    fn allow(reason: impl Into<String>, level: ConfirmationLevel) -> Self {
        let requires_confirmation = level.requires_confirmation();
        Self {
            allowed: true,
            reason: reason.into(),
            severity: if requires_confirmation {
                Severity::Warning
            } else {
                Severity::Info
            },
            risk_level: level.risk(),
            matched_pattern: None,
            requires_confirmation,
        }
    }

    fn warn(reason: impl Into<String>, risk: RiskLevel) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            severity: Severity::Warning,
            risk_level: risk,
            matched_pattern: None,
            requires_confirmation: true,
        }
    }

    fn block(reason: impl Into<String>, risk: RiskLevel, matched: Option<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            severity: Severity::Blocked,
            risk_level: risk,
            matched_pattern: matched,
            requires_confirmation: false,
        }
    }

    fn rank(&self) -> (Severity, RiskLevel, bool) {
        (self.severity, self.risk_level, self.requires_confirmation)
    }

    /// Whether the result is a block.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.severity == Severity::Blocked
    }
}

/// Outcome of a path check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathValidation {
    /// Whether the path may be used.
    pub allowed: bool,
    /// Why.
    pub reason: String,
    /// The blocked-path glob that matched, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_pattern: Option<String>,
}

impl PathValidation {
    fn ok() -> Self {
        Self {
            allowed: true,
            reason: "path allowed".to_string(),
            matched_pattern: None,
        }
    }

    fn reject(reason: impl Into<String>, matched: Option<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            matched_pattern: matched,
        }
    }
}

/// Validator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Only whitelisted commands may run.
    pub strict_mode: bool,
    /// Longest accepted command, in bytes.
    pub max_command_length: usize,
    /// Extra critical regexes, matched on the raw string.
    pub extra_blocked_patterns: Vec<String>,
    /// Blocked path globs.
    pub blocked_paths: Vec<String>,
    /// If non-empty, working directories must be under one of these.
    pub allowed_working_dirs: Vec<PathBuf>,
    /// Command whitelist.
    pub whitelist: Vec<WhitelistEntry>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            strict_mode: true,
            max_command_length: 4096,
            extra_blocked_patterns: Vec::new(),
            blocked_paths: rules::BLOCKED_PATHS.iter().map(|s| (*s).to_string()).collect(),
            allowed_working_dirs: Vec::new(),
            whitelist: default_whitelist(),
        }
    }
}

struct CompiledRule {
    name: String,
    regex: Regex,
}

/// Pattern-based command gate.
///
/// All rule tables are compiled in [`CommandValidator::new`].
pub struct CommandValidator {
    config: ValidatorConfig,
    critical: Vec<CompiledRule>,
    whitelist: HashMap<String, WhitelistEntry>,
    blocked_paths: GlobSet,
}

impl CommandValidator {
    /// Compile a validator.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::InvalidRule`] if any regex or glob fails to compile.
    pub fn new(config: ValidatorConfig) -> ApprovalResult<Self> {
        let builtin = rules::CRITICAL_PATTERNS
            .iter()
            .map(|r| (r.name.to_string(), r.pattern));
        let extra = config
            .extra_blocked_patterns
            .iter()
            .map(|p| (p.clone(), p.as_str()));

        let critical = builtin
            .chain(extra)
            .map(|(name, pattern)| {
                Regex::new(pattern)
                    .map(|regex| CompiledRule { name, regex })
                    .map_err(|e| ApprovalError::InvalidRule {
                        pattern: pattern.to_string(),
                        reason: e.to_string(),
                    })
            })
            .collect::<ApprovalResult<Vec<_>>>()?;

        let mut builder = GlobSetBuilder::new();
        for pattern in &config.blocked_paths {
            let glob = Glob::new(pattern).map_err(|e| ApprovalError::InvalidRule {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
            builder.add(glob);
        }
        let blocked_paths = builder.build().map_err(|e| ApprovalError::InvalidRule {
            pattern: "blocked paths".to_string(),
            reason: e.to_string(),
        })?;

        let whitelist = config
            .whitelist
            .iter()
            .map(|e| (e.command.clone(), e.clone()))
            .collect();

        debug!(
            critical = critical.len(),
            whitelist = config.whitelist.len(),
            blocked_paths = config.blocked_paths.len(),
            strict = config.strict_mode,
            "command validator compiled"
        );

        Ok(Self {
            config,
            critical,
            whitelist,
            blocked_paths,
        })
    }

    /// Validator with the built-in tables.
    ///
    /// # Errors
    ///
    /// Fails only if a built-in table entry does not compile.
    pub fn with_defaults() -> ApprovalResult<Self> {
        Self::new(ValidatorConfig::default())
    }

    /// Settings in effect.
    #[must_use]
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate a raw command string.
    #[must_use]
    pub fn validate(&self, command: &str) -> CommandValidationResult {
        if command.trim().is_empty() {
            return CommandValidationResult::block("empty command", RiskLevel::Critical, None);
        }
        if command.len() > self.config.max_command_length {
            return CommandValidationResult::block(
                format!(
                    "command exceeds maximum length of {} bytes",
                    self.config.max_command_length
                ),
                RiskLevel::Critical,
                None,
            );
        }

        if let Some(result) = self.match_critical(command) {
            return result;
        }

        let segments = parse::split_segments(command);
        // quoting must not hide a critical command from the table
        for segment in &segments {
            if let Some(result) = self.match_critical(&parse::tokenize(segment).join(" ")) {
                return result;
            }
        }

        let mut worst: Option<CommandValidationResult> = None;
        for segment in &segments {
            let result = self.validate_segment(segment);
            if worst.as_ref().is_none_or(|w| result.rank() > w.rank()) {
                worst = Some(result);
            }
        }
        let Some(mut result) = worst else {
            return CommandValidationResult::block("empty command", RiskLevel::Critical, None);
        };
        if result.is_blocked() {
            return result;
        }

        if parse::has_substitution(command) {
            let escalated = CommandValidationResult::warn(
                "command substitution requires confirmation",
                RiskLevel::High,
            );
            if escalated.rank() > result.rank() {
                result = escalated;
            }
        }
        result
    }

    fn match_critical(&self, text: &str) -> Option<CommandValidationResult> {
        let rule = self.critical.iter().find(|r| r.regex.is_match(text))?;
        debug!(rule = %rule.name, "critical command pattern matched");
        Some(CommandValidationResult::block(
            format!("matches critical pattern: {}", rule.name),
            RiskLevel::Critical,
            Some(rule.regex.as_str().to_string()),
        ))
    }

    fn validate_segment(&self, segment: &str) -> CommandValidationResult {
        let Some(parsed) = ParsedCommand::parse(segment) else {
            return CommandValidationResult::allow("no command", ConfirmationLevel::None);
        };

        let Some(entry) = self.whitelist.get(&parsed.base) else {
            if self.config.strict_mode {
                return CommandValidationResult::block(
                    format!("command '{}' is not whitelisted", parsed.base),
                    RiskLevel::High,
                    None,
                );
            }
            return CommandValidationResult::warn(
                format!("command '{}' is not whitelisted", parsed.base),
                RiskLevel::Medium,
            );
        };

        let joined = parsed.args.join(" ");
        if let Some(blocked) = entry.blocked_args.iter().find(|b| joined.contains(b.as_str())) {
            return CommandValidationResult::block(
                format!("argument '{blocked}' is not allowed for '{}'", entry.command),
                RiskLevel::High,
                Some(blocked.clone()),
            );
        }

        if let Some(result) = self.check_path_args(&parsed) {
            return result;
        }

        if !entry.allowed_args.is_empty()
            && let Some(flag) = parsed
                .args
                .iter()
                .filter(|a| a.starts_with('-') && a.len() > 1)
                .find(|a| {
                    !entry
                        .allowed_args
                        .iter()
                        .any(|allowed| a.as_str() == allowed || a.starts_with(allowed.as_str()))
                })
        {
            return CommandValidationResult::warn(
                format!("argument '{flag}' is not in the allowed list for '{}'", entry.command),
                RiskLevel::Medium,
            );
        }

        CommandValidationResult::allow(
            format!("'{}' is whitelisted", entry.command),
            entry.confirmation_level,
        )
    }

    fn check_path_args(&self, parsed: &ParsedCommand) -> Option<CommandValidationResult> {
        parsed.args.iter().find_map(|arg| {
            let candidate = if parse::is_redirection(arg) {
                arg.trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '&' | '>' | '<'))
            } else if arg.starts_with('-') {
                arg.split_once('=').map_or("", |(_, v)| v)
            } else {
                arg.as_str()
            };
            if candidate.is_empty() || !parse::is_path_like(candidate) {
                return None;
            }
            let check = self.validate_path(Path::new(candidate));
            (!check.allowed).then(|| {
                CommandValidationResult::block(check.reason, RiskLevel::High, check.matched_pattern)
            })
        })
    }

    /// Check a path against traversal and the blocked-path table.
    #[must_use]
    pub fn validate_path(&self, path: &Path) -> PathValidation {
        if path.components().any(|c| c == Component::ParentDir) {
            return PathValidation::reject(
                format!("path traversal in '{}'", path.display()),
                Some("..".to_string()),
            );
        }
        // `//` is already collapsed by `components()`
        let normalized: PathBuf = path
            .components()
            .filter(|c| *c != Component::CurDir)
            .collect();
        if let Some(&index) = self.blocked_paths.matches(&normalized).first() {
            let pattern = self.config.blocked_paths.get(index).cloned();
            return PathValidation::reject(
                format!("'{}' is a protected path", path.display()),
                pattern,
            );
        }
        PathValidation::ok()
    }

    /// Check a working directory: [`Self::validate_path`] plus the allow-list.
    #[must_use]
    pub fn validate_working_directory(&self, cwd: &Path) -> PathValidation {
        let check = self.validate_path(cwd);
        if !check.allowed {
            return check;
        }
        let allowed = &self.config.allowed_working_dirs;
        if !allowed.is_empty() && !allowed.iter().any(|dir| cwd.starts_with(dir)) {
            return PathValidation::reject(
                format!("'{}' is outside the allowed working directories", cwd.display()),
                None,
            );
        }
        check
    }
}

impl fmt::Debug for CommandValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandValidator")
            .field("strict_mode", &self.config.strict_mode)
            .field("critical_rules", &self.critical.len())
            .field("whitelist", &self.whitelist.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
