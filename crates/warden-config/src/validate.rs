//! Post-merge configuration validation.
//!
//! Checks that deserialized values are within range, that enumerated
//! strings use a known spelling, and that cross-field invariants hold.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Known scope spellings.
pub const SCOPES: &[&str] = &[
    "file",
    "network",
    "terminal",
    "browser",
    "clipboard",
    "process",
    "system",
    "git",
    "api",
    "registry",
    "notification",
    "screen",
];

/// Known risk level spellings.
pub const RISKS: &[&str] = &["safe", "low", "medium", "high", "critical", "blocked"];

/// Known grant duration spellings.
pub const DURATIONS: &[&str] = &["once", "session", "hour", "day", "week", "permanent"];

/// Known whitelist confirmation levels.
pub const CONFIRMATION_LEVELS: &[&str] = &["none", "low_risk", "medium_risk", "high_risk", "always"];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["pretty", "compact", "json", "full"];

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_policy(config)?;
    validate_validator(config)?;
    validate_rate_limit(config)?;
    validate_storage(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn one_of(field: &str, value: &str, allowed: &[&str]) -> ConfigResult<()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(invalid(
            field,
            format!("unknown value '{value}'; expected one of: {}", allowed.join(", ")),
        ))
    }
}

fn all_of(field: &str, values: &[String], allowed: &[&str]) -> ConfigResult<()> {
    values.iter().try_for_each(|v| one_of(field, v, allowed))
}

fn validate_policy(config: &Config) -> ConfigResult<()> {
    let p = &config.policy;
    one_of("policy.default_decision", &p.default_decision, &["deny", "prompt"])?;
    one_of("policy.timeout_decision", &p.timeout_decision, &["deny", "allow"])?;
    one_of(
        "policy.max_auto_approve_duration",
        &p.max_auto_approve_duration,
        DURATIONS,
    )?;
    all_of("policy.always_prompt_scopes", &p.always_prompt_scopes, SCOPES)?;
    all_of("policy.blocked_scopes", &p.blocked_scopes, SCOPES)?;
    all_of("policy.always_prompt_risks", &p.always_prompt_risks, RISKS)?;

    if p.approval_timeout_ms == 0 {
        return Err(invalid("policy.approval_timeout_ms", "must be greater than 0"));
    }
    if p.max_cached_permissions == 0 {
        return Err(invalid("policy.max_cached_permissions", "must be greater than 0"));
    }
    Ok(())
}

fn validate_validator(config: &Config) -> ConfigResult<()> {
    let v = &config.validator;
    if v.max_command_length == 0 {
        return Err(invalid("validator.max_command_length", "must be greater than 0"));
    }
    for entry in &v.whitelist {
        let command = entry.command.trim();
        if command.is_empty() {
            return Err(invalid("validator.whitelist.command", "must not be empty"));
        }
        if command.contains('/') || command.contains(char::is_whitespace) {
            return Err(invalid(
                "validator.whitelist.command",
                format!("'{command}' must be a bare command name"),
            ));
        }
        one_of(
            "validator.whitelist.confirmation_level",
            &entry.confirmation_level,
            CONFIRMATION_LEVELS,
        )?;
    }
    Ok(())
}

fn validate_rate_limit(config: &Config) -> ConfigResult<()> {
    let r = &config.rate_limit;
    if r.window_ms == 0 {
        return Err(invalid("rate_limit.window_ms", "must be greater than 0"));
    }
    if r.max_requests == 0 {
        return Err(invalid("rate_limit.max_requests", "must be greater than 0"));
    }
    if r.burst_limit == 0 {
        return Err(invalid("rate_limit.burst_limit", "must be greater than 0"));
    }
    if r.burst_limit > r.max_requests {
        return Err(invalid(
            "rate_limit.burst_limit",
            format!(
                "burst_limit ({}) must not exceed max_requests ({})",
                r.burst_limit, r.max_requests
            ),
        ));
    }
    Ok(())
}

fn validate_storage(config: &Config) -> ConfigResult<()> {
    if config.storage.sweep_interval_secs == 0 {
        return Err(invalid("storage.sweep_interval_secs", "must be greater than 0"));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    one_of("logging.level", &config.logging.level.to_ascii_lowercase(), LOG_LEVELS)?;
    one_of("logging.format", &config.logging.format, LOG_FORMATS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WhitelistEntryConfig;

    #[test]
    fn test_defaults_are_valid() {
        validate(&Config::default()).unwrap();
    }

    #[test]
    fn test_unknown_scope_rejected() {
        let mut config = Config::default();
        config.policy.blocked_scopes = vec!["teleport".to_owned()];
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("policy.blocked_scopes"));
    }

    #[test]
    fn test_burst_above_window_rejected() {
        let mut config = Config::default();
        config.rate_limit.max_requests = 3;
        config.rate_limit.burst_limit = 4;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.policy.approval_timeout_ms = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_whitelist_entry_checks() {
        let mut config = Config::default();
        config.validator.whitelist = vec![WhitelistEntryConfig {
            command: "/bin/ls".to_owned(),
            allowed_args: vec![],
            blocked_args: vec![],
            confirmation_level: "none".to_owned(),
            description: None,
        }];
        assert!(validate(&config).is_err());

        config.validator.whitelist[0].command = "ls".to_owned();
        config.validator.whitelist[0].confirmation_level = "sometimes".to_owned();
        assert!(validate(&config).is_err());

        config.validator.whitelist[0].confirmation_level = "low_risk".to_owned();
        validate(&config).unwrap();
    }
}
