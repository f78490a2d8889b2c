//! Bridge from `warden_config::Config` to domain types.
//!
//! The config crate has no dependencies on other internal crates and keeps
//! enumerated values as strings. This module converts them into the engine's
//! types exactly once, in one place.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use warden_approval::{
    ConfirmationLevel, ControllerSettings, DefaultDecision, GrantDuration, Policy, RateLimitConfig,
    TimeoutDecision, ValidatorConfig, WhitelistEntry, default_whitelist,
};
use warden_config::{Config, ResolvedConfig};
use warden_core::{RiskLevel, Scope};
use warden_telemetry::{LogConfig, LogFormat};

/// Grant file name under the warden home directory.
pub(crate) const GRANTS_FILE: &str = "permissions.json";
/// Audit log file name under the warden home directory.
pub(crate) const AUDIT_FILE: &str = "audit.jsonl";

/// Convert the `[policy]` section.
pub(crate) fn to_policy(cfg: &Config) -> Result<Policy> {
    let p = &cfg.policy;
    Ok(Policy {
        default_decision: p.default_decision.parse::<DefaultDecision>()?,
        auto_approve_safe: p.auto_approve_safe,
        max_auto_approve_duration: p.max_auto_approve_duration.parse::<GrantDuration>()?,
        always_prompt_scopes: parse_all::<Scope>(&p.always_prompt_scopes)?,
        always_prompt_risks: parse_all::<RiskLevel>(&p.always_prompt_risks)?,
        blocked_scopes: parse_all::<Scope>(&p.blocked_scopes)?,
        approval_timeout_ms: p.approval_timeout_ms,
        timeout_decision: p.timeout_decision.parse::<TimeoutDecision>()?,
        enable_contextual_permissions: p.enable_contextual_permissions,
        max_cached_permissions: p.max_cached_permissions,
    })
}

/// Convert the `[validator]` section. Empty tables mean the built-in ones.
pub(crate) fn to_validator_config(cfg: &Config) -> Result<ValidatorConfig> {
    let v = &cfg.validator;
    let defaults = ValidatorConfig::default();

    let whitelist = if v.whitelist.is_empty() {
        default_whitelist()
    } else {
        v.whitelist
            .iter()
            .map(|e| {
                Ok(WhitelistEntry {
                    command: e.command.clone(),
                    allowed_args: e.allowed_args.clone(),
                    blocked_args: e.blocked_args.clone(),
                    confirmation_level: e
                        .confirmation_level
                        .parse::<ConfirmationLevel>()
                        .with_context(|| format!("whitelist entry '{}'", e.command))?,
                    description: e.description.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?
    };

    Ok(ValidatorConfig {
        strict_mode: v.strict_mode,
        max_command_length: v.max_command_length,
        extra_blocked_patterns: v.extra_blocked_patterns.clone(),
        blocked_paths: if v.blocked_paths.is_empty() {
            defaults.blocked_paths
        } else {
            v.blocked_paths.clone()
        },
        allowed_working_dirs: v.allowed_working_dirs.iter().map(PathBuf::from).collect(),
        whitelist,
    })
}

/// Convert the `[rate_limit]` section.
pub(crate) fn to_rate_limit_config(cfg: &Config) -> RateLimitConfig {
    let r = &cfg.rate_limit;
    RateLimitConfig {
        enabled: r.enabled,
        window_ms: r.window_ms,
        max_requests: r.max_requests,
        burst_limit: r.burst_limit,
    }
}

/// Grant file location: the configured path or `~/.warden/permissions.json`.
pub(crate) fn grants_path(resolved: &ResolvedConfig) -> PathBuf {
    resolved
        .config
        .storage
        .grants_path
        .as_ref()
        .map_or_else(|| resolved.warden_home.join(GRANTS_FILE), PathBuf::from)
}

/// Audit log location: the configured path or `~/.warden/audit.jsonl`.
pub(crate) fn audit_path(resolved: &ResolvedConfig) -> PathBuf {
    resolved
        .config
        .storage
        .audit_path
        .as_ref()
        .map_or_else(|| resolved.warden_home.join(AUDIT_FILE), PathBuf::from)
}

/// Convert everything the controller needs.
pub(crate) fn to_controller_settings(resolved: &ResolvedConfig) -> Result<ControllerSettings> {
    let cfg = &resolved.config;
    Ok(ControllerSettings {
        policy: to_policy(cfg).context("invalid [policy] section")?,
        validator: to_validator_config(cfg).context("invalid [validator] section")?,
        rate_limit: to_rate_limit_config(cfg),
        grants_path: Some(grants_path(resolved)),
        persist: cfg.storage.persist,
        sweep_interval: Duration::from_secs(cfg.storage.sweep_interval_secs),
    })
}

/// Convert the `[logging]` section to [`LogConfig`].
pub(crate) fn to_log_config(cfg: &Config) -> LogConfig {
    let format = match cfg.logging.format.as_str() {
        "pretty" => LogFormat::Pretty,
        "json" => LogFormat::Json,
        "full" => LogFormat::Full,
        _ => LogFormat::Compact,
    };

    LogConfig::new(&cfg.logging.level)
        .with_format(format)
        .with_directives(cfg.logging.directives.iter().cloned())
}

fn parse_all<T>(values: &[String]) -> Result<Vec<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    values
        .iter()
        .map(|v| v.parse::<T>().map_err(anyhow::Error::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_config::WhitelistEntryConfig;

    #[test]
    fn test_default_config_matches_engine_defaults() {
        let cfg = Config::default();
        assert_eq!(to_policy(&cfg).unwrap(), Policy::default());
        assert_eq!(to_validator_config(&cfg).unwrap(), ValidatorConfig::default());
        assert_eq!(to_rate_limit_config(&cfg), RateLimitConfig::default());
    }

    #[test]
    fn test_policy_strings_are_parsed() {
        let mut cfg = Config::default();
        cfg.policy.default_decision = "deny".to_owned();
        cfg.policy.blocked_scopes = vec!["registry".to_owned(), "system".to_owned()];
        cfg.policy.always_prompt_risks = vec!["medium".to_owned()];
        cfg.policy.timeout_decision = "allow".to_owned();

        let policy = to_policy(&cfg).unwrap();
        assert_eq!(policy.default_decision, DefaultDecision::Deny);
        assert_eq!(policy.blocked_scopes, vec![Scope::Registry, Scope::System]);
        assert_eq!(policy.always_prompt_risks, vec![RiskLevel::Medium]);
        assert_eq!(policy.timeout_decision, TimeoutDecision::Allow);
    }

    #[test]
    fn test_unknown_scope_rejected() {
        let mut cfg = Config::default();
        cfg.policy.blocked_scopes = vec!["teleport".to_owned()];
        assert!(to_policy(&cfg).is_err());
    }

    #[test]
    fn test_custom_whitelist_replaces_builtin() {
        let mut cfg = Config::default();
        cfg.validator.whitelist = vec![WhitelistEntryConfig {
            command: "make".to_owned(),
            allowed_args: Vec::new(),
            blocked_args: vec!["clean".to_owned()],
            confirmation_level: "low_risk".to_owned(),
            description: None,
        }];
        cfg.validator.allowed_working_dirs = vec!["/work".to_owned()];

        let validator = to_validator_config(&cfg).unwrap();
        assert_eq!(validator.whitelist.len(), 1);
        assert_eq!(validator.whitelist[0].confirmation_level, ConfirmationLevel::LowRisk);
        assert_eq!(validator.allowed_working_dirs, vec![PathBuf::from("/work")]);
        assert!(!validator.blocked_paths.is_empty());
    }

    #[test]
    fn test_log_config() {
        let mut cfg = Config::default();
        cfg.logging.format = "json".to_owned();
        cfg.logging.directives = vec!["warden_approval=debug".to_owned()];
        let lc = to_log_config(&cfg);
        assert!(matches!(lc.format, LogFormat::Json));
        assert_eq!(lc.directives, vec!["warden_approval=debug".to_string()]);
    }
}
