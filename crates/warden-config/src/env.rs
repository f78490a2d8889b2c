//! Environment variable fallbacks.
//!
//! Env vars are **fallback**, not override: they only apply to fields that no
//! config file set.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::merge::{ConfigLayer, FieldSources};

/// How an env var value is coerced into TOML.
#[derive(Debug, Clone, Copy)]
enum Kind {
    Str,
    Bool,
    Int,
    List,
}

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: Kind,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "WARDEN_DEFAULT_DECISION",
        field_path: "policy.default_decision",
        kind: Kind::Str,
    },
    EnvMapping {
        var_name: "WARDEN_AUTO_APPROVE_SAFE",
        field_path: "policy.auto_approve_safe",
        kind: Kind::Bool,
    },
    EnvMapping {
        var_name: "WARDEN_BLOCKED_SCOPES",
        field_path: "policy.blocked_scopes",
        kind: Kind::List,
    },
    EnvMapping {
        var_name: "WARDEN_APPROVAL_TIMEOUT_MS",
        field_path: "policy.approval_timeout_ms",
        kind: Kind::Int,
    },
    EnvMapping {
        var_name: "WARDEN_TIMEOUT_DECISION",
        field_path: "policy.timeout_decision",
        kind: Kind::Str,
    },
    EnvMapping {
        var_name: "WARDEN_STRICT_MODE",
        field_path: "validator.strict_mode",
        kind: Kind::Bool,
    },
    EnvMapping {
        var_name: "WARDEN_RATE_LIMIT_MAX_REQUESTS",
        field_path: "rate_limit.max_requests",
        kind: Kind::Int,
    },
    EnvMapping {
        var_name: "WARDEN_RATE_LIMIT_BURST",
        field_path: "rate_limit.burst_limit",
        kind: Kind::Int,
    },
    EnvMapping {
        var_name: "WARDEN_GRANTS_PATH",
        field_path: "storage.grants_path",
        kind: Kind::Str,
    },
    EnvMapping {
        var_name: "WARDEN_AUDIT_PATH",
        field_path: "storage.audit_path",
        kind: Kind::Str,
    },
    EnvMapping {
        var_name: "WARDEN_LOG_LEVEL",
        field_path: "logging.level",
        kind: Kind::Str,
    },
    EnvMapping {
        var_name: "WARDEN_LOG_FORMAT",
        field_path: "logging.format",
        kind: Kind::Str,
    },
];

/// Snapshot the process environment, restricted to `WARDEN_*` variables.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with("WARDEN_"))
        .collect()
}

/// Apply environment variable fallbacks to fields that were **not** set by
/// any config file layer.
///
/// Returns the number of env vars applied.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        if sources.get(mapping.field_path).is_some_and(ConfigLayer::is_file) {
            continue;
        }
        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };
        let Some(value) = coerce(mapping.kind, raw) else {
            warn!(
                var = mapping.var_name,
                value = raw.as_str(),
                "ignoring env var with unparseable value"
            );
            continue;
        };

        debug!(
            var = mapping.var_name,
            field = mapping.field_path,
            "applying env var fallback"
        );
        if set_field(merged, mapping.field_path, value) {
            sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
            count = count.saturating_add(1);
        }
    }

    count
}

fn coerce(kind: Kind, raw: &str) -> Option<toml::Value> {
    let raw = raw.trim();
    match kind {
        Kind::Str => Some(toml::Value::String(raw.to_owned())),
        Kind::Bool => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(toml::Value::Boolean(true)),
            "0" | "false" | "no" | "off" => Some(toml::Value::Boolean(false)),
            _ => None,
        },
        Kind::Int => raw.parse::<i64>().ok().map(toml::Value::Integer),
        Kind::List => Some(toml::Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| toml::Value::String(s.to_owned()))
                .collect(),
        )),
    }
}

/// Set a dotted `path` in the TOML tree, creating intermediate tables.
fn set_field(root: &mut toml::Value, path: &str, value: toml::Value) -> bool {
    let mut segments = path.split('.').peekable();
    let mut current = root;
    while let Some(segment) = segments.next() {
        let Some(table) = current.as_table_mut() else {
            return false;
        };
        if segments.peek().is_none() {
            table.insert(segment.to_owned(), value);
            return true;
        }
        current = table
            .entry(segment.to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> toml::Value {
        toml::from_str("[policy]\napproval_timeout_ms = 60000\n").unwrap()
    }

    #[test]
    fn test_env_applies_over_defaults() {
        let mut merged = base();
        let mut sources = FieldSources::new();
        sources.insert("policy.approval_timeout_ms".to_owned(), ConfigLayer::Defaults);
        let env = HashMap::from([("WARDEN_APPROVAL_TIMEOUT_MS".to_owned(), "250".to_owned())]);

        let applied = apply_env_fallbacks(&mut merged, &mut sources, &env);
        assert_eq!(applied, 1);
        assert_eq!(merged["policy"]["approval_timeout_ms"].as_integer(), Some(250));
        assert_eq!(
            sources.get("policy.approval_timeout_ms"),
            Some(&ConfigLayer::Environment)
        );
    }

    #[test]
    fn test_env_never_overrides_file() {
        let mut merged = base();
        let mut sources = FieldSources::new();
        sources.insert("policy.approval_timeout_ms".to_owned(), ConfigLayer::User);
        let env = HashMap::from([("WARDEN_APPROVAL_TIMEOUT_MS".to_owned(), "250".to_owned())]);

        assert_eq!(apply_env_fallbacks(&mut merged, &mut sources, &env), 0);
        assert_eq!(merged["policy"]["approval_timeout_ms"].as_integer(), Some(60000));
    }

    #[test]
    fn test_list_and_bool_coercion() {
        let mut merged = base();
        let mut sources = FieldSources::new();
        let env = HashMap::from([
            ("WARDEN_BLOCKED_SCOPES".to_owned(), "system, registry".to_owned()),
            ("WARDEN_STRICT_MODE".to_owned(), "off".to_owned()),
            ("WARDEN_RATE_LIMIT_BURST".to_owned(), "lots".to_owned()),
        ]);

        assert_eq!(apply_env_fallbacks(&mut merged, &mut sources, &env), 2);
        let scopes = merged["policy"]["blocked_scopes"].as_array().unwrap();
        assert_eq!(scopes.len(), 2);
        assert_eq!(scopes[1].as_str(), Some("registry"));
        assert_eq!(merged["validator"]["strict_mode"].as_bool(), Some(false));
        assert!(merged.get("rate_limit").is_none());
    }
}
