//! Audit command - view recent decisions from the JSONL audit log.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use warden_audit::{AuditEntry, AuditOutcome, JsonlAuditLog};

use super::{OutputFormat, print_json};
use crate::theme::Theme;

/// Show the newest `limit` entries, optionally only one outcome.
pub(crate) fn tail(
    path: &Path,
    limit: usize,
    outcome: Option<AuditOutcome>,
    format: OutputFormat,
) -> Result<()> {
    if !path.exists() {
        if format == OutputFormat::Json {
            return print_json(&Vec::<AuditEntry>::new());
        }
        println!("{}", Theme::info("No audit entries"));
        return Ok(());
    }

    let entries: Vec<AuditEntry> = JsonlAuditLog::read_recent(path, usize::MAX)
        .with_context(|| format!("failed to read audit log {}", path.display()))?
        .into_iter()
        .filter(|e| outcome.is_none_or(|o| e.outcome == o))
        .collect();
    let skip = entries.len().saturating_sub(limit);
    let entries = &entries[skip..];

    if format == OutputFormat::Json {
        return print_json(entries);
    }
    if entries.is_empty() {
        println!("{}", Theme::info("No matching audit entries"));
        return Ok(());
    }

    println!("\n{}", Theme::header("Audit Entries"));
    println!(
        "{:<20} {:<9} {:<22} {}",
        "TIMESTAMP".dimmed(),
        "RESULT".dimmed(),
        "PERMISSION".dimmed(),
        "DETAIL".dimmed()
    );
    println!("{}", Theme::separator());

    for entry in entries {
        let result = match entry.outcome {
            AuditOutcome::Granted => "granted".green().to_string(),
            AuditOutcome::Denied => "denied".red().to_string(),
            AuditOutcome::Revoked => "revoked".yellow().to_string(),
            AuditOutcome::Expired => "expired".dimmed().to_string(),
        };
        let detail = [
            entry.tool_name.as_deref(),
            entry.resource.as_deref(),
            entry.reason.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" | ");

        println!(
            "{:<20} {:<9} {:<22} {}",
            Theme::timestamp(&entry.timestamp.0),
            result,
            format!("{}:{}", entry.scope, entry.action),
            detail
        );
    }
    println!();
    Ok(())
}

/// Parse an outcome filter.
pub(crate) fn parse_outcome(s: &str) -> Result<AuditOutcome> {
    match s.to_ascii_lowercase().as_str() {
        "granted" => Ok(AuditOutcome::Granted),
        "denied" => Ok(AuditOutcome::Denied),
        "revoked" => Ok(AuditOutcome::Revoked),
        "expired" => Ok(AuditOutcome::Expired),
        other => anyhow::bail!("unknown outcome '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_audit::AuditSink;
    use warden_core::{Action, Scope};

    #[test]
    fn test_parse_outcome() {
        assert_eq!(parse_outcome("Denied").unwrap(), AuditOutcome::Denied);
        assert!(parse_outcome("maybe").is_err());
    }

    #[test]
    fn test_tail_reads_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let log = JsonlAuditLog::open(&path).unwrap();
        log.record(AuditEntry::new(Scope::File, Action::Read, AuditOutcome::Granted))
            .unwrap();
        log.record(AuditEntry::new(Scope::Terminal, Action::Execute, AuditOutcome::Denied))
            .unwrap();

        assert!(tail(&path, 10, None, OutputFormat::Json).is_ok());
        assert!(tail(&path, 1, Some(AuditOutcome::Denied), OutputFormat::Pretty).is_ok());
        assert!(tail(&dir.path().join("missing.jsonl"), 10, None, OutputFormat::Pretty).is_ok());
    }
}
