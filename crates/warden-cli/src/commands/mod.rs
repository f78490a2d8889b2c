//! Subcommand implementations.

pub(crate) mod audit;
pub(crate) mod check;
pub(crate) mod config;
pub(crate) mod grants;
pub(crate) mod policy;
pub(crate) mod prompt;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::warn;
use warden_approval::PermissionController;
use warden_audit::{AuditSink, JsonlAuditLog};
use warden_config::ResolvedConfig;

use crate::config_bridge;

/// How command results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    /// Colored human-readable output.
    Pretty,
    /// One JSON document on stdout.
    Json,
}

impl OutputFormat {
    pub(crate) fn parse(s: &str) -> Self {
        match s {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Print a value as pretty JSON.
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Open the controller described by the resolved config, auditing to the
/// configured JSONL file.
pub(crate) fn open_controller(resolved: &ResolvedConfig) -> Result<Arc<PermissionController>> {
    let settings = config_bridge::to_controller_settings(resolved)?;
    let audit_path = config_bridge::audit_path(resolved);
    let audit = JsonlAuditLog::open(&audit_path)
        .with_context(|| format!("failed to open audit log {}", audit_path.display()))?;

    PermissionController::builder(settings)
        .audit(Arc::new(audit) as Arc<dyn AuditSink>)
        .build()
        .context("failed to start permission controller")
}

/// Flush grants and stop background work. Save failures are reported, not fatal.
pub(crate) fn close_controller(controller: &PermissionController) {
    if let Err(e) = controller.shutdown() {
        warn!(error = %e, "failed to save grants");
        eprintln!("{}", crate::theme::Theme::warning(&format!("grants not saved: {e}")));
    }
}
