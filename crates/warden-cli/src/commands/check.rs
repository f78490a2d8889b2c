//! Decision commands: validate, check-path, check, tool, authorize.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use warden_approval::{
    ApprovalError, CommandValidationResult, PathValidation, PermissionCheckResult,
    PermissionController, PermissionQuery, Severity,
};
use warden_core::{Action, Scope, SessionId};

use super::{OutputFormat, print_json};
use crate::theme::Theme;

/// Validate a command string without running the policy.
pub(crate) fn validate(
    controller: &PermissionController,
    command: &str,
    format: OutputFormat,
) -> Result<bool> {
    let result = controller.validate_command(command);
    if format == OutputFormat::Json {
        print_json(&result)?;
    } else {
        print_validation(command, &result);
    }
    Ok(!result.is_blocked())
}

fn print_validation(command: &str, result: &CommandValidationResult) {
    let line = format!("{command}: {}", result.reason);
    let text = match result.severity {
        Severity::Blocked => Theme::error(&line),
        Severity::Warning => Theme::warning(&line),
        Severity::Info => Theme::success(&line),
    };
    println!("{text}");
    println!("  {}", Theme::kv("risk", &Theme::risk_level(result.risk_level)));
    if result.requires_confirmation {
        println!("  {}", Theme::kv("confirmation", "required"));
    }
    if let Some(pattern) = &result.matched_pattern {
        println!("  {}", Theme::kv("rule", &Theme::dimmed(pattern)));
    }
}

/// Check a path, and optionally a working directory.
pub(crate) fn check_path(
    controller: &PermissionController,
    path: &Path,
    cwd: Option<&Path>,
    format: OutputFormat,
) -> Result<bool> {
    #[derive(Serialize)]
    struct Report<'a> {
        path: &'a PathValidation,
        #[serde(skip_serializing_if = "Option::is_none")]
        working_directory: Option<&'a PathValidation>,
    }

    let path_check = controller.validate_path(path);
    let cwd_check = cwd.map(|cwd| controller.validate_working_directory(cwd));

    if format == OutputFormat::Json {
        print_json(&Report {
            path: &path_check,
            working_directory: cwd_check.as_ref(),
        })?;
    } else {
        print_path(&path.display().to_string(), &path_check);
        if let (Some(cwd), Some(check)) = (cwd, &cwd_check) {
            print_path(&format!("cwd {}", cwd.display()), check);
        }
    }
    Ok(path_check.allowed && cwd_check.is_none_or(|c| c.allowed))
}

fn print_path(label: &str, check: &PathValidation) {
    let line = format!("{label}: {}", check.reason);
    if check.allowed {
        println!("{}", Theme::success(&line));
    } else {
        println!("{}", Theme::error(&line));
    }
}

/// Decide a scope + action query without prompting.
pub(crate) fn check(
    controller: &PermissionController,
    query: &PermissionQuery,
    format: OutputFormat,
) -> Result<bool> {
    let result = controller.check_permission(query);
    report_decision(&format!("{}:{}", query.scope, query.action), &result, format)?;
    Ok(result.allowed)
}

/// Build a query from command-line parts.
pub(crate) fn query(
    scope: &str,
    action: &str,
    resource: Option<&str>,
    tool: Option<&str>,
    context: Option<&str>,
) -> Result<PermissionQuery> {
    Ok(PermissionQuery::new(scope.parse::<Scope>()?, action.parse::<Action>()?)
        .with_resource_opt(resource)
        .with_tool_opt(tool)
        .with_context_opt(context))
}

/// Decide a tool call, prompting on the terminal when `interactive`.
///
/// With `known`, a tool missing from the catalog is refused outright.
pub(crate) async fn tool(
    controller: &PermissionController,
    name: &str,
    resource: Option<&str>,
    context: Option<&str>,
    known: bool,
    interactive: bool,
    format: OutputFormat,
) -> Result<bool> {
    if known && let Err(e) = controller.catalog().require(name) {
        report_error(name, &e, format)?;
        return Ok(false);
    }
    let result = if interactive {
        controller.authorize_tool(name, resource, context).await
    } else {
        controller.check_tool_permission(name, resource, context)
    };
    report_decision(name, &result, format)?;
    Ok(result.allowed)
}

/// Run the full command pipeline for a session.
pub(crate) async fn authorize(
    controller: &PermissionController,
    session: &SessionId,
    command: &str,
    cwd: Option<&Path>,
    format: OutputFormat,
) -> Result<bool> {
    match controller.authorize_command(session, command, cwd, None).await {
        Ok(auth) => {
            if format == OutputFormat::Json {
                print_json(&serde_json::json!({
                    "allowed": true,
                    "validation": auth.validation,
                    "remaining": auth.rate_limit.remaining,
                    "decision": auth.decision,
                }))?;
            } else {
                println!("{}", Theme::success(&format!("{command}: {}", auth.decision.reason)));
                println!("  {}", Theme::kv("risk", &Theme::risk_level(auth.decision.risk)));
                println!(
                    "  {}",
                    Theme::kv("rate limit", &format!("{} remaining", auth.rate_limit.remaining))
                );
            }
            Ok(true)
        },
        Err(e) => {
            report_error(command, &e, format)?;
            Ok(false)
        },
    }
}

fn report_error(label: &str, e: &ApprovalError, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        print_json(&serde_json::json!({
            "allowed": false,
            "kind": error_kind(e),
            "error": e.to_string(),
        }))
    } else {
        println!("{}", Theme::error(&format!("{label}: {e}")));
        Ok(())
    }
}

fn error_kind(e: &ApprovalError) -> &'static str {
    match e {
        ApprovalError::Blocked { .. } => "blocked",
        ApprovalError::Denied { .. } => "denied",
        ApprovalError::Timeout { .. } => "timeout",
        ApprovalError::RateLimited { .. } => "rate_limited",
        ApprovalError::UnknownTool { .. } => "unknown_tool",
        _ => "error",
    }
}

fn report_decision(label: &str, result: &PermissionCheckResult, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(result);
    }

    println!(
        "{} {label}: {}",
        Theme::verdict(result.allowed, result.requires_approval),
        result.reason
    );
    println!("  {}", Theme::kv("risk", &Theme::risk_level(result.risk)));
    if let Some(duration) = result.suggested_duration {
        println!("  {}", Theme::kv("suggested", duration.as_str()));
    }
    if let Some(grant) = &result.permission {
        println!(
            "  {}",
            Theme::kv(
                "grant",
                &format!("{} ({}, used {})", Theme::short_id(&grant.id.to_string()), grant.duration, grant.usage_count)
            )
        );
    }
    if result.requires_approval {
        println!("{}", Theme::dimmed("  rerun with --interactive to answer the prompt"));
    }
    Ok(())
}
