//! Grants command - list, add, and revoke remembered decisions.

use anyhow::{Result, bail};
use colored::Colorize;
use warden_approval::{Grant, GrantDuration, GrantId, GrantRequest, GrantState, PermissionController};
use warden_core::{Action, Scope};

use super::{OutputFormat, print_json};
use crate::theme::Theme;

/// List stored grants.
pub(crate) fn list(controller: &PermissionController, format: OutputFormat) -> Result<()> {
    let grants = controller.grants().list();
    if format == OutputFormat::Json {
        return print_json(&grants);
    }

    if grants.is_empty() {
        println!("{}", Theme::info("No stored grants"));
        return Ok(());
    }

    println!("\n{}", Theme::header("Grants"));
    println!(
        "{:<10} {:<6} {:<22} {:<10} {:<8} {}",
        "ID".dimmed(),
        "STATE".dimmed(),
        "PERMISSION".dimmed(),
        "DURATION".dimmed(),
        "USES".dimmed(),
        "RESOURCE".dimmed()
    );
    println!("{}", Theme::separator());
    for grant in &grants {
        print_grant(grant);
    }

    let stats = controller.grants().stats();
    println!(
        "\n{}",
        Theme::dimmed(&format!(
            "{} total, {} granted, {} denied, {} persistent",
            stats.total, stats.granted, stats.denied, stats.persistent
        ))
    );
    Ok(())
}

fn print_grant(grant: &Grant) {
    let state = match grant.state {
        GrantState::Granted => "allow".green().to_string(),
        GrantState::Denied => "deny".red().to_string(),
    };
    let resource = grant
        .resource
        .as_deref()
        .or(grant.resource_pattern.as_deref())
        .unwrap_or("*");
    println!(
        "{:<10} {:<6} {:<22} {:<10} {:<8} {}",
        Theme::short_id(&grant.id.to_string()),
        state,
        format!("{}:{}", grant.scope, grant.action),
        grant.duration.as_str(),
        grant.usage_count,
        resource
    );
}

/// Options for `grants add`.
pub(crate) struct AddGrant<'a> {
    pub(crate) scope: &'a str,
    pub(crate) action: &'a str,
    pub(crate) resource: Option<&'a str>,
    pub(crate) pattern: Option<&'a str>,
    pub(crate) tool: Option<&'a str>,
    pub(crate) duration: &'a str,
    pub(crate) deny: bool,
    pub(crate) notes: Option<String>,
}

/// Record a grant or denial by hand.
pub(crate) fn add(controller: &PermissionController, opts: AddGrant<'_>, format: OutputFormat) -> Result<()> {
    let duration = opts.duration.parse::<GrantDuration>()?;
    let state = if opts.deny {
        GrantState::Denied
    } else {
        GrantState::Granted
    };
    let mut request = GrantRequest::new(opts.scope.parse::<Scope>()?, opts.action.parse::<Action>()?, state)
        .with_resource_opt(opts.resource)
        .with_tool_opt(opts.tool)
        .with_duration(duration)
        .with_notes_opt(opts.notes);
    if let Some(pattern) = opts.pattern {
        request = request.with_resource_pattern(pattern);
    }

    let grant = if opts.deny {
        controller.deny_permission(request)?
    } else {
        controller.grant_permission(request)?
    };

    if format == OutputFormat::Json {
        return print_json(&grant);
    }
    println!(
        "{}",
        Theme::success(&format!(
            "{} {}:{} for {} ({})",
            if opts.deny { "Denied" } else { "Granted" },
            grant.scope,
            grant.action,
            grant.duration,
            grant.id
        ))
    );
    Ok(())
}

/// Revoke one grant by id.
pub(crate) fn revoke(controller: &PermissionController, id: &str) -> Result<()> {
    let id = id.parse::<GrantId>()?;
    match controller.revoke(&id) {
        Some(grant) => {
            println!(
                "{}",
                Theme::success(&format!("Revoked {}:{} ({id})", grant.scope, grant.action))
            );
            Ok(())
        },
        None => bail!("no grant with id {id}"),
    }
}

/// Revoke every grant for a scope.
pub(crate) fn revoke_scope(controller: &PermissionController, scope: &str) -> Result<()> {
    let scope = scope.parse::<Scope>()?;
    let removed = controller.revoke_by_scope(scope);
    println!(
        "{}",
        Theme::success(&format!("Revoked {} grant(s) for scope {scope}", removed.len()))
    );
    Ok(())
}

/// Revoke every grant recorded for a tool.
pub(crate) fn revoke_tool(controller: &PermissionController, tool: &str) -> Result<()> {
    let removed = controller.revoke_by_tool(tool);
    println!(
        "{}",
        Theme::success(&format!("Revoked {} grant(s) for tool {tool}", removed.len()))
    );
    Ok(())
}

/// Clear session grants, or everything with `all`.
pub(crate) fn clear(controller: &PermissionController, all: bool) -> Result<()> {
    let removed = if all {
        controller.clear_all()
    } else {
        controller.clear_session()
    };
    let what = if all { "grant(s)" } else { "session grant(s)" };
    println!("{}", Theme::success(&format!("Cleared {} {what}", removed.len())));
    Ok(())
}
