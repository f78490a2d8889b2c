//! Policy command - show the policy in effect and the tool catalog.

use anyhow::Result;
use colored::Colorize;
use warden_approval::PermissionController;

use super::{OutputFormat, print_json};
use crate::theme::Theme;

fn join<T: ToString>(items: &[T]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    }
}

/// Print the effective policy.
pub(crate) fn show(controller: &PermissionController, format: OutputFormat) -> Result<()> {
    let policy = controller.policy();
    if format == OutputFormat::Json {
        return print_json(&policy);
    }

    println!("\n{}", Theme::header("Policy"));
    println!("{}", Theme::separator());
    println!("{}", Theme::kv("default decision", &policy.default_decision.to_string()));
    println!("{}", Theme::kv("auto-approve safe", &policy.auto_approve_safe.to_string()));
    println!(
        "{}",
        Theme::kv("auto-approve duration", policy.max_auto_approve_duration.as_str())
    );
    println!("{}", Theme::kv("always prompt scopes", &join(&policy.always_prompt_scopes)));
    println!("{}", Theme::kv("always prompt risks", &join(&policy.always_prompt_risks)));
    println!("{}", Theme::kv("blocked scopes", &join(&policy.blocked_scopes)));
    println!(
        "{}",
        Theme::kv(
            "approval timeout",
            &format!("{} ms ({} on timeout)", policy.approval_timeout_ms, policy.timeout_decision)
        )
    );
    println!(
        "{}",
        Theme::kv("contextual grants", &policy.enable_contextual_permissions.to_string())
    );
    println!(
        "{}",
        Theme::kv("grant capacity", &policy.max_cached_permissions.to_string())
    );
    println!();
    Ok(())
}

/// Print the tool catalog.
pub(crate) fn tools(controller: &PermissionController, format: OutputFormat) -> Result<()> {
    let entries = controller.catalog().tools();
    if format == OutputFormat::Json {
        return print_json(&entries);
    }

    println!("\n{}", Theme::header("Tool Catalog"));
    println!(
        "{:<22} {:<22} {:<10} {}",
        "TOOL".dimmed(),
        "PERMISSION".dimmed(),
        "RISK".dimmed(),
        "FLAGS".dimmed()
    );
    println!("{}", Theme::separator());
    for req in &entries {
        let mut flags = Vec::new();
        if req.requires_explicit_approval {
            flags.push("explicit");
        }
        if req.default_deny {
            flags.push("default-deny");
        }
        println!(
            "{:<22} {:<22} {:<10} {}",
            req.tool_name,
            format!("{}:{}", req.scope, req.action),
            Theme::risk_level(req.risk),
            Theme::dimmed(&flags.join(" "))
        );
    }
    println!();
    Ok(())
}
