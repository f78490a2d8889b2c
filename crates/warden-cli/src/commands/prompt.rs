//! Terminal approval frontend.
//!
//! Subscribes to the controller's approval events and answers each request
//! with a `dialoguer` prompt on a blocking thread.

use std::sync::Arc;

use anyhow::Result;
use dialoguer::{Input, Select, theme::ColorfulTheme};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use warden_approval::{
    ApprovalEvent, ApprovalRequest, ApprovalResponse, GrantDuration, PermissionController,
};

use crate::theme::Theme;

/// Choices offered for every request, in display order.
const CHOICES: &[(&str, Option<(bool, GrantDuration)>)] = &[
    ("Allow once", Some((true, GrantDuration::Once))),
    ("Allow for this session", Some((true, GrantDuration::Session))),
    ("Allow for an hour", Some((true, GrantDuration::Hour))),
    ("Always allow", Some((true, GrantDuration::Permanent))),
    ("Deny once", Some((false, GrantDuration::Once))),
    ("Always deny", Some((false, GrantDuration::Permanent))),
    ("Dismiss", None),
];

/// Start answering approval requests from the terminal.
///
/// The subscription is taken before returning so requests raised right after
/// this call are seen.
pub(crate) fn spawn_prompter(controller: &Arc<PermissionController>) -> JoinHandle<()> {
    let mut events = controller.subscribe();
    let controller = Arc::clone(controller);

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let ApprovalEvent::Requested(request) = event.as_ref() else {
                continue;
            };
            let id = request.id.clone();
            let request = request.clone();

            let answer = tokio::task::spawn_blocking(move || ask(&request)).await;
            let outcome = match answer {
                Ok(Ok(Some(response))) => controller.respond_to_approval(&id, response).map(|_| ()),
                Ok(Ok(None)) => controller.cancel_request(&id),
                Ok(Err(e)) => {
                    warn!(error = %e, "approval prompt failed");
                    controller.cancel_request(&id)
                },
                Err(e) => {
                    warn!(error = %e, "approval prompt task failed");
                    controller.cancel_request(&id)
                },
            };
            if let Err(e) = outcome {
                // Already timed out or resolved elsewhere.
                debug!(error = %e, "approval answer not applied");
            }
        }
    })
}

fn ask(request: &ApprovalRequest) -> Result<Option<ApprovalResponse>> {
    let mut content = vec![
        Theme::kv("Tool", &request.tool_name),
        Theme::kv("Permission", &format!("{}:{}", request.scope, request.action)),
        Theme::kv("Risk", &Theme::risk_level(request.risk)),
        Theme::kv("Suggested", request.suggested_duration.as_str()),
    ];
    if let Some(resource) = &request.resource {
        content.insert(1, Theme::kv("Resource", resource));
    }
    if let Some(context) = &request.context {
        content.push(Theme::kv("Context", context));
    }
    content.push(String::new());
    content.push(request.description.clone());

    eprintln!(
        "\n{}",
        Theme::approval_box("Approval Required", &content.join("\n"), request.risk)
    );

    let labels: Vec<&str> = CHOICES.iter().map(|(label, _)| *label).collect();
    let default = CHOICES
        .iter()
        .position(|(_, choice)| *choice == Some((true, request.suggested_duration)))
        .unwrap_or(0);

    let selection = Select::with_theme(&ColorfulTheme::default())
        .items(&labels)
        .default(default)
        .interact()?;

    let Some((approved, duration)) = CHOICES.get(selection).and_then(|(_, choice)| *choice) else {
        return Ok(None);
    };

    let mut response = if approved {
        ApprovalResponse::approve(duration)
    } else {
        ApprovalResponse::deny(duration)
    };
    if !approved {
        let notes = Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt("Reason (optional)")
            .allow_empty(true)
            .interact_text()
            .ok()
            .filter(|s| !s.is_empty());
        if let Some(notes) = notes {
            response = response.with_notes(notes);
        }
    }
    Ok(Some(response))
}
