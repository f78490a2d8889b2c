//! Tool permission catalog.
//!
//! Maps a tool name to the scope, action, and inherent risk it needs. The
//! table is loaded once at startup and may be extended at runtime; entries
//! are replaced, never mutated in place.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, warn};
use warden_core::{Action, RiskLevel, Scope};

use crate::error::{ApprovalError, ApprovalResult};

/// What a tool needs before it may run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequirement {
    /// Unique tool name.
    pub tool_name: String,
    /// Scope touched.
    pub scope: Scope,
    /// Action performed.
    pub action: Action,
    /// Inherent risk.
    pub risk: RiskLevel,
    /// Human-readable summary.
    pub description: String,
    /// Always ask a human, whatever the policy says.
    #[serde(default)]
    pub requires_explicit_approval: bool,
    /// Never allow without a grant or an approval.
    #[serde(default)]
    pub default_deny: bool,
    /// Regex describing the resources this tool targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_pattern: Option<String>,
}

impl PermissionRequirement {
    /// A requirement with no approval flags.
    #[must_use]
    pub fn new(
        tool_name: impl Into<String>,
        scope: Scope,
        action: Action,
        risk: RiskLevel,
        description: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            scope,
            action,
            risk,
            description: description.into(),
            requires_explicit_approval: false,
            default_deny: false,
            resource_pattern: None,
        }
    }

    /// Mark as always requiring a human.
    #[must_use]
    pub fn explicit(mut self) -> Self {
        self.requires_explicit_approval = true;
        self
    }

    /// Mark as denied unless granted.
    #[must_use]
    pub fn default_deny(mut self) -> Self {
        self.default_deny = true;
        self
    }

    /// Set the resource pattern.
    #[must_use]
    pub fn with_resource_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.resource_pattern = Some(pattern.into());
        self
    }
}

/// Built-in tool table.
fn builtin() -> Vec<PermissionRequirement> {
    use Action as A;
    use RiskLevel as R;
    use Scope as S;

    let req = PermissionRequirement::new;
    vec![
        req("file_read", S::File, A::Read, R::Low, "Read a file"),
        req("file_list", S::File, A::List, R::Safe, "List a directory"),
        req("file_info", S::File, A::Info, R::Safe, "Read file metadata"),
        req("file_write", S::File, A::Write, R::Medium, "Write a file"),
        req("file_delete", S::File, A::Delete, R::High, "Delete a file").explicit(),
        req("terminal_execute", S::Terminal, A::Execute, R::High, "Run a shell command").explicit(),
        req("browser_navigate", S::Browser, A::Navigate, R::Medium, "Open a URL in the browser"),
        req("browser_click", S::Browser, A::Click, R::Medium, "Click a page element"),
        req("browser_type", S::Browser, A::Type, R::Medium, "Type into a page element"),
        req("browser_screenshot", S::Browser, A::Screenshot, R::Low, "Capture the browser viewport"),
        req("clipboard_read", S::Clipboard, A::Read, R::Medium, "Read the clipboard"),
        req("clipboard_write", S::Clipboard, A::Write, R::Low, "Write the clipboard"),
        req("network_request", S::Network, A::Request, R::Medium, "Make an HTTP request"),
        req("network_download", S::Network, A::Download, R::Medium, "Download a file"),
        req("git_status", S::Git, A::Status, R::Safe, "Show repository status"),
        req("git_diff", S::Git, A::Read, R::Safe, "Show repository changes"),
        req("git_commit", S::Git, A::Commit, R::Medium, "Record a commit"),
        req("git_push", S::Git, A::Push, R::High, "Push to a remote").explicit(),
        req("process_list", S::Process, A::List, R::Low, "List running processes"),
        req("process_kill", S::Process, A::Kill, R::Critical, "Terminate a process")
            .explicit()
            .default_deny(),
        req("system_shutdown", S::System, A::Execute, R::Critical, "Shut down or restart the machine")
            .explicit()
            .default_deny(),
        req("registry_write", S::Registry, A::Write, R::Critical, "Change a system setting")
            .explicit()
            .default_deny(),
        req("screen_capture", S::Screen, A::Screenshot, R::Medium, "Capture the screen"),
        req("api_call", S::Api, A::Request, R::Medium, "Call a third-party API"),
        req("notification_send", S::Notification, A::Create, R::Safe, "Show a desktop notification"),
    ]
}

/// Tool name → requirement table.
pub struct PermissionCatalog {
    entries: RwLock<HashMap<String, PermissionRequirement>>,
}

impl PermissionCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The built-in tool table.
    #[must_use]
    pub fn with_defaults() -> Self {
        let catalog = Self::new();
        for requirement in builtin() {
            catalog.add(requirement);
        }
        catalog
    }

    /// Requirement for `tool_name`.
    #[must_use]
    pub fn lookup(&self, tool_name: &str) -> Option<PermissionRequirement> {
        self.entries
            .read()
            .unwrap_or_else(|e| {
                warn!("PermissionCatalog lock poisoned, recovering");
                e.into_inner()
            })
            .get(tool_name)
            .cloned()
    }

    /// Requirement for `tool_name`, for callers that refuse uncatalogued tools.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::UnknownTool`] if the tool is not in the catalog.
    pub fn require(&self, tool_name: &str) -> ApprovalResult<PermissionRequirement> {
        self.lookup(tool_name).ok_or_else(|| ApprovalError::UnknownTool {
            tool: tool_name.to_string(),
        })
    }

    /// Add or replace a requirement. Returns `true` if the tool was new.
    pub fn add(&self, requirement: PermissionRequirement) -> bool {
        debug!(tool = %requirement.tool_name, scope = %requirement.scope, "catalog entry added");
        self.entries
            .write()
            .unwrap_or_else(|e| {
                warn!("PermissionCatalog lock poisoned, recovering");
                e.into_inner()
            })
            .insert(requirement.tool_name.clone(), requirement)
            .is_none()
    }

    /// Remove a requirement. Returns it if present.
    pub fn remove(&self, tool_name: &str) -> Option<PermissionRequirement> {
        self.entries
            .write()
            .unwrap_or_else(|e| {
                warn!("PermissionCatalog lock poisoned, recovering");
                e.into_inner()
            })
            .remove(tool_name)
    }

    /// Every requirement, sorted by tool name.
    #[must_use]
    pub fn tools(&self) -> Vec<PermissionRequirement> {
        let mut all: Vec<_> = self
            .entries
            .read()
            .unwrap_or_else(|e| {
                warn!("PermissionCatalog lock poisoned, recovering");
                e.into_inner()
            })
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.tool_name.cmp(&b.tool_name));
        all
    }

    /// Number of tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| {
                warn!("PermissionCatalog lock poisoned, recovering");
                e.into_inner()
            })
            .len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PermissionCatalog {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for PermissionCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionCatalog")
            .field("tools", &self.len())
            .finish()
    }
}
