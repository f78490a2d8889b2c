//! Audit entry types.
//!
//! Every terminal permission decision is recorded as an audit entry.
//! Intermediate states (an approval still pending) are never recorded.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use warden_core::{Action, Scope, Timestamp};

/// Unique identifier for an audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditEntryId(pub Uuid);

impl AuditEntryId {
    /// Create a new random entry ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AuditEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AuditEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "audit:{}", self.0)
    }
}

/// The terminal result being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// The operation was allowed.
    Granted,
    /// The operation was refused.
    Denied,
    /// A stored grant was withdrawn.
    Revoked,
    /// A stored grant lapsed and was evicted.
    Expired,
}

impl AuditOutcome {
    /// Severity used when the entry is forwarded as a log record.
    #[must_use]
    pub fn severity(&self) -> AuditSeverity {
        match self {
            Self::Granted | Self::Revoked | Self::Expired => AuditSeverity::Info,
            Self::Denied => AuditSeverity::Warning,
        }
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Granted => write!(f, "granted"),
            Self::Denied => write!(f, "denied"),
            Self::Revoked => write!(f, "revoked"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Severity attached to an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    /// Routine decision.
    Info,
    /// Refusal worth an operator's attention.
    Warning,
}

impl fmt::Display for AuditSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Unique entry identifier.
    pub id: AuditEntryId,
    /// When this entry was created.
    pub timestamp: Timestamp,
    /// Grant or approval-request id this decision concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_id: Option<String>,
    /// Scope of the operation.
    pub scope: Scope,
    /// Action within the scope.
    pub action: Action,
    /// Resource the operation targeted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Tool that asked for the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// The recorded result.
    #[serde(rename = "result")]
    pub outcome: AuditOutcome,
    /// Why this result was reached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Caller-supplied context string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl AuditEntry {
    /// Create a new entry stamped with the current time.
    #[must_use]
    pub fn new(scope: Scope, action: Action, outcome: AuditOutcome) -> Self {
        Self {
            id: AuditEntryId::new(),
            timestamp: Timestamp::now(),
            permission_id: None,
            scope,
            action,
            resource: None,
            tool_name: None,
            outcome,
            reason: None,
            context: None,
        }
    }

    /// Attach the grant or request id.
    #[must_use]
    pub fn with_permission_id(mut self, id: impl Into<String>) -> Self {
        self.permission_id = Some(id.into());
        self
    }

    /// Attach the targeted resource.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Attach an optional resource.
    #[must_use]
    pub fn with_resource_opt(mut self, resource: Option<&str>) -> Self {
        self.resource = resource.map(str::to_owned);
        self
    }

    /// Attach the tool name.
    #[must_use]
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool_name = Some(tool.into());
        self
    }

    /// Attach an optional tool name.
    #[must_use]
    pub fn with_tool_opt(mut self, tool: Option<&str>) -> Self {
        self.tool_name = tool.map(str::to_owned);
        self
    }

    /// Attach the reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attach an optional caller context.
    #[must_use]
    pub fn with_context_opt(mut self, context: Option<&str>) -> Self {
        self.context = context.map(str::to_owned);
        self
    }

    /// Category under which a log-oriented sink files this entry.
    #[must_use]
    pub fn category(&self) -> &'static str {
        self.scope.as_str()
    }

    /// Severity derived from the outcome.
    #[must_use]
    pub fn severity(&self) -> AuditSeverity {
        self.outcome.severity()
    }

    /// One-line human-readable summary.
    #[must_use]
    pub fn message(&self) -> String {
        let mut msg = format!("{} {}:{}", self.outcome, self.scope, self.action);
        if let Some(resource) = &self.resource {
            msg.push_str(" on ");
            msg.push_str(resource);
        }
        if let Some(tool) = &self.tool_name {
            msg.push_str(" (tool ");
            msg.push_str(tool);
            msg.push(')');
        }
        if let Some(reason) = &self.reason {
            msg.push_str(": ");
            msg.push_str(reason);
        }
        msg
    }
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp, self.message())
    }
}
