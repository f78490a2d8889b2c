//! Approval request and response types.
//!
//! A request exists only while a decision is pending and is never persisted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;
use warden_core::{Action, RiskLevel, Scope, Timestamp};

use crate::error::ApprovalError;
use crate::grant::GrantDuration;
use crate::policy::TimeoutDecision;

/// Unique identifier for an approval request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Create a new random request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req:{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("req:").unwrap_or(s);
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| ApprovalError::UnknownRequest { id: s.to_string() })
    }
}

/// A decision waiting on a human.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    /// Request id, never reused.
    pub id: RequestId,
    /// Scope.
    pub scope: Scope,
    /// Action.
    pub action: Action,
    /// Resource, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Tool asking.
    pub tool_name: String,
    /// Assessed risk.
    pub risk: RiskLevel,
    /// What the tool wants to do.
    pub description: String,
    /// Caller context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Duration a human would most likely pick.
    pub suggested_duration: GrantDuration,
    /// When the request was created.
    pub timestamp: Timestamp,
    /// How long it waits for an answer.
    pub timeout_ms: u64,
}

impl ApprovalRequest {
    /// A request with a fresh id and the current time.
    #[must_use]
    pub fn new(
        scope: Scope,
        action: Action,
        tool_name: impl Into<String>,
        risk: RiskLevel,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: RequestId::new(),
            scope,
            action,
            resource: None,
            tool_name: tool_name.into(),
            risk,
            description: description.into(),
            context: None,
            suggested_duration: GrantDuration::Once,
            timestamp: Timestamp::now(),
            timeout_ms: 60_000,
        }
    }

    /// Set the resource.
    #[must_use]
    pub fn with_resource_opt(mut self, resource: Option<&str>) -> Self {
        self.resource = resource.map(str::to_string);
        self
    }

    /// Set the caller context.
    #[must_use]
    pub fn with_context_opt(mut self, context: Option<&str>) -> Self {
        self.context = context.map(str::to_string);
        self
    }

    /// Set the suggested duration.
    #[must_use]
    pub fn with_suggested_duration(mut self, duration: GrantDuration) -> Self {
        self.suggested_duration = duration;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// The timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// A human's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResponse {
    /// Allow or refuse.
    pub approved: bool,
    /// How long the answer should be remembered.
    pub duration: GrantDuration,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ApprovalResponse {
    /// Approve, remembered for `duration`.
    #[must_use]
    pub fn approve(duration: GrantDuration) -> Self {
        Self {
            approved: true,
            duration,
            notes: None,
        }
    }

    /// Refuse, remembered for `duration`.
    #[must_use]
    pub fn deny(duration: GrantDuration) -> Self {
        Self {
            approved: false,
            duration,
            notes: None,
        }
    }

    /// Attach notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// How a pending request ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApprovalResolution {
    /// A human approved.
    Approved {
        /// Remember for.
        duration: GrantDuration,
        /// Notes.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },
    /// A human refused.
    Denied {
        /// Remember for.
        duration: GrantDuration,
        /// Notes.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },
    /// Nobody answered in time, or no channel could deliver the request.
    TimedOut {
        /// The configured outcome.
        decision: TimeoutDecision,
    },
    /// Cancelled before an answer.
    Cancelled,
}

impl ApprovalResolution {
    /// Whether the caller may proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(
            self,
            Self::Approved { .. }
                | Self::TimedOut {
                    decision: TimeoutDecision::Allow
                }
        )
    }
}

impl From<ApprovalResponse> for ApprovalResolution {
    fn from(response: ApprovalResponse) -> Self {
        if response.approved {
            Self::Approved {
                duration: response.duration,
                notes: response.notes,
            }
        } else {
            Self::Denied {
                duration: response.duration,
                notes: response.notes,
            }
        }
    }
}

impl fmt::Display for ApprovalResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved { duration, .. } => write!(f, "approved ({duration})"),
            Self::Denied { duration, .. } => write!(f, "denied ({duration})"),
            Self::TimedOut { decision } => write!(f, "timeout ({decision})"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
