//! Grants - cached allow/deny decisions with duration-based expiry.
//!
//! A [`Grant`] records that an operation identified by scope + action
//! (+ resource, + context) was allowed or refused, for how long, and by whom.
//! The [`GrantStore`] owns every grant; [`GrantFile`] persists the durable
//! subset to disk.

mod persist;
mod store;

pub use persist::{GrantFile, PersistedState};
pub use store::{GrantLookup, GrantQuery, GrantStats, GrantStore};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use warden_core::{Action, RiskLevel, Scope, Timestamp};

use crate::error::ApprovalError;

/// Seconds a `once` grant stays usable if nobody consumes it.
pub const ONCE_VALIDITY_SECS: i64 = 60;

/// Unique identifier for a grant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrantId(pub Uuid);

impl GrantId {
    /// Create a new random grant ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GrantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GrantId {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| ApprovalError::Internal(format!("invalid grant id '{s}': {e}")))
    }
}

/// Whether a grant allows or refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantState {
    /// The operation may proceed.
    Granted,
    /// The operation is refused (remembered denial).
    Denied,
}

impl fmt::Display for GrantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Granted => write!(f, "granted"),
            Self::Denied => write!(f, "denied"),
        }
    }
}

/// How long a grant lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantDuration {
    /// One successful check, then gone.
    Once,
    /// Until the process exits. Never written to disk.
    Session,
    /// One hour.
    Hour,
    /// One day.
    Day,
    /// One week.
    Week,
    /// No expiry.
    Permanent,
}

impl GrantDuration {
    /// Every duration, shortest first.
    pub const ALL: &'static [Self] = &[
        Self::Once,
        Self::Session,
        Self::Hour,
        Self::Day,
        Self::Week,
        Self::Permanent,
    ];

    /// The canonical lowercase spelling.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Session => "session",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Permanent => "permanent",
        }
    }

    /// Expiry for a grant created at `granted_at`.
    #[must_use]
    pub fn expires_at(&self, granted_at: Timestamp) -> Option<Timestamp> {
        let offset = match self {
            Self::Once => Duration::seconds(ONCE_VALIDITY_SECS),
            Self::Hour => Duration::hours(1),
            Self::Day => Duration::days(1),
            Self::Week => Duration::weeks(1),
            Self::Session | Self::Permanent => return None,
        };
        Some(granted_at.plus(offset))
    }

    /// Whether grants with this duration are written to disk.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        !matches!(self, Self::Once | Self::Session)
    }
}

impl fmt::Display for GrantDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantDuration {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == needle)
            .ok_or_else(|| ApprovalError::Internal(format!("unknown grant duration '{s}'")))
    }
}

/// Who created a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantedBy {
    /// A human, through an approval prompt or an explicit grant call.
    User,
    /// The engine itself (auto-approval of safe operations).
    System,
    /// A policy rule.
    Policy,
}

impl fmt::Display for GrantedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::System => write!(f, "system"),
            Self::Policy => write!(f, "policy"),
        }
    }
}

/// A cached permission decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    /// Unique identifier.
    pub id: GrantId,
    /// Scope the grant covers.
    pub scope: Scope,
    /// Action the grant covers.
    pub action: Action,
    /// Exact resource, if the grant is limited to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Regex the resource must match, if the grant covers a family.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_pattern: Option<String>,
    /// Allow or refuse.
    pub state: GrantState,
    /// Risk of the operation when the grant was made.
    pub risk: RiskLevel,
    /// When the grant was made.
    pub granted_at: Timestamp,
    /// When the grant stops applying.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
    /// Lifetime class.
    pub duration: GrantDuration,
    /// Who made it.
    pub granted_by: GrantedBy,
    /// Tool that asked, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Number of checks this grant has answered.
    #[serde(default)]
    pub usage_count: u64,
    /// Last time it answered a check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<Timestamp>,
    /// Caller context the grant is limited to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Free-form notes from the approver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Grant {
    /// Whether the grant has expired as of now.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|t| t.is_past())
    }

    /// Whether the grant allows.
    #[must_use]
    pub fn is_granted(&self) -> bool {
        self.state == GrantState::Granted
    }

    /// 2 for a literal resource, 1 for a pattern, 0 for scope-wide.
    #[must_use]
    pub fn specificity(&self) -> u8 {
        if self.resource.is_some() {
            2
        } else if self.resource_pattern.is_some() {
            1
        } else {
            0
        }
    }

    /// Whether `other` would occupy the same cache slot.
    #[must_use]
    pub fn same_key(&self, other: &Self) -> bool {
        self.scope == other.scope
            && self.action == other.action
            && self.resource == other.resource
            && self.resource_pattern == other.resource_pattern
            && self.context == other.context
    }

    /// Timestamp used for least-recently-used eviction.
    #[must_use]
    pub fn recency(&self) -> Timestamp {
        self.last_used.unwrap_or(self.granted_at)
    }
}

/// Parameters for creating a grant.
///
/// ```
/// use warden_approval::{GrantDuration, GrantRequest, GrantState};
/// use warden_core::{Action, Scope};
///
/// let req = GrantRequest::new(Scope::File, Action::Read, GrantState::Granted)
///     .with_resource_pattern("^/home/me/notes/")
///     .with_duration(GrantDuration::Day);
/// assert_eq!(req.duration, GrantDuration::Day);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GrantRequest {
    /// Scope to cover.
    pub scope: Scope,
    /// Action to cover.
    pub action: Action,
    /// Allow or refuse.
    pub state: GrantState,
    /// Exact resource.
    pub resource: Option<String>,
    /// Resource regex.
    pub resource_pattern: Option<String>,
    /// Lifetime class. Defaults to `session`.
    pub duration: GrantDuration,
    /// Who is making the grant. Defaults to `user`.
    pub granted_by: GrantedBy,
    /// Risk to record. Defaults to `medium`.
    pub risk: RiskLevel,
    /// Tool name to record.
    pub tool_name: Option<String>,
    /// Caller context to bind the grant to.
    pub context: Option<String>,
    /// Approver notes.
    pub notes: Option<String>,
}

impl GrantRequest {
    /// Start a request for `scope`/`action` in the given state.
    #[must_use]
    pub fn new(scope: Scope, action: Action, state: GrantState) -> Self {
        Self {
            scope,
            action,
            state,
            resource: None,
            resource_pattern: None,
            duration: GrantDuration::Session,
            granted_by: GrantedBy::User,
            risk: RiskLevel::Medium,
            tool_name: None,
            context: None,
            notes: None,
        }
    }

    /// Limit to one exact resource.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Limit to one exact resource, if given.
    #[must_use]
    pub fn with_resource_opt(mut self, resource: Option<&str>) -> Self {
        self.resource = resource.map(str::to_owned);
        self
    }

    /// Limit to resources matching a regex.
    #[must_use]
    pub fn with_resource_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.resource_pattern = Some(pattern.into());
        self
    }

    /// Set the lifetime.
    #[must_use]
    pub fn with_duration(mut self, duration: GrantDuration) -> Self {
        self.duration = duration;
        self
    }

    /// Set who is granting.
    #[must_use]
    pub fn granted_by(mut self, by: GrantedBy) -> Self {
        self.granted_by = by;
        self
    }

    /// Set the recorded risk.
    #[must_use]
    pub fn with_risk(mut self, risk: RiskLevel) -> Self {
        self.risk = risk;
        self
    }

    /// Record the tool name.
    #[must_use]
    pub fn with_tool_opt(mut self, tool: Option<&str>) -> Self {
        self.tool_name = tool.map(str::to_owned);
        self
    }

    /// Bind to a caller context.
    #[must_use]
    pub fn with_context_opt(mut self, context: Option<&str>) -> Self {
        self.context = context.map(str::to_owned);
        self
    }

    /// Attach approver notes.
    #[must_use]
    pub fn with_notes_opt(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Materialize the grant, stamped now.
    #[must_use]
    pub(crate) fn into_grant(self) -> Grant {
        let granted_at = Timestamp::now();
        Grant {
            id: GrantId::new(),
            scope: self.scope,
            action: self.action,
            resource: self.resource,
            resource_pattern: self.resource_pattern,
            state: self.state,
            risk: self.risk,
            granted_at,
            expires_at: self.duration.expires_at(granted_at),
            duration: self.duration,
            granted_by: self.granted_by,
            tool_name: self.tool_name,
            usage_count: 0,
            last_used: None,
            context: self.context,
            notes: self.notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_expiry() {
        let now = Timestamp::now();
        assert!(GrantDuration::Session.expires_at(now).is_none());
        assert!(GrantDuration::Permanent.expires_at(now).is_none());
        assert_eq!(
            GrantDuration::Hour.expires_at(now),
            Some(now.plus(Duration::hours(1)))
        );
        assert_eq!(
            GrantDuration::Once.expires_at(now),
            Some(now.plus(Duration::seconds(ONCE_VALIDITY_SECS)))
        );
    }

    #[test]
    fn test_duration_persistence_class() {
        assert!(!GrantDuration::Once.is_persistent());
        assert!(!GrantDuration::Session.is_persistent());
        assert!(GrantDuration::Hour.is_persistent());
        assert!(GrantDuration::Permanent.is_persistent());
    }

    #[test]
    fn test_duration_parse() {
        assert_eq!("Week".parse::<GrantDuration>().unwrap(), GrantDuration::Week);
        assert!("fortnight".parse::<GrantDuration>().is_err());
    }

    #[test]
    fn test_specificity_and_key() {
        let scope_wide = GrantRequest::new(Scope::File, Action::Read, GrantState::Granted).into_grant();
        let pattern = GrantRequest::new(Scope::File, Action::Read, GrantState::Granted)
            .with_resource_pattern("^/tmp/")
            .into_grant();
        let literal = GrantRequest::new(Scope::File, Action::Read, GrantState::Denied)
            .with_resource("/tmp/a")
            .into_grant();
        assert_eq!(scope_wide.specificity(), 0);
        assert_eq!(pattern.specificity(), 1);
        assert_eq!(literal.specificity(), 2);
        assert!(!scope_wide.same_key(&pattern));

        let reversal = GrantRequest::new(Scope::File, Action::Read, GrantState::Granted)
            .with_resource("/tmp/a")
            .into_grant();
        assert!(literal.same_key(&reversal));
    }

    #[test]
    fn test_grant_serializes_camel_case() {
        let grant = GrantRequest::new(Scope::Git, Action::Push, GrantState::Granted)
            .with_duration(GrantDuration::Day)
            .with_tool_opt(Some("git_push"))
            .into_grant();
        let json = serde_json::to_value(&grant).unwrap();
        assert_eq!(json["grantedBy"], "user");
        assert_eq!(json["toolName"], "git_push");
        assert_eq!(json["duration"], "day");
        assert!(json.get("expiresAt").is_some());
        assert!(json.get("resourcePattern").is_none());
    }
}
