//! Decision policy.
//!
//! The [`Policy`] holds the thresholds every decision reads: blocked scopes,
//! auto-approval of safe operations, which scopes and risks always go to a
//! human, and what happens when nobody answers. It is only changed through
//! an explicit update on the controller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use warden_core::{Action, RiskLevel, Scope};

use crate::error::ApprovalError;
use crate::grant::GrantDuration;

/// What to do when no rule decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultDecision {
    /// Refuse.
    Deny,
    /// Ask a human.
    Prompt,
}

/// What an unanswered approval resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutDecision {
    /// Refuse.
    Deny,
    /// Allow.
    Allow,
}

impl fmt::Display for DefaultDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deny => write!(f, "deny"),
            Self::Prompt => write!(f, "prompt"),
        }
    }
}

impl fmt::Display for TimeoutDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deny => write!(f, "deny"),
            Self::Allow => write!(f, "allow"),
        }
    }
}

impl FromStr for DefaultDecision {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deny" => Ok(Self::Deny),
            "prompt" => Ok(Self::Prompt),
            other => Err(ApprovalError::Internal(format!(
                "unknown default decision '{other}'"
            ))),
        }
    }
}

impl FromStr for TimeoutDecision {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deny" => Ok(Self::Deny),
            "allow" => Ok(Self::Allow),
            other => Err(ApprovalError::Internal(format!(
                "unknown timeout decision '{other}'"
            ))),
        }
    }
}

/// Decision policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Policy {
    /// Outcome when no rule decides.
    pub default_decision: DefaultDecision,
    /// Allow `safe` operations without asking.
    pub auto_approve_safe: bool,
    /// Duration stamped on automatic grants.
    pub max_auto_approve_duration: GrantDuration,
    /// Scopes that always go to a human.
    pub always_prompt_scopes: Vec<Scope>,
    /// Risks that always go to a human.
    pub always_prompt_risks: Vec<RiskLevel>,
    /// Scopes that are never allowed.
    pub blocked_scopes: Vec<Scope>,
    /// How long a pending approval waits.
    pub approval_timeout_ms: u64,
    /// Outcome when an approval times out.
    pub timeout_decision: TimeoutDecision,
    /// Match grants on caller context.
    pub enable_contextual_permissions: bool,
    /// Upper bound on cached grants.
    pub max_cached_permissions: usize,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            default_decision: DefaultDecision::Prompt,
            auto_approve_safe: true,
            max_auto_approve_duration: GrantDuration::Session,
            always_prompt_scopes: Vec::new(),
            always_prompt_risks: vec![RiskLevel::High, RiskLevel::Critical],
            blocked_scopes: Vec::new(),
            approval_timeout_ms: 60_000,
            timeout_decision: TimeoutDecision::Deny,
            enable_contextual_permissions: true,
            max_cached_permissions: 1000,
        }
    }
}

impl Policy {
    /// The approval timeout as a [`Duration`].
    #[must_use]
    pub fn approval_timeout(&self) -> Duration {
        Duration::from_millis(self.approval_timeout_ms)
    }

    /// Whether `scope` is blocked outright.
    #[must_use]
    pub fn is_blocked(&self, scope: Scope) -> bool {
        self.blocked_scopes.contains(&scope)
    }

    /// Whether policy alone forces a prompt for this scope and risk.
    #[must_use]
    pub fn always_prompts(&self, scope: Scope, risk: RiskLevel) -> bool {
        self.always_prompt_scopes.contains(&scope) || self.always_prompt_risks.contains(&risk)
    }
}

/// Risk for an operation with no catalog entry.
#[must_use]
pub fn infer_risk(scope: Scope, action: Action) -> RiskLevel {
    if matches!(scope, Scope::System | Scope::Registry | Scope::Process) {
        return RiskLevel::Critical;
    }
    match action {
        Action::Delete | Action::Remove | Action::Kill => RiskLevel::High,
        Action::Write | Action::Modify | Action::Create | Action::Push => RiskLevel::Medium,
        Action::Read | Action::List | Action::Info | Action::Status => RiskLevel::Low,
        _ => RiskLevel::Medium,
    }
}

/// Grant duration offered to a human for an operation of this risk.
#[must_use]
pub fn suggested_duration(risk: RiskLevel) -> GrantDuration {
    match risk {
        RiskLevel::Safe => GrantDuration::Permanent,
        RiskLevel::Low | RiskLevel::Medium => GrantDuration::Session,
        RiskLevel::High | RiskLevel::Critical | RiskLevel::Blocked => GrantDuration::Once,
    }
}
