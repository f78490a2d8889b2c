//! Policy evaluator - the decision function.
//!
//! # Decision Order
//!
//! 1. Upstream gate vetoes -> deny
//! 2. Scope is blocked -> deny, risk `blocked`, never cached
//! 3. A matching grant exists -> allow or deny as remembered (expired grants
//!    met on the way are evicted and audited)
//! 4. `auto_approve_safe` and risk is `safe` -> allow, store a system grant
//! 5. Explicit approval, default deny, always-prompt scope or risk -> ask
//! 6. Otherwise the policy default: deny, or ask
//!
//! Unknown tools skip steps 4 and 5 and go straight to the policy default.
//! "Ask" is not a terminal decision and is not audited; the caller runs the
//! approval and hands the resolution back to [`PolicyEvaluator::apply_resolution`].

use serde::Serialize;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};
use warden_audit::{AuditEntry, AuditOutcome, AuditSink};
use warden_core::{Action, RiskLevel, Scope};

use crate::catalog::PermissionCatalog;
use crate::error::ApprovalResult;
use crate::gate::OperationGate;
use crate::grant::{Grant, GrantDuration, GrantQuery, GrantRequest, GrantState, GrantStore, GrantedBy};
use crate::policy::{DefaultDecision, Policy, TimeoutDecision, infer_risk, suggested_duration};
use crate::request::{ApprovalRequest, ApprovalResolution};

/// Fallback scope and action for tools that are not in the catalog and whose
/// name does not spell `scope_action`.
const UNKNOWN_TOOL_SCOPE: Scope = Scope::Api;
const UNKNOWN_TOOL_ACTION: Action = Action::Execute;

/// Everything a decision looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionQuery {
    /// Scope.
    pub scope: Scope,
    /// Action.
    pub action: Action,
    /// Resource, if any.
    pub resource: Option<String>,
    /// Tool name, if any.
    pub tool_name: Option<String>,
    /// Caller context.
    pub context: Option<String>,
    /// Declared risk. Inferred from scope and action when absent.
    pub risk: Option<RiskLevel>,
    /// Human-readable description for approval prompts.
    pub description: Option<String>,
    /// Always ask a human.
    pub requires_explicit: bool,
    /// Never allow without a grant or an approval.
    pub default_deny: bool,
    /// Ask even if policy would not (e.g. command validation asked for it).
    pub force_prompt: bool,
    /// The tool was not found in the catalog.
    pub unknown_tool: bool,
}

impl PermissionQuery {
    /// A bare scope + action query.
    #[must_use]
    pub fn new(scope: Scope, action: Action) -> Self {
        Self {
            scope,
            action,
            resource: None,
            tool_name: None,
            context: None,
            risk: None,
            description: None,
            requires_explicit: false,
            default_deny: false,
            force_prompt: false,
            unknown_tool: false,
        }
    }

    /// Set the resource.
    #[must_use]
    pub fn with_resource_opt(mut self, resource: Option<&str>) -> Self {
        self.resource = resource.map(str::to_string);
        self
    }

    /// Set the tool name.
    #[must_use]
    pub fn with_tool_opt(mut self, tool: Option<&str>) -> Self {
        self.tool_name = tool.map(str::to_string);
        self
    }

    /// Set the caller context.
    #[must_use]
    pub fn with_context_opt(mut self, context: Option<&str>) -> Self {
        self.context = context.map(str::to_string);
        self
    }

    /// Declare the risk.
    #[must_use]
    pub fn with_risk(mut self, risk: RiskLevel) -> Self {
        self.risk = Some(risk);
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Force a prompt.
    #[must_use]
    pub fn force_prompt(mut self, force: bool) -> Self {
        self.force_prompt = force;
        self
    }

    /// Effective risk.
    #[must_use]
    pub fn effective_risk(&self) -> RiskLevel {
        self.risk.unwrap_or_else(|| infer_risk(self.scope, self.action))
    }

    fn grant_query(&self) -> GrantQuery<'_> {
        GrantQuery::new(self.scope, self.action)
            .resource(self.resource.as_deref())
            .context(self.context.as_deref())
    }

    /// Approval request for this query.
    #[must_use]
    pub fn to_approval_request(&self, policy: &Policy) -> ApprovalRequest {
        let risk = self.effective_risk();
        let tool = self
            .tool_name
            .clone()
            .unwrap_or_else(|| format!("{}_{}", self.scope, self.action));
        let description = self
            .description
            .clone()
            .unwrap_or_else(|| format!("{} {}", self.action, self.scope));
        ApprovalRequest::new(self.scope, self.action, tool, risk, description)
            .with_resource_opt(self.resource.as_deref())
            .with_context_opt(self.context.as_deref())
            .with_suggested_duration(suggested_duration(risk))
            .with_timeout(policy.approval_timeout())
    }
}

/// Which rule produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// The upstream gate vetoed.
    Gate,
    /// The scope is blocked.
    BlockedScope,
    /// A remembered grant or denial.
    Grant,
    /// Safe operation approved automatically.
    AutoApproved,
    /// A human must decide.
    RequiresApproval,
    /// The policy default.
    DefaultDecision,
    /// A human (or the timeout rule) decided.
    Approval,
}

/// Result of a permission check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionCheckResult {
    /// Whether the operation may proceed now.
    pub allowed: bool,
    /// Why.
    pub reason: String,
    /// Whether the caller must run an approval.
    pub requires_approval: bool,
    /// Risk of the operation.
    pub risk: RiskLevel,
    /// The grant that decided, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<Grant>,
    /// Duration to offer in an approval prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_duration: Option<GrantDuration>,
    /// Which rule decided.
    pub source: DecisionSource,
}

impl PermissionCheckResult {
    fn allow(reason: impl Into<String>, risk: RiskLevel, source: DecisionSource) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            requires_approval: false,
            risk,
            permission: None,
            suggested_duration: None,
            source,
        }
    }

    fn deny(reason: impl Into<String>, risk: RiskLevel, source: DecisionSource) -> Self {
        Self {
            allowed: false,
            ..Self::allow(reason, risk, source)
        }
    }

    fn ask(reason: impl Into<String>, risk: RiskLevel) -> Self {
        Self {
            allowed: false,
            requires_approval: true,
            suggested_duration: Some(suggested_duration(risk)),
            ..Self::allow(reason, risk, DecisionSource::RequiresApproval)
        }
    }

    fn with_grant(mut self, grant: Option<Grant>) -> Self {
        self.permission = grant;
        self
    }
}

/// The decision function over policy, catalog, grants, and gate.
pub struct PolicyEvaluator {
    policy: Arc<RwLock<Policy>>,
    grants: Arc<GrantStore>,
    catalog: Arc<PermissionCatalog>,
    gate: Arc<dyn OperationGate>,
    audit: Arc<dyn AuditSink>,
}

impl PolicyEvaluator {
    /// Build an evaluator over shared components.
    #[must_use]
    pub fn new(
        policy: Arc<RwLock<Policy>>,
        grants: Arc<GrantStore>,
        catalog: Arc<PermissionCatalog>,
        gate: Arc<dyn OperationGate>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            policy,
            grants,
            catalog,
            gate,
            audit,
        }
    }

    /// Snapshot of the policy in effect.
    #[must_use]
    pub fn policy(&self) -> Policy {
        self.policy
            .read()
            .unwrap_or_else(|e| {
                warn!("Policy lock poisoned, recovering");
                e.into_inner()
            })
            .clone()
    }

    /// Grant store.
    #[must_use]
    pub fn grants(&self) -> &Arc<GrantStore> {
        &self.grants
    }

    /// Build the query for a tool call from the catalog.
    ///
    /// Unknown tools get a scope and action parsed from a `scope_action`
    /// name, or a generic fallback, and are flagged for the default decision.
    #[must_use]
    pub fn query_for_tool(
        &self,
        tool_name: &str,
        resource: Option<&str>,
        context: Option<&str>,
    ) -> PermissionQuery {
        if let Some(req) = self.catalog.lookup(tool_name) {
            let mut query = PermissionQuery::new(req.scope, req.action)
                .with_resource_opt(resource)
                .with_tool_opt(Some(tool_name))
                .with_context_opt(context)
                .with_risk(req.risk)
                .with_description(req.description);
            query.requires_explicit = req.requires_explicit_approval;
            query.default_deny = req.default_deny;
            return query;
        }

        warn!(tool = tool_name, "unknown tool, falling back to default decision");
        let (scope, action) = tool_name
            .split_once('_')
            .and_then(|(s, a)| Some((s.parse::<Scope>().ok()?, a.parse::<Action>().ok()?)))
            .unwrap_or((UNKNOWN_TOOL_SCOPE, UNKNOWN_TOOL_ACTION));
        let mut query = PermissionQuery::new(scope, action)
            .with_resource_opt(resource)
            .with_tool_opt(Some(tool_name))
            .with_context_opt(context)
            .with_description(format!("unknown tool '{tool_name}'"));
        query.unknown_tool = true;
        query
    }

    /// Check a tool call.
    #[must_use]
    pub fn check_tool(
        &self,
        tool_name: &str,
        resource: Option<&str>,
        context: Option<&str>,
    ) -> PermissionCheckResult {
        self.check(&self.query_for_tool(tool_name, resource, context))
    }

    /// Decide a query.
    #[must_use]
    pub fn check(&self, query: &PermissionQuery) -> PermissionCheckResult {
        let policy = self.policy();
        let risk = query.effective_risk();

        if !self.gate.is_operation_allowed(query.scope) {
            let result = PermissionCheckResult::deny("operations are locked", risk, DecisionSource::Gate);
            self.audit_query(query, AuditOutcome::Denied, &result.reason, None);
            return result;
        }

        if policy.is_blocked(query.scope) {
            let result = PermissionCheckResult::deny(
                format!("scope '{}' is blocked by policy", query.scope),
                RiskLevel::Blocked,
                DecisionSource::BlockedScope,
            );
            warn!(scope = %query.scope, action = %query.action, "blocked scope");
            self.audit_query(query, AuditOutcome::Denied, &result.reason, None);
            return result;
        }

        let lookup = self.grants.find_and_use(&query.grant_query());
        self.audit_expired(&lookup.expired);
        if let Some(grant) = lookup.hit {
            debug!(grant = %grant.id, state = ?grant.state, "grant cache hit");
            let (result, outcome) = if grant.is_granted() {
                (
                    PermissionCheckResult::allow("previously granted", risk, DecisionSource::Grant),
                    AuditOutcome::Granted,
                )
            } else {
                (
                    PermissionCheckResult::deny("previously denied", risk, DecisionSource::Grant),
                    AuditOutcome::Denied,
                )
            };
            self.audit_query(query, outcome, &result.reason, Some(&grant));
            return result.with_grant(Some(grant));
        }

        if !query.unknown_tool {
            if policy.auto_approve_safe
                && risk == RiskLevel::Safe
                && !query.requires_explicit
                && !query.default_deny
                && !query.force_prompt
                && !policy.always_prompt_scopes.contains(&query.scope)
            {
                let grant = self.store_grant(
                    query,
                    GrantState::Granted,
                    policy.max_auto_approve_duration,
                    GrantedBy::System,
                    None,
                );
                let result =
                    PermissionCheckResult::allow("auto-approved safe operation", risk, DecisionSource::AutoApproved);
                info!(scope = %query.scope, action = %query.action, "auto-approved safe operation");
                self.audit_query(query, AuditOutcome::Granted, &result.reason, grant.as_ref());
                return result.with_grant(grant);
            }

            if query.requires_explicit
                || query.default_deny
                || query.force_prompt
                || policy.always_prompts(query.scope, risk)
            {
                debug!(scope = %query.scope, action = %query.action, risk = %risk, "approval required");
                return PermissionCheckResult::ask("requires approval", risk);
            }
        }

        match policy.default_decision {
            DefaultDecision::Deny => {
                let result = PermissionCheckResult::deny(
                    "denied by default policy",
                    risk,
                    DecisionSource::DefaultDecision,
                );
                warn!(scope = %query.scope, action = %query.action, "denied by default policy");
                self.audit_query(query, AuditOutcome::Denied, &result.reason, None);
                result
            },
            DefaultDecision::Prompt => PermissionCheckResult::ask("policy default is to prompt", risk),
        }
    }

    /// Turn an approval resolution into a final decision.
    ///
    /// Approvals and denials with a duration other than `once` are stored
    /// as user grants. A timeout is audited with a reason containing
    /// "timeout" and never stored. A timeout never allows a default-deny
    /// operation.
    pub fn apply_resolution(
        &self,
        query: &PermissionQuery,
        resolution: &ApprovalResolution,
    ) -> PermissionCheckResult {
        let risk = query.effective_risk();
        match resolution {
            ApprovalResolution::Approved { duration, notes } => {
                let grant = (*duration != GrantDuration::Once)
                    .then(|| {
                        self.store_grant(query, GrantState::Granted, *duration, GrantedBy::User, notes.clone())
                    })
                    .flatten();
                let reason = format!("approved by user ({duration})");
                info!(scope = %query.scope, action = %query.action, duration = %duration, "approval granted");
                self.audit_query(query, AuditOutcome::Granted, &reason, grant.as_ref());
                PermissionCheckResult::allow(reason, risk, DecisionSource::Approval).with_grant(grant)
            },
            ApprovalResolution::Denied { duration, notes } => {
                let grant = (*duration != GrantDuration::Once)
                    .then(|| {
                        self.store_grant(query, GrantState::Denied, *duration, GrantedBy::User, notes.clone())
                    })
                    .flatten();
                let reason = format!("denied by user ({duration})");
                info!(scope = %query.scope, action = %query.action, duration = %duration, "approval denied");
                self.audit_query(query, AuditOutcome::Denied, &reason, grant.as_ref());
                PermissionCheckResult::deny(reason, risk, DecisionSource::Approval).with_grant(grant)
            },
            ApprovalResolution::TimedOut { decision } => {
                let allowed = *decision == TimeoutDecision::Allow && !query.default_deny;
                let reason = format!(
                    "approval timeout, resolved to {}",
                    if allowed { "allow" } else { "deny" }
                );
                let outcome = if allowed {
                    AuditOutcome::Granted
                } else {
                    AuditOutcome::Denied
                };
                self.audit_query(query, outcome, &reason, None);
                if allowed {
                    PermissionCheckResult::allow(reason, risk, DecisionSource::Approval)
                } else {
                    PermissionCheckResult::deny(reason, risk, DecisionSource::Approval)
                }
            },
            ApprovalResolution::Cancelled => {
                let reason = "approval cancelled";
                self.audit_query(query, AuditOutcome::Denied, reason, None);
                PermissionCheckResult::deny(reason, risk, DecisionSource::Approval)
            },
        }
    }

    /// Store an administrative grant or denial and audit it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ApprovalError::InvalidRule`] if the resource pattern
    /// does not compile.
    pub fn record(&self, request: GrantRequest) -> ApprovalResult<Grant> {
        let grant = self.grants.grant(request)?;
        let outcome = if grant.is_granted() {
            AuditOutcome::Granted
        } else {
            AuditOutcome::Denied
        };
        info!(grant = %grant.id, scope = %grant.scope, action = %grant.action, state = ?grant.state, "grant recorded");
        self.audit_grant(&grant, outcome, "recorded by administrator");
        Ok(grant)
    }

    /// Audit grants removed by revocation.
    pub fn audit_revoked(&self, grants: &[Grant], reason: &str) {
        for grant in grants {
            self.audit_grant(grant, AuditOutcome::Revoked, reason);
        }
    }

    /// Audit grants evicted because they expired.
    pub fn audit_expired(&self, grants: &[Grant]) {
        for grant in grants {
            debug!(grant = %grant.id, "grant expired");
            self.audit_grant(grant, AuditOutcome::Expired, "expired");
        }
    }

    fn store_grant(
        &self,
        query: &PermissionQuery,
        state: GrantState,
        duration: GrantDuration,
        by: GrantedBy,
        notes: Option<String>,
    ) -> Option<Grant> {
        let request = GrantRequest::new(query.scope, query.action, state)
            .with_resource_opt(query.resource.as_deref())
            .with_duration(duration)
            .granted_by(by)
            .with_risk(query.effective_risk())
            .with_tool_opt(query.tool_name.as_deref())
            .with_context_opt(query.context.as_deref())
            .with_notes_opt(notes);
        match self.grants.grant(request) {
            Ok(grant) => Some(grant),
            Err(e) => {
                warn!(error = %e, scope = %query.scope, "failed to store grant");
                None
            },
        }
    }

    pub(crate) fn audit_query(
        &self,
        query: &PermissionQuery,
        outcome: AuditOutcome,
        reason: &str,
        grant: Option<&Grant>,
    ) {
        let mut entry = AuditEntry::new(query.scope, query.action, outcome)
            .with_resource_opt(query.resource.as_deref())
            .with_tool_opt(query.tool_name.as_deref())
            .with_context_opt(query.context.as_deref())
            .with_reason(reason);
        if let Some(grant) = grant {
            entry = entry.with_permission_id(grant.id.to_string());
        }
        self.write_audit(entry);
    }

    fn audit_grant(&self, grant: &Grant, outcome: AuditOutcome, reason: &str) {
        let entry = AuditEntry::new(grant.scope, grant.action, outcome)
            .with_permission_id(grant.id.to_string())
            .with_resource_opt(grant.resource.as_deref().or(grant.resource_pattern.as_deref()))
            .with_tool_opt(grant.tool_name.as_deref())
            .with_context_opt(grant.context.as_deref())
            .with_reason(reason);
        self.write_audit(entry);
    }

    fn write_audit(&self, entry: AuditEntry) {
        if let Err(e) = self.audit.record(entry) {
            warn!(error = %e, "failed to record audit entry");
        }
    }
}

impl std::fmt::Debug for PolicyEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEvaluator")
            .field("grants", &self.grants.count())
            .field("tools", &self.catalog.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "evaluator_tests.rs"]
mod tests;
