use super::*;
use crate::gate::{AlwaysOpen, ManualGate};
use warden_audit::InMemoryAuditLog;

struct Harness {
    evaluator: PolicyEvaluator,
    audit: Arc<InMemoryAuditLog>,
}

fn harness_with(policy: Policy, gate: Arc<dyn OperationGate>) -> Harness {
    let audit = Arc::new(InMemoryAuditLog::new());
    let evaluator = PolicyEvaluator::new(
        Arc::new(RwLock::new(policy)),
        Arc::new(GrantStore::new()),
        Arc::new(PermissionCatalog::with_defaults()),
        gate,
        Arc::clone(&audit) as Arc<dyn AuditSink>,
    );
    Harness { evaluator, audit }
}

fn harness() -> Harness {
    harness_with(Policy::default(), Arc::new(AlwaysOpen))
}

#[test]
fn test_gate_vetoes_first() {
    let gate = Arc::new(ManualGate::new());
    let h = harness_with(Policy::default(), Arc::clone(&gate) as Arc<dyn OperationGate>);
    gate.lock();

    let result = h.evaluator.check_tool("git_status", None, None);
    assert!(!result.allowed);
    assert_eq!(result.source, DecisionSource::Gate);
    assert_eq!(h.audit.with_outcome(AuditOutcome::Denied).len(), 1);

    gate.unlock();
    assert!(h.evaluator.check_tool("git_status", None, None).allowed);
}

#[test]
fn test_blocked_scope_denied_and_not_cached() {
    let policy = Policy {
        blocked_scopes: vec![Scope::Clipboard],
        ..Policy::default()
    };
    let h = harness_with(policy, Arc::new(AlwaysOpen));
    h.evaluator
        .record(GrantRequest::new(Scope::Clipboard, Action::Read, GrantState::Granted))
        .unwrap();

    let result = h.evaluator.check_tool("clipboard_read", None, None);
    assert!(!result.allowed);
    assert_eq!(result.risk, RiskLevel::Blocked);
    assert_eq!(result.source, DecisionSource::BlockedScope);
    assert!(result.permission.is_none());
    assert_eq!(h.audit.with_outcome(AuditOutcome::Denied).len(), 1);
}

#[test]
fn test_safe_tool_auto_approved_and_cached() {
    let h = harness();
    let first = h.evaluator.check_tool("git_status", Some("/repo"), None);
    assert!(first.allowed);
    assert_eq!(first.source, DecisionSource::AutoApproved);
    let grant = first.permission.unwrap();
    assert_eq!(grant.granted_by, GrantedBy::System);
    assert_eq!(grant.duration, GrantDuration::Session);

    let second = h.evaluator.check_tool("git_status", Some("/repo"), None);
    assert!(second.allowed);
    assert_eq!(second.source, DecisionSource::Grant);
    assert_eq!(second.permission.unwrap().usage_count, 1);
    assert_eq!(h.audit.with_outcome(AuditOutcome::Granted).len(), 2);
}

#[test]
fn test_auto_approve_disabled_falls_to_default() {
    let policy = Policy {
        auto_approve_safe: false,
        default_decision: DefaultDecision::Deny,
        ..Policy::default()
    };
    let h = harness_with(policy, Arc::new(AlwaysOpen));
    let result = h.evaluator.check_tool("git_status", None, None);
    assert!(!result.allowed);
    assert!(!result.requires_approval);
    assert_eq!(result.source, DecisionSource::DefaultDecision);
}

#[test]
fn test_explicit_tool_requires_approval_without_audit() {
    let h = harness();
    let result = h.evaluator.check_tool("file_delete", Some("/tmp/x"), None);
    assert!(!result.allowed);
    assert!(result.requires_approval);
    assert_eq!(result.risk, RiskLevel::High);
    assert_eq!(result.suggested_duration, Some(GrantDuration::Once));
    assert_eq!(h.audit.count(), 0);
}

#[test]
fn test_always_prompt_scope_beats_auto_approve() {
    let policy = Policy {
        always_prompt_scopes: vec![Scope::Git],
        ..Policy::default()
    };
    let h = harness_with(policy, Arc::new(AlwaysOpen));
    let result = h.evaluator.check_tool("git_status", None, None);
    assert!(result.requires_approval);
    assert_eq!(result.suggested_duration, Some(GrantDuration::Permanent));
}

#[test]
fn test_default_decision() {
    let h = harness();
    let result = h.evaluator.check_tool("file_write", Some("/tmp/a"), None);
    assert!(result.requires_approval);
    assert_eq!(result.suggested_duration, Some(GrantDuration::Session));

    let policy = Policy {
        default_decision: DefaultDecision::Deny,
        ..Policy::default()
    };
    let h = harness_with(policy, Arc::new(AlwaysOpen));
    let result = h.evaluator.check_tool("file_write", Some("/tmp/a"), None);
    assert!(!result.allowed);
    assert!(!result.requires_approval);
    let denied = h.audit.with_outcome(AuditOutcome::Denied);
    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].tool_name.as_deref(), Some("file_write"));
}

#[test]
fn test_unknown_tool_uses_default_with_inferred_risk() {
    let h = harness();
    let result = h.evaluator.check_tool("file_remove", None, None);
    assert!(result.requires_approval);
    assert_eq!(result.risk, RiskLevel::High);

    let query = h.evaluator.query_for_tool("frobnicate", None, None);
    assert!(query.unknown_tool);
    assert_eq!((query.scope, query.action), (Scope::Api, Action::Execute));

    let policy = Policy {
        default_decision: DefaultDecision::Deny,
        ..Policy::default()
    };
    let h = harness_with(policy, Arc::new(AlwaysOpen));
    let result = h.evaluator.check_tool("frobnicate", None, None);
    assert!(!result.allowed);
    assert_eq!(result.source, DecisionSource::DefaultDecision);
}

#[test]
fn test_unknown_safe_tool_not_auto_approved() {
    let h = harness();
    assert!(h.evaluator.catalog.remove("git_status").is_some());
    let result = h.evaluator.check_tool("git_status", None, None);
    assert!(!result.allowed);
    assert!(result.requires_approval);
    assert_eq!(result.source, DecisionSource::RequiresApproval);
    assert_eq!(h.evaluator.grants().count(), 0);
}

#[test]
fn test_default_deny_never_allowed_without_grant() {
    let policy = Policy {
        auto_approve_safe: true,
        always_prompt_risks: Vec::new(),
        timeout_decision: TimeoutDecision::Allow,
        ..Policy::default()
    };
    let h = harness_with(policy.clone(), Arc::new(AlwaysOpen));
    let query = h.evaluator.query_for_tool("process_kill", Some("1234"), None);

    let result = h.evaluator.check(&query);
    assert!(!result.allowed);
    assert!(result.requires_approval);

    let timed_out = h.evaluator.apply_resolution(&query, &ApprovalResolution::TimedOut {
        decision: policy.timeout_decision,
    });
    assert!(!timed_out.allowed);

    let approved = h.evaluator.apply_resolution(&query, &ApprovalResolution::Approved {
        duration: GrantDuration::Hour,
        notes: None,
    });
    assert!(approved.allowed);
    assert!(h.evaluator.check(&query).allowed);
}

#[test]
fn test_remembered_denial() {
    let h = harness();
    let query = h.evaluator.query_for_tool("network_request", Some("evil.example"), None);
    let denied = h.evaluator.apply_resolution(&query, &ApprovalResolution::Denied {
        duration: GrantDuration::Day,
        notes: Some("no".to_string()),
    });
    assert!(!denied.allowed);
    assert_eq!(denied.permission.as_ref().unwrap().notes.as_deref(), Some("no"));

    let again = h.evaluator.check(&query);
    assert!(!again.allowed);
    assert!(!again.requires_approval);
    assert_eq!(again.source, DecisionSource::Grant);
}

#[test]
fn test_once_approval_stores_nothing() {
    let h = harness();
    let query = h.evaluator.query_for_tool("file_delete", Some("/tmp/x"), None);
    let result = h.evaluator.apply_resolution(&query, &ApprovalResolution::Approved {
        duration: GrantDuration::Once,
        notes: None,
    });
    assert!(result.allowed);
    assert!(result.permission.is_none());
    assert_eq!(h.evaluator.grants().count(), 0);
    assert!(h.evaluator.check(&query).requires_approval);
}

#[test]
fn test_once_grant_allows_exactly_once() {
    let h = harness();
    h.evaluator
        .record(
            GrantRequest::new(Scope::File, Action::Delete, GrantState::Granted)
                .with_resource("/tmp/x")
                .with_duration(GrantDuration::Once),
        )
        .unwrap();
    let query = h.evaluator.query_for_tool("file_delete", Some("/tmp/x"), None);
    assert!(h.evaluator.check(&query).allowed);
    let second = h.evaluator.check(&query);
    assert!(!second.allowed);
    assert!(second.requires_approval);
}

#[test]
fn test_timeout_audited_once_with_reason() {
    let h = harness();
    let query = h.evaluator.query_for_tool("git_push", Some("origin"), None);
    let result = h.evaluator.apply_resolution(&query, &ApprovalResolution::TimedOut {
        decision: TimeoutDecision::Deny,
    });
    assert!(!result.allowed);

    let entries = h.audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome, AuditOutcome::Denied);
    assert!(entries[0].reason.as_deref().unwrap().contains("timeout"));
    assert_eq!(h.evaluator.grants().count(), 0);
}

#[test]
fn test_timeout_allow() {
    let h = harness();
    let query = h.evaluator.query_for_tool("git_push", None, None);
    let result = h.evaluator.apply_resolution(&query, &ApprovalResolution::TimedOut {
        decision: TimeoutDecision::Allow,
    });
    assert!(result.allowed);
    assert_eq!(h.audit.with_outcome(AuditOutcome::Granted).len(), 1);
}

#[test]
fn test_expired_grants_audited() {
    let h = harness();
    let grant = h
        .evaluator
        .record(
            GrantRequest::new(Scope::File, Action::Write, GrantState::Granted)
                .with_duration(GrantDuration::Hour),
        )
        .unwrap();

    h.evaluator.audit_expired(std::slice::from_ref(&grant));
    let expired = h.audit.with_outcome(AuditOutcome::Expired);
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].reason.as_deref(), Some("expired"));
}

#[test]
fn test_contextual_grants() {
    let h = harness();
    let query = h
        .evaluator
        .query_for_tool("browser_navigate", Some("https://docs.rs"), Some("task-1"));
    h.evaluator.apply_resolution(&query, &ApprovalResolution::Approved {
        duration: GrantDuration::Session,
        notes: None,
    });
    assert!(h.evaluator.check(&query).allowed);

    let other = h
        .evaluator
        .query_for_tool("browser_navigate", Some("https://docs.rs"), Some("task-2"));
    assert!(h.evaluator.check(&other).requires_approval);
}

#[test]
fn test_revocation_audited() {
    let h = harness();
    let grant = h
        .evaluator
        .record(GrantRequest::new(Scope::Terminal, Action::Execute, GrantState::Granted))
        .unwrap();
    let removed = h.evaluator.grants().revoke_by_scope(Scope::Terminal);
    h.evaluator.audit_revoked(&removed, "revoked scope terminal");

    let revoked = h.audit.with_outcome(AuditOutcome::Revoked);
    assert_eq!(revoked.len(), 1);
    assert_eq!(revoked[0].permission_id.as_deref(), Some(grant.id.to_string().as_str()));
}

#[test]
fn test_approval_request_from_query() {
    let h = harness();
    let query = h.evaluator.query_for_tool("git_push", Some("origin"), Some("release"));
    let request = query.to_approval_request(&h.evaluator.policy());
    assert_eq!(request.tool_name, "git_push");
    assert_eq!(request.risk, RiskLevel::High);
    assert_eq!(request.suggested_duration, GrantDuration::Once);
    assert_eq!(request.timeout_ms, 60_000);
    assert_eq!(request.context.as_deref(), Some("release"));
}
