use super::*;
use crate::grant::{GrantState, GrantedBy};
use chrono::Duration;
use warden_core::RiskLevel;

fn allow(scope: Scope, action: Action) -> GrantRequest {
    GrantRequest::new(scope, action, GrantState::Granted)
}

/// Insert a grant as-is, bypassing timestamp stamping.
fn insert_raw(store: &GrantStore, grant: Grant) {
    store
        .write()
        .insert(grant.id.clone(), Entry::new(grant).unwrap());
}

fn expired(scope: Scope, action: Action) -> Grant {
    let mut grant = allow(scope, action)
        .with_duration(GrantDuration::Hour)
        .into_grant();
    grant.granted_at = Timestamp::now().plus(Duration::hours(-2));
    grant.expires_at = Some(Timestamp::now().plus(Duration::hours(-1)));
    grant
}

#[test]
fn test_grant_and_find() {
    let store = GrantStore::new();
    store
        .grant(allow(Scope::File, Action::Read).with_resource("/tmp/a.txt"))
        .unwrap();

    let hit = store.find_and_use(&GrantQuery::new(Scope::File, Action::Read).resource(Some("/tmp/a.txt")));
    let grant = hit.hit.unwrap();
    assert_eq!(grant.usage_count, 1);
    assert!(grant.last_used.is_some());

    let miss = store.find_and_use(&GrantQuery::new(Scope::File, Action::Read).resource(Some("/tmp/b.txt")));
    assert!(miss.hit.is_none());
    let miss = store.find_and_use(&GrantQuery::new(Scope::File, Action::Write).resource(Some("/tmp/a.txt")));
    assert!(miss.hit.is_none());
}

#[test]
fn test_scope_wide_grant_matches_any_resource() {
    let store = GrantStore::new();
    store.grant(allow(Scope::Git, Action::Status)).unwrap();

    let q = GrantQuery::new(Scope::Git, Action::Status).resource(Some("/repo"));
    assert!(store.find_matching(&q).is_some());
    assert!(store.find_matching(&GrantQuery::new(Scope::Git, Action::Status)).is_some());
}

#[test]
fn test_pattern_grant() {
    let store = GrantStore::new();
    store
        .grant(allow(Scope::File, Action::Write).with_resource_pattern(r"^/home/me/notes/.*\.md$"))
        .unwrap();

    let q = |r| GrantQuery::new(Scope::File, Action::Write).resource(Some(r));
    assert!(store.find_matching(&q("/home/me/notes/todo.md")).is_some());
    assert!(store.find_matching(&q("/home/me/notes/todo.txt")).is_none());
    assert!(store.find_matching(&GrantQuery::new(Scope::File, Action::Write)).is_none());
}

#[test]
fn test_invalid_pattern_rejected() {
    let store = GrantStore::new();
    let err = store
        .grant(allow(Scope::File, Action::Write).with_resource_pattern("(unclosed"))
        .unwrap_err();
    assert!(matches!(err, ApprovalError::InvalidRule { .. }));
    assert_eq!(store.count(), 0);
}

#[test]
fn test_specificity_ordering() {
    let store = GrantStore::new();
    store.grant(allow(Scope::File, Action::Read)).unwrap();
    store
        .grant(allow(Scope::File, Action::Read).with_resource_pattern("^/etc/"))
        .unwrap();
    store
        .grant(
            GrantRequest::new(Scope::File, Action::Read, GrantState::Denied)
                .with_resource("/etc/shadow"),
        )
        .unwrap();

    let q = |r| GrantQuery::new(Scope::File, Action::Read).resource(Some(r));
    let hit = store.find_matching(&q("/etc/shadow")).unwrap();
    assert_eq!(hit.state, GrantState::Denied);
    assert_eq!(hit.specificity(), 2);

    let hit = store.find_matching(&q("/etc/hosts")).unwrap();
    assert_eq!(hit.specificity(), 1);

    let hit = store.find_matching(&q("/tmp/x")).unwrap();
    assert_eq!(hit.specificity(), 0);
}

#[test]
fn test_identical_key_replaced() {
    let store = GrantStore::new();
    store
        .grant(
            GrantRequest::new(Scope::Network, Action::Request, GrantState::Denied)
                .with_resource("api.example.com"),
        )
        .unwrap();
    store
        .grant(allow(Scope::Network, Action::Request).with_resource("api.example.com"))
        .unwrap();

    assert_eq!(store.count(), 1);
    let q = GrantQuery::new(Scope::Network, Action::Request).resource(Some("api.example.com"));
    assert!(store.find_matching(&q).unwrap().is_granted());
}

#[test]
fn test_once_grant_consumed() {
    let store = GrantStore::new();
    store
        .grant(allow(Scope::Terminal, Action::Execute).with_resource("make").with_duration(GrantDuration::Once))
        .unwrap();

    let q = GrantQuery::new(Scope::Terminal, Action::Execute).resource(Some("make"));
    assert!(store.find_and_use(&q).hit.is_some());
    assert!(store.find_and_use(&q).hit.is_none());
    assert_eq!(store.count(), 0);
}

#[test]
fn test_contextual_matching() {
    let store = GrantStore::new();
    store
        .grant(allow(Scope::Browser, Action::Navigate).with_context_opt(Some("task-1")))
        .unwrap();

    let q = |ctx| GrantQuery::new(Scope::Browser, Action::Navigate).context(ctx);
    assert!(store.find_matching(&q(Some("task-1"))).is_some());
    assert!(store.find_matching(&q(Some("task-2"))).is_none());
    assert!(store.find_matching(&q(None)).is_none());

    store.set_limits(false, DEFAULT_CAPACITY);
    assert!(store.find_matching(&q(Some("task-2"))).is_some());
}

#[test]
fn test_context_free_grant_matches_any_context() {
    let store = GrantStore::new();
    store.grant(allow(Scope::Clipboard, Action::Read)).unwrap();
    let q = GrantQuery::new(Scope::Clipboard, Action::Read).context(Some("anything"));
    assert!(store.find_matching(&q).is_some());
}

#[test]
fn test_expired_evicted_on_lookup() {
    let store = GrantStore::new();
    insert_raw(&store, expired(Scope::File, Action::Read));
    assert_eq!(store.count(), 1);

    let lookup = store.find_and_use(&GrantQuery::new(Scope::File, Action::Read));
    assert!(lookup.hit.is_none());
    assert_eq!(lookup.expired.len(), 1);
    assert_eq!(store.count(), 0);
}

#[test]
fn test_sweep_expired() {
    let store = GrantStore::new();
    insert_raw(&store, expired(Scope::File, Action::Read));
    insert_raw(&store, expired(Scope::Git, Action::Push));
    store.grant(allow(Scope::File, Action::List)).unwrap();

    let swept = store.sweep_expired();
    assert_eq!(swept.len(), 2);
    assert_eq!(store.count(), 1);
}

#[test]
fn test_revocation() {
    let store = GrantStore::new();
    let a = store.grant(allow(Scope::Terminal, Action::Execute).with_resource("ls")).unwrap();
    store.grant(allow(Scope::Terminal, Action::Execute).with_resource("pwd")).unwrap();
    store
        .grant(allow(Scope::Git, Action::Push).with_tool_opt(Some("git_push")))
        .unwrap();

    assert_eq!(store.revoke(&a.id).unwrap().id, a.id);
    assert!(store.revoke(&a.id).is_none());

    assert_eq!(store.revoke_by_tool("git_push").len(), 1);
    assert_eq!(store.revoke_by_scope(Scope::Terminal).len(), 1);
    assert_eq!(store.count(), 0);
}

#[test]
fn test_clear_session_keeps_durable() {
    let store = GrantStore::new();
    store.grant(allow(Scope::File, Action::Read)).unwrap();
    store
        .grant(allow(Scope::File, Action::Write).with_duration(GrantDuration::Once))
        .unwrap();
    store
        .grant(allow(Scope::Git, Action::Commit).with_duration(GrantDuration::Permanent))
        .unwrap();

    assert_eq!(store.clear_session().len(), 2);
    assert_eq!(store.count(), 1);
    assert_eq!(store.clear_all().len(), 1);
    assert_eq!(store.count(), 0);
}

#[test]
fn test_capacity_evicts_least_recently_used() {
    let store = GrantStore::with_limits(true, 2);
    let first = store.grant(allow(Scope::File, Action::Read).with_resource("a")).unwrap();
    let second = store.grant(allow(Scope::File, Action::Read).with_resource("b")).unwrap();

    // Touch the first so the second becomes least recently used.
    let _ = store.find_and_use(&GrantQuery::new(Scope::File, Action::Read).resource(Some("a")));
    let third = store.grant(allow(Scope::File, Action::Read).with_resource("c")).unwrap();

    assert_eq!(store.count(), 2);
    assert!(store.get(&first.id).is_some());
    assert!(store.get(&second.id).is_none());
    assert!(store.get(&third.id).is_some());
}

#[test]
fn test_snapshot_excludes_session_and_once() {
    let store = GrantStore::new();
    store.grant(allow(Scope::File, Action::Read)).unwrap();
    store
        .grant(allow(Scope::File, Action::Write).with_duration(GrantDuration::Once))
        .unwrap();
    let day = store
        .grant(allow(Scope::Git, Action::Commit).with_duration(GrantDuration::Day))
        .unwrap();
    insert_raw(&store, expired(Scope::Api, Action::Request));

    let snapshot = store.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, day.id);
}

#[test]
fn test_restore_filters_and_keeps_ids() {
    let durable = allow(Scope::Git, Action::Commit)
        .with_duration(GrantDuration::Permanent)
        .granted_by(GrantedBy::Policy)
        .with_risk(RiskLevel::Medium)
        .into_grant();
    let session = allow(Scope::File, Action::Read).into_grant();
    let stale = expired(Scope::Api, Action::Request);

    let store = GrantStore::new();
    assert_eq!(store.restore(vec![durable.clone(), session, stale]), 1);
    assert_eq!(store.get(&durable.id).unwrap(), durable);
}

#[test]
fn test_stats() {
    let store = GrantStore::new();
    store.grant(allow(Scope::File, Action::Read)).unwrap();
    store
        .grant(GrantRequest::new(Scope::File, Action::Delete, GrantState::Denied).with_duration(GrantDuration::Week))
        .unwrap();
    let _ = store.find_and_use(&GrantQuery::new(Scope::File, Action::Read));
    let _ = store.find_and_use(&GrantQuery::new(Scope::File, Action::Read));

    let stats = store.stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.granted, 1);
    assert_eq!(stats.denied, 1);
    assert_eq!(stats.persistent, 1);
    assert_eq!(stats.by_scope.get("file"), Some(&2));
    assert_eq!(stats.total_usage, 2);
}
