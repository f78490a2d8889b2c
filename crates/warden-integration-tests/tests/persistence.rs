//! Grant persistence across controller restarts.

mod common;

use std::path::Path;

use common::Harness;
use warden_approval::{
    ControllerSettings, GrantDuration, GrantFile, GrantRequest, GrantState, GrantStore, Policy,
};
use warden_core::{Action, Scope};

fn persistent_settings(path: &Path) -> ControllerSettings {
    ControllerSettings {
        grants_path: Some(path.to_path_buf()),
        persist: true,
        ..ControllerSettings::default()
    }
}

fn grant(scope: Scope, action: Action, resource: &str, duration: GrantDuration) -> GrantRequest {
    GrantRequest::new(scope, action, GrantState::Granted)
        .with_resource(resource)
        .with_duration(duration)
}

#[tokio::test]
async fn test_round_trip_keeps_durable_grants_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("permissions.json");

    let before = {
        let h = Harness::new(persistent_settings(&path));
        let c = &h.controller;
        c.grant_permission(grant(Scope::File, Action::Write, "/work/a.txt", GrantDuration::Permanent))
            .unwrap();
        c.grant_permission(grant(Scope::Network, Action::Request, "api.example.com", GrantDuration::Day))
            .unwrap();
        c.deny_permission(
            GrantRequest::new(Scope::Git, Action::Push, GrantState::Denied)
                .with_resource("origin")
                .with_duration(GrantDuration::Week),
        )
        .unwrap();
        c.grant_permission(
            GrantRequest::new(Scope::File, Action::Read, GrantState::Granted)
                .with_resource_pattern("^/work/")
                .with_duration(GrantDuration::Permanent),
        )
        .unwrap();
        // Never written.
        c.grant_permission(grant(Scope::Browser, Action::Navigate, "https://docs.rs", GrantDuration::Session))
            .unwrap();
        c.grant_permission(grant(Scope::File, Action::Delete, "/tmp/x", GrantDuration::Once))
            .unwrap();

        let snapshot = c.grants().snapshot();
        assert_eq!(snapshot.len(), 4);
        c.shutdown().unwrap();
        snapshot
    };

    let h = Harness::new(persistent_settings(&path));
    let after = h.controller.grants().snapshot();
    assert_eq!(after, before);
    assert_eq!(h.controller.grants().count(), 4);

    assert!(
        h.controller
            .check_tool_permission("file_read", Some("/work/src/lib.rs"), None)
            .allowed
    );
    let push = h.controller.check_tool_permission("git_push", Some("origin"), None);
    assert!(!push.allowed);
    assert!(!push.requires_approval);
    assert!(
        h.controller
            .check_tool_permission("browser_navigate", Some("https://docs.rs"), None)
            .requires_approval
    );
}

#[tokio::test]
async fn test_revocation_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("permissions.json");

    {
        let h = Harness::new(persistent_settings(&path));
        h.controller
            .grant_permission(grant(Scope::Terminal, Action::Execute, "make", GrantDuration::Permanent))
            .unwrap();
        h.controller
            .grant_permission(grant(Scope::File, Action::Write, "/work/b.txt", GrantDuration::Permanent))
            .unwrap();
        h.controller.revoke_by_scope(Scope::Terminal);
        h.controller.shutdown().unwrap();
    }

    let h = Harness::new(persistent_settings(&path));
    let scopes: Vec<Scope> = h.controller.grants().list().iter().map(|g| g.scope).collect();
    assert_eq!(scopes, vec![Scope::File]);
}

#[test]
fn test_grant_file_round_trip_without_controller() {
    let dir = tempfile::tempdir().unwrap();
    let file = GrantFile::new(dir.path().join("nested").join("permissions.json"));
    assert!(file.load().unwrap().is_none());

    let store = GrantStore::new();
    store
        .grant(grant(Scope::Api, Action::Request, "billing", GrantDuration::Hour))
        .unwrap();
    store
        .grant(grant(Scope::Api, Action::Request, "search", GrantDuration::Session))
        .unwrap();

    let state = warden_approval::PersistedState {
        permissions: store.snapshot(),
        policy: Policy::default(),
    };
    assert!(file.save(file.next_sequence(), &state).unwrap());

    let loaded = file.load().unwrap().unwrap();
    assert_eq!(loaded, state);

    let restored = GrantStore::new();
    assert_eq!(restored.restore(loaded.permissions), 1);
    assert_eq!(restored.snapshot(), store.snapshot());
}

#[test]
fn test_configured_policy_wins_over_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("permissions.json");

    {
        let h = Harness::new(persistent_settings(&path));
        h.controller.update_policy(Policy {
            approval_timeout_ms: 5_000,
            ..Policy::default()
        });
        h.controller.shutdown().unwrap();
    }

    let h = Harness::new(persistent_settings(&path));
    assert_eq!(h.controller.policy(), Policy::default());
}
