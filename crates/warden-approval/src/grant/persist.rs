//! Grant file persistence.
//!
//! The file is a JSON document `{ "permissions": [...], "policy": {...} }`.
//! Writes go to a sibling temp file and are renamed into place.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use super::Grant;
use crate::error::{ApprovalError, ApprovalResult};
use crate::policy::Policy;

/// On-disk document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Durable grants.
    #[serde(default)]
    pub permissions: Vec<Grant>,
    /// Policy at the time of the write.
    #[serde(default)]
    pub policy: Policy,
}

/// A grant file on disk.
///
/// Saves carry a sequence number taken when the snapshot was made; a save
/// whose snapshot is older than one already written is skipped, so
/// fire-and-forget saves finishing out of order never roll the file back.
#[derive(Debug)]
pub struct GrantFile {
    path: PathBuf,
    next_seq: AtomicU64,
    written_seq: Mutex<u64>,
}

impl GrantFile {
    /// Grant file at `path`. Nothing is touched until load or save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            next_seq: AtomicU64::new(1),
            written_seq: Mutex::new(0),
        }
    }

    /// Path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reserve a sequence number for a snapshot about to be taken.
    #[must_use]
    pub fn next_sequence(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Load the file. Returns `None` if it does not exist.
    ///
    /// Session and expired grants are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::Persistence`] on read failure and
    /// [`ApprovalError::Serialization`] if the document is malformed.
    pub fn load(&self) -> ApprovalResult<Option<PersistedState>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no grant file, starting empty");
                return Ok(None);
            },
            Err(source) => return Err(self.io_err(source)),
        };
        let mut state: PersistedState = serde_json::from_slice(&bytes)?;
        let before = state.permissions.len();
        state
            .permissions
            .retain(|g| g.duration.is_persistent() && !g.is_expired());
        info!(
            path = %self.path.display(),
            loaded = state.permissions.len(),
            dropped = before.saturating_sub(state.permissions.len()),
            "loaded grant file"
        );
        Ok(Some(state))
    }

    /// Write `state` with sequence `seq`.
    ///
    /// Returns `false` if a newer snapshot was already written.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::Persistence`] if the directory, temp file, or
    /// rename fails.
    pub fn save(&self, seq: u64, state: &PersistedState) -> ApprovalResult<bool> {
        let mut written = self.written_seq.lock().unwrap_or_else(|e| {
            warn!("GrantFile lock poisoned, recovering");
            e.into_inner()
        });
        if seq < *written {
            debug!(seq, written = *written, "skipping stale grant snapshot");
            return Ok(false);
        }

        let json = serde_json::to_vec_pretty(state)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_err(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;

        *written = seq;
        debug!(path = %self.path.display(), grants = state.permissions.len(), "saved grant file");
        Ok(true)
    }

    fn io_err(&self, source: std::io::Error) -> ApprovalError {
        ApprovalError::Persistence {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::{GrantDuration, GrantRequest, GrantState, GrantStore};
    use crate::policy::DefaultDecision;
    use chrono::Duration;
    use warden_core::{Action, Scope, Timestamp};

    fn sample_store() -> GrantStore {
        let store = GrantStore::new();
        for (scope, action, duration) in [
            (Scope::File, Action::Read, GrantDuration::Permanent),
            (Scope::Git, Action::Commit, GrantDuration::Day),
            (Scope::Network, Action::Request, GrantDuration::Session),
            (Scope::Terminal, Action::Execute, GrantDuration::Once),
        ] {
            store
                .grant(GrantRequest::new(scope, action, GrantState::Granted).with_duration(duration))
                .unwrap();
        }
        store
            .grant(
                GrantRequest::new(Scope::Browser, Action::Navigate, GrantState::Denied)
                    .with_resource_pattern("^https://ads\\.")
                    .with_duration(GrantDuration::Week),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_roundtrip_reconstructs_durable_grants() {
        let dir = tempfile::tempdir().unwrap();
        let file = GrantFile::new(dir.path().join("permissions.json"));
        let store = sample_store();
        let policy = Policy {
            default_decision: DefaultDecision::Deny,
            ..Policy::default()
        };

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 3);
        file.save(file.next_sequence(), &PersistedState {
            permissions: snapshot.clone(),
            policy: policy.clone(),
        })
        .unwrap();

        let loaded = file.load().unwrap().unwrap();
        assert_eq!(loaded.policy, policy);

        let reloaded = GrantStore::new();
        assert_eq!(reloaded.restore(loaded.permissions), 3);
        assert_eq!(reloaded.snapshot(), snapshot);
    }

    #[test]
    fn test_load_drops_session_and_expired() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("permissions.json");

        let mut stale = GrantRequest::new(Scope::File, Action::Write, GrantState::Granted)
            .with_duration(GrantDuration::Hour)
            .into_grant();
        stale.expires_at = Some(Timestamp::now().plus(Duration::minutes(-5)));
        let session = GrantRequest::new(Scope::File, Action::Read, GrantState::Granted).into_grant();
        let keep = GrantRequest::new(Scope::Git, Action::Status, GrantState::Granted)
            .with_duration(GrantDuration::Permanent)
            .into_grant();

        let doc = PersistedState {
            permissions: vec![stale, session, keep.clone()],
            policy: Policy::default(),
        };
        std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

        let loaded = GrantFile::new(&path).load().unwrap().unwrap();
        assert_eq!(loaded.permissions, vec![keep]);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = GrantFile::new(dir.path().join("absent.json"));
        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("permissions.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(
            GrantFile::new(&path).load().unwrap_err(),
            ApprovalError::Serialization(_)
        ));
    }

    #[test]
    fn test_stale_snapshot_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let file = GrantFile::new(dir.path().join("nested/permissions.json"));
        let older = file.next_sequence();
        let newer = file.next_sequence();

        let fresh = PersistedState {
            permissions: sample_store().snapshot(),
            policy: Policy::default(),
        };
        assert!(file.save(newer, &fresh).unwrap());
        assert!(!file.save(older, &PersistedState::default()).unwrap());

        let loaded = file.load().unwrap().unwrap();
        assert_eq!(loaded.permissions.len(), 3);
    }
}
