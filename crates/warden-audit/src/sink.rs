//! The audit sink contract and an in-memory implementation.

use std::sync::RwLock;

use warden_core::Scope;

use crate::entry::{AuditEntry, AuditOutcome};
use crate::error::{AuditError, AuditResult};

/// Destination for terminal permission decisions.
///
/// Called once per granted/denied/revoked/expired decision. Implementations
/// must be append-only from the engine's point of view.
pub trait AuditSink: Send + Sync {
    /// Append one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry could not be stored. The engine logs the
    /// failure and keeps deciding; a broken sink never flips a decision.
    fn record(&self, entry: AuditEntry) -> AuditResult<()>;
}

/// In-memory audit log.
///
/// Thread-safe via internal [`RwLock`]. Useful for tests and for processes
/// that forward entries elsewhere.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .read()
            .map(|e| e.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    /// The newest `limit` entries, oldest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries();
        let skip = entries.len().saturating_sub(limit);
        entries.into_iter().skip(skip).collect()
    }

    /// Entries with the given outcome.
    #[must_use]
    pub fn with_outcome(&self, outcome: AuditOutcome) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.outcome == outcome)
            .collect()
    }

    /// Entries for the given scope.
    #[must_use]
    pub fn for_scope(&self, scope: Scope) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.scope == scope)
            .collect()
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}

impl AuditSink for InMemoryAuditLog {
    fn record(&self, entry: AuditEntry) -> AuditResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| AuditError::StorageError(e.to_string()))?;
        entries.push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::Action;

    #[test]
    fn test_record_and_query() {
        let log = InMemoryAuditLog::new();
        log.record(AuditEntry::new(Scope::File, Action::Read, AuditOutcome::Granted))
            .unwrap();
        log.record(AuditEntry::new(Scope::Git, Action::Push, AuditOutcome::Denied))
            .unwrap();
        log.record(AuditEntry::new(Scope::Git, Action::Push, AuditOutcome::Revoked))
            .unwrap();

        assert_eq!(log.count(), 3);
        assert_eq!(log.for_scope(Scope::Git).len(), 2);
        assert_eq!(log.with_outcome(AuditOutcome::Denied).len(), 1);

        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].outcome, AuditOutcome::Revoked);
    }

    #[test]
    fn test_recent_larger_than_log() {
        let log = InMemoryAuditLog::new();
        log.record(AuditEntry::new(Scope::File, Action::Read, AuditOutcome::Granted))
            .unwrap();
        assert_eq!(log.recent(10).len(), 1);
    }
}
