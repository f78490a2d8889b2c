//! Upstream operation gate.
//!
//! A lock or idle-timeout collaborator can veto operations before any policy
//! is consulted. The evaluator asks the gate first and denies on `false`.

use std::sync::atomic::{AtomicBool, Ordering};
use warden_core::Scope;

/// Global veto consulted before policy.
pub trait OperationGate: Send + Sync {
    /// Whether operations in `scope` may proceed at all.
    fn is_operation_allowed(&self, scope: Scope) -> bool;
}

/// A gate that never vetoes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOpen;

impl OperationGate for AlwaysOpen {
    fn is_operation_allowed(&self, _scope: Scope) -> bool {
        true
    }
}

/// A gate toggled by hand, e.g. from a screen-lock hook.
#[derive(Debug, Default)]
pub struct ManualGate {
    locked: AtomicBool,
}

impl ManualGate {
    /// An unlocked gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Veto every operation.
    pub fn lock(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    /// Lift the veto.
    pub fn unlock(&self) {
        self.locked.store(false, Ordering::SeqCst);
    }

    /// Whether the gate is locked.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }
}

impl OperationGate for ManualGate {
    fn is_operation_allowed(&self, _scope: Scope) -> bool {
        !self.is_locked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_gate() {
        let gate = ManualGate::new();
        assert!(gate.is_operation_allowed(Scope::File));
        gate.lock();
        assert!(!gate.is_operation_allowed(Scope::File));
        gate.unlock();
        assert!(gate.is_operation_allowed(Scope::Terminal));
        assert!(AlwaysOpen.is_operation_allowed(Scope::System));
    }
}
