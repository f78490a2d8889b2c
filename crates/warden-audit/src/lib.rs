//! Warden Audit - Append-only decision log.
//!
//! This crate provides:
//! - [`AuditEntry`]: one terminal permission decision (granted, denied, revoked, expired)
//! - [`AuditSink`]: the `record(entry)` contract the permission engine writes to
//! - [`InMemoryAuditLog`]: a queryable sink for tests and short-lived processes
//! - [`JsonlAuditLog`]: a JSON-lines file sink
//!
//! Entries are never mutated or deleted by the engine. Retention and rotation
//! belong to whoever owns the sink.
//!
//! # Example
//!
//! ```
//! use warden_audit::{AuditEntry, AuditOutcome, AuditSink, InMemoryAuditLog};
//! use warden_core::{Action, Scope};
//!
//! let log = InMemoryAuditLog::new();
//! log.record(
//!     AuditEntry::new(Scope::File, Action::Read, AuditOutcome::Granted)
//!         .with_resource("/tmp/notes.txt")
//!         .with_reason("cached grant"),
//! )
//! .unwrap();
//!
//! assert_eq!(log.count(), 1);
//! assert_eq!(log.entries()[0].outcome, AuditOutcome::Granted);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod entry;
mod error;
mod jsonl;
mod sink;

pub use entry::{AuditEntry, AuditEntryId, AuditOutcome, AuditSeverity};
pub use error::{AuditError, AuditResult};
pub use jsonl::JsonlAuditLog;
pub use sink::{AuditSink, InMemoryAuditLog};
