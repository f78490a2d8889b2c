//! Warden Core - Foundation types for the Warden permission engine.
//!
//! This crate provides the vocabulary shared by every other crate:
//! - [`Scope`] and [`Action`]: what a privileged operation touches and does
//! - [`RiskLevel`]: ordered severity driving auto-approval and prompting
//! - [`Timestamp`]: UTC wall-clock wrapper used for grants and audit entries
//! - [`SessionId`]: caller session key for rate limiting

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod error;
pub mod types;

pub use error::ParseError;
pub use types::{Action, RiskLevel, Scope, SessionId, Timestamp};
