//! Warden Approval - Permission policy engine.
//!
//! This crate decides whether a privileged operation (a tool call or a shell
//! command) may run, and remembers the answer.
//!
//! # Components
//!
//! - [`PermissionCatalog`]: tool name to scope, action, and risk
//! - [`CommandValidator`]: critical patterns, whitelist, and path rules for shell commands
//! - [`RateLimiter`]: per-session window and burst counters
//! - [`GrantStore`]: cached allow/deny decisions with duration-based expiry, persisted by [`GrantFile`]
//! - [`PolicyEvaluator`]: the decision function over policy, grants, and the upstream [`OperationGate`]
//! - [`ApprovalCoordinator`]: pending human approvals with timeouts, published on an [`ApprovalEventBus`]
//! - [`PermissionController`]: one service object wiring all of the above
//!
//! Every terminal decision is written to a [`warden_audit::AuditSink`].
//!
//! # Example
//!
//! ```
//! use warden_approval::{ControllerSettings, PermissionController};
//!
//! let settings = ControllerSettings {
//!     persist: false,
//!     ..ControllerSettings::default()
//! };
//! let controller = PermissionController::open(settings).unwrap();
//!
//! // Safe operations are auto-approved and cached.
//! assert!(controller.check_tool_permission("git_status", None, None).allowed);
//!
//! // Destructive commands are blocked regardless of the whitelist.
//! let verdict = controller.validate_command("rm -rf /");
//! assert!(verdict.is_blocked());
//!
//! // Risky tools need a human.
//! let result = controller.check_tool_permission("file_delete", Some("/tmp/x"), None);
//! assert!(result.requires_approval);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod catalog;
pub mod command;
pub mod controller;
pub mod coordinator;
/// Error types and results for the permission engine.
pub mod error;
pub mod evaluator;
pub mod events;
pub mod gate;
pub mod grant;
pub mod policy;
pub mod rate_limit;
pub mod request;

pub use catalog::{PermissionCatalog, PermissionRequirement};
pub use command::{
    CommandValidationResult, CommandValidator, ConfirmationLevel, PathValidation, Severity,
    ValidatorConfig, WhitelistEntry, default_whitelist,
};
pub use controller::{
    CommandAuthorization, ControllerSettings, PermissionController, PermissionControllerBuilder,
};
pub use coordinator::ApprovalCoordinator;
pub use error::{ApprovalError, ApprovalResult};
pub use evaluator::{DecisionSource, PermissionCheckResult, PermissionQuery, PolicyEvaluator};
pub use events::{ApprovalChannel, ApprovalEvent, ApprovalEventBus, ApprovalEventReceiver};
pub use gate::{AlwaysOpen, ManualGate, OperationGate};
pub use grant::{
    Grant, GrantDuration, GrantFile, GrantId, GrantQuery, GrantRequest, GrantState, GrantStats,
    GrantStore, GrantedBy, PersistedState,
};
pub use policy::{DefaultDecision, Policy, TimeoutDecision};
pub use rate_limit::{RateLimitConfig, RateLimitDecision, RateLimiter};
pub use request::{ApprovalRequest, ApprovalResolution, ApprovalResponse, RequestId};

pub use warden_core::SessionId;
