/// Errors produced by the permission engine.
///
/// `Blocked` and `RateLimited` are decided before any grant lookup and are
/// never cached. `Denied` may be remembered as a grant in the denied state.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    /// A rule says never: critical command pattern, blocked path, or blocked scope.
    #[error("blocked: {target} - {reason}")]
    Blocked {
        /// The command, path, or scope that was blocked.
        target: String,
        /// Why it was blocked.
        reason: String,
    },

    /// The operation was refused by policy, a remembered denial, or a human.
    #[error("permission denied: {reason}")]
    Denied {
        /// The reason the operation was denied.
        reason: String,
    },

    /// The approval request timed out and the timeout decision is deny.
    #[error("approval timeout after {timeout_ms}ms")]
    Timeout {
        /// Time awaited before timeout, in milliseconds.
        timeout_ms: u64,
    },

    /// Too many requests for this session. Retry after the given delay.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited {
        /// Milliseconds until the limiting window resets.
        retry_after_ms: u64,
    },

    /// The tool is not in the permission catalog.
    #[error("unknown tool '{tool}'")]
    UnknownTool {
        /// The tool name that was looked up.
        tool: String,
    },

    /// No pending approval request has this id.
    #[error("no pending approval request '{id}'")]
    UnknownRequest {
        /// The request id.
        id: String,
    },

    /// A regex or glob in a rule table failed to compile.
    #[error("invalid rule '{pattern}': {reason}")]
    InvalidRule {
        /// The offending pattern.
        pattern: String,
        /// Compiler error text.
        reason: String,
    },

    /// Reading or writing the grant file failed.
    #[error("persistence error at {path}: {source}")]
    Persistence {
        /// The grant file path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The grant file could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal engine error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApprovalError {
    /// Whether retrying the same call later can succeed without any other change.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Timeout { .. })
    }
}

/// Result type for permission engine operations.
pub type ApprovalResult<T> = Result<T, ApprovalError>;
