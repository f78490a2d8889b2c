//! Common types used throughout Warden.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Timestamp wrapper for consistent handling throughout Warden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    /// Get the current timestamp.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create a timestamp from a `DateTime<Utc>`.
    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Check if this timestamp is in the past.
    #[must_use]
    pub fn is_past(&self) -> bool {
        self.0 < Utc::now()
    }

    /// Check if this timestamp is in the future.
    #[must_use]
    pub fn is_future(&self) -> bool {
        self.0 > Utc::now()
    }

    /// Return a timestamp offset by `delta` from this one.
    ///
    /// Saturates at this timestamp if the addition would overflow.
    #[must_use]
    pub fn plus(&self, delta: chrono::Duration) -> Self {
        Self(self.0.checked_add_signed(delta).unwrap_or(self.0))
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%SZ"))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

/// Caller-supplied session identifier.
///
/// Rate limiting is keyed on it. The engine never generates one itself
/// except through [`SessionId::random`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Wrap an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Defines a lowercase string-backed enum with `ALL`, `as_str`, `Display` and `FromStr`.
macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The canonical lowercase spelling.
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim().to_ascii_lowercase();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == needle)
                    .ok_or_else(|| ParseError::new($kind, s))
            }
        }
    };
}

vocabulary! {
    /// Top-level domain of a privileged capability.
    Scope, "scope" {
        /// Local filesystem access.
        File => "file",
        /// Outbound network access.
        Network => "network",
        /// Shell command execution.
        Terminal => "terminal",
        /// Browser automation.
        Browser => "browser",
        /// System clipboard.
        Clipboard => "clipboard",
        /// Process inspection and control.
        Process => "process",
        /// Operating-system level operations.
        System => "system",
        /// Git repository operations.
        Git => "git",
        /// Third-party API calls.
        Api => "api",
        /// Platform registry / settings store.
        Registry => "registry",
        /// Desktop notifications.
        Notification => "notification",
        /// Screen capture.
        Screen => "screen",
    }
}

vocabulary! {
    /// A scope-specific verb.
    Action, "action" {
        /// Read content.
        Read => "read",
        /// Write or overwrite content.
        Write => "write",
        /// Delete a resource.
        Delete => "delete",
        /// Execute a program or script.
        Execute => "execute",
        /// Create a new resource.
        Create => "create",
        /// Modify an existing resource.
        Modify => "modify",
        /// Remove an entry.
        Remove => "remove",
        /// Terminate a process.
        Kill => "kill",
        /// Enumerate resources.
        List => "list",
        /// Read metadata.
        Info => "info",
        /// Query status.
        Status => "status",
        /// Publish to a remote.
        Push => "push",
        /// Fetch from a remote.
        Pull => "pull",
        /// Record a commit.
        Commit => "commit",
        /// Navigate to a location.
        Navigate => "navigate",
        /// Click on an element.
        Click => "click",
        /// Type input.
        Type => "type",
        /// Capture an image.
        Screenshot => "screenshot",
        /// Issue a request.
        Request => "request",
        /// Download content.
        Download => "download",
        /// Open a connection.
        Connect => "connect",
        /// Copy content.
        Copy => "copy",
        /// Paste content.
        Paste => "paste",
        /// Spawn a child process.
        Spawn => "spawn",
    }
}

/// Risk level classification for operations.
///
/// Ordered `safe < low < medium < high < critical`, with `blocked` as a
/// terminal value above every other level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// No meaningful risk - eligible for automatic approval
    Safe,
    /// Low risk - typically allowed without explicit approval
    Low,
    /// Medium risk - may require approval depending on context
    Medium,
    /// High risk - requires explicit approval
    High,
    /// Critical risk - requires approval and is never cached for long
    Critical,
    /// Never allowed
    Blocked,
}

impl RiskLevel {
    /// Every level, lowest first.
    pub const ALL: &'static [Self] = &[
        Self::Safe,
        Self::Low,
        Self::Medium,
        Self::High,
        Self::Critical,
        Self::Blocked,
    ];

    /// The canonical lowercase spelling.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
            Self::Blocked => "blocked",
        }
    }

    /// Check if this risk level requires user approval by default.
    #[must_use]
    pub fn requires_approval(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == needle)
            .ok_or_else(|| ParseError::new("risk level", s))
    }
}
