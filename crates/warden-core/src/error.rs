//! Parse errors for core vocabulary types.

use thiserror::Error;

/// Error returned when a string does not name a known scope, action, or risk level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseError {
    /// Which vocabulary was being parsed ("scope", "action", "risk level").
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl ParseError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}
