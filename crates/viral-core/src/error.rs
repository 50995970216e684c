//! Error types for the `viral-core` crate.
//!
//! Every fallible engine operation returns [`EngineError`]. The HTTP layer
//! maps each variant onto a status code; nothing here knows about HTTP.

/// Errors that can occur when starting or stepping a simulation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Start parameters or rule settings are out of range.
    #[error("invalid configuration: {0}")]
    Validation(String),

    /// `step` was called before any successful `start`.
    #[error("simulation not started")]
    NoActiveSession,

    /// An unexpected engine fault.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Shorthand for building a [`EngineError::Validation`].
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }
}
