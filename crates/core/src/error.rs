//! Engine error model.

use thiserror::Error;

/// Result type used across the engine crates.
pub type EngineResult<T> = Result<T, EngineError>;

/// Coarse classification of a failure, used by callers to decide how to
/// surface it (verbatim to the user vs. as an internal error).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing input; recoverable by the user.
    Input,
    /// Cents could not be conserved; a logic defect.
    Conservation,
    /// Aggregated state is inconsistent; upstream data corruption.
    StateInvariant,
}

/// Engine-level error.
///
/// Every component error converts into this type. None of these are
/// transient: the engine is pure, so retrying the same input yields the same
/// error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed or missing policy parameters. The message is user-facing.
    #[error("{0}")]
    Input(String),

    /// Exact cent conservation could not be enforced.
    #[error("conservation violated: {0}")]
    Conservation(String),

    /// Balances (or a plan derived from them) do not net to zero.
    #[error("state invariant violated: {0}")]
    StateInvariant(String),
}

impl EngineError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn conservation(msg: impl Into<String>) -> Self {
        Self::Conservation(msg.into())
    }

    pub fn state_invariant(msg: impl Into<String>) -> Self {
        Self::StateInvariant(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Input(_) => ErrorKind::Input,
            EngineError::Conservation(_) => ErrorKind::Conservation,
            EngineError::StateInvariant(_) => ErrorKind::StateInvariant,
        }
    }

    /// Whether the message may be shown to the end user as-is.
    pub fn is_user_facing(&self) -> bool {
        self.kind() == ErrorKind::Input
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_display_their_message_verbatim() {
        let err = EngineError::input("shares must be positive whole numbers");
        assert_eq!(err.to_string(), "shares must be positive whole numbers");
        assert!(err.is_user_facing());
    }

    #[test]
    fn internal_errors_are_not_user_facing() {
        assert!(!EngineError::conservation("off by 1").is_user_facing());
        assert_eq!(
            EngineError::state_invariant("sum is 3").kind(),
            ErrorKind::StateInvariant
        );
    }
}
