//! Allocation errors.

use thiserror::Error;

use splitledger_core::{EngineError, ErrorKind, Money, UserId};

use crate::policy::SplitKind;

/// Why an allocation could not be produced.
///
/// Everything except [`AllocationError::UnreconciledRounding`] is an input
/// problem; that one means the repair pass failed to conserve cents and is a
/// defect in the allocator itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("an expense needs at least one participant")]
    EmptyParticipants,

    #[error("participant {user} is listed more than once")]
    DuplicateParticipant { user: UserId },

    #[error("expense total must be positive (got {total})")]
    NonPositiveTotal { total: Money },

    /// A required per-user parameter is missing.
    #[error("{kind} split has no value for participant {user}")]
    PolicyMismatch { kind: SplitKind, user: UserId },

    #[error("{kind} split has a value for {user}, who is not a participant")]
    UnknownParticipant { kind: SplitKind, user: UserId },

    #[error("amount for {user} must not be negative (got {amount})")]
    NegativeAmount { user: UserId, amount: Money },

    #[error("share count for {user} must be positive")]
    ZeroShare { user: UserId },

    #[error("exact amounts sum to {actual} but the total is {expected}")]
    ExactSumMismatch { expected: Money, actual: Money },

    #[error("percentages sum to {hundredths} hundredths of a percent instead of 10000")]
    PercentageTotal { hundredths: u64 },

    #[error("allocation sums to {actual} after repair but the total is {expected}")]
    UnreconciledRounding { expected: Money, actual: Money },
}

impl AllocationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AllocationError::UnreconciledRounding { .. } => ErrorKind::Conservation,
            _ => ErrorKind::Input,
        }
    }
}

impl From<AllocationError> for EngineError {
    fn from(err: AllocationError) -> Self {
        match err.kind() {
            ErrorKind::Conservation => EngineError::conservation(err.to_string()),
            ErrorKind::StateInvariant => EngineError::state_invariant(err.to_string()),
            ErrorKind::Input => EngineError::input(err.to_string()),
        }
    }
}
