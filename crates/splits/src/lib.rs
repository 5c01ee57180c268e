//! Expense splitting (allocation policies, allocator, pre-flight validation).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns. Every
//! allocation produced here sums exactly to its expense total.

pub mod allocator;
pub mod error;
pub mod expense;
pub mod policy;
pub mod validator;

pub use allocator::{Allocation, AllocationEntry, allocate};
pub use error::AllocationError;
pub use expense::Expense;
pub use policy::{AllocationPolicy, Percent, PercentOutOfRange, SplitKind, UnknownSplitKind};
pub use validator::{SplitDraft, SplitIssue, SplitRejected, validate_split};
