//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Expenses and settlement records are entities: an edited expense keeps its
/// id even though its allocation is replaced.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
