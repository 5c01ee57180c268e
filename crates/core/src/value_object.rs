//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. `Money`,
/// allocations and split policies are value objects; to "change" one, build a
/// new one.
///
/// ```ignore
/// let a = Money::from_cents(100);
/// let b = Money::from_cents(100);
/// assert_eq!(a, b);  // Equal by value, not identity
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
