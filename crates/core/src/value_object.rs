//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have **no identity**: two instances carrying the same values
/// are the same value (`Money`, line items, totals). They are immutable; to
/// "change" one, build a new one.
///
/// ```ignore
/// let a = Money::from_minor(10_000);
/// let b = Money::parse("100.00")?;
/// assert_eq!(a, b);
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
