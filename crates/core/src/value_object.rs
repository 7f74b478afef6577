//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** once constructed; to "change" one, build a
/// new one. What counts as "the value" is up to the implementor: a value that
/// mirrors a storage row may choose to compare by its key alone.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
