//! Value objects: compared by value, no identity.

/// Marker for immutable domain values (`Reason`, `LowStockAlert`, line items, ...).
///
/// Two value objects with the same attributes are the same value; to change
/// one, build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
