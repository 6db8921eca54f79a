//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have **no identity**: two instances with the same attribute values
/// are the same value. They are immutable; "changing" one means building a new one.
///
/// - `Money { cents: 25_000 }` is a value object
/// - `Client { id: ClientId(...), .. }` is an entity
///
/// The bounds keep values cheap to copy around, comparable and loggable.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
