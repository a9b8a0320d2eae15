//! Entity trait: identity + optimistic version across state changes.

/// Stored entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;

    /// Store-assigned version: 1 on insert, +1 on every successful update.
    fn version(&self) -> i32;
}
