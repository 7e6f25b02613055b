//! Entity trait: identity + continuity across state changes.

use chrono::{DateTime, Utc};

/// Entity marker + minimal interface.
///
/// Stores rely on `created_at` for "most recent first" queries, so it must be
/// set once at construction and never rewritten.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Creation timestamp.
    fn created_at(&self) -> DateTime<Utc>;

    /// Timestamp of the last persisted change.
    fn updated_at(&self) -> DateTime<Utc>;
}
