//! Entity trait: identity + creation time.

use chrono::{DateTime, Utc};

/// Record with a stable identity.
///
/// Back-office lists are always ordered newest-first by `created_at`, with the
/// identifier as tie-break, so both are part of the contract.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + Ord + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// When the record was first persisted.
    fn created_at(&self) -> DateTime<Utc>;
}
