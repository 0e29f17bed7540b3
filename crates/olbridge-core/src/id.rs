//! Catalog entity identifiers and the placeholder id allocator.
//!
//! Catalog identifiers live in two disjoint spaces:
//! - **Real ids** are positive and assigned by the catalog.
//! - **Placeholder ids** are negative and minted locally for assets the
//!   catalog does not know yet. The catalog treats a negative guid in an
//!   upsert as "create a new entity".
//!
//! # Example
//!
//! ```rust
//! use olbridge_core::id::{EntityId, PlaceholderIdAllocator};
//!
//! let mut allocator = PlaceholderIdAllocator::new();
//! assert_eq!(allocator.allocate(), EntityId::new(-1000));
//! assert_eq!(allocator.allocate(), EntityId::new(-1001));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// First identifier handed out by a fresh [`PlaceholderIdAllocator`].
pub const PLACEHOLDER_ID_START: i64 = -1000;

/// Identifier of an entity in the catalog's id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(i64);

impl EntityId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Returns true if the id was minted locally rather than assigned by the catalog.
    #[must_use]
    pub const fn is_placeholder(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<EntityId> for serde_json::Value {
    fn from(id: EntityId) -> Self {
        Self::from(id.0)
    }
}

/// Run-scoped source of placeholder identifiers.
///
/// Contract:
/// - Every call to [`allocate`](Self::allocate) returns a value strictly lower
///   than all values returned before it, starting at [`PLACEHOLDER_ID_START`].
/// - Values are always negative, so they never collide with catalog ids.
/// - One allocator belongs to one ingestion run and is never shared.
#[derive(Debug, Clone)]
pub struct PlaceholderIdAllocator {
    next: i64,
    minted: u64,
}

impl PlaceholderIdAllocator {
    /// Creates an allocator positioned at [`PLACEHOLDER_ID_START`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: PLACEHOLDER_ID_START,
            minted: 0,
        }
    }

    /// Mints the next placeholder identifier.
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next -= 1;
        self.minted += 1;
        id
    }

    /// Number of identifiers minted so far.
    #[must_use]
    pub const fn minted(&self) -> u64 {
        self.minted
    }
}

impl Default for PlaceholderIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn allocator_starts_at_minus_one_thousand() {
        let mut allocator = PlaceholderIdAllocator::new();
        assert_eq!(allocator.allocate().get(), -1000);
        assert_eq!(allocator.allocate().get(), -1001);
        assert_eq!(allocator.minted(), 2);
    }

    #[test]
    fn placeholder_flag_follows_sign() {
        assert!(EntityId::new(-1000).is_placeholder());
        assert!(!EntityId::new(42).is_placeholder());
    }

    #[test]
    fn entity_id_serializes_as_bare_integer() {
        let json = serde_json::to_string(&EntityId::new(-1002)).unwrap();
        assert_eq!(json, "-1002");
    }

    proptest! {
        #[test]
        fn allocated_ids_strictly_decrease(count in 1usize..500) {
            let mut allocator = PlaceholderIdAllocator::new();
            let ids: Vec<i64> = (0..count).map(|_| allocator.allocate().get()).collect();

            prop_assert_eq!(ids[0], PLACEHOLDER_ID_START);
            for pair in ids.windows(2) {
                prop_assert!(pair[1] < pair[0]);
            }
            prop_assert!(ids.iter().all(|id| *id < 0));
        }
    }
}
