//! Suppression of redelivered lineage events.
//!
//! The event bus may deliver the same event more than once. Reprocessing it
//! would mint a second set of placeholders and repeat every catalog write, so
//! each event's entity set is hashed and remembered for a configured TTL.
//!
//! ## Protocol
//!
//! 1. Compute `base64(SHA256(serialized entities array))`. Array order
//!    matters: the same entities in a different order are a different
//!    event. Object keys are serialized in sorted order, so payloads that
//!    differ only in key order within an object share a key.
//! 2. If the store holds the key with an expiry after `now`, decline.
//! 3. Otherwise insert the key with expiry `now + ttl` and proceed.
//!
//! ## Races
//!
//! Steps 2 and 3 are not atomic. Two invocations handling the same
//! redelivered event at the same moment can both observe "not seen" and both
//! process it. The window is narrow and the outcome is the same as without
//! the cache, so the race is accepted rather than locked away.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{IngestError, Result};
use crate::metrics::record_duplicate_suppressed;

/// Content hash of an event's entity array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupKey(String);

impl DedupKey {
    /// Hashes an entity array.
    ///
    /// # Errors
    ///
    /// Returns an error if the entities cannot be serialized.
    pub fn from_entities(entities: &[Value]) -> Result<Self> {
        let serialized = serde_json::to_vec(entities).map_err(|e| IngestError::InvalidPayload {
            message: format!("failed to serialize entities for hashing: {e}"),
        })?;
        let digest = Sha256::digest(&serialized);
        Ok(Self(STANDARD.encode(digest)))
    }

    /// Returns the encoded hash.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage for dedup keys and their absolute expiry.
///
/// The in-memory store fits a single instance. Deployments running several
/// instances behind one event bus can back this with a shared store.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Returns true if `key` is present and expires after `now`.
    async fn contains(&self, key: &DedupKey, now: DateTime<Utc>) -> Result<bool>;

    /// Records `key` until `expires_at`, replacing any previous expiry.
    async fn insert(&self, key: DedupKey, expires_at: DateTime<Utc>) -> Result<()>;

    /// Drops every entry that expired at or before `now`. Returns the count.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// Process-wide in-memory dedup store.
#[derive(Debug, Default, Clone)]
pub struct MemoryDedupStore {
    entries: Arc<RwLock<HashMap<DedupKey, DateTime<Utc>>>>,
}

impl MemoryDedupStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys, expired or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self
            .entries
            .read()
            .map_err(|_| IngestError::dedup("lock poisoned"))?
            .len())
    }

    /// Returns true if no keys are stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|len| len == 0)
    }
}

#[async_trait]
impl DedupStore for MemoryDedupStore {
    async fn contains(&self, key: &DedupKey, now: DateTime<Utc>) -> Result<bool> {
        let entries = self
            .entries
            .read()
            .map_err(|_| IngestError::dedup("lock poisoned"))?;
        Ok(entries.get(key).is_some_and(|expires_at| *expires_at > now))
    }

    async fn insert(&self, key: DedupKey, expires_at: DateTime<Utc>) -> Result<()> {
        self.entries
            .write()
            .map_err(|_| IngestError::dedup("lock poisoned"))?
            .insert(key, expires_at);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| IngestError::dedup("lock poisoned"))?;
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        Ok(before - entries.len())
    }
}

/// Decides whether an event should be processed.
#[derive(Clone)]
pub struct EventDeduplicator {
    store: Arc<dyn DedupStore>,
    ttl: chrono::Duration,
}

impl std::fmt::Debug for EventDeduplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDeduplicator")
            .field("store", &"DedupStore")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl EventDeduplicator {
    /// Creates a deduplicator over `store` with entries living for `ttl`.
    #[must_use]
    pub fn new(store: Arc<dyn DedupStore>, ttl: chrono::Duration) -> Self {
        Self { store, ttl }
    }

    /// Creates a deduplicator backed by a fresh [`MemoryDedupStore`].
    #[must_use]
    pub fn in_memory(ttl: chrono::Duration) -> Self {
        Self::new(Arc::new(MemoryDedupStore::new()), ttl)
    }

    /// Returns the configured TTL.
    #[must_use]
    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Returns true if the event keyed by `key` has not been seen within the
    /// TTL, and records it as seen.
    ///
    /// The key comes from [`LineageEvent::dedup_key`](crate::event::LineageEvent::dedup_key).
    pub async fn should_process(&self, key: &DedupKey) -> bool {
        self.check_at(key, Utc::now()).await
    }

    /// Returns true if `key` has not been seen within the TTL as of `now`,
    /// and records it as seen.
    ///
    /// Store failures fail open: the event is processed and the failure is
    /// logged, since dropping an event loses lineage while a duplicate only
    /// costs redundant writes.
    pub async fn check_at(&self, key: &DedupKey, now: DateTime<Utc>) -> bool {
        match self.store.contains(key, now).await {
            Ok(true) => {
                record_duplicate_suppressed();
                return false;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(event_key = %key, error = %e, "dedup lookup failed; processing event");
                return true;
            }
        }

        if let Err(e) = self.store.purge_expired(now).await {
            tracing::warn!(error = %e, "failed to purge expired dedup entries");
        }
        let expires_at = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if let Err(e) = self.store.insert(key.clone(), expires_at).await {
            tracing::warn!(event_key = %key, error = %e, "failed to record dedup key");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LineageEvent;
    use proptest::prelude::*;
    use serde_json::json;

    fn key_for(entities: &[Value]) -> DedupKey {
        DedupKey::from_entities(entities).unwrap()
    }

    #[test]
    fn key_is_fixed_width_base64() {
        let key = key_for(&[json!({"typeName": "t"})]);
        // 32-byte digest -> 44 base64 characters with padding.
        assert_eq!(key.as_str().len(), 44);
        assert!(key.as_str().ends_with('='));
    }

    #[test]
    fn key_is_order_sensitive() {
        let a = json!({"typeName": "a"});
        let b = json!({"typeName": "b"});
        assert_ne!(key_for(&[a.clone(), b.clone()]), key_for(&[b, a]));
    }

    #[test]
    fn key_ignores_object_key_order() {
        let a: Value = serde_json::from_str(r#"{"typeName":"t","attributes":{"qualifiedName":"q"}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"attributes":{"qualifiedName":"q"},"typeName":"t"}"#).unwrap();
        assert_eq!(key_for(&[a]), key_for(&[b]));
    }

    #[tokio::test]
    async fn should_process_declines_redelivered_event() {
        let dedup = EventDeduplicator::in_memory(chrono::Duration::seconds(60));
        let event = LineageEvent::from_entities(vec![json!({"typeName": "t"})]);
        let key = event.dedup_key().unwrap();

        assert!(dedup.should_process(&key).await);
        assert!(!dedup.should_process(&key).await);
    }

    #[tokio::test]
    async fn second_delivery_within_ttl_is_declined() {
        let dedup = EventDeduplicator::in_memory(chrono::Duration::seconds(60));
        let key = key_for(&[json!({"typeName": "t"})]);
        let now = Utc::now();

        assert!(dedup.check_at(&key, now).await);
        assert!(!dedup.check_at(&key, now + chrono::Duration::seconds(30)).await);
    }

    #[tokio::test]
    async fn delivery_after_expiry_is_processed_again() {
        let dedup = EventDeduplicator::in_memory(chrono::Duration::seconds(60));
        let key = key_for(&[json!({"typeName": "t"})]);
        let now = Utc::now();

        assert!(dedup.check_at(&key, now).await);
        assert!(dedup.check_at(&key, now + chrono::Duration::seconds(61)).await);
        assert!(!dedup.check_at(&key, now + chrono::Duration::seconds(62)).await);
    }

    #[tokio::test]
    async fn insert_purges_expired_entries() {
        let store = Arc::new(MemoryDedupStore::new());
        let dedup = EventDeduplicator::new(store.clone(), chrono::Duration::seconds(10));
        let now = Utc::now();

        dedup.check_at(&key_for(&[json!(1)]), now).await;
        dedup.check_at(&key_for(&[json!(2)]), now).await;
        assert_eq!(store.len().unwrap(), 2);

        dedup
            .check_at(&key_for(&[json!(3)]), now + chrono::Duration::seconds(11))
            .await;
        assert_eq!(store.len().unwrap(), 1);
    }

    struct BrokenStore;

    #[async_trait]
    impl DedupStore for BrokenStore {
        async fn contains(&self, _key: &DedupKey, _now: DateTime<Utc>) -> Result<bool> {
            Err(IngestError::dedup("unreachable"))
        }

        async fn insert(&self, _key: DedupKey, _expires_at: DateTime<Utc>) -> Result<()> {
            Err(IngestError::dedup("unreachable"))
        }

        async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<usize> {
            Err(IngestError::dedup("unreachable"))
        }
    }

    #[tokio::test]
    async fn store_failure_fails_open() {
        let dedup = EventDeduplicator::new(Arc::new(BrokenStore), chrono::Duration::seconds(60));
        let key = key_for(&[json!({"typeName": "t"})]);
        assert!(dedup.check_at(&key, Utc::now()).await);
        assert!(dedup.check_at(&key, Utc::now()).await);
    }

    proptest! {
        #[test]
        fn key_is_deterministic(names in prop::collection::vec("[a-zA-Z/]{1,24}", 0..8)) {
            let entities: Vec<Value> = names
                .iter()
                .map(|n| json!({"typeName": "t", "attributes": {"qualifiedName": n}}))
                .collect();
            prop_assert_eq!(key_for(&entities), key_for(&entities.clone()));
        }
    }
}
