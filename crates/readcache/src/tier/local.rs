//! In-process tier backed by `DashMap`.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;

use super::{LocalTier, LocalValue, expires_at};
use crate::error::TierError;

/// A local entry with its expiry.
#[derive(Clone, Debug)]
struct Entry {
    value: LocalValue,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Local tier holding typed values in a concurrent map.
///
/// Expired entries are invisible to readers and removed when touched.
/// [`MemoryTier::spawn_cleanup`] sweeps the rest periodically.
#[derive(Default)]
pub struct MemoryTier {
    entries: DashMap<String, Entry>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every expired entry. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.entries.retain(|_, entry| {
            if entry.is_expired(now) {
                removed += 1;
                false
            } else {
                true
            }
        });

        removed
    }

    /// Start the housekeeping task that calls [`cleanup_expired`](Self::cleanup_expired)
    /// every `interval`.
    ///
    /// The task only holds a weak reference and exits once the tier is dropped.
    pub fn spawn_cleanup(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let tier: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(tier) = tier.upgrade() else {
                    tracing::debug!("local tier dropped, stopping cleanup task");
                    return;
                };
                let removed = tier.cleanup_expired();
                if removed > 0 {
                    tracing::debug!(removed, remaining = tier.len(), "local tier cleanup");
                }
            }
        })
    }

    /// Number of entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    fn live(&self, key: &str) -> Option<LocalValue> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
            // Release the read guard before removing.
            drop(entry);
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        None
    }
}

#[async_trait]
impl LocalTier for MemoryTier {
    async fn get(&self, key: &str) -> Option<LocalValue> {
        self.live(key)
    }

    async fn put(&self, key: &str, value: LocalValue, ttl: Duration) -> Result<(), TierError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: expires_at(ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), TierError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, TierError> {
        Ok(self.live(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get() {
        let tier = MemoryTier::new();
        tier.put(
            "k",
            LocalValue::present(Arc::new("v".to_string())),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

        let value = tier.get("k").await.expect("present");
        let value = value.downcast::<String>().unwrap().unwrap();
        assert_eq!(value.as_str(), "v");
        assert_eq!(tier.len(), 1);
    }

    #[tokio::test]
    async fn test_absent_is_distinct_from_missing() {
        let tier = MemoryTier::new();
        tier.put("negative", LocalValue::absent(), Duration::from_secs(60))
            .await
            .unwrap();

        let cached = tier.get("negative").await.expect("entry exists");
        assert!(cached.is_absent());
        assert!(tier.exists("negative").await.unwrap());

        assert!(tier.get("missing").await.is_none());
        assert!(!tier.exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_expiration() {
        let tier = MemoryTier::new();
        tier.put(
            "expiring",
            LocalValue::present(Arc::new(1_u8)),
            Duration::from_millis(20),
        )
        .await
        .unwrap();
        assert!(tier.get("expiring").await.is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(tier.get("expiring").await.is_none());
        assert!(!tier.exists("expiring").await.unwrap());
        // Touching the expired entry removed it.
        assert!(tier.is_empty());
    }

    #[tokio::test]
    async fn test_zero_ttl_is_kept() {
        let tier = MemoryTier::new();
        tier.put("forever", LocalValue::absent(), Duration::ZERO)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(tier.cleanup_expired(), 0);
        assert!(tier.get("forever").await.is_some());
    }

    #[tokio::test]
    async fn test_huge_ttl_is_kept() {
        let tier = MemoryTier::new();
        tier.put("huge", LocalValue::present(Arc::new(1_u8)), Duration::MAX)
            .await
            .unwrap();

        assert_eq!(tier.cleanup_expired(), 0);
        assert!(tier.exists("huge").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let tier = MemoryTier::new();
        tier.put("k", LocalValue::absent(), Duration::from_secs(60))
            .await
            .unwrap();
        tier.delete("k").await.unwrap();
        assert!(tier.get("k").await.is_none());

        // Deleting a missing key is not an error.
        tier.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let tier = MemoryTier::new();
        for i in 0..3 {
            tier.put(
                &format!("short-{i}"),
                LocalValue::absent(),
                Duration::from_millis(10),
            )
            .await
            .unwrap();
        }
        tier.put("long", LocalValue::absent(), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(tier.cleanup_expired(), 3);
        assert_eq!(tier.len(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_task_sweeps_and_stops() {
        let tier = Arc::new(MemoryTier::new());
        tier.put("short", LocalValue::absent(), Duration::from_millis(5))
            .await
            .unwrap();

        let handle = tier.spawn_cleanup(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(tier.len(), 0);

        drop(tier);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("cleanup task exits after tier drop")
            .unwrap();
    }
}
