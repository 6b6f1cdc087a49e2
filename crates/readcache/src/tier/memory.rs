//! Process-local stand-in for the shared tier.
//!
//! Holds encoded text exactly as Redis would, so the orchestrator exercises
//! the same encode/decode path. Used for single-instance deployments and tests.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{RemoteTier, expires_at};
use crate::error::TierError;

#[derive(Default)]
pub struct MemoryRemoteTier {
    entries: DashMap<String, (String, Option<Instant>)>,
}

impl MemoryRemoteTier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.1.is_none_or(|at| at > now) {
                return Some(entry.0.clone());
            }
            drop(entry);
            self.entries
                .remove_if(key, |_, (_, at)| at.is_some_and(|at| at <= now));
        }
        None
    }
}

#[async_trait]
impl RemoteTier for MemoryRemoteTier {
    async fn get(&self, key: &str) -> Result<Option<String>, TierError> {
        Ok(self.live(key))
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), TierError> {
        self.entries
            .insert(key.to_string(), (value, expires_at(ttl)));
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
    async fn test_get_put_delete() {
        let tier = MemoryRemoteTier::new();
        assert_eq!(tier.get("k").await.unwrap(), None);

        tier.put("k", "\"v\"".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(tier.get("k").await.unwrap().as_deref(), Some("\"v\""));
        assert!(tier.exists("k").await.unwrap());

        tier.delete("k").await.unwrap();
        assert!(!tier.exists("k").await.unwrap());
        assert!(tier.is_empty());
    }

    #[tokio::test]
    async fn test_huge_ttl_is_kept() {
        let tier = MemoryRemoteTier::new();
        tier.put("huge", "1".to_string(), Duration::MAX)
            .await
            .unwrap();
        assert_eq!(tier.get("huge").await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_expiration() {
        let tier = MemoryRemoteTier::new();
        tier.put("k", "1".to_string(), Duration::from_millis(10))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(25)).await;

        assert_eq!(tier.get("k").await.unwrap(), None);
        assert_eq!(tier.len(), 0);
    }
}
