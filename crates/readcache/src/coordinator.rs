//! Miss coordination: serializes loader calls so concurrent misses collapse
//! into one load.
//!
//! ## Modes
//!
//! - **Global**: one process-wide gate. At most one load runs at a time,
//!   whatever the key.
//! - **PerKey**: a registry of gates keyed by cache key. Loads of unrelated
//!   keys run concurrently; loads of the same key still collapse. A gate is
//!   dropped from the registry once its last holder or waiter releases it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorMode {
    #[default]
    Global,
    PerKey,
}

pub struct MissCoordinator {
    mode: CoordinatorMode,
    global: Arc<Mutex<()>>,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl MissCoordinator {
    pub fn new(mode: CoordinatorMode) -> Self {
        Self {
            mode,
            global: Arc::new(Mutex::new(())),
            in_flight: DashMap::new(),
        }
    }

    pub fn mode(&self) -> CoordinatorMode {
        self.mode
    }

    /// Wait for the gate covering `key`. The gate is held until the returned
    /// guard is dropped.
    pub async fn acquire(&self, key: &str) -> MissGuard<'_> {
        match self.mode {
            CoordinatorMode::Global => MissGuard {
                guard: Some(Arc::clone(&self.global).lock_owned().await),
                pending: None,
                registry: None,
            },
            CoordinatorMode::PerKey => {
                let gate = self
                    .in_flight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .clone();
                // The wait lives inside the guard so a cancelled acquire
                // still deregisters the gate.
                let mut miss = MissGuard {
                    guard: None,
                    pending: Some(Box::pin(gate.lock_owned())),
                    registry: Some((&self.in_flight, key.to_string())),
                };
                if let Some(pending) = miss.pending.as_mut() {
                    miss.guard = Some(pending.await);
                }
                miss.pending = None;
                miss
            }
        }
    }

    /// Number of keys with a held or awaited gate. Always zero in global mode.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl Default for MissCoordinator {
    fn default() -> Self {
        Self::new(CoordinatorMode::default())
    }
}

type PendingLock = Pin<Box<dyn Future<Output = OwnedMutexGuard<()>> + Send>>;

/// Holds the gate; releases it on drop.
pub struct MissGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    pending: Option<PendingLock>,
    registry: Option<(&'a DashMap<String, Arc<Mutex<()>>>, String)>,
}

impl Drop for MissGuard<'_> {
    fn drop(&mut self) {
        // Release first so our reference no longer counts.
        drop(self.pending.take());
        drop(self.guard.take());
        if let Some((registry, key)) = self.registry.take() {
            // Only the registry itself still references an idle gate. Waiters
            // hold clones, and new acquirers clone under the shard lock that
            // `remove_if` holds here.
            registry.remove_if(&key, |_, gate| Arc::strong_count(gate) == 1);
        }
    }
}
