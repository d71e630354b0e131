//! # Per-Product Lock Registry
//!
//! SQLite has no row locks, so mutual exclusion per inventory row is done in
//! process: one async mutex per product id, created on demand.
//!
//! ## Locking Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Sale X: [B, A, B]            Sale Y: [A, C]          Sale Z: [D]       │
//! │       │                            │                       │            │
//! │       ▼ sort + dedup               ▼                       ▼            │
//! │  lock A ─► lock B              lock A (waits for X)    lock D           │
//! │       │                            │                       │            │
//! │  BEGIN … reserve … COMMIT          │                   runs in parallel │
//! │       │                            │                   with X and Y     │
//! │  drop ProductLockSet ─────────────►│ acquires A ─► C                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every holder acquires in ascending id order, so two sales with overlapping
//! product sets cannot deadlock. Sales on disjoint sets never wait on each
//! other here.
//!
//! The map holds `Weak` handles. A mutex lives only as long as someone holds
//! or waits for it. Dead entries are pruned whenever the map grows past a
//! threshold that tracks the live count.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

/// Minimum map size before dead entries are swept.
const MIN_PRUNE_THRESHOLD: usize = 64;

#[derive(Debug)]
struct Registry {
    entries: HashMap<String, Weak<AsyncMutex<()>>>,
    prune_at: usize,
}

/// Registry of per-product async mutexes.
#[derive(Debug)]
pub struct ProductLocks {
    registry: Mutex<Registry>,
}

impl Default for ProductLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductLocks {
    pub fn new() -> Self {
        ProductLocks {
            registry: Mutex::new(Registry {
                entries: HashMap::new(),
                prune_at: MIN_PRUNE_THRESHOLD,
            }),
        }
    }

    /// Returns the live mutex for `product_id`, creating it if needed.
    fn handle(&self, product_id: &str) -> Arc<AsyncMutex<()>> {
        // The registry is only touched in short, panic-free sections.
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = registry.entries.get(product_id).and_then(Weak::upgrade) {
            return existing;
        }

        let created = Arc::new(AsyncMutex::new(()));
        registry
            .entries
            .insert(product_id.to_string(), Arc::downgrade(&created));

        if registry.entries.len() > registry.prune_at {
            let before = registry.entries.len();
            registry.entries.retain(|_, weak| weak.strong_count() > 0);
            let live = registry.entries.len();
            registry.prune_at = (live * 2).max(MIN_PRUNE_THRESHOLD);
            trace!(before, live, "Pruned product lock registry");
        }

        created
    }

    /// Acquires the locks for every product in `product_ids`.
    ///
    /// Duplicates are ignored. Acquisition happens in ascending id order.
    pub async fn lock_all<I, S>(&self, product_ids: I) -> ProductLockSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids: Vec<String> = product_ids
            .into_iter()
            .map(|id| id.as_ref().to_string())
            .collect();
        ids.sort();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            let mutex = self.handle(&id);
            let guard = mutex.lock_owned().await;
            guards.push((id, guard));
        }

        ProductLockSet { guards }
    }

    /// Acquires the lock for a single product.
    pub async fn lock(&self, product_id: &str) -> ProductLockSet {
        self.lock_all([product_id]).await
    }

    /// Number of map entries, dead or alive.
    pub fn tracked(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Number of products currently held or awaited.
    pub fn live(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

/// Proof of exclusive access to a set of products.
///
/// The ledger refuses to mutate a product that is not covered by the set it
/// is handed. Dropping the set releases every lock.
#[derive(Debug)]
pub struct ProductLockSet {
    guards: Vec<(String, OwnedMutexGuard<()>)>,
}

impl ProductLockSet {
    /// Returns true if this set holds the lock for `product_id`.
    pub fn covers(&self, product_id: &str) -> bool {
        self.guards
            .binary_search_by(|(id, _)| id.as_str().cmp(product_id))
            .is_ok()
    }

    /// Product ids held, in acquisition order.
    pub fn product_ids(&self) -> impl Iterator<Item = &str> {
        self.guards.iter().map(|(id, _)| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_lock_set_is_sorted_and_deduplicated() {
        let locks = ProductLocks::new();
        let set = locks.lock_all(["b", "a", "b", "c"]).await;

        assert_eq!(set.product_ids().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert!(set.covers("b"));
        assert!(!set.covers("z"));
    }

    #[tokio::test]
    async fn test_same_product_is_exclusive() {
        let locks = Arc::new(ProductLocks::new());
        let held = locks.lock("a").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _set = locks.lock_all(["a", "b"]).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_disjoint_products_do_not_block() {
        let locks = ProductLocks::new();
        let _a = locks.lock("a").await;

        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock("b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_overlapping_sets_do_not_deadlock() {
        let locks = Arc::new(ProductLocks::new());
        let mut tasks = Vec::new();

        for i in 0..50 {
            let locks = locks.clone();
            tasks.push(tokio::spawn(async move {
                let ids = if i % 2 == 0 { ["x", "y"] } else { ["y", "x"] };
                let _set = locks.lock_all(ids).await;
                tokio::task::yield_now().await;
            }));
        }

        for task in tasks {
            tokio::time::timeout(Duration::from_secs(5), task)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_released_entries_are_pruned() {
        let locks = ProductLocks::new();

        for i in 0..(MIN_PRUNE_THRESHOLD * 3) {
            let _set = locks.lock(&format!("p-{i}")).await;
        }

        assert_eq!(locks.live(), 0);
        assert!(locks.tracked() <= MIN_PRUNE_THRESHOLD + 1);
    }
}
