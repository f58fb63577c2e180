//! Per-session fetch cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as SyncMutex};

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::ScrapingResult;

/// Successful fetches keyed by normalized URL.
///
/// Failures are never stored, so a URL that failed is fetched again on the
/// next request. A per-URL lock lets callers keep at most one fetch per URL
/// in flight: the second caller waits on the lock and then finds the entry.
#[derive(Debug, Default)]
pub struct FetchCache {
    entries: RwLock<HashMap<String, ScrapingResult>>,
    in_flight: Arc<SyncMutex<SlotMap>>,
}

type SlotMap = HashMap<String, Arc<Mutex<()>>>;

/// Exclusive fetch slot for one URL. The slot is forgotten once the last
/// holder or waiter lets go of it.
pub struct FetchSlot {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    slots: Arc<SyncMutex<SlotMap>>,
}

impl Drop for FetchSlot {
    fn drop(&mut self) {
        drop(self.guard.take());
        if let Ok(mut slots) = self.slots.lock() {
            // Waiters clone the slot under this lock, so a count of one
            // means nobody else is queued on it.
            if slots
                .get(&self.key)
                .is_some_and(|slot| Arc::strong_count(slot) == 1)
            {
                slots.remove(&self.key);
            }
        }
    }
}

impl FetchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<ScrapingResult> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn insert(&self, key: String, result: ScrapingResult) {
        self.entries.write().await.insert(key, result);
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Take the exclusive fetch slot for `key`.
    pub async fn lock_url(&self, key: &str) -> FetchSlot {
        let slot = match self.in_flight.lock() {
            Ok(mut slots) => Arc::clone(
                slots
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            ),
            // A poisoned map only loses coalescing, not correctness.
            Err(_) => Arc::new(Mutex::new(())),
        };
        FetchSlot {
            guard: Some(slot.lock_owned().await),
            key: key.to_string(),
            slots: Arc::clone(&self.in_flight),
        }
    }

    /// Number of URLs with a fetch in flight or queued.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().map(|slots| slots.len()).unwrap_or_default()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    fn result(url: &str) -> ScrapingResult {
        ScrapingResult {
            url: url.to_string(),
            content: "body".to_string(),
            metadata: Default::default(),
            source_target: "t".to_string(),
            fetched_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_get_clear() {
        let cache = FetchCache::new();
        assert!(cache.is_empty().await);

        cache
            .insert("https://a.com/".into(), result("https://a.com/"))
            .await;
        assert!(cache.contains("https://a.com/").await);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("https://a.com/").await.unwrap().content, "body");

        cache.clear().await;
        assert!(cache.get("https://a.com/").await.is_none());
    }

    #[tokio::test]
    async fn test_lock_url_serializes_same_key() {
        let cache = Arc::new(FetchCache::new());
        let guard = cache.lock_url("https://a.com/").await;

        let waiter = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let _guard = cache.lock_url("https://a.com/").await;
                cache.get("https://a.com/").await
            })
        };

        // A different key is not blocked.
        let _other = cache.lock_url("https://b.com/").await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        cache
            .insert("https://a.com/".into(), result("https://a.com/"))
            .await;
        drop(guard);

        let seen = waiter.await.unwrap();
        assert!(seen.is_some());
    }

    #[tokio::test]
    async fn test_released_slots_are_forgotten() {
        let cache = Arc::new(FetchCache::new());
        for i in 0..5 {
            let _slot = cache.lock_url(&format!("https://{}.example.com/", i)).await;
        }
        assert_eq!(cache.in_flight(), 0);

        let guard = cache.lock_url("https://a.com/").await;
        let waiter = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let _slot = cache.lock_url("https://a.com/").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.in_flight(), 1);

        // The queued waiter keeps the slot alive past the first release.
        drop(guard);
        waiter.await.unwrap();
        assert_eq!(cache.in_flight(), 0);
    }
}
