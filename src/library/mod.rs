//! Core lesson library: topic id → previously rendered core-lesson asset.
//!
//! [`LessonCache`] is what the orchestrator talks to. It wraps one
//! [`LessonStore`] backend and never lets a backend error escape: a failed
//! read is a miss, a failed write is logged. It also hands out per-topic
//! claims so that concurrent misses for one topic produce one generation.

mod memory;
mod sqlite;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

pub use memory::MemoryLessonStore;
pub use sqlite::SqliteLessonStore;

use crate::config::{CacheBackend, CacheConfig};
use crate::error::Result;

/// A cached core lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreLesson {
    pub topic_id: String,
    pub asset_ref: String,
    /// Confidence score in percent, when the producer recorded one.
    pub confidence: Option<u8>,
}

/// Backing storage for core lessons. Last write wins.
#[async_trait]
pub trait LessonStore: Send + Sync {
    async fn get(&self, topic_id: &str) -> Result<Option<CoreLesson>>;
    async fn put(&self, lesson: &CoreLesson) -> Result<()>;
}

type InFlight = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Held while a job decides on and possibly generates a topic's core lesson.
///
/// Dropping the last claim or waiter for a topic removes its lock entry.
pub struct TopicClaim {
    topic_id: String,
    guard: Option<OwnedMutexGuard<()>>,
    in_flight: InFlight,
}

impl Drop for TopicClaim {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if map
            .get(&self.topic_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.topic_id);
        }
    }
}

pub struct LessonCache {
    store: Arc<dyn LessonStore>,
    in_flight: InFlight,
}

impl LessonCache {
    pub fn new(store: Arc<dyn LessonStore>) -> Self {
        Self {
            store,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Non-durable cache, used when no durable store is configured.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryLessonStore::new()))
    }

    /// Open the backend selected by `[cache]`.
    pub async fn open(config: &CacheConfig) -> Result<Self> {
        let store: Arc<dyn LessonStore> = match config.backend {
            CacheBackend::Memory => Arc::new(MemoryLessonStore::new()),
            CacheBackend::Sqlite => Arc::new(SqliteLessonStore::open(&config.path).await?),
        };
        tracing::info!(backend = ?config.backend, "lesson library opened");
        Ok(Self::new(store))
    }

    pub async fn lookup(&self, topic_id: &str) -> Option<CoreLesson> {
        match self.store.get(topic_id).await {
            Ok(Some(lesson)) => {
                tracing::info!(topic_id, "library hit");
                Some(lesson)
            }
            Ok(None) => {
                tracing::info!(topic_id, "library miss");
                None
            }
            Err(e) => {
                tracing::warn!(topic_id, error = %e, "library read failed; treating as miss");
                None
            }
        }
    }

    pub async fn store(&self, topic_id: &str, asset_ref: &str) {
        let lesson = CoreLesson {
            topic_id: topic_id.to_string(),
            asset_ref: asset_ref.to_string(),
            confidence: None,
        };
        match self.store.put(&lesson).await {
            Ok(()) => tracing::info!(topic_id, asset_ref, "core lesson saved to library"),
            Err(e) => tracing::warn!(topic_id, error = %e, "library write failed"),
        }
    }

    /// Wait for exclusive use of `topic_id`'s lookup-generate-store path.
    pub async fn claim(&self, topic_id: &str) -> TopicClaim {
        let lock = {
            let mut map = self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            map.entry(topic_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = lock.lock_owned().await;
        TopicClaim {
            topic_id: topic_id.to_string(),
            guard: Some(guard),
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    #[cfg(test)]
    fn in_flight_topics(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LessonError;
    use std::time::Duration;

    struct BrokenStore;

    #[async_trait]
    impl LessonStore for BrokenStore {
        async fn get(&self, _topic_id: &str) -> Result<Option<CoreLesson>> {
            Err(LessonError::Storage("connection refused".into()))
        }
        async fn put(&self, _lesson: &CoreLesson) -> Result<()> {
            Err(LessonError::Storage("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn store_then_lookup_returns_same_reference() {
        let cache = LessonCache::in_memory();
        assert!(cache.lookup("PHY12_01_02").await.is_none());

        cache.store("PHY12_01_02", "https://cdn/core.mp4").await;
        let hit = cache.lookup("PHY12_01_02").await.unwrap();
        assert_eq!(hit.asset_ref, "https://cdn/core.mp4");
    }

    #[tokio::test]
    async fn repeated_lookup_is_idempotent() {
        let cache = LessonCache::in_memory();
        cache.store("T1", "ref-1").await;
        let first = cache.lookup("T1").await;
        let second = cache.lookup("T1").await;
        assert_eq!(first, second);

        assert_eq!(cache.lookup("T2").await, cache.lookup("T2").await);
    }

    #[tokio::test]
    async fn last_write_wins() {
        let cache = LessonCache::in_memory();
        cache.store("T1", "first").await;
        cache.store("T1", "second").await;
        assert_eq!(cache.lookup("T1").await.unwrap().asset_ref, "second");
    }

    #[tokio::test]
    async fn backend_errors_become_misses() {
        let cache = LessonCache::new(Arc::new(BrokenStore));
        cache.store("T1", "ref").await;
        assert!(cache.lookup("T1").await.is_none());
    }

    #[tokio::test]
    async fn claims_serialize_per_topic() {
        let cache = Arc::new(LessonCache::in_memory());
        let held = cache.claim("T1").await;

        let waiter = {
            let cache = cache.clone();
            tokio::spawn(async move {
                let _claim = cache.claim("T1").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        // A different topic is not blocked.
        let _other = tokio::time::timeout(Duration::from_millis(50), cache.claim("T2"))
            .await
            .expect("unrelated topic should not wait");

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn released_claims_leave_no_entries() {
        let cache = LessonCache::in_memory();
        for i in 0..1000 {
            let claim = cache.claim(&format!("topic-{i}")).await;
            drop(claim);
        }
        assert_eq!(cache.in_flight_topics(), 0);
    }

    #[tokio::test]
    async fn entry_survives_while_a_waiter_is_queued() {
        let cache = Arc::new(LessonCache::in_memory());
        let held = cache.claim("T1").await;

        let waiter = {
            let cache = cache.clone();
            tokio::spawn(async move {
                let _claim = cache.claim("T1").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(held);
        assert_eq!(cache.in_flight_topics(), 1);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cache.in_flight_topics(), 0);
    }

    #[tokio::test]
    async fn open_memory_backend() {
        let cache = LessonCache::open(&CacheConfig::default()).await.unwrap();
        assert!(cache.lookup("anything").await.is_none());
    }
}
