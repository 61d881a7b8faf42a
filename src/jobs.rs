//! Job table behind the orchestrator.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{LessonError, Result};
use crate::state_machine::LessonJob;

const DEFAULT_MAX_RETAINED: usize = 10_000;

/// Storage for job records. Reads return whole cloned records, so callers
/// never observe a half-applied update.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: &LessonJob) -> Result<()>;
    async fn get(&self, job_id: &str) -> Result<Option<LessonJob>>;
    async fn update(&self, job: &LessonJob) -> Result<()>;
}

/// In-memory job table with a retention cap.
///
/// When full, the oldest terminal job is evicted to make room. Jobs still in
/// progress are never evicted, so the table can exceed the cap while more
/// than `max_retained` jobs are in flight.
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, LessonJob>>,
    order: RwLock<VecDeque<String>>,
    max_retained: usize,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::with_max_retained(DEFAULT_MAX_RETAINED)
    }

    pub fn with_max_retained(max_retained: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            order: RwLock::new(VecDeque::new()),
            max_retained: max_retained.max(1),
        }
    }

    fn evict_oldest_terminal(jobs: &mut HashMap<String, LessonJob>, order: &mut VecDeque<String>) {
        let position = order
            .iter()
            .position(|id| jobs.get(id).is_some_and(|j| j.status.is_terminal()));
        match position.and_then(|i| order.remove(i)) {
            Some(id) => {
                jobs.remove(&id);
                tracing::debug!(job_id = %id, "evicted finished job");
            }
            None => tracing::warn!(
                retained = jobs.len(),
                "job table over capacity with no finished jobs to evict"
            ),
        }
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: &LessonJob) -> Result<()> {
        let mut jobs = self
            .jobs
            .write()
            .map_err(|e| LessonError::Storage(e.to_string()))?;
        let mut order = self
            .order
            .write()
            .map_err(|e| LessonError::Storage(e.to_string()))?;

        if jobs.contains_key(&job.id) {
            return Err(LessonError::Storage(format!("duplicate job id {}", job.id)));
        }
        if jobs.len() >= self.max_retained {
            Self::evict_oldest_terminal(&mut jobs, &mut order);
        }
        jobs.insert(job.id.clone(), job.clone());
        order.push_back(job.id.clone());
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<LessonJob>> {
        let jobs = self
            .jobs
            .read()
            .map_err(|e| LessonError::Storage(e.to_string()))?;
        Ok(jobs.get(job_id).cloned())
    }

    async fn update(&self, job: &LessonJob) -> Result<()> {
        let mut jobs = self
            .jobs
            .write()
            .map_err(|e| LessonError::Storage(e.to_string()))?;
        match jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job.clone();
                Ok(())
            }
            None => Err(LessonError::JobNotFound(job.id.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{JobOutcome, JobStatus, LessonRequest, StateMachine};

    fn job(topic: &str) -> LessonJob {
        LessonJob::new(LessonRequest::for_topic(topic))
    }

    fn failed(topic: &str) -> LessonJob {
        let mut j = job(topic);
        StateMachine::finish(&mut j, JobOutcome::Failure("x".into())).unwrap();
        j
    }

    #[tokio::test]
    async fn create_get_update() {
        let store = InMemoryJobStore::new();
        let mut j = job("T1");
        store.create(&j).await.unwrap();

        StateMachine::advance(&mut j, JobStatus::Researching).unwrap();
        store.update(&j).await.unwrap();

        let loaded = store.get(&j.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Researching);
    }

    #[tokio::test]
    async fn get_unknown_is_none() {
        let store = InMemoryJobStore::new();
        assert!(store.get("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_unknown_is_not_found() {
        let store = InMemoryJobStore::new();
        let err = store.update(&job("T1")).await.unwrap_err();
        assert!(matches!(err, LessonError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let store = InMemoryJobStore::new();
        let j = job("T1");
        store.create(&j).await.unwrap();
        assert!(store.create(&j).await.is_err());
    }

    #[tokio::test]
    async fn capacity_evicts_oldest_terminal_job() {
        let store = InMemoryJobStore::with_max_retained(2);
        let running = job("running");
        let done = failed("done");
        store.create(&running).await.unwrap();
        store.create(&done).await.unwrap();

        let newest = job("newest");
        store.create(&newest).await.unwrap();

        assert!(store.get(&running.id).await.unwrap().is_some());
        assert!(store.get(&done.id).await.unwrap().is_none());
        assert!(store.get(&newest.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn in_flight_jobs_are_never_evicted() {
        let store = InMemoryJobStore::with_max_retained(1);
        let a = job("a");
        let b = job("b");
        store.create(&a).await.unwrap();
        store.create(&b).await.unwrap();

        assert!(store.get(&a.id).await.unwrap().is_some());
        assert!(store.get(&b.id).await.unwrap().is_some());
    }
}
