use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use crate::collaborators::Collaborators;
use crate::config::LessonConfig;
use crate::error::{LessonError, Result};
use crate::jobs::{InMemoryJobStore, JobStore};
use crate::library::LessonCache;
use crate::pipeline::{ContentPipeline, StageProfiles};
use crate::state_machine::{
    JobOutcome, JobSnapshot, JobStatus, LessonJob, LessonRequest, StateMachine,
};
use crate::stitcher::{FfmpegStitcher, VideoAssembler};

const COMPLETED_MESSAGE: &str = "Lesson ready";

/// Drives lesson jobs through the state machine in the background.
pub struct LessonOrchestrator {
    store: Arc<dyn JobStore>,
    pipeline: ContentPipeline,
    cache: Arc<LessonCache>,
    assembler: Arc<dyn VideoAssembler>,
}

impl LessonOrchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        pipeline: ContentPipeline,
        cache: Arc<LessonCache>,
        assembler: Arc<dyn VideoAssembler>,
    ) -> Self {
        Self {
            store,
            pipeline,
            cache,
            assembler,
        }
    }

    /// Wire the orchestrator from configuration and an already-built
    /// collaborator set.
    pub fn from_config(
        config: &LessonConfig,
        collaborators: &Collaborators,
        cache: Arc<LessonCache>,
    ) -> Result<Self> {
        let pipeline = ContentPipeline::new(
            collaborators.text.clone(),
            collaborators.search.clone(),
            collaborators.renderer.clone(),
            StageProfiles::from_models(&config.models),
        );
        let assembler = FfmpegStitcher::new(&config.stitcher, collaborators.blobs.clone())?;
        let store = InMemoryJobStore::with_max_retained(config.jobs.max_retained);

        Ok(Self::new(
            Arc::new(store),
            pipeline,
            cache,
            Arc::new(assembler),
        ))
    }

    /// Record a new job in QUEUED and schedule its pipeline. Returns at once.
    pub async fn submit(self: &Arc<Self>, request: LessonRequest) -> Result<String> {
        if request.topic_id.trim().is_empty() {
            return Err(LessonError::InvalidRequest(
                "topic_id must not be empty".into(),
            ));
        }

        let job = LessonJob::new(request);
        self.store.create(&job).await?;
        tracing::info!(
            job_id = %job.id,
            topic_id = %job.request.topic_id,
            teacher = %job.request.teacher_name,
            "job queued"
        );

        let this = Arc::clone(self);
        let job_id = job.id.clone();
        tokio::spawn(async move { this.run(job_id).await });

        Ok(job.id)
    }

    pub async fn status(&self, job_id: &str) -> Result<JobSnapshot> {
        Ok(self.job(job_id).await?.snapshot())
    }

    /// The full job record, including its state history.
    pub async fn job(&self, job_id: &str) -> Result<LessonJob> {
        self.store
            .get(job_id)
            .await?
            .ok_or_else(|| LessonError::JobNotFound(job_id.to_string()))
    }

    /// Poll until the job is COMPLETED or FAILED. `on_change` sees every
    /// distinct status observed along the way.
    pub async fn wait_for_terminal(
        &self,
        job_id: &str,
        poll_interval: Duration,
        mut on_change: impl FnMut(&JobSnapshot),
    ) -> Result<JobSnapshot> {
        let mut last_seen = None;
        loop {
            let snapshot = self.status(job_id).await?;
            if last_seen != Some(snapshot.status) {
                last_seen = Some(snapshot.status);
                on_change(&snapshot);
            }
            if snapshot.status.is_terminal() {
                return Ok(snapshot);
            }
            sleep(poll_interval).await;
        }
    }

    /// Top-level failure boundary. The pipeline runs as its own task so that
    /// a panic inside a collaborator still lands the job in FAILED.
    async fn run(self: Arc<Self>, job_id: String) {
        let worker = {
            let this = Arc::clone(&self);
            let job_id = job_id.clone();
            tokio::spawn(async move { this.execute(&job_id).await })
        };

        let cause = match worker.await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(join_err) => format!("pipeline aborted: {join_err}"),
        };
        self.fail(&job_id, cause).await;
    }

    async fn execute(&self, job_id: &str) -> Result<()> {
        let mut job = self.job(job_id).await?;
        let topic_id = job.request.topic_id.clone();

        self.advance(&mut job, JobStatus::Researching).await?;
        let core_ref = {
            let _claim = self.cache.claim(&topic_id).await;
            match self.cache.lookup(&topic_id).await {
                Some(lesson) => lesson.asset_ref,
                None => {
                    let brief = self.pipeline.research(&topic_id).await?;
                    self.advance(&mut job, JobStatus::Scripting).await?;
                    let script = self.pipeline.write_core_script(&brief).await?;
                    self.advance(&mut job, JobStatus::Rendering).await?;
                    let asset_ref = self.pipeline.render_core(&script).await?;
                    self.cache.store(&topic_id, &asset_ref).await;
                    asset_ref
                }
            }
        };

        self.advance(&mut job, JobStatus::Personalizing).await?;
        let intro_script = self.pipeline.write_intro_script(&job.request).await?;
        let intro_ref = self
            .pipeline
            .render_intro(&intro_script, job.request.avatar_id.as_deref())
            .await?;

        self.advance(&mut job, JobStatus::Stitching).await?;
        let final_ref = self.assembler.stitch(&intro_ref, &core_ref).await?;

        StateMachine::finish(
            &mut job,
            JobOutcome::Success {
                result: final_ref.clone(),
                message: COMPLETED_MESSAGE.to_string(),
            },
        )?;
        self.store.update(&job).await?;
        tracing::info!(job_id, topic_id = %topic_id, result = %final_ref, "job completed");
        Ok(())
    }

    async fn advance(&self, job: &mut LessonJob, next: JobStatus) -> Result<()> {
        StateMachine::advance(job, next)?;
        self.store.update(job).await?;
        tracing::info!(job_id = %job.id, status = %next, "job advanced");
        Ok(())
    }

    async fn fail(&self, job_id: &str, cause: String) {
        tracing::error!(job_id, error = %cause, "job failed");

        let mut job = match self.store.get(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::warn!(job_id, "failed job no longer in store");
                return;
            }
            Err(e) => {
                tracing::error!(job_id, error = %e, "cannot load failed job");
                return;
            }
        };
        if job.status.is_terminal() {
            return;
        }

        if let Err(e) = StateMachine::finish(&mut job, JobOutcome::Failure(cause)) {
            tracing::error!(job_id, error = %e, "cannot mark job failed");
            return;
        }
        if let Err(e) = self.store.update(&job).await {
            tracing::error!(job_id, error = %e, "cannot persist failed job");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{
        AvatarRenderer, StageProfile, StandInGenerator, StandInSearch, TextGenerator,
    };
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    const POLL: Duration = Duration::from_millis(5);

    /// Counts calls per stage and optionally pauses before answering.
    #[derive(Default)]
    struct CountingText {
        calls: Mutex<HashMap<&'static str, usize>>,
        delay: Duration,
        gate: Option<Arc<Notify>>,
    }

    impl CountingText {
        fn count(&self, stage: &str) -> usize {
            self.calls.lock().unwrap().get(stage).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl TextGenerator for CountingText {
        async fn generate(&self, profile: &StageProfile, prompt: &str) -> Result<String> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            sleep(self.delay).await;
            *self.calls.lock().unwrap().entry(profile.name).or_default() += 1;
            StandInGenerator.generate(profile, prompt).await
        }
    }

    /// Hands out numbered asset references; can be told to fail or panic.
    #[derive(Default)]
    struct FakeRenderer {
        renders: AtomicUsize,
        fail: bool,
        panic: bool,
    }

    #[async_trait]
    impl AvatarRenderer for FakeRenderer {
        async fn render(&self, _script: &str, avatar: Option<&str>) -> Result<String> {
            if self.panic {
                panic!("renderer blew up");
            }
            if self.fail {
                return Err(LessonError::collaborator("renderer", "quota exceeded"));
            }
            let n = self.renders.fetch_add(1, Ordering::SeqCst);
            Ok(format!("asset://{}/{n}", avatar.unwrap_or("core")))
        }
    }

    #[derive(Default)]
    struct FakeAssembler {
        calls: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl VideoAssembler for FakeAssembler {
        async fn stitch(&self, first: &str, second: &str) -> Result<String> {
            if self.fail {
                return Err(LessonError::Stitching("ffmpeg exited with 1".into()));
            }
            let mut calls = self.calls.lock().unwrap();
            calls.push((first.to_string(), second.to_string()));
            Ok(format!("final://{}", calls.len()))
        }
    }

    struct Harness {
        orchestrator: Arc<LessonOrchestrator>,
        text: Arc<CountingText>,
        renderer: Arc<FakeRenderer>,
        assembler: Arc<FakeAssembler>,
        cache: Arc<LessonCache>,
    }

    fn harness(text: CountingText, renderer: FakeRenderer, assembler: FakeAssembler) -> Harness {
        let text = Arc::new(text);
        let renderer = Arc::new(renderer);
        let assembler = Arc::new(assembler);
        let cache = Arc::new(LessonCache::in_memory());
        let pipeline = ContentPipeline::new(
            text.clone(),
            Arc::new(StandInSearch),
            renderer.clone(),
            StageProfiles::default(),
        );
        let orchestrator = Arc::new(LessonOrchestrator::new(
            Arc::new(InMemoryJobStore::new()),
            pipeline,
            cache.clone(),
            assembler.clone(),
        ));
        Harness {
            orchestrator,
            text,
            renderer,
            assembler,
            cache,
        }
    }

    fn default_harness() -> Harness {
        harness(
            CountingText::default(),
            FakeRenderer::default(),
            FakeAssembler::default(),
        )
    }

    fn rao_request() -> LessonRequest {
        let mut request = LessonRequest::for_topic("PHY12_01_02");
        request.teacher_name = "Ms. Rao".into();
        request.tone = "Exam Focus".into();
        request
    }

    async fn run_to_end(h: &Harness, request: LessonRequest) -> LessonJob {
        let id = h.orchestrator.submit(request).await.unwrap();
        h.orchestrator
            .wait_for_terminal(&id, POLL, |_| {})
            .await
            .unwrap();
        h.orchestrator.job(&id).await.unwrap()
    }

    fn path_of(job: &LessonJob) -> Vec<JobStatus> {
        let mut path = job.state_history.clone();
        path.push(job.status);
        path
    }

    #[tokio::test]
    async fn cache_miss_visits_every_stage_in_order() {
        let h = default_harness();
        let job = run_to_end(&h, rao_request()).await;

        assert_eq!(
            path_of(&job),
            vec![
                JobStatus::Queued,
                JobStatus::Researching,
                JobStatus::Scripting,
                JobStatus::Rendering,
                JobStatus::Personalizing,
                JobStatus::Stitching,
                JobStatus::Completed,
            ]
        );
        assert_eq!(job.result.as_deref(), Some("final://1"));
        assert_eq!(job.message.as_deref(), Some(COMPLETED_MESSAGE));
        assert!(h.cache.lookup("PHY12_01_02").await.is_some());
    }

    #[tokio::test]
    async fn cache_hit_skips_core_generation() {
        let h = default_harness();
        let first = run_to_end(&h, rao_request()).await;
        let second = run_to_end(&h, rao_request()).await;

        assert_eq!(
            path_of(&second),
            vec![
                JobStatus::Queued,
                JobStatus::Researching,
                JobStatus::Personalizing,
                JobStatus::Stitching,
                JobStatus::Completed,
            ]
        );
        assert_ne!(first.result, second.result);

        assert_eq!(h.text.count("research"), 1);
        assert_eq!(h.text.count("scriptwriter"), 1);
        assert_eq!(h.text.count("intro"), 2);
        // One core render plus one intro per job.
        assert_eq!(h.renderer.renders.load(Ordering::SeqCst), 3);

        let calls = h.assembler.calls.lock().unwrap();
        assert_eq!(calls[0].1, calls[1].1, "both jobs reuse the same core");
        assert_ne!(calls[0].0, calls[1].0, "each job gets a fresh intro");
    }

    #[tokio::test]
    async fn intro_is_stitched_before_core() {
        let h = default_harness();
        let mut request = rao_request();
        request.avatar_id = Some("anna".into());
        run_to_end(&h, request).await;

        let calls = h.assembler.calls.lock().unwrap();
        assert!(calls[0].0.starts_with("asset://anna/"));
        assert!(calls[0].1.starts_with("asset://core/"));
    }

    #[tokio::test]
    async fn render_failure_fails_job_without_caching() {
        let h = harness(
            CountingText::default(),
            FakeRenderer {
                fail: true,
                ..Default::default()
            },
            FakeAssembler::default(),
        );
        let job = run_to_end(&h, rao_request()).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.message.as_deref(), Some("renderer failed: quota exceeded"));
        assert!(job.result.is_none());
        assert!(h.cache.lookup("PHY12_01_02").await.is_none());
    }

    #[tokio::test]
    async fn stitch_failure_fails_job_but_keeps_core() {
        let h = harness(
            CountingText::default(),
            FakeRenderer::default(),
            FakeAssembler {
                fail: true,
                ..Default::default()
            },
        );
        let job = run_to_end(&h, rao_request()).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.result.is_none());
        assert!(job.message.unwrap().starts_with("Video stitching failed"));
        assert_eq!(
            job.state_history.last().copied(),
            Some(JobStatus::Stitching)
        );
        assert!(h.cache.lookup("PHY12_01_02").await.is_some());
    }

    #[tokio::test]
    async fn panic_in_collaborator_fails_job() {
        let h = harness(
            CountingText::default(),
            FakeRenderer {
                panic: true,
                ..Default::default()
            },
            FakeAssembler::default(),
        );
        let job = run_to_end(&h, rao_request()).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.message.unwrap().starts_with("pipeline aborted"));
    }

    #[tokio::test]
    async fn submit_returns_before_pipeline_runs() {
        let gate = Arc::new(Notify::new());
        let h = harness(
            CountingText {
                gate: Some(gate.clone()),
                ..Default::default()
            },
            FakeRenderer::default(),
            FakeAssembler::default(),
        );

        let id = h.orchestrator.submit(rao_request()).await.unwrap();
        let snapshot = h.orchestrator.status(&id).await.unwrap();
        assert!(matches!(
            snapshot.status,
            JobStatus::Queued | JobStatus::Researching
        ));
        assert!(snapshot.result.is_none());

        // research, scriptwriter, intro
        for _ in 0..3 {
            gate.notify_one();
            sleep(Duration::from_millis(20)).await;
        }
        let done = h
            .orchestrator
            .wait_for_terminal(&id, POLL, |_| {})
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn concurrent_misses_generate_core_once() {
        let h = harness(
            CountingText {
                delay: Duration::from_millis(30),
                ..Default::default()
            },
            FakeRenderer::default(),
            FakeAssembler::default(),
        );

        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(h.orchestrator.submit(rao_request()).await.unwrap());
        }
        for id in &ids {
            let done = h
                .orchestrator
                .wait_for_terminal(id, POLL, |_| {})
                .await
                .unwrap();
            assert_eq!(done.status, JobStatus::Completed);
        }

        assert_eq!(h.text.count("research"), 1);
        assert_eq!(h.text.count("scriptwriter"), 1);
        assert_eq!(h.text.count("intro"), 3);
    }

    #[tokio::test]
    async fn wait_reports_each_status_once() {
        let h = default_harness();
        let id = h.orchestrator.submit(rao_request()).await.unwrap();

        let mut seen = Vec::new();
        h.orchestrator
            .wait_for_terminal(&id, Duration::from_millis(1), |s| seen.push(s.status))
            .await
            .unwrap();

        let mut deduped = seen.clone();
        deduped.dedup();
        assert_eq!(seen, deduped);
        assert_eq!(seen.last(), Some(&JobStatus::Completed));
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let h = default_harness();
        let err = h.orchestrator.status("nonexistent").await.unwrap_err();
        assert!(matches!(err, LessonError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn empty_topic_is_rejected() {
        let h = default_harness();
        let err = h
            .orchestrator
            .submit(LessonRequest::for_topic("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, LessonError::InvalidRequest(_)));
    }
}
