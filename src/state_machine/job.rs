use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::JobStatus;

/// The terminal result of a lesson job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    /// The final asset was published.
    Success { result: String, message: String },
    /// Some stage failed; carries the cause verbatim.
    Failure(String),
}

fn default_teacher_name() -> String {
    "Teacher".to_string()
}

fn default_language() -> String {
    "English".to_string()
}

fn default_tone() -> String {
    "Exam Focus".to_string()
}

/// A request to produce one personalized lesson video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonRequest {
    /// Topic identifier, e.g. `PHY12_01_02`. Required.
    pub topic_id: String,
    #[serde(default = "default_teacher_name")]
    pub teacher_name: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default)]
    pub avatar_id: Option<String>,
}

impl LessonRequest {
    /// A request for `topic_id` with every other field defaulted.
    pub fn for_topic(topic_id: impl Into<String>) -> Self {
        Self {
            topic_id: topic_id.into(),
            teacher_name: default_teacher_name(),
            language: default_language(),
            tone: default_tone(),
            avatar_id: None,
        }
    }
}

/// A single lesson job tracked by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonJob {
    pub id: String,
    pub request: LessonRequest,
    pub status: JobStatus,
    pub message: Option<String>,
    pub result: Option<String>,
    pub state_history: Vec<JobStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LessonJob {
    pub fn new(request: LessonRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            request,
            status: JobStatus::Queued,
            message: None,
            result: None,
            state_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id.clone(),
            status: self.status,
            message: self.message.clone(),
            result: self.result.clone(),
        }
    }
}

/// What a polling caller sees of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub message: Option<String>,
    pub result: Option<String>,
}

/// Structured report produced once a job reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: String,
    pub topic_id: String,
    pub status: JobStatus,
    pub state_transitions: Vec<JobStatus>,
    pub result: Option<String>,
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl JobReport {
    pub fn from_job(job: &LessonJob) -> Self {
        let mut transitions = job.state_history.clone();
        transitions.push(job.status);

        Self {
            job_id: job.id.clone(),
            topic_id: job.request.topic_id.clone(),
            status: job.status,
            state_transitions: transitions,
            result: job.result.clone(),
            message: job.message.clone(),
            started_at: job.created_at,
            completed_at: job.updated_at,
            duration_ms: (job.updated_at - job.created_at).num_milliseconds(),
        }
    }
}
