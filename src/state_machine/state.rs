use std::fmt;

use serde::{Deserialize, Serialize};

use super::job::{JobOutcome, LessonJob};
use crate::error::{LessonError, Result};

/// The states of a lesson job.
///
/// Each job flows through:
/// QUEUED → RESEARCHING → SCRIPTING → RENDERING → PERSONALIZING → STITCHING → COMPLETED
///
/// A core-lesson cache hit jumps from RESEARCHING straight to PERSONALIZING.
/// FAILED is reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Researching,
    Scripting,
    Rendering,
    Personalizing,
    Stitching,
    Completed,
    Failed,
}

impl JobStatus {
    /// Stable wire name. External pollers match on these strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Researching => "RESEARCHING",
            JobStatus::Scripting => "SCRIPTING",
            JobStatus::Rendering => "RENDERING",
            JobStatus::Personalizing => "PERSONALIZING",
            JobStatus::Stitching => "STITCHING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `next` is a legal forward step from `self`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (*self, next),
            (_, Failed)
                | (Queued, Researching)
                | (Researching, Scripting)
                | (Researching, Personalizing)
                | (Scripting, Rendering)
                | (Rendering, Personalizing)
                | (Personalizing, Stitching)
                | (Stitching, Completed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives a `LessonJob` through the state machine.
pub struct StateMachine;

impl StateMachine {
    /// Move the job into the next in-progress stage.
    ///
    /// Rejects backward moves, skipped stages, and terminal targets;
    /// use [`StateMachine::finish`] to end a job.
    pub fn advance(job: &mut LessonJob, next: JobStatus) -> Result<()> {
        if next.is_terminal() || !job.status.can_transition_to(next) {
            return Err(LessonError::InvalidTransition {
                from: job.status,
                to: next,
            });
        }
        Self::enter(job, next);
        Ok(())
    }

    /// Move the job into a terminal state.
    ///
    /// - `Success` is only legal from STITCHING and sets `result`.
    /// - `Failure` is legal from any non-terminal state, sets `message`,
    ///   and leaves `result` unset.
    pub fn finish(job: &mut LessonJob, outcome: JobOutcome) -> Result<()> {
        let target = match &outcome {
            JobOutcome::Success { .. } => JobStatus::Completed,
            JobOutcome::Failure(_) => JobStatus::Failed,
        };
        if !job.status.can_transition_to(target) {
            return Err(LessonError::InvalidTransition {
                from: job.status,
                to: target,
            });
        }

        Self::enter(job, target);
        match outcome {
            JobOutcome::Success { result, message } => {
                job.result = Some(result);
                job.message = Some(message);
            }
            JobOutcome::Failure(cause) => {
                job.result = None;
                job.message = Some(cause);
            }
        }
        Ok(())
    }

    fn enter(job: &mut LessonJob, next: JobStatus) {
        job.state_history.push(job.status);
        job.status = next;
        job.updated_at = chrono::Utc::now();
    }
}
