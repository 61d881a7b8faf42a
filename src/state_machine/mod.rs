mod job;
mod state;

pub use job::{JobOutcome, JobReport, JobSnapshot, LessonJob, LessonRequest};
pub use state::{JobStatus, StateMachine};
