use thiserror::Error;

use crate::anthropic::AnthropicError;
use crate::state_machine::JobStatus;

#[derive(Debug, Error)]
pub enum LessonError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("{service} failed: {message}")]
    Collaborator {
        service: &'static str,
        message: String,
    },

    #[error("Text generation error: {0}")]
    Anthropic(#[from] AnthropicError),

    #[error("Video stitching failed: {0}")]
    Stitching(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl LessonError {
    /// Shorthand for a failed call to an external collaborator.
    pub fn collaborator(service: &'static str, message: impl Into<String>) -> Self {
        Self::Collaborator {
            service,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LessonError>;
