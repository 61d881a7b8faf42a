//! Interfaces to the external services the pipeline depends on.
//!
//! Each collaborator is a trait with a live implementation and a
//! fixed-response stand-in. Which one is used is decided by
//! `[collaborators]` in the configuration, never by probing credentials.

pub mod documents;
pub mod render;
pub mod search;
pub mod storage;
pub mod text;

use std::sync::Arc;
use std::time::Duration;

pub use documents::{BookStructure, ChapterItem, DocumentExtractor, StandInDocuments, TopicItem};
pub use render::{AvatarRenderer, HeyGenRenderer, PLACEHOLDER_PREFIX, StandInRenderer};
pub use search::{SearchService, StandInSearch};
pub use storage::{BlobStore, GcsBlobStore, LocalBlobStore, UploadTicket};
pub use text::{ModelTier, StageProfile, StandInGenerator, TextGenerator};

use crate::anthropic::AnthropicClient;
use crate::config::{LessonConfig, RenderBackend, StorageBackend, TextBackend};
use crate::error::Result;

/// The full set of collaborators, shared by every job.
#[derive(Clone)]
pub struct Collaborators {
    pub text: Arc<dyn TextGenerator>,
    pub search: Arc<dyn SearchService>,
    pub renderer: Arc<dyn AvatarRenderer>,
    pub blobs: Arc<dyn BlobStore>,
    pub documents: Arc<dyn DocumentExtractor>,
}

impl Collaborators {
    pub fn from_config(config: &LessonConfig) -> Result<Self> {
        let c = &config.collaborators;
        let timeout = Duration::from_secs(c.request_timeout_secs);

        let text: Arc<dyn TextGenerator> = match c.text {
            TextBackend::Live => Arc::new(AnthropicClient::with_base_url(
                c.anthropic_api_key.clone(),
                c.anthropic_base_url.clone(),
                timeout,
            )?),
            TextBackend::StandIn => Arc::new(StandInGenerator),
        };

        let renderer: Arc<dyn AvatarRenderer> = match c.render {
            RenderBackend::Live => Arc::new(HeyGenRenderer::new(
                c.heygen_api_key.clone(),
                c.heygen_base_url.clone(),
                timeout,
                Duration::from_millis(c.render_poll_interval_ms),
                Duration::from_secs(c.render_timeout_secs),
            )?),
            RenderBackend::StandIn => Arc::new(StandInRenderer),
        };

        let blobs: Arc<dyn BlobStore> = match c.storage {
            StorageBackend::Gcs => Arc::new(GcsBlobStore::new(
                c.gcs_base_url.clone(),
                config.bucket(),
                c.gcs_access_token.clone(),
                timeout,
            )?),
            StorageBackend::Local => Arc::new(LocalBlobStore::new(c.publish_dir.clone())),
        };

        tracing::info!(
            text = ?c.text,
            render = ?c.render,
            storage = ?c.storage,
            "collaborators configured"
        );

        Ok(Self {
            text,
            search: Arc::new(StandInSearch),
            renderer,
            blobs,
            documents: Arc::new(StandInDocuments),
        })
    }
}
