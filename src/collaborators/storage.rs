use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use serde::{Deserialize, Serialize};

use crate::error::{LessonError, Result};

/// Prefix under which uploaded source documents land.
const UPLOAD_PREFIX: &str = "textbooks";

/// A time-boxed URL a client can write one file to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTicket {
    pub upload_url: String,
    pub storage_uri: String,
    pub filename: String,
    pub expires_at: DateTime<Utc>,
}

/// Durable hosting for final assets and direct client uploads.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload `local` as `object_name`; returns a publicly resolvable reference.
    async fn publish(&self, local: &Path, object_name: &str) -> Result<String>;

    /// Mint a write URL for a client-side upload of `filename`.
    async fn upload_url(&self, filename: &str, content_type: &str) -> Result<UploadTicket>;
}

fn check_filename(filename: &str) -> Result<()> {
    if filename.trim().is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        return Err(LessonError::InvalidRequest(format!(
            "invalid upload filename: {filename:?}"
        )));
    }
    Ok(())
}

/// Google Cloud Storage over its JSON API.
///
/// Upload URLs are resumable-upload session URIs: they accept a single
/// upload without further credentials and expire after a week.
pub struct GcsBlobStore {
    client: Client,
    base_url: String,
    bucket: String,
    access_token: String,
}

impl GcsBlobStore {
    pub fn new(
        base_url: String,
        bucket: String,
        access_token: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket,
            access_token,
        })
    }

    fn upload_endpoint(&self) -> String {
        format!("{}/upload/storage/v1/b/{}/o", self.base_url, self.bucket)
    }
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn publish(&self, local: &Path, object_name: &str) -> Result<String> {
        let bytes = tokio::fs::read(local).await?;
        let response = self
            .client
            .post(self.upload_endpoint())
            .query(&[("uploadType", "media"), ("name", object_name)])
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token))
            .header(CONTENT_TYPE, "video/mp4")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LessonError::Storage(format!(
                "upload of {object_name} returned {}: {body}",
                status.as_u16()
            )));
        }

        Ok(format!("{}/{}/{object_name}", self.base_url, self.bucket))
    }

    async fn upload_url(&self, filename: &str, content_type: &str) -> Result<UploadTicket> {
        check_filename(filename)?;
        let object_name = format!("{UPLOAD_PREFIX}/{filename}");

        let response = self
            .client
            .post(self.upload_endpoint())
            .query(&[("uploadType", "resumable"), ("name", object_name.as_str())])
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token))
            .header("X-Upload-Content-Type", content_type)
            .header(CONTENT_LENGTH, 0)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LessonError::Storage(format!(
                "upload session for {object_name} returned {}: {body}",
                status.as_u16()
            )));
        }

        let upload_url = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                LessonError::Storage("upload session response had no Location header".into())
            })?;

        Ok(UploadTicket {
            upload_url,
            storage_uri: format!("gs://{}/{object_name}", self.bucket),
            filename: filename.to_string(),
            expires_at: Utc::now() + chrono::Duration::days(7),
        })
    }
}

/// Publishes into a local directory and hands out `file://` references.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn file_url(path: &Path) -> Result<String> {
        let absolute = std::path::absolute(path)?;
        Ok(format!("file://{}", absolute.display()))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn publish(&self, local: &Path, object_name: &str) -> Result<String> {
        let dest = self.root.join(object_name);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local, &dest).await?;
        Self::file_url(&dest)
    }

    async fn upload_url(&self, filename: &str, _content_type: &str) -> Result<UploadTicket> {
        check_filename(filename)?;
        let dir = self.root.join(UPLOAD_PREFIX);
        tokio::fs::create_dir_all(&dir).await?;
        let url = Self::file_url(&dir.join(filename))?;

        Ok(UploadTicket {
            upload_url: url.clone(),
            storage_uri: url,
            filename: filename.to_string(),
            expires_at: Utc::now() + chrono::Duration::minutes(15),
        })
    }
}
