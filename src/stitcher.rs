//! Final assembly: intro + core lesson → one published video.
//!
//! Each stitch gets its own scratch subdirectory named by a fresh id. The
//! directory is left in place after the call so a failed or suspicious
//! output can be inspected.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use uuid::Uuid;

use crate::collaborators::{BlobStore, PLACEHOLDER_PREFIX};
use crate::config::StitcherConfig;
use crate::error::{LessonError, Result};

/// Joins two video assets, first then second, into one published asset.
#[async_trait]
pub trait VideoAssembler: Send + Sync {
    async fn stitch(&self, first: &str, second: &str) -> Result<String>;
}

pub struct FfmpegStitcher {
    ffmpeg_bin: String,
    scratch_dir: PathBuf,
    timeout: Duration,
    http: Client,
    blobs: Arc<dyn BlobStore>,
}

impl FfmpegStitcher {
    pub fn new(config: &StitcherConfig, blobs: Arc<dyn BlobStore>) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            ffmpeg_bin: config.ffmpeg_bin.clone(),
            scratch_dir: config.scratch_dir.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            http,
            blobs,
        })
    }

    async fn assemble(&self, stitch_id: &str, first: &str, second: &str) -> Result<String> {
        let work = std::path::absolute(self.scratch_dir.join(stitch_id))?;
        tokio::fs::create_dir_all(&work).await?;

        let first_path = work.join("first.mp4");
        let second_path = work.join("second.mp4");
        self.materialize(first, &first_path).await?;
        self.materialize(second, &second_path).await?;

        let list = work.join("input.txt");
        tokio::fs::write(&list, concat_list(&[&first_path, &second_path])).await?;

        let output = work.join("final.mp4");
        let mut cmd = self.ffmpeg();
        cmd.args(["-y", "-f", "concat", "-safe", "0", "-i"])
            .arg(&list)
            .args(["-c", "copy"])
            .arg(&output);
        self.run(cmd).await?;

        let size = match tokio::fs::metadata(&output).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };
        if size == 0 {
            return Err(LessonError::Stitching(
                "ffmpeg produced no output".to_string(),
            ));
        }
        tracing::debug!(stitch_id, bytes = size, "concatenation finished");

        let object_name = format!("output/{stitch_id}_lesson.mp4");
        self.blobs.publish(&output, &object_name).await
    }

    /// Bring one asset reference into `dest` as a local file.
    async fn materialize(&self, asset_ref: &str, dest: &Path) -> Result<()> {
        if asset_ref.starts_with(PLACEHOLDER_PREFIX) {
            tracing::warn!(asset_ref, "synthesizing placeholder clip");
            return self.synthesize_placeholder(dest).await;
        }
        if let Some(path) = asset_ref.strip_prefix("file://") {
            tokio::fs::copy(path, dest).await.map_err(|e| {
                LessonError::Stitching(format!("cannot read input {asset_ref}: {e}"))
            })?;
            return Ok(());
        }
        if asset_ref.starts_with("http://") || asset_ref.starts_with("https://") {
            return self.download(asset_ref, dest).await;
        }
        Err(LessonError::Stitching(format!(
            "unsupported asset reference: {asset_ref}"
        )))
    }

    /// Fetch `url` into `dest`. The whole transfer, headers and body, is
    /// bounded by the stitch timeout.
    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        match timeout(self.timeout, self.fetch(url, dest)).await {
            Ok(result) => result,
            Err(_) => Err(LessonError::Stitching(format!(
                "download of {url} timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }

    async fn synthesize_placeholder(&self, dest: &Path) -> Result<()> {
        let mut cmd = self.ffmpeg();
        cmd.args([
            "-y",
            "-f",
            "lavfi",
            "-i",
            "color=c=black:s=1280x720:d=1",
            "-f",
            "lavfi",
            "-i",
            "anullsrc=r=44100:cl=stereo",
            "-c:v",
            "libx264",
            "-t",
            "1",
            "-c:a",
            "aac",
        ])
        .arg(dest);
        self.run(cmd).await
    }

    fn ffmpeg(&self) -> Command {
        let mut cmd = Command::new(&self.ffmpeg_bin);
        cmd.kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    async fn run(&self, mut cmd: Command) -> Result<()> {
        let child = cmd.spawn().map_err(|e| {
            LessonError::Stitching(format!("failed to start {}: {e}", self.ffmpeg_bin))
        })?;

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(LessonError::Stitching(format!(
                    "ffmpeg timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_line = stderr.trim().lines().last().unwrap_or_default();
            return Err(LessonError::Stitching(format!(
                "ffmpeg exited with {}: {last_line}",
                output.status
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VideoAssembler for FfmpegStitcher {
    async fn stitch(&self, first: &str, second: &str) -> Result<String> {
        let stitch_id = Uuid::new_v4().to_string();
        tracing::info!(stitch_id = %stitch_id, first, second, "stitching");

        match self.assemble(&stitch_id, first, second).await {
            Ok(reference) => {
                tracing::info!(stitch_id = %stitch_id, reference = %reference, "stitched asset published");
                Ok(reference)
            }
            Err(e) => {
                tracing::error!(stitch_id = %stitch_id, error = %e, "stitching failed");
                Err(match e {
                    LessonError::Stitching(_) => e,
                    other => LessonError::Stitching(other.to_string()),
                })
            }
        }
    }
}

/// ffmpeg concat-demuxer list. Paths are single-quoted; an embedded quote
/// closes the string, is escaped, and reopens it.
fn concat_list(paths: &[&Path]) -> String {
    paths
        .iter()
        .map(|p| {
            let escaped = p.display().to_string().replace('\'', r"'\''");
            format!("file '{escaped}'\n")
        })
        .collect()
}
