use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{LessonError, Result};

/// Prefix of references that point at no retrievable asset.
///
/// Only the stand-in renderer produces these; the stitcher synthesizes a
/// short placeholder clip for them.
pub const PLACEHOLDER_PREFIX: &str = "placeholder://";

const DEFAULT_AVATAR: &str = "default_avatar_id";
const DEFAULT_VOICE: &str = "default_voice_id";

/// Renders a script into an avatar video and returns its asset reference.
#[async_trait]
pub trait AvatarRenderer: Send + Sync {
    async fn render(&self, script: &str, avatar: Option<&str>) -> Result<String>;
}

/// Client for the HeyGen video generation API.
///
/// Rendering is asynchronous on their side: submit, then poll the status
/// endpoint until the video completes, fails, or `max_wait` elapses.
pub struct HeyGenRenderer {
    api_key: String,
    base_url: String,
    client: Client,
    poll_interval: Duration,
    max_wait: Duration,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SubmitData {
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusData {
    status: String,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl HeyGenRenderer {
    pub fn new(
        api_key: String,
        base_url: String,
        request_timeout: Duration,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            poll_interval,
            max_wait,
        })
    }

    async fn submit(&self, script: &str, avatar: &str) -> Result<String> {
        let payload = serde_json::json!({
            "video_inputs": [{
                "character": {
                    "type": "avatar",
                    "avatar_id": avatar,
                    "scale": 1.0,
                    "avatar_style": "normal"
                },
                "voice": {
                    "type": "text",
                    "voice_id": DEFAULT_VOICE,
                    "input_text": script
                }
            }],
            "dimension": {"width": 1920, "height": 1080}
        });

        let response = self
            .client
            .post(format!("{}/v2/video/generate", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LessonError::collaborator(
                "renderer",
                format!("submit returned {}: {body}", status.as_u16()),
            ));
        }

        let envelope: Envelope<SubmitData> = response.json().await?;
        match envelope.data {
            Some(data) => Ok(data.video_id),
            None => Err(LessonError::collaborator(
                "renderer",
                format!("submit returned no video id: {:?}", envelope.error),
            )),
        }
    }

    async fn poll(&self, video_id: &str) -> Result<StatusData> {
        let response = self
            .client
            .get(format!("{}/v1/video_status.get", self.base_url))
            .query(&[("video_id", video_id)])
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?
            .error_for_status()?;

        let envelope: Envelope<StatusData> = response.json().await?;
        envelope.data.ok_or_else(|| {
            LessonError::collaborator(
                "renderer",
                format!("status for {video_id} had no data: {:?}", envelope.error),
            )
        })
    }
}

#[async_trait]
impl AvatarRenderer for HeyGenRenderer {
    async fn render(&self, script: &str, avatar: Option<&str>) -> Result<String> {
        let video_id = self.submit(script, avatar.unwrap_or(DEFAULT_AVATAR)).await?;
        tracing::info!(video_id = %video_id, "render submitted");

        let deadline = Instant::now() + self.max_wait;
        loop {
            let data = self.poll(&video_id).await?;
            match data.status.as_str() {
                "completed" => {
                    return data.video_url.ok_or_else(|| {
                        LessonError::collaborator(
                            "renderer",
                            format!("video {video_id} completed without a url"),
                        )
                    });
                }
                "failed" => {
                    return Err(LessonError::collaborator(
                        "renderer",
                        format!("video {video_id} failed: {:?}", data.error),
                    ));
                }
                other => tracing::debug!(video_id = %video_id, status = other, "render in progress"),
            }

            if Instant::now() >= deadline {
                return Err(LessonError::collaborator(
                    "renderer",
                    format!("video {video_id} not ready after {:?}", self.max_wait),
                ));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Returns placeholder references without contacting any service.
pub struct StandInRenderer;

#[async_trait]
impl AvatarRenderer for StandInRenderer {
    async fn render(&self, _script: &str, avatar: Option<&str>) -> Result<String> {
        let avatar = avatar.unwrap_or(DEFAULT_AVATAR);
        Ok(format!("{PLACEHOLDER_PREFIX}{avatar}/{}.mp4", Uuid::new_v4()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn renderer_for(server: &MockServer, max_wait: Duration) -> HeyGenRenderer {
        HeyGenRenderer::new(
            "hg-key".into(),
            server.uri(),
            Duration::from_secs(5),
            Duration::from_millis(10),
            max_wait,
        )
        .unwrap()
    }

    async fn mount_submit(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/v2/video/generate"))
            .and(header("X-Api-Key", "hg-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": null,
                "data": {"video_id": "vid_42"}
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn render_returns_video_url_when_completed() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1/video_status.get"))
            .and(query_param("video_id", "vid_42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"status": "completed", "video_url": "https://cdn.heygen.test/vid_42.mp4"}
            })))
            .mount(&server)
            .await;

        let url = renderer_for(&server, Duration::from_secs(5))
            .render("Hello class", None)
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.heygen.test/vid_42.mp4");
    }

    #[tokio::test]
    async fn render_surfaces_failed_status() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1/video_status.get"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"status": "failed", "error": {"message": "avatar not found"}}
            })))
            .mount(&server)
            .await;

        let err = renderer_for(&server, Duration::from_secs(5))
            .render("Hello class", Some("missing_avatar"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("avatar not found"));
    }

    #[tokio::test]
    async fn render_gives_up_after_max_wait() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1/video_status.get"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"status": "processing"}
            })))
            .mount(&server)
            .await;

        let err = renderer_for(&server, Duration::from_millis(30))
            .render("Hello class", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not ready"));
    }

    #[tokio::test]
    async fn submit_error_is_a_collaborator_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/video/generate"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = renderer_for(&server, Duration::from_secs(1))
            .render("Hello", None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "renderer failed: submit returned 401: bad key");
    }

    #[tokio::test]
    async fn stand_in_returns_unique_placeholders() {
        let a = StandInRenderer.render("a", None).await.unwrap();
        let b = StandInRenderer.render("b", Some("anna")).await.unwrap();
        assert!(a.starts_with(PLACEHOLDER_PREFIX));
        assert!(b.starts_with("placeholder://anna/"));
        assert_ne!(a, b);
    }
}
