use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::anthropic::{AnthropicClient, AnthropicError, Message, MessagesRequest};
use crate::error::Result;

/// Model tier a pipeline stage runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Haiku,
    Sonnet,
    Opus,
}

impl ModelTier {
    /// The Anthropic API model identifier for this tier.
    pub fn api_model(&self) -> &'static str {
        match self {
            ModelTier::Haiku => "claude-haiku-4-5-20251001",
            ModelTier::Sonnet => "claude-sonnet-4-5-20250929",
            ModelTier::Opus => "claude-opus-4-6",
        }
    }
}

/// Per-stage configuration of the shared text-generation capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageProfile {
    pub name: &'static str,
    pub model: ModelTier,
    pub instruction: &'static str,
    pub max_tokens: u32,
}

/// Generates text for a prompt under a stage's system role.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, profile: &StageProfile, prompt: &str) -> Result<String>;
}

#[async_trait]
impl TextGenerator for AnthropicClient {
    async fn generate(&self, profile: &StageProfile, prompt: &str) -> Result<String> {
        let model = profile.model.api_model().to_string();
        let req = MessagesRequest {
            model: model.clone(),
            max_tokens: profile.max_tokens,
            system: Some(profile.instruction.to_string()),
            messages: vec![Message {
                role: "user".into(),
                content: prompt.to_string(),
            }],
        };

        let text = self.send_message(&req).await?.text();
        if text.trim().is_empty() {
            return Err(AnthropicError::EmptyResponse { model }.into());
        }
        Ok(text)
    }
}

/// Fixed-response generator for offline runs and tests.
///
/// Output is deterministic: the stage name followed by the first line of the
/// prompt, so downstream stages still receive non-empty, traceable text.
pub struct StandInGenerator;

#[async_trait]
impl TextGenerator for StandInGenerator {
    async fn generate(&self, profile: &StageProfile, prompt: &str) -> Result<String> {
        let headline = prompt
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("(empty prompt)");
        Ok(format!("[{}] {headline}", profile.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LessonError;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PROFILE: StageProfile = StageProfile {
        name: "scriptwriter",
        model: ModelTier::Sonnet,
        instruction: "You are a Pedagogical Scriptwriter.",
        max_tokens: 2048,
    };

    #[test]
    fn model_tier_mapping() {
        assert_eq!(ModelTier::Haiku.api_model(), "claude-haiku-4-5-20251001");
        assert_eq!(ModelTier::Sonnet.api_model(), "claude-sonnet-4-5-20250929");
        assert_eq!(ModelTier::Opus.api_model(), "claude-opus-4-6");
    }

    #[test]
    fn model_tier_deserializes_lowercase() {
        let tier: ModelTier = serde_json::from_str(r#""opus""#).unwrap();
        assert_eq!(tier, ModelTier::Opus);
    }

    #[tokio::test]
    async fn stand_in_echoes_stage_and_headline() {
        let text = StandInGenerator
            .generate(&PROFILE, "\n  Create a script on: Coulomb's law\nmore")
            .await
            .unwrap();
        assert_eq!(text, "[scriptwriter] Create a script on: Coulomb's law");
    }

    #[tokio::test]
    async fn anthropic_generator_sends_profile() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "model": "claude-sonnet-4-5-20250929",
                "max_tokens": 2048,
                "system": "You are a Pedagogical Scriptwriter."
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg_1",
                "content": [{"type": "text", "text": "AUDIO | VISUAL"}],
                "model": "claude-sonnet-4-5-20250929",
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 1, "output_tokens": 1}
            })))
            .mount(&server)
            .await;

        let client =
            AnthropicClient::with_base_url("k".into(), server.uri(), Duration::from_secs(5))
                .unwrap();
        let text = client.generate(&PROFILE, "brief").await.unwrap();
        assert_eq!(text, "AUDIO | VISUAL");
    }

    #[tokio::test]
    async fn anthropic_generator_rejects_empty_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg_2",
                "content": [],
                "model": "claude-sonnet-4-5-20250929",
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 1, "output_tokens": 0}
            })))
            .mount(&server)
            .await;

        let client =
            AnthropicClient::with_base_url("k".into(), server.uri(), Duration::from_secs(5))
                .unwrap();
        let err = client.generate(&PROFILE, "brief").await.unwrap_err();
        assert!(matches!(
            err,
            LessonError::Anthropic(AnthropicError::EmptyResponse { .. })
        ));
    }
}
