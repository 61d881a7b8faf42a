//! Content stages: core-lesson generation and the personalized intro.
//!
//! These functions only call collaborators and hand back artifacts. Status
//! transitions and caching belong to the orchestrator.

use std::sync::Arc;

use crate::collaborators::{
    AvatarRenderer, ModelTier, SearchService, StageProfile, TextGenerator,
};
use crate::config::ModelConfig;
use crate::error::Result;
use crate::state_machine::LessonRequest;

const RESEARCHER: &str = "You are an expert Academic Researcher. \
Answer the user's query STRICTLY based on the provided textbook context. \
Do not hallucinate. Cite the textbook page numbers if available. \
Output: a structured Fact Brief.";

const SCRIPTWRITER: &str = "You are a Pedagogical Scriptwriter. \
Convert the Fact Brief into an engaging video script.\n\
Structure:\n\
- Intro (0-30s): hook the student.\n\
- Concept (30s-2m): explain the core concept with visual analogies.\n\
- Examples (2m-3m): real-world application.\n\
- Summary: quick recap.\n\
Format: split script (Audio | Visual).";

const INTRO_WRITER: &str = "You write short, warm spoken introductions \
for a teacher's class. Output only the words the presenter says.";

/// The three text-generation stages and their profiles.
#[derive(Debug, Clone)]
pub struct StageProfiles {
    pub research: StageProfile,
    pub script: StageProfile,
    pub intro: StageProfile,
}

impl StageProfiles {
    pub fn from_models(models: &ModelConfig) -> Self {
        Self {
            research: StageProfile {
                name: "research",
                model: models.research,
                instruction: RESEARCHER,
                max_tokens: 2048,
            },
            script: StageProfile {
                name: "scriptwriter",
                model: models.script,
                instruction: SCRIPTWRITER,
                max_tokens: 4096,
            },
            intro: StageProfile {
                name: "intro",
                model: models.intro,
                instruction: INTRO_WRITER,
                max_tokens: 512,
            },
        }
    }
}

impl Default for StageProfiles {
    fn default() -> Self {
        Self::from_models(&ModelConfig {
            research: ModelTier::Sonnet,
            script: ModelTier::Sonnet,
            intro: ModelTier::Haiku,
        })
    }
}

pub struct ContentPipeline {
    text: Arc<dyn TextGenerator>,
    search: Arc<dyn SearchService>,
    renderer: Arc<dyn AvatarRenderer>,
    profiles: StageProfiles,
}

impl ContentPipeline {
    pub fn new(
        text: Arc<dyn TextGenerator>,
        search: Arc<dyn SearchService>,
        renderer: Arc<dyn AvatarRenderer>,
        profiles: StageProfiles,
    ) -> Self {
        Self {
            text,
            search,
            renderer,
            profiles,
        }
    }

    /// Retrieve textbook context for the topic and condense it into a fact brief.
    pub async fn research(&self, topic_id: &str) -> Result<String> {
        let query = format!("Explain {topic_id}");
        let context = self.search.search(&query).await?;
        let prompt = format!(
            "User Query: {query}\n\n\
             Retrieved Textbook Context:\n{context}\n\n\
             Task: Create a detailed Fact Brief for a 5-minute video lesson. \
             Include definitions, key formulas, and examples."
        );
        self.text.generate(&self.profiles.research, &prompt).await
    }

    pub async fn write_core_script(&self, fact_brief: &str) -> Result<String> {
        let prompt = format!("Create a 5-minute core lesson script on: {fact_brief}");
        self.text.generate(&self.profiles.script, &prompt).await
    }

    pub async fn render_core(&self, script: &str) -> Result<String> {
        self.renderer.render(script, None).await
    }

    pub async fn write_intro_script(&self, request: &LessonRequest) -> Result<String> {
        self.text
            .generate(&self.profiles.intro, &intro_prompt(request))
            .await
    }

    pub async fn render_intro(&self, script: &str, avatar: Option<&str>) -> Result<String> {
        self.renderer.render(script, avatar).await
    }
}

fn intro_prompt(request: &LessonRequest) -> String {
    format!(
        "Write a 15-second intro for {}'s class. Topic: {}. Tone: {}. Language: {}.",
        request.teacher_name, request.topic_id, request.tone, request.language
    )
}
