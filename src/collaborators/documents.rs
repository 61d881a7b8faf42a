use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicItem {
    pub topic_id: String,
    pub title: String,
    /// True when a core lesson for this topic is already in the library.
    #[serde(default)]
    pub is_ready: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterItem {
    pub chapter_id: String,
    pub title: String,
    pub topics: Vec<TopicItem>,
}

/// Chapter → topic hierarchy of a textbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookStructure {
    pub book_id: String,
    pub title: String,
    pub chapters: Vec<ChapterItem>,
}

impl BookStructure {
    pub fn topics_mut(&mut self) -> impl Iterator<Item = &mut TopicItem> {
        self.chapters.iter_mut().flat_map(|c| c.topics.iter_mut())
    }
}

/// Extracts the table of contents of a source document.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, source: &str) -> Result<BookStructure>;
}

/// Returns the grade-12 physics tree regardless of source.
pub struct StandInDocuments;

fn topic(topic_id: &str, title: &str) -> TopicItem {
    TopicItem {
        topic_id: topic_id.to_string(),
        title: title.to_string(),
        is_ready: false,
    }
}

#[async_trait]
impl DocumentExtractor for StandInDocuments {
    async fn extract(&self, source: &str) -> Result<BookStructure> {
        tracing::debug!(source, "serving stand-in book structure");
        Ok(BookStructure {
            book_id: "TN_SCERT_PHY_12".to_string(),
            title: "Physics - Grade 12 (Volume 1)".to_string(),
            chapters: vec![
                ChapterItem {
                    chapter_id: "PHY12_01".to_string(),
                    title: "Electrostatics".to_string(),
                    topics: vec![
                        topic("PHY12_01_01", "Introduction to Electrostatics"),
                        topic("PHY12_01_02", "Coulomb's Law"),
                        topic("PHY12_01_03", "Electric Field Lines"),
                        topic("PHY12_01_04", "Electric Dipole"),
                    ],
                },
                ChapterItem {
                    chapter_id: "PHY12_02".to_string(),
                    title: "Current Electricity".to_string(),
                    topics: vec![
                        topic("PHY12_02_01", "Electric Current"),
                        topic("PHY12_02_02", "Ohm's Law"),
                        topic("PHY12_02_03", "Kirchhoff's Rules"),
                    ],
                },
            ],
        })
    }
}
