use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{CoreLesson, LessonStore};
use crate::error::{LessonError, Result};

/// In-memory lesson store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryLessonStore {
    lessons: RwLock<HashMap<String, CoreLesson>>,
}

impl MemoryLessonStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LessonStore for MemoryLessonStore {
    async fn get(&self, topic_id: &str) -> Result<Option<CoreLesson>> {
        let lessons = self
            .lessons
            .read()
            .map_err(|e| LessonError::Storage(e.to_string()))?;
        Ok(lessons.get(topic_id).cloned())
    }

    async fn put(&self, lesson: &CoreLesson) -> Result<()> {
        let mut lessons = self
            .lessons
            .write()
            .map_err(|e| LessonError::Storage(e.to_string()))?;
        lessons.insert(lesson.topic_id.clone(), lesson.clone());
        Ok(())
    }
}
