use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database, Value, params};

use super::{CoreLesson, LessonStore};
use crate::error::{LessonError, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS video_library (
    topic_id         TEXT PRIMARY KEY,
    core_video_url   TEXT NOT NULL,
    confidence_score INTEGER,
    created_at       TEXT NOT NULL
);
";

fn storage_err(e: libsql::Error) -> LessonError {
    LessonError::Storage(e.to_string())
}

/// Durable lesson store on a local libSQL database.
pub struct SqliteLessonStore {
    _db: Database,
    conn: Connection,
}

impl SqliteLessonStore {
    /// Open or create the database at `path` and ensure the schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;
        conn.execute_batch(SCHEMA).await.map_err(storage_err)?;

        Ok(Self { _db: db, conn })
    }
}

#[async_trait]
impl LessonStore for SqliteLessonStore {
    async fn get(&self, topic_id: &str) -> Result<Option<CoreLesson>> {
        let mut rows = self
            .conn
            .query(
                "SELECT core_video_url, confidence_score FROM video_library WHERE topic_id = ?1",
                params![topic_id],
            )
            .await
            .map_err(storage_err)?;

        let Some(row) = rows.next().await.map_err(storage_err)? else {
            return Ok(None);
        };

        let asset_ref = row.get::<String>(0).map_err(storage_err)?;
        let confidence = match row.get_value(1).map_err(storage_err)? {
            Value::Integer(score) => u8::try_from(score).ok(),
            _ => None,
        };

        Ok(Some(CoreLesson {
            topic_id: topic_id.to_string(),
            asset_ref,
            confidence,
        }))
    }

    async fn put(&self, lesson: &CoreLesson) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT OR REPLACE INTO video_library
                 (topic_id, core_video_url, confidence_score, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    lesson.topic_id.as_str(),
                    lesson.asset_ref.as_str(),
                    lesson.confidence.map(i64::from),
                    now.as_str()
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}
