//! Video metadata records

use super::{Database, DbError};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const VIDEO_COLUMNS: &str =
    "id, created_at, updated_at, title, description, thumbnail_url, video_url, user_id";

/// A video record as stored and as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: Uuid,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub description: String,
    #[serde(rename = "thumbnailURL")]
    pub thumbnail_url: Option<String>,
    #[serde(rename = "videoURL")]
    pub video_url: Option<String>,
    #[serde(rename = "userID")]
    pub user_id: Uuid,
}

/// Fields supplied when creating a record
#[derive(Debug, Clone)]
pub struct CreateVideoParams {
    pub title: String,
    pub description: String,
    pub user_id: Uuid,
}

impl Database {
    pub fn create_video(&self, params: &CreateVideoParams) -> Result<Video, DbError> {
        let now = Utc::now();
        let video = Video {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            title: params.title.clone(),
            description: params.description.clone(),
            thumbnail_url: None,
            video_url: None,
            user_id: params.user_id,
        };

        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO videos ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                VIDEO_COLUMNS
            ),
            params![
                video.id.to_string(),
                video.created_at,
                video.updated_at,
                video.title,
                video.description,
                video.thumbnail_url,
                video.video_url,
                video.user_id.to_string(),
            ],
        )?;

        Ok(video)
    }

    pub fn get_video(&self, id: Uuid) -> Result<Option<Video>, DbError> {
        let conn = self.conn()?;
        let video = conn
            .query_row(
                &format!("SELECT {} FROM videos WHERE id = ?1", VIDEO_COLUMNS),
                params![id.to_string()],
                row_to_video,
            )
            .optional()?;

        Ok(video)
    }

    /// All records owned by `user_id`, newest first
    pub fn get_videos_for_user(&self, user_id: Uuid) -> Result<Vec<Video>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM videos WHERE user_id = ?1 ORDER BY created_at DESC",
            VIDEO_COLUMNS
        ))?;

        let videos = stmt
            .query_map(params![user_id.to_string()], row_to_video)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(videos)
    }

    /// Persist the mutable fields of `video`, refreshing its `updated_at`
    pub fn update_video(&self, video: &mut Video) -> Result<(), DbError> {
        let updated_at = Utc::now();

        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE videos
             SET title = ?1, description = ?2, thumbnail_url = ?3, video_url = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                video.title,
                video.description,
                video.thumbnail_url,
                video.video_url,
                updated_at,
                video.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(DbError::NotFound(video.id.to_string()));
        }

        video.updated_at = updated_at;
        Ok(())
    }
}

fn row_to_video(row: &Row<'_>) -> rusqlite::Result<Video> {
    Ok(Video {
        id: uuid_column(row, 0)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        thumbnail_url: row.get(5)?,
        video_url: row.get(6)?,
        user_id: uuid_column(row, 7)?,
    })
}

fn uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
