//! Append-only bookmarks per user

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use msr_common::Result;

/// One saved reading position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub segment_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: String,
}

pub async fn add(
    db: &SqlitePool,
    user_id: &str,
    session_id: Option<Uuid>,
    segment_index: usize,
    note: Option<String>,
) -> Result<Bookmark> {
    let id = Uuid::new_v4().to_string();
    let session_id = session_id.map(|s| s.to_string());

    sqlx::query(
        "INSERT INTO bookmarks (id, user_id, session_id, segment_index, note)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(user_id)
    .bind(&session_id)
    .bind(segment_index as i64)
    .bind(&note)
    .execute(db)
    .await?;

    let created_at: String =
        sqlx::query_scalar("SELECT created_at FROM bookmarks WHERE id = ?")
            .bind(&id)
            .fetch_one(db)
            .await?;

    Ok(Bookmark {
        id,
        user_id: user_id.to_string(),
        session_id,
        segment_index,
        note,
        created_at,
    })
}

pub async fn list(db: &SqlitePool, user_id: &str) -> Result<Vec<Bookmark>> {
    let rows: Vec<(String, String, Option<String>, i64, Option<String>, String)> =
        sqlx::query_as(
            "SELECT id, user_id, session_id, segment_index, note, created_at
             FROM bookmarks WHERE user_id = ? ORDER BY created_at, id",
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(
            |(id, user_id, session_id, segment_index, note, created_at)| Bookmark {
                id,
                user_id,
                session_id,
                segment_index: segment_index.max(0) as usize,
                note,
                created_at,
            },
        )
        .collect())
}
