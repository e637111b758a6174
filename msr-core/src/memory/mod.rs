//! Memory store: preferences, bookmarks, and the RAG corpus
//!
//! One façade over the embedded database. All operations are atomic at the
//! document level; missing users or docs yield empty results, not errors.

mod bookmarks;
mod prefs;
mod rag;

pub use bookmarks::Bookmark;
pub use prefs::{default_preferences, reading_wpm};
pub use rag::{tokenize, RagDoc, ScoredDoc};

use serde_json::{Map, Value};
use sqlx::SqlitePool;
use uuid::Uuid;

use msr_common::Result;

/// Façade over the three memory sub-services
#[derive(Clone)]
pub struct MemoryStore {
    db: SqlitePool,
}

impl MemoryStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    // ---- Preferences ----

    /// Get a user's preferences: defaults overlaid with whatever was stored.
    pub async fn get_preferences(&self, user_id: &str) -> Result<Map<String, Value>> {
        prefs::get(&self.db, user_id).await
    }

    /// Merge a patch into a user's preferences (last-write-wins per key).
    /// Unknown keys are preserved verbatim.
    pub async fn set_preferences(
        &self,
        user_id: &str,
        patch: &Map<String, Value>,
    ) -> Result<Map<String, Value>> {
        prefs::set(&self.db, user_id, patch).await
    }

    // ---- Bookmarks ----

    /// Append a bookmark for a user.
    pub async fn add_bookmark(
        &self,
        user_id: &str,
        session_id: Option<Uuid>,
        segment_index: usize,
        note: Option<String>,
    ) -> Result<Bookmark> {
        bookmarks::add(&self.db, user_id, session_id, segment_index, note).await
    }

    /// All bookmarks for a user, oldest first.
    pub async fn bookmarks(&self, user_id: &str) -> Result<Vec<Bookmark>> {
        bookmarks::list(&self.db, user_id).await
    }

    // ---- RAG ----

    /// Insert or replace a document. Idempotent on `doc_id`.
    pub async fn upsert_doc(
        &self,
        text: &str,
        doc_id: Option<String>,
        meta: Option<Value>,
    ) -> Result<RagDoc> {
        rag::upsert(&self.db, text, doc_id, meta).await
    }

    /// Rank documents against a query. `top_k` is clamped to `[1, 100]`.
    pub async fn query_docs(&self, q: &str, top_k: usize) -> Result<Vec<ScoredDoc>> {
        rag::query(&self.db, q, top_k).await
    }

    /// All documents, ordered by doc id.
    pub async fn list_docs(&self) -> Result<Vec<RagDoc>> {
        rag::list(&self.db).await
    }

    /// Delete a document; returns whether it existed.
    pub async fn delete_doc(&self, doc_id: &str) -> Result<bool> {
        rag::delete(&self.db, doc_id).await
    }
}
