//! Lightweight retrieval store
//!
//! Documents live in the embedded database; scoring is multiset Jaccard over
//! lowercased whitespace tokens. Deterministic: identical corpora and query
//! always produce the same ranking, with ties broken by shorter then lexical
//! doc id.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use msr_common::time::now_unix;
use msr_common::{Error, Result};

const TOP_K_MIN: usize = 1;
const TOP_K_MAX: usize = 100;

/// One stored document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagDoc {
    pub doc_id: String,
    pub text: String,
    pub meta: Value,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A document with its query score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDoc {
    #[serde(flatten)]
    pub doc: RagDoc,
    pub score: f64,
}

/// Lowercased whitespace-split token bag (token -> count)
pub fn tokenize(text: &str) -> HashMap<String, usize> {
    let mut bag = HashMap::new();
    for token in text.to_lowercase().split_whitespace() {
        *bag.entry(token.to_string()).or_insert(0) += 1;
    }
    bag
}

/// Multiset Jaccard similarity: sum of min counts over sum of max counts.
fn jaccard(a: &HashMap<String, usize>, b: &HashMap<String, usize>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let mut intersection = 0usize;
    let mut union = 0usize;

    for (token, &ca) in a {
        let cb = b.get(token).copied().unwrap_or(0);
        intersection += ca.min(cb);
        union += ca.max(cb);
    }
    for (token, &cb) in b {
        if !a.contains_key(token) {
            union += cb;
        }
    }

    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

pub async fn upsert(
    db: &SqlitePool,
    text: &str,
    doc_id: Option<String>,
    meta: Option<Value>,
) -> Result<RagDoc> {
    let doc_id = doc_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let now = now_unix();

    let existing: Option<(i64, String)> =
        sqlx::query_as("SELECT created_at, meta FROM rag_docs WHERE doc_id = ?")
            .bind(&doc_id)
            .fetch_optional(db)
            .await?;

    let created_at = existing.as_ref().map(|(c, _)| *c).unwrap_or(now);
    // A replacing upsert without meta keeps the stored meta
    let meta = match (meta, existing) {
        (Some(m), _) => m,
        (None, Some((_, stored))) => serde_json::from_str(&stored).unwrap_or(Value::Object(Default::default())),
        (None, None) => Value::Object(Default::default()),
    };
    let meta_raw = serde_json::to_string(&meta)
        .map_err(|e| Error::Internal(format!("failed to serialize doc meta: {}", e)))?;

    sqlx::query(
        "INSERT INTO rag_docs (doc_id, text, meta, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(doc_id) DO UPDATE SET
             text = excluded.text,
             meta = excluded.meta,
             updated_at = excluded.updated_at",
    )
    .bind(&doc_id)
    .bind(text)
    .bind(&meta_raw)
    .bind(created_at)
    .bind(now)
    .execute(db)
    .await?;

    Ok(RagDoc {
        doc_id,
        text: text.to_string(),
        meta,
        created_at,
        updated_at: now,
    })
}

pub async fn list(db: &SqlitePool) -> Result<Vec<RagDoc>> {
    let rows: Vec<(String, String, String, i64, i64)> = sqlx::query_as(
        "SELECT doc_id, text, meta, created_at, updated_at FROM rag_docs ORDER BY doc_id",
    )
    .fetch_all(db)
    .await?;

    rows.into_iter()
        .map(|(doc_id, text, meta, created_at, updated_at)| {
            let meta = serde_json::from_str(&meta)
                .map_err(|e| Error::Internal(format!("corrupt doc meta: {}", e)))?;
            Ok(RagDoc {
                doc_id,
                text,
                meta,
                created_at,
                updated_at,
            })
        })
        .collect()
}

pub async fn delete(db: &SqlitePool, doc_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM rag_docs WHERE doc_id = ?")
        .bind(doc_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn query(db: &SqlitePool, q: &str, top_k: usize) -> Result<Vec<ScoredDoc>> {
    let top_k = top_k.clamp(TOP_K_MIN, TOP_K_MAX);
    let query_bag = tokenize(q);
    if query_bag.is_empty() {
        return Ok(Vec::new());
    }

    let mut scored: Vec<ScoredDoc> = list(db)
        .await?
        .into_iter()
        .filter_map(|doc| {
            let score = jaccard(&query_bag, &tokenize(&doc.text));
            (score > 0.0).then_some(ScoredDoc { doc, score })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.doc.doc_id.len().cmp(&b.doc.doc_id.len()))
            .then_with(|| a.doc.doc_id.cmp(&b.doc.doc_id))
    });
    scored.truncate(top_k);
    Ok(scored)
}
