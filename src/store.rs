//! SQLite-backed knowledge, session, and message stores.
//!
//! The knowledge corpus is read in full per request, with no caching, so the
//! matcher always scores against the current snapshot. Message history is
//! fetched newest-first with a limit and reversed to chronological order
//! before it reaches the external model.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{ChatMessage, KnowledgeEntry};

/// Read the full knowledge corpus in insertion order.
pub async fn list_knowledge(pool: &SqlitePool) -> Result<Vec<KnowledgeEntry>> {
    let rows = sqlx::query(
        "SELECT id, question, answer, category, confidence, source
         FROM knowledge ORDER BY created_at, rowid",
    )
    .fetch_all(pool)
    .await
    .context("knowledge store unavailable")?;

    Ok(rows
        .iter()
        .map(|row| KnowledgeEntry {
            id: row.get("id"),
            question: row.get("question"),
            answer: row.get("answer"),
            category: row.get("category"),
            confidence: row.get("confidence"),
            source: row.get("source"),
        })
        .collect())
}

/// Insert a knowledge entry. Returns `false` when an entry with the same
/// normalized question already exists (idempotent seeding).
pub async fn insert_knowledge(
    pool: &SqlitePool,
    question: &str,
    answer: &str,
    category: &str,
    confidence: f64,
    source: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT INTO knowledge (id, question, answer, category, confidence, source, dedup_hash, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(dedup_hash) DO NOTHING",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(question)
    .bind(answer)
    .bind(category)
    .bind(confidence)
    .bind(source)
    .bind(question_hash(question))
    .bind(chrono::Utc::now().timestamp_millis())
    .execute(pool)
    .await
    .context("knowledge store unavailable")?;

    Ok(result.rows_affected() > 0)
}

/// Return the id of an existing session, or create a new one.
///
/// An unknown id from the client is treated as a request for a fresh
/// session rather than an error.
pub async fn ensure_session(pool: &SqlitePool, session_id: Option<&str>) -> Result<String> {
    if let Some(id) = session_id {
        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
            .context("session store unavailable")?;
        if exists {
            return Ok(id.to_string());
        }
    }

    let id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO sessions (id, created_at) VALUES (?, ?)")
        .bind(&id)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(pool)
        .await
        .context("session store unavailable")?;
    Ok(id)
}

/// Fetch the last `limit` messages of a session in chronological order.
pub async fn recent_messages(
    pool: &SqlitePool,
    session_id: &str,
    limit: i64,
) -> Result<Vec<ChatMessage>> {
    let rows = sqlx::query(
        "SELECT role, content FROM messages
         WHERE session_id = ?
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?",
    )
    .bind(session_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("message store unavailable")?;

    let mut messages: Vec<ChatMessage> = rows
        .iter()
        .map(|row| ChatMessage {
            role: row.get("role"),
            content: row.get("content"),
        })
        .collect();

    // Query is newest-first; the model expects chronological order.
    messages.reverse();
    Ok(messages)
}

/// Append one message to a session's history.
pub async fn append_message(
    pool: &SqlitePool,
    session_id: &str,
    role: &str,
    content: &str,
    metadata_json: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO messages (id, session_id, role, content, metadata_json, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(session_id)
    .bind(role)
    .bind(content)
    .bind(metadata_json)
    .bind(chrono::Utc::now().timestamp_millis())
    .execute(pool)
    .await
    .context("message store unavailable")?;
    Ok(())
}

/// SHA-256 over the trimmed, lowercased question text. Two seed files
/// carrying the same question in different casing collapse to one row.
fn question_hash(question: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(question.trim().to_lowercase().as_bytes());
    format!("{:x}", hasher.finalize())
}
