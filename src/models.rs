//! Core data types flowing through the retrieval and policy pipeline.

use serde::{Deserialize, Serialize};

/// A curated question/answer pair from the knowledge store.
///
/// Read-only from the engine's perspective; rows are created by the
/// `medkb seed` administrative command. `confidence` is an authoring-time
/// reliability weight in `[0, 1]`; it is stored and displayed but plays
/// no part in match scoring.
#[derive(Debug, Clone)]
pub struct KnowledgeEntry {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub category: String,
    pub confidence: f64,
    pub source: String,
}

/// The winning knowledge entry for a query, if any cleared the
/// candidate floor. `confidence` is the raw cosine similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub answer: String,
    pub question: String,
    pub confidence: f64,
}

/// One turn of stored conversation history.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Where a response came from, in policy priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    SafetyFilter,
    Local,
    Openai,
    Error,
    Fallback,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::SafetyFilter => "safety_filter",
            ResponseSource::Local => "local",
            ResponseSource::Openai => "openai",
            ResponseSource::Error => "error",
            ResponseSource::Fallback => "fallback",
        }
    }
}

/// Request body for `POST /chat` (and the `medkb ask` command).
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub model_credential: Option<String>,
}

/// Response body for `POST /chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub source: ResponseSource,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_question: Option<String>,
}
