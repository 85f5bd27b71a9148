//! Confidence-gated response policy.
//!
//! A strict priority chain, terminal on the first emission:
//! safety refusal > high-confidence local answer > external-model
//! escalation > static fallback. The safety filter runs before any
//! retrieval work; the matcher runs against a knowledge snapshot read
//! fresh from the store for this request; the external model is consulted
//! only when retrieval came up short and a credential is available.
//!
//! Every response except the safety refusal carries [`DISCLAIMER`]
//! appended exactly once. The safety refusal ships its own fixed text
//! with an embedded disclaimer. A failed model call is absorbed here into
//! the fixed retry-prompt response, the one place failure deliberately
//! becomes a degraded-but-successful answer. No step is retried.

use anyhow::{bail, Result};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::matcher::find_best_match;
use crate::model;
use crate::models::{ChatRequest, ChatResponse, KnowledgeEntry, MatchResult, ResponseSource};
use crate::store;

/// Default minimum match confidence for answering locally. Coarse
/// candidates between the matcher's floor and this bar escalate instead.
pub const DEFAULT_ACCEPT_FLOOR: f64 = 0.4;

/// Appended verbatim to every non-refusal response.
pub const DISCLAIMER: &str = "\n\n⚠️ This is general health information, not \
a medical diagnosis. Please consult a qualified healthcare professional \
about your personal situation.";

/// Restricted-intent substrings checked case-insensitively against the
/// query: diagnosis requests and prescription/dosage requests.
pub const SAFETY_KEYWORDS: &[&str] = &[
    "diagnose",
    "diagnosis",
    "what disease do i have",
    "what illness do i have",
    "prescription",
    "prescribe",
    "dosage",
    "dose of",
    "how much medication",
    "how many pills",
    "what medication should i take",
    "what medicine should i take",
];

/// Safety refusal, with its own embedded disclaimer.
const SAFETY_REFUSAL: &str = "I can't help with diagnoses, prescriptions, or \
medication dosages. Those decisions require a licensed clinician who can \
examine you. Please talk to your doctor or pharmacist, and seek emergency \
care right away if your symptoms are urgent. ⚠️ This assistant provides \
general health information only.";

/// Emitted when the external model call fails.
const RETRY_PROMPT: &str = "I'm having trouble reaching my extended \
knowledge right now. Could you try asking that again in a moment?";

/// Emitted when nothing matched and no model credential is configured.
const FALLBACK_TEXT: &str = "I don't have specific information about that \
in my knowledge base. Try rephrasing your question, or ask about common \
symptoms like fever, headache, or sore throat.";

/// Fixed confidence values for the non-retrieval response sources.
const FALLBACK_CONFIDENCE: f64 = 0.3;
const SAFETY_CONFIDENCE: f64 = 1.0;

/// Outcome of the pure (store-free, model-free) part of the policy.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Restricted-intent keyword hit; refuse without retrieval.
    SafetyRefusal,
    /// Local match cleared the accept floor; answer from the corpus.
    Local(MatchResult),
    /// No qualifying local answer; escalate or fall back.
    Escalate,
}

/// Check the lowercased message for restricted-intent keywords.
pub fn is_safety_flagged(message: &str) -> bool {
    let lower = message.to_lowercase();
    SAFETY_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Run safety filter and local lookup against a knowledge snapshot.
/// Pure: no store reads, no model calls.
pub fn decide(message: &str, knowledge: &[KnowledgeEntry], config: &Config) -> Decision {
    if is_safety_flagged(message) {
        return Decision::SafetyRefusal;
    }

    match find_best_match(message, knowledge, config.retrieval.candidate_floor) {
        Some(m) if m.confidence > config.retrieval.accept_floor => Decision::Local(m),
        _ => Decision::Escalate,
    }
}

/// Answer one chat request end to end: validate, decide, (maybe) escalate,
/// persist both turns, and return the response.
pub async fn respond(
    config: &Config,
    pool: &SqlitePool,
    request: &ChatRequest,
) -> Result<ChatResponse> {
    let message = request.message.trim();
    if message.is_empty() {
        bail!("message must not be empty");
    }

    let session_id = store::ensure_session(pool, request.session_id.as_deref()).await?;
    let knowledge = store::list_knowledge(pool).await?;

    let (text, source, confidence, matched_question) = match decide(message, &knowledge, config) {
        Decision::SafetyRefusal => (
            SAFETY_REFUSAL.to_string(),
            ResponseSource::SafetyFilter,
            SAFETY_CONFIDENCE,
            None,
        ),
        Decision::Local(m) => (
            format!("{}{}", m.answer, DISCLAIMER),
            ResponseSource::Local,
            m.confidence,
            Some(m.question),
        ),
        Decision::Escalate => match resolve_credential(config, request) {
            Some(api_key) => {
                // History gathered before this turn is appended, so the
                // model sees the conversation up to (not including) the
                // new message, which is passed separately.
                let history =
                    store::recent_messages(pool, &session_id, config.retrieval.history_limit)
                        .await?;
                match model::complete(&config.model, &api_key, &history, message).await {
                    Ok(reply) => (
                        format!("{}{}", reply, DISCLAIMER),
                        ResponseSource::Openai,
                        model::MODEL_CONFIDENCE,
                        None,
                    ),
                    Err(e) => {
                        eprintln!("model call failed: {:#}", e);
                        (
                            format!("{}{}", RETRY_PROMPT, DISCLAIMER),
                            ResponseSource::Error,
                            0.0,
                            None,
                        )
                    }
                }
            }
            None => (
                format!("{}{}", FALLBACK_TEXT, DISCLAIMER),
                ResponseSource::Fallback,
                FALLBACK_CONFIDENCE,
                None,
            ),
        },
    };

    store::append_message(pool, &session_id, "user", message, "{}").await?;
    let metadata = serde_json::json!({
        "source": source,
        "confidence": confidence,
    })
    .to_string();
    store::append_message(pool, &session_id, "assistant", &text, &metadata).await?;

    Ok(ChatResponse {
        response: text,
        session_id,
        source,
        confidence,
        matched_question,
    })
}

/// Credential priority: per-request override, then environment.
fn resolve_credential(config: &Config, request: &ChatRequest) -> Option<String> {
    if !config.model.is_enabled() {
        return None;
    }
    request
        .model_credential
        .clone()
        .filter(|c| !c.trim().is_empty())
        .or_else(|| std::env::var("OPENAI_API_KEY").ok().filter(|c| !c.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DbConfig, ModelConfig, RetrievalConfig, ServerConfig};
    use crate::migrate;
    use sqlx::sqlite::SqlitePoolOptions;

    fn test_config(provider: &str) -> Config {
        Config {
            db: DbConfig {
                path: ":memory:".into(),
            },
            retrieval: RetrievalConfig::default(),
            model: ModelConfig {
                provider: provider.to_string(),
                ..ModelConfig::default()
            },
            server: ServerConfig {
                bind: "127.0.0.1:0".to_string(),
            },
        }
    }

    fn entry(question: &str, answer: &str) -> KnowledgeEntry {
        KnowledgeEntry {
            id: "kb-1".to_string(),
            question: question.to_string(),
            answer: answer.to_string(),
            category: "general".to_string(),
            confidence: 0.9,
            source: "test".to_string(),
        }
    }

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        pool
    }

    fn seeded_corpus() -> Vec<KnowledgeEntry> {
        vec![
            entry("I have a fever. What should I do?", "Rest and drink fluids."),
            entry("How can I treat a cold at home?", "Warm drinks and rest."),
            entry("How many hours of sleep do I need?", "Most adults need 7-9 hours."),
        ]
    }

    #[test]
    fn test_safety_keyword_beats_corpus_content() {
        let config = test_config("openai");
        // Even a corpus containing the word would not matter: the filter
        // runs before retrieval.
        let corpus = vec![entry("Do I need a prescription?", "See a doctor.")];
        let decision = decide("Can you write me a PRESCRIPTION for this?", &corpus, &config);
        assert_eq!(decision, Decision::SafetyRefusal);
    }

    #[test]
    fn test_near_verbatim_seeded_question_answers_locally() {
        let config = test_config("openai");
        let decision = decide("I have a fever, what should I do?", &seeded_corpus(), &config);
        match decision {
            Decision::Local(m) => {
                assert_eq!(m.answer, "Rest and drink fluids.");
                assert!(m.confidence > DEFAULT_ACCEPT_FLOOR);
            }
            other => panic!("expected local answer, got {:?}", other),
        }
    }

    #[test]
    fn test_no_overlap_escalates() {
        let config = test_config("openai");
        let decision = decide("quasar luminosity redshift", &seeded_corpus(), &config);
        assert_eq!(decision, Decision::Escalate);
    }

    #[test]
    fn test_weak_candidate_between_floors_escalates() {
        let mut config = test_config("openai");
        config.retrieval.candidate_floor = 0.0;
        config.retrieval.accept_floor = 0.99;
        // Some overlap, but not enough to clear the raised accept floor.
        let decision = decide("fever", &seeded_corpus(), &config);
        assert_eq!(decision, Decision::Escalate);
    }

    #[tokio::test]
    async fn test_respond_rejects_empty_message() {
        let config = test_config("disabled");
        let pool = test_pool().await;
        let request = ChatRequest {
            message: "   ".to_string(),
            session_id: None,
            model_credential: None,
        };
        let err = respond(&config, &pool, &request).await.unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[tokio::test]
    async fn test_respond_fallback_when_model_disabled() {
        let config = test_config("disabled");
        let pool = test_pool().await;
        let request = ChatRequest {
            message: "quasar luminosity redshift".to_string(),
            session_id: None,
            model_credential: None,
        };
        let resp = respond(&config, &pool, &request).await.unwrap();
        assert_eq!(resp.source, ResponseSource::Fallback);
        assert_eq!(resp.confidence, 0.3);
        assert!(resp.matched_question.is_none());
        assert_eq!(resp.response.matches(DISCLAIMER).count(), 1);
    }

    #[tokio::test]
    async fn test_respond_local_path_with_seeded_store() {
        let config = test_config("disabled");
        let pool = test_pool().await;
        store::insert_knowledge(
            &pool,
            "I have a fever. What should I do?",
            "Rest and drink fluids.",
            "symptoms",
            0.95,
            "seed",
        )
        .await
        .unwrap();
        store::insert_knowledge(&pool, "How do I sleep better?", "Keep a routine.", "lifestyle", 0.9, "seed")
            .await
            .unwrap();

        let request = ChatRequest {
            message: "I have a fever, what should I do?".to_string(),
            session_id: None,
            model_credential: None,
        };
        let resp = respond(&config, &pool, &request).await.unwrap();
        assert_eq!(resp.source, ResponseSource::Local);
        assert!(resp.confidence > DEFAULT_ACCEPT_FLOOR);
        assert_eq!(
            resp.matched_question.as_deref(),
            Some("I have a fever. What should I do?")
        );
        assert!(resp.response.starts_with("Rest and drink fluids."));
        assert_eq!(resp.response.matches(DISCLAIMER).count(), 1);
    }

    #[tokio::test]
    async fn test_respond_safety_refusal_not_double_disclaimed() {
        let config = test_config("disabled");
        let pool = test_pool().await;
        let request = ChatRequest {
            message: "what dosage of ibuprofen should I take".to_string(),
            session_id: None,
            model_credential: None,
        };
        let resp = respond(&config, &pool, &request).await.unwrap();
        assert_eq!(resp.source, ResponseSource::SafetyFilter);
        assert_eq!(resp.confidence, 1.0);
        // The refusal text carries its own disclaimer wording; the shared
        // suffix must not be appended on top of it.
        assert_eq!(resp.response.matches(DISCLAIMER).count(), 0);
        assert!(resp.response.contains("general health information"));
    }

    /// Serve a canned chat-completions endpoint on an ephemeral port and
    /// return the base URL to point `ModelConfig` at.
    async fn spawn_model_stub(router: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/v1", addr)
    }

    #[tokio::test]
    async fn test_respond_escalates_to_model_when_local_misses() {
        use axum::{routing::post, Json, Router};

        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                Json(serde_json::json!({
                    "choices": [
                        { "message": { "role": "assistant", "content": "Drink water and rest." } }
                    ]
                }))
            }),
        );
        let mut config = test_config("openai");
        config.model.base_url = spawn_model_stub(router).await;

        let pool = test_pool().await;
        let request = ChatRequest {
            message: "quasar luminosity redshift".to_string(),
            session_id: None,
            model_credential: Some("test-key".to_string()),
        };
        let resp = respond(&config, &pool, &request).await.unwrap();
        assert_eq!(resp.source, ResponseSource::Openai);
        assert_eq!(resp.confidence, model::MODEL_CONFIDENCE);
        assert!(resp.matched_question.is_none());
        assert!(resp.response.starts_with("Drink water and rest."));
        assert_eq!(resp.response.matches(DISCLAIMER).count(), 1);
    }

    #[tokio::test]
    async fn test_respond_absorbs_model_failure_into_retry_prompt() {
        use axum::http::StatusCode;
        use axum::{routing::post, Json, Router};

        // A 400 is not retried, so the failure surfaces immediately.
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "error": { "message": "bad request" } })),
                )
            }),
        );
        let mut config = test_config("openai");
        config.model.base_url = spawn_model_stub(router).await;

        let pool = test_pool().await;
        let request = ChatRequest {
            message: "quasar luminosity redshift".to_string(),
            session_id: None,
            model_credential: Some("test-key".to_string()),
        };
        let resp = respond(&config, &pool, &request).await.unwrap();
        assert_eq!(resp.source, ResponseSource::Error);
        assert_eq!(resp.confidence, 0.0);
        assert!(resp.response.starts_with(RETRY_PROMPT));
        assert_eq!(resp.response.matches(DISCLAIMER).count(), 1);

        // The degraded answer is still a persisted assistant turn.
        let history = store::recent_messages(&pool, &resp.session_id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, resp.response);
    }

    #[tokio::test]
    async fn test_respond_persists_both_turns() {
        let config = test_config("disabled");
        let pool = test_pool().await;
        let request = ChatRequest {
            message: "quasar luminosity redshift".to_string(),
            session_id: None,
            model_credential: None,
        };
        let resp = respond(&config, &pool, &request).await.unwrap();

        let history = store::recent_messages(&pool, &resp.session_id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, "user");
        assert_eq!(history[0].content, "quasar luminosity redshift");
        assert_eq!(history[1].role, "assistant");
        assert_eq!(history[1].content, resp.response);
    }

    #[tokio::test]
    async fn test_respond_reuses_session_across_turns() {
        let config = test_config("disabled");
        let pool = test_pool().await;
        let first = respond(
            &config,
            &pool,
            &ChatRequest {
                message: "quasar luminosity redshift".to_string(),
                session_id: None,
                model_credential: None,
            },
        )
        .await
        .unwrap();

        let second = respond(
            &config,
            &pool,
            &ChatRequest {
                message: "pulsar rotation period".to_string(),
                session_id: Some(first.session_id.clone()),
                model_credential: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(first.session_id, second.session_id);
        let history = store::recent_messages(&pool, &first.session_id, 10).await.unwrap();
        assert_eq!(history.len(), 4);
    }
}
