//! External-model collaborator (OpenAI chat completions).
//!
//! Called only when local retrieval cannot answer a query with enough
//! confidence. Returns an explicit `Result` that the policy layer pattern
//! matches on; a failed call never propagates past the policy.
//!
//! # Retry Strategy
//!
//! Transport retries live here, not in the policy:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::ModelConfig;
use crate::models::ChatMessage;

/// Fixed confidence reported for responses produced by the external model.
/// Assigned, not measured.
pub const MODEL_CONFIDENCE: f64 = 0.95;

/// System prompt framing every escalated conversation.
const SYSTEM_PROMPT: &str = "You are a careful health information assistant. \
Give clear, general guidance about symptoms, self-care, and when to see a \
doctor. Never diagnose conditions, never recommend prescription medication \
or dosages, and advise contacting emergency services for urgent symptoms. \
Keep answers concise and practical.";

/// Ask the configured chat model to answer `new_message`, given the
/// session's recent history in chronological order.
pub async fn complete(
    config: &ModelConfig,
    api_key: &str,
    history: &[ChatMessage],
    new_message: &str,
) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let mut messages = vec![serde_json::json!({
        "role": "system",
        "content": SYSTEM_PROMPT,
    })];
    for m in history {
        messages.push(serde_json::json!({ "role": m.role, "content": m.content }));
    }
    messages.push(serde_json::json!({ "role": "user", "content": new_message }));

    let body = serde_json::json!({
        "model": config.model,
        "messages": messages,
    });

    let url = format!(
        "{}/chat/completions",
        config.base_url.trim_end_matches('/')
    );

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value = response.json().await?;
                    return parse_completion_response(&json);
                }

                // Rate limited or server error — retry
                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!(
                        "OpenAI API error {}: {}",
                        status,
                        body_text
                    ));
                    continue;
                }

                // Client error (not 429) — don't retry
                let body_text = response.text().await.unwrap_or_default();
                bail!("OpenAI API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Model call failed after retries")))
}

/// Extract `choices[0].message.content` from a chat-completion response.
fn parse_completion_response(json: &serde_json::Value) -> Result<String> {
    let content = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid completion response: missing message content"))?;

    let content = content.trim();
    if content.is_empty() {
        bail!("Invalid completion response: empty message content");
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion_response() {
        let json = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "  Rest and hydrate.  " } }
            ]
        });
        assert_eq!(parse_completion_response(&json).unwrap(), "Rest and hydrate.");
    }

    #[test]
    fn test_parse_rejects_missing_content() {
        let json = serde_json::json!({ "choices": [] });
        assert!(parse_completion_response(&json).is_err());
        let json = serde_json::json!({ "choices": [ { "message": { "content": "" } } ] });
        assert!(parse_completion_response(&json).is_err());
    }
}
