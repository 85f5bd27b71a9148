use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub model: ModelConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Minimum cosine score for the matcher to propose a candidate at all.
    #[serde(default = "default_candidate_floor")]
    pub candidate_floor: f64,
    /// Stricter bar for answering locally without model escalation.
    /// Kept separate from `candidate_floor` on purpose; never merged.
    #[serde(default = "default_accept_floor")]
    pub accept_floor: f64,
    /// Messages of session context passed to the external model.
    #[serde(default = "default_history_limit")]
    pub history_limit: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_floor: default_candidate_floor(),
            accept_floor: default_accept_floor(),
            history_limit: default_history_limit(),
        }
    }
}

fn default_candidate_floor() -> f64 {
    crate::matcher::DEFAULT_CANDIDATE_FLOOR
}
fn default_accept_floor() -> f64 {
    crate::policy::DEFAULT_ACCEPT_FLOOR
}
fn default_history_limit() -> i64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// API base URL, without the `/chat/completions` suffix. Overridable
    /// for proxies and local stand-ins.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}

impl ModelConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate retrieval thresholds
    if !(0.0..=1.0).contains(&config.retrieval.candidate_floor) {
        anyhow::bail!("retrieval.candidate_floor must be in [0.0, 1.0]");
    }
    if !(0.0..=1.0).contains(&config.retrieval.accept_floor) {
        anyhow::bail!("retrieval.accept_floor must be in [0.0, 1.0]");
    }
    if config.retrieval.candidate_floor > config.retrieval.accept_floor {
        anyhow::bail!("retrieval.candidate_floor must not exceed retrieval.accept_floor");
    }
    if config.retrieval.history_limit < 1 {
        anyhow::bail!("retrieval.history_limit must be >= 1");
    }

    match config.model.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown model provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(config)
}
