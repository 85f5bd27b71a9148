//! Administrative knowledge seeding.
//!
//! The corpus is read-only at query time; rows only enter through this
//! module. `medkb seed` inserts the built-in starter corpus, and
//! `medkb seed --file entries.toml` loads additional `[[entry]]` tables.
//! Seeding is idempotent: entries deduplicate on normalized question text,
//! so re-running a seed reports skips instead of creating duplicates.

use anyhow::{Context, Result};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::path::Path;

use crate::store;

/// One `[[entry]]` table in a seed file.
#[derive(Debug, Deserialize)]
pub struct SeedEntry {
    pub question: String,
    pub answer: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default = "default_source")]
    pub source: String,
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(rename = "entry")]
    entries: Vec<SeedEntry>,
}

fn default_category() -> String {
    "general".to_string()
}
fn default_confidence() -> f64 {
    0.9
}
fn default_source() -> String {
    "curated".to_string()
}

/// Built-in starter corpus: (question, answer, category).
const DEFAULT_ENTRIES: &[(&str, &str, &str)] = &[
    (
        "I have a fever. What should I do?",
        "Rest, drink plenty of fluids, and keep the room cool. Paracetamol \
         can ease discomfort. See a doctor if the fever goes above 39°C, \
         lasts more than three days, or comes with a rash, stiff neck, or \
         trouble breathing.",
        "symptoms",
    ),
    (
        "What should I do about a headache?",
        "Rest in a quiet, dark room, drink water, and consider a short \
         break from screens. A sudden, severe headache or one with fever, \
         confusion, or vision changes needs urgent medical attention.",
        "symptoms",
    ),
    (
        "I have a sore throat. What helps?",
        "Warm drinks, honey, throat lozenges, and salt-water gargles can \
         soothe a sore throat. See a doctor if it lasts longer than a week, \
         or sooner with high fever or difficulty swallowing.",
        "symptoms",
    ),
    (
        "How can I treat a common cold at home?",
        "Rest, fluids, and warm drinks are the mainstays. Saline nasal \
         rinses can help congestion. Most colds clear within ten days; see \
         a doctor if symptoms worsen sharply or you become short of breath.",
        "self-care",
    ),
    (
        "What are the symptoms of the flu?",
        "Influenza usually starts suddenly with fever, chills, muscle \
         aches, fatigue, headache, and a dry cough. Unlike a cold, it tends \
         to knock you flat. High-risk groups should contact a doctor early.",
        "education",
    ),
    (
        "I have a stomach ache. What should I do?",
        "Try small sips of water, bland food, and rest. Avoid alcohol and \
         heavy meals. Severe pain, a rigid belly, blood in stool, or pain \
         concentrated in the lower right side needs urgent care.",
        "symptoms",
    ),
    (
        "How much water should I drink every day?",
        "Around 1.5 to 2 litres a day suits most adults, more in hot \
         weather or during exercise. Thirst and pale-yellow urine are good \
         everyday guides.",
        "lifestyle",
    ),
    (
        "How many hours of sleep do I need?",
        "Most adults do best on seven to nine hours a night. Consistent \
         bed and wake times matter as much as the total, and ongoing \
         daytime sleepiness is worth discussing with a doctor.",
        "lifestyle",
    ),
];

/// Outcome of a seeding run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Insert the built-in starter corpus.
pub async fn seed_defaults(pool: &SqlitePool) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    for (question, answer, category) in DEFAULT_ENTRIES {
        if store::insert_knowledge(pool, question, answer, category, 0.9, "seed").await? {
            report.inserted += 1;
        } else {
            report.skipped += 1;
        }
    }
    Ok(report)
}

/// Insert entries from a `[[entry]]` TOML file.
pub async fn seed_file(pool: &SqlitePool, path: &Path) -> Result<SeedReport> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file: {}", path.display()))?;
    let file: SeedFile =
        toml::from_str(&content).with_context(|| "Failed to parse seed file")?;

    let mut report = SeedReport::default();
    for e in &file.entries {
        if !(0.0..=1.0).contains(&e.confidence) {
            anyhow::bail!(
                "entry confidence must be in [0.0, 1.0]: '{}'",
                e.question
            );
        }
        if store::insert_knowledge(pool, &e.question, &e.answer, &e.category, e.confidence, &e.source)
            .await?
        {
            report.inserted += 1;
        } else {
            report.skipped += 1;
        }
    }
    Ok(report)
}
