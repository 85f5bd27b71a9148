//! # MedKB CLI (`medkb`)
//!
//! Commands for database setup, corpus seeding, one-off queries, matcher
//! debugging, and running the HTTP endpoint.
//!
//! ## Usage
//!
//! ```bash
//! medkb --config ./config/medkb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `medkb init` | Create the SQLite database and run schema migrations |
//! | `medkb seed` | Insert the built-in starter corpus (or `--file <toml>`) |
//! | `medkb ask "<question>"` | Run one question through the full response policy |
//! | `medkb match "<question>"` | Run the matcher only; print the best entry and score |
//! | `medkb knowledge` | List the corpus |
//! | `medkb serve` | Start the HTTP server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use medkb::models::ChatRequest;
use medkb::{config, db, matcher, migrate, policy, seed, server, store};

/// MedKB CLI: a local-first knowledge retrieval and response-policy
/// engine for health-assistant chat backends.
#[derive(Parser)]
#[command(
    name = "medkb",
    about = "MedKB: local knowledge retrieval with a confidence-gated response policy",
    version,
    long_about = "MedKB answers questions from a curated corpus via per-request TF-IDF \
    retrieval, escalates to an external chat model when retrieval is not confident enough, \
    and applies a safety-keyword filter with a fixed disclaimer on every response."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/medkb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (knowledge, sessions, messages). Idempotent.
    Init,

    /// Insert knowledge entries.
    ///
    /// Without `--file`, seeds the built-in starter corpus. Seeding
    /// deduplicates on question text, so re-running is safe.
    Seed {
        /// TOML file of `[[entry]]` tables to load instead of the defaults.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Ask a question through the full response policy.
    ///
    /// Applies the safety filter, local retrieval, model escalation, and
    /// fallback exactly as the HTTP endpoint does, then prints the
    /// response with its source and confidence.
    Ask {
        /// The question to ask.
        question: String,

        /// Continue an existing session (enables conversation context
        /// for model escalation).
        #[arg(long)]
        session: Option<String>,
    },

    /// Run the matcher only and print the best-scoring entry.
    ///
    /// Bypasses the policy. Useful for tuning the retrieval floors.
    Match {
        /// The question to score against the corpus.
        question: String,
    },

    /// List the knowledge corpus.
    Knowledge,

    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` and exposes `POST /chat` and `GET /health`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Seed { file } => {
            let pool = db::connect(&cfg).await?;
            let report = match file {
                Some(path) => seed::seed_file(&pool, &path).await?,
                None => seed::seed_defaults(&pool).await?,
            };
            pool.close().await;
            println!(
                "Seeded {} entries ({} duplicates skipped).",
                report.inserted, report.skipped
            );
        }
        Commands::Ask { question, session } => {
            let pool = db::connect(&cfg).await?;
            let request = ChatRequest {
                message: question,
                session_id: session,
                model_credential: None,
            };
            let response = policy::respond(&cfg, &pool, &request).await?;
            pool.close().await;

            println!("{}", response.response);
            println!();
            if let Some(q) = &response.matched_question {
                println!("matched: \"{}\"", q);
            }
            println!(
                "source: {} (confidence {:.2})",
                response.source.as_str(),
                response.confidence
            );
            println!("session: {}", response.session_id);
        }
        Commands::Match { question } => {
            let pool = db::connect(&cfg).await?;
            let knowledge = store::list_knowledge(&pool).await?;
            pool.close().await;

            match matcher::find_best_match(&question, &knowledge, cfg.retrieval.candidate_floor) {
                Some(m) => {
                    println!("[{:.3}] {}", m.confidence, m.question);
                    println!("    answer: {}", m.answer.replace('\n', " "));
                    if m.confidence <= cfg.retrieval.accept_floor {
                        println!(
                            "    (below accept floor {:.2}; the policy would escalate)",
                            cfg.retrieval.accept_floor
                        );
                    }
                }
                None => {
                    println!(
                        "No match above the candidate floor ({:.2}).",
                        cfg.retrieval.candidate_floor
                    );
                }
            }
        }
        Commands::Knowledge => {
            let pool = db::connect(&cfg).await?;
            let entries = store::list_knowledge(&pool).await?;
            pool.close().await;

            if entries.is_empty() {
                println!("Knowledge base is empty. Run `medkb seed` first.");
            }
            for e in &entries {
                println!("{} [{}] ({:.2}) {}", e.id, e.category, e.confidence, e.question);
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
