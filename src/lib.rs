//! # MedKB
//!
//! A local-first knowledge retrieval and response-policy engine for
//! health-assistant chat backends.
//!
//! MedKB answers free-text questions from a curated corpus of
//! question/answer pairs when it can, and escalates to an external chat
//! model only when local retrieval is not confident enough. Retrieval is
//! plain term statistics (per-request TF-IDF vectors and cosine
//! similarity) with no embeddings, no index, and no learned components.
//!
//! ## Architecture
//!
//! ```text
//!  query ──▶ safety filter ──▶ TF-IDF matcher ──▶ confidence gate
//!                │                  │                   │
//!                ▼                  ▼            ┌──────┴──────┐
//!            refusal         SQLite corpus       ▼             ▼
//!                                            local answer   OpenAI /
//!                                                           fallback
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! medkb init                     # create database
//! medkb seed                     # load the starter corpus
//! medkb ask "I have a fever, what should I do?"
//! medkb serve                    # start the HTTP endpoint
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`tokenize`] | Word tokenizer |
//! | [`tfidf`] | TF-IDF vectorizer and cosine similarity |
//! | [`matcher`] | Best-match selection over the corpus |
//! | [`policy`] | Safety filter, confidence gate, response assembly |
//! | [`model`] | External chat-model collaborator |
//! | [`store`] | Knowledge and session persistence |
//! | [`seed`] | Administrative corpus seeding |
//! | [`server`] | HTTP endpoint |
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod matcher;
pub mod migrate;
pub mod model;
pub mod models;
pub mod policy;
pub mod seed;
pub mod server;
pub mod store;
pub mod tfidf;
pub mod tokenize;
