//! # Speech EDA
//!
//! An exploratory-analysis pipeline over a corpus of presidential speeches.
//!
//! Raw speech records are normalized into relational tables, every
//! paragraph is embedded (lexically with TF-IDF or through a remote neural
//! model), paragraph vectors are aggregated into one vector per speech, and
//! speeches are ranked against each other by cosine distance.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Raw records │──▶│   Tables    │──▶│  Embeddings  │──▶│    Export    │
//! │ JSON + alias│   │ text / para │   │ tfidf/openai │   │ sim + 2-D    │
//! └─────────────┘   └─────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! The pure stages (table building, aggregation, TF-IDF, ranking,
//! projection) live in the `speech-eda-core` crate. This crate adds I/O:
//! record discovery, the on-disk table store, the OpenAI client and the
//! `eda` command handlers.
//!
//! ## Quick Start
//!
//! ```bash
//! eda tables ./speeches ./authors.json ./tables
//! eda embed ./tables --kind tfidf
//! eda embed ./tables --kind openai-3-small   # needs OPENAI_API_KEY
//! eda export ./tables --output ./site/data
//! eda stats ./tables
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`records`] | Raw record discovery |
//! | [`store`] | JSON Lines table store |
//! | [`embedding`] | Embedding client abstraction and OpenAI client |
//! | [`progress`] | Embed progress reporting |
//! | [`tables_cmd`] | `eda tables` |
//! | [`embed_cmd`] | `eda embed` |
//! | [`export`] | `eda export` |
//! | [`stats`] | `eda stats` |

pub mod config;
pub mod embed_cmd;
pub mod embedding;
pub mod export;
pub mod progress;
pub mod records;
pub mod stats;
pub mod store;
pub mod tables_cmd;
