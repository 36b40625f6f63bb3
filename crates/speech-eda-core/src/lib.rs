//! # Speech EDA Core
//!
//! Pure, I/O-free logic for the speech EDA pipeline: table models, author
//! resolution, text and paragraph table builders, paragraph-weighted
//! embedding aggregation, the TF-IDF vectorizer, nearest-neighbor ranking
//! and the 2-D feature-space projections (PCA and t-SNE).
//!
//! This crate contains no tokio, HTTP or filesystem code. The `eda`
//! application crate reads and writes tables and talks to embedding
//! services, then hands plain rows to the functions here.

pub mod aggregate;
pub mod author;
pub mod error;
pub mod models;
pub mod project;
pub mod rank;
pub mod tables;
pub mod tfidf;
pub mod tsne;

pub use error::{Error, Result};
