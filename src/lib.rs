// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod article;
pub mod cache;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod scoring;
pub mod selector;

// ---- Re-exports for stable public API ----
pub use crate::article::{Article, ScoredArticle, Source};
pub use crate::cache::{CacheStats, DedupCache};
pub use crate::config::DigestConfig;
pub use crate::pipeline::{Pipeline, RunReport};
pub use crate::scoring::Scorer;
pub use crate::selector::{Quota, Selector};
