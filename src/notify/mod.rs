// src/notify/mod.rs
//! Delivery of a finished digest to downstream collaborators.
//!
//! A [`Digest`] is handed to every configured [`DigestSink`]; the cache is only
//! updated once all of them succeed.

pub mod file;
pub mod webhook;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Mutex;

use crate::article::ScoredArticle;

pub use file::JsonFileSink;
pub use webhook::WebhookSink;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestMetadata {
    pub generated_at: DateTime<Utc>,
    pub total_articles: usize,
    /// Articles flagged for full-content fetch.
    pub full_content_count: usize,
    pub sources: Vec<String>,
}

/// The selected articles of one run plus summary metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Digest {
    pub metadata: DigestMetadata,
    pub articles: Vec<ScoredArticle>,
}

impl Digest {
    pub fn new(articles: Vec<ScoredArticle>, generated_at: DateTime<Utc>) -> Self {
        let sources: BTreeSet<&str> = articles.iter().map(|a| a.source().as_str()).collect();
        let metadata = DigestMetadata {
            generated_at,
            total_articles: articles.len(),
            full_content_count: articles.iter().filter(|a| a.fetch_full_content).count(),
            sources: sources.into_iter().map(str::to_string).collect(),
        };
        Self { metadata, articles }
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

#[async_trait::async_trait]
pub trait DigestSink: Send + Sync {
    async fn deliver(&self, digest: &Digest) -> Result<()>;
    fn name(&self) -> &'static str;
}

// --- Test helper ---
/// Sink that keeps every delivered digest in memory; optionally fails.
pub struct MemorySink {
    pub delivered: Mutex<Vec<Digest>>,
    fail: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            delivered: Mutex::new(vec![]),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            delivered: Mutex::new(vec![]),
            fail: true,
        }
    }

    pub fn deliveries(&self) -> usize {
        self.delivered.lock().map(|v| v.len()).unwrap_or(0)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DigestSink for MemorySink {
    async fn deliver(&self, digest: &Digest) -> Result<()> {
        if self.fail {
            anyhow::bail!("memory sink configured to fail");
        }
        self.delivered
            .lock()
            .map_err(|_| anyhow::anyhow!("memory sink mutex poisoned"))?
            .push(digest.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
