// src/ingest/types.rs
use anyhow::Result;

use crate::article::Article;

/// Something that yields a batch of candidate articles (one RSS feed, a fixture, ...).
#[async_trait::async_trait]
pub trait FeedProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<Article>>;
    /// Label for logs, e.g. `bloomberg/markets`.
    fn name(&self) -> &str;
}
