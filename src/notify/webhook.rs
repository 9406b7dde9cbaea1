use super::{Digest, DigestSink};
use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use std::fmt::Write as _;
use std::time::Duration;

/// Plain-text chat webhook. One attempt per run; retry policy belongs to the scheduler.
#[derive(Clone)]
pub struct WebhookSink {
    webhook: String,
    client: Client,
    timeout: Duration,
}

impl WebhookSink {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

/// Render the digest as a short plain-text message: one line per article.
pub fn render_text(digest: &Digest) -> String {
    let mut out = format!(
        "Market news ({} articles, {})\n",
        digest.metadata.total_articles,
        digest.metadata.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    for (i, a) in digest.articles.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. [{}] {} {}",
            i + 1,
            a.article.source,
            a.article.title,
            a.article.link
        );
    }
    out.trim_end().to_string()
}

#[derive(Serialize)]
struct TextPayload<'a> {
    text: &'a str,
}

#[async_trait::async_trait]
impl DigestSink for WebhookSink {
    async fn deliver(&self, digest: &Digest) -> Result<()> {
        let text = render_text(digest);
        let rsp = self
            .client
            .post(&self.webhook)
            .timeout(self.timeout)
            .json(&TextPayload { text: &text })
            .send()
            .await
            .map_err(|e| anyhow!("webhook request failed: {e}"))?;

        rsp.error_for_status_ref()
            .map_err(|e| anyhow!("webhook HTTP error: {e}"))?;
        tracing::info!(target: "notify", articles = digest.articles.len(), "webhook delivered");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::{Article, ScoredArticle, Source};
    use chrono::{TimeZone, Utc};

    #[test]
    fn text_lists_each_article() {
        let arts = vec![
            ScoredArticle {
                article: Article::new("Fed holds", "https://x.test/1", Source::Bloomberg, "m", 3),
                score: 0.8,
                fetch_full_content: true,
            },
            ScoredArticle {
                article: Article::new("Oil slips", "https://x.test/2", Source::Reuters, "m", 1),
                score: 0.4,
                fetch_full_content: false,
            },
        ];
        let d = Digest::new(arts, Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap());
        let text = render_text(&d);
        assert_eq!(
            text,
            "Market news (2 articles, 2025-09-06 09:00 UTC)\n\
             1. [bloomberg] Fed holds https://x.test/1\n\
             2. [reuters] Oil slips https://x.test/2"
        );
    }
}
