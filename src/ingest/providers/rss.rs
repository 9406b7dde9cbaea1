// src/ingest/providers/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::article::{parse_timestamp, Article};
use crate::config::{FeedConfig, FetchingConfig};
use crate::ingest::normalize_text;
use crate::ingest::types::FeedProvider;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    author: Option<String>,
    /// `<dc:creator>`; quick-xml matches on the local name.
    creator: Option<String>,
}

/// RFC 2822 first (what RSS 2.0 mandates), then the looser shapes feeds emit anyway.
fn parse_pub_date(ts: &str) -> Option<DateTime<Utc>> {
    OffsetDateTime::parse(ts.trim(), &Rfc2822)
        .ok()
        .and_then(|dt| DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond()))
        .or_else(|| parse_timestamp(ts))
}

/// Parse an RSS 2.0 document into articles for `feed`.
/// Only the first `max_items_per_feed` items are considered.
pub fn parse_rss(xml: &str, feed: &FeedConfig, limits: &FetchingConfig) -> Result<Vec<Article>> {
    let rss: Rss = from_str(xml)
        .with_context(|| format!("parsing {}/{} rss xml", feed.source, feed.category))?;

    let mut out = Vec::with_capacity(rss.channel.item.len().min(limits.max_items_per_feed));
    for it in rss.channel.item.into_iter().take(limits.max_items_per_feed) {
        let title = normalize_text(it.title.as_deref().unwrap_or_default(), usize::MAX);
        let link = it.link.as_deref().unwrap_or_default().trim().to_string();
        if title.is_empty() && link.is_empty() {
            continue;
        }

        let mut article = Article::new(title, link, feed.source, feed.category.clone(), feed.priority);
        article.summary = normalize_text(
            it.description.as_deref().unwrap_or_default(),
            limits.summary_max_chars,
        );
        article.published = it.pub_date.as_deref().and_then(parse_pub_date);
        article.author = it
            .author
            .or(it.creator)
            .map(|a| normalize_text(&a, 200))
            .filter(|a| !a.is_empty());
        out.push(article);
    }

    counter!("digest_feed_items_total").increment(out.len() as u64);
    Ok(out)
}

enum Mode {
    Fixture(String),
    Http(reqwest::Client),
}

/// One configured RSS feed, read from an embedded document or over HTTP.
pub struct RssFeedProvider {
    feed: FeedConfig,
    limits: FetchingConfig,
    label: String,
    mode: Mode,
}

impl RssFeedProvider {
    pub fn from_fixture(feed: FeedConfig, limits: FetchingConfig, xml: &str) -> Self {
        Self::with_mode(feed, limits, Mode::Fixture(xml.to_string()))
    }

    /// `client` should already carry the request timeout and user agent.
    pub fn http(feed: FeedConfig, limits: FetchingConfig, client: reqwest::Client) -> Self {
        Self::with_mode(feed, limits, Mode::Http(client))
    }

    fn with_mode(feed: FeedConfig, limits: FetchingConfig, mode: Mode) -> Self {
        let label = format!("{}/{}", feed.source, feed.category);
        Self {
            feed,
            limits,
            label,
            mode,
        }
    }

    async fn body(&self) -> Result<String> {
        match &self.mode {
            Mode::Fixture(xml) => Ok(xml.clone()),
            Mode::Http(client) => {
                let rsp = client
                    .get(&self.feed.url)
                    .header(
                        reqwest::header::ACCEPT,
                        "application/rss+xml,application/xml;q=0.9,*/*;q=0.8",
                    )
                    .send()
                    .await
                    .with_context(|| format!("GET {}", self.feed.url))?
                    .error_for_status()
                    .with_context(|| format!("GET {}", self.feed.url))?;
                rsp.text().await.context("reading feed body")
            }
        }
    }
}

#[async_trait]
impl FeedProvider for RssFeedProvider {
    async fn fetch_latest(&self) -> Result<Vec<Article>> {
        let xml = self.body().await?;
        parse_rss(&xml, &self.feed, &self.limits)
    }

    fn name(&self) -> &str {
        &self.label
    }
}
