// src/article.rs
//! Candidate article model shared by ingest, cache, selector and delivery.
//!
//! Articles arrive either from the RSS providers in [`crate::ingest`] or from a
//! JSON artifact written by an upstream fetch job. Both paths produce the same
//! [`Article`] shape; the JSON path is lenient so a single bad record never
//! sinks a whole batch.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// Lowest source-priority tier; used when a record carries none.
pub const DEFAULT_PRIORITY: u8 = 1;

/// Feed origins the selector knows how to cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Bloomberg,
    Yahoo,
    Reuters,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Bloomberg, Source::Yahoo, Source::Reuters];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Bloomberg => "bloomberg",
            Source::Yahoo => "yahoo",
            Source::Reuters => "reuters",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bloomberg" => Ok(Source::Bloomberg),
            "yahoo" => Ok(Source::Yahoo),
            "reuters" => Ok(Source::Reuters),
            other => bail!("unknown source `{other}`"),
        }
    }
}

/// A normalized candidate article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// 16-char hex digest of `link:title`; filled in on load when absent.
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    pub link: String,
    pub source: Source,
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_priority", deserialize_with = "lenient_priority")]
    pub priority: u8,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author: Option<String>,
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

impl Article {
    /// Stable identifier for a (link, title) pair: first 8 bytes of
    /// SHA-256(`"{link}:{title}"`) as lowercase hex.
    pub fn compute_id(link: &str, title: &str) -> String {
        use sha2::{Digest, Sha256};
        use std::fmt::Write as _;

        let mut hasher = Sha256::new();
        hasher.update(link.as_bytes());
        hasher.update(b":");
        hasher.update(title.as_bytes());
        let digest = hasher.finalize();

        let mut out = String::with_capacity(16);
        for b in digest.iter().take(8) {
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }

    /// Build an article and derive its id from `link` and `title`.
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        source: Source,
        category: impl Into<String>,
        priority: u8,
    ) -> Self {
        let title = title.into();
        let link = link.into();
        Self {
            id: Self::compute_id(&link, &title),
            title,
            summary: String::new(),
            link,
            source,
            category: category.into(),
            priority,
            published: None,
            author: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_published(mut self, published: DateTime<Utc>) -> Self {
        self.published = Some(published);
        self
    }
}

/// An article after ranking. `fetch_full_content` is only ever set by the selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredArticle {
    #[serde(flatten)]
    pub article: Article,
    pub score: f64,
    #[serde(default)]
    pub fetch_full_content: bool,
}

impl ScoredArticle {
    pub fn id(&self) -> &str {
        &self.article.id
    }

    pub fn source(&self) -> Source {
        self.article.source
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Other(serde::de::IgnoredAny),
}

/// Accept RFC 3339, naive ISO-8601 (treated as UTC) or RFC 2822; anything else is `None`.
fn lenient_timestamp<'de, D>(de: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<RawTimestamp> = Option::deserialize(de)?;
    Ok(match raw {
        Some(RawTimestamp::Text(s)) => parse_timestamp(&s),
        _ => None,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPriority {
    Int(i64),
    Other(serde::de::IgnoredAny),
}

/// Integers in 1..=255 pass through; anything else drops to the lowest tier.
fn lenient_priority<'de, D>(de: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<RawPriority> = Option::deserialize(de)?;
    Ok(match raw {
        Some(RawPriority::Int(n)) => u8::try_from(n)
            .ok()
            .filter(|&p| p > 0)
            .unwrap_or(DEFAULT_PRIORITY),
        _ => DEFAULT_PRIORITY,
    })
}

/// Parse the timestamp shapes seen in feed artifacts.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    DateTime::parse_from_rfc2822(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse an ingestion artifact: either a bare array of articles or an object
/// with an `articles` array. Malformed records are skipped with a warning.
pub fn parse_articles_json(content: &str) -> Result<Vec<Article>> {
    let root: serde_json::Value =
        serde_json::from_str(content).context("parsing article artifact json")?;

    let items = match root {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("articles") {
            Some(serde_json::Value::Array(items)) => items,
            _ => bail!("artifact object has no `articles` array"),
        },
        _ => bail!("artifact must be an array or an object with `articles`"),
    };

    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<Article>(item) {
            Ok(mut a) => {
                if a.id.trim().is_empty() {
                    a.id = Article::compute_id(&a.link, &a.title);
                }
                out.push(a);
            }
            Err(e) => {
                warn!(target: "ingest", index = idx, error = %e, "skipping malformed article");
            }
        }
    }
    Ok(out)
}

/// Read and parse an ingestion artifact from disk.
pub fn load_articles_json(path: &Path) -> Result<Vec<Article>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading article artifact {}", path.display()))?;
    parse_articles_json(&content)
}
