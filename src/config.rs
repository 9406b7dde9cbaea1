// src/config.rs
//! Run configuration loaded from TOML.
//!
//! Quotas and keyword lists are required: a digest built on silent defaults
//! would change what gets delivered, so a missing or invalid value fails at
//! startup before any selection runs. Everything else has a default.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::article::{Source, DEFAULT_PRIORITY};

pub const DEFAULT_CONFIG_PATH: &str = "config/digest.toml";
pub const ENV_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";
pub const ENV_WEBHOOK_URL: &str = "DIGEST_WEBHOOK_URL";

#[derive(Debug, Clone, Deserialize)]
pub struct DigestConfig {
    pub selection: SelectionConfig,
    pub keywords: KeywordConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub fetching: FetchingConfig,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectionConfig {
    pub total_articles: usize,
    pub full_content_count: usize,
    #[serde(default)]
    pub bloomberg_priority: bool,
    #[serde(default)]
    pub caps: SourceCaps,
}

/// Per-source admission caps used by the selector.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct SourceCaps {
    /// Bloomberg items admitted first in priority mode.
    #[serde(default = "default_bloomberg_cap")]
    pub bloomberg: usize,
    #[serde(default = "default_yahoo_cap")]
    pub yahoo: usize,
    #[serde(default = "default_reuters_cap")]
    pub reuters: usize,
    /// Balanced mode caps every source at `total / balanced_divisor + 1`.
    #[serde(default = "default_balanced_divisor")]
    pub balanced_divisor: usize,
}

fn default_bloomberg_cap() -> usize {
    7
}
fn default_yahoo_cap() -> usize {
    2
}
fn default_reuters_cap() -> usize {
    1
}
fn default_balanced_divisor() -> usize {
    3
}

impl Default for SourceCaps {
    fn default() -> Self {
        Self {
            bloomberg: default_bloomberg_cap(),
            yahoo: default_yahoo_cap(),
            reuters: default_reuters_cap(),
            balanced_divisor: default_balanced_divisor(),
        }
    }
}

/// Case-insensitive substring lists. Normalized to lowercase on load.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct KeywordConfig {
    pub high: Vec<String>,
    pub medium: Vec<String>,
    pub low: Vec<String>,
}

impl KeywordConfig {
    pub fn new<S: AsRef<str>>(high: &[S], medium: &[S], low: &[S]) -> Self {
        Self {
            high: clean_keywords(high.iter().map(|s| s.as_ref().to_string())),
            medium: clean_keywords(medium.iter().map(|s| s.as_ref().to_string())),
            low: clean_keywords(low.iter().map(|s| s.as_ref().to_string())),
        }
    }

    fn normalize(&mut self) {
        self.high = clean_keywords(std::mem::take(&mut self.high));
        self.medium = clean_keywords(std::mem::take(&mut self.medium));
        self.low = clean_keywords(std::mem::take(&mut self.low));
    }
}

fn clean_keywords(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for it in items {
        let t = it.trim().to_lowercase();
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_retention_hours")]
    pub retention_hours: i64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/cache/news_cache.db")
}
fn default_retention_hours() -> i64 {
    24
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            retention_hours: default_retention_hours(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Abort when ingestion yields fewer candidates than this.
    #[serde(default = "default_min_candidates")]
    pub min_candidates: usize,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

fn default_min_candidates() -> usize {
    5
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            min_candidates: default_min_candidates(),
            output_dir: default_output_dir(),
            webhook_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchingConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_items_per_feed")]
    pub max_items_per_feed: usize,
    #[serde(default = "default_summary_max_chars")]
    pub summary_max_chars: usize,
}

fn default_request_timeout_secs() -> u64 {
    30
}
fn default_max_items_per_feed() -> usize {
    15
}
fn default_summary_max_chars() -> usize {
    500
}

impl Default for FetchingConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            max_items_per_feed: default_max_items_per_feed(),
            summary_max_chars: default_summary_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FeedConfig {
    pub source: Source,
    pub category: String,
    pub url: String,
    #[serde(default = "default_feed_priority")]
    pub priority: u8,
}

fn default_feed_priority() -> u8 {
    DEFAULT_PRIORITY
}

impl DigestConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: DigestConfig = toml::from_str(s).context("parsing digest config toml")?;
        cfg.keywords.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading digest config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid digest config {}", path.display()))
    }

    /// Load using `$DIGEST_CONFIG_PATH`, falling back to `config/digest.toml`.
    /// `$DIGEST_WEBHOOK_URL` overrides `run.webhook_url`.
    pub fn load_default() -> Result<Self> {
        let path = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
                }
                pb
            }
            Err(_) => PathBuf::from(DEFAULT_CONFIG_PATH),
        };
        let mut cfg = Self::load_from(&path)?;
        if let Ok(url) = std::env::var(ENV_WEBHOOK_URL) {
            let url = url.trim();
            if !url.is_empty() {
                cfg.run.webhook_url = Some(url.to_string());
            }
        }
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        let sel = &self.selection;
        if sel.total_articles == 0 {
            bail!("selection.total_articles must be > 0");
        }
        if sel.full_content_count > sel.total_articles {
            bail!(
                "selection.full_content_count ({}) exceeds total_articles ({})",
                sel.full_content_count,
                sel.total_articles
            );
        }
        if sel.caps.balanced_divisor == 0 {
            bail!("selection.caps.balanced_divisor must be > 0");
        }
        if crate::cache::retention_window(self.cache.retention_hours).is_none() {
            bail!(
                "cache.retention_hours must be > 0 and fit a duration, got {}",
                self.cache.retention_hours
            );
        }
        for f in &self.feeds {
            if f.url.trim().is_empty() {
                bail!("feed {}/{} has an empty url", f.source, f.category);
            }
            if f.priority == 0 {
                bail!(
                    "feed {}/{} priority must be >= {DEFAULT_PRIORITY}",
                    f.source,
                    f.category
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    const MINIMAL: &str = r#"
[selection]
total_articles = 10
full_content_count = 3

[keywords]
high = [" Fed ", "RATE", ""]
medium = ["earnings", "earnings"]
low = ["sponsored"]
"#;

    #[test]
    fn minimal_config_fills_defaults_and_normalizes_keywords() {
        let cfg = DigestConfig::from_toml_str(MINIMAL).unwrap();
        assert!(!cfg.selection.bloomberg_priority);
        assert_eq!(cfg.selection.caps, SourceCaps::default());
        assert_eq!(cfg.keywords.high, vec!["fed".to_string(), "rate".to_string()]);
        assert_eq!(cfg.keywords.medium, vec!["earnings".to_string()]);
        assert_eq!(cfg.cache.retention_hours, 24);
        assert_eq!(cfg.run.min_candidates, 5);
        assert_eq!(cfg.fetching.max_items_per_feed, 15);
        assert!(cfg.feeds.is_empty());
    }

    #[test]
    fn missing_quota_is_fatal() {
        let toml = r#"
[selection]
full_content_count = 3
[keywords]
high = []
medium = []
low = []
"#;
        assert!(DigestConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn missing_keywords_is_fatal() {
        let toml = r#"
[selection]
total_articles = 10
full_content_count = 3
"#;
        assert!(DigestConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn full_content_above_total_is_rejected() {
        let toml = MINIMAL.replace("full_content_count = 3", "full_content_count = 11");
        let err = DigestConfig::from_toml_str(&toml).unwrap_err();
        assert!(err.to_string().contains("full_content_count"));
    }

    #[test]
    fn feeds_and_caps_parse() {
        let toml = format!(
            "{MINIMAL}\n{}",
            r#"
[cache]
retention_hours = 48

[[feeds]]
source = "bloomberg"
category = "markets"
url = "https://feeds.example.test/markets.rss"
priority = 3

[[feeds]]
source = "reuters"
category = "business"
url = "https://feeds.example.test/business.rss"
"#
        );
        let toml = toml.replace(
            "full_content_count = 3",
            "full_content_count = 3\nbloomberg_priority = true\n[selection.caps]\nbloomberg = 5",
        );
        let cfg = DigestConfig::from_toml_str(&toml).unwrap();
        assert!(cfg.selection.bloomberg_priority);
        assert_eq!(cfg.selection.caps.bloomberg, 5);
        assert_eq!(cfg.selection.caps.yahoo, 2);
        assert_eq!(cfg.cache.retention_hours, 48);
        assert_eq!(cfg.feeds.len(), 2);
        assert_eq!(cfg.feeds[0].priority, 3);
        assert_eq!(cfg.feeds[1].priority, DEFAULT_PRIORITY);
    }

    #[test]
    fn out_of_range_retention_is_rejected() {
        for hours in ["0", "-5", "9223372036854775807"] {
            let toml = format!("{MINIMAL}\n[cache]\nretention_hours = {hours}\n");
            let err = DigestConfig::from_toml_str(&toml).unwrap_err();
            assert!(err.to_string().contains("retention_hours"), "{hours}: {err}");
        }
        let toml = format!("{MINIMAL}\n[cache]\nretention_hours = 3000000000\n");
        assert!(DigestConfig::from_toml_str(&toml).is_ok());
    }

    #[test]
    fn zero_feed_priority_is_rejected() {
        let toml = format!(
            "{MINIMAL}\n{}",
            r#"
[[feeds]]
source = "yahoo"
category = "markets"
url = "https://feeds.example.test/y.rss"
priority = 0
"#
        );
        let err = DigestConfig::from_toml_str(&toml).unwrap_err();
        assert!(err.to_string().contains("priority"));
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallback() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var(ENV_WEBHOOK_URL);

        // Nothing on disk
        assert!(DigestConfig::load_default().is_err());

        // Fallback path
        fs::create_dir_all(tmp.path().join("config")).unwrap();
        fs::write(tmp.path().join(DEFAULT_CONFIG_PATH), MINIMAL).unwrap();
        let cfg = DigestConfig::load_default().unwrap();
        assert_eq!(cfg.selection.total_articles, 10);
        assert!(cfg.run.webhook_url.is_none());

        // Env path wins, webhook override applies
        let p = tmp.path().join("other.toml");
        fs::write(&p, MINIMAL.replace("total_articles = 10", "total_articles = 4")).unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        env::set_var(ENV_WEBHOOK_URL, "https://hooks.example.test/x");
        let cfg = DigestConfig::load_default().unwrap();
        assert_eq!(cfg.selection.total_articles, 4);
        assert_eq!(cfg.run.webhook_url.as_deref(), Some("https://hooks.example.test/x"));

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(DigestConfig::load_default().is_err());

        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var(ENV_WEBHOOK_URL);
        env::set_current_dir(&old).unwrap();
    }
}
