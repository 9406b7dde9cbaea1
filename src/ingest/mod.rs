// src/ingest/mod.rs
//! Candidate ingestion: RSS providers, text normalization and batch collection.

pub mod providers;
pub mod types;

use anyhow::{Context, Result};
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::time::Duration;

use crate::article::Article;
use crate::config::DigestConfig;
use crate::ingest::providers::rss::RssFeedProvider;
use crate::ingest::types::FeedProvider;

pub const USER_AGENT: &str = concat!("finnews-digest/", env!("CARGO_PKG_VERSION"));

/// Normalize feed text: decode entities, strip tags, straighten quotes,
/// collapse whitespace, trim, then cap at `max_chars` characters.
pub fn normalize_text(s: &str, max_chars: usize) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Curly quotes to ASCII
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect::<String>().trim_end().to_string();
    }

    out
}

/// Fetch every provider in turn. A failing provider is logged and skipped.
pub async fn collect_all(providers: &[Box<dyn FeedProvider>]) -> Vec<Article> {
    crate::metrics::ensure_metrics_described();

    let mut all = Vec::new();
    for p in providers {
        match p.fetch_latest().await {
            Ok(mut v) => {
                tracing::info!(target: "ingest", provider = p.name(), articles = v.len(), "feed fetched");
                all.append(&mut v);
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, provider = p.name(), "feed error");
                counter!("digest_feed_errors_total").increment(1);
            }
        }
    }
    all
}

/// One HTTP provider per configured feed, sharing a client.
pub fn http_providers(cfg: &DigestConfig) -> Result<Vec<Box<dyn FeedProvider>>> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(cfg.fetching.request_timeout_secs))
        .build()
        .context("building feed http client")?;

    Ok(cfg
        .feeds
        .iter()
        .map(|f| {
            Box::new(RssFeedProvider::http(f.clone(), cfg.fetching.clone(), client.clone()))
                as Box<dyn FeedProvider>
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_strips_markup_and_collapses_ws() {
        let s = "  <p>Stocks&nbsp;&amp; bonds</p>\n\n<b>rally</b>  ";
        assert_eq!(normalize_text(s, 500), "Stocks & bonds rally");
    }

    #[test]
    fn normalize_text_straightens_quotes() {
        let s = "\u{201C}Soft landing\u{201D} isn\u{2019}t certain";
        assert_eq!(normalize_text(s, 500), "\"Soft landing\" isn't certain");
    }

    #[test]
    fn normalize_text_caps_length_by_chars() {
        let s = "ü".repeat(600);
        assert_eq!(normalize_text(&s, 500).chars().count(), 500);
        assert_eq!(normalize_text("", 10), "");
    }
}
