// src/scoring.rs
//! Article relevance scoring.
//!
//! score = 0.30 * freshness + 0.30 * keyword + 0.25 * priority + 0.15 * baseline
//!
//! Every sub-score lives in [0,1]. The baseline is a constant: source diversity
//! is enforced by the selector's per-source caps, not here.

use chrono::{DateTime, Utc};

use crate::article::Article;
use crate::config::KeywordConfig;

pub const W_FRESHNESS: f64 = 0.30;
pub const W_KEYWORD: f64 = 0.30;
pub const W_PRIORITY: f64 = 0.25;
pub const W_DIVERSITY: f64 = 0.15;

/// Highest source-priority tier; `priority / MAX_PRIORITY` is the priority sub-score.
pub const MAX_PRIORITY: f64 = 3.0;

/// Freshness used when the publish time is unknown.
pub const NEUTRAL_FRESHNESS: f64 = 0.5;

const KW_HIGH: f64 = 0.15;
const KW_MEDIUM: f64 = 0.08;
const KW_LOW: f64 = -0.10;

/// Freshness step function over age in hours. Future timestamps count as brand new.
pub fn freshness_for_age_hours(hours: f64) -> f64 {
    if hours < 1.0 {
        1.0
    } else if hours < 6.0 {
        0.9
    } else if hours < 12.0 {
        0.8
    } else if hours < 24.0 {
        0.7
    } else if hours < 48.0 {
        0.5
    } else {
        0.3
    }
}

/// Freshness of an optional publish time relative to `now`.
pub fn freshness(published: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match published {
        None => NEUTRAL_FRESHNESS,
        Some(ts) => {
            let hours = now.signed_duration_since(ts).num_seconds() as f64 / 3600.0;
            freshness_for_age_hours(hours)
        }
    }
}

/// Source priority mapped into [0,1].
pub fn priority_score(priority: u8) -> f64 {
    (f64::from(priority) / MAX_PRIORITY).clamp(0.0, 1.0)
}

/// Stateless scorer holding the keyword lists for a run.
#[derive(Debug, Clone)]
pub struct Scorer {
    keywords: KeywordConfig,
}

impl Scorer {
    /// Keywords are expected lowercase (as produced by config loading).
    pub fn new(keywords: KeywordConfig) -> Self {
        Self { keywords }
    }

    pub fn keywords(&self) -> &KeywordConfig {
        &self.keywords
    }

    /// Keyword relevance over lowercase `title + " " + summary`, clamped to [0,1].
    pub fn keyword_score(&self, article: &Article) -> f64 {
        let text = format!("{} {}", article.title, article.summary).to_lowercase();
        let hits = |list: &[String]| list.iter().filter(|k| text.contains(k.as_str())).count() as f64;

        let raw = hits(&self.keywords.high) * KW_HIGH
            + hits(&self.keywords.medium) * KW_MEDIUM
            + hits(&self.keywords.low) * KW_LOW;
        raw.clamp(0.0, 1.0)
    }

    /// Score at an explicit instant.
    pub fn score_at(&self, article: &Article, now: DateTime<Utc>) -> f64 {
        let raw = W_FRESHNESS * freshness(article.published, now)
            + W_KEYWORD * self.keyword_score(article)
            + W_PRIORITY * priority_score(article.priority)
            + W_DIVERSITY;
        raw.clamp(0.0, 1.0)
    }

    pub fn score(&self, article: &Article) -> f64 {
        self.score_at(article, Utc::now())
    }
}
