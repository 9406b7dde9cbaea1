// src/selector.rs
//! Quota-constrained, source-diverse article selection.
//!
//! Candidates are scored, stable-sorted by score (ties keep feed order) and
//! admitted in up to three passes:
//!
//! 1. **Bloomberg priority** – up to `caps.bloomberg` Bloomberg items, the first
//!    `full_content_quota` of them flagged for full-content fetch; then up to
//!    `caps.yahoo` Yahoo and `caps.reuters` Reuters items, never flagged.
//!    **Balanced** – every source capped at `total / caps.balanced_divisor + 1`,
//!    flagged while fewer than `full_content_quota` items carry the flag.
//! 2. **Backfill** – any remaining candidate in score order, unflagged, until
//!    the total quota is met.
//!
//! Identifiers are admitted at most once, even if the input repeats them.

use chrono::{DateTime, Utc};
use metrics::counter;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::article::{Article, ScoredArticle, Source};
use crate::config::{SelectionConfig, SourceCaps};
use crate::scoring::Scorer;

/// Per-run selection quotas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub total: usize,
    pub full_content: usize,
    pub bloomberg_priority: bool,
}

impl From<&SelectionConfig> for Quota {
    fn from(cfg: &SelectionConfig) -> Self {
        Self {
            total: cfg.total_articles,
            full_content: cfg.full_content_count,
            bloomberg_priority: cfg.bloomberg_priority,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Selector {
    scorer: Scorer,
    caps: SourceCaps,
}

impl Selector {
    pub fn new(scorer: Scorer, caps: SourceCaps) -> Self {
        Self { scorer, caps }
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// Score and rank at an explicit instant. Stable: equal scores keep input order.
    pub fn rank_at(&self, candidates: Vec<Article>, now: DateTime<Utc>) -> Vec<ScoredArticle> {
        let mut ranked: Vec<ScoredArticle> = candidates
            .into_iter()
            .map(|article| {
                let score = self.scorer.score_at(&article, now);
                ScoredArticle {
                    article,
                    score,
                    fetch_full_content: false,
                }
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }

    /// Score, rank and select at an explicit instant.
    pub fn select_at(
        &self,
        candidates: Vec<Article>,
        quota: Quota,
        now: DateTime<Utc>,
    ) -> Vec<ScoredArticle> {
        let ranked = self.rank_at(candidates, now);
        select_ranked(ranked, quota, &self.caps)
    }

    pub fn select(&self, candidates: Vec<Article>, quota: Quota) -> Vec<ScoredArticle> {
        self.select_at(candidates, quota, Utc::now())
    }
}

/// Selection state for one run.
struct Picker {
    total: usize,
    picked: Vec<ScoredArticle>,
    taken: Vec<bool>,
    ids: HashSet<String>,
    per_source: HashMap<Source, usize>,
    flagged: usize,
}

impl Picker {
    fn new(total: usize, pool: usize) -> Self {
        Self {
            total,
            picked: Vec::with_capacity(total.min(pool)),
            taken: vec![false; pool],
            ids: HashSet::new(),
            per_source: HashMap::new(),
            flagged: 0,
        }
    }

    fn full(&self) -> bool {
        self.picked.len() >= self.total
    }

    fn count(&self, source: Source) -> usize {
        self.per_source.get(&source).copied().unwrap_or(0)
    }

    /// True if slot `idx` can still be admitted (not taken, id not seen).
    fn available(&self, idx: usize, item: &ScoredArticle) -> bool {
        !self.taken[idx] && !self.ids.contains(item.id())
    }

    fn admit(&mut self, idx: usize, item: &ScoredArticle, flag: bool) {
        let mut chosen = item.clone();
        chosen.fetch_full_content = flag;
        self.taken[idx] = true;
        self.ids.insert(chosen.article.id.clone());
        *self.per_source.entry(chosen.source()).or_insert(0) += 1;
        if flag {
            self.flagged += 1;
        }
        self.picked.push(chosen);
    }
}

/// Select from an already-ranked list (highest score first).
pub fn select_ranked(ranked: Vec<ScoredArticle>, quota: Quota, caps: &SourceCaps) -> Vec<ScoredArticle> {
    let mut p = Picker::new(quota.total, ranked.len());

    if quota.bloomberg_priority {
        for (idx, item) in ranked.iter().enumerate() {
            if p.full() {
                break;
            }
            if item.source() == Source::Bloomberg
                && p.count(Source::Bloomberg) < caps.bloomberg
                && p.available(idx, item)
            {
                let flag = p.count(Source::Bloomberg) < quota.full_content;
                p.admit(idx, item, flag);
            }
        }

        for (idx, item) in ranked.iter().enumerate() {
            if p.full() {
                break;
            }
            if !p.available(idx, item) {
                continue;
            }
            let cap = match item.source() {
                Source::Yahoo => caps.yahoo,
                Source::Reuters => caps.reuters,
                Source::Bloomberg => continue,
            };
            if p.count(item.source()) < cap {
                p.admit(idx, item, false);
            }
        }
    } else {
        let cap = quota.total / caps.balanced_divisor.max(1) + 1;
        for (idx, item) in ranked.iter().enumerate() {
            if p.full() {
                break;
            }
            if p.count(item.source()) < cap && p.available(idx, item) {
                let flag = p.flagged < quota.full_content;
                p.admit(idx, item, flag);
            }
        }
    }

    let before_backfill = p.picked.len();
    for (idx, item) in ranked.iter().enumerate() {
        if p.full() {
            break;
        }
        if p.available(idx, item) {
            p.admit(idx, item, false);
        }
    }
    let backfilled = p.picked.len() - before_backfill;

    info!(
        target: "selector",
        bloomberg = p.count(Source::Bloomberg),
        yahoo = p.count(Source::Yahoo),
        reuters = p.count(Source::Reuters),
        backfilled,
        flagged = p.flagged,
        total = p.picked.len(),
        "selection complete"
    );
    debug!(target: "selector", candidates = ranked.len(), quota = quota.total, "selection input");

    counter!("digest_selected_total").increment(p.picked.len() as u64);
    counter!("digest_flagged_total").increment(p.flagged as u64);

    p.picked
}
