// src/pipeline.rs
//! One digest run: filter → select → deliver → record.
//!
//! The cache is written only after every sink accepted the digest, so a failed
//! delivery leaves the selected articles eligible for the next run.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use tracing::{info, warn};

use crate::article::Article;
use crate::cache::DedupCache;
use crate::config::DigestConfig;
use crate::notify::{Digest, DigestSink};
use crate::scoring::Scorer;
use crate::selector::{Quota, Selector};

/// What a run did, for logs and the binary's exit summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub fetched: usize,
    pub fresh: usize,
    pub selected: usize,
    pub flagged: usize,
    pub recorded: usize,
    pub delivered: bool,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    selector: Selector,
    quota: Quota,
    min_candidates: usize,
}

impl Pipeline {
    pub fn new(selector: Selector, quota: Quota, min_candidates: usize) -> Self {
        Self {
            selector,
            quota,
            min_candidates,
        }
    }

    pub fn from_config(cfg: &DigestConfig) -> Self {
        let scorer = Scorer::new(cfg.keywords.clone());
        let selector = Selector::new(scorer, cfg.selection.caps);
        Self::new(selector, Quota::from(&cfg.selection), cfg.run.min_candidates)
    }

    pub fn quota(&self) -> Quota {
        self.quota
    }

    pub async fn run_once(
        &self,
        cache: &mut DedupCache,
        candidates: Vec<Article>,
        sinks: &[Box<dyn DigestSink>],
    ) -> Result<RunReport> {
        self.run_once_at(cache, candidates, sinks, Utc::now()).await
    }

    /// [`run_once`](Self::run_once) at an explicit instant (freshness, purge and record).
    pub async fn run_once_at(
        &self,
        cache: &mut DedupCache,
        candidates: Vec<Article>,
        sinks: &[Box<dyn DigestSink>],
        now: DateTime<Utc>,
    ) -> Result<RunReport> {
        crate::metrics::ensure_metrics_described();

        let mut report = RunReport {
            fetched: candidates.len(),
            ..RunReport::default()
        };
        counter!("digest_candidates_total").increment(candidates.len() as u64);

        if candidates.len() < self.min_candidates {
            bail!(
                "too few candidates: {} < {}",
                candidates.len(),
                self.min_candidates
            );
        }

        let fresh = cache.filter_new_at(candidates, now)?;
        report.fresh = fresh.len();
        if fresh.is_empty() {
            info!(target: "pipeline", "no new articles");
            return Ok(report);
        }

        let selected = self.selector.select_at(fresh, self.quota, now);
        let digest = Digest::new(selected, now);
        report.selected = digest.metadata.total_articles;
        report.flagged = digest.metadata.full_content_count;

        for sink in sinks {
            if let Err(e) = sink.deliver(&digest).await {
                counter!("digest_sink_errors_total").increment(1);
                warn!(target: "pipeline", sink = sink.name(), error = ?e, "delivery failed, cache left untouched");
                return Err(e.context(format!("delivering digest via {}", sink.name())));
            }
        }
        report.delivered = true;

        report.recorded = cache.record_at(digest.articles.iter().map(|s| &s.article), now)?;
        gauge!("digest_last_run_ts").set(now.timestamp() as f64);

        info!(
            target: "pipeline",
            fetched = report.fetched,
            fresh = report.fresh,
            selected = report.selected,
            flagged = report.flagged,
            recorded = report.recorded,
            "run complete"
        );
        Ok(report)
    }
}
