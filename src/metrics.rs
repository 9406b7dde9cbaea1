// src/metrics.rs
//! Run metrics. A digest run is a short-lived batch job, so instead of serving
//! `/metrics` the binary renders the Prometheus exposition once at the end and
//! writes it where a node-exporter textfile collector can pick it up.

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::path::Path;

pub const ENV_METRICS_FILE: &str = "DIGEST_METRICS_FILE";

/// One-time metrics registration (so series carry help text).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("digest_candidates_total", "Candidates handed to a run.");
        describe_counter!(
            "digest_cache_hits_total",
            "Candidates dropped because their id was already cached."
        );
        describe_counter!(
            "digest_cache_purged_total",
            "Cache entries removed by retention expiry."
        );
        describe_counter!("digest_cache_recorded_total", "Cache entries written.");
        describe_counter!(
            "digest_cache_record_errors_total",
            "Articles skipped while writing the cache."
        );
        describe_counter!("digest_selected_total", "Articles selected for delivery.");
        describe_counter!(
            "digest_flagged_total",
            "Selected articles flagged for full-content fetch."
        );
        describe_counter!("digest_feed_items_total", "Articles parsed from feeds.");
        describe_counter!("digest_feed_errors_total", "Feed fetch/parse errors.");
        describe_counter!("digest_sink_errors_total", "Delivery sink failures.");
        describe_gauge!("digest_last_run_ts", "Unix ts when a digest run last completed.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder as the global recorder.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Write the exposition atomically: temp file in the same dir, then rename.
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("prom.tmp");
        std::fs::write(&tmp, self.render())
            .with_context(|| format!("writing metrics to {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("moving metrics into {}", path.display()))?;
        Ok(())
    }
}
