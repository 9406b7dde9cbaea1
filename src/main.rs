//! finnews-digest — batch entrypoint.
//! Loads config, gathers candidates, runs one digest and exits.
//!
//! Candidates come from `$DIGEST_INPUT` (a JSON artifact from an upstream fetch
//! job) when set, otherwise from the `[[feeds]]` in the config.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use finnews_digest::article::load_articles_json;
use finnews_digest::ingest::{collect_all, http_providers};
use finnews_digest::metrics::{Metrics, ENV_METRICS_FILE};
use finnews_digest::notify::{DigestSink, JsonFileSink, WebhookSink};
use finnews_digest::{DedupCache, DigestConfig, Pipeline};

const ENV_INPUT: &str = "DIGEST_INPUT";

/// Compact logs by default; `DIGEST_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("finnews_digest=info,warn"));
    let json = std::env::var("DIGEST_LOG_JSON").ok().is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let metrics_file = std::env::var(ENV_METRICS_FILE).ok().map(PathBuf::from);
    let metrics = match &metrics_file {
        Some(_) => Some(Metrics::init()?),
        None => None,
    };

    // Config defects are fatal before anything else runs.
    let cfg = DigestConfig::load_default().context("loading digest config")?;
    info!(
        total = cfg.selection.total_articles,
        full_content = cfg.selection.full_content_count,
        bloomberg_priority = cfg.selection.bloomberg_priority,
        feeds = cfg.feeds.len(),
        "configuration loaded"
    );

    let candidates = match std::env::var(ENV_INPUT) {
        Ok(p) => load_articles_json(&PathBuf::from(p))?,
        Err(_) => {
            let providers = http_providers(&cfg)?;
            collect_all(&providers).await
        }
    };
    info!(candidates = candidates.len(), "candidates gathered");

    let mut sinks: Vec<Box<dyn DigestSink>> = vec![Box::new(JsonFileSink::new(cfg.run.output_dir.clone()))];
    if let Some(url) = &cfg.run.webhook_url {
        sinks.push(Box::new(WebhookSink::new(url.clone()).with_timeout(cfg.fetching.request_timeout_secs)));
    }

    let mut cache = DedupCache::from_config(&cfg.cache)?;
    let pipeline = Pipeline::from_config(&cfg);
    let outcome = pipeline.run_once(&mut cache, candidates, &sinks).await;

    match cache.stats() {
        Ok(s) => info!(total = s.total_count, per_source = ?s.per_source_count, "cache stats"),
        Err(e) => warn!(error = ?e, "cache stats unavailable"),
    }

    if let (Some(m), Some(path)) = (&metrics, &metrics_file) {
        if let Err(e) = m.write_textfile(path) {
            warn!(error = ?e, "metrics dump failed");
        }
    }

    let report = outcome?;
    info!(?report, "digest run finished");
    Ok(())
}
