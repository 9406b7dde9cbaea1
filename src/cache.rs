// src/cache.rs
//! Persistent dedup cache of already-delivered articles.
//!
//! One SQLite table keyed by article id:
//!
//! ```text
//! articles(id TEXT PRIMARY KEY, title TEXT, link TEXT, source TEXT, cached_at INTEGER)
//! ```
//!
//! `cached_at` is unix milliseconds (UTC) and indexed for range eviction.
//! Entries expire after `retention_hours`; expiry is applied lazily at the start
//! of every [`DedupCache::filter_new`] call, *before* the membership check, so a
//! story seen longer ago than the window is offered again.
//!
//! The cache owns a single connection and every operation takes `&mut self` or
//! `&self`, so purge, check and record within one run are serialized by the
//! borrow checker.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use rusqlite::{params, Connection, Statement};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::article::Article;
use crate::config::CacheConfig;

/// Titles are stored truncated to this many characters.
pub const MAX_TITLE_CHARS: usize = 200;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS articles (
    id        TEXT PRIMARY KEY,
    title     TEXT NOT NULL,
    link      TEXT NOT NULL,
    source    TEXT NOT NULL,
    cached_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_cached_at ON articles(cached_at);
";

/// A stored cache row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    pub id: String,
    pub title: String,
    pub link: String,
    pub source: String,
    pub cached_at: DateTime<Utc>,
}

/// Aggregate view of the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_count: usize,
    pub per_source_count: BTreeMap<String, usize>,
}

#[derive(Debug)]
pub struct DedupCache {
    conn: Connection,
    retention: Duration,
    location: String,
}

impl DedupCache {
    /// Open (or create) the cache database at `path`, creating parent directories.
    pub fn open(path: &Path, retention_hours: i64) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating cache dir {}", parent.display()))?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening cache db {}", path.display()))?;
        Self::init(conn, retention_hours, path.display().to_string())
    }

    /// Throwaway cache, mostly for tests and dry runs.
    pub fn open_in_memory(retention_hours: i64) -> Result<Self> {
        let conn = Connection::open_in_memory().context("opening in-memory cache db")?;
        Self::init(conn, retention_hours, ":memory:".to_string())
    }

    pub fn from_config(cfg: &CacheConfig) -> Result<Self> {
        Self::open(&cfg.db_path, cfg.retention_hours)
    }

    fn init(conn: Connection, retention_hours: i64, location: String) -> Result<Self> {
        let Some(retention) = retention_window(retention_hours) else {
            bail!("cache retention must be a positive, representable span, got {retention_hours}h");
        };
        conn.execute_batch(SCHEMA).context("initializing cache schema")?;
        info!(target: "cache", db = %location, retention_hours, "cache database ready");
        Ok(Self {
            conn,
            retention,
            location,
        })
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Purge expired entries, then keep only candidates whose id is not cached.
    pub fn filter_new(&mut self, candidates: Vec<Article>) -> Result<Vec<Article>> {
        self.filter_new_at(candidates, Utc::now())
    }

    /// [`filter_new`](Self::filter_new) at an explicit instant.
    pub fn filter_new_at(
        &mut self,
        candidates: Vec<Article>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Article>> {
        // A window reaching past the earliest representable instant purges nothing.
        let cutoff = now
            .checked_sub_signed(self.retention)
            .map_or(i64::MIN, |c| c.timestamp_millis());

        let tx = self.conn.transaction().context("starting cache filter")?;
        let purged = tx
            .execute("DELETE FROM articles WHERE cached_at < ?1", params![cutoff])
            .context("purging expired cache entries")?;
        let cached: HashSet<String> = {
            let mut stmt = tx.prepare("SELECT id FROM articles")?;
            let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
            rows.collect::<rusqlite::Result<_>>()
                .context("reading cached ids")?
        };
        tx.commit().context("committing cache filter")?;

        if purged > 0 {
            info!(target: "cache", purged, "cleaned up expired cache entries");
            counter!("digest_cache_purged_total").increment(purged as u64);
        }

        let total = candidates.len();
        let fresh: Vec<Article> = candidates
            .into_iter()
            .filter(|a| !cached.contains(&a.id))
            .collect();
        let hits = total - fresh.len();
        counter!("digest_cache_hits_total").increment(hits as u64);
        info!(target: "cache", total, new = fresh.len(), cached = hits, "cache check");

        Ok(fresh)
    }

    /// Upsert one entry per article with `cached_at = now`. A bad article is
    /// logged and skipped. Returns the number of rows written.
    pub fn record<'a, I>(&mut self, articles: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a Article>,
    {
        self.record_at(articles, Utc::now())
    }

    /// [`record`](Self::record) at an explicit instant.
    pub fn record_at<'a, I>(&mut self, articles: I, now: DateTime<Utc>) -> Result<usize>
    where
        I: IntoIterator<Item = &'a Article>,
    {
        let ts = now.timestamp_millis();
        let mut written = 0usize;
        let mut failed = 0usize;

        let tx = self.conn.transaction().context("starting cache record")?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO articles (id, title, link, source, cached_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for a in articles {
                match insert_entry(&mut stmt, a, ts) {
                    Ok(()) => written += 1,
                    Err(e) => {
                        failed += 1;
                        warn!(target: "cache", id = %a.id, error = %e, "error caching article");
                    }
                }
            }
        }
        tx.commit().context("committing cache record")?;

        counter!("digest_cache_recorded_total").increment(written as u64);
        if failed > 0 {
            counter!("digest_cache_record_errors_total").increment(failed as u64);
        }
        info!(target: "cache", written, failed, "added articles to cache");
        Ok(written)
    }

    /// Total and per-source entry counts. Does not purge.
    pub fn stats(&self) -> Result<CacheStats> {
        let total: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM articles", [], |r| r.get(0))
            .context("counting cache entries")?;

        let mut stmt = self
            .conn
            .prepare("SELECT source, COUNT(*) FROM articles GROUP BY source")?;
        let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
        let mut per_source = BTreeMap::new();
        for row in rows {
            let (source, n) = row.context("reading per-source counts")?;
            per_source.insert(source, usize::try_from(n).unwrap_or(0));
        }

        Ok(CacheStats {
            total_count: usize::try_from(total).unwrap_or(0),
            per_source_count: per_source,
        })
    }

    /// Look up a single entry without purging.
    pub fn get(&self, id: &str) -> Result<Option<CacheEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, link, source, cached_at FROM articles WHERE id = ?1")?;
        let mut rows = stmt.query(params![id])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let ms: i64 = row.get(4)?;
        let cached_at = DateTime::<Utc>::from_timestamp_millis(ms)
            .with_context(|| format!("cache entry {id} has invalid cached_at {ms}"))?;
        let entry = CacheEntry {
            id: row.get(0)?,
            title: row.get(1)?,
            link: row.get(2)?,
            source: row.get(3)?,
            cached_at,
        };
        debug!(target: "cache", id, "cache lookup hit");
        Ok(Some(entry))
    }
}

/// Retention span for a positive hour count, `None` when it does not fit a `Duration`.
pub fn retention_window(hours: i64) -> Option<Duration> {
    if hours <= 0 {
        return None;
    }
    Duration::try_hours(hours)
}

fn insert_entry(stmt: &mut Statement<'_>, a: &Article, ts: i64) -> Result<()> {
    if a.id.trim().is_empty() {
        bail!("article has an empty id");
    }
    let title: String = a.title.chars().take(MAX_TITLE_CHARS).collect();
    stmt.execute(params![a.id, title, a.link, a.source.as_str(), ts])?;
    Ok(())
}
