// tests/cache_retention.rs
use chrono::{Duration, TimeZone, Utc};
use finnews_digest::{Article, DedupCache, Source};

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap()
}

fn batch() -> Vec<Article> {
    (0..6)
        .map(|i| {
            let src = Source::ALL[i % 3];
            Article::new(format!("Story {i}"), format!("https://x.test/{i}"), src, "markets", 1)
        })
        .collect()
}

#[test]
fn filter_is_stable_without_record() {
    let mut c = DedupCache::open_in_memory(24).unwrap();
    let first = c.filter_new_at(batch(), t0()).unwrap();
    let second = c.filter_new_at(batch(), t0()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 6);
}

#[test]
fn recorded_output_filters_to_empty() {
    let mut c = DedupCache::open_in_memory(24).unwrap();
    let fresh = c.filter_new_at(batch(), t0()).unwrap();
    c.record_at(fresh.iter(), t0()).unwrap();

    let again = c.filter_new_at(fresh, t0() + Duration::minutes(5)).unwrap();
    assert!(again.is_empty());
}

#[test]
fn entries_expire_after_retention_window() {
    let mut c = DedupCache::open_in_memory(6).unwrap();
    let arts = batch();
    c.record_at(arts.iter().take(3), t0()).unwrap();

    let inside = t0() + Duration::hours(6) - Duration::milliseconds(1);
    assert_eq!(c.filter_new_at(arts.clone(), inside).unwrap().len(), 3);
    assert_eq!(c.stats().unwrap().total_count, 3);

    let outside = t0() + Duration::hours(6) + Duration::milliseconds(1);
    assert_eq!(c.filter_new_at(arts, outside).unwrap().len(), 6);
    assert_eq!(c.stats().unwrap().total_count, 0);
}

#[test]
fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("news_cache.db");
    let arts = batch();

    {
        let mut c = DedupCache::open(&path, 24).unwrap();
        c.record(arts.iter().take(2)).unwrap();
    }

    let mut c = DedupCache::open(&path, 24).unwrap();
    let stats = c.stats().unwrap();
    assert_eq!(stats.total_count, 2);
    assert_eq!(stats.per_source_count.get("bloomberg"), Some(&1));
    assert_eq!(stats.per_source_count.get("yahoo"), Some(&1));

    let fresh = c.filter_new(arts).unwrap();
    let titles: Vec<_> = fresh.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Story 2", "Story 3", "Story 4", "Story 5"]);
}
