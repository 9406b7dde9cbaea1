//! Selection invariants over randomized candidate lists, plus the worked
//! quota example with real scoring.
//!
//! The sweep is seeded so failures are reproducible.

use chrono::{Duration, TimeZone, Utc};
use finnews_digest::config::{KeywordConfig, SourceCaps};
use finnews_digest::{Article, Quota, Scorer, Selector, Source};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashSet;

fn selector() -> Selector {
    Selector::new(
        Scorer::new(KeywordConfig::new(&["fed", "inflation"], &["earnings"], &["sponsored"])),
        SourceCaps::default(),
    )
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 6, 12, 0, 0).unwrap()
}

fn random_candidates(rng: &mut StdRng) -> Vec<Article> {
    const WORDS: [&str; 6] = ["fed", "inflation", "earnings", "sponsored", "oil", "stocks"];
    let n = rng.random_range(0..40);
    let mut out: Vec<Article> = Vec::with_capacity(n);
    for i in 0..n {
        // ~15% exact repeats of an earlier candidate
        if !out.is_empty() && rng.random_bool(0.15) {
            let j = rng.random_range(0..out.len());
            let dup = out[j].clone();
            out.push(dup);
            continue;
        }
        let source = Source::ALL[rng.random_range(0..3)];
        let w = WORDS[rng.random_range(0..WORDS.len())];
        let mut a = Article::new(
            format!("{w} headline {i}"),
            format!("https://x.test/{i}"),
            source,
            "markets",
            rng.random_range(1..=3),
        );
        if rng.random_bool(0.8) {
            a.published = Some(now() - Duration::minutes(rng.random_range(0..(72 * 60))));
        }
        out.push(a);
    }
    out
}

#[test]
fn quotas_and_uniqueness_hold_for_random_inputs() {
    let sel = selector();
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for round in 0..300 {
        let candidates = random_candidates(&mut rng);
        let distinct: HashSet<String> = candidates.iter().map(|a| a.id.clone()).collect();
        let total = rng.random_range(0..16);
        let quota = Quota {
            total,
            full_content: rng.random_range(0..=total),
            bloomberg_priority: rng.random_bool(0.5),
        };

        let out = sel.select_at(candidates, quota, now());

        assert!(out.len() <= quota.total, "round {round}: too many selected");
        let flagged = out.iter().filter(|s| s.fetch_full_content).count();
        assert!(flagged <= quota.full_content, "round {round}: too many flagged");

        let ids: HashSet<&str> = out.iter().map(|s| s.id()).collect();
        assert_eq!(ids.len(), out.len(), "round {round}: duplicate id selected");

        // Backfill means the quota is only unmet when distinct input runs out.
        assert_eq!(out.len(), quota.total.min(distinct.len()), "round {round}");

        assert!(out.iter().all(|s| (0.0..=1.0).contains(&s.score)));
    }
}

#[test]
fn bloomberg_priority_worked_example() {
    // No publish times, no keywords: score is decided by source priority alone,
    // so every Bloomberg item outranks every Yahoo item, which outrank Reuters.
    let sel = selector();
    let mut candidates = Vec::new();
    for i in 0..10 {
        candidates.push(Article::new(format!("b{i}"), format!("https://b.test/{i}"), Source::Bloomberg, "m", 3));
    }
    for i in 0..3 {
        candidates.push(Article::new(format!("y{i}"), format!("https://y.test/{i}"), Source::Yahoo, "m", 2));
    }
    for i in 0..2 {
        candidates.push(Article::new(format!("r{i}"), format!("https://r.test/{i}"), Source::Reuters, "m", 1));
    }

    let quota = Quota {
        total: 12,
        full_content: 3,
        bloomberg_priority: true,
    };
    let out = sel.select_at(candidates, quota, now());

    let titles: Vec<&str> = out.iter().map(|s| s.article.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["b0", "b1", "b2", "b3", "b4", "b5", "b6", "y0", "y1", "r0", "b7", "b8"]
    );
    let flagged: Vec<&str> = out
        .iter()
        .filter(|s| s.fetch_full_content)
        .map(|s| s.article.title.as_str())
        .collect();
    assert_eq!(flagged, vec!["b0", "b1", "b2"]);
}

#[test]
fn fresher_outranks_staler_with_equal_other_inputs() {
    let sel = selector();
    let stale = Article::new("Fed", "https://x.test/old", Source::Yahoo, "m", 2)
        .with_published(now() - Duration::hours(30));
    let fresh = Article::new("Fed", "https://x.test/new", Source::Yahoo, "m", 2)
        .with_published(now() - Duration::hours(1));

    let ranked = sel.rank_at(vec![stale, fresh], now());
    assert_eq!(ranked[0].article.link, "https://x.test/new");
    assert!(ranked[0].score >= ranked[1].score);
}

#[test]
fn empty_candidates_select_nothing() {
    let out = selector().select(
        vec![],
        Quota {
            total: 10,
            full_content: 3,
            bloomberg_priority: false,
        },
    );
    assert!(out.is_empty());
}
