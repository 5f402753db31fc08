//! Property-based tests for the analytics rollups.
//!
//! These check the catalog-wide invariants of the aggregator for arbitrary
//! demo lists: the average formula, the tier partition and the tag rollup bounds.

use chrono::{Duration, TimeZone, Utc};
use concept_tracker::services::analytics_engine;
use concept_tracker::types::demo::{Demo, DemoLinks, DemoStatus};
use proptest::prelude::*;

/// Strategy for one demo: 1-3 tags from a small vocabulary, views up to 5000,
/// created within the last 90 days.
fn arb_demo() -> impl Strategy<Value = Demo> {
    (
        "[a-z0-9]{8}",
        0i64..5000,
        proptest::collection::btree_set(prop_oneof![Just("ai"), Just("voice"), Just("rag"), Just("ocr")], 1..=3),
        0i64..90,
        any::<bool>(),
        prop_oneof![Just("Ana"), Just("Ben"), Just("Cruz")],
    )
        .prop_map(|(id, views, tags, age_days, featured, owner)| {
            let created = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap() - Duration::days(age_days);
            Demo {
                title: format!("Demo {}", id),
                id,
                description: String::new(),
                tags: tags.into_iter().map(str::to_string).collect(),
                owner: owner.to_string(),
                page_views: views,
                is_featured: featured,
                status: DemoStatus::Published,
                created_by: None,
                links: DemoLinks::default(),
                created_at: created,
                updated_at: created,
            }
        })
}

fn arb_demos() -> impl Strategy<Value = Vec<Demo>> {
    proptest::collection::vec(arb_demo(), 0..40)
}

// **Property: average views**
//
// *For any* non-empty list, averageViews SHALL equal round(sum / count), and
// highPerformers SHALL count exactly the demos strictly above it.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn average_is_rounded_mean(demos in arb_demos()) {
        let average = analytics_engine::average_views(&demos);
        if demos.is_empty() {
            prop_assert_eq!(average, 0);
        } else {
            let sum: i64 = demos.iter().map(|d| d.page_views).sum();
            let expected = (sum as f64 / demos.len() as f64).round() as i64;
            prop_assert_eq!(average, expected);
        }

        let above = demos.iter().filter(|d| d.page_views > average).count();
        prop_assert_eq!(analytics_engine::high_performers(&demos), above);
    }
}

// **Property: tier partition**
//
// *For any* list, every demo lands in exactly one performance tier, so the
// bucket counts sum to the catalog size.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn tiers_partition_the_catalog(demos in arb_demos()) {
        let buckets = analytics_engine::performance_tiers(&demos);
        prop_assert_eq!(buckets.len(), 5);
        prop_assert_eq!(buckets.iter().map(|b| b.count).sum::<usize>(), demos.len());
    }
}

// **Property: tag rollup bounds**
//
// *For any* list where every demo has at least one tag, each tag's count is
// at most the catalog size, the tag counts sum to the number of (demo, tag)
// pairs, and per-tag views never exceed the catalog's total views.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn tag_rollup_is_bounded(demos in arb_demos()) {
        let stats = analytics_engine::tag_stats(&demos);
        let total = analytics_engine::total_views(&demos);
        let pairs: usize = demos.iter().map(|d| d.tags.len()).sum();

        prop_assert_eq!(stats.iter().map(|s| s.count).sum::<usize>(), pairs);
        prop_assert!(pairs >= demos.len());
        for stat in &stats {
            prop_assert!(stat.count <= demos.len());
            prop_assert!(stat.total_views <= total);
        }
        prop_assert!(stats.windows(2).all(|w| w[0].total_views >= w[1].total_views));
    }
}

// **Property: owner rollup**
//
// *For any* list, owner totals add back up to the catalog, and each owner's
// top demo is one of theirs with the highest view count.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn owner_rollup_adds_up(demos in arb_demos()) {
        let stats = analytics_engine::owner_stats(&demos);

        prop_assert_eq!(stats.iter().map(|s| s.demos).sum::<usize>(), demos.len());
        prop_assert_eq!(stats.iter().map(|s| s.total_views).sum::<i64>(), analytics_engine::total_views(&demos));
        for stat in &stats {
            let best = demos
                .iter()
                .filter(|d| d.owner == stat.owner)
                .map(|d| d.page_views)
                .max()
                .unwrap_or_default();
            prop_assert_eq!(stat.top_demo.page_views, best);
        }
    }
}

// **Property: bounded scores**
//
// *For any* list, growth rates stay within 0..=100 and the engagement score
// within 0..=100.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn scores_stay_in_range(demos in arb_demos()) {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let metrics = analytics_engine::dashboard_metrics(&demos, now);

        prop_assert!((0..=100).contains(&metrics.growth_rate));
        prop_assert!((0..=100).contains(&metrics.weekly_growth));
        prop_assert!((0..=100).contains(&metrics.engagement_score));
        prop_assert!(metrics.weekly_demos <= metrics.recent_demos);
    }
}
