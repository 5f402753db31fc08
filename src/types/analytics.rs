use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::activity::ActivityType;

/// Headline rollups over the demo catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DashboardMetrics {
    pub total_demos: usize,
    pub total_views: i64,
    pub average_views: i64,
    pub featured_count: usize,
    pub high_performers: usize,
    pub recent_demos: usize,
    pub weekly_demos: usize,
    pub growth_rate: i64,
    pub weekly_growth: i64,
    pub engagement_score: i64,
}

/// Popularity of one tag across the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagStat {
    pub tag: String,
    pub count: usize,
    pub total_views: i64,
    pub avg_views: i64,
}

/// The most viewed demo of an owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopDemo {
    pub id: String,
    pub title: String,
    pub page_views: i64,
}

/// One row of the owner leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnerStat {
    pub owner: String,
    pub total_views: i64,
    pub demos: usize,
    pub avg_views: i64,
    pub featured: usize,
    pub top_demo: TopDemo,
}

/// Fixed page-view buckets. Every demo falls into exactly one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PerformanceTier {
    #[serde(rename = "1000+")]
    Viral,
    #[serde(rename = "500-999")]
    Popular,
    #[serde(rename = "100-499")]
    Growing,
    #[serde(rename = "50-99")]
    Emerging,
    #[serde(rename = "0-49")]
    New,
}

impl PerformanceTier {
    /// Tiers in display order, highest first.
    pub const ALL: [PerformanceTier; 5] = [
        PerformanceTier::Viral,
        PerformanceTier::Popular,
        PerformanceTier::Growing,
        PerformanceTier::Emerging,
        PerformanceTier::New,
    ];

    pub fn for_views(page_views: i64) -> Self {
        match page_views {
            v if v >= 1000 => PerformanceTier::Viral,
            v if v >= 500 => PerformanceTier::Popular,
            v if v >= 100 => PerformanceTier::Growing,
            v if v >= 50 => PerformanceTier::Emerging,
            _ => PerformanceTier::New,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PerformanceTier::Viral => "1000+",
            PerformanceTier::Popular => "500-999",
            PerformanceTier::Growing => "100-499",
            PerformanceTier::Emerging => "50-99",
            PerformanceTier::New => "0-49",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierBucket {
    pub tier: PerformanceTier,
    pub count: usize,
}

/// One point of the 30-day creation series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub demos: usize,
    pub views: i64,
}

/// Rollup of the activity log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ActivitySummary {
    pub total_events: usize,
    pub unique_sessions: usize,
    pub by_type: BTreeMap<ActivityType, usize>,
    /// Demo ids ordered by `View` events, most viewed first.
    pub most_viewed: Vec<(String, usize)>,
}

/// Rollup of user sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SessionSummary {
    pub total_sessions: usize,
    pub completed_sessions: usize,
    /// Sessions whose end was never recorded.
    pub open_sessions: usize,
    pub average_duration_secs: i64,
}

/// Engagement figures for the signed-in user.
///
/// `Unavailable` is reported when there is nothing to compute from; figures
/// are never invented.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UserEngagement {
    Unavailable,
    Available {
        current_streak_days: u32,
        views_this_week: usize,
        total_activities: usize,
        favorite_tags: Vec<String>,
    },
}

/// Everything the analytics dashboard renders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardSnapshot {
    pub metrics: DashboardMetrics,
    pub tags: Vec<TagStat>,
    pub owners: Vec<OwnerStat>,
    pub tiers: Vec<TierBucket>,
    pub daily: Vec<DailyActivity>,
    pub activity: ActivitySummary,
    pub sessions: SessionSummary,
    pub engagement: UserEngagement,
}
