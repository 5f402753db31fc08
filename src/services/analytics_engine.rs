//! Analytics Aggregator.
//!
//! Every rollup is a pure function of its inputs, `now` included, recomputed on
//! each call. Only [`AnalyticsEngine::snapshot`] touches the backend, and its
//! activity and session fetches fall back to empty data on failure.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::warn;

use crate::services::backend_gateway::BackendGateway;
use crate::types::activity::{ActivityLogEntry, ActivityType};
use crate::types::analytics::{
    ActivitySummary, DailyActivity, DashboardMetrics, DashboardSnapshot, OwnerStat, PerformanceTier,
    SessionSummary, TagStat, TierBucket, TopDemo, UserEngagement,
};
use crate::types::demo::Demo;
use crate::types::session::UserSession;

/// Length of the daily creation series, today included.
pub const DAILY_SERIES_DAYS: i64 = 30;
const MOST_VIEWED_LIMIT: usize = 10;
const FAVORITE_TAGS_LIMIT: usize = 3;

/// Drafts are left out of every catalog rollup.
pub fn published(demos: &[Demo]) -> Vec<Demo> {
    demos.iter().filter(|d| d.status.is_published()).cloned().collect()
}

/// `round(numerator / denominator)`, half away from zero; 0 when the denominator is 0.
fn round_ratio(numerator: f64, denominator: f64) -> i64 {
    if denominator == 0.0 {
        0
    } else {
        (numerator / denominator).round() as i64
    }
}

pub fn total_views(demos: &[Demo]) -> i64 {
    demos.iter().map(|d| d.page_views).sum()
}

pub fn average_views(demos: &[Demo]) -> i64 {
    round_ratio(total_views(demos) as f64, demos.len() as f64)
}

/// Demos viewed strictly more than the rounded average.
pub fn high_performers(demos: &[Demo]) -> usize {
    let average = average_views(demos);
    demos.iter().filter(|d| d.page_views > average).count()
}

pub fn created_within(demos: &[Demo], now: DateTime<Utc>, days: i64) -> usize {
    let cutoff = now - Duration::days(days);
    demos.iter().filter(|d| d.created_at > cutoff).count()
}

pub fn growth_rate(demos: &[Demo], now: DateTime<Utc>) -> i64 {
    round_ratio(100.0 * created_within(demos, now, 30) as f64, demos.len() as f64)
}

pub fn weekly_growth(demos: &[Demo], now: DateTime<Utc>) -> i64 {
    round_ratio(
        100.0 * created_within(demos, now, 7) as f64,
        created_within(demos, now, 30) as f64,
    )
}

pub fn engagement_score(demos: &[Demo], now: DateTime<Utc>) -> i64 {
    if demos.is_empty() {
        return 0;
    }
    let total = demos.len() as f64;
    let high = high_performers(demos) as f64;
    let featured = demos.iter().filter(|d| d.is_featured).count() as f64;
    let growth = (growth_rate(demos, now) as f64 / 10.0).min(3.0);
    (40.0 * (high / total) + 30.0 * (featured / total) + 10.0 * growth).round() as i64
}

pub fn dashboard_metrics(demos: &[Demo], now: DateTime<Utc>) -> DashboardMetrics {
    DashboardMetrics {
        total_demos: demos.len(),
        total_views: total_views(demos),
        average_views: average_views(demos),
        featured_count: demos.iter().filter(|d| d.is_featured).count(),
        high_performers: high_performers(demos),
        recent_demos: created_within(demos, now, 30),
        weekly_demos: created_within(demos, now, 7),
        growth_rate: growth_rate(demos, now),
        weekly_growth: weekly_growth(demos, now),
        engagement_score: engagement_score(demos, now),
    }
}

/// Per-tag rollup. A demo contributes to every tag it carries.
pub fn tag_stats(demos: &[Demo]) -> Vec<TagStat> {
    let mut groups: HashMap<&str, (usize, i64)> = HashMap::new();
    for demo in demos {
        for tag in &demo.tags {
            let group = groups.entry(tag.as_str()).or_default();
            group.0 += 1;
            group.1 += demo.page_views;
        }
    }

    let mut stats: Vec<TagStat> = groups
        .into_iter()
        .map(|(tag, (count, total_views))| TagStat {
            tag: tag.to_string(),
            count,
            total_views,
            avg_views: round_ratio(total_views as f64, count as f64),
        })
        .collect();
    stats.sort_by(|a, b| b.total_views.cmp(&a.total_views).then_with(|| a.tag.cmp(&b.tag)));
    stats
}

pub fn owner_stats(demos: &[Demo]) -> Vec<OwnerStat> {
    let mut owners: HashMap<&str, OwnerStat> = HashMap::new();
    for demo in demos {
        let stat = owners.entry(demo.owner.as_str()).or_insert_with(|| OwnerStat {
            owner: demo.owner.clone(),
            total_views: 0,
            demos: 0,
            avg_views: 0,
            featured: 0,
            top_demo: TopDemo {
                id: demo.id.clone(),
                title: demo.title.clone(),
                page_views: demo.page_views,
            },
        });
        stat.total_views += demo.page_views;
        stat.demos += 1;
        if demo.is_featured {
            stat.featured += 1;
        }
        if demo.page_views > stat.top_demo.page_views {
            stat.top_demo = TopDemo {
                id: demo.id.clone(),
                title: demo.title.clone(),
                page_views: demo.page_views,
            };
        }
    }

    let mut stats: Vec<OwnerStat> = owners
        .into_values()
        .map(|mut stat| {
            stat.avg_views = round_ratio(stat.total_views as f64, stat.demos as f64);
            stat
        })
        .collect();
    stats.sort_by(|a, b| b.total_views.cmp(&a.total_views).then_with(|| a.owner.cmp(&b.owner)));
    stats
}

/// Count per tier, in [`PerformanceTier::ALL`] order. Counts sum to `demos.len()`.
pub fn performance_tiers(demos: &[Demo]) -> Vec<TierBucket> {
    PerformanceTier::ALL
        .iter()
        .map(|&tier| TierBucket {
            tier,
            count: demos
                .iter()
                .filter(|d| PerformanceTier::for_views(d.page_views) == tier)
                .count(),
        })
        .collect()
}

/// Demos created on each of the last 30 UTC calendar days, oldest first.
pub fn daily_activity(demos: &[Demo], now: DateTime<Utc>) -> Vec<DailyActivity> {
    let mut by_day: HashMap<NaiveDate, (usize, i64)> = HashMap::new();
    for demo in demos {
        let day = by_day.entry(demo.created_at.date_naive()).or_default();
        day.0 += 1;
        day.1 += demo.page_views;
    }

    let today = now.date_naive();
    (0..DAILY_SERIES_DAYS)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            let (demos, views) = by_day.get(&date).copied().unwrap_or_default();
            DailyActivity { date, demos, views }
        })
        .collect()
}

pub fn top_demos(demos: &[Demo], limit: usize) -> Vec<&Demo> {
    let mut sorted: Vec<&Demo> = demos.iter().collect();
    sorted.sort_by(|a, b| b.page_views.cmp(&a.page_views).then_with(|| a.title.cmp(&b.title)));
    sorted.truncate(limit);
    sorted
}

pub fn recent_demos(demos: &[Demo], limit: usize) -> Vec<&Demo> {
    let mut sorted: Vec<&Demo> = demos.iter().collect();
    sorted.sort_by_key(|d| Reverse(d.created_at));
    sorted.truncate(limit);
    sorted
}

pub fn activity_summary(entries: &[ActivityLogEntry]) -> ActivitySummary {
    let mut by_type: BTreeMap<ActivityType, usize> = BTreeMap::new();
    let mut sessions: HashSet<&str> = HashSet::new();
    let mut views: HashMap<&str, usize> = HashMap::new();

    for entry in entries {
        *by_type.entry(entry.activity_type).or_default() += 1;
        sessions.insert(entry.session_id.as_str());
        if entry.activity_type == ActivityType::View {
            if let Some(id) = entry.resource_id.as_deref() {
                *views.entry(id).or_default() += 1;
            }
        }
    }

    let mut most_viewed: Vec<(String, usize)> =
        views.into_iter().map(|(id, n)| (id.to_string(), n)).collect();
    most_viewed.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    most_viewed.truncate(MOST_VIEWED_LIMIT);

    ActivitySummary {
        total_events: entries.len(),
        unique_sessions: sessions.len(),
        by_type,
        most_viewed,
    }
}

/// Sessions without an end time are counted as open; they are never closed here.
pub fn session_summary(sessions: &[UserSession]) -> SessionSummary {
    let durations: Vec<i64> = sessions.iter().filter_map(UserSession::duration_secs).collect();
    let completed = durations.len();
    SessionSummary {
        total_sessions: sessions.len(),
        completed_sessions: completed,
        open_sessions: sessions.len() - completed,
        average_duration_secs: round_ratio(durations.iter().sum::<i64>() as f64, completed as f64),
    }
}

/// Consecutive days with activity, counted back from today (or yesterday when
/// today has none yet).
fn current_streak(days: &HashSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut day = if days.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };
    let mut streak = 0;
    while days.contains(&day) {
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}

/// Engagement of one user from their own activity and favorites.
pub fn user_engagement(
    user_id: &str,
    activity: &[ActivityLogEntry],
    favorites: &[Demo],
    now: DateTime<Utc>,
) -> UserEngagement {
    let own: Vec<&ActivityLogEntry> = activity
        .iter()
        .filter(|e| e.user_id.as_deref() == Some(user_id))
        .collect();
    if own.is_empty() {
        return UserEngagement::Unavailable;
    }

    let days: HashSet<NaiveDate> = own.iter().map(|e| e.timestamp.date_naive()).collect();
    let week_ago = now - Duration::days(7);
    let views_this_week = own
        .iter()
        .filter(|e| e.activity_type == ActivityType::View && e.timestamp > week_ago)
        .count();

    let mut tag_counts: HashMap<&str, usize> = HashMap::new();
    for tag in favorites.iter().flat_map(|d| d.tags.iter()) {
        *tag_counts.entry(tag.as_str()).or_default() += 1;
    }
    let mut tags: Vec<(&str, usize)> = tag_counts.into_iter().collect();
    tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    UserEngagement::Available {
        current_streak_days: current_streak(&days, now.date_naive()),
        views_this_week,
        total_activities: own.len(),
        favorite_tags: tags
            .into_iter()
            .take(FAVORITE_TAGS_LIMIT)
            .map(|(tag, _)| tag.to_string())
            .collect(),
    }
}

/// Builds dashboard snapshots from the catalog plus best-effort backend data.
pub struct AnalyticsEngine {
    gateway: Arc<dyn BackendGateway>,
}

impl AnalyticsEngine {
    pub fn new(gateway: Arc<dyn BackendGateway>) -> Self {
        Self { gateway }
    }

    fn fetch_activity(&self, since: DateTime<Utc>) -> Vec<ActivityLogEntry> {
        self.gateway.list_activity(Some(since)).unwrap_or_else(|e| {
            warn!(error = %e, "activity logs unavailable, using empty data");
            Vec::new()
        })
    }

    fn fetch_sessions(&self) -> Vec<UserSession> {
        self.gateway.list_sessions(None).unwrap_or_else(|e| {
            warn!(error = %e, "session data unavailable, using empty data");
            Vec::new()
        })
    }

    /// Never fails: missing activity or session data yields empty rollups.
    /// Catalog rollups cover published demos only.
    pub fn snapshot(&self, demos: &[Demo], favorites: &[Demo], now: DateTime<Utc>) -> DashboardSnapshot {
        let activity = self.fetch_activity(now - Duration::days(DAILY_SERIES_DAYS));
        let sessions = self.fetch_sessions();
        let engagement = match self.gateway.current_user() {
            Some(user) => user_engagement(&user.id, &activity, favorites, now),
            None => UserEngagement::Unavailable,
        };

        let demos = published(demos);
        DashboardSnapshot {
            metrics: dashboard_metrics(&demos, now),
            tags: tag_stats(&demos),
            owners: owner_stats(&demos),
            tiers: performance_tiers(&demos),
            daily: daily_activity(&demos, now),
            activity: activity_summary(&activity),
            sessions: session_summary(&sessions),
            engagement,
        }
    }
}
