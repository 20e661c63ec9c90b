//! Time-aggregating queries shared by every storage backend
//!
//! Backends only supply raw time entries; bucketing and summarizing happen
//! here so that both backends produce identical results for identical data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{TimeEntry, User};

/// Default weekly hours that count as 100% progress for a friend
pub const DEFAULT_WEEKLY_TARGET_HOURS: f64 = 25.0;

/// Summary used when a friend logged nothing this week
pub const NO_RECENT_ACTIVITY: &str = "No recent activity";

/// One (date, category) bucket of the current week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyActivity {
    /// Calendar date (UTC) formatted `YYYY-MM-DD`
    pub date: String,
    pub category: String,
    pub hours: f64,
}

/// A friend's progress for the current week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendActivity {
    /// The friend's user id
    pub id: i64,
    pub name: String,
    /// Total hours this week, rounded
    pub hours: i64,
    /// Percentage of the weekly target, capped at 100
    pub progress: i64,
    pub recent_activity: String,
}

/// Bucket entries falling inside `[start, end)` by (date, category).
///
/// Durations are summed in minutes and converted to hours. Only non-empty
/// buckets are returned, sorted by date then category.
pub fn aggregate_weekly(
    entries: &[TimeEntry],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<WeeklyActivity> {
    let mut buckets: BTreeMap<(String, String), i64> = BTreeMap::new();

    for entry in entries.iter().filter(|e| e.date >= start && e.date < end) {
        let date = entry.date.format("%Y-%m-%d").to_string();
        *buckets.entry((date, entry.category.clone())).or_insert(0) += entry.duration;
    }

    buckets
        .into_iter()
        .map(|((date, category), minutes)| WeeklyActivity {
            date,
            category,
            hours: minutes as f64 / 60.0,
        })
        .collect()
}

/// Summarize one friend's week.
///
/// `entries` must already be restricted to the friend and the week.
pub fn summarize_friend(
    friend: &User,
    entries: &[TimeEntry],
    weekly_target_hours: f64,
) -> FriendActivity {
    let total_hours: f64 = entries.iter().map(TimeEntry::hours).sum();

    let progress = if weekly_target_hours > 0.0 {
        ((total_hours / weekly_target_hours) * 100.0).round().min(100.0) as i64
    } else {
        0
    };

    // Most recent by entry date; ties go to the later id
    let recent_activity = entries
        .iter()
        .max_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)))
        .map(|e| format!("{} ({:.1}h)", e.category, e.hours()))
        .unwrap_or_else(|| NO_RECENT_ACTIVITY.to_string());

    FriendActivity {
        id: friend.id,
        name: friend.display_name.clone(),
        hours: total_hours.round() as i64,
        progress,
        recent_activity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn entry(id: i64, date: DateTime<Utc>, category: &str, minutes: i64) -> TimeEntry {
        TimeEntry {
            id,
            user_id: 1,
            task_id: None,
            start_time: date,
            end_time: None,
            category: category.to_string(),
            duration: minutes,
            date,
        }
    }

    fn week() -> (DateTime<Utc>, DateTime<Utc>) {
        let start = Utc.with_ymd_and_hms(2024, 5, 12, 0, 0, 0).unwrap();
        (start, start + Duration::days(7))
    }

    fn friend() -> User {
        User {
            id: 7,
            username: "sam".into(),
            display_name: "Sam".into(),
            email: "sam@example.com".into(),
            avatar: None,
        }
    }

    #[test]
    fn test_same_day_same_category_merges() {
        let (start, end) = week();
        let day = start + Duration::days(2) + Duration::hours(9);
        let entries = vec![entry(1, day, "study", 90), entry(2, day, "study", 30)];

        let buckets = aggregate_weekly(&entries, start, end);
        assert_eq!(
            buckets,
            vec![WeeklyActivity {
                date: "2024-05-14".into(),
                category: "study".into(),
                hours: 2.0
            }]
        );
    }

    #[test]
    fn test_buckets_split_by_category_and_sorted() {
        let (start, end) = week();
        let mon = start + Duration::days(1);
        let tue = start + Duration::days(2);
        let entries = vec![
            entry(1, tue, "work", 60),
            entry(2, mon, "study", 30),
            entry(3, mon, "exercise", 45),
        ];

        let buckets = aggregate_weekly(&entries, start, end);
        let keys: Vec<_> = buckets
            .iter()
            .map(|b| (b.date.as_str(), b.category.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("2024-05-13", "exercise"),
                ("2024-05-13", "study"),
                ("2024-05-14", "work")
            ]
        );
        assert_eq!(buckets[0].hours, 0.75);
    }

    #[test]
    fn test_entries_outside_window_ignored() {
        let (start, end) = week();
        let entries = vec![
            entry(1, start - Duration::seconds(1), "study", 60),
            entry(2, end, "study", 60),
        ];
        assert!(aggregate_weekly(&entries, start, end).is_empty());
    }

    #[test]
    fn test_friend_summary_progress_and_recent() {
        let (start, _) = week();
        let entries = vec![
            entry(1, start + Duration::hours(5), "reading", 600),
            entry(2, start + Duration::days(1), "coding", 90),
        ];

        let summary = summarize_friend(&friend(), &entries, DEFAULT_WEEKLY_TARGET_HOURS);
        assert_eq!(summary.id, 7);
        assert_eq!(summary.name, "Sam");
        assert_eq!(summary.hours, 12); // 11.5 rounds up
        assert_eq!(summary.progress, 46);
        assert_eq!(summary.recent_activity, "coding (1.5h)");
    }

    #[test]
    fn test_friend_progress_capped() {
        let (start, _) = week();
        let entries = vec![entry(1, start, "work", 40 * 60)];
        let summary = summarize_friend(&friend(), &entries, DEFAULT_WEEKLY_TARGET_HOURS);
        assert_eq!(summary.progress, 100);
        assert_eq!(summary.hours, 40);
    }

    #[test]
    fn test_friend_without_entries() {
        let summary = summarize_friend(&friend(), &[], DEFAULT_WEEKLY_TARGET_HOURS);
        assert_eq!(summary.hours, 0);
        assert_eq!(summary.progress, 0);
        assert_eq!(summary.recent_activity, NO_RECENT_ACTIVITY);
    }
}
