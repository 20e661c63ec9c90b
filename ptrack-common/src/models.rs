//! Domain records
//!
//! Each entity comes in three shapes: the stored record (with its assigned
//! id), a `New*` insert payload, and a `*Update` patch where every `Some`
//! field overwrites the stored value and every `None` field leaves it alone.
//! Wire format is camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub display_name: String,
    pub email: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl User {
    pub fn from_new(id: i64, new: NewUser) -> Self {
        Self {
            id,
            username: new.username,
            display_name: new.display_name,
            email: new.email,
            avatar: new.avatar,
        }
    }
}

// ============================================================================
// Goals
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub target_hours: i64,
    pub actual_hours: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_completed: bool,
    pub category: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGoal {
    pub user_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub target_hours: i64,
    #[serde(default)]
    pub actual_hours: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub is_completed: bool,
    pub category: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub target_hours: Option<i64>,
    pub actual_hours: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_completed: Option<bool>,
    pub category: Option<String>,
}

impl Goal {
    pub fn from_new(id: i64, new: NewGoal) -> Self {
        Self {
            id,
            user_id: new.user_id,
            title: new.title,
            description: new.description,
            target_hours: new.target_hours,
            actual_hours: new.actual_hours,
            start_date: new.start_date,
            end_date: new.end_date,
            is_completed: new.is_completed,
            category: new.category,
        }
    }

    pub fn apply(&mut self, update: GoalUpdate) {
        if let Some(v) = update.title {
            self.title = v;
        }
        if let Some(v) = update.description {
            self.description = Some(v);
        }
        if let Some(v) = update.target_hours {
            self.target_hours = v;
        }
        if let Some(v) = update.actual_hours {
            self.actual_hours = v;
        }
        if let Some(v) = update.start_date {
            self.start_date = v;
        }
        if let Some(v) = update.end_date {
            self.end_date = v;
        }
        if let Some(v) = update.is_completed {
            self.is_completed = v;
        }
        if let Some(v) = update.category {
            self.category = v;
        }
    }

    /// Share of target hours already logged, capped at 100
    pub fn progress_percent(&self) -> f64 {
        if self.target_hours <= 0 {
            return if self.is_completed { 100.0 } else { 0.0 };
        }
        (self.actual_hours as f64 / self.target_hours as f64 * 100.0).clamp(0.0, 100.0)
    }
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub category: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub user_id: i64,
    pub title: String,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_completed: bool,
    pub category: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_completed: Option<bool>,
    pub category: Option<String>,
}

impl Task {
    pub fn from_new(id: i64, new: NewTask) -> Self {
        Self {
            id,
            user_id: new.user_id,
            title: new.title,
            start_time: new.start_time,
            end_time: new.end_time,
            is_completed: new.is_completed,
            category: new.category,
        }
    }

    pub fn apply(&mut self, update: TaskUpdate) {
        if let Some(v) = update.title {
            self.title = v;
        }
        if let Some(v) = update.start_time {
            self.start_time = Some(v);
        }
        if let Some(v) = update.end_time {
            self.end_time = Some(v);
        }
        if let Some(v) = update.is_completed {
            self.is_completed = v;
        }
        if let Some(v) = update.category {
            self.category = v;
        }
    }
}

// ============================================================================
// Time entries
// ============================================================================

/// Logged block of time. `duration` is in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub id: i64,
    pub user_id: i64,
    pub task_id: Option<i64>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub category: String,
    pub duration: i64,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTimeEntry {
    pub user_id: i64,
    #[serde(default)]
    pub task_id: Option<i64>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub category: String,
    pub duration: i64,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntryUpdate {
    pub task_id: Option<i64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub duration: Option<i64>,
    pub date: Option<DateTime<Utc>>,
}

impl TimeEntry {
    pub fn from_new(id: i64, new: NewTimeEntry) -> Self {
        Self {
            id,
            user_id: new.user_id,
            task_id: new.task_id,
            start_time: new.start_time,
            end_time: new.end_time,
            category: new.category,
            duration: new.duration,
            date: new.date,
        }
    }

    pub fn apply(&mut self, update: TimeEntryUpdate) {
        if let Some(v) = update.task_id {
            self.task_id = Some(v);
        }
        if let Some(v) = update.start_time {
            self.start_time = v;
        }
        if let Some(v) = update.end_time {
            self.end_time = Some(v);
        }
        if let Some(v) = update.category {
            self.category = v;
        }
        if let Some(v) = update.duration {
            self.duration = v;
        }
        if let Some(v) = update.date {
            self.date = v;
        }
    }

    pub fn hours(&self) -> f64 {
        self.duration as f64 / 60.0
    }
}

// ============================================================================
// Habits
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub streak_count: i64,
    pub target_days: i64,
    pub category: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHabit {
    pub user_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub streak_count: i64,
    pub target_days: i64,
    pub category: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub streak_count: Option<i64>,
    pub target_days: Option<i64>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

fn default_true() -> bool {
    true
}

impl Habit {
    pub fn from_new(id: i64, new: NewHabit) -> Self {
        Self {
            id,
            user_id: new.user_id,
            title: new.title,
            description: new.description,
            streak_count: new.streak_count,
            target_days: new.target_days,
            category: new.category,
            is_active: new.is_active,
        }
    }

    pub fn apply(&mut self, update: HabitUpdate) {
        if let Some(v) = update.title {
            self.title = v;
        }
        if let Some(v) = update.description {
            self.description = Some(v);
        }
        if let Some(v) = update.streak_count {
            self.streak_count = v;
        }
        if let Some(v) = update.target_days {
            self.target_days = v;
        }
        if let Some(v) = update.category {
            self.category = v;
        }
        if let Some(v) = update.is_active {
            self.is_active = v;
        }
    }

    /// Current streak as a share of the target, capped at 100
    pub fn streak_percent(&self) -> f64 {
        if self.target_days <= 0 {
            return 0.0;
        }
        (self.streak_count as f64 / self.target_days as f64 * 100.0).clamp(0.0, 100.0)
    }
}

// ============================================================================
// Friends
// ============================================================================

/// Friend request state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl FriendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FriendStatus::Pending => "pending",
            FriendStatus::Accepted => "accepted",
            FriendStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for FriendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FriendStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(FriendStatus::Pending),
            "accepted" => Ok(FriendStatus::Accepted),
            "rejected" => Ok(FriendStatus::Rejected),
            other => Err(Error::InvalidInput(format!("Unknown friend status: {}", other))),
        }
    }
}

/// Directional relation `user_id → friend_id`; either side counts as a friend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    pub id: i64,
    pub user_id: i64,
    pub friend_id: i64,
    pub status: FriendStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFriend {
    pub user_id: i64,
    pub friend_id: i64,
    #[serde(default)]
    pub status: FriendStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendUpdate {
    pub status: Option<FriendStatus>,
}

impl Friend {
    pub fn from_new(id: i64, new: NewFriend) -> Self {
        Self {
            id,
            user_id: new.user_id,
            friend_id: new.friend_id,
            status: new.status,
        }
    }

    pub fn apply(&mut self, update: FriendUpdate) {
        if let Some(v) = update.status {
            self.status = v;
        }
    }

    pub fn involves(&self, user_id: i64) -> bool {
        self.user_id == user_id || self.friend_id == user_id
    }

    /// The other side of the relation, seen from `user_id`
    pub fn counterpart(&self, user_id: i64) -> i64 {
        if self.user_id == user_id {
            self.friend_id
        } else {
            self.user_id
        }
    }
}

// ============================================================================
// Voice journals
// ============================================================================

/// Overall polarity of a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Negative,
    Neutral,
    Mixed,
}

/// Structured sentiment attached to a journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sentiment {
    pub overall: Polarity,
    #[serde(default)]
    pub emotions: Vec<String>,
    pub confidence: f64,
}

impl Sentiment {
    pub fn validate(&self) -> Result<()> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::InvalidInput(format!(
                "Sentiment confidence must be within [0, 1], got {}",
                self.confidence
            )));
        }
        Ok(())
    }
}

/// Recorded audio entry with optional derived text, sentiment and tags.
/// `duration` is in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceJournal {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub audio_url: String,
    pub transcription: Option<String>,
    pub date: DateTime<Utc>,
    pub duration: i64,
    pub sentiment: Option<Sentiment>,
    pub tags: Option<Vec<String>>,
    pub category: String,
}

#[derive(Debug, Clone)]
pub struct NewVoiceJournal {
    pub user_id: i64,
    pub title: String,
    pub audio_url: String,
    pub date: DateTime<Utc>,
    pub duration: i64,
    pub category: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceJournalUpdate {
    pub title: Option<String>,
    pub category: Option<String>,
    pub duration: Option<i64>,
    pub transcription: Option<String>,
    pub sentiment: Option<Sentiment>,
    pub tags: Option<Vec<String>>,
}

impl NewVoiceJournal {
    pub fn validate(&self) -> Result<()> {
        if self.duration < 0 {
            return Err(Error::InvalidInput("Duration must not be negative".to_string()));
        }
        if self.audio_url.is_empty() {
            return Err(Error::InvalidInput("Audio URL is required".to_string()));
        }
        Ok(())
    }
}

impl VoiceJournalUpdate {
    pub fn validate(&self) -> Result<()> {
        if matches!(self.duration, Some(d) if d < 0) {
            return Err(Error::InvalidInput("Duration must not be negative".to_string()));
        }
        if let Some(sentiment) = &self.sentiment {
            sentiment.validate()?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.category.is_none()
            && self.duration.is_none()
            && self.transcription.is_none()
            && self.sentiment.is_none()
            && self.tags.is_none()
    }
}

impl VoiceJournal {
    pub fn from_new(id: i64, new: NewVoiceJournal) -> Self {
        Self {
            id,
            user_id: new.user_id,
            title: new.title,
            audio_url: new.audio_url,
            transcription: None,
            date: new.date,
            duration: new.duration,
            sentiment: None,
            tags: None,
            category: new.category,
        }
    }

    pub fn apply(&mut self, update: VoiceJournalUpdate) {
        if let Some(v) = update.title {
            self.title = v;
        }
        if let Some(v) = update.category {
            self.category = v;
        }
        if let Some(v) = update.duration {
            self.duration = v;
        }
        if let Some(v) = update.transcription {
            self.transcription = Some(v);
        }
        if let Some(v) = update.sentiment {
            self.sentiment = Some(v);
        }
        if let Some(v) = update.tags {
            self.tags = Some(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn goal(target: i64, actual: i64) -> Goal {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Goal::from_new(
            1,
            NewGoal {
                user_id: 1,
                title: "Read".into(),
                description: None,
                target_hours: target,
                actual_hours: actual,
                start_date: start,
                end_date: start,
                is_completed: false,
                category: "study".into(),
            },
        )
    }

    #[test]
    fn test_goal_progress_is_capped() {
        assert_eq!(goal(10, 5).progress_percent(), 50.0);
        assert_eq!(goal(10, 25).progress_percent(), 100.0);
        assert_eq!(goal(0, 5).progress_percent(), 0.0);
    }

    #[test]
    fn test_goal_apply_only_touches_given_fields() {
        let mut g = goal(10, 5);
        g.apply(GoalUpdate {
            actual_hours: Some(7),
            ..Default::default()
        });
        assert_eq!(g.actual_hours, 7);
        assert_eq!(g.title, "Read");
        assert_eq!(g.target_hours, 10);
    }

    #[test]
    fn test_friend_counterpart_either_direction() {
        let f = Friend::from_new(
            1,
            NewFriend { user_id: 3, friend_id: 8, status: FriendStatus::Accepted },
        );
        assert!(f.involves(3));
        assert!(f.involves(8));
        assert!(!f.involves(4));
        assert_eq!(f.counterpart(3), 8);
        assert_eq!(f.counterpart(8), 3);
    }

    #[test]
    fn test_friend_status_parse() {
        assert_eq!("accepted".parse::<FriendStatus>().unwrap(), FriendStatus::Accepted);
        assert!("blocked".parse::<FriendStatus>().is_err());
        assert_eq!(FriendStatus::default(), FriendStatus::Pending);
    }

    #[test]
    fn test_sentiment_confidence_bounds() {
        let mut s = Sentiment {
            overall: Polarity::Positive,
            emotions: vec!["joy".into()],
            confidence: 0.8,
        };
        assert!(s.validate().is_ok());
        s.confidence = 1.2;
        assert!(s.validate().is_err());
        s.confidence = f64::NAN;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_voice_journal_starts_unenriched() {
        let j = VoiceJournal::from_new(
            4,
            NewVoiceJournal {
                user_id: 1,
                title: "Morning".into(),
                audio_url: "/uploads/a.webm".into(),
                date: Utc::now(),
                duration: 12,
                category: "journal".into(),
            },
        );
        assert!(j.transcription.is_none());
        assert!(j.sentiment.is_none());
        assert!(j.tags.is_none());
    }

    #[test]
    fn test_voice_journal_wire_format_is_camel_case() {
        let j = VoiceJournal::from_new(
            4,
            NewVoiceJournal {
                user_id: 1,
                title: "Morning".into(),
                audio_url: "/uploads/a.webm".into(),
                date: Utc::now(),
                duration: 12,
                category: "journal".into(),
            },
        );
        let value = serde_json::to_value(&j).unwrap();
        assert_eq!(value["userId"], 1);
        assert_eq!(value["audioUrl"], "/uploads/a.webm");
        assert!(value["transcription"].is_null());
    }

    #[test]
    fn test_update_rejects_negative_duration() {
        let update = VoiceJournalUpdate {
            duration: Some(-3),
            ..Default::default()
        };
        assert!(update.validate().is_err());
        assert!(!update.is_empty());
        assert!(VoiceJournalUpdate::default().is_empty());
    }
}
