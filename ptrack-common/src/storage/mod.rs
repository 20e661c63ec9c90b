//! Storage contract
//!
//! The `Storage` trait is the single persistence seam for the service. Two
//! implementations exist and must be indistinguishable to callers:
//!
//! - [`MemoryStorage`]: map-backed, process lifetime only
//! - [`SqliteStorage`]: durable, backed by a SQLite pool
//!
//! All implementations must ensure:
//! - `create_*` returns the stored record with a freshly assigned id
//! - `get_*` returns `Ok(None)` for a missing id, never an error
//! - `update_*` writes only the provided fields and returns the stored
//!   post-update record; a missing id is `Error::NotFound`
//! - `delete_*` returns whether a record was actually removed
//! - non-journal lists come back in id order; voice journals newest first
//!
//! Time-aggregating queries are provided methods built on
//! [`Storage::list_time_entries`], so every backend shares one aggregation.

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::activity::{self, FriendActivity, WeeklyActivity};
use crate::models::*;
use crate::time::week_window;
use crate::Result;

#[async_trait]
pub trait Storage: Send + Sync {
    // --- Users ---

    async fn get_user(&self, id: i64) -> Result<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    /// Fails with `Error::Conflict` when the username is taken
    async fn create_user(&self, user: NewUser) -> Result<User>;

    // --- Goals ---

    async fn list_goals(&self, user_id: i64) -> Result<Vec<Goal>>;
    async fn get_goal(&self, id: i64) -> Result<Option<Goal>>;
    async fn create_goal(&self, goal: NewGoal) -> Result<Goal>;
    async fn update_goal(&self, id: i64, update: GoalUpdate) -> Result<Goal>;
    async fn delete_goal(&self, id: i64) -> Result<bool>;

    // --- Tasks ---

    /// `completed = None` returns every task of the user
    async fn list_tasks(&self, user_id: i64, completed: Option<bool>) -> Result<Vec<Task>>;
    async fn get_task(&self, id: i64) -> Result<Option<Task>>;
    async fn create_task(&self, task: NewTask) -> Result<Task>;
    async fn update_task(&self, id: i64, update: TaskUpdate) -> Result<Task>;
    async fn delete_task(&self, id: i64) -> Result<bool>;

    // --- Time entries ---

    /// Entries whose `date` lies within the inclusive bounds
    async fn list_time_entries(
        &self,
        user_id: i64,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<TimeEntry>>;
    async fn get_time_entry(&self, id: i64) -> Result<Option<TimeEntry>>;
    async fn create_time_entry(&self, entry: NewTimeEntry) -> Result<TimeEntry>;
    async fn update_time_entry(&self, id: i64, update: TimeEntryUpdate) -> Result<TimeEntry>;
    async fn delete_time_entry(&self, id: i64) -> Result<bool>;

    // --- Habits ---

    async fn list_habits(&self, user_id: i64) -> Result<Vec<Habit>>;
    async fn get_habit(&self, id: i64) -> Result<Option<Habit>>;
    async fn create_habit(&self, habit: NewHabit) -> Result<Habit>;
    async fn update_habit(&self, id: i64, update: HabitUpdate) -> Result<Habit>;
    async fn delete_habit(&self, id: i64) -> Result<bool>;

    // --- Friends ---

    /// Relations where the user is on either side
    async fn list_friends(&self, user_id: i64) -> Result<Vec<Friend>>;
    async fn get_friend(&self, id: i64) -> Result<Option<Friend>>;
    async fn create_friend(&self, friend: NewFriend) -> Result<Friend>;
    async fn update_friend(&self, id: i64, update: FriendUpdate) -> Result<Friend>;
    async fn delete_friend(&self, id: i64) -> Result<bool>;

    // --- Voice journals ---

    async fn list_voice_journals(&self, user_id: i64) -> Result<Vec<VoiceJournal>>;
    async fn get_voice_journal(&self, id: i64) -> Result<Option<VoiceJournal>>;
    async fn create_voice_journal(&self, journal: NewVoiceJournal) -> Result<VoiceJournal>;
    async fn update_voice_journal(
        &self,
        id: i64,
        update: VoiceJournalUpdate,
    ) -> Result<VoiceJournal>;
    async fn update_voice_journal_transcription(
        &self,
        id: i64,
        transcription: String,
    ) -> Result<VoiceJournal>;
    async fn update_voice_journal_sentiment(
        &self,
        id: i64,
        sentiment: Sentiment,
    ) -> Result<VoiceJournal>;
    async fn update_voice_journal_tags(&self, id: i64, tags: Vec<String>) -> Result<VoiceJournal>;
    async fn delete_voice_journal(&self, id: i64) -> Result<bool>;

    // --- Aggregates (shared implementation) ---

    /// Current-week activity bucketed by (date, category)
    async fn get_weekly_activity(&self, user_id: i64) -> Result<Vec<WeeklyActivity>> {
        self.weekly_activity_at(user_id, Utc::now()).await
    }

    /// Weekly activity for the calendar week containing `at`
    async fn weekly_activity_at(
        &self,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Vec<WeeklyActivity>> {
        let (start, end) = week_window(at);
        let entries = self.list_time_entries(user_id, Some(start), Some(end)).await?;
        Ok(activity::aggregate_weekly(&entries, start, end))
    }

    /// Current-week progress of every accepted friend
    async fn get_friend_activities(
        &self,
        user_id: i64,
        weekly_target_hours: f64,
    ) -> Result<Vec<FriendActivity>> {
        self.friend_activities_at(user_id, weekly_target_hours, Utc::now())
            .await
    }

    /// Friend activity for the calendar week containing `at`.
    ///
    /// Accepted relations count in either direction; friends without a
    /// resolvable user record are omitted.
    async fn friend_activities_at(
        &self,
        user_id: i64,
        weekly_target_hours: f64,
        at: DateTime<Utc>,
    ) -> Result<Vec<FriendActivity>> {
        let (start, end) = week_window(at);
        let mut friend_ids: Vec<i64> = self
            .list_friends(user_id)
            .await?
            .iter()
            .filter(|f| f.status == FriendStatus::Accepted)
            .map(|f| f.counterpart(user_id))
            .collect();
        friend_ids.sort_unstable();
        friend_ids.dedup();

        let mut result = Vec::with_capacity(friend_ids.len());
        for friend_id in friend_ids {
            let Some(friend) = self.get_user(friend_id).await? else {
                tracing::debug!(friend_id, "Skipping friend without user record");
                continue;
            };

            let entries: Vec<TimeEntry> = self
                .list_time_entries(friend_id, Some(start), Some(end))
                .await?
                .into_iter()
                .filter(|e| e.date < end)
                .collect();

            result.push(activity::summarize_friend(
                &friend,
                &entries,
                weekly_target_hours,
            ));
        }

        Ok(result)
    }
}
