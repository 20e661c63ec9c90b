//! In-memory storage backend
//!
//! Map-backed tables behind one `RwLock`. Ids start at 1 per table and are
//! never reused, matching the SQLite backend's AUTOINCREMENT columns. Every
//! instance is independent; nothing is shared across instances.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::Storage;
use crate::models::*;
use crate::{Error, Result};

/// One table: id counter plus rows in id order
#[derive(Debug)]
struct Table<T> {
    next_id: i64,
    rows: BTreeMap<i64, T>,
}

impl<T: Clone> Table<T> {
    fn new() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }

    fn insert_with(&mut self, build: impl FnOnce(i64) -> T) -> T {
        let id = self.next_id;
        self.next_id += 1;
        let row = build(id);
        self.rows.insert(id, row.clone());
        row
    }

    fn get(&self, id: i64) -> Option<T> {
        self.rows.get(&id).cloned()
    }

    fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.rows.values().filter(|row| pred(row)).cloned().collect()
    }

    fn modify(&mut self, kind: &str, id: i64, change: impl FnOnce(&mut T)) -> Result<T> {
        let row = self
            .rows
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(kind, id))?;
        change(row);
        Ok(row.clone())
    }

    fn remove(&mut self, id: i64) -> bool {
        self.rows.remove(&id).is_some()
    }
}

#[derive(Debug)]
struct Tables {
    users: Table<User>,
    goals: Table<Goal>,
    tasks: Table<Task>,
    time_entries: Table<TimeEntry>,
    habits: Table<Habit>,
    friends: Table<Friend>,
    voice_journals: Table<VoiceJournal>,
}

/// Ephemeral storage for tests and single-process deployments
#[derive(Debug)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                users: Table::new(),
                goals: Table::new(),
                tasks: Table::new(),
                time_entries: Table::new(),
                habits: Table::new(),
                friends: Table::new(),
                voice_journals: Table::new(),
            }),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn newest_first(journals: &mut [VoiceJournal]) {
    journals.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl Storage for MemoryStorage {
    // --- Users ---

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(id))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .filter(|u| u.username == username)
            .into_iter()
            .next())
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.users.rows.values().any(|u| u.username == user.username) {
            return Err(Error::Conflict(format!(
                "Username already exists: {}",
                user.username
            )));
        }
        Ok(tables.users.insert_with(|id| User::from_new(id, user)))
    }

    // --- Goals ---

    async fn list_goals(&self, user_id: i64) -> Result<Vec<Goal>> {
        Ok(self.tables.read().await.goals.filter(|g| g.user_id == user_id))
    }

    async fn get_goal(&self, id: i64) -> Result<Option<Goal>> {
        Ok(self.tables.read().await.goals.get(id))
    }

    async fn create_goal(&self, goal: NewGoal) -> Result<Goal> {
        let mut tables = self.tables.write().await;
        Ok(tables.goals.insert_with(|id| Goal::from_new(id, goal)))
    }

    async fn update_goal(&self, id: i64, update: GoalUpdate) -> Result<Goal> {
        let mut tables = self.tables.write().await;
        tables.goals.modify("Goal", id, |g| g.apply(update))
    }

    async fn delete_goal(&self, id: i64) -> Result<bool> {
        Ok(self.tables.write().await.goals.remove(id))
    }

    // --- Tasks ---

    async fn list_tasks(&self, user_id: i64, completed: Option<bool>) -> Result<Vec<Task>> {
        Ok(self.tables.read().await.tasks.filter(|t| {
            t.user_id == user_id && completed.map_or(true, |c| t.is_completed == c)
        }))
    }

    async fn get_task(&self, id: i64) -> Result<Option<Task>> {
        Ok(self.tables.read().await.tasks.get(id))
    }

    async fn create_task(&self, task: NewTask) -> Result<Task> {
        let mut tables = self.tables.write().await;
        Ok(tables.tasks.insert_with(|id| Task::from_new(id, task)))
    }

    async fn update_task(&self, id: i64, update: TaskUpdate) -> Result<Task> {
        let mut tables = self.tables.write().await;
        tables.tasks.modify("Task", id, |t| t.apply(update))
    }

    async fn delete_task(&self, id: i64) -> Result<bool> {
        Ok(self.tables.write().await.tasks.remove(id))
    }

    // --- Time entries ---

    async fn list_time_entries(
        &self,
        user_id: i64,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<TimeEntry>> {
        Ok(self.tables.read().await.time_entries.filter(|e| {
            e.user_id == user_id
                && start.map_or(true, |s| e.date >= s)
                && end.map_or(true, |s| e.date <= s)
        }))
    }

    async fn get_time_entry(&self, id: i64) -> Result<Option<TimeEntry>> {
        Ok(self.tables.read().await.time_entries.get(id))
    }

    async fn create_time_entry(&self, entry: NewTimeEntry) -> Result<TimeEntry> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .time_entries
            .insert_with(|id| TimeEntry::from_new(id, entry)))
    }

    async fn update_time_entry(&self, id: i64, update: TimeEntryUpdate) -> Result<TimeEntry> {
        let mut tables = self.tables.write().await;
        tables
            .time_entries
            .modify("Time entry", id, |e| e.apply(update))
    }

    async fn delete_time_entry(&self, id: i64) -> Result<bool> {
        Ok(self.tables.write().await.time_entries.remove(id))
    }

    // --- Habits ---

    async fn list_habits(&self, user_id: i64) -> Result<Vec<Habit>> {
        Ok(self.tables.read().await.habits.filter(|h| h.user_id == user_id))
    }

    async fn get_habit(&self, id: i64) -> Result<Option<Habit>> {
        Ok(self.tables.read().await.habits.get(id))
    }

    async fn create_habit(&self, habit: NewHabit) -> Result<Habit> {
        let mut tables = self.tables.write().await;
        Ok(tables.habits.insert_with(|id| Habit::from_new(id, habit)))
    }

    async fn update_habit(&self, id: i64, update: HabitUpdate) -> Result<Habit> {
        let mut tables = self.tables.write().await;
        tables.habits.modify("Habit", id, |h| h.apply(update))
    }

    async fn delete_habit(&self, id: i64) -> Result<bool> {
        Ok(self.tables.write().await.habits.remove(id))
    }

    // --- Friends ---

    async fn list_friends(&self, user_id: i64) -> Result<Vec<Friend>> {
        Ok(self.tables.read().await.friends.filter(|f| f.involves(user_id)))
    }

    async fn get_friend(&self, id: i64) -> Result<Option<Friend>> {
        Ok(self.tables.read().await.friends.get(id))
    }

    async fn create_friend(&self, friend: NewFriend) -> Result<Friend> {
        let mut tables = self.tables.write().await;
        Ok(tables.friends.insert_with(|id| Friend::from_new(id, friend)))
    }

    async fn update_friend(&self, id: i64, update: FriendUpdate) -> Result<Friend> {
        let mut tables = self.tables.write().await;
        tables.friends.modify("Friend", id, |f| f.apply(update))
    }

    async fn delete_friend(&self, id: i64) -> Result<bool> {
        Ok(self.tables.write().await.friends.remove(id))
    }

    // --- Voice journals ---

    async fn list_voice_journals(&self, user_id: i64) -> Result<Vec<VoiceJournal>> {
        let mut journals = self
            .tables
            .read()
            .await
            .voice_journals
            .filter(|j| j.user_id == user_id);
        newest_first(&mut journals);
        Ok(journals)
    }

    async fn get_voice_journal(&self, id: i64) -> Result<Option<VoiceJournal>> {
        Ok(self.tables.read().await.voice_journals.get(id))
    }

    async fn create_voice_journal(&self, journal: NewVoiceJournal) -> Result<VoiceJournal> {
        journal.validate()?;
        let mut tables = self.tables.write().await;
        Ok(tables
            .voice_journals
            .insert_with(|id| VoiceJournal::from_new(id, journal)))
    }

    async fn update_voice_journal(
        &self,
        id: i64,
        update: VoiceJournalUpdate,
    ) -> Result<VoiceJournal> {
        update.validate()?;
        let mut tables = self.tables.write().await;
        tables
            .voice_journals
            .modify("Voice journal", id, |j| j.apply(update))
    }

    async fn update_voice_journal_transcription(
        &self,
        id: i64,
        transcription: String,
    ) -> Result<VoiceJournal> {
        let mut tables = self.tables.write().await;
        tables
            .voice_journals
            .modify("Voice journal", id, |j| j.transcription = Some(transcription))
    }

    async fn update_voice_journal_sentiment(
        &self,
        id: i64,
        sentiment: Sentiment,
    ) -> Result<VoiceJournal> {
        sentiment.validate()?;
        let mut tables = self.tables.write().await;
        tables
            .voice_journals
            .modify("Voice journal", id, |j| j.sentiment = Some(sentiment))
    }

    async fn update_voice_journal_tags(&self, id: i64, tags: Vec<String>) -> Result<VoiceJournal> {
        let mut tables = self.tables.write().await;
        tables
            .voice_journals
            .modify("Voice journal", id, |j| j.tags = Some(tags))
    }

    async fn delete_voice_journal(&self, id: i64) -> Result<bool> {
        Ok(self.tables.write().await.voice_journals.remove(id))
    }
}
