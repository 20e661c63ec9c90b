//! SQLite storage backend
//!
//! Runtime-checked `sqlx` queries over a shared pool. Partial updates are a
//! single `UPDATE ... SET col = COALESCE(?, col) ... RETURNING` statement, so
//! every field write is atomic and the returned row is the stored state.
//! Sentiment and tags are serialized to JSON before binding; the schema
//! rejects anything that is not valid JSON.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use super::{schema, Storage};
use crate::models::*;
use crate::time::{parse_db_timestamp, to_db_timestamp};
use crate::{Error, Result};

/// Durable storage backed by a SQLite connection pool
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Wrap an existing pool. The schema must already be initialized.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database file at `path` and initialize the schema
    pub async fn open(path: &Path) -> Result<Self> {
        info!("Opening database: {}", path.display());

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        schema::init_tables(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Private in-memory database on a single long-lived connection
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        schema::init_tables(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let value: String = row.try_get(column)?;
    parse_db_timestamp(&value)
}

fn optional_timestamp(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>> {
    let value: Option<String> = row.try_get(column)?;
    value.as_deref().map(parse_db_timestamp).transpose()
}

fn bind_ts(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.as_ref().map(to_db_timestamp)
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        display_name: row.try_get("display_name")?,
        email: row.try_get("email")?,
        avatar: row.try_get("avatar")?,
    })
}

fn goal_from_row(row: &SqliteRow) -> Result<Goal> {
    Ok(Goal {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        target_hours: row.try_get("target_hours")?,
        actual_hours: row.try_get("actual_hours")?,
        start_date: timestamp(row, "start_date")?,
        end_date: timestamp(row, "end_date")?,
        is_completed: row.try_get("is_completed")?,
        category: row.try_get("category")?,
    })
}

fn task_from_row(row: &SqliteRow) -> Result<Task> {
    Ok(Task {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        start_time: optional_timestamp(row, "start_time")?,
        end_time: optional_timestamp(row, "end_time")?,
        is_completed: row.try_get("is_completed")?,
        category: row.try_get("category")?,
    })
}

fn time_entry_from_row(row: &SqliteRow) -> Result<TimeEntry> {
    Ok(TimeEntry {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        task_id: row.try_get("task_id")?,
        start_time: timestamp(row, "start_time")?,
        end_time: optional_timestamp(row, "end_time")?,
        category: row.try_get("category")?,
        duration: row.try_get("duration")?,
        date: timestamp(row, "date")?,
    })
}

fn habit_from_row(row: &SqliteRow) -> Result<Habit> {
    Ok(Habit {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        streak_count: row.try_get("streak_count")?,
        target_days: row.try_get("target_days")?,
        category: row.try_get("category")?,
        is_active: row.try_get("is_active")?,
    })
}

fn friend_from_row(row: &SqliteRow) -> Result<Friend> {
    let status: String = row.try_get("status")?;
    Ok(Friend {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        friend_id: row.try_get("friend_id")?,
        status: status.parse()?,
    })
}

fn voice_journal_from_row(row: &SqliteRow) -> Result<VoiceJournal> {
    let sentiment: Option<String> = row.try_get("sentiment")?;
    let tags: Option<String> = row.try_get("tags")?;

    Ok(VoiceJournal {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        audio_url: row.try_get("audio_url")?,
        transcription: row.try_get("transcription")?,
        date: timestamp(row, "date")?,
        duration: row.try_get("duration")?,
        sentiment: sentiment
            .as_deref()
            .map(serde_json::from_str::<Sentiment>)
            .transpose()?,
        tags: tags
            .as_deref()
            .map(serde_json::from_str::<Vec<String>>)
            .transpose()?,
        category: row.try_get("category")?,
    })
}

fn collect<T>(rows: Vec<SqliteRow>, map: fn(&SqliteRow) -> Result<T>) -> Result<Vec<T>> {
    rows.iter().map(map).collect()
}

/// Map a `RETURNING` result: no row means the id did not exist
fn returned<T>(
    row: Option<SqliteRow>,
    kind: &str,
    id: i64,
    map: fn(&SqliteRow) -> Result<T>,
) -> Result<T> {
    match row {
        Some(row) => map(&row),
        None => Err(Error::not_found(kind, id)),
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    // --- Users ---

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, display_name, email, avatar)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&user.username)
        .bind(&user.display_name)
        .bind(&user.email)
        .bind(&user.avatar)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => user_from_row(&row),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                Error::Conflict(format!("Username already exists: {}", user.username)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    // --- Goals ---

    async fn list_goals(&self, user_id: i64) -> Result<Vec<Goal>> {
        let rows = sqlx::query("SELECT * FROM goals WHERE user_id = ? ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        collect(rows, goal_from_row)
    }

    async fn get_goal(&self, id: i64) -> Result<Option<Goal>> {
        let row = sqlx::query("SELECT * FROM goals WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(goal_from_row).transpose()
    }

    async fn create_goal(&self, goal: NewGoal) -> Result<Goal> {
        let row = sqlx::query(
            r#"
            INSERT INTO goals (user_id, title, description, target_hours, actual_hours,
                               start_date, end_date, is_completed, category)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(goal.user_id)
        .bind(&goal.title)
        .bind(&goal.description)
        .bind(goal.target_hours)
        .bind(goal.actual_hours)
        .bind(to_db_timestamp(&goal.start_date))
        .bind(to_db_timestamp(&goal.end_date))
        .bind(goal.is_completed)
        .bind(&goal.category)
        .fetch_one(&self.pool)
        .await?;
        goal_from_row(&row)
    }

    async fn update_goal(&self, id: i64, update: GoalUpdate) -> Result<Goal> {
        let row = sqlx::query(
            r#"
            UPDATE goals SET
                title = COALESCE(?, title),
                description = COALESCE(?, description),
                target_hours = COALESCE(?, target_hours),
                actual_hours = COALESCE(?, actual_hours),
                start_date = COALESCE(?, start_date),
                end_date = COALESCE(?, end_date),
                is_completed = COALESCE(?, is_completed),
                category = COALESCE(?, category)
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(update.title)
        .bind(update.description)
        .bind(update.target_hours)
        .bind(update.actual_hours)
        .bind(bind_ts(update.start_date))
        .bind(bind_ts(update.end_date))
        .bind(update.is_completed)
        .bind(update.category)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        returned(row, "Goal", id, goal_from_row)
    }

    async fn delete_goal(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM goals WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- Tasks ---

    async fn list_tasks(&self, user_id: i64, completed: Option<bool>) -> Result<Vec<Task>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM tasks
            WHERE user_id = ? AND is_completed = COALESCE(?, is_completed)
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .bind(completed)
        .fetch_all(&self.pool)
        .await?;
        collect(rows, task_from_row)
    }

    async fn get_task(&self, id: i64) -> Result<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn create_task(&self, task: NewTask) -> Result<Task> {
        let row = sqlx::query(
            r#"
            INSERT INTO tasks (user_id, title, start_time, end_time, is_completed, category)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(task.user_id)
        .bind(&task.title)
        .bind(bind_ts(task.start_time))
        .bind(bind_ts(task.end_time))
        .bind(task.is_completed)
        .bind(&task.category)
        .fetch_one(&self.pool)
        .await?;
        task_from_row(&row)
    }

    async fn update_task(&self, id: i64, update: TaskUpdate) -> Result<Task> {
        let row = sqlx::query(
            r#"
            UPDATE tasks SET
                title = COALESCE(?, title),
                start_time = COALESCE(?, start_time),
                end_time = COALESCE(?, end_time),
                is_completed = COALESCE(?, is_completed),
                category = COALESCE(?, category)
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(update.title)
        .bind(bind_ts(update.start_time))
        .bind(bind_ts(update.end_time))
        .bind(update.is_completed)
        .bind(update.category)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        returned(row, "Task", id, task_from_row)
    }

    async fn delete_task(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- Time entries ---

    async fn list_time_entries(
        &self,
        user_id: i64,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<TimeEntry>> {
        // Fixed-width timestamps compare lexically in chronological order
        let rows = sqlx::query(
            r#"
            SELECT * FROM time_entries
            WHERE user_id = ?
              AND date >= COALESCE(?, date)
              AND date <= COALESCE(?, date)
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .bind(bind_ts(start))
        .bind(bind_ts(end))
        .fetch_all(&self.pool)
        .await?;
        collect(rows, time_entry_from_row)
    }

    async fn get_time_entry(&self, id: i64) -> Result<Option<TimeEntry>> {
        let row = sqlx::query("SELECT * FROM time_entries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(time_entry_from_row).transpose()
    }

    async fn create_time_entry(&self, entry: NewTimeEntry) -> Result<TimeEntry> {
        let row = sqlx::query(
            r#"
            INSERT INTO time_entries (user_id, task_id, start_time, end_time, category, duration, date)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.task_id)
        .bind(to_db_timestamp(&entry.start_time))
        .bind(bind_ts(entry.end_time))
        .bind(&entry.category)
        .bind(entry.duration)
        .bind(to_db_timestamp(&entry.date))
        .fetch_one(&self.pool)
        .await?;
        time_entry_from_row(&row)
    }

    async fn update_time_entry(&self, id: i64, update: TimeEntryUpdate) -> Result<TimeEntry> {
        let row = sqlx::query(
            r#"
            UPDATE time_entries SET
                task_id = COALESCE(?, task_id),
                start_time = COALESCE(?, start_time),
                end_time = COALESCE(?, end_time),
                category = COALESCE(?, category),
                duration = COALESCE(?, duration),
                date = COALESCE(?, date)
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(update.task_id)
        .bind(bind_ts(update.start_time))
        .bind(bind_ts(update.end_time))
        .bind(update.category)
        .bind(update.duration)
        .bind(bind_ts(update.date))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        returned(row, "Time entry", id, time_entry_from_row)
    }

    async fn delete_time_entry(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM time_entries WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- Habits ---

    async fn list_habits(&self, user_id: i64) -> Result<Vec<Habit>> {
        let rows = sqlx::query("SELECT * FROM habits WHERE user_id = ? ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        collect(rows, habit_from_row)
    }

    async fn get_habit(&self, id: i64) -> Result<Option<Habit>> {
        let row = sqlx::query("SELECT * FROM habits WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(habit_from_row).transpose()
    }

    async fn create_habit(&self, habit: NewHabit) -> Result<Habit> {
        let row = sqlx::query(
            r#"
            INSERT INTO habits (user_id, title, description, streak_count, target_days, category, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(habit.user_id)
        .bind(&habit.title)
        .bind(&habit.description)
        .bind(habit.streak_count)
        .bind(habit.target_days)
        .bind(&habit.category)
        .bind(habit.is_active)
        .fetch_one(&self.pool)
        .await?;
        habit_from_row(&row)
    }

    async fn update_habit(&self, id: i64, update: HabitUpdate) -> Result<Habit> {
        let row = sqlx::query(
            r#"
            UPDATE habits SET
                title = COALESCE(?, title),
                description = COALESCE(?, description),
                streak_count = COALESCE(?, streak_count),
                target_days = COALESCE(?, target_days),
                category = COALESCE(?, category),
                is_active = COALESCE(?, is_active)
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(update.title)
        .bind(update.description)
        .bind(update.streak_count)
        .bind(update.target_days)
        .bind(update.category)
        .bind(update.is_active)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        returned(row, "Habit", id, habit_from_row)
    }

    async fn delete_habit(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM habits WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- Friends ---

    async fn list_friends(&self, user_id: i64) -> Result<Vec<Friend>> {
        let rows =
            sqlx::query("SELECT * FROM friends WHERE user_id = ? OR friend_id = ? ORDER BY id")
                .bind(user_id)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        collect(rows, friend_from_row)
    }

    async fn get_friend(&self, id: i64) -> Result<Option<Friend>> {
        let row = sqlx::query("SELECT * FROM friends WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(friend_from_row).transpose()
    }

    async fn create_friend(&self, friend: NewFriend) -> Result<Friend> {
        let row = sqlx::query(
            "INSERT INTO friends (user_id, friend_id, status) VALUES (?, ?, ?) RETURNING *",
        )
        .bind(friend.user_id)
        .bind(friend.friend_id)
        .bind(friend.status.as_str())
        .fetch_one(&self.pool)
        .await?;
        friend_from_row(&row)
    }

    async fn update_friend(&self, id: i64, update: FriendUpdate) -> Result<Friend> {
        let row = sqlx::query(
            "UPDATE friends SET status = COALESCE(?, status) WHERE id = ? RETURNING *",
        )
        .bind(update.status.map(|s| s.as_str()))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        returned(row, "Friend", id, friend_from_row)
    }

    async fn delete_friend(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM friends WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- Voice journals ---

    async fn list_voice_journals(&self, user_id: i64) -> Result<Vec<VoiceJournal>> {
        let rows = sqlx::query(
            "SELECT * FROM voice_journals WHERE user_id = ? ORDER BY date DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        collect(rows, voice_journal_from_row)
    }

    async fn get_voice_journal(&self, id: i64) -> Result<Option<VoiceJournal>> {
        let row = sqlx::query("SELECT * FROM voice_journals WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(voice_journal_from_row).transpose()
    }

    async fn create_voice_journal(&self, journal: NewVoiceJournal) -> Result<VoiceJournal> {
        journal.validate()?;
        let row = sqlx::query(
            r#"
            INSERT INTO voice_journals (user_id, title, audio_url, date, duration, category)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(journal.user_id)
        .bind(&journal.title)
        .bind(&journal.audio_url)
        .bind(to_db_timestamp(&journal.date))
        .bind(journal.duration)
        .bind(&journal.category)
        .fetch_one(&self.pool)
        .await?;
        voice_journal_from_row(&row)
    }

    async fn update_voice_journal(
        &self,
        id: i64,
        update: VoiceJournalUpdate,
    ) -> Result<VoiceJournal> {
        update.validate()?;
        let sentiment = update.sentiment.as_ref().map(serde_json::to_string).transpose()?;
        let tags = update.tags.as_ref().map(serde_json::to_string).transpose()?;

        let row = sqlx::query(
            r#"
            UPDATE voice_journals SET
                title = COALESCE(?, title),
                category = COALESCE(?, category),
                duration = COALESCE(?, duration),
                transcription = COALESCE(?, transcription),
                sentiment = COALESCE(?, sentiment),
                tags = COALESCE(?, tags)
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(update.title)
        .bind(update.category)
        .bind(update.duration)
        .bind(update.transcription)
        .bind(sentiment)
        .bind(tags)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        returned(row, "Voice journal", id, voice_journal_from_row)
    }

    async fn update_voice_journal_transcription(
        &self,
        id: i64,
        transcription: String,
    ) -> Result<VoiceJournal> {
        let row = sqlx::query("UPDATE voice_journals SET transcription = ? WHERE id = ? RETURNING *")
            .bind(transcription)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        returned(row, "Voice journal", id, voice_journal_from_row)
    }

    async fn update_voice_journal_sentiment(
        &self,
        id: i64,
        sentiment: Sentiment,
    ) -> Result<VoiceJournal> {
        sentiment.validate()?;
        let json = serde_json::to_string(&sentiment)?;
        let row = sqlx::query("UPDATE voice_journals SET sentiment = ? WHERE id = ? RETURNING *")
            .bind(json)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        returned(row, "Voice journal", id, voice_journal_from_row)
    }

    async fn update_voice_journal_tags(&self, id: i64, tags: Vec<String>) -> Result<VoiceJournal> {
        let json = serde_json::to_string(&tags)?;
        let row = sqlx::query("UPDATE voice_journals SET tags = ? WHERE id = ? RETURNING *")
            .bind(json)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        returned(row, "Voice journal", id, voice_journal_from_row)
    }

    async fn delete_voice_journal(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM voice_journals WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
