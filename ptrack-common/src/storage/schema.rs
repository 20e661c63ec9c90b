//! SQLite schema initialization
//!
//! Idempotent: every statement is `CREATE ... IF NOT EXISTS`, so calling
//! [`init_tables`] on an existing database is safe. Timestamps are TEXT in
//! the fixed-width format from [`crate::time::to_db_timestamp`]; sentiment is
//! a JSON object and tags a JSON array, both TEXT.

use sqlx::SqlitePool;
use tracing::info;

use crate::Result;

const TABLES: &[(&str, &str)] = &[
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            email TEXT NOT NULL,
            avatar TEXT
        )
        "#,
    ),
    (
        "goals",
        r#"
        CREATE TABLE IF NOT EXISTS goals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            target_hours INTEGER NOT NULL,
            actual_hours INTEGER NOT NULL DEFAULT 0,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            is_completed INTEGER NOT NULL DEFAULT 0,
            category TEXT NOT NULL
        )
        "#,
    ),
    (
        "tasks",
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT,
            is_completed INTEGER NOT NULL DEFAULT 0,
            category TEXT NOT NULL
        )
        "#,
    ),
    (
        "time_entries",
        r#"
        CREATE TABLE IF NOT EXISTS time_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            task_id INTEGER,
            start_time TEXT NOT NULL,
            end_time TEXT,
            category TEXT NOT NULL,
            duration INTEGER NOT NULL,
            date TEXT NOT NULL
        )
        "#,
    ),
    (
        "habits",
        r#"
        CREATE TABLE IF NOT EXISTS habits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            streak_count INTEGER NOT NULL DEFAULT 0,
            target_days INTEGER NOT NULL,
            category TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        )
        "#,
    ),
    (
        "friends",
        r#"
        CREATE TABLE IF NOT EXISTS friends (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            friend_id INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'accepted', 'rejected'))
        )
        "#,
    ),
    (
        "voice_journals",
        r#"
        CREATE TABLE IF NOT EXISTS voice_journals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            audio_url TEXT NOT NULL,
            transcription TEXT,
            date TEXT NOT NULL,
            duration INTEGER NOT NULL CHECK (duration >= 0),
            sentiment TEXT CHECK (sentiment IS NULL OR json_valid(sentiment)),
            tags TEXT CHECK (tags IS NULL OR json_valid(tags)),
            category TEXT NOT NULL DEFAULT 'general'
        )
        "#,
    ),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_goals_user ON goals(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_time_entries_user_date ON time_entries(user_id, date)",
    "CREATE INDEX IF NOT EXISTS idx_habits_user ON habits(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_friends_user ON friends(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_friends_friend ON friends(friend_id)",
    "CREATE INDEX IF NOT EXISTS idx_voice_journals_user ON voice_journals(user_id)",
];

/// Create all tables and indexes if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    for (_, ddl) in TABLES {
        sqlx::query(*ddl).execute(pool).await?;
    }
    for ddl in INDEXES {
        sqlx::query(*ddl).execute(pool).await?;
    }

    let names: Vec<&str> = TABLES.iter().map(|(name, _)| *name).collect();
    info!("Database tables initialized ({})", names.join(", "));

    Ok(())
}
