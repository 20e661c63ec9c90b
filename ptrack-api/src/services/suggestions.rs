//! Suggestion generator
//!
//! Gathers a user's goals, habits, time entries and tasks, projects them into
//! a reduced context and asks the reasoning collaborator for exactly three
//! suggestions. Any failure along the way (no credential, storage error,
//! network, malformed output) yields the fixed default set instead.

use chrono::{DateTime, Utc};
use ptrack_common::models::{Goal, Habit, Task, TimeEntry};
use ptrack_common::Storage;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::collaborators::{CollaboratorError, SuggestionModel};

/// Number of suggestions returned per request
pub const SUGGESTION_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionType {
    Focus,
    Habit,
    Goal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: SuggestionType,
    pub impact: Impact,
    pub action: String,
}

/// Fixed fallback set
pub fn default_suggestions() -> Vec<Suggestion> {
    vec![
        Suggestion {
            id: "1".to_string(),
            title: "Focus Improvement".to_string(),
            description: "Based on your patterns, try scheduling study sessions in the morning \
                          for better focus and retention."
                .to_string(),
            kind: SuggestionType::Focus,
            impact: Impact::High,
            action: "Apply to Schedule".to_string(),
        },
        Suggestion {
            id: "2".to_string(),
            title: "Habit Formation".to_string(),
            description: "You're 80% of the way to forming your daily reading habit. \
                          Keep going for 3 more days!"
                .to_string(),
            kind: SuggestionType::Habit,
            impact: Impact::Medium,
            action: "View Habit".to_string(),
        },
        Suggestion {
            id: "3".to_string(),
            title: "Weekly Goal".to_string(),
            description: "Consider setting a goal to reduce social media time by 20% next week \
                          based on this week's usage."
                .to_string(),
            kind: SuggestionType::Goal,
            impact: Impact::Low,
            action: "Add Goal".to_string(),
        },
    ]
}

// ============================================================================
// Context projection
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalContext {
    pub title: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub target_hours: i64,
    pub actual_hours: i64,
    pub progress_percent: f64,
    pub category: String,
    pub is_completed: bool,
}

impl From<&Goal> for GoalContext {
    fn from(goal: &Goal) -> Self {
        Self {
            title: goal.title.clone(),
            description: goal.description.clone(),
            start_date: goal.start_date,
            end_date: goal.end_date,
            target_hours: goal.target_hours,
            actual_hours: goal.actual_hours,
            progress_percent: goal.progress_percent(),
            category: goal.category.clone(),
            is_completed: goal.is_completed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitContext {
    pub title: String,
    pub description: Option<String>,
    pub streak_count: i64,
    pub target_days: i64,
    pub streak_percent: f64,
    pub category: String,
    pub is_active: bool,
}

impl From<&Habit> for HabitContext {
    fn from(habit: &Habit) -> Self {
        Self {
            title: habit.title.clone(),
            description: habit.description.clone(),
            streak_count: habit.streak_count,
            target_days: habit.target_days,
            streak_percent: habit.streak_percent(),
            category: habit.category.clone(),
            is_active: habit.is_active,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntryContext {
    pub category: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub date: DateTime<Utc>,
    /// Minutes
    pub duration: i64,
}

impl From<&TimeEntry> for TimeEntryContext {
    fn from(entry: &TimeEntry) -> Self {
        Self {
            category: entry.category.clone(),
            start_time: entry.start_time,
            end_time: entry.end_time,
            date: entry.date,
            duration: entry.duration,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskContext {
    pub title: String,
    pub category: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_completed: bool,
}

impl From<&Task> for TaskContext {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            category: task.category.clone(),
            start_time: task.start_time,
            end_time: task.end_time,
            is_completed: task.is_completed,
        }
    }
}

/// Everything the reasoning collaborator sees about a user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionContext {
    pub goals: Vec<GoalContext>,
    pub habits: Vec<HabitContext>,
    pub time_entries: Vec<TimeEntryContext>,
    pub tasks: Vec<TaskContext>,
}

// ============================================================================
// Response parsing
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawResponse {
    Wrapped { suggestions: Vec<Value> },
    Bare(Vec<Value>),
}

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    #[serde(default)]
    id: Option<Value>,
    title: String,
    description: String,
    #[serde(rename = "type")]
    kind: String,
    impact: String,
    action: String,
}

fn parse_kind(value: &str) -> Option<SuggestionType> {
    match value.trim().to_ascii_lowercase().as_str() {
        "focus" => Some(SuggestionType::Focus),
        "habit" => Some(SuggestionType::Habit),
        "goal" => Some(SuggestionType::Goal),
        _ => None,
    }
}

fn parse_impact(value: &str) -> Option<Impact> {
    match value.trim().to_ascii_lowercase().as_str() {
        "high" => Some(Impact::High),
        "medium" => Some(Impact::Medium),
        "low" => Some(Impact::Low),
        _ => None,
    }
}

fn suggestion_id(raw: Option<Value>, now_millis: i64, index: usize) -> String {
    let id = match raw {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    if id.is_empty() {
        format!("ai-suggestion-{}-{}", now_millis, index)
    } else {
        id
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn to_suggestion(value: Value, now_millis: i64, index: usize) -> Option<Suggestion> {
    let raw: RawSuggestion = serde_json::from_value(value).ok()?;
    Some(Suggestion {
        id: suggestion_id(raw.id, now_millis, index),
        title: non_blank(raw.title)?,
        description: non_blank(raw.description)?,
        kind: parse_kind(&raw.kind)?,
        impact: parse_impact(&raw.impact)?,
        action: non_blank(raw.action)?,
    })
}

/// Parse the collaborator's raw content into exactly [`SUGGESTION_COUNT`] suggestions.
///
/// Accepts `{"suggestions": [...]}` or a bare array. Malformed items are
/// skipped; fewer than three valid items is an error, extras are dropped.
pub fn parse_suggestions(content: &str, now_millis: i64) -> Result<Vec<Suggestion>, CollaboratorError> {
    let items = match serde_json::from_str::<RawResponse>(content)
        .map_err(|e| CollaboratorError::Parse(format!("Suggestions are not valid JSON: {}", e)))?
    {
        RawResponse::Wrapped { suggestions } => suggestions,
        RawResponse::Bare(items) => items,
    };

    let total = items.len();
    let suggestions: Vec<Suggestion> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| to_suggestion(item, now_millis, index))
        .take(SUGGESTION_COUNT)
        .collect();

    if suggestions.len() < SUGGESTION_COUNT {
        return Err(CollaboratorError::Parse(format!(
            "Expected {} valid suggestions, got {} of {}",
            SUGGESTION_COUNT,
            suggestions.len(),
            total
        )));
    }
    Ok(suggestions)
}

// ============================================================================
// Generator
// ============================================================================

#[derive(Debug, Error)]
enum SuggestionError {
    #[error("storage read failed: {0}")]
    Storage(#[from] ptrack_common::Error),

    #[error("context serialization failed: {0}")]
    Context(#[from] serde_json::Error),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

pub struct SuggestionGenerator {
    storage: Arc<dyn Storage>,
    advisor: Option<Arc<dyn SuggestionModel>>,
}

impl SuggestionGenerator {
    pub fn new(storage: Arc<dyn Storage>, advisor: Option<Arc<dyn SuggestionModel>>) -> Self {
        Self { storage, advisor }
    }

    pub fn is_enabled(&self) -> bool {
        self.advisor.is_some()
    }

    /// Read the four record kinds concurrently and project them
    pub async fn build_context(&self, user_id: i64) -> ptrack_common::Result<SuggestionContext> {
        let (goals, habits, time_entries, tasks) = tokio::try_join!(
            self.storage.list_goals(user_id),
            self.storage.list_habits(user_id),
            self.storage.list_time_entries(user_id, None, None),
            self.storage.list_tasks(user_id, None),
        )?;

        Ok(SuggestionContext {
            goals: goals.iter().map(GoalContext::from).collect(),
            habits: habits.iter().map(HabitContext::from).collect(),
            time_entries: time_entries.iter().map(TimeEntryContext::from).collect(),
            tasks: tasks.iter().map(TaskContext::from).collect(),
        })
    }

    /// Three suggestions for `user_id`. Never fails.
    pub async fn generate(&self, user_id: i64) -> Vec<Suggestion> {
        let Some(advisor) = &self.advisor else {
            debug!(user_id, "No collaborator credential, using default suggestions");
            return default_suggestions();
        };

        match self.try_generate(advisor.as_ref(), user_id).await {
            Ok(suggestions) => suggestions,
            Err(e) => {
                warn!(user_id, error = %e, "Suggestion generation failed, using defaults");
                default_suggestions()
            }
        }
    }

    async fn try_generate(
        &self,
        advisor: &dyn SuggestionModel,
        user_id: i64,
    ) -> Result<Vec<Suggestion>, SuggestionError> {
        let context = serde_json::to_value(self.build_context(user_id).await?)?;
        let content = advisor.suggest(&context).await?;
        Ok(parse_suggestions(&content, Utc::now().timestamp_millis())?)
    }
}
