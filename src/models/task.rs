use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::category::CategoryId;

pub type TaskId = i64;

/// Stored as the upper-case variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub created_date: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub reminder_time: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub category_id: CategoryId,
    pub is_completed: bool,
}

/// A task that has not been stored yet; the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "now_millis")]
    pub created_date: DateTime<Utc>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminder_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Priority,
    pub category_id: CategoryId,
    #[serde(default)]
    pub is_completed: bool,
}

impl NewTask {
    pub fn new(title: impl Into<String>, category_id: CategoryId, priority: Priority) -> Self {
        Self {
            title: title.into(),
            description: None,
            created_date: now_millis(),
            due_date: None,
            reminder_time: None,
            priority,
            category_id,
            is_completed: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_reminder(mut self, reminder_time: DateTime<Utc>) -> Self {
        self.reminder_time = Some(reminder_time);
        self
    }

    pub fn into_task(self, id: TaskId) -> Task {
        Task {
            id,
            title: self.title,
            description: self.description,
            created_date: truncate_millis(self.created_date),
            due_date: self.due_date.map(truncate_millis),
            reminder_time: self.reminder_time.map(truncate_millis),
            priority: self.priority,
            category_id: self.category_id,
            is_completed: self.is_completed,
        }
    }
}

/// Row layout of the `tasks` table. Timestamps are epoch milliseconds.
#[derive(Debug, FromRow)]
#[sqlx(rename_all = "camelCase")]
pub(crate) struct TaskRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub created_date: i64,
    pub due_date: Option<i64>,
    pub reminder_time: Option<i64>,
    pub priority: Priority,
    pub category_id: i64,
    pub is_completed: bool,
}

impl TryFrom<TaskRow> for Task {
    type Error = sqlx::Error;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Task {
            id: row.id,
            title: row.title,
            description: row.description,
            created_date: from_millis(row.created_date)?,
            due_date: row.due_date.map(from_millis).transpose()?,
            reminder_time: row.reminder_time.map(from_millis).transpose()?,
            priority: row.priority,
            category_id: row.category_id,
            is_completed: row.is_completed,
        })
    }
}

pub fn now_millis() -> DateTime<Utc> {
    truncate_millis(Utc::now())
}

/// Drops sub-millisecond precision so values survive a round trip through storage.
pub fn truncate_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| sqlx::Error::Decode(format!("timestamp out of range: {ms}").into()))
}
