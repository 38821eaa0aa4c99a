//! Task entity: the data shape of one to-do item and its field-level
//! validation.
//!
//! Construction goes through [`Task::new`], which rejects empty or
//! whitespace-only text. Ids are ULIDs and are never reassigned after
//! creation.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{Error, Result};

/// Opaque stable task identifier, unique within a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a fresh id.
    pub fn new() -> Self {
        Self(Ulid::new().to_string().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Task priority. Rank for sorting is High > Medium > Low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Sort rank, highest priority first.
    pub fn rank(self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(Error::InvalidArgument(format!(
                "unknown priority: {other}"
            ))),
        }
    }
}

/// One user-visible to-do item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Build a new task with a fresh id.
    ///
    /// Fails with [`Error::EmptyText`] when `text` is empty after
    /// trimming. `completed` starts false; `owner_id` is stamped later by
    /// the manager when a session is present.
    pub fn new(
        text: impl Into<String>,
        due_date: Option<NaiveDate>,
        priority: Priority,
    ) -> Result<Self> {
        let text = validated_text(text.into())?;
        let now = Utc::now();
        Ok(Self {
            id: TaskId::new(),
            text,
            completed: false,
            due_date,
            priority,
            owner_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a partial edit, preserving `id`, `completed`, and `owner_id`.
    pub fn apply(&mut self, patch: TaskPatch) -> Result<()> {
        if let Some(text) = patch.text {
            self.text = validated_text(text)?;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Partial update for [`Task`]'s mutable fields.
///
/// Outer `None` leaves a field unchanged. For `due_date`, `Some(None)`
/// clears the date while `Some(Some(d))` sets it.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub due_date: Option<Option<NaiveDate>>,
    pub priority: Option<Priority>,
}

impl TaskPatch {
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(Some(due_date));
        self
    }

    pub fn clear_due_date(mut self) -> Self {
        self.due_date = Some(None);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
}

fn validated_text(text: String) -> Result<String> {
    if text.trim().is_empty() {
        return Err(Error::EmptyText);
    }
    Ok(text)
}
