//! The ordered task collection and its mutation/query operations.
//!
//! Every operation either succeeds or leaves the collection exactly as it
//! was. Persistence is the caller's responsibility ([`crate::manager`]);
//! nothing in this module touches storage.
//!
//! Ordering rules:
//! - Insertion order until an explicit sort is applied, then the
//!   last-applied sort's order. New tasks append; they are never resorted
//!   automatically.
//! - [`TaskList::group_completed_last`] is a stable partition, re-applied
//!   after every toggle by deployments that opt in.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::task::{Priority, Task, TaskId, TaskPatch};

/// Sort direction for the explicit sort operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// An ordered collection of tasks with unique ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| &task.id == id)
    }

    fn position(&self, id: &TaskId) -> Result<usize> {
        self.tasks
            .iter()
            .position(|task| &task.id == id)
            .ok_or_else(|| Error::TaskNotFound(id.clone()))
    }

    /// Append a new task built from the given fields.
    ///
    /// Fails with [`Error::EmptyText`] on whitespace-only text, leaving
    /// the collection unchanged.
    pub fn add(
        &mut self,
        text: impl Into<String>,
        due_date: Option<NaiveDate>,
        priority: Priority,
    ) -> Result<TaskId> {
        let task = Task::new(text, due_date, priority)?;
        let id = task.id.clone();
        tracing::debug!(id = %id, "task added");
        self.tasks.push(task);
        Ok(id)
    }

    /// Insert an already-built task (used when replaying a stored
    /// snapshot or stamping owner ids before the append).
    pub fn push(&mut self, task: Task) {
        self.tasks.push(task);
    }

    /// Replace a task's mutable fields. Unspecified patch fields are
    /// unchanged; `id`, `completed`, and `owner_id` are always preserved.
    pub fn update(&mut self, id: &TaskId, patch: TaskPatch) -> Result<()> {
        let idx = self.position(id)?;
        self.tasks[idx].apply(patch)?;
        tracing::debug!(id = %id, "task updated");
        Ok(())
    }

    /// Flip a task's `completed` flag, returning the new value.
    ///
    /// Reordering is a separate, opt-in step: callers that group
    /// completed tasks at the end follow up with
    /// [`TaskList::group_completed_last`].
    pub fn toggle(&mut self, id: &TaskId) -> Result<bool> {
        let idx = self.position(id)?;
        let task = &mut self.tasks[idx];
        task.completed = !task.completed;
        task.updated_at = chrono::Utc::now();
        tracing::debug!(id = %id, completed = task.completed, "task toggled");
        Ok(task.completed)
    }

    /// Remove a task, returning it.
    pub fn delete(&mut self, id: &TaskId) -> Result<Task> {
        let idx = self.position(id)?;
        let task = self.tasks.remove(idx);
        tracing::debug!(id = %id, "task deleted");
        Ok(task)
    }

    /// Remove every task. Always succeeds, including on an empty list.
    pub fn clear(&mut self) -> usize {
        let removed = self.tasks.len();
        self.tasks.clear();
        removed
    }

    /// Stable partition: incomplete tasks first, completed tasks after,
    /// relative order preserved within each group.
    pub fn group_completed_last(&mut self) {
        self.tasks.sort_by_key(|task| task.completed);
    }

    /// Stable sort by due date. Tasks without a due date sort to the end
    /// for both directions, so re-application is a no-op.
    pub fn sort_by_due_date(&mut self, direction: SortDirection) {
        self.tasks.sort_by(|left, right| {
            match (left.due_date, right.due_date) {
                (None, None) => std::cmp::Ordering::Equal,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (Some(_), None) => std::cmp::Ordering::Less,
                (Some(a), Some(b)) => match direction {
                    SortDirection::Ascending => a.cmp(&b),
                    SortDirection::Descending => b.cmp(&a),
                },
            }
        });
    }

    /// Stable sort by priority rank (High > Medium > Low). Ties keep
    /// their prior relative order.
    pub fn sort_by_priority(&mut self, direction: SortDirection) {
        self.tasks.sort_by(|left, right| {
            let ordering = left.priority.rank().cmp(&right.priority.rank());
            match direction {
                SortDirection::Descending => ordering,
                SortDirection::Ascending => ordering.reverse(),
            }
        });
    }

    /// Case-insensitive substring match on task text. Read-only view in
    /// current collection order; an empty query matches everything.
    pub fn filter<'a>(&'a self, query: &str) -> impl Iterator<Item = &'a Task> + 'a {
        let needle = query.to_lowercase();
        self.tasks
            .iter()
            .filter(move |task| needle.is_empty() || task.text.to_lowercase().contains(&needle))
    }

    /// Wholesale replacement, used when a live backend pushes a new
    /// snapshot (last writer wins at full-collection granularity).
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    /// Keep only tasks belonging to `owner` (per-user scoped mode).
    pub fn retain_owner(&mut self, owner: &str) {
        self.tasks
            .retain(|task| task.owner_id.as_deref() == Some(owner));
    }
}
