//! Single-actor coordination: collection transform, then persistence,
//! then notification.
//!
//! [`TaskManager`] is the one mutator of its [`TaskList`]. Each user
//! action runs one synchronous transform, notifies observers, then calls
//! the store. Persistence is optimistic: a failed `save` surfaces as an
//! error while the in-memory mutation stands, so the caller can retry or
//! tell the user without losing state. Remote snapshots replace the whole
//! collection at once (last writer wins); the `&mut self` receivers keep
//! the single-writer rule a compile-time fact.

use chrono::NaiveDate;

use crate::config::Config;
use crate::error::Result;
use crate::events::{Event, EventDestination, EventKind, EventSink};
use crate::list::{SortDirection, TaskList};
use crate::session::SessionProvider;
use crate::store::TaskStore;
use crate::task::{Priority, Task, TaskId, TaskPatch};

/// Observer invoked after every collection change with the new contents.
pub type ChangeListener = Box<dyn Fn(&[Task]) + Send>;

/// Owns the collection and wires it to a store and a session.
pub struct TaskManager {
    list: TaskList,
    store: Box<dyn TaskStore>,
    session: Box<dyn SessionProvider>,
    config: Config,
    sink: Option<EventSink>,
    listeners: Vec<ChangeListener>,
}

impl TaskManager {
    pub fn new(
        store: Box<dyn TaskStore>,
        session: Box<dyn SessionProvider>,
        config: Config,
    ) -> Self {
        Self {
            list: TaskList::new(),
            store,
            session,
            config,
            sink: None,
            listeners: Vec::new(),
        }
    }

    /// Build a manager from configuration, opening the configured event
    /// destination (`[events] destination`) as the sink when one is set.
    pub fn from_config(
        store: Box<dyn TaskStore>,
        session: Box<dyn SessionProvider>,
        config: Config,
    ) -> Result<Self> {
        let sink = match EventDestination::parse(config.events.destination.as_deref()) {
            Some(destination) => Some(destination.open()?),
            None => None,
        };
        let mut manager = Self::new(store, session, config);
        manager.sink = sink;
        Ok(manager)
    }

    /// Emit a JSONL change event for every mutation.
    pub fn with_event_sink(mut self, sink: EventSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Register a collection-changed observer.
    pub fn on_change(&mut self, listener: ChangeListener) {
        self.listeners.push(listener);
    }

    pub fn tasks(&self) -> &[Task] {
        self.list.tasks()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.list.get(id)
    }

    /// Case-insensitive substring search over the visible collection.
    pub fn search(&self, query: &str) -> Vec<&Task> {
        self.list.filter(query).collect()
    }

    /// Load the stored collection, scoped to the signed-in user when one
    /// is present. A store with nothing recorded yields an empty list.
    pub fn load(&mut self) -> Result<()> {
        let tasks = self.store.load()?;
        self.list.replace_all(tasks);
        if let Some(owner) = self.session.current_user_id() {
            self.list.retain_owner(&owner);
        }
        tracing::debug!(tasks = self.list.len(), "collection loaded");
        self.notify();
        Ok(())
    }

    /// Add a task. When `priority` is `None` the configured default
    /// applies; the task is bound to the signed-in user if any.
    ///
    /// On a persistence error the task is already in [`tasks`] — the
    /// mutation is never rolled back.
    ///
    /// [`tasks`]: TaskManager::tasks
    pub fn add(
        &mut self,
        text: impl Into<String>,
        due_date: Option<NaiveDate>,
        priority: Option<Priority>,
    ) -> Result<TaskId> {
        let priority = priority.unwrap_or(self.config.default_priority);
        let mut task = Task::new(text, due_date, priority)?;
        task.owner_id = self.session.current_user_id();
        let id = task.id.clone();
        self.list.push(task);

        self.finish(EventKind::TaskAdded, Some(&id))?;
        Ok(id)
    }

    /// Edit a task's mutable fields.
    pub fn update(&mut self, id: &TaskId, patch: TaskPatch) -> Result<()> {
        self.list.update(id, patch)?;
        self.finish(EventKind::TaskEdited, Some(id))
    }

    /// Flip completion, regrouping completed tasks last when configured.
    pub fn toggle(&mut self, id: &TaskId) -> Result<bool> {
        let completed = self.list.toggle(id)?;
        if self.config.completed_last {
            self.list.group_completed_last();
        }
        self.finish(EventKind::TaskToggled, Some(id))?;
        Ok(completed)
    }

    /// Delete a task.
    pub fn delete(&mut self, id: &TaskId) -> Result<Task> {
        let task = self.list.delete(id)?;
        self.finish(EventKind::TaskDeleted, Some(id))?;
        Ok(task)
    }

    /// Remove every task. The removal itself always succeeds.
    pub fn clear(&mut self) -> Result<usize> {
        let removed = self.list.clear();
        self.finish(EventKind::ListCleared, None)?;
        Ok(removed)
    }

    pub fn sort_by_due_date(&mut self, direction: SortDirection) -> Result<()> {
        self.list.sort_by_due_date(direction);
        self.finish(EventKind::ListSorted, None)
    }

    pub fn sort_by_priority(&mut self, direction: SortDirection) -> Result<()> {
        self.list.sort_by_priority(direction);
        self.finish(EventKind::ListSorted, None)
    }

    /// Apply a snapshot pushed by a live backend: wholesale replacement,
    /// last writer wins. Not persisted back — it came from the store.
    pub fn apply_snapshot(&mut self, tasks: Vec<Task>) {
        self.list.replace_all(tasks);
        if let Some(owner) = self.session.current_user_id() {
            self.list.retain_owner(&owner);
        }
        tracing::debug!(tasks = self.list.len(), "remote snapshot applied");
        self.emit(EventKind::ListReplaced, None);
        self.notify();
    }

    /// React to a sign-in/sign-out: reload under the new scope. Wire
    /// this to [`SessionProvider::watch`] in the embedding application.
    pub fn handle_session_change(&mut self) -> Result<()> {
        self.load()
    }

    /// Notify observers and emit the event first (the mutation is
    /// already visible), then persist. A save error propagates after the
    /// optimistic state is fully published.
    fn finish(&mut self, kind: EventKind, id: Option<&TaskId>) -> Result<()> {
        self.emit(kind, id);
        self.notify();
        if let Err(err) = self.store.save(self.list.tasks()) {
            tracing::warn!(error = %err, "persistence failed; in-memory state kept");
            return Err(err);
        }
        Ok(())
    }

    fn emit(&mut self, kind: EventKind, id: Option<&TaskId>) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        let owner = self.session.current_user_id();
        let event = Event::new(kind, owner);
        let event = match id {
            Some(id) => match event.with_data(serde_json::json!({ "task_id": id })) {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(error = %err, "event payload serialization failed");
                    return;
                }
            },
            None => event,
        };
        if let Err(err) = sink.emit(&event) {
            tracing::warn!(error = %err, "event emission failed");
        }
    }

    fn notify(&self) {
        for listener in &self.listeners {
            listener(self.list.tasks());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::LocalSession;
    use crate::store::{InjectedFailure, MemoryStore};
    use std::sync::{Arc, Mutex};

    fn manager_with(config: Config) -> (TaskManager, MemoryStore) {
        let store = MemoryStore::new();
        let manager = TaskManager::new(
            Box::new(store.clone()),
            Box::new(LocalSession::anonymous()),
            config,
        );
        (manager, store)
    }

    #[test]
    fn every_mutation_is_saved() {
        let (mut manager, store) = manager_with(Config::default());

        let id = manager.add("buy milk", None, None).unwrap();
        assert_eq!(store.save_count(), 1);

        manager.toggle(&id).unwrap();
        assert_eq!(store.save_count(), 2);

        manager.delete(&id).unwrap();
        assert_eq!(store.save_count(), 3);
        assert!(store.stored().is_empty());
    }

    #[test]
    fn save_failure_keeps_the_optimistic_mutation() {
        let (mut manager, store) = manager_with(Config::default());
        store.inject_failure(InjectedFailure::Unavailable("offline".to_string()));

        let err = manager.add("buy milk", None, None).unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(manager.tasks().len(), 1);
        assert!(store.stored().is_empty());
    }

    #[test]
    fn validation_failure_saves_nothing() {
        let (mut manager, store) = manager_with(Config::default());
        assert!(manager.add("   ", None, None).is_err());
        assert_eq!(store.save_count(), 0);
        assert!(manager.tasks().is_empty());
    }

    #[test]
    fn configured_default_priority_applies() {
        let config = Config {
            default_priority: Priority::Medium,
            ..Config::default()
        };
        let (mut manager, _) = manager_with(config);
        let id = manager.add("buy milk", None, None).unwrap();
        assert_eq!(manager.get(&id).unwrap().priority, Priority::Medium);

        let explicit = manager.add("pay rent", None, Some(Priority::High)).unwrap();
        assert_eq!(manager.get(&explicit).unwrap().priority, Priority::High);
    }

    #[test]
    fn toggle_regroups_when_configured() {
        let config = Config {
            completed_last: true,
            ..Config::default()
        };
        let (mut manager, _) = manager_with(config);
        let a = manager.add("a", None, None).unwrap();
        manager.add("b", None, None).unwrap();

        manager.toggle(&a).unwrap();
        let texts: Vec<_> = manager.tasks().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "a"]);
    }

    #[test]
    fn toggle_keeps_order_by_default() {
        let (mut manager, _) = manager_with(Config::default());
        let a = manager.add("a", None, None).unwrap();
        manager.add("b", None, None).unwrap();

        manager.toggle(&a).unwrap();
        let texts: Vec<_> = manager.tasks().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn signed_in_session_stamps_owner() {
        let store = MemoryStore::new();
        let mut manager = TaskManager::new(
            Box::new(store),
            Box::new(LocalSession::signed_in("user-1")),
            Config::default(),
        );
        let id = manager.add("buy milk", None, None).unwrap();
        assert_eq!(manager.get(&id).unwrap().owner_id.as_deref(), Some("user-1"));
    }

    #[test]
    fn load_scopes_to_the_signed_in_user() {
        let store = MemoryStore::new();
        let mut mine = Task::new("mine", None, Priority::Low).unwrap();
        mine.owner_id = Some("user-1".to_string());
        let mut theirs = Task::new("theirs", None, Priority::Low).unwrap();
        theirs.owner_id = Some("user-2".to_string());
        store.push_snapshot(vec![mine, theirs]);

        let mut manager = TaskManager::new(
            Box::new(store),
            Box::new(LocalSession::signed_in("user-1")),
            Config::default(),
        );
        manager.load().unwrap();
        assert_eq!(manager.tasks().len(), 1);
        assert_eq!(manager.tasks()[0].text, "mine");
    }

    #[test]
    fn signed_out_load_is_unscoped() {
        let store = MemoryStore::new();
        let mut owned = Task::new("owned", None, Priority::Low).unwrap();
        owned.owner_id = Some("user-1".to_string());
        store.push_snapshot(vec![owned, Task::new("unowned", None, Priority::Low).unwrap()]);

        let mut manager = TaskManager::new(
            Box::new(store),
            Box::new(LocalSession::anonymous()),
            Config::default(),
        );
        manager.load().unwrap();
        assert_eq!(manager.tasks().len(), 2);
    }

    #[test]
    fn snapshot_replaces_the_whole_collection() {
        let (mut manager, _) = manager_with(Config::default());
        manager.add("stale", None, None).unwrap();

        let fresh = vec![
            Task::new("fresh one", None, Priority::Low).unwrap(),
            Task::new("fresh two", None, Priority::High).unwrap(),
        ];
        manager.apply_snapshot(fresh);

        let texts: Vec<_> = manager.tasks().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["fresh one", "fresh two"]);
    }

    #[test]
    fn listeners_see_every_change() {
        let (mut manager, _) = manager_with(Config::default());
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sizes);
        manager.on_change(Box::new(move |tasks| {
            sink.lock().unwrap().push(tasks.len());
        }));

        let id = manager.add("a", None, None).unwrap();
        manager.add("b", None, None).unwrap();
        manager.delete(&id).unwrap();
        manager.clear().unwrap();

        assert_eq!(*sizes.lock().unwrap(), vec![1, 2, 1, 0]);
    }

    #[test]
    fn configured_event_destination_receives_mutations() {
        let temp = tempfile::TempDir::new().unwrap();
        let events_path = temp.path().join("events.jsonl");
        let mut config = Config::default();
        config.events.destination = Some(events_path.display().to_string());

        let mut manager = TaskManager::from_config(
            Box::new(MemoryStore::new()),
            Box::new(LocalSession::anonymous()),
            config,
        )
        .unwrap();

        let id = manager.add("buy milk", None, None).unwrap();
        manager.delete(&id).unwrap();

        let content = std::fs::read_to_string(&events_path).unwrap();
        let kinds: Vec<String> = content
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["event"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(kinds, vec!["task_added", "task_deleted"]);
    }

    #[test]
    fn stdout_event_destination_opens() {
        let mut config = Config::default();
        config.events.destination = Some("-".to_string());
        let mut manager = TaskManager::from_config(
            Box::new(MemoryStore::new()),
            Box::new(LocalSession::anonymous()),
            config,
        )
        .unwrap();
        manager.add("buy milk", None, None).unwrap();
    }

    #[test]
    fn unset_event_destination_means_no_sink() {
        let store = MemoryStore::new();
        let mut manager = TaskManager::from_config(
            Box::new(store.clone()),
            Box::new(LocalSession::anonymous()),
            Config::default(),
        )
        .unwrap();
        manager.add("buy milk", None, None).unwrap();
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn search_delegates_to_the_filter() {
        let (mut manager, _) = manager_with(Config::default());
        manager.add("buy milk", None, None).unwrap();
        manager.add("pay rent", None, None).unwrap();

        let hits = manager.search("MILK");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "buy milk");
        assert_eq!(manager.search("").len(), 2);
    }
}
