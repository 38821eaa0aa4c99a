//! Persistence adapters for the task collection.
//!
//! Backends implement [`TaskStore`]:
//! - [`MemoryStore`] — non-persistent, with failure injection and pushed
//!   snapshots so the optimistic-persistence and live-update paths are
//!   testable without a remote backend.
//! - [`FileStore`] — one JSON snapshot per scope on local disk, written
//!   atomically (temp file + rename, `sync_all`) under an advisory lock.
//!
//! Contract: `load` of an absent store is an empty collection, not an
//! error. `save` replaces the whole snapshot; failures surface to the
//! caller and are never retried here.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::config::{Config, StoreBackend};
use crate::error::{Error, Result};
use crate::session::Watch;
use crate::task::Task;

pub const SNAPSHOT_SCHEMA_VERSION: &str = "wrapitup.tasks.v1";

/// Default lock timeout in milliseconds
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

const LOCK_RETRY_INTERVAL_MS: u64 = 50;

/// Callback invoked when a live backend pushes a new snapshot.
pub type SnapshotListener = Box<dyn Fn(Vec<Task>) + Send + Sync>;

/// The persistence adapter boundary.
pub trait TaskStore: Send {
    /// Read the stored collection. An absent store is empty, not an error.
    fn load(&self) -> Result<Vec<Task>>;

    /// Durably record the full collection.
    fn save(&self, tasks: &[Task]) -> Result<()>;

    /// Register for pushed snapshots. Backends without live updates
    /// return `None`; dropping the returned [`Watch`] unsubscribes.
    fn watch(&self, listener: SnapshotListener) -> Option<Watch> {
        let _ = listener;
        None
    }
}

/// The stored snapshot document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub tasks: Vec<Task>,
}

impl TaskSnapshot {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            tasks,
        }
    }
}

/// Create a store from configuration, scoped to `owner` when present.
pub fn open_store(config: &Config, owner: Option<&str>) -> Result<Box<dyn TaskStore>> {
    match config.storage.backend {
        StoreBackend::Memory => Ok(Box::new(MemoryStore::new())),
        StoreBackend::File => {
            let dir = match &config.storage.path {
                Some(path) => path.clone(),
                None => FileStore::default_dir()?,
            };
            let mut store = FileStore::new(dir);
            if let Some(owner) = owner {
                store = store.with_owner(owner);
            }
            Ok(Box::new(store))
        }
    }
}

// =============================================================================
// Memory backend
// =============================================================================

/// Failure injected into the next `save` calls of a [`MemoryStore`].
#[derive(Debug, Clone)]
pub enum InjectedFailure {
    Unavailable(String),
    Rejected(String),
}

impl InjectedFailure {
    fn into_error(self) -> Error {
        match self {
            InjectedFailure::Unavailable(msg) => Error::StorageUnavailable(msg),
            InjectedFailure::Rejected(msg) => Error::RemoteRejected(msg),
        }
    }
}

#[derive(Default)]
struct MemoryInner {
    tasks: Mutex<Vec<Task>>,
    failure: Mutex<Option<InjectedFailure>>,
    saves: AtomicU64,
    listeners: Mutex<Vec<(u64, SnapshotListener)>>,
    next_listener: AtomicU64,
}

/// In-memory store. Cloning shares the underlying state, so a test can
/// keep a handle while the manager owns the boxed trait object.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `save` fail until cleared.
    pub fn inject_failure(&self, failure: InjectedFailure) {
        *self.inner.failure.lock().unwrap() = Some(failure);
    }

    pub fn clear_failure(&self) {
        *self.inner.failure.lock().unwrap() = None;
    }

    /// How many saves have succeeded.
    pub fn save_count(&self) -> u64 {
        self.inner.saves.load(Ordering::SeqCst)
    }

    /// Snapshot of what was last saved.
    pub fn stored(&self) -> Vec<Task> {
        self.inner.tasks.lock().unwrap().clone()
    }

    /// Simulate a remote change: replace the stored collection and fan
    /// it out to every registered listener.
    pub fn push_snapshot(&self, tasks: Vec<Task>) {
        *self.inner.tasks.lock().unwrap() = tasks.clone();
        for (_, listener) in self.inner.listeners.lock().unwrap().iter() {
            listener(tasks.clone());
        }
    }
}

impl TaskStore for MemoryStore {
    fn load(&self) -> Result<Vec<Task>> {
        Ok(self.inner.tasks.lock().unwrap().clone())
    }

    fn save(&self, tasks: &[Task]) -> Result<()> {
        if let Some(failure) = self.inner.failure.lock().unwrap().clone() {
            return Err(failure.into_error());
        }
        *self.inner.tasks.lock().unwrap() = tasks.to_vec();
        self.inner.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn watch(&self, listener: SnapshotListener) -> Option<Watch> {
        let id = self.inner.next_listener.fetch_add(1, Ordering::SeqCst);
        self.inner.listeners.lock().unwrap().push((id, listener));
        let inner = Arc::clone(&self.inner);
        Some(Watch::new(move || {
            inner
                .listeners
                .lock()
                .unwrap()
                .retain(|(entry, _)| *entry != id);
        }))
    }
}

// =============================================================================
// File backend
// =============================================================================

/// JSON snapshot store on local disk, optionally scoped per owner.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    owner: Option<String>,
    lock_timeout_ms: u64,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            owner: None,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    /// Scope the store to one owner: each owner gets its own snapshot
    /// file, which is the per-user-document shape of the remote backend.
    pub fn with_owner(mut self, owner: &str) -> Self {
        self.owner = Some(sanitize_scope(owner));
        self
    }

    /// Platform data directory for the default deployment.
    pub fn default_dir() -> Result<PathBuf> {
        directories::ProjectDirs::from("", "", "wrapitup")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| Error::StorageUnavailable("no home directory".to_string()))
    }

    /// Path of the snapshot file for this scope.
    pub fn snapshot_path(&self) -> PathBuf {
        match &self.owner {
            Some(owner) => self.dir.join(format!("tasks.{owner}.json")),
            None => self.dir.join("tasks.json"),
        }
    }

    fn lock_path(&self) -> PathBuf {
        self.snapshot_path().with_extension("lock")
    }

    /// Write data atomically using temp file + rename, so readers never
    /// see a partial snapshot.
    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }
}

impl TaskStore for FileStore {
    fn load(&self) -> Result<Vec<Task>> {
        let path = self.snapshot_path();
        if !path.exists() {
            // First run: nothing stored yet.
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        let snapshot: TaskSnapshot = serde_json::from_str(&content)?;
        tracing::debug!(path = %path.display(), tasks = snapshot.tasks.len(), "snapshot loaded");
        Ok(snapshot.tasks)
    }

    fn save(&self, tasks: &[Task]) -> Result<()> {
        let path = self.snapshot_path();
        let _lock = StoreLock::acquire(&self.lock_path(), self.lock_timeout_ms)?;
        let snapshot = TaskSnapshot::new(tasks.to_vec());
        let json = serde_json::to_string_pretty(&snapshot)?;
        self.write_atomic(&path, json.as_bytes())?;
        tracing::debug!(path = %path.display(), tasks = tasks.len(), "snapshot saved");
        Ok(())
    }
}

/// Exclusive advisory lock guard; releases on drop.
struct StoreLock {
    file: File,
}

impl StoreLock {
    fn acquire(path: &Path, timeout_ms: u64) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let start = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(StoreLock { file }),
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() >= timeout {
                        return Err(Error::LockFailed(path.to_path_buf()));
                    }
                    std::thread::sleep(Duration::from_millis(LOCK_RETRY_INTERVAL_MS));
                }
                Err(err) => return Err(Error::Io(err)),
            }
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

/// Sanitize an owner id for use as a filename component.
fn sanitize_scope(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() {
        "default".to_string()
    } else {
        out
    }
}
