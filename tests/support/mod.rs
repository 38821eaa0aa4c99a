//! Shared fixtures for integration tests.
#![allow(dead_code)]

use chrono::NaiveDate;
use tempfile::TempDir;

use wrapitup::config::{Config, StoreBackend};
use wrapitup::manager::TaskManager;
use wrapitup::session::LocalSession;
use wrapitup::store::{open_store, FileStore};
use wrapitup::task::Task;

/// Opt-in tracing output for debugging test failures via RUST_LOG.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// Config pointing the file backend at a temp directory.
pub fn file_config(temp: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.backend = StoreBackend::File;
    config.storage.path = Some(temp.path().to_path_buf());
    config
}

/// Manager over a file store in `temp`, signed out.
pub fn file_manager(temp: &TempDir) -> TaskManager {
    let config = file_config(temp);
    let store = open_store(&config, None).expect("open file store");
    TaskManager::new(store, Box::new(LocalSession::anonymous()), config)
}

/// Manager over a per-owner file store in `temp`.
pub fn scoped_file_manager(temp: &TempDir, owner: &str) -> TaskManager {
    let config = file_config(temp);
    let store = open_store(&config, Some(owner)).expect("open scoped file store");
    TaskManager::new(store, Box::new(LocalSession::signed_in(owner)), config)
}

/// Direct handle on the same snapshot file a manager writes.
pub fn raw_store(temp: &TempDir) -> FileStore {
    FileStore::new(temp.path())
}

pub fn date(s: &str) -> NaiveDate {
    s.parse().expect("valid date literal")
}

pub fn texts(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().map(|task| task.text.as_str()).collect()
}
