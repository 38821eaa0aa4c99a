//! Configuration loading and management
//!
//! Handles parsing of `wrapitup.toml` configuration files. The two
//! behaviors the reference revisions disagree on are settled here as
//! configuration: the priority applied when a task is created without
//! one, and whether toggling completion regroups completed tasks at the
//! end of the list.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::task::Priority;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "wrapitup.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Priority assigned when a task is created without one
    #[serde(default = "default_priority")]
    pub default_priority: Priority,

    /// Regroup completed tasks after incomplete ones on every toggle
    #[serde(default)]
    pub completed_last: bool,

    /// Storage backend configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Event output configuration
    #[serde(default)]
    pub events: EventsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_priority: default_priority(),
            completed_last: false,
            storage: StorageConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

/// Change event output selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Where to emit JSONL change events: `-` for stdout, otherwise a
    /// file path. Unset disables event output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

fn default_priority() -> Priority {
    Priority::Low
}

/// Storage backend selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend kind: `memory` or `file`
    #[serde(default)]
    pub backend: StoreBackend,

    /// Snapshot directory for the file backend; defaults to the
    /// platform data directory when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: None,
        }
    }
}

/// Persistence backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// Non-persistent, for tests and the no-persistence deployment
    Memory,
    /// JSON snapshot on local disk
    #[default]
    File,
}

impl StoreBackend {
    /// Parse a backend name, accepting the aliases the file formats used.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "none" => Ok(Self::Memory),
            "file" | "json" | "local" => Ok(Self::File),
            other => Err(Error::InvalidConfig(format!(
                "unknown storage backend: {other}"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File => "file",
        }
    }
}

impl Serialize for StoreBackend {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// Config decoding goes through `parse` so the backend aliases work in
// TOML documents too.
impl<'de> Deserialize<'de> for StoreBackend {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl Config {
    /// Load configuration from a TOML file. A missing file yields the
    /// defaults; a malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `wrapitup.toml` in the given directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load(&dir.join(CONFIG_FILE))
    }
}
