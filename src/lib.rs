//! wrapitup - To-Do List Core Library
//!
//! This library provides the task collection model behind a personal
//! to-do list: create, edit, complete, delete, search, sort, and persist
//! tasks, optionally scoped to a signed-in user.
//!
//! # Core Concepts
//!
//! - **Tasks**: validated entities with a stable ULID id, optional due
//!   date, and a three-level priority
//! - **Task List**: ordered collection with pure mutation and query
//!   operations (insertion order until an explicit sort)
//! - **Stores**: pluggable persistence behind the `TaskStore` trait,
//!   saved optimistically after every mutation
//! - **Sessions**: opaque identity from a `SessionProvider`, scoping the
//!   visible collection per user when present
//! - **Events**: JSONL change notifications for external integrations
//!
//! # Module Organization
//!
//! - `config`: Configuration loading from `wrapitup.toml`
//! - `error`: Error types and result aliases
//! - `task`: Task entity, ids, priorities, and validation
//! - `list`: The ordered collection and its operations
//! - `store`: Persistence adapters (memory, file)
//! - `session`: Session/identity provider boundary
//! - `events`: Structured change events
//! - `manager`: Single-actor coordination of list, store, and session

pub mod config;
pub mod error;
pub mod events;
pub mod list;
pub mod manager;
pub mod session;
pub mod store;
pub mod task;

pub use error::{Error, Result};
