//! Backing stores for the BoilerBrain session and query layers.
//!
//! Two implementations of [`BackingStore`](boilerbrain_types::BackingStore):
//! - [`MemoryBackingStore`]: map-backed, with fault injection for tests
//! - [`SqliteBackingStore`]: a JSON document store on SQLite

mod memory;
mod merge;
mod sqlite;

pub use memory::MemoryBackingStore;
pub use sqlite::{MaintenanceHook, SqliteBackingStore};
