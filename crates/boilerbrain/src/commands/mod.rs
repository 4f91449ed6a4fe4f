//! CLI command handlers.

pub mod config;
pub mod query;
pub mod session;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use boilerbrain_config::{BoilerbrainConfig, LoadedConfig};
use boilerbrain_store::{MaintenanceHook, MemoryBackingStore, SqliteBackingStore};
use boilerbrain_types::{BackingStore, HasSessionConfig};

/// Shared context for all commands.
#[derive(Debug)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Merged configuration and where it came from.
    pub loaded: LoadedConfig,
    /// Database path override.
    pub db: Option<PathBuf>,
    /// Use an in-memory store.
    pub in_memory: bool,
}

impl Context {
    pub fn config(&self) -> &BoilerbrainConfig {
        &self.loaded.config
    }

    /// Open the backing store the flags and config point at.
    ///
    /// The session maintenance hook is registered as a retention sweep over
    /// the sessions table when `[store].retention_days` is non-zero.
    pub fn open_backing(&self) -> Result<Arc<dyn BackingStore>> {
        let session = self.config().session();
        let hook = session.maintenance_hook();

        if self.in_memory {
            let mut store = MemoryBackingStore::new();
            if let Some(name) = hook {
                store = store.with_hook(name);
            }
            return Ok(Arc::new(store));
        }

        let store_section = self.config().store();
        let path = self.db.clone().unwrap_or_else(|| store_section.db_path());
        let mut store = SqliteBackingStore::open(&path)
            .with_context(|| format!("opening database {}", path.display()))?;

        if let (Some(name), Some(older_than)) = (hook, store_section.retention()) {
            store = store.with_hook(
                name,
                MaintenanceHook::ExpireRecords {
                    table: session.sessions_table(),
                    older_than,
                },
            );
        }
        tracing::debug!(path = %path.display(), "Backing store opened");
        Ok(Arc::new(store))
    }
}
