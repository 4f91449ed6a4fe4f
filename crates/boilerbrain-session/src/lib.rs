//! Session cache with LRU eviction, TTL sweeps and write-through persistence.
//!
//! This crate keeps per-conversation [`Session`] objects fast to read and
//! write while tolerating a slow or failing backing store:
//! - [`BoundedCache`]: fixed-capacity LRU map
//! - [`SessionStore`]: cache + durable store, with periodic expiry sweeps
//! - Backing-store failures are logged and counted, never returned
//!
//! # Example
//!
//! ```rust,ignore
//! use boilerbrain_session::{SessionConfig, SessionStore, SessionUpdate, Durability};
//!
//! let store = SessionStore::new(SessionConfig::default(), backing);
//! store.start_cleanup_task();
//!
//! let session = store.get_session("abc").await;
//! store
//!     .update_session("abc", SessionUpdate::new().with_history(history), Durability::Sync)
//!     .await;
//! store.close().await;
//! ```

mod bounded;
mod codec;
mod config;
mod error;
mod metrics;
mod session;
mod store;
mod ttl;

pub use bounded::BoundedCache;
pub use config::SessionConfig;
pub use error::{SessionError, Result};
pub use metrics::SessionStats;
pub use session::{BoilerInfo, Message, Sender, Session, SessionUpdate, Summary};
pub use store::{Durability, SessionStore};
pub use ttl::ExpiryPolicy;

pub use boilerbrain_types::ReadFailurePolicy;
