//! Shared types for the BoilerBrain session and query layers.
//!
//! This crate holds the contracts the other crates meet at:
//! - [`BackingStore`]: the durable record store both layers sit on
//! - [`StoreError`]: the error taxonomy, including the transient/business split
//! - Configuration capability traits for decoupled config passing

pub mod config;
pub mod error;
pub mod store;

pub use config::{
    ConfigProvider, HasQueryConfig, HasSessionConfig, QueryConfigProvider, ReadFailurePolicy,
    SessionConfigProvider, defaults,
};
pub use error::{StoreError, StoreResult};
pub use store::{BackingStore, Filter};
