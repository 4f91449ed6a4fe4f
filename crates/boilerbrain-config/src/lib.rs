//! Configuration for BoilerBrain.
//!
//! TOML-based configuration with:
//! - `[session]`, `[query]`, `[store]` and `[logging]` sections, all optional
//! - Config file layering (user config dir + project-local overrides)
//! - Capability trait impls so components take only the section they need

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, Discovery, Layer, LoadedConfig, SourceStatus, load_config, load_config_file,
    user_config_dir,
};
pub use error::{ConfigError, Result};
pub use types::*;
