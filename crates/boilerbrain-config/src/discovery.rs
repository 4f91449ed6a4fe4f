//! Locating and layering config files.
//!
//! Two layers are read, lowest precedence first:
//! 1. user: `<config dir>/boilerbrain/config.toml`, where the directory can
//!    be replaced with `BOILERBRAIN_CONFIG_DIR` or an explicit override
//! 2. project: `boilerbrain.toml` in the project (or working) directory
//!
//! A layer that exists but cannot be read or parsed is skipped and reported,
//! so one bad file never takes the rest of the configuration down with it.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::types::APP_NAME;
use crate::{BoilerbrainConfig, ConfigError, Result};

const USER_FILE: &str = "config.toml";
const PROJECT_FILE: &str = "boilerbrain.toml";
const CONFIG_DIR_ENV: &str = "BOILERBRAIN_CONFIG_DIR";

/// Which layer a config file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    User,
    Project,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Layer::User => "user",
            Layer::Project => "project",
        })
    }
}

/// What happened when a layer's file was looked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Loaded,
    Missing,
    /// The file exists but was skipped.
    Invalid(String),
}

/// One config file that discovery considered.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub layer: Layer,
    pub path: PathBuf,
    pub status: SourceStatus,
}

impl ConfigSource {
    pub fn is_loaded(&self) -> bool {
        self.status == SourceStatus::Loaded
    }
}

/// A merged configuration plus the files it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: BoilerbrainConfig,
    /// Every file considered, lowest precedence first.
    pub sources: Vec<ConfigSource>,
}

impl LoadedConfig {
    /// Paths of the files that contributed to the merged config.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|source| source.is_loaded())
            .map(|source| source.path.as_path())
            .collect()
    }

    /// One message per skipped file.
    pub fn warnings(&self) -> Vec<String> {
        self.sources
            .iter()
            .filter_map(|source| match &source.status {
                SourceStatus::Invalid(reason) => Some(format!(
                    "ignored {} config {}: {reason}",
                    source.layer,
                    source.path.display()
                )),
                _ => None,
            })
            .collect()
    }
}

/// Builder for a discovery run.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    config_dir: Option<PathBuf>,
    project_dir: Option<PathBuf>,
}

impl Discovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the user layer from `dir` instead of the platform/env location.
    pub fn config_dir(mut self, dir: Option<&Path>) -> Self {
        self.config_dir = dir.map(Path::to_path_buf);
        self
    }

    /// Look for the project layer in `dir` instead of the working directory.
    pub fn project_dir(mut self, dir: Option<&Path>) -> Self {
        self.project_dir = dir.map(Path::to_path_buf);
        self
    }

    /// Candidate files in merge order.
    pub fn candidates(&self) -> Vec<(Layer, PathBuf)> {
        let mut candidates = Vec::with_capacity(2);

        let user_dir = self.config_dir.clone().or_else(user_config_dir);
        if let Some(dir) = user_dir {
            candidates.push((Layer::User, dir.join(USER_FILE)));
        }

        let project = match &self.project_dir {
            Some(dir) => dir.join(PROJECT_FILE),
            None => PathBuf::from(PROJECT_FILE),
        };
        candidates.push((Layer::Project, project));
        candidates
    }

    /// Read and merge every candidate.
    pub fn load(&self) -> LoadedConfig {
        let mut config = BoilerbrainConfig::new();
        let sources = self
            .candidates()
            .into_iter()
            .map(|(layer, path)| {
                let status = if !path.is_file() {
                    SourceStatus::Missing
                } else {
                    match load_config_file(&path) {
                        Ok(layer_config) => {
                            config.merge(layer_config);
                            SourceStatus::Loaded
                        }
                        Err(e) => {
                            warn!(
                                layer = %layer,
                                path = %path.display(),
                                error = %e,
                                "Skipping invalid config file"
                            );
                            SourceStatus::Invalid(e.to_string())
                        }
                    }
                };
                ConfigSource {
                    layer,
                    path,
                    status,
                }
            })
            .collect();

        LoadedConfig { config, sources }
    }
}

/// Discover config from the default locations.
pub fn load_config() -> LoadedConfig {
    Discovery::new().load()
}

/// Parse a single config file.
pub fn load_config_file(path: &Path) -> Result<BoilerbrainConfig> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    BoilerbrainConfig::from_toml(&text)
}

/// `BOILERBRAIN_CONFIG_DIR` when set and non-empty, else the platform config
/// directory.
pub fn user_config_dir() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|base| base.join(APP_NAME)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn discover(user: &TempDir, project: &TempDir) -> LoadedConfig {
        Discovery::new()
            .config_dir(Some(user.path()))
            .project_dir(Some(project.path()))
            .load()
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let err = load_config_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_no_files_means_defaults() {
        let (user, project) = (TempDir::new().unwrap(), TempDir::new().unwrap());

        let loaded = discover(&user, &project);
        assert_eq!(loaded.config, BoilerbrainConfig::default());
        assert!(loaded.loaded_from().is_empty());
        assert_eq!(loaded.sources.len(), 2);
        assert!(loaded.sources.iter().all(|s| s.status == SourceStatus::Missing));
    }

    #[test]
    fn test_project_layer_wins() {
        let (user, project) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        fs::write(
            user.path().join("config.toml"),
            "[session]\nmax_sessions = 200\n\n[query]\nmax_retries = 5\n",
        )
        .unwrap();
        fs::write(
            project.path().join("boilerbrain.toml"),
            "[session]\nmax_sessions = 20\n",
        )
        .unwrap();

        let loaded = discover(&user, &project);
        assert_eq!(loaded.config.session().max_sessions, 20);
        assert_eq!(loaded.config.query().max_retries, 5);

        let paths = loaded.loaded_from();
        assert_eq!(paths.len(), 2);
        assert!(paths[1].ends_with("boilerbrain.toml"));
        assert_eq!(loaded.sources[0].layer, Layer::User);
    }

    #[test]
    fn test_bad_layer_is_skipped_and_reported() {
        let (user, project) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        fs::write(user.path().join("config.toml"), "[query]\nmax_retries = 7\n").unwrap();
        fs::write(project.path().join("boilerbrain.toml"), "[session\nbroken").unwrap();

        let loaded = discover(&user, &project);
        assert_eq!(loaded.config.query().max_retries, 7);
        assert!(matches!(loaded.sources[1].status, SourceStatus::Invalid(_)));

        let warnings = loaded.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("ignored project config"));
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_bad_layer_is_logged_at_discovery() {
        let (user, project) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        fs::write(user.path().join("config.toml"), "not = [valid").unwrap();

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let loaded = tracing::subscriber::with_default(subscriber, || discover(&user, &project));
        assert!(matches!(loaded.sources[0].status, SourceStatus::Invalid(_)));

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Skipping invalid config file"));
        assert!(output.contains("layer=user"));
    }
}
