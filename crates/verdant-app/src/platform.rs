//! OS directory resolution for config, data, cache and logs.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("could not determine OS configuration directory")]
    NoConfigDir,
    #[error("platform I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Where the driver keeps its files, following OS conventions (XDG on
/// Linux, Known Folders on Windows, Library on macOS).
#[derive(Debug, Clone)]
pub struct PlatformDirs {
    /// Holds `config.ron`.
    pub config_dir: PathBuf,
    /// Persistent data.
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    /// JSON log files.
    pub log_dir: PathBuf,
}

const APP_NAME: &str = "verdant";

impl PlatformDirs {
    /// Resolve platform-specific directories without creating them on disk.
    pub fn resolve() -> Result<Self, PlatformError> {
        let config_base = dirs::config_dir().ok_or(PlatformError::NoConfigDir)?;
        let app_config = config_base.join(APP_NAME);

        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| app_config.clone())
            .join(APP_NAME);
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| app_config.clone())
            .join(APP_NAME);

        Ok(Self {
            config_dir: app_config.clone(),
            data_dir,
            cache_dir,
            log_dir: app_config.join("logs"),
        })
    }

    /// Directories under an explicit root, e.g. from `--config`.
    pub fn resolve_with_root(root: &Path) -> Self {
        Self {
            config_dir: root.to_path_buf(),
            data_dir: root.join("data"),
            cache_dir: root.join("cache"),
            log_dir: root.join("logs"),
        }
    }

    /// `--config` when given, the OS locations otherwise.
    pub fn from_override(root: Option<&Path>) -> Result<Self, PlatformError> {
        match root {
            Some(root) => Ok(Self::resolve_with_root(root)),
            None => Self::resolve(),
        }
    }

    /// Create every directory on disk.
    pub fn create_dirs(&self) -> Result<(), PlatformError> {
        for dir in [&self.config_dir, &self.data_dir, &self.cache_dir, &self.log_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
