//! Errors raised while persisting the streamer's `config.ron`.

use std::path::PathBuf;

/// Failure to read, parse, or write the streamer config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file or directory could not be read.
    #[error("cannot read streamer config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file or its directory could not be written.
    #[error("cannot write streamer config at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not a valid streamer config.
    #[error("streamer config at {path} is not valid RON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },

    /// The in-memory config could not be rendered as RON.
    #[error("cannot encode streamer config as RON: {0}")]
    Encode(#[source] ron::Error),
}

impl ConfigError {
    /// Path of the file involved, when the failure touched the filesystem.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Read { path, .. } | Self::Write { path, .. } | Self::Parse { path, .. } => {
                Some(path)
            }
            Self::Encode(_) => None,
        }
    }
}
