use thiserror::Error;
use verdant_config::ConfigError;
use verdant_lod::LodError;
use verdant_terrain::ElevationConfigError;

use crate::platform::PlatformError;

/// Errors that stop the streamer before or while it runs.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid terrain settings: {0}")]
    Terrain(#[from] ElevationConfigError),

    #[error("invalid chunk settings: {0}")]
    Lod(#[from] LodError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),
}
