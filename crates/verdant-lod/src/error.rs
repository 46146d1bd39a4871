use thiserror::Error;
use verdant_terrain::SurfaceError;

/// Errors raised when a [`ChunkTree`](crate::ChunkTree) is configured.
#[derive(Debug, Error)]
pub enum LodError {
    #[error("min_size must be finite and > 0, got {0}")]
    InvalidMinSize(f64),

    #[error("max_depth {0} is too deep (limit is {limit})", limit = crate::config::MAX_DEPTH_LIMIT)]
    DepthTooLarge(u8),

    #[error("subdivisions must be even and >= 2, got {0}")]
    InvalidSubdivisions(u32),

    #[error("render_distance must be finite, > 0 and within half the world extent, got {0}")]
    InvalidRenderDistance(f64),

    #[error("split_ratio must be finite and > 0, got {0}")]
    InvalidSplitRatio(f64),

    #[error("expected {expected} split thresholds (one per splittable depth), got {got}")]
    ThresholdCount { expected: usize, got: usize },

    #[error("split threshold for depth {depth} must be finite and > 0, got {value}")]
    InvalidThreshold { depth: u8, value: f64 },

    #[error("merge_hysteresis must be finite and >= 0, got {0}")]
    InvalidHysteresis(f64),

    #[error("{0} must be at least 1")]
    ZeroBudget(&'static str),

    #[error("failed to start surface workers: {0}")]
    Surface(#[from] SurfaceError),
}
