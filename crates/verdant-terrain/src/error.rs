//! Terrain error types.

/// Errors raised while validating an [`ElevationConfig`](crate::ElevationConfig).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ElevationConfigError {
    /// A floating-point parameter is NaN or infinite.
    #[error("elevation parameter `{name}` must be finite, got {value}")]
    NonFinite {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// A parameter that must be strictly positive is zero or negative.
    #[error("elevation parameter `{name}` must be positive, got {value}")]
    NotPositive {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// `max_iterations` is zero.
    #[error("max_iterations must be at least 1")]
    NoIterations,

    /// Explicit octave offsets do not cover every octave.
    #[error("{provided} octave offsets provided but max_iterations is {required}")]
    MissingOffsets {
        /// Number of offsets supplied.
        provided: usize,
        /// Number of offsets required.
        required: u32,
    },
}

/// Errors raised while sampling a [`HeightSurface`](crate::HeightSurface).
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    /// The elevation field produced NaN or infinity for a grid sample.
    #[error("non-finite elevation sampled at ({x}, {z})")]
    NonFiniteSample {
        /// World X of the sample.
        x: f64,
        /// World Z of the sample.
        z: f64,
    },

    /// The grid has an odd or zero subdivision count.
    #[error("surface subdivisions must be even and at least 2, got {0}")]
    InvalidSubdivisions(u32),

    /// A background build worker could not be started.
    #[error("failed to spawn surface build worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}
