//! Procedural terrain: multi-octave elevation field, lattice-aligned height
//! surfaces, and frame-sliced or threaded surface construction.

mod async_build;
mod builder;
mod elevation;
mod error;
mod seed;
mod surface;

pub use async_build::{AsyncSurfaceBuilder, BuiltSurface, SurfaceTask};
pub use builder::{BuildProgress, SurfaceBuilder, build_surface};
pub use elevation::{ElevationConfig, ElevationField, OFFSET_RANGE, seeded_offsets};
pub use error::{ElevationConfigError, SurfaceError};
pub use seed::{chunk_rng, derive_chunk_seed};
pub use surface::{Bounds, HeightSurface, SurfaceGrid, SurfaceTexture};
