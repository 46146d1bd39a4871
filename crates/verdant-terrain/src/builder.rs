//! Incremental height surface construction.
//!
//! A [`SurfaceBuilder`] samples its grid (plus a one-sample overflow ring used
//! for border normals) a bounded number of samples at a time, so the chunk
//! tree can spread a build over several frames. The finished
//! [`HeightSurface`] is only produced once every sample has been taken.

use glam::DVec3;
use tracing::trace;

use crate::elevation::ElevationField;
use crate::error::SurfaceError;
use crate::surface::{HeightSurface, SurfaceGrid};

/// Outcome of one [`SurfaceBuilder::step`].
#[derive(Debug)]
pub enum BuildProgress {
    /// More samples remain.
    InProgress {
        /// Samples taken so far.
        done: usize,
        /// Samples required in total.
        total: usize,
    },
    /// Every sample has been taken.
    Complete(HeightSurface),
}

/// Resumable sampler for one surface.
pub struct SurfaceBuilder {
    grid: SurfaceGrid,
    iterations: u32,
    /// Samples including the overflow ring, row-major.
    samples: Vec<f64>,
    next: usize,
}

impl SurfaceBuilder {
    /// Create a builder for `grid` sampling `iterations` octaves.
    pub fn new(grid: SurfaceGrid, iterations: u32) -> Result<Self, SurfaceError> {
        if grid.subdivisions < 2 || grid.subdivisions % 2 != 0 {
            return Err(SurfaceError::InvalidSubdivisions(grid.subdivisions));
        }
        let ring = grid.side() + 2;
        Ok(Self {
            grid,
            iterations,
            samples: Vec::with_capacity(ring * ring),
            next: 0,
        })
    }

    /// Total samples this build takes, overflow ring included.
    pub fn total(&self) -> usize {
        let ring = self.grid.side() + 2;
        ring * ring
    }

    /// Samples taken so far.
    pub fn done(&self) -> usize {
        self.next
    }

    pub fn grid(&self) -> &SurfaceGrid {
        &self.grid
    }

    /// Take up to `*budget` samples, decrementing the budget by the number
    /// taken.
    pub fn step(
        &mut self,
        field: &ElevationField,
        budget: &mut usize,
    ) -> Result<BuildProgress, SurfaceError> {
        let ring = self.grid.side() + 2;
        let total = ring * ring;

        while *budget > 0 && self.next < total {
            let i = (self.next % ring) as i64 - 1;
            let j = (self.next / ring) as i64 - 1;
            let x = self.grid.sample_x(i);
            let z = self.grid.sample_z(j);
            let h = field.elevation(x, z, self.iterations);
            if !h.is_finite() {
                return Err(SurfaceError::NonFiniteSample { x, z });
            }
            self.samples.push(h);
            self.next += 1;
            *budget -= 1;
        }

        if self.next < total {
            trace!(done = self.next, total, "surface build step");
            return Ok(BuildProgress::InProgress {
                done: self.next,
                total,
            });
        }

        Ok(BuildProgress::Complete(self.finish()))
    }

    /// Bake interior elevations and normals from the full ring-extended grid.
    fn finish(&mut self) -> HeightSurface {
        let ring = self.grid.side() + 2;
        let side = self.grid.side();
        let samples = std::mem::take(&mut self.samples);
        let at = |i: usize, j: usize| samples[j * ring + i];
        let twice_step = 2.0 * self.grid.step();

        let mut elevations = Vec::with_capacity(side * side);
        let mut normals = Vec::with_capacity(side * side);
        for j in 1..=side {
            for i in 1..=side {
                elevations.push(at(i, j));
                let dx = at(i + 1, j) - at(i - 1, j);
                let dz = at(i, j + 1) - at(i, j - 1);
                normals.push(DVec3::new(-dx, twice_step, -dz).normalize());
            }
        }

        HeightSurface::from_parts(self.grid, elevations, normals)
    }
}

/// Build a surface in one call.
pub fn build_surface(
    field: &ElevationField,
    grid: SurfaceGrid,
    iterations: u32,
) -> Result<HeightSurface, SurfaceError> {
    let mut builder = SurfaceBuilder::new(grid, iterations)?;
    let mut budget = usize::MAX;
    match builder.step(field, &mut budget)? {
        BuildProgress::Complete(surface) => Ok(surface),
        BuildProgress::InProgress { .. } => unreachable!("unbounded budget always completes"),
    }
}
