//! Sampled height grids over a chunk's bounds.
//!
//! Every sample coordinate is derived from one global integer lattice, so two
//! chunks that touch the same physical point compute the same `f64`
//! coordinate and therefore the same height. A coarse chunk's edge samples
//! are a subset of the samples a finer neighbour takes along that edge.

use glam::{DVec2, DVec3};

/// Axis-aligned rectangle on the XZ plane. The `y` component of `min`/`max`
/// holds world Z.
///
/// Invariant: `min.x <= max.x` and `min.y <= max.y`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: DVec2,
    pub max: DVec2,
}

impl Bounds {
    /// Create bounds from two corners, sorting components.
    pub fn new(a: DVec2, b: DVec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Returns true if `(x, z)` lies inside or on the boundary.
    pub fn contains(&self, x: f64, z: f64) -> bool {
        x >= self.min.x && x <= self.max.x && z >= self.min.y && z <= self.max.y
    }

    /// Squared distance from `point` to the closest point of the rectangle
    /// (zero inside).
    pub fn distance_squared_to(&self, point: DVec2) -> f64 {
        let clamped = point.clamp(self.min, self.max);
        point.distance_squared(clamped)
    }

    /// Returns true if the circle around `center` overlaps the rectangle.
    pub fn intersects_circle(&self, center: DVec2, radius: f64) -> bool {
        self.distance_squared_to(center) <= radius * radius
    }

    /// Returns true if the interiors of the two rectangles overlap
    /// (touching edges do not count).
    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> DVec2 {
        self.max - self.min
    }

    pub fn area(&self) -> f64 {
        let size = self.size();
        size.x * size.y
    }
}

/// Placement of a surface's samples on the global lattice.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceGrid {
    /// Lattice index of the first sample along X.
    pub origin_x: i64,
    /// Lattice index of the first sample along Z.
    pub origin_z: i64,
    /// Lattice points between consecutive samples.
    pub stride: i64,
    /// Quads per side; the grid holds `subdivisions + 1` samples per side.
    pub subdivisions: u32,
    /// World units between consecutive lattice points.
    pub spacing: f64,
}

impl SurfaceGrid {
    /// World coordinate of a lattice index.
    #[inline]
    pub fn coordinate(&self, lattice: i64) -> f64 {
        lattice as f64 * self.spacing
    }

    /// World X of sample column `i` (may be outside `0..=subdivisions` for
    /// the overflow ring).
    #[inline]
    pub fn sample_x(&self, i: i64) -> f64 {
        self.coordinate(self.origin_x + i * self.stride)
    }

    /// World Z of sample row `j`.
    #[inline]
    pub fn sample_z(&self, j: i64) -> f64 {
        self.coordinate(self.origin_z + j * self.stride)
    }

    /// Samples per side.
    pub fn side(&self) -> usize {
        self.subdivisions as usize + 1
    }

    /// Total samples in the grid.
    pub fn sample_count(&self) -> usize {
        self.side() * self.side()
    }

    /// World distance between neighbouring samples.
    pub fn step(&self) -> f64 {
        self.stride as f64 * self.spacing
    }

    /// Bounds spanned by the first and last samples.
    pub fn bounds(&self) -> Bounds {
        let n = self.subdivisions as i64;
        Bounds {
            min: DVec2::new(self.sample_x(0), self.sample_z(0)),
            max: DVec2::new(self.sample_x(n), self.sample_z(n)),
        }
    }

    /// Locate `value` along one axis: the index of the lower enclosing sample
    /// and the fractional position towards the next one.
    ///
    /// `t` is exactly `0.0` or `1.0` when `value` is itself a lattice sample,
    /// which makes interpolation return the stored sample unchanged.
    fn locate(&self, value: f64, origin: i64) -> (usize, f64) {
        let n = self.subdivisions as i64;
        let start = self.coordinate(origin);
        let f = ((value - start) / self.step()).clamp(0.0, n as f64);

        let nearest = f.round() as i64;
        if self.coordinate(origin + nearest * self.stride) == value {
            return if nearest == n {
                ((n - 1) as usize, 1.0)
            } else {
                (nearest as usize, 0.0)
            };
        }

        let lower = (f.floor() as i64).min(n - 1);
        (lower as usize, f - lower as f64)
    }
}

/// Baked RGBA float texture: `[normal.x, normal.y, normal.z, elevation]` per
/// sample, row-major with Z as the row axis.
#[derive(Clone, Debug)]
pub struct SurfaceTexture {
    size: usize,
    texels: Vec<[f32; 4]>,
}

impl SurfaceTexture {
    pub(crate) fn new(size: usize, texels: Vec<[f32; 4]>) -> Self {
        debug_assert_eq!(texels.len(), size * size);
        Self { size, texels }
    }

    /// Texels per side.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Texel at column `i`, row `j`.
    pub fn texel(&self, i: usize, j: usize) -> [f32; 4] {
        self.texels[j * self.size + i]
    }

    /// Raw texel data, e.g. for upload.
    pub fn texels(&self) -> &[[f32; 4]] {
        &self.texels
    }
}

/// A fully built, immutable height grid for one chunk.
#[derive(Clone, Debug)]
pub struct HeightSurface {
    grid: SurfaceGrid,
    bounds: Bounds,
    elevations: Vec<f64>,
    normals: Vec<DVec3>,
    texture: SurfaceTexture,
    min_elevation: f64,
    max_elevation: f64,
}

impl HeightSurface {
    pub(crate) fn from_parts(grid: SurfaceGrid, elevations: Vec<f64>, normals: Vec<DVec3>) -> Self {
        debug_assert_eq!(elevations.len(), grid.sample_count());
        debug_assert_eq!(normals.len(), grid.sample_count());

        let (min_elevation, max_elevation) = elevations
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &h| {
                (lo.min(h), hi.max(h))
            });

        let texels = elevations
            .iter()
            .zip(&normals)
            .map(|(&h, n)| [n.x as f32, n.y as f32, n.z as f32, h as f32])
            .collect();

        Self {
            bounds: grid.bounds(),
            texture: SurfaceTexture::new(grid.side(), texels),
            grid,
            elevations,
            normals,
            min_elevation,
            max_elevation,
        }
    }

    /// Elevation at world `(x, z)`, or `None` outside the surface bounds.
    ///
    /// Lattice sample coordinates return the stored sample; anything else is
    /// bilinearly interpolated between the four enclosing samples.
    pub fn elevation_at(&self, x: f64, z: f64) -> Option<f64> {
        if !self.bounds.contains(x, z) {
            return None;
        }

        let (i, tx) = self.grid.locate(x, self.grid.origin_x);
        let (j, tz) = self.grid.locate(z, self.grid.origin_z);

        let h00 = self.sample(i, j);
        let h10 = self.sample(i + 1, j);
        let h01 = self.sample(i, j + 1);
        let h11 = self.sample(i + 1, j + 1);

        let near = h00 * (1.0 - tx) + h10 * tx;
        let far = h01 * (1.0 - tx) + h11 * tx;
        Some(near * (1.0 - tz) + far * tz)
    }

    /// Stored sample at column `i`, row `j`.
    pub fn sample(&self, i: usize, j: usize) -> f64 {
        self.elevations[j * self.grid.side() + i]
    }

    /// Unit surface normal at column `i`, row `j`.
    pub fn normal_at(&self, i: usize, j: usize) -> DVec3 {
        self.normals[j * self.grid.side() + i]
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn grid(&self) -> &SurfaceGrid {
        &self.grid
    }

    pub fn subdivisions(&self) -> u32 {
        self.grid.subdivisions
    }

    pub fn texture(&self) -> &SurfaceTexture {
        &self.texture
    }

    /// Lowest sampled elevation.
    pub fn min_elevation(&self) -> f64 {
        self.min_elevation
    }

    /// Highest sampled elevation.
    pub fn max_elevation(&self) -> f64 {
        self.max_elevation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_surface;
    use crate::elevation::{ElevationConfig, ElevationField};

    fn field() -> ElevationField {
        ElevationField::new(ElevationConfig {
            seed: 7,
            ..ElevationConfig::default()
        })
        .unwrap()
    }

    fn grid(origin_x: i64, origin_z: i64, stride: i64) -> SurfaceGrid {
        SurfaceGrid {
            origin_x,
            origin_z,
            stride,
            subdivisions: 8,
            spacing: 1.6,
        }
    }

    #[test]
    fn test_bounds_follow_lattice() {
        let g = grid(16, -8, 2);
        let b = g.bounds();
        assert_eq!(b.min, DVec2::new(16.0 * 1.6, -8.0 * 1.6));
        assert_eq!(b.max, DVec2::new(32.0 * 1.6, 8.0 * 1.6));
        assert_eq!(g.sample_count(), 81);
    }

    #[test]
    fn test_samples_match_field_exactly() {
        let f = field();
        let g = grid(0, 0, 4);
        let surface = build_surface(&f, g, 6).unwrap();
        for j in 0..=8 {
            for i in 0..=8 {
                let x = g.sample_x(i);
                let z = g.sample_z(j);
                let expected = f.elevation(x, z, 6);
                assert_eq!(surface.sample(i as usize, j as usize).to_bits(), expected.to_bits());
                assert_eq!(
                    surface.elevation_at(x, z).map(f64::to_bits),
                    Some(expected.to_bits()),
                    "grid sample ({i}, {j}) must come back unchanged"
                );
            }
        }
    }

    #[test]
    fn test_outside_bounds_returns_none() {
        let surface = build_surface(&field(), grid(0, 0, 1), 6).unwrap();
        let b = surface.bounds();
        assert!(surface.elevation_at(b.min.x - 0.001, b.min.y).is_none());
        assert!(surface.elevation_at(b.max.x + 0.001, b.max.y).is_none());
        assert!(surface.elevation_at(b.center().x, b.max.y + 10.0).is_none());
        assert!(surface.elevation_at(b.max.x, b.max.y).is_some());
    }

    #[test]
    fn test_bilinear_between_samples() {
        let surface = build_surface(&field(), grid(0, 0, 2), 6).unwrap();
        let g = *surface.grid();
        let x = (g.sample_x(2) + g.sample_x(3)) * 0.5;
        let z = g.sample_z(5);
        let expected = (surface.sample(2, 5) + surface.sample(3, 5)) * 0.5;
        let actual = surface.elevation_at(x, z).unwrap();
        assert!((actual - expected).abs() < 1e-9, "{actual} vs {expected}");

        let cx = (g.sample_x(0) + g.sample_x(1)) * 0.5;
        let cz = (g.sample_z(0) + g.sample_z(1)) * 0.5;
        let average = (surface.sample(0, 0)
            + surface.sample(1, 0)
            + surface.sample(0, 1)
            + surface.sample(1, 1))
            * 0.25;
        assert!((surface.elevation_at(cx, cz).unwrap() - average).abs() < 1e-9);
    }

    #[test]
    fn test_coarse_edge_is_subset_of_fine_edge() {
        let f = field();
        // Coarse grid covers lattice [0, 32] with stride 4; the fine grid to
        // its east covers [32, 48] with stride 2.
        let coarse = build_surface(&f, grid(0, 0, 4), 6).unwrap();
        let fine = build_surface(&f, grid(32, 0, 2), 6).unwrap();
        let edge_x = coarse.bounds().max.x;
        assert_eq!(edge_x, fine.bounds().min.x);

        for j in 0..=4 {
            let z = coarse.grid().sample_z(j);
            let a = coarse.elevation_at(edge_x, z).unwrap();
            let b = fine.elevation_at(edge_x, z).unwrap();
            assert_eq!(a.to_bits(), b.to_bits(), "seam mismatch at z={z}");
        }
    }

    #[test]
    fn test_texture_matches_samples() {
        let surface = build_surface(&field(), grid(0, 0, 1), 6).unwrap();
        let texture = surface.texture();
        assert_eq!(texture.size(), 9);
        let texel = texture.texel(3, 4);
        assert_eq!(texel[3], surface.sample(3, 4) as f32);
        let normal = surface.normal_at(3, 4);
        assert!((normal.length() - 1.0).abs() < 1e-9);
        assert!(normal.y > 0.0, "normals must point up");
    }

    #[test]
    fn test_min_max_elevation() {
        let surface = build_surface(&field(), grid(0, 0, 8), 6).unwrap();
        for j in 0..=8 {
            for i in 0..=8 {
                let h = surface.sample(i, j);
                assert!(h >= surface.min_elevation() && h <= surface.max_elevation());
            }
        }
    }

    #[test]
    fn test_bounds_helpers() {
        let b = Bounds::new(DVec2::new(10.0, 10.0), DVec2::new(0.0, 0.0));
        assert_eq!(b.min, DVec2::ZERO);
        assert_eq!(b.center(), DVec2::splat(5.0));
        assert_eq!(b.area(), 100.0);
        assert_eq!(b.distance_squared_to(DVec2::new(13.0, 14.0)), 25.0);
        assert!(b.intersects_circle(DVec2::new(13.0, 14.0), 5.0));
        assert!(!b.intersects_circle(DVec2::new(13.0, 14.0), 4.9));
        let right = Bounds::new(DVec2::new(10.0, 0.0), DVec2::new(20.0, 10.0));
        assert!(!b.overlaps(&right), "edge contact is not overlap");
        let shifted = Bounds::new(DVec2::new(9.0, 0.0), DVec2::new(20.0, 10.0));
        assert!(b.overlaps(&shifted));
    }
}
