//! Tuning for the chunk tree.

use crate::error::LodError;
use crate::selector::LodThresholds;

/// Deepest `max_depth` accepted; keeps node strides well inside `i64`.
pub const MAX_DEPTH_LIMIT: u8 = 24;

/// Lattice steps from the origin that focal points and queries may reach.
/// Keeps lattice indices exact in `f64` and far from `i64` overflow.
pub const MAX_LATTICE_EXTENT: f64 = (1u64 << 50) as f64;

/// Where surface sampling runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// Sample on the update thread, spreading each build across ticks
    /// under a per-tick sample budget.
    #[default]
    Cooperative,
    /// Sample whole surfaces on a worker pool. `workers == 0` picks a count
    /// from the number of CPUs.
    Threaded { workers: usize },
}

/// Streaming and refinement parameters.
#[derive(Clone, Debug)]
pub struct StreamingConfig {
    /// Edge length of the deepest (smallest) nodes, world units.
    pub min_size: f64,
    /// Depth of the smallest nodes. Roots are `min_size * 2^max_depth` wide.
    pub max_depth: u8,
    /// Split radius per depth as a multiple of node size. Ignored when
    /// `split_thresholds` is set.
    pub split_ratio: f64,
    /// Explicit split radius per splittable depth.
    pub split_thresholds: Option<Vec<f64>>,
    /// Roots whose bounds come within this distance of the focal point are
    /// kept alive.
    pub render_distance: f64,
    /// Grid cells per node edge; every node samples `subdivisions + 1`
    /// points per side.
    pub subdivisions: u32,
    /// Octaves sampled per surface. `None` uses the field's maximum.
    pub iterations: Option<u32>,
    /// Elevation samples the cooperative builder may take per tick.
    pub samples_per_tick: usize,
    /// Builds in progress at once.
    pub max_concurrent_builds: usize,
    /// Ticks a node must wait before reversing its last split or merge.
    pub min_dwell_ticks: u64,
    /// Fraction by which the split radius widens before an existing split
    /// is merged back.
    pub merge_hysteresis: f64,
    /// Released parent surfaces kept for quick merges.
    pub surface_cache_capacity: usize,
    pub build_mode: BuildMode,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            min_size: 64.0,
            max_depth: 4,
            split_ratio: 1.3,
            split_thresholds: None,
            render_distance: 1500.0,
            subdivisions: 32,
            iterations: None,
            samples_per_tick: 8192,
            max_concurrent_builds: 4,
            min_dwell_ticks: 10,
            merge_hysteresis: 0.1,
            surface_cache_capacity: 32,
            build_mode: BuildMode::Cooperative,
        }
    }
}

impl StreamingConfig {
    /// Check every field and build the split table.
    pub fn thresholds(&self) -> Result<LodThresholds, LodError> {
        if !self.min_size.is_finite() || self.min_size <= 0.0 {
            return Err(LodError::InvalidMinSize(self.min_size));
        }
        if self.max_depth > MAX_DEPTH_LIMIT {
            return Err(LodError::DepthTooLarge(self.max_depth));
        }
        if self.subdivisions < 2 || self.subdivisions % 2 != 0 {
            return Err(LodError::InvalidSubdivisions(self.subdivisions));
        }
        if !self.render_distance.is_finite()
            || self.render_distance <= 0.0
            || self.render_distance > self.world_extent() / 2.0
        {
            return Err(LodError::InvalidRenderDistance(self.render_distance));
        }
        if !self.merge_hysteresis.is_finite() || self.merge_hysteresis < 0.0 {
            return Err(LodError::InvalidHysteresis(self.merge_hysteresis));
        }
        if self.samples_per_tick == 0 {
            return Err(LodError::ZeroBudget("samples_per_tick"));
        }
        if self.max_concurrent_builds == 0 {
            return Err(LodError::ZeroBudget("max_concurrent_builds"));
        }
        match &self.split_thresholds {
            Some(radii) => LodThresholds::custom(radii.clone(), self.max_depth),
            None => LodThresholds::from_split_ratio(self.min_size, self.max_depth, self.split_ratio),
        }
    }

    /// Distance between adjacent samples of the deepest nodes.
    pub fn lattice_spacing(&self) -> f64 {
        self.min_size / self.subdivisions as f64
    }

    /// Largest `|x|` or `|z|` the tree streams around. Focal points beyond
    /// it are ignored and queries beyond it find nothing.
    pub fn world_extent(&self) -> f64 {
        self.lattice_spacing() * MAX_LATTICE_EXTENT
    }

    /// Edge length of a root node.
    pub fn root_size(&self) -> f64 {
        crate::selector::node_size(self.min_size, self.max_depth, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = StreamingConfig::default();
        let thresholds = config.thresholds().unwrap();
        assert_eq!(thresholds.max_depth(), 4);
        assert_eq!(config.root_size(), 1024.0);
        assert_eq!(config.lattice_spacing(), 2.0);
    }

    #[test]
    fn test_odd_subdivisions_rejected() {
        let config = StreamingConfig {
            subdivisions: 15,
            ..Default::default()
        };
        assert!(matches!(
            config.thresholds(),
            Err(LodError::InvalidSubdivisions(15))
        ));
    }

    #[test]
    fn test_zero_budgets_rejected() {
        let config = StreamingConfig {
            samples_per_tick: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.thresholds(),
            Err(LodError::ZeroBudget("samples_per_tick"))
        ));
        let config = StreamingConfig {
            max_concurrent_builds: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.thresholds(),
            Err(LodError::ZeroBudget("max_concurrent_builds"))
        ));
    }

    #[test]
    fn test_explicit_thresholds_used() {
        let config = StreamingConfig {
            max_depth: 2,
            split_thresholds: Some(vec![500.0, 200.0]),
            ..Default::default()
        };
        assert_eq!(config.thresholds().unwrap().radii(), &[500.0, 200.0]);
    }

    #[test]
    fn test_bad_geometry_rejected() {
        let bad_size = StreamingConfig {
            min_size: 0.0,
            ..Default::default()
        };
        assert!(matches!(bad_size.thresholds(), Err(LodError::InvalidMinSize(_))));

        let too_deep = StreamingConfig {
            max_depth: 40,
            ..Default::default()
        };
        assert!(matches!(too_deep.thresholds(), Err(LodError::DepthTooLarge(40))));

        let no_view = StreamingConfig {
            render_distance: f64::INFINITY,
            ..Default::default()
        };
        assert!(matches!(
            no_view.thresholds(),
            Err(LodError::InvalidRenderDistance(_))
        ));

        let past_the_world = StreamingConfig {
            render_distance: 1.0e300,
            ..Default::default()
        };
        assert!(matches!(
            past_the_world.thresholds(),
            Err(LodError::InvalidRenderDistance(_))
        ));
    }

    #[test]
    fn test_world_extent_scales_with_lattice() {
        let config = StreamingConfig::default();
        assert_eq!(config.world_extent(), 2.0 * MAX_LATTICE_EXTENT);
        assert!(config.world_extent() / config.lattice_spacing() < i64::MAX as f64 / 1024.0);
    }
}
