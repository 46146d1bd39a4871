//! Distance-based split thresholds with merge hysteresis.

use crate::error::LodError;

/// Split distance per quadtree depth.
///
/// `radii[d]` is the distance from the focal point to a depth-`d` node's
/// center below which that node should be split. There is one entry per
/// splittable depth, so the table has `max_depth` entries.
#[derive(Clone, Debug, PartialEq)]
pub struct LodThresholds {
    radii: Vec<f64>,
}

impl LodThresholds {
    /// Derive thresholds from node sizes: a node of edge length `s` splits
    /// when the focal point is closer than `s * split_ratio` to its center.
    pub fn from_split_ratio(min_size: f64, max_depth: u8, split_ratio: f64) -> Result<Self, LodError> {
        if !split_ratio.is_finite() || split_ratio <= 0.0 {
            return Err(LodError::InvalidSplitRatio(split_ratio));
        }
        let radii = (0..max_depth)
            .map(|depth| node_size(min_size, max_depth, depth) * split_ratio)
            .collect();
        Self::custom(radii, max_depth)
    }

    /// Use an explicit table, one radius per splittable depth.
    pub fn custom(radii: Vec<f64>, max_depth: u8) -> Result<Self, LodError> {
        if radii.len() != max_depth as usize {
            return Err(LodError::ThresholdCount {
                expected: max_depth as usize,
                got: radii.len(),
            });
        }
        for (depth, &value) in radii.iter().enumerate() {
            if !value.is_finite() || value <= 0.0 {
                return Err(LodError::InvalidThreshold {
                    depth: depth as u8,
                    value,
                });
            }
        }
        Ok(Self { radii })
    }

    /// Deepest depth the table can split to.
    pub fn max_depth(&self) -> u8 {
        self.radii.len() as u8
    }

    /// Split radius at `depth`, or `None` for leaf-only depths.
    pub fn radius(&self, depth: u8) -> Option<f64> {
        self.radii.get(depth as usize).copied()
    }

    pub fn radii(&self) -> &[f64] {
        &self.radii
    }

    /// Whether a node at `depth` whose center is `distance_sq` (squared)
    /// from the focal point should split.
    pub fn wants_split(&self, depth: u8, distance_sq: f64) -> bool {
        self.radius(depth).is_some_and(|r| distance_sq < r * r)
    }

    /// Whether an already split node stays split. The radius is widened by
    /// `hysteresis` (a fraction) so nodes near the boundary do not flap.
    pub fn keeps_split(&self, depth: u8, distance_sq: f64, hysteresis: f64) -> bool {
        self.radius(depth).is_some_and(|r| {
            let widened = r * (1.0 + hysteresis);
            distance_sq < widened * widened
        })
    }

    /// Depth the refinement reaches for a node center at `distance`, when
    /// every ancestor center is at the same distance.
    pub fn select_depth(&self, distance: f64) -> u8 {
        debug_assert!(distance >= 0.0, "distance must be non-negative");
        for (depth, &radius) in self.radii.iter().enumerate() {
            if distance >= radius {
                return depth as u8;
            }
        }
        self.max_depth()
    }
}

/// Edge length of a node at `depth` in a tree whose deepest nodes are
/// `min_size` wide.
pub fn node_size(min_size: f64, max_depth: u8, depth: u8) -> f64 {
    min_size * (1u64 << (max_depth - depth.min(max_depth))) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_thresholds() -> LodThresholds {
        LodThresholds::from_split_ratio(64.0, 4, 1.3).unwrap()
    }

    /// Radii shrink by half per depth, scaled by the split ratio.
    #[test]
    fn test_radii_follow_node_sizes() {
        let t = default_thresholds();
        let expected = [1024.0 * 1.3, 512.0 * 1.3, 256.0 * 1.3, 128.0 * 1.3];
        assert_eq!(t.radii(), &expected);
        assert_eq!(t.max_depth(), 4);
        assert_eq!(t.radius(4), None, "the deepest level never splits");
    }

    /// The focal point sitting on a node center always splits it.
    #[test]
    fn test_zero_distance_selects_max_depth() {
        let t = default_thresholds();
        assert_eq!(t.select_depth(0.0), 4);
    }

    /// Beyond the root radius nothing is refined.
    #[test]
    fn test_far_distance_selects_root() {
        let t = default_thresholds();
        assert_eq!(t.select_depth(100_000.0), 0);
        assert_eq!(t.select_depth(f64::MAX), 0);
    }

    /// Distances exactly at a radius do not split.
    #[test]
    fn test_threshold_boundary_behavior() {
        let t = default_thresholds();
        let r0 = t.radius(0).unwrap();
        assert!(t.wants_split(0, (r0 - 0.001) * (r0 - 0.001)));
        assert!(!t.wants_split(0, r0 * r0));
        assert_eq!(t.select_depth(r0), 0);
        assert_eq!(t.select_depth(r0 - 0.001), 1);
    }

    /// An existing split survives slightly past the split radius.
    #[test]
    fn test_hysteresis_keeps_split_past_radius() {
        let t = default_thresholds();
        let r = t.radius(1).unwrap();
        let just_outside = (r * 1.05) * (r * 1.05);
        assert!(!t.wants_split(1, just_outside));
        assert!(t.keeps_split(1, just_outside, 0.1));
        assert!(!t.keeps_split(1, (r * 1.2) * (r * 1.2), 0.1));
    }

    #[test]
    fn test_custom_table_must_match_depth() {
        assert!(matches!(
            LodThresholds::custom(vec![100.0, 50.0], 3),
            Err(LodError::ThresholdCount { expected: 3, got: 2 })
        ));
    }

    #[test]
    fn test_custom_rejects_non_positive() {
        assert!(matches!(
            LodThresholds::custom(vec![100.0, 0.0], 2),
            Err(LodError::InvalidThreshold { depth: 1, .. })
        ));
        assert!(matches!(
            LodThresholds::custom(vec![f64::NAN], 1),
            Err(LodError::InvalidThreshold { depth: 0, .. })
        ));
    }

    #[test]
    fn test_bad_split_ratio_rejected() {
        assert!(matches!(
            LodThresholds::from_split_ratio(64.0, 4, -1.0),
            Err(LodError::InvalidSplitRatio(_))
        ));
    }

    #[test]
    fn test_node_size() {
        assert_eq!(node_size(64.0, 4, 0), 1024.0);
        assert_eq!(node_size(64.0, 4, 4), 64.0);
    }
}
