//! The refinement the tree is converging toward.
//!
//! Each tick the focal point determines which nodes should be split: the
//! distance rule (with hysteresis for nodes already split), followed by a
//! balancing pass that splits any leaf more than one level coarser than a
//! leaf across its edge.

use glam::DVec2;
use rustc_hash::FxHashSet;

use crate::node::{Direction, NodeId};
use crate::selector::LodThresholds;

pub(crate) struct TargetShape {
    roots: FxHashSet<NodeId>,
    split: FxHashSet<NodeId>,
}

impl TargetShape {
    /// `center_of` gives a node's center; `currently_split` reports whether
    /// the live tree already has the node split, which widens its radius.
    pub(crate) fn compute(
        roots: &[NodeId],
        focal: DVec2,
        thresholds: &LodThresholds,
        hysteresis: f64,
        center_of: impl Fn(NodeId) -> DVec2,
        currently_split: impl Fn(NodeId) -> bool,
    ) -> Self {
        let mut shape = Self {
            roots: roots.iter().copied().collect(),
            split: FxHashSet::default(),
        };

        let mut stack: Vec<NodeId> = roots.to_vec();
        while let Some(id) = stack.pop() {
            let distance_sq = center_of(id).distance_squared(focal);
            let split = thresholds.wants_split(id.depth, distance_sq)
                || (currently_split(id) && thresholds.keeps_split(id.depth, distance_sq, hysteresis));
            if split {
                shape.split.insert(id);
                stack.extend(id.children());
            }
        }

        shape.balance();
        shape
    }

    /// Split coarse leaves until no two edge-adjacent leaves differ by more
    /// than one depth. Splits only ever get added, so this terminates.
    fn balance(&mut self) {
        loop {
            let mut forced: Vec<NodeId> = Vec::new();
            for leaf in self.leaves() {
                if leaf.depth < 2 {
                    continue;
                }
                for direction in Direction::ALL {
                    if let Some(cover) = self.leaf_covering(leaf.adjacent(direction))
                        && cover.depth + 1 < leaf.depth
                    {
                        forced.push(cover);
                    }
                }
            }
            if forced.is_empty() {
                break;
            }
            self.split.extend(forced);
        }
    }

    pub(crate) fn is_split(&self, id: NodeId) -> bool {
        self.split.contains(&id)
    }

    /// Whether `id` is part of the target tree (its root is kept and every
    /// ancestor is split).
    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.roots.contains(&id.root_id())
            && (0..id.depth).all(|depth| self.split.contains(&id.ancestor_at(depth)))
    }

    /// The target leaf that contains `cell`, or `cell` itself if it is
    /// still split. `None` when its root is not kept.
    pub(crate) fn leaf_covering(&self, cell: NodeId) -> Option<NodeId> {
        let mut current = cell.root_id();
        if !self.roots.contains(&current) {
            return None;
        }
        while current.depth < cell.depth && self.split.contains(&current) {
            current = cell.ancestor_at(current.depth + 1);
        }
        Some(current)
    }

    /// Target leaves in depth-first order from the sorted roots.
    pub(crate) fn leaves(&self) -> Vec<NodeId> {
        let mut roots: Vec<NodeId> = self.roots.iter().copied().collect();
        roots.sort_unstable();
        let mut leaves = Vec::new();
        let mut stack: Vec<NodeId> = roots.into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            if self.split.contains(&id) {
                stack.extend(id.children().into_iter().rev());
            } else {
                leaves.push(id);
            }
        }
        leaves
    }
}
