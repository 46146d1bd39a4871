//! Water planes for streamed chunks that reach below sea level.
//!
//! Follows the tree like the prop scatterer: a final chunk with a surface
//! whose lowest sample lies under the water level gets a plane at that
//! level; the plane goes away when the chunk is destroyed or stops being
//! final.

use std::collections::HashMap;

use glam::DVec2;
use tracing::{debug, trace};
use verdant_lod::{ChunkEvent, ChunkNode, ChunkTree, NodeId};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaterPlane {
    pub center: DVec2,
    pub size: f64,
    pub level: f64,
    /// Deepest point of the chunk below the water level.
    pub depth: f64,
    /// The whole chunk lies under water.
    pub submerged: bool,
}

pub struct WaterPlanner {
    level: f64,
    planes: HashMap<NodeId, WaterPlane>,
    /// Final chunks already checked, flooded or not.
    checked: HashMap<NodeId, bool>,
}

impl WaterPlanner {
    pub fn new(level: f64) -> Self {
        Self {
            level,
            planes: HashMap::new(),
            checked: HashMap::new(),
        }
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    /// Bring the water planes in line with the tree after a tick.
    pub fn apply(&mut self, tree: &ChunkTree, events: &[ChunkEvent]) {
        if events.is_empty() {
            return;
        }
        for event in events {
            if let ChunkEvent::Destroyed(id) = event {
                self.checked.remove(id);
                if self.planes.remove(id).is_some() {
                    trace!(node = %id, "water removed with chunk");
                }
            }
        }

        let still_final = |id: &NodeId| tree.node(*id).is_some_and(|n| n.is_final());
        self.planes.retain(|id, _| still_final(id));
        self.checked.retain(|id, _| still_final(id));

        let mut fresh: Vec<&ChunkNode> = tree
            .final_nodes()
            .filter(|n| n.has_surface() && !self.checked.contains_key(&n.id()))
            .collect();
        fresh.sort_unstable_by_key(|n| n.id());
        for node in fresh {
            let plane = water_plane(node, self.level);
            self.checked.insert(node.id(), plane.is_some());
            if let Some(plane) = plane {
                debug!(node = %node.id(), depth = plane.depth, "water placed");
                self.planes.insert(node.id(), plane);
            }
        }
    }

    pub fn plane(&self, id: NodeId) -> Option<&WaterPlane> {
        self.planes.get(&id)
    }

    /// Chunks currently holding a water plane.
    pub fn flooded_count(&self) -> usize {
        self.planes.len()
    }
}

/// The water plane for one chunk, or `None` if its surface stays at or
/// above `level` everywhere (or it has no surface yet).
pub fn water_plane(node: &ChunkNode, level: f64) -> Option<WaterPlane> {
    let surface = node.surface()?;
    if surface.min_elevation() >= level {
        return None;
    }
    Some(WaterPlane {
        center: node.center(),
        size: node.size(),
        level,
        depth: level - surface.min_elevation(),
        submerged: surface.max_elevation() < level,
    })
}
