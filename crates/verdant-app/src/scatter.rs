//! Prop placement on streamed chunks.
//!
//! Consumes the chunk tree's events: once a final chunk has its surface,
//! a deterministic set of props is scattered over it; the props go away
//! when the chunk stops being final or is destroyed. Placement uses a
//! per-chunk RNG so a chunk that streams back in gets the same props.

use std::collections::HashMap;

use glam::DVec3;
use rand::Rng;
use tracing::{debug, trace};
use verdant_lod::{ChunkEvent, ChunkNode, ChunkTree, NodeId};
use verdant_terrain::{ElevationField, chunk_rng};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prop {
    pub position: DVec3,
    /// Rotation around the vertical axis, radians.
    pub yaw: f32,
    pub scale: f32,
}

#[derive(Clone, Debug)]
pub struct ScatterSettings {
    pub seed: u64,
    pub attempts_per_chunk: u32,
    pub max_slope: f64,
    pub slope_delta: f64,
    pub min_depth: u8,
}

pub struct PropScatterer {
    settings: ScatterSettings,
    props: HashMap<NodeId, Vec<Prop>>,
}

impl PropScatterer {
    pub fn new(settings: ScatterSettings) -> Self {
        Self {
            settings,
            props: HashMap::new(),
        }
    }

    /// Bring the prop set in line with the tree after a tick.
    pub fn apply(&mut self, tree: &ChunkTree, events: &[ChunkEvent]) {
        if events.is_empty() {
            return;
        }
        for event in events {
            if let ChunkEvent::Destroyed(id) = event {
                if self.props.remove(id).is_some() {
                    trace!(node = %id, "props removed with chunk");
                }
            }
        }

        self.props
            .retain(|id, _| tree.node(*id).is_some_and(|n| n.is_final()));

        let min_depth = self.settings.min_depth;
        let mut fresh: Vec<&ChunkNode> = tree
            .final_nodes()
            .filter(|n| n.depth() >= min_depth && n.has_surface())
            .filter(|n| !self.props.contains_key(&n.id()))
            .collect();
        fresh.sort_unstable_by_key(|n| n.id());
        for node in fresh {
            let props = scatter(node, tree.field(), &self.settings);
            debug!(node = %node.id(), count = props.len(), "props scattered");
            self.props.insert(node.id(), props);
        }
    }

    pub fn props(&self, id: NodeId) -> Option<&[Prop]> {
        self.props.get(&id).map(Vec::as_slice)
    }

    /// Chunks currently holding props.
    pub fn chunk_count(&self) -> usize {
        self.props.len()
    }

    pub fn prop_count(&self) -> usize {
        self.props.values().map(Vec::len).sum()
    }
}

/// Scatter props over one chunk. Deterministic in the world seed and the
/// chunk id.
pub fn scatter(node: &ChunkNode, field: &ElevationField, settings: &ScatterSettings) -> Vec<Prop> {
    let mut rng = chunk_rng(settings.seed, &node.id());
    let bounds = node.bounds();
    let mut props = Vec::new();
    for _ in 0..settings.attempts_per_chunk {
        let x = rng.random_range(bounds.min.x..bounds.max.x);
        let z = rng.random_range(bounds.min.y..bounds.max.y);
        let yaw = rng.random_range(0.0..std::f32::consts::TAU);
        let scale = rng.random_range(0.8f32..1.2);

        let Some(height) = node.elevation_at(x, z) else {
            continue;
        };
        let slope = surface_slope(node, x, z, settings.slope_delta).unwrap_or_else(|| {
            field.slope_at(x, z, field.config().max_iterations, settings.slope_delta)
        });
        if slope > settings.max_slope {
            continue;
        }
        props.push(Prop {
            position: DVec3::new(x, height, z),
            yaw,
            scale,
        });
    }
    props
}

/// Largest height difference between `(x, z)` and its four `delta`
/// neighbours on the chunk's surface, or `None` if a neighbour lies outside the chunk.
fn surface_slope(node: &ChunkNode, x: f64, z: f64, delta: f64) -> Option<f64> {
    let center = node.elevation_at(x, z)?;
    let neighbours = [
        node.elevation_at(x + delta, z)?,
        node.elevation_at(x - delta, z)?,
        node.elevation_at(x, z + delta)?,
        node.elevation_at(x, z - delta)?,
    ];
    Some(neighbours.iter().map(|h| (h - center).abs()).fold(0.0, f64::max))
}
