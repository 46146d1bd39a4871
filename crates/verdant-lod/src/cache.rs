//! Bounded store for surfaces released by split nodes.
//!
//! When a split completes the parent's surface is no longer drawn, but a
//! later merge would need it again. Keeping the most recent few avoids a
//! rebuild when the focal point doubles back.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use verdant_terrain::HeightSurface;

use crate::node::NodeId;

pub(crate) struct SurfaceCache {
    capacity: usize,
    order: VecDeque<NodeId>,
    surfaces: FxHashMap<NodeId, HeightSurface>,
}

impl SurfaceCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            surfaces: FxHashMap::default(),
        }
    }

    /// Store a surface, evicting the oldest entries beyond capacity.
    pub(crate) fn insert(&mut self, id: NodeId, surface: HeightSurface) {
        if self.capacity == 0 {
            return;
        }
        if self.surfaces.insert(id, surface).is_some() {
            self.order.retain(|queued| *queued != id);
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.surfaces.remove(&evicted);
            }
        }
    }

    pub(crate) fn take(&mut self, id: &NodeId) -> Option<HeightSurface> {
        let surface = self.surfaces.remove(id)?;
        self.order.retain(|queued| queued != id);
        Some(surface)
    }

    pub(crate) fn remove(&mut self, id: &NodeId) {
        if self.surfaces.remove(id).is_some() {
            self.order.retain(|queued| queued != id);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.surfaces.len()
    }
}
