//! Closest-first queue of pending surface builds.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;

use crate::node::NodeId;

#[derive(Clone, Debug)]
struct QueueEntry {
    id: NodeId,
    /// Squared distance from the focal point; smaller is served first.
    distance_sq: f64,
    /// Generation counter to skip entries superseded by a later push.
    generation: u64,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap yields the nearest entry; ties go to the
        // shallower node, then the smaller id, for a stable order.
        other
            .distance_sq
            .total_cmp(&self.distance_sq)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Queue of nodes waiting for a surface build, nearest first.
///
/// Pushing an id that is already queued replaces its priority.
#[derive(Default)]
pub(crate) struct BuildQueue {
    heap: BinaryHeap<QueueEntry>,
    /// Current generation and priority per queued id.
    entries: FxHashMap<NodeId, (u64, f64)>,
    next_generation: u64,
}

impl BuildQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert or update `id` with the given squared focal distance.
    pub(crate) fn push(&mut self, id: NodeId, distance_sq: f64) {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.entries.insert(id, (generation, distance_sq));
        self.heap.push(QueueEntry {
            id,
            distance_sq,
            generation,
        });
    }

    /// Remove and return the nearest queued id.
    pub(crate) fn pop(&mut self) -> Option<NodeId> {
        while let Some(entry) = self.heap.pop() {
            if let Some(&(current, _)) = self.entries.get(&entry.id)
                && current == entry.generation
            {
                self.entries.remove(&entry.id);
                return Some(entry.id);
            }
        }
        None
    }

    /// Drop `id` from the queue. Returns whether it was queued.
    pub(crate) fn remove(&mut self, id: &NodeId) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Recompute every priority, e.g. after the focal point moved.
    pub(crate) fn reprioritize(&mut self, mut distance_sq: impl FnMut(NodeId) -> f64) {
        let mut ids: Vec<NodeId> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        self.heap.clear();
        self.entries.clear();
        for id in ids {
            self.push(id, distance_sq(id));
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
