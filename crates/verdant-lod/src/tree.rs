//! The streaming quadtree.
//!
//! [`ChunkTree`] keeps a forest of square roots around a moving focal
//! point and refines it so nodes near the focal point are small and nodes
//! far away are large. Each [`update`](ChunkTree::update):
//!
//! 1. adds roots that came within `render_distance` and destroys roots
//!    that left it;
//! 2. computes the target refinement for the focal point;
//! 3. splits and merges live nodes toward that target;
//! 4. advances surface builds;
//! 5. recomputes which nodes are final (drawn) and releases parent
//!    surfaces whose children took over.
//!
//! A split stays invisible until all four children are ready and the
//! regions across the parent's edges are drawn at least as deep as the
//! parent: the parent keeps its surface and remains final meanwhile. A
//! merge waits for the parent's surface (restored from cache or rebuilt)
//! and for its neighbours to come back within one level before the
//! children are destroyed. Final nodes therefore never overlap, and
//! edge-adjacent final nodes never differ by more than one level.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use glam::DVec2;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, trace, warn};
use verdant_terrain::{Bounds, ElevationField, SurfaceGrid};

use crate::cache::SurfaceCache;
use crate::config::StreamingConfig;
use crate::error::LodError;
use crate::events::{ChunkEvent, EventBus};
use crate::node::{ChunkNode, Direction, NodeId, NodeState, Transition};
use crate::scheduler::BuildScheduler;
use crate::selector::LodThresholds;
use crate::shape::TargetShape;

/// The nodes used to interpolate across a node edge at a point: the
/// deepest ready node plus its horizontal, vertical and diagonal
/// neighbours on the sides nearest the point.
#[derive(Clone, Copy, Debug)]
pub struct SurroundingNodes<'a> {
    pub primary: &'a ChunkNode,
    /// West or east neighbour, whichever side of `primary` is nearer.
    pub horizontal: Option<&'a ChunkNode>,
    /// North or south neighbour, whichever side is nearer.
    pub vertical: Option<&'a ChunkNode>,
    /// The node across the nearest corner.
    pub diagonal: Option<&'a ChunkNode>,
}

/// Snapshot counters for logging and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub tick: u64,
    pub roots: usize,
    pub live_nodes: usize,
    pub final_nodes: usize,
    /// Nodes currently holding a surface.
    pub surfaces: usize,
    pub queued_builds: usize,
    pub active_builds: usize,
    pub cached_surfaces: usize,
    pub deepest_level: u8,
}

pub struct ChunkTree {
    field: Arc<ElevationField>,
    config: StreamingConfig,
    thresholds: LodThresholds,
    nodes: FxHashMap<NodeId, ChunkNode>,
    roots: BTreeSet<NodeId>,
    scheduler: BuildScheduler,
    cache: SurfaceCache,
    events: EventBus,
    focal: DVec2,
    tick: u64,
    settled: bool,
}

impl ChunkTree {
    /// Create an empty tree. Nothing is built until the first
    /// [`update`](Self::update).
    pub fn new(field: Arc<ElevationField>, config: StreamingConfig) -> Result<Self, LodError> {
        let thresholds = config.thresholds()?;
        let max_iterations = field.config().max_iterations;
        let iterations = config.iterations.unwrap_or(max_iterations).min(max_iterations);
        let scheduler = BuildScheduler::new(
            Arc::clone(&field),
            config.build_mode,
            iterations,
            config.samples_per_tick,
            config.max_concurrent_builds,
        )?;

        info!(
            root_size = config.root_size(),
            max_depth = config.max_depth,
            subdivisions = config.subdivisions,
            render_distance = config.render_distance,
            mode = ?config.build_mode,
            "chunk tree created"
        );

        Ok(Self {
            cache: SurfaceCache::new(config.surface_cache_capacity),
            field,
            config,
            thresholds,
            nodes: FxHashMap::default(),
            roots: BTreeSet::new(),
            scheduler,
            events: EventBus::default(),
            focal: DVec2::ZERO,
            tick: 0,
            settled: false,
        })
    }

    /// Advance one tick toward the refinement for `focal` (world X, Z) and
    /// return the events the tick produced.
    ///
    /// A non-finite focal point is ignored and the previous one reused.
    pub fn update(&mut self, focal: DVec2) -> Vec<ChunkEvent> {
        self.tick += 1;
        let extent = self.config.world_extent();
        if !focal.is_finite() {
            warn!(x = focal.x, z = focal.y, "ignoring non-finite focal point");
        } else if focal.abs().max_element() > extent {
            warn!(x = focal.x, z = focal.y, extent, "ignoring focal point outside the world");
        } else {
            self.focal = focal;
        }

        self.sync_roots();
        let shape = self.target_shape();
        self.reconcile(&shape);
        self.run_builds();
        self.refresh_finals();
        self.release_covered_surfaces(&shape);
        self.reclaim_final_surfaces();
        self.settled = self.scheduler.is_idle() && self.matches(&shape);

        let events = self.events.publish();
        if !events.is_empty() {
            trace!(tick = self.tick, count = events.len(), "tick events");
        }
        events
    }

    /// A channel receiving each non-empty tick's event batch.
    pub fn subscribe(&mut self) -> Receiver<Vec<ChunkEvent>> {
        self.events.subscribe()
    }

    // ---- Queries ----

    pub fn node(&self, id: NodeId) -> Option<&ChunkNode> {
        self.nodes.get(&id)
    }

    /// The live node adjacent to `id` in `direction`.
    pub fn neighbour(&self, id: NodeId, direction: Direction) -> Option<&ChunkNode> {
        self.nodes
            .get(&id)?
            .neighbour(direction)
            .and_then(|n| self.nodes.get(&n))
    }

    /// Every live node, in no particular order.
    pub fn nodes(&self) -> impl Iterator<Item = &ChunkNode> {
        self.nodes.values()
    }

    /// Nodes that should currently be drawn.
    pub fn final_nodes(&self) -> impl Iterator<Item = &ChunkNode> {
        self.nodes.values().filter(|n| n.is_final)
    }

    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.roots.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn focal(&self) -> DVec2 {
        self.focal
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    pub fn thresholds(&self) -> &LodThresholds {
        &self.thresholds
    }

    pub fn field(&self) -> &Arc<ElevationField> {
        &self.field
    }

    /// The deepest node over `(x, z)` that holds a surface.
    pub fn deepest_node_at(&self, x: f64, z: f64) -> Option<&ChunkNode> {
        self.path_at(x, z).into_iter().rev().find(|n| n.has_surface())
    }

    /// The final node over `(x, z)`.
    pub fn final_node_at(&self, x: f64, z: f64) -> Option<&ChunkNode> {
        self.path_at(x, z).into_iter().find(|n| n.is_final)
    }

    /// Terrain height at `(x, z)` from the most detailed built surface, or
    /// `None` if nothing covering the point is built yet.
    pub fn elevation_for_position(&self, x: f64, z: f64) -> Option<f64> {
        self.deepest_node_at(x, z)?.elevation_at(x, z)
    }

    /// The deepest ready node at `(x, z)` with its nearest-side neighbours.
    pub fn surrounding_nodes(&self, x: f64, z: f64) -> Option<SurroundingNodes<'_>> {
        let primary = self.deepest_node_at(x, z)?;
        let bounds = primary.bounds();
        let size = bounds.size();
        let horizontal_dir = if (x - bounds.min.x) / size.x < 0.5 {
            Direction::West
        } else {
            Direction::East
        };
        let vertical_dir = if (z - bounds.min.y) / size.y < 0.5 {
            Direction::North
        } else {
            Direction::South
        };

        let lookup = |node: &ChunkNode, direction| {
            node.neighbour(direction).and_then(|id| self.nodes.get(&id))
        };
        let horizontal = lookup(primary, horizontal_dir);
        let vertical = lookup(primary, vertical_dir);
        let diagonal = horizontal
            .and_then(|h| lookup(h, vertical_dir))
            .or_else(|| vertical.and_then(|v| lookup(v, horizontal_dir)));

        Some(SurroundingNodes {
            primary,
            horizontal,
            vertical,
            diagonal,
        })
    }

    /// The live tree matches the refinement for the current focal point
    /// and no build is queued or running.
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    pub fn stats(&self) -> TreeStats {
        TreeStats {
            tick: self.tick,
            roots: self.roots.len(),
            live_nodes: self.nodes.len(),
            final_nodes: self.nodes.values().filter(|n| n.is_final).count(),
            surfaces: self.nodes.values().filter(|n| n.has_surface()).count(),
            queued_builds: self.scheduler.queued(),
            active_builds: self.scheduler.in_progress(),
            cached_surfaces: self.cache.len(),
            deepest_level: self.nodes.keys().map(|id| id.depth).max().unwrap_or(0),
        }
    }

    // ---- Geometry ----

    fn grid_for(&self, id: NodeId) -> SurfaceGrid {
        debug_assert!(id.depth <= self.config.max_depth);
        let stride = 1i64 << (self.config.max_depth - id.depth);
        let span = (self.config.subdivisions as i64).saturating_mul(stride);
        SurfaceGrid {
            origin_x: id.x.saturating_mul(span),
            origin_z: id.z.saturating_mul(span),
            stride,
            subdivisions: self.config.subdivisions,
            spacing: self.config.lattice_spacing(),
        }
    }

    fn bounds_of(&self, id: NodeId) -> Bounds {
        self.grid_for(id).bounds()
    }

    fn roots_in_range(&self) -> BTreeSet<NodeId> {
        let size = self.config.root_size();
        let radius = self.config.render_distance;
        let focal = self.focal;
        let low_x = (((focal.x - radius) / size).floor() as i64).saturating_sub(1);
        let high_x = (((focal.x + radius) / size).floor() as i64).saturating_add(1);
        let low_z = (((focal.y - radius) / size).floor() as i64).saturating_sub(1);
        let high_z = (((focal.y + radius) / size).floor() as i64).saturating_add(1);

        let mut roots = BTreeSet::new();
        for z in low_z..=high_z {
            for x in low_x..=high_x {
                let id = NodeId::root(x, z);
                if self.bounds_of(id).intersects_circle(focal, radius) {
                    roots.insert(id);
                }
            }
        }
        roots
    }

    /// The live root whose bounds contain `(x, z)`.
    fn root_at(&self, x: f64, z: f64) -> Option<&ChunkNode> {
        let size = self.config.root_size();
        let mut cx = (x / size).floor() as i64;
        let mut cz = (z / size).floor() as i64;
        // Division rounding can land one cell off near edges.
        let guess = self.bounds_of(NodeId::root(cx, cz));
        if x < guess.min.x {
            cx -= 1;
        } else if x >= guess.max.x {
            cx += 1;
        }
        if z < guess.min.y {
            cz -= 1;
        } else if z >= guess.max.y {
            cz += 1;
        }
        self.nodes
            .get(&NodeId::root(cx, cz))
            .filter(|root| root.bounds.contains(x, z))
    }

    /// Live nodes over `(x, z)` from the root down to the deepest.
    fn path_at(&self, x: f64, z: f64) -> Vec<&ChunkNode> {
        let mut path = Vec::new();
        let extent = self.config.world_extent();
        if !(x.abs() <= extent && z.abs() <= extent) {
            return path;
        }
        let Some(mut node) = self.root_at(x, z) else {
            return path;
        };
        loop {
            path.push(node);
            let Some(children) = node.children else { break };
            // The south-east child's min corner is the parent's lattice center.
            let Some(split) = self.nodes.get(&children[3]).map(|c| c.bounds.min) else {
                break;
            };
            let index = usize::from(x >= split.x) + 2 * usize::from(z >= split.y);
            match self.nodes.get(&children[index]) {
                Some(child) => node = child,
                None => break,
            }
        }
        path
    }

    // ---- Tick phases ----

    fn sync_roots(&mut self) {
        let wanted = self.roots_in_range();
        let stale: Vec<NodeId> = self.roots.difference(&wanted).copied().collect();
        let fresh: Vec<NodeId> = wanted.difference(&self.roots).copied().collect();

        for &root in &stale {
            self.destroy_subtree(root);
            self.roots.remove(&root);
        }
        for &root in &fresh {
            self.create_node(root);
            self.roots.insert(root);
        }
        for &root in stale.iter().chain(&fresh) {
            self.relink_around(root);
        }

        if !stale.is_empty() || !fresh.is_empty() {
            info!(
                added = fresh.len(),
                removed = stale.len(),
                roots = self.roots.len(),
                "root set changed"
            );
        }
    }

    fn target_shape(&self) -> TargetShape {
        let roots: Vec<NodeId> = self.roots.iter().copied().collect();
        TargetShape::compute(
            &roots,
            self.focal,
            &self.thresholds,
            self.config.merge_hysteresis,
            |id| self.bounds_of(id).center(),
            |id| self.nodes.get(&id).is_some_and(|n| n.children.is_some()),
        )
    }

    /// Split or merge live nodes toward `shape`, parents before children.
    fn reconcile(&mut self, shape: &TargetShape) {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            // Nodes under a target leaf are removed by that leaf's merge.
            if !shape.contains(id) {
                continue;
            }
            match (node.children.is_some(), shape.is_split(id)) {
                (false, true) => self.try_split(id),
                (true, false) => self.try_merge(id),
                (true, true) => self.abandon_merge(id),
                (false, false) => {}
            }
        }
    }

    fn try_split(&mut self, id: NodeId) {
        let (tick, dwell) = (self.tick, self.config.min_dwell_ticks);
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        if !node.is_ready() || !node.has_surface() || !node.may_transition(Transition::Split, tick, dwell) {
            return;
        }
        let children = id.children();
        node.children = Some(children);
        node.last_transition = Some((Transition::Split, tick));

        for child in children {
            self.create_node(child);
        }
        self.relink_around(id);
        debug!(node = %id, depth = id.depth, "split started");
    }

    fn try_merge(&mut self, id: NodeId) {
        let (tick, dwell) = (self.tick, self.config.min_dwell_ticks);
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        if !node.may_transition(Transition::Merge, tick, dwell) {
            return;
        }
        if self.reclaim_surface(id) && self.merge_keeps_balance(id) {
            self.collapse(id);
        }
    }

    /// Give `id` its surface back from the cache, or queue a rebuild.
    /// Returns whether the surface is there now.
    fn reclaim_surface(&mut self, id: NodeId) -> bool {
        let focal = self.focal;
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        if node.surface.is_some() {
            return true;
        }
        if node.state != NodeState::Ready {
            // Rebuild already queued or running.
            return false;
        }

        if let Some(surface) = self.cache.take(&id) {
            node.surface = Some(surface);
            self.events.emit(ChunkEvent::Ready(id));
            debug!(node = %id, "surface restored from cache");
            true
        } else {
            node.state = NodeState::Pending;
            let distance_sq = node.center().distance_squared(focal);
            self.scheduler.enqueue(id, distance_sq);
            debug!(node = %id, "surface rebuild queued");
            false
        }
    }

    /// Collapsing `id` must not leave it beside anything drawn two levels
    /// deeper: the same-depth cells across its edges may draw their
    /// children facing it, but not their grandchildren.
    fn merge_keeps_balance(&self, id: NodeId) -> bool {
        Direction::ALL.into_iter().all(|direction| {
            id.adjacent(direction)
                .children()
                .into_iter()
                .filter(|child| child.adjacent(direction.opposite()).parent() == Some(id))
                .all(|child| !self.nodes.get(&child).is_some_and(|n| n.expanded))
        })
    }

    /// The target wants `id` split again while its merge rebuild is still
    /// outstanding: drop the rebuild and keep the children.
    fn abandon_merge(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        // A final node still needs the surface being rebuilt.
        if node.state == NodeState::Ready || node.is_final {
            return;
        }
        node.state = NodeState::Ready;
        self.scheduler.cancel(id);
        debug!(node = %id, "merge abandoned");
    }

    /// Destroy the subtree below `id`, making it a leaf again.
    fn collapse(&mut self, id: NodeId) {
        let Some(children) = self.nodes.get(&id).and_then(|n| n.children) else {
            return;
        };
        for child in children {
            self.destroy_subtree(child);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.children = None;
            node.last_transition = Some((Transition::Merge, self.tick));
        }
        self.relink_around(id);
        debug!(node = %id, depth = id.depth, "merged");
    }

    fn run_builds(&mut self) {
        let focal = self.focal;
        let nodes = &self.nodes;
        self.scheduler.reprioritize(|id| {
            nodes
                .get(&id)
                .map_or(f64::MAX, |n| n.center().distance_squared(focal))
        });
        let outcome = self.scheduler.step(|id| nodes.get(&id).map(|n| n.grid));

        for id in outcome.started {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.state = NodeState::Building;
            }
        }
        for (id, surface) in outcome.completed {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.surface = Some(surface);
                node.state = NodeState::Ready;
                self.events.emit(ChunkEvent::Ready(id));
                trace!(node = %id, "surface ready");
            }
        }
        for id in outcome.failed {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.state = NodeState::Pending;
                let distance_sq = node.center().distance_squared(focal);
                self.scheduler.enqueue(id, distance_sq);
            }
        }
    }

    /// Hand the surface of every node drawn through its children to the
    /// cache.
    fn release_covered_surfaces(&mut self, shape: &TargetShape) {
        let mut holding: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.expanded && n.surface.is_some())
            .map(|n| n.id)
            .collect();
        holding.sort_unstable();

        for id in holding {
            // About to merge back; keep the surface it will need.
            if shape.contains(id) && !shape.is_split(id) {
                continue;
            }
            if let Some(surface) = self.nodes.get_mut(&id).and_then(|n| n.surface.take()) {
                self.cache.insert(id, surface);
                debug!(node = %id, "split complete, parent surface released");
            }
        }
    }

    /// A node that went back to being drawn after its surface was
    /// released needs that surface again.
    fn reclaim_final_surfaces(&mut self) {
        let mut bare: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.is_final && n.children.is_some() && n.surface.is_none())
            .map(|n| n.id)
            .collect();
        bare.sort_unstable();
        for id in bare {
            self.reclaim_surface(id);
        }
    }

    /// Whether `id`'s children fully cover it: each is ready or is itself
    /// split.
    fn children_cover(&self, id: NodeId) -> bool {
        let Some(children) = self.nodes.get(&id).and_then(|n| n.children) else {
            return false;
        };
        children.iter().all(|child| {
            self.nodes
                .get(child)
                .is_some_and(|c| c.is_ready() || c.children.is_some())
        })
    }

    /// Recompute which nodes are drawn. Walking the forest level by level,
    /// a node is drawn through its children when they cover it and every
    /// region across its edges is already drawn at its depth or deeper;
    /// otherwise it is final and nothing below it is drawn.
    fn refresh_finals(&mut self) {
        let mut expanded: FxHashSet<NodeId> = FxHashSet::default();
        let mut finals: FxHashSet<NodeId> = FxHashSet::default();
        let mut queue: VecDeque<NodeId> = self.roots.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            let hands_over = self.children_cover(id)
                && Direction::ALL
                    .into_iter()
                    .all(|direction| self.drawn_at_depth(id.adjacent(direction), &expanded));
            match node.children {
                Some(children) if hands_over => {
                    expanded.insert(id);
                    queue.extend(children);
                }
                _ => {
                    finals.insert(id);
                }
            }
        }
        for node in self.nodes.values_mut() {
            node.expanded = expanded.contains(&node.id);
            node.is_final = finals.contains(&node.id);
        }
    }

    /// Whether the region of `cell` is drawn at `cell`'s depth or deeper,
    /// given the nodes already known to be drawn through their children.
    /// Regions outside the kept roots draw nothing and never hold a node
    /// back.
    fn drawn_at_depth(&self, cell: NodeId, expanded: &FxHashSet<NodeId>) -> bool {
        match cell.parent() {
            None => true,
            Some(parent) => !self.roots.contains(&cell.root_id()) || expanded.contains(&parent),
        }
    }

    fn matches(&self, shape: &TargetShape) -> bool {
        self.nodes.values().all(|n| {
            shape.contains(n.id)
                && n.children.is_some() == shape.is_split(n.id)
                && n.is_ready()
                && (n.children.is_none() || n.surface.is_none())
        })
    }

    // ---- Node lifecycle ----

    fn create_node(&mut self, id: NodeId) {
        let node = ChunkNode::new(id, self.grid_for(id), self.tick);
        let distance_sq = node.center().distance_squared(self.focal);
        self.nodes.insert(id, node);
        self.scheduler.enqueue(id, distance_sq);
        self.events.emit(ChunkEvent::Created(id));
        trace!(node = %id, "node created");
    }

    /// Remove `id` and everything below it, children before parents.
    fn destroy_subtree(&mut self, id: NodeId) {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            order.push(current);
            if let Some(children) = self.nodes.get(&current).and_then(|n| n.children) {
                stack.extend(children);
            }
        }

        for current in order.into_iter().rev() {
            self.scheduler.cancel(current);
            self.cache.remove(&current);
            if let Some(mut node) = self.nodes.remove(&current) {
                let was = std::mem::replace(&mut node.state, NodeState::Destroyed);
                self.events.emit(ChunkEvent::Destroyed(current));
                trace!(node = %current, was = ?was, "node destroyed");
            }
        }
    }

    // ---- Adjacency ----

    /// Recompute neighbour links that a structural change at `id` can
    /// affect: `id`'s own subtree and the subtrees of the four same-depth
    /// cells around it.
    fn relink_around(&mut self, id: NodeId) {
        let mut affected = Vec::new();
        self.collect_subtree(id, &mut affected);
        for direction in Direction::ALL {
            self.collect_subtree(id.adjacent(direction), &mut affected);
        }
        for node_id in affected {
            let links = Direction::ALL.map(|d| self.deepest_live_containing(node_id.adjacent(d)));
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.neighbours = links;
            }
        }
    }

    fn collect_subtree(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                out.push(current);
                if let Some(children) = node.children {
                    stack.extend(children);
                }
            }
        }
    }

    /// Deepest live node no deeper than `cell` that contains it.
    fn deepest_live_containing(&self, cell: NodeId) -> Option<NodeId> {
        let mut current = cell.root_id();
        if !self.nodes.contains_key(&current) {
            return None;
        }
        while current.depth < cell.depth {
            let next = cell.ancestor_at(current.depth + 1);
            if !self.nodes.contains_key(&next) {
                break;
            }
            current = next;
        }
        Some(current)
    }
}
