//! Quadtree node identity, adjacency directions and per-node state.

use std::fmt;

use glam::DVec2;
use verdant_terrain::{Bounds, HeightSurface, SurfaceGrid};

/// Stable identity of a quadtree cell.
///
/// `(x, z)` index the cell on the grid of its depth: the depth-`d` grid
/// tiles the plane with squares `min_size * 2^(max_depth - d)` wide, and
/// depth 0 cells are roots. Ids are derived from the cell path, so a node
/// destroyed and later recreated over the same area gets the same id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub depth: u8,
    pub x: i64,
    pub z: i64,
}

impl NodeId {
    pub const fn new(depth: u8, x: i64, z: i64) -> Self {
        Self { depth, x, z }
    }

    pub const fn root(x: i64, z: i64) -> Self {
        Self { depth: 0, x, z }
    }

    /// Parent cell, or `None` for roots.
    pub fn parent(&self) -> Option<NodeId> {
        (self.depth > 0).then(|| self.ancestor_at(self.depth - 1))
    }

    /// The ancestor (or self) at `depth`. `depth` must not exceed
    /// `self.depth`.
    pub fn ancestor_at(&self, depth: u8) -> NodeId {
        debug_assert!(depth <= self.depth, "ancestor must be shallower");
        let shift = self.depth - depth;
        // Arithmetic shift floors toward negative infinity.
        NodeId::new(depth, self.x >> shift, self.z >> shift)
    }

    pub fn root_id(&self) -> NodeId {
        self.ancestor_at(0)
    }

    /// Children in `[NW, NE, SW, SE]` order.
    pub fn children(&self) -> [NodeId; 4] {
        let (x, z, d) = (self.x * 2, self.z * 2, self.depth + 1);
        [
            NodeId::new(d, x, z),
            NodeId::new(d, x + 1, z),
            NodeId::new(d, x, z + 1),
            NodeId::new(d, x + 1, z + 1),
        ]
    }

    /// Position among the parent's children, matching [`children`](Self::children).
    pub fn child_index(&self) -> Option<usize> {
        (self.depth > 0).then(|| (self.x.rem_euclid(2) + 2 * self.z.rem_euclid(2)) as usize)
    }

    /// The same-depth cell across the edge in `direction`.
    pub fn adjacent(&self, direction: Direction) -> NodeId {
        let (dx, dz) = direction.offset();
        NodeId::new(self.depth, self.x + dx, self.z + dz)
    }

    /// Whether `other` is this cell or lies inside it.
    pub fn contains(&self, other: &NodeId) -> bool {
        other.depth >= self.depth && other.ancestor_at(self.depth) == *self
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.depth, self.x, self.z)
    }
}

/// Edge direction on the ground plane. North is -Z, east is +X.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Cell offset `(dx, dz)`.
    pub fn offset(self) -> (i64, i64) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Build lifecycle of a node.
///
/// `Pending -> Building -> Ready`, and `Ready -> Pending` when a merge
/// needs the surface rebuilt. `Destroyed` is the terminal state a node is
/// left in when it is removed from the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    Pending,
    Building,
    Ready,
    Destroyed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Transition {
    Split,
    Merge,
}

/// One square region of the terrain.
#[derive(Debug)]
pub struct ChunkNode {
    pub(crate) id: NodeId,
    pub(crate) grid: SurfaceGrid,
    pub(crate) bounds: Bounds,
    pub(crate) children: Option<[NodeId; 4]>,
    pub(crate) neighbours: [Option<NodeId>; 4],
    pub(crate) surface: Option<HeightSurface>,
    pub(crate) state: NodeState,
    pub(crate) is_final: bool,
    /// Drawn through its children this tick.
    pub(crate) expanded: bool,
    pub(crate) created_tick: u64,
    pub(crate) last_transition: Option<(Transition, u64)>,
}

impl ChunkNode {
    pub(crate) fn new(id: NodeId, grid: SurfaceGrid, tick: u64) -> Self {
        Self {
            id,
            grid,
            bounds: grid.bounds(),
            children: None,
            neighbours: [None; 4],
            surface: None,
            state: NodeState::Pending,
            is_final: false,
            expanded: false,
            created_tick: tick,
            last_transition: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn depth(&self) -> u8 {
        self.id.depth
    }

    /// World-space extent on the ground plane.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn center(&self) -> DVec2 {
        self.bounds.center()
    }

    /// Edge length in world units.
    pub fn size(&self) -> f64 {
        self.bounds.size().x
    }

    /// Lattice placement of the node's samples.
    pub fn grid(&self) -> &SurfaceGrid {
        &self.grid
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.id.parent()
    }

    pub fn children(&self) -> Option<[NodeId; 4]> {
        self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Adjacent node in `direction`: the deepest live node no deeper than
    /// this one that contains the same-depth cell across that edge.
    pub fn neighbour(&self, direction: Direction) -> Option<NodeId> {
        self.neighbours[direction.index()]
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    /// The surface has been built at least once and no rebuild is queued.
    pub fn is_ready(&self) -> bool {
        self.state == NodeState::Ready
    }

    /// Part of the frontier that should currently be drawn.
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// The node currently holds a height surface.
    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    pub fn surface(&self) -> Option<&HeightSurface> {
        self.surface.as_ref()
    }

    /// Tick on which the node was created.
    pub fn created_tick(&self) -> u64 {
        self.created_tick
    }

    /// Interpolated elevation at `(x, z)`, if the node holds a surface and
    /// the point lies within its bounds.
    pub fn elevation_at(&self, x: f64, z: f64) -> Option<f64> {
        self.surface.as_ref()?.elevation_at(x, z)
    }

    /// Whether a reverse of the last transition is allowed at `tick`.
    pub(crate) fn may_transition(&self, kind: Transition, tick: u64, min_dwell: u64) -> bool {
        match self.last_transition {
            Some((last, at)) if last != kind => tick.saturating_sub(at) >= min_dwell,
            _ => true,
        }
    }
}
