//! Streaming quadtree level of detail over a procedural height field:
//! distance-based split thresholds, a balanced chunk tree with neighbour
//! links, and budgeted surface building.

mod cache;
mod config;
mod error;
mod events;
mod node;
mod priority_queue;
mod scheduler;
mod selector;
mod shape;
mod tree;

pub use config::{BuildMode, MAX_DEPTH_LIMIT, MAX_LATTICE_EXTENT, StreamingConfig};
pub use error::LodError;
pub use events::ChunkEvent;
pub use node::{ChunkNode, Direction, NodeId, NodeState};
pub use selector::{LodThresholds, node_size};
pub use tree::{ChunkTree, SurroundingNodes, TreeStats};
