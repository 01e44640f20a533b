//! Tile pipeline: sources in, tile trees out.
//!
//! Following the stage pattern: Prepare → Dispatch → Join
//!
//! - Prepare: the root node loads its source and runs weld + reduction
//!   (meshes) or octree partitioning (points), yielding a plan of tile nodes.
//! - Dispatch: every node is loaded and written by one pool worker.
//! - Join: as children settle, parents aggregate bounds and write their
//!   refinement metadata, bottom-up.

mod merge;
mod orchestrator;
mod source;
mod state;
mod tile;
mod writer;

pub use merge::merge_tiles;
pub use orchestrator::{BuildOutput, TilePipeline};
pub use source::{InMemoryPoints, InMemoryScene, PointSource, SceneSource, TileSource};
pub use state::{TileEvent, TileState, Transition};
pub use tile::{ContentRef, Refine, TileContent, TileInfo, TileNode};
pub use writer::TileWriter;
