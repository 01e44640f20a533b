//! tiler_core - out-of-core tiling engine for streamed 3D content
//!
//! Converts arbitrarily large meshes and point clouds into a spatially
//! partitioned, multi-resolution tile hierarchy while keeping the working set
//! bounded regardless of input size.
//!
//! # Features
//!
//! - **Vertex Welding**: attribute-aware deduplication over a spatial hash
//! - **Half-Edge Mesh**: index-arena topology supporting edge collapse
//! - **LOD Reduction**: priority-queue edge collapse producing discrete levels
//! - **Octree Partitioning**: single streaming pass over point data with
//!   deterministic lower-half tie-breaking
//! - **Point Store**: fixed-size binary records staged on disk per leaf cell
//! - **Tile Pipeline**: per-node state machine, bounded worker pool and
//!   bottom-up merge
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tiler_core::{InMemoryPoints, TilePipeline, TileSource, TilerConfig};
//!
//! let mut pipeline = TilePipeline::new(Arc::new(TilerConfig::default()), writer)?;
//! let output = pipeline.build_tile(TileSource::Points(Box::new(source)))?;
//!
//! if let Some(root) = &output.root {
//!     println!("root {:?}, {} nodes written", root.state, output.report.nodes_written);
//! }
//! ```

pub mod bounds;
pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used items
pub use bounds::BoundingBox;
pub use config::{BoundaryProtection, LodSettings, OctreeSettings, TilerConfig};
pub use error::TilerError;
pub use types::{Color, Face, Mesh, PointRecord, RawPoint, Vertex};

// Attribute-aware vertex welding
pub mod weld;
pub use weld::{weld, WeldFlags, WeldOutput};

// Arena-based half-edge topology
pub mod half_edge;
pub use half_edge::{BuildReport, CollapseRejection, FaceId, HalfEdgeId, HalfEdgeMesh, VertexId};

// Progressive triangle reduction
pub mod lod;
pub use lod::{
  generate_lods, reduce, reduced, LodLevel, ReduceOptions, ReductionStats, ReductionTarget,
};

// Out-of-core staging of point records
pub mod point_store;
pub use point_store::{PointStore, PointStoreReader, PointStoreWriter, StoreId, StoreRegistry};

// Octree partitioning over streamed points
pub mod octree;
pub use octree::{
  partition, CellKey, NodeId, OctreeNode, OctreePartitioner, PartitionStats, PartitionedOctree,
};

// Bounded worker pool
pub mod threading;
pub use threading::{TaskExecutor, TaskId};

// Tile pipeline orchestration
pub mod pipeline;
pub use pipeline::{
  merge_tiles, BuildOutput, ContentRef, InMemoryPoints, InMemoryScene, PointSource, Refine,
  SceneSource, TileContent, TileEvent, TileInfo, TileNode, TilePipeline, TileSource, TileState,
  TileWriter, Transition,
};

// Run summaries
pub mod report;
pub use report::{NodeFailure, RunReport};

#[cfg(test)]
pub(crate) mod test_utils;
