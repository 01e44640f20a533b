//! Octree partitioning of streamed point data.
//!
//! ```text
//!                 root (depth 0)
//!        ┌──────┬──────┼──────┬──────┐
//!        0      1     ...     6      7        octant bits: +X | +Y<<1 | +Z<<2
//!     ┌──┴──┐
//!    0_0 .. 0_7                               address = octant path
//! ```
//!
//! Nodes live in an arena and are referenced by [`NodeId`]. Only leaves own
//! point data, staged on disk through the point store; internal nodes keep
//! their bounds and an aggregated count.

mod cell;
mod node;
mod partitioner;

use std::path::PathBuf;

pub use cell::CellKey;
pub use node::{NodeId, OctreeNode, PartitionedOctree};
pub use partitioner::{OctreePartitioner, PartitionStats};

use crate::config::OctreeSettings;
use crate::error::TilerError;
use crate::pipeline::PointSource;

/// Partition a whole point stream in one pass.
///
/// The header box becomes the root. Stores are written to `store_dir`; the
/// caller owns their cleanup (see [`PartitionedOctree::remove_stores`]).
///
/// Nodes split when the first point reaches them, always into all 8
/// children. Cells no point ever reaches stay unsplit leaves, so an empty
/// stream yields a lone root. Leaf bounds still cover the root either way.
pub fn partition(
  source: &mut dyn PointSource,
  settings: &OctreeSettings,
  store_dir: impl Into<PathBuf>,
) -> Result<PartitionedOctree, TilerError> {
  let root_bounds = source.read_header()?;
  tracing::debug!("partitioning '{}' inside {:?}", source.name(), root_bounds);

  let mut partitioner = OctreePartitioner::new(root_bounds, settings, store_dir)?;
  while let Some(point) = source.next_point()? {
    partitioner.push(point)?;
  }
  partitioner.finish()
}
