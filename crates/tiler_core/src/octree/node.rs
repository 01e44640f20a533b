//! Octree nodes and the finished partition.

use super::cell::CellKey;
use super::partitioner::PartitionStats;
use crate::bounds::BoundingBox;
use crate::point_store::{PointStore, StoreId};

/// Index of a node inside a [`PartitionedOctree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
  pub const ROOT: Self = Self(0);

  #[inline]
  pub fn index(self) -> usize {
    self.0 as usize
  }
}

/// One cell of the octree.
///
/// When `children` is set the eight child boxes tile `bounds` exactly and
/// every point below belongs to exactly one of them. Only leaves own a
/// store; internal nodes hold counts and bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct OctreeNode {
  pub key: CellKey,
  pub bounds: BoundingBox,
  /// Points accepted in this subtree.
  pub point_count: u64,
  /// Child nodes indexed by octant.
  pub children: Option<[NodeId; 8]>,
  /// Backing store, for leaves that received points.
  pub store: Option<StoreId>,
}

impl OctreeNode {
  pub fn new(key: CellKey, bounds: BoundingBox) -> Self {
    Self {
      key,
      bounds,
      point_count: 0,
      children: None,
      store: None,
    }
  }

  #[inline]
  pub fn depth(&self) -> u32 {
    self.key.depth
  }

  #[inline]
  pub fn is_leaf(&self) -> bool {
    self.children.is_none()
  }
}

/// Result of a partitioning pass: the node arena plus closed leaf stores.
#[derive(Clone, Debug)]
pub struct PartitionedOctree {
  pub(crate) nodes: Vec<OctreeNode>,
  pub(crate) stores: Vec<PointStore>,
  pub(crate) stats: PartitionStats,
}

impl PartitionedOctree {
  pub fn root(&self) -> &OctreeNode {
    &self.nodes[0]
  }

  pub fn node(&self, id: NodeId) -> &OctreeNode {
    &self.nodes[id.index()]
  }

  /// Total nodes, internal ones included.
  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.root().point_count == 0
  }

  pub fn nodes(&self) -> &[OctreeNode] {
    &self.nodes
  }

  /// Leaf nodes in arena order.
  pub fn leaves(&self) -> impl Iterator<Item = &OctreeNode> + '_ {
    self.nodes.iter().filter(|n| n.is_leaf())
  }

  /// Closed store of a leaf, if it received any point.
  pub fn store(&self, node: &OctreeNode) -> Option<&PointStore> {
    node.store.map(|id| &self.stores[id.0 as usize])
  }

  pub fn stats(&self) -> &PartitionStats {
    &self.stats
  }

  /// Delete every store file.
  pub fn remove_stores(self) -> Result<(), crate::error::TilerError> {
    for store in self.stores {
      store.remove()?;
    }
    Ok(())
  }
}
