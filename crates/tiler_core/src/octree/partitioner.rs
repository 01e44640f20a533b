//! Single-pass streaming partitioner.
//!
//! ```text
//!   point ──▶ decimate ──▶ clamp into root ──▶ descend ──▶ leaf store
//!             1 of every   (counted, logged)   split on
//!             ceil(100/r)                      first visit
//! ```
//!
//! A leaf splits the first time a point reaches it while its depth is below
//! `max_depth` and its longest axis exceeds `min_cell_size`. Splitting always
//! creates all eight children, so leaves tile the root without gaps. Points
//! are written straight to the leaf they land in; nothing is held in memory
//! above the leaf level.

use std::path::PathBuf;

use glam::DVec3;
use serde::Serialize;

use super::cell::CellKey;
use super::node::{NodeId, OctreeNode, PartitionedOctree};
use crate::bounds::BoundingBox;
use crate::config::OctreeSettings;
use crate::error::TilerError;
use crate::point_store::StoreRegistry;
use crate::types::{height_color, PointRecord, RawPoint};

/// Clamped points reported individually before switching to a summary.
const CLAMP_WARNINGS: u64 = 8;

/// Counters from one partitioning pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PartitionStats {
  /// Points read from the source.
  pub seen: u64,
  /// Points kept by decimation and written to a leaf.
  pub accepted: u64,
  /// Accepted points that lay outside the root box and were clamped.
  pub clamped: u64,
  /// Leaves holding at least one point.
  pub leaves: usize,
  /// Store writers closed early to stay under the open-handle limit.
  pub evictions: usize,
}

/// Keeps one point out of every `ceil(100 / percent)` seen.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Decimator {
  factor: u64,
  count: u64,
}

impl Decimator {
  pub fn new(sampling_percent: u8) -> Self {
    let percent = sampling_percent.clamp(1, 100) as u64;
    Self {
      factor: 100u64.div_ceil(percent),
      count: 0,
    }
  }

  #[inline]
  pub fn accept(&mut self) -> bool {
    let keep = self.count % self.factor == 0;
    self.count += 1;
    keep
  }
}

/// Streams points into an octree rooted at a fixed box.
pub struct OctreePartitioner {
  nodes: Vec<OctreeNode>,
  settings: OctreeSettings,
  decimator: Decimator,
  registry: StoreRegistry,
  stats: PartitionStats,
}

impl OctreePartitioner {
  /// Start a partition of `root_bounds`, staging leaf stores in `store_dir`
  /// (created if missing).
  pub fn new(
    root_bounds: BoundingBox,
    settings: &OctreeSettings,
    store_dir: impl Into<PathBuf>,
  ) -> Result<Self, TilerError> {
    if root_bounds.is_empty() {
      return Err(TilerError::PartitionInvariant("root bounding box is empty".into()));
    }
    let store_dir = store_dir.into();
    std::fs::create_dir_all(&store_dir)
      .map_err(|e| TilerError::io_at("creating store directory", &store_dir, e))?;

    Ok(Self {
      nodes: vec![OctreeNode::new(CellKey::ROOT, root_bounds)],
      settings: settings.clone(),
      decimator: Decimator::new(settings.sampling_percent),
      registry: StoreRegistry::new(store_dir, settings.max_open_stores),
      stats: PartitionStats::default(),
    })
  }

  pub fn root_bounds(&self) -> &BoundingBox {
    &self.nodes[0].bounds
  }

  pub fn stats(&self) -> &PartitionStats {
    &self.stats
  }

  #[inline]
  fn can_split(&self, node: &OctreeNode) -> bool {
    node.depth() < self.settings.max_depth && node.bounds.max_extent() > self.settings.min_cell_size
  }

  fn split(&mut self, id: NodeId) -> [NodeId; 8] {
    let parent = &self.nodes[id.index()];
    let (key, bounds) = (parent.key, parent.bounds);
    let first = self.nodes.len() as u32;
    for octant in 0u8..8 {
      self
        .nodes
        .push(OctreeNode::new(key.get_child(octant), bounds.octant(octant)));
    }
    let children = std::array::from_fn(|octant| NodeId(first + octant as u32));
    self.nodes[id.index()].children = Some(children);
    children
  }

  /// Feed one point. Returns whether decimation kept it.
  ///
  /// Points outside the root box are clamped onto it, never dropped.
  pub fn push(&mut self, point: RawPoint) -> Result<bool, TilerError> {
    self.stats.seen += 1;
    if !self.decimator.accept() {
      return Ok(false);
    }
    if !point.position.is_finite() {
      return Err(TilerError::PartitionInvariant(format!(
        "point {} has a non-finite position {:?}",
        self.stats.seen - 1,
        point.position
      )));
    }

    let root = self.nodes[0].bounds;
    let mut position = point.position;
    if !root.contains_point(position) {
      position = root.clamp_point(position);
      self.stats.clamped += 1;
      if self.stats.clamped <= CLAMP_WARNINGS {
        tracing::warn!(
          "point {:?} outside root bounds, clamped to {:?}",
          point.position,
          position
        );
      }
    }
    let color = point.color.unwrap_or_else(|| height_color(position.z, &root));

    let leaf = self.descend(position);
    let store = match self.nodes[leaf.index()].store {
      Some(store) => store,
      None => {
        let name = self.nodes[leaf.index()].key.address();
        let store = self.registry.create(&name)?;
        self.nodes[leaf.index()].store = Some(store);
        store
      }
    };
    self.registry.write(store, &PointRecord::new(position, color))?;
    self.stats.accepted += 1;
    Ok(true)
  }

  /// Walk from the root to the leaf containing `position`, splitting and
  /// counting along the way. Ties on a split plane go to the lower half.
  fn descend(&mut self, position: DVec3) -> NodeId {
    let mut id = NodeId::ROOT;
    loop {
      self.nodes[id.index()].point_count += 1;
      let children = match self.nodes[id.index()].children {
        Some(children) => children,
        None => {
          if !self.can_split(&self.nodes[id.index()]) {
            return id;
          }
          self.split(id)
        }
      };
      let octant = self.nodes[id.index()].bounds.octant_of(position);
      id = children[octant as usize];
    }
  }

  /// Close every store and return the finished tree.
  pub fn finish(self) -> Result<PartitionedOctree, TilerError> {
    let mut stats = self.stats;
    stats.leaves = self.nodes.iter().filter(|n| n.store.is_some()).count();
    stats.evictions = self.registry.evictions();
    let stores = self.registry.finish()?;

    if stats.clamped > CLAMP_WARNINGS {
      tracing::warn!("{} points outside root bounds were clamped", stats.clamped);
    }
    tracing::debug!(
      "partitioned {} of {} points into {} leaves ({} nodes, {} store evictions)",
      stats.accepted,
      stats.seen,
      stats.leaves,
      self.nodes.len(),
      stats.evictions
    );

    Ok(PartitionedOctree {
      nodes: self.nodes,
      stores,
      stats,
    })
  }
}

#[cfg(test)]
#[path = "partitioner_test.rs"]
mod partitioner_test;
