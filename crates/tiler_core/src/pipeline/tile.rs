//! Tile tree nodes.

use serde::Serialize;

use super::state::TileState;
use crate::bounds::BoundingBox;
use crate::types::{Mesh, PointRecord};

/// How a child refines its parent when both are visible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Refine {
  /// Children replace the parent (mesh LOD chains).
  Replace,
  /// Children add detail on top of the parent (point octrees).
  Add,
}

/// Content handed to the writer for one node.
#[derive(Clone, Debug, PartialEq)]
pub enum TileContent {
  /// One reduced mesh level.
  Mesh(Mesh),
  /// Points of one octree leaf, in store order.
  Points(Vec<PointRecord>),
  /// Internal node with nothing of its own to draw.
  Empty,
}

impl TileContent {
  /// Bounds of the content itself, unset when empty.
  pub fn bounds(&self) -> BoundingBox {
    match self {
      Self::Mesh(mesh) => mesh.bounds(),
      Self::Points(points) => BoundingBox::from_points(points.iter().map(|p| p.position)),
      Self::Empty => BoundingBox::EMPTY,
    }
  }

  pub fn summary(&self, level: u32) -> ContentRef {
    match self {
      Self::Mesh(mesh) => ContentRef::MeshLod {
        lod: level,
        triangles: mesh.triangle_count(),
      },
      Self::Points(points) => ContentRef::PointLeaf {
        points: points.len() as u64,
      },
      Self::Empty => ContentRef::None,
    }
  }
}

/// What a written node held, kept after the content itself is dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentRef {
  None,
  MeshLod { lod: u32, triangles: usize },
  PointLeaf { points: u64 },
}

/// Identity and metadata of a node, as the writer sees it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TileInfo {
  /// Hierarchical address: `"root"`, `"3"`, `"3_5"`.
  pub address: String,
  /// LOD index for mesh tiles, octree depth for point tiles.
  pub level: u32,
  pub bounds: BoundingBox,
  pub geometric_error: f64,
  pub refine: Refine,
  pub content: ContentRef,
}

impl TileInfo {
  /// Output path segments: every ancestor address then the node's own,
  /// e.g. `"3_5"` -> `["3", "3_5"]`, `"root"` -> `["root"]`.
  pub fn path_segments(&self) -> Vec<String> {
    if self.address == "root" {
      return vec![self.address.clone()];
    }
    let parts: Vec<&str> = self.address.split('_').collect();
    (1..=parts.len()).map(|n| parts[..n].join("_")).collect()
  }
}

/// A node of the finished tile tree.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TileNode {
  #[serde(flatten)]
  pub info: TileInfo,
  pub state: TileState,
  /// At least one descendant failed; bounds cover the successful part only.
  pub partial: bool,
  /// Why this node failed, when it did.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub failure: Option<String>,
  pub children: Vec<TileNode>,
}

impl TileNode {
  pub fn address(&self) -> &str {
    &self.info.address
  }

  pub fn is_failed(&self) -> bool {
    self.state == TileState::Failed
  }

  /// Nodes in depth-first pre-order.
  pub fn walk(&self) -> Vec<&TileNode> {
    let mut out = Vec::new();
    let mut stack = vec![self];
    while let Some(node) = stack.pop() {
      out.push(node);
      stack.extend(node.children.iter().rev());
    }
    out
  }

  /// Find a node by address.
  pub fn find(&self, address: &str) -> Option<&TileNode> {
    self.walk().into_iter().find(|n| n.info.address == address)
  }

  /// Move this subtree under `prefix`: `"root"` becomes `prefix`, `"3_5"`
  /// becomes `"{prefix}_3_5"`.
  pub fn readdress(&mut self, prefix: &str) {
    self.info.address = prefixed(prefix, &self.info.address);
    for child in &mut self.children {
      child.readdress(prefix);
    }
  }
}

/// Address of `address` once its tree hangs under `prefix`.
pub(crate) fn prefixed(prefix: &str, address: &str) -> String {
  if address == "root" {
    prefix.to_string()
  } else {
    format!("{}_{}", prefix, address)
  }
}
