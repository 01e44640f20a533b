//! CellKey - immutable value type naming a cell of the partitioning octree.
//!
//! Cells are identified by their grid coordinates at their own depth.
//! Depth 0 = root (one cell), depth d has 2^d cells per axis.

use smallvec::SmallVec;

/// Octree cell position.
///
/// Grid coordinates are at the cell's own depth, not the finest depth.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct CellKey {
  /// Grid X position at this depth
  pub x: u32,
  /// Grid Y position at this depth
  pub y: u32,
  /// Grid Z position at this depth
  pub z: u32,
  /// Depth below the root
  pub depth: u32,
}

impl CellKey {
  /// The root cell.
  pub const ROOT: Self = Self {
    x: 0,
    y: 0,
    z: 0,
    depth: 0,
  };

  pub fn new(x: u32, y: u32, z: u32, depth: u32) -> Self {
    Self { x, y, z, depth }
  }

  /// Child cell (one level deeper).
  ///
  /// Octant: 0-7 where bits represent +X, +Y, +Z offsets:
  /// - bit 0: X offset (0 or 1)
  /// - bit 1: Y offset (0 or 1)
  /// - bit 2: Z offset (0 or 1)
  pub fn get_child(&self, octant: u8) -> Self {
    Self {
      x: self.x * 2 + (octant & 1) as u32,
      y: self.y * 2 + ((octant >> 1) & 1) as u32,
      z: self.z * 2 + ((octant >> 2) & 1) as u32,
      depth: self.depth + 1,
    }
  }

  /// Parent cell. Returns None for the root.
  pub fn get_parent(&self) -> Option<Self> {
    if self.depth == 0 {
      return None;
    }
    Some(Self {
      x: self.x / 2,
      y: self.y / 2,
      z: self.z / 2,
      depth: self.depth - 1,
    })
  }

  /// Octant of this cell inside its parent. 0 for the root.
  pub fn octant(&self) -> u8 {
    ((self.x & 1) | ((self.y & 1) << 1) | ((self.z & 1) << 2)) as u8
  }

  /// Octants taken from the root down to this cell.
  pub fn octant_path(&self) -> SmallVec<[u8; 16]> {
    let mut path: SmallVec<[u8; 16]> = SmallVec::new();
    let mut cell = *self;
    while let Some(parent) = cell.get_parent() {
      path.push(cell.octant());
      cell = parent;
    }
    path.reverse();
    path
  }

  /// Tile address: `"root"` for the root, otherwise the octant path joined
  /// with `_` (e.g. `"3_5"`).
  pub fn address(&self) -> String {
    if self.depth == 0 {
      return "root".to_string();
    }
    self
      .octant_path()
      .iter()
      .map(|o| o.to_string())
      .collect::<Vec<_>>()
      .join("_")
  }
}

#[cfg(test)]
#[path = "cell_test.rs"]
mod cell_test;
