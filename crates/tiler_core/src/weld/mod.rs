//! Attribute-aware vertex welding.
//!
//! Two vertices merge when their positions differ by at most `epsilon` on
//! every axis and every attribute enabled in [`WeldFlags`] is equal.
//!
//! ```text
//!   grid cell = floor(position / epsilon)
//!
//!   ┌─────┬─────┬─────┐
//!   │     │     │     │   A candidate is compared only against
//!   ├─────┼─────┼─────┤   representatives in its own cell and the
//!   │     │  ●  │     │   26 neighbours, so welding is O(n) on
//!   ├─────┼─────┼─────┤   well-distributed input.
//!   │     │     │     │
//!   └─────┴─────┴─────┘
//! ```
//!
//! The first vertex seen in a cluster becomes its representative and keeps
//! all of its own attributes, including ones the flags ignore. Later vertices
//! are only compared against representatives, never chained through merged
//! vertices, which makes welding idempotent.

use std::collections::HashMap;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::types::{Face, Vertex};

/// Attributes that must be equal for two vertices to weld.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WeldFlags {
  pub texcoord: bool,
  pub normal: bool,
  pub color: bool,
  pub batch_id: bool,
}

impl WeldFlags {
  /// Position only.
  pub const NONE: Self = Self {
    texcoord: false,
    normal: false,
    color: false,
    batch_id: false,
  };

  /// Texture seams are preserved.
  pub const TEXCOORD: Self = Self {
    texcoord: true,
    normal: false,
    color: false,
    batch_id: false,
  };

  /// Every attribute must match.
  pub const ALL: Self = Self {
    texcoord: true,
    normal: true,
    color: true,
    batch_id: true,
  };

  /// Check the flagged attributes of two vertices for equality.
  #[inline]
  pub fn attributes_match(&self, a: &Vertex, b: &Vertex) -> bool {
    (!self.texcoord || a.texcoord == b.texcoord)
      && (!self.normal || a.normal == b.normal)
      && (!self.color || a.color == b.color)
      && (!self.batch_id || a.batch_id == b.batch_id)
  }
}

/// Result of a weld pass.
#[derive(Clone, Debug, Default)]
pub struct WeldOutput {
  /// Representative vertices, in first-seen order.
  pub vertices: Vec<Vertex>,

  /// Faces re-indexed onto `vertices`, degenerate faces removed.
  pub faces: Vec<Face>,

  /// For every input vertex, the index of its representative.
  pub remap: Vec<u32>,

  /// Faces dropped because they became degenerate or referenced a missing
  /// vertex.
  pub dropped_faces: usize,
}

impl WeldOutput {
  /// Number of input vertices folded into another one.
  pub fn merged_count(&self) -> usize {
    self.remap.len() - self.vertices.len()
  }
}

type CellKey = [i64; 3];

/// Grid cell of `position`. Coordinates past the `i64` range share the
/// outermost cell; `within` still decides the actual match.
#[inline]
fn cell_of(position: DVec3, inv_cell: f64) -> CellKey {
  const LIMIT: f64 = (i64::MAX / 2) as f64;
  let scaled = (position * inv_cell).floor();
  [scaled.x, scaled.y, scaled.z].map(|c| c.clamp(-LIMIT, LIMIT) as i64)
}

#[inline]
fn within(a: DVec3, b: DVec3, epsilon: f64) -> bool {
  let d = (a - b).abs();
  d.x <= epsilon && d.y <= epsilon && d.z <= epsilon
}

/// Weld coincident vertices and re-index faces.
///
/// `epsilon` must be positive; callers validate it through
/// [`TilerConfig::validate`](crate::TilerConfig::validate).
pub fn weld(vertices: &[Vertex], faces: &[Face], epsilon: f64, flags: WeldFlags) -> WeldOutput {
  let epsilon = epsilon.max(f64::MIN_POSITIVE);
  let inv_cell = 1.0 / epsilon;

  let mut grid: HashMap<CellKey, SmallVec<[u32; 4]>> = HashMap::with_capacity(vertices.len());
  let mut welded: Vec<Vertex> = Vec::with_capacity(vertices.len());
  let mut remap: Vec<u32> = Vec::with_capacity(vertices.len());

  for vertex in vertices {
    let cell = cell_of(vertex.position, inv_cell);

    // Lowest matching representative wins so the result does not depend on
    // hash map iteration order.
    let mut found: Option<u32> = None;
    for dx in -1..=1 {
      for dy in -1..=1 {
        for dz in -1..=1 {
          let key = [
            cell[0].saturating_add(dx),
            cell[1].saturating_add(dy),
            cell[2].saturating_add(dz),
          ];
          let Some(bucket) = grid.get(&key) else {
            continue;
          };
          for &candidate in bucket {
            if found.is_some_and(|f| f <= candidate) {
              continue;
            }
            let rep = &welded[candidate as usize];
            if within(rep.position, vertex.position, epsilon) && flags.attributes_match(rep, vertex) {
              found = Some(candidate);
            }
          }
        }
      }
    }

    let index = match found {
      Some(index) => index,
      None => {
        let index = welded.len() as u32;
        welded.push(*vertex);
        grid.entry(cell).or_default().push(index);
        index
      }
    };
    remap.push(index);
  }

  let mut out_faces = Vec::with_capacity(faces.len());
  let mut dropped_faces = 0usize;
  for face in faces {
    let mut indices = [0u32; 3];
    let mut valid = true;
    for (slot, &original) in indices.iter_mut().zip(face.indices.iter()) {
      match remap.get(original as usize) {
        Some(&mapped) => *slot = mapped,
        None => {
          valid = false;
          break;
        }
      }
    }
    let remapped = Face { indices, ..*face };
    if !valid || remapped.is_degenerate() {
      dropped_faces += 1;
      continue;
    }
    out_faces.push(remapped);
  }

  if dropped_faces > 0 {
    tracing::debug!(
      "weld: dropped {} degenerate faces ({} of {} vertices merged)",
      dropped_faces,
      vertices.len() - welded.len(),
      vertices.len()
    );
  }

  WeldOutput {
    vertices: welded,
    faces: out_faces,
    remap,
    dropped_faces,
  }
}
