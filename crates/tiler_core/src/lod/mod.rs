//! Level-of-detail generation by edge collapse.
//!
//! Each level is produced from the one before it:
//!
//! ```text
//!   source ─ weld(LOD0 flags) ─ build ─ reduce ─ flatten ─▶ LOD0
//!   LOD0   ─ weld(LOD1 flags) ─ build ─ reduce ─ flatten ─▶ LOD1
//!   LOD1   ─ weld(LOD2 flags) ─ build ─ reduce ─ flatten ─▶ LOD2
//! ```
//!
//! Chaining keeps triangle counts non-increasing across levels, and lets each
//! level choose which attribute seams may simplify away. Ratios are relative
//! to the welded LOD0 triangle count.
//!
//! # Module Structure
//!
//! - [`reducer`]: priority-queue driver, `reduce` / `reduced`
//! - `cost`: collapse cost, protected edges, survivor placement

mod cost;
pub mod reducer;

pub use reducer::{reduce, reduced};

use serde::Serialize;

use crate::config::{BoundaryProtection, TilerConfig};
use crate::error::TilerError;
use crate::half_edge::HalfEdgeMesh;
use crate::types::Mesh;
use crate::weld::weld;

/// How far a reduction should go.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReductionTarget {
  /// Fraction of the current triangle count, in `(0, 1]`.
  Ratio(f64),
  /// Absolute triangle count.
  TriangleCount(usize),
}

impl ReductionTarget {
  /// Triangle count to stop at for a mesh of `current` triangles.
  pub fn face_count(&self, current: usize) -> usize {
    match *self {
      Self::Ratio(ratio) => ((current as f64 * ratio.clamp(0.0, 1.0)).ceil() as usize).min(current),
      Self::TriangleCount(count) => count.min(current),
    }
  }
}

/// Options for one reduction pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReduceOptions {
  pub target: ReductionTarget,
  pub protection: BoundaryProtection,
  /// Largest allowed rotation of a surviving face normal, in degrees.
  pub max_normal_deviation_deg: f64,
}

impl ReduceOptions {
  /// Protection and angle limit taken from the run configuration.
  pub fn from_config(config: &TilerConfig, target: ReductionTarget) -> Self {
    Self {
      target,
      protection: config.protection,
      max_normal_deviation_deg: config.max_normal_deviation_deg,
    }
  }
}

/// Statistics from one reduction pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ReductionStats {
  pub initial_faces: usize,
  pub final_faces: usize,
  /// Successful collapses.
  pub collapses: usize,
  /// Popped candidates that failed re-validation.
  pub rejected: usize,
  /// Longest edge collapsed, in scene units.
  pub max_collapsed_edge: f64,
}

/// One generated detail level.
#[derive(Clone, Debug)]
pub struct LodLevel {
  /// 0 = finest.
  pub level: usize,
  pub mesh: Mesh,
  /// Longest edge collapsed anywhere between the source and this level.
  pub geometric_error: f64,
  pub stats: ReductionStats,
}

/// Generate every level configured in `config.lods`, finest first.
///
/// Fails with [`TilerError::Geometry`] when a vertex position is not finite,
/// or when a level has faces but none survive welding and half-edge
/// construction.
pub fn generate_lods(mesh: &Mesh, config: &TilerConfig) -> Result<Vec<LodLevel>, TilerError> {
  if let Some(index) = mesh.vertices.iter().position(|v| !v.position.is_finite()) {
    return Err(TilerError::Geometry(format!(
      "vertex {} has a non-finite position {:?}",
      index, mesh.vertices[index].position
    )));
  }

  let mut levels: Vec<LodLevel> = Vec::with_capacity(config.lods.len());
  let mut base_faces: Option<usize> = None;
  let mut geometric_error = 0.0f64;

  for (level, settings) in config.lods.iter().enumerate() {
    let input = match levels.last() {
      Some(previous) => &previous.mesh,
      None => mesh,
    };
    let welded = weld(&input.vertices, &input.faces, config.weld_epsilon, settings.weld);
    if welded.faces.is_empty() && !input.faces.is_empty() {
      return Err(TilerError::Geometry(format!(
        "LOD{}: all {} faces are degenerate after welding",
        level,
        input.faces.len()
      )));
    }
    let mut topology = HalfEdgeMesh::build(&welded.vertices, &welded.faces)?;

    let base = *base_faces.get_or_insert(topology.face_count());
    let target = ((base as f64 * settings.ratio).ceil() as usize).min(topology.face_count());
    let options = ReduceOptions::from_config(config, ReductionTarget::TriangleCount(target));
    let stats = reduce(&mut topology, &options);
    geometric_error = geometric_error.max(stats.max_collapsed_edge);

    tracing::debug!(
      "LOD{}: {} -> {} triangles (target {}, {} merged vertices, {} rejected collapses)",
      level,
      stats.initial_faces,
      stats.final_faces,
      target,
      welded.merged_count(),
      stats.rejected
    );

    levels.push(LodLevel {
      level,
      mesh: topology.flatten(),
      geometric_error,
      stats,
    });
  }

  Ok(levels)
}
