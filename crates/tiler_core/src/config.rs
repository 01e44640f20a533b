//! TilerConfig - immutable run options threaded through every stage.
//!
//! Built once at startup (defaults, then a TOML file, then CLI overrides),
//! validated, wrapped in an `Arc` and only read afterwards.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::TilerError;
use crate::weld::WeldFlags;

/// Weld and reduction settings for one detail level.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LodSettings {
  /// Attributes that must match for two vertices to weld before reduction.
  #[serde(default)]
  pub weld: WeldFlags,

  /// Target triangle count as a fraction of LOD0, in `(0, 1]`.
  pub ratio: f64,
}

impl LodSettings {
  pub const fn new(weld: WeldFlags, ratio: f64) -> Self {
    Self { weld, ratio }
  }
}

/// Edges the reducer must never collapse.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryProtection {
  /// Keep open mesh borders (edges with a single face) in place.
  pub mesh_border: bool,

  /// Keep edges between faces of different materials.
  pub material_seam: bool,

  /// Keep edges whose dihedral angle exceeds this many degrees.
  pub hard_edge_angle_deg: Option<f64>,
}

impl Default for BoundaryProtection {
  fn default() -> Self {
    Self {
      mesh_border: true,
      material_seam: true,
      hard_edge_angle_deg: None,
    }
  }
}

/// Octree partitioning and point staging options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctreeSettings {
  /// Depth below which nodes may split. Root is depth 0.
  pub max_depth: u32,

  /// Nodes whose longest axis is at or below this size never split.
  pub min_cell_size: f64,

  /// Percentage of input points kept, in `[1, 100]`.
  pub sampling_percent: u8,

  /// Maximum leaf writers open at once.
  pub max_open_stores: usize,
}

impl Default for OctreeSettings {
  fn default() -> Self {
    Self {
      max_depth: 8,
      min_cell_size: 1.0,
      sampling_percent: 100,
      max_open_stores: 256,
    }
  }
}

/// Configuration for a tiling run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilerConfig {
  /// Per-axis position tolerance for welding.
  pub weld_epsilon: f64,

  /// Detail levels, finest first.
  pub lods: Vec<LodSettings>,

  /// Edges protected from collapse.
  pub protection: BoundaryProtection,

  /// Largest rotation of any adjacent face normal a collapse may cause.
  pub max_normal_deviation_deg: f64,

  /// Octree options for point content.
  pub octree: OctreeSettings,

  /// Worker threads (0 = one per CPU).
  pub workers: usize,

  /// Directory for point stores (system temp dir when unset).
  pub temp_dir: Option<PathBuf>,
}

impl TilerConfig {
  /// Default detail levels: texcoord seams survive LOD0 and LOD1, LOD2 may
  /// simplify across every seam.
  pub fn default_lods() -> Vec<LodSettings> {
    vec![
      LodSettings::new(WeldFlags::TEXCOORD, 1.0),
      LodSettings::new(WeldFlags::TEXCOORD, 0.5),
      LodSettings::new(WeldFlags::NONE, 0.25),
    ]
  }

  /// Check every option is in range.
  pub fn validate(&self) -> Result<(), TilerError> {
    if !(self.weld_epsilon > 0.0) || !self.weld_epsilon.is_finite() {
      return Err(TilerError::Config(format!(
        "weld_epsilon must be a positive finite number, got {}",
        self.weld_epsilon
      )));
    }
    if self.lods.is_empty() {
      return Err(TilerError::Config("at least one LOD level is required".into()));
    }
    for (level, lod) in self.lods.iter().enumerate() {
      if !(lod.ratio > 0.0 && lod.ratio <= 1.0) {
        return Err(TilerError::Config(format!(
          "LOD{} ratio must be in (0, 1], got {}",
          level, lod.ratio
        )));
      }
    }
    if !(self.max_normal_deviation_deg > 0.0 && self.max_normal_deviation_deg <= 180.0) {
      return Err(TilerError::Config(format!(
        "max_normal_deviation_deg must be in (0, 180], got {}",
        self.max_normal_deviation_deg
      )));
    }
    let octree = &self.octree;
    if !(1..=100).contains(&octree.sampling_percent) {
      return Err(TilerError::Config(format!(
        "sampling_percent must be in [1, 100], got {}",
        octree.sampling_percent
      )));
    }
    if !(octree.min_cell_size > 0.0) {
      return Err(TilerError::Config(format!(
        "min_cell_size must be positive, got {}",
        octree.min_cell_size
      )));
    }
    if octree.max_open_stores == 0 {
      return Err(TilerError::Config("max_open_stores must be at least 1".into()));
    }
    Ok(())
  }

  /// Directory used for point stores.
  pub fn temp_root(&self) -> PathBuf {
    self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
  }
}

impl Default for TilerConfig {
  fn default() -> Self {
    Self {
      weld_epsilon: 1e-8,
      lods: Self::default_lods(),
      protection: BoundaryProtection::default(),
      max_normal_deviation_deg: 60.0,
      octree: OctreeSettings::default(),
      workers: 0,
      temp_dir: None,
    }
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
