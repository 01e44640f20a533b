//! Output seam.

use super::tile::{TileContent, TileInfo};
use crate::error::TilerError;

/// Sink for finished tiles.
///
/// Called concurrently from worker threads, never twice for the same
/// address within a run.
pub trait TileWriter: Send + Sync {
  /// Serialize one node's content. Called once per `Written` transition.
  fn write_content(&self, tile: &TileInfo, content: &TileContent) -> Result<(), TilerError>;

  /// Record how `parent` refines into its successful children. Called once
  /// per `Merged` transition of a node that has children.
  fn write_refinement(
    &self,
    parent: &TileInfo,
    children: &[TileInfo],
    partial: bool,
  ) -> Result<(), TilerError>;
}
