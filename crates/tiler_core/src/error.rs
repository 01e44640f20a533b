//! Error taxonomy for the tiling engine.
//!
//! Per-node errors (`Geometry`, `Io`) are recorded against the failing tile
//! and do not abort siblings. `InputRead` skips one input of a batch. Only
//! `Config` and `Pool` are fatal to a whole run.

use std::path::Path;

/// Errors raised by the tiling engine.
#[derive(Debug, thiserror::Error)]
pub enum TilerError {
  /// Malformed or unreadable source.
  #[error("Failed to read input '{source_name}': {reason}")]
  InputRead { source_name: String, reason: String },

  /// Non-manifold or degenerate geometry that could not be repaired.
  #[error("Geometry error: {0}")]
  Geometry(String),

  /// A point or cell violated an octree invariant.
  #[error("Partition invariant violated: {0}")]
  PartitionInvariant(String),

  /// Temp-store or output write failure.
  #[error("I/O error while {context}: {source}")]
  Io {
    context: String,
    #[source]
    source: std::io::Error,
  },

  /// Invalid options.
  #[error("Invalid configuration: {0}")]
  Config(String),

  /// Worker pool could not be created.
  #[error("Worker pool error: {0}")]
  Pool(String),

  /// A tile node was driven through a transition its state does not allow.
  #[error("Invalid tile transition from {from} on {event}")]
  InvalidTransition { from: &'static str, event: &'static str },
}

impl TilerError {
  /// Wrap an I/O error with a description of what was being done.
  pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
    Self::Io {
      context: context.into(),
      source,
    }
  }

  /// Wrap an I/O error that happened on a specific file.
  pub fn io_at(action: &str, path: &Path, source: std::io::Error) -> Self {
    Self::Io {
      context: format!("{} {}", action, path.display()),
      source,
    }
  }

  /// Convenience constructor for [`TilerError::InputRead`].
  pub fn input(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::InputRead {
      source_name: source_name.into(),
      reason: reason.into(),
    }
  }

  /// True when the error must stop the whole run rather than one node.
  pub fn is_fatal(&self) -> bool {
    matches!(self, Self::Config(_) | Self::Pool(_))
  }
}
