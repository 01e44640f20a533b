//! Run summary surfaced to the user.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::lod::ReductionStats;
use crate::octree::PartitionStats;

/// A node or input that did not make it to the output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NodeFailure {
  /// Source the node was built from.
  pub input: String,
  /// Tile address, absent when the whole input was skipped.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub address: Option<String>,
  pub reason: String,
}

impl NodeFailure {
  pub fn node(input: &str, address: &str, reason: impl fmt::Display) -> Self {
    Self {
      input: input.to_string(),
      address: Some(address.to_string()),
      reason: reason.to_string(),
    }
  }

  pub fn input(input: &str, reason: impl fmt::Display) -> Self {
    Self {
      input: input.to_string(),
      address: None,
      reason: reason.to_string(),
    }
  }
}

impl fmt::Display for NodeFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.address {
      Some(address) => write!(f, "{} [{}]: {}", self.input, address, self.reason),
      None => write!(f, "{}: {}", self.input, self.reason),
    }
  }
}

/// Counters and failures of one build or batch.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunReport {
  /// Inputs that produced a tile tree.
  pub inputs_built: usize,
  pub nodes_written: usize,
  pub nodes_merged: usize,
  pub failures: Vec<NodeFailure>,
  /// Inputs that could not be read at all.
  pub skipped_inputs: Vec<NodeFailure>,
  pub partitions: Vec<PartitionStats>,
  pub reductions: Vec<ReductionStats>,
  pub elapsed: Duration,
}

impl RunReport {
  /// True when any node failed or any input was skipped.
  pub fn has_failures(&self) -> bool {
    !self.failures.is_empty() || !self.skipped_inputs.is_empty()
  }

  /// Fold another report into this one. Elapsed time is left alone.
  pub fn absorb(&mut self, other: RunReport) {
    self.inputs_built += other.inputs_built;
    self.nodes_written += other.nodes_written;
    self.nodes_merged += other.nodes_merged;
    self.failures.extend(other.failures);
    self.skipped_inputs.extend(other.skipped_inputs);
    self.partitions.extend(other.partitions);
    self.reductions.extend(other.reductions);
  }
}

impl fmt::Display for RunReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(
      f,
      "{} input(s) built in {:.2?}: {} node(s) written, {} merged",
      self.inputs_built, self.elapsed, self.nodes_written, self.nodes_merged
    )?;
    for stats in &self.partitions {
      writeln!(
        f,
        "  points: {} read, {} kept, {} clamped, {} leaves",
        stats.seen, stats.accepted, stats.clamped, stats.leaves
      )?;
    }
    for stats in &self.reductions {
      writeln!(
        f,
        "  reduction: {} -> {} triangles ({} collapses)",
        stats.initial_faces, stats.final_faces, stats.collapses
      )?;
    }
    if !self.skipped_inputs.is_empty() {
      writeln!(f, "{} input(s) skipped:", self.skipped_inputs.len())?;
      for failure in &self.skipped_inputs {
        writeln!(f, "  {}", failure)?;
      }
    }
    if !self.failures.is_empty() {
      writeln!(f, "{} node(s) failed:", self.failures.len())?;
      for failure in &self.failures {
        writeln!(f, "  {}", failure)?;
      }
    }
    Ok(())
  }
}
