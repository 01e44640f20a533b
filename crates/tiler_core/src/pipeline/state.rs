//! Per-node lifecycle.
//!
//! ```text
//!   Pending ─▶ Loading ─▶ Processing ─▶ Partitioned ─▶ Written ─▶ Merged
//!      │          │           │              │            │
//!      └──────────┴───────────┴──── Fail ────┴────────────┴──▶ Failed
//! ```
//!
//! Transitions are pure: [`TileState::apply`] returns the next state and
//! whether the parent's join counter must be signalled. A node signals its
//! parent exactly once, on reaching `Merged` or `Failed`.

use serde::Serialize;

use crate::error::TilerError;

/// Lifecycle state of one tile node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TileState {
  Pending,
  Loading,
  Processing,
  Partitioned,
  Written,
  Merged,
  Failed,
}

/// Input to the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileEvent {
  /// Worker picked the node up.
  Start,
  /// Raw content is in memory.
  Loaded,
  /// Reduction or partitioning finished.
  Processed,
  /// Writer accepted the content.
  Flushed,
  /// Every child settled and refinement metadata is out.
  ChildrenMerged,
  /// Unrecoverable error for this node.
  Fail,
}

impl TileEvent {
  pub fn name(self) -> &'static str {
    match self {
      Self::Start => "start",
      Self::Loaded => "loaded",
      Self::Processed => "processed",
      Self::Flushed => "flushed",
      Self::ChildrenMerged => "children_merged",
      Self::Fail => "fail",
    }
  }
}

/// Result of applying an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
  pub state: TileState,
  /// The parent has one fewer child to wait for.
  pub child_ready: bool,
}

impl TileState {
  pub fn name(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Loading => "loading",
      Self::Processing => "processing",
      Self::Partitioned => "partitioned",
      Self::Written => "written",
      Self::Merged => "merged",
      Self::Failed => "failed",
    }
  }

  /// No further event is accepted.
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Merged | Self::Failed)
  }

  /// Content reached the writer (and possibly merged since).
  pub fn is_written(self) -> bool {
    matches!(self, Self::Written | Self::Merged)
  }

  /// Apply one event.
  pub fn apply(self, event: TileEvent) -> Result<Transition, TilerError> {
    use TileEvent::*;
    use TileState::*;

    let next = match (self, event) {
      (Pending, Start) => Loading,
      (Loading, Loaded) => Processing,
      (Processing, Processed) => Partitioned,
      (Partitioned, Flushed) => Written,
      (Written, ChildrenMerged) => Merged,
      (state, Fail) if !state.is_terminal() => Failed,
      (from, event) => {
        return Err(TilerError::InvalidTransition {
          from: from.name(),
          event: event.name(),
        })
      }
    };
    Ok(Transition {
      state: next,
      child_ready: next.is_terminal(),
    })
  }

  /// Apply a sequence of events, stopping at the first invalid one.
  pub fn apply_all(self, events: &[TileEvent]) -> Result<TileState, TilerError> {
    events
      .iter()
      .try_fold(self, |state, &event| Ok(state.apply(event)?.state))
  }
}

impl std::fmt::Display for TileState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.name())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const HAPPY_PATH: [TileEvent; 5] = [
    TileEvent::Start,
    TileEvent::Loaded,
    TileEvent::Processed,
    TileEvent::Flushed,
    TileEvent::ChildrenMerged,
  ];

  #[test]
  fn test_happy_path() {
    let mut state = TileState::Pending;
    for event in &HAPPY_PATH[..4] {
      let transition = state.apply(*event).unwrap();
      assert!(!transition.child_ready);
      state = transition.state;
    }
    assert_eq!(state, TileState::Written);

    let last = state.apply(TileEvent::ChildrenMerged).unwrap();
    assert_eq!(last.state, TileState::Merged);
    assert!(last.child_ready);
  }

  #[test]
  fn test_fail_from_every_live_state() {
    for steps in 0..HAPPY_PATH.len() {
      let state = TileState::Pending.apply_all(&HAPPY_PATH[..steps]).unwrap();
      let transition = state.apply(TileEvent::Fail).unwrap();
      assert_eq!(transition.state, TileState::Failed, "from {}", state);
      assert!(transition.child_ready);
    }
  }

  #[test]
  fn test_terminal_states_reject_events() {
    for state in [TileState::Merged, TileState::Failed] {
      assert!(state.is_terminal());
      assert!(matches!(
        state.apply(TileEvent::Fail),
        Err(TilerError::InvalidTransition { .. })
      ));
    }
  }

  #[test]
  fn test_skipping_a_state_is_rejected() {
    let err = TileState::Pending.apply(TileEvent::Flushed).unwrap_err();
    assert_eq!(err.to_string(), "Invalid tile transition from pending on flushed");
    assert!(TileState::Loading.apply(TileEvent::ChildrenMerged).is_err());
  }
}
