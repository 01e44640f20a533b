//! Bounded worker pool built on rayon.
//!
//! Work is submitted with [`TaskExecutor::spawn`] and results come back over
//! a crossbeam channel in completion order, tagged with the [`TaskId`]
//! returned at submission.
//!
//! # Usage
//!
//! ```ignore
//! let executor = TaskExecutor::new(4)?;
//!
//! // Queue work (non-blocking)
//! let task_id = executor.spawn(move || expensive_computation());
//!
//! // Block for completions until nothing is in flight
//! while let Some((id, result)) = executor.recv() {
//!     // Use result
//! }
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crossbeam_channel::{Receiver, Sender};

use crate::error::TilerError;

/// Unique identifier for a spawned task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// Panic message of a task that did not complete.
pub type TaskPanic = String;

type Completion<T> = (TaskId, Result<T, TaskPanic>);

/// Fixed-size pool whose tasks all produce a `T`.
pub struct TaskExecutor<T> {
  pool: rayon::ThreadPool,
  sender: Sender<Completion<T>>,
  receiver: Receiver<Completion<T>>,
  next_id: AtomicU64,
  /// Tasks spawned but not yet received.
  in_flight: AtomicUsize,
}

impl<T: Send + 'static> TaskExecutor<T> {
  /// Create a pool with `num_threads` workers (0 = one per CPU).
  pub fn new(num_threads: usize) -> Result<Self, TilerError> {
    let pool = rayon::ThreadPoolBuilder::new()
      .num_threads(num_threads)
      .thread_name(|i| format!("tiler-worker-{}", i))
      .build()
      .map_err(|e| TilerError::Pool(e.to_string()))?;
    let (sender, receiver) = crossbeam_channel::unbounded();

    tracing::debug!("worker pool started with {} threads", pool.current_num_threads());
    Ok(Self {
      pool,
      sender,
      receiver,
      next_id: AtomicU64::new(0),
      in_flight: AtomicUsize::new(0),
    })
  }

  /// Queue a task on the pool (non-blocking).
  ///
  /// A panicking task still completes, with its panic message as the result.
  pub fn spawn<F>(&self, work: F) -> TaskId
  where
    F: FnOnce() -> T + Send + 'static,
  {
    let task_id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
    self.in_flight.fetch_add(1, Ordering::AcqRel);

    let sender = self.sender.clone();
    self.pool.spawn(move || {
      let result = catch_unwind(AssertUnwindSafe(work)).map_err(|payload| {
        payload
          .downcast_ref::<&str>()
          .map(|s| s.to_string())
          .or_else(|| payload.downcast_ref::<String>().cloned())
          .unwrap_or_else(|| "unknown panic".to_string())
      });
      // Fails only once the executor is dropped.
      let _ = sender.send((task_id, result));
    });

    task_id
  }

  /// Block until the next task completes.
  ///
  /// Returns `None` immediately when nothing is in flight.
  pub fn recv(&self) -> Option<Completion<T>> {
    if self.in_flight.load(Ordering::Acquire) == 0 {
      return None;
    }
    let completion = self.receiver.recv().ok()?;
    self.in_flight.fetch_sub(1, Ordering::AcqRel);
    Some(completion)
  }

  /// Number of tasks queued, running, or finished but not yet received.
  pub fn in_flight(&self) -> usize {
    self.in_flight.load(Ordering::Acquire)
  }

  pub fn num_threads(&self) -> usize {
    self.pool.current_num_threads()
  }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_spawn_and_recv() {
    let executor = TaskExecutor::new(2).unwrap();
    let task_id = executor.spawn(|| 42i32);

    let (id, result) = executor.recv().unwrap();
    assert_eq!(id, task_id);
    assert_eq!(result, Ok(42));
    assert!(executor.recv().is_none());
  }

  #[test]
  fn test_multiple_tasks() {
    let executor = TaskExecutor::new(4).unwrap();
    let ids: Vec<_> = (0..10).map(|i| executor.spawn(move || i * 2)).collect();
    assert!(executor.in_flight() <= 10);

    let mut results = vec![None; 10];
    while let Some((id, result)) = executor.recv() {
      let idx = ids.iter().position(|&t| t == id).unwrap();
      results[idx] = Some(result.unwrap());
    }

    let results: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(results, vec![0, 2, 4, 6, 8, 10, 12, 14, 16, 18]);
    assert_eq!(executor.in_flight(), 0);
  }

  #[test]
  fn test_panicking_task_completes() {
    let executor: TaskExecutor<u32> = TaskExecutor::new(1).unwrap();
    executor.spawn(|| panic!("boom"));
    executor.spawn(|| 7);

    let mut outcomes: Vec<_> = std::iter::from_fn(|| executor.recv()).map(|(_, r)| r).collect();
    outcomes.sort();
    assert_eq!(outcomes, vec![Ok(7), Err("boom".to_string())]);
  }

  #[test]
  fn test_thread_count() {
    let executor: TaskExecutor<()> = TaskExecutor::new(3).unwrap();
    assert_eq!(executor.num_threads(), 3);

    let executor: TaskExecutor<()> = TaskExecutor::new(0).unwrap();
    assert!(executor.num_threads() >= 1);
  }
}
