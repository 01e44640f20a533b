//! Bounded set of open store writers.
//!
//! Partitioning may touch far more leaves than the process can hold file
//! handles for. The registry keeps at most `max_open` writers open and closes
//! the least recently used one when another needs its handle back.

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{PointStore, PointStoreWriter};
use crate::error::TilerError;
use crate::types::PointRecord;

/// Handle of a store inside a [`StoreRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreId(pub u32);

/// Owner of every writer created during one partitioning pass.
#[derive(Debug)]
pub struct StoreRegistry {
  dir: PathBuf,
  max_open: usize,
  writers: Vec<PointStoreWriter>,
  /// Tick of the last write per store, open stores only.
  last_used: Vec<Option<u64>>,
  /// Open stores ordered by last use.
  lru: BTreeMap<u64, StoreId>,
  tick: u64,
  evictions: usize,
}

impl StoreRegistry {
  /// Registry writing into `dir`, which must already exist.
  pub fn new(dir: impl Into<PathBuf>, max_open: usize) -> Self {
    Self {
      dir: dir.into(),
      max_open: max_open.max(1),
      writers: Vec::new(),
      last_used: Vec::new(),
      lru: BTreeMap::new(),
      tick: 0,
      evictions: 0,
    }
  }

  /// Create a new, empty store named `name`.
  ///
  /// The file is created and immediately closed; it opens on first write.
  pub fn create(&mut self, name: &str) -> Result<StoreId, TilerError> {
    let mut writer = PointStoreWriter::create(self.dir.join(format!("{}.pts", name)))?;
    writer.close()?;
    let id = StoreId(self.writers.len() as u32);
    self.writers.push(writer);
    self.last_used.push(None);
    Ok(id)
  }

  /// Append a record to a store, evicting the least recently used writer if
  /// the open limit is reached.
  pub fn write(&mut self, id: StoreId, record: &PointRecord) -> Result<(), TilerError> {
    let index = id.0 as usize;
    match self.last_used[index] {
      Some(tick) => {
        self.lru.remove(&tick);
      }
      None => {
        while self.lru.len() >= self.max_open {
          self.evict()?;
        }
      }
    }

    self.writers[index].write_record(record)?;
    self.tick += 1;
    self.last_used[index] = Some(self.tick);
    self.lru.insert(self.tick, id);
    Ok(())
  }

  fn evict(&mut self) -> Result<(), TilerError> {
    if let Some((_, victim)) = self.lru.pop_first() {
      let index = victim.0 as usize;
      self.writers[index].close()?;
      self.last_used[index] = None;
      self.evictions += 1;
    }
    Ok(())
  }

  /// Records written to a store so far.
  pub fn len(&self, id: StoreId) -> u64 {
    self.writers[id.0 as usize].len()
  }

  /// Writers currently holding a file handle.
  pub fn open_count(&self) -> usize {
    self.writers.iter().filter(|w| w.is_open()).count()
  }

  /// Number of writers closed to make room for another.
  pub fn evictions(&self) -> usize {
    self.evictions
  }

  /// Close every writer; stores come back indexed by [`StoreId`].
  pub fn finish(self) -> Result<Vec<PointStore>, TilerError> {
    self.writers.into_iter().map(PointStoreWriter::finish).collect()
  }
}
