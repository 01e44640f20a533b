//! Out-of-core staging of point records, one file per octree leaf.
//!
//! Files hold fixed-size little-endian records and no header, so the record
//! count is the file length divided by [`RECORD_SIZE`] and any store can be
//! read back without touching its siblings.
//!
//! ```text
//!   offset  0        8        16       24  25  26
//!           ├────────┼────────┼────────┼───┼───┼───┤
//!           │ x: f64 │ y: f64 │ z: f64 │ r │ g │ b │   27 bytes
//! ```
//!
//! A [`PointStoreWriter`] appends; when it is closed to free its handle it
//! reopens in append mode on the next write, so write order equals read
//! order. [`PointStoreWriter::finish`] turns it into a read-only
//! [`PointStore`].

mod registry;

pub use registry::{StoreId, StoreRegistry};

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use glam::DVec3;

use crate::error::TilerError;
use crate::types::{Color, PointRecord};

/// Size of one encoded record in bytes.
pub const RECORD_SIZE: usize = 27;

/// Encode a record into its on-disk layout.
#[inline]
pub fn encode_record(record: &PointRecord) -> [u8; RECORD_SIZE] {
  let mut buf = [0u8; RECORD_SIZE];
  buf[0..8].copy_from_slice(&record.position.x.to_le_bytes());
  buf[8..16].copy_from_slice(&record.position.y.to_le_bytes());
  buf[16..24].copy_from_slice(&record.position.z.to_le_bytes());
  buf[24..27].copy_from_slice(&record.color);
  buf
}

/// Decode a record from its on-disk layout.
#[inline]
pub fn decode_record(buf: &[u8; RECORD_SIZE]) -> PointRecord {
  let f = |range: std::ops::Range<usize>| {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[range]);
    f64::from_le_bytes(bytes)
  };
  PointRecord::new(DVec3::new(f(0..8), f(8..16), f(16..24)), [buf[24], buf[25], buf[26]])
}

// =============================================================================
// Writer
// =============================================================================

/// Append-only writer for one store file.
#[derive(Debug)]
pub struct PointStoreWriter {
  path: PathBuf,
  file: Option<BufWriter<File>>,
  count: u64,
}

impl PointStoreWriter {
  /// Create (or truncate) a store file and open it for writing.
  pub fn create(path: impl Into<PathBuf>) -> Result<Self, TilerError> {
    let path = path.into();
    let file = File::create(&path).map_err(|e| TilerError::io_at("creating point store", &path, e))?;
    Ok(Self {
      path,
      file: Some(BufWriter::new(file)),
      count: 0,
    })
  }

  /// Append a point, reopening the file if it was closed.
  pub fn write(&mut self, position: DVec3, color: Color) -> Result<(), TilerError> {
    self.write_record(&PointRecord::new(position, color))
  }

  /// Append an encoded record, reopening the file if it was closed.
  pub fn write_record(&mut self, record: &PointRecord) -> Result<(), TilerError> {
    if self.file.is_none() {
      let file = OpenOptions::new()
        .append(true)
        .open(&self.path)
        .map_err(|e| TilerError::io_at("reopening point store", &self.path, e))?;
      self.file = Some(BufWriter::new(file));
    }
    if let Some(file) = self.file.as_mut() {
      file
        .write_all(&encode_record(record))
        .map_err(|e| TilerError::io_at("writing point store", &self.path, e))?;
      self.count += 1;
    }
    Ok(())
  }

  /// Flush and release the file handle. Later writes reopen it.
  pub fn close(&mut self) -> Result<(), TilerError> {
    if let Some(mut file) = self.file.take() {
      file
        .flush()
        .map_err(|e| TilerError::io_at("flushing point store", &self.path, e))?;
    }
    Ok(())
  }

  #[inline]
  pub fn is_open(&self) -> bool {
    self.file.is_some()
  }

  /// Records written so far.
  #[inline]
  pub fn len(&self) -> u64 {
    self.count
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.count == 0
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Close for good and hand over a readable store.
  pub fn finish(mut self) -> Result<PointStore, TilerError> {
    self.close()?;
    Ok(PointStore {
      path: std::mem::take(&mut self.path),
      count: self.count,
    })
  }
}

// =============================================================================
// Closed store
// =============================================================================

/// A closed store file.
///
/// Only exists once its writer has finished, so a store is never read while
/// it is still being written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointStore {
  path: PathBuf,
  count: u64,
}

impl PointStore {
  /// Open an existing store file.
  pub fn open(path: impl Into<PathBuf>) -> Result<Self, TilerError> {
    let path = path.into();
    let len = std::fs::metadata(&path)
      .map_err(|e| TilerError::io_at("opening point store", &path, e))?
      .len();
    if len % RECORD_SIZE as u64 != 0 {
      return Err(TilerError::io_at(
        "opening point store",
        &path,
        std::io::Error::new(
          ErrorKind::InvalidData,
          format!("length {} is not a multiple of {}", len, RECORD_SIZE),
        ),
      ));
    }
    Ok(Self {
      path,
      count: len / RECORD_SIZE as u64,
    })
  }

  #[inline]
  pub fn len(&self) -> u64 {
    self.count
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.count == 0
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Lazily read every record in write order.
  pub fn read_all(&self) -> Result<PointStoreReader, TilerError> {
    let file = File::open(&self.path).map_err(|e| TilerError::io_at("reading point store", &self.path, e))?;
    Ok(PointStoreReader {
      path: self.path.clone(),
      reader: BufReader::new(file),
      remaining: self.count,
    })
  }

  /// Read every record into memory.
  pub fn load(&self) -> Result<Vec<PointRecord>, TilerError> {
    self.read_all()?.collect()
  }

  /// Delete the backing file.
  pub fn remove(self) -> Result<(), TilerError> {
    std::fs::remove_file(&self.path).map_err(|e| TilerError::io_at("removing point store", &self.path, e))
  }
}

/// Lazy sequence of the records in a [`PointStore`].
#[derive(Debug)]
pub struct PointStoreReader {
  path: PathBuf,
  reader: BufReader<File>,
  remaining: u64,
}

impl Iterator for PointStoreReader {
  type Item = Result<PointRecord, TilerError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 {
      return None;
    }
    let mut buf = [0u8; RECORD_SIZE];
    match self.reader.read_exact(&mut buf) {
      Ok(()) => {
        self.remaining -= 1;
        Some(Ok(decode_record(&buf)))
      }
      Err(e) => {
        self.remaining = 0;
        Some(Err(TilerError::io_at("reading point store", &self.path, e)))
      }
    }
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    let remaining = self.remaining as usize;
    (remaining, Some(remaining))
  }
}
