//! Input seams: scene loaders and point streams.
//!
//! Format readers live outside the core. The pipeline only sees these traits
//! plus the in-memory implementations below.

use crate::bounds::BoundingBox;
use crate::error::TilerError;
use crate::types::{Mesh, RawPoint};

/// Produces a flat mesh from any supported scene format.
pub trait SceneSource: Send {
  /// Name used in logs and failure records (usually a file name).
  fn name(&self) -> &str;

  /// Read the whole scene.
  fn load(&mut self) -> Result<Mesh, TilerError>;
}

/// Streams raw points one at a time.
pub trait PointSource: Send {
  fn name(&self) -> &str;

  /// Coarse bounds from the file header, read before any point.
  fn read_header(&mut self) -> Result<BoundingBox, TilerError>;

  /// Next point, or `None` at end of stream.
  fn next_point(&mut self) -> Result<Option<RawPoint>, TilerError>;
}

/// One input of a tiling run.
pub enum TileSource {
  Scene(Box<dyn SceneSource>),
  Points(Box<dyn PointSource>),
}

impl TileSource {
  pub fn name(&self) -> &str {
    match self {
      Self::Scene(source) => source.name(),
      Self::Points(source) => source.name(),
    }
  }
}

impl std::fmt::Debug for TileSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Scene(source) => write!(f, "Scene({})", source.name()),
      Self::Points(source) => write!(f, "Points({})", source.name()),
    }
  }
}

// =============================================================================
// In-memory sources
// =============================================================================

/// Scene held in memory.
#[derive(Clone, Debug)]
pub struct InMemoryScene {
  name: String,
  mesh: Mesh,
}

impl InMemoryScene {
  pub fn new(name: impl Into<String>, mesh: Mesh) -> Self {
    Self {
      name: name.into(),
      mesh,
    }
  }
}

impl SceneSource for InMemoryScene {
  fn name(&self) -> &str {
    &self.name
  }

  fn load(&mut self) -> Result<Mesh, TilerError> {
    Ok(self.mesh.clone())
  }
}

/// Point list held in memory.
///
/// The header box is the bounds of the points unless one is given with
/// [`with_header`](Self::with_header).
#[derive(Clone, Debug)]
pub struct InMemoryPoints {
  name: String,
  header: Option<BoundingBox>,
  points: Vec<RawPoint>,
  cursor: usize,
}

impl InMemoryPoints {
  pub fn new(name: impl Into<String>, points: Vec<RawPoint>) -> Self {
    Self {
      name: name.into(),
      header: None,
      points,
      cursor: 0,
    }
  }

  /// Override the header bounding box.
  pub fn with_header(mut self, header: BoundingBox) -> Self {
    self.header = Some(header);
    self
  }
}

impl PointSource for InMemoryPoints {
  fn name(&self) -> &str {
    &self.name
  }

  fn read_header(&mut self) -> Result<BoundingBox, TilerError> {
    let header = self
      .header
      .unwrap_or_else(|| BoundingBox::from_points(self.points.iter().map(|p| p.position)));
    if header.is_empty() {
      return Err(TilerError::input(&self.name, "no points and no header bounds"));
    }
    Ok(header)
  }

  fn next_point(&mut self) -> Result<Option<RawPoint>, TilerError> {
    let point = self.points.get(self.cursor).copied();
    if point.is_some() {
      self.cursor += 1;
    }
    Ok(point)
  }
}
