//! Core data types shared by the mesh and point paths.

use glam::{DVec3, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::bounds::BoundingBox;

/// 8-bit RGB color.
pub type Color = [u8; 3];

/// Scene vertex with optional attributes.
///
/// For welding, identity is the position plus whichever present attributes
/// the weld flags enable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
  /// Position in scene units.
  pub position: DVec3,

  /// Shading normal (unit vector).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub normal: Option<Vec3>,

  /// Texture coordinate.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub texcoord: Option<Vec2>,

  /// Vertex color.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub color: Option<Color>,

  /// Feature id used by batched tile formats.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub batch_id: Option<u32>,
}

impl Vertex {
  /// Vertex carrying only a position.
  pub fn at(position: DVec3) -> Self {
    Self {
      position,
      ..Default::default()
    }
  }
}

/// Triangle referencing vertices of the owning mesh.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Face {
  /// Vertex indices, counter-clockwise.
  pub indices: [u32; 3],

  /// Cached face normal.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub normal: Option<Vec3>,

  /// Material index into the scene's material table.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub material: Option<u32>,
}

impl Face {
  /// Face without normal or material.
  pub fn new(a: u32, b: u32, c: u32) -> Self {
    Self {
      indices: [a, b, c],
      normal: None,
      material: None,
    }
  }

  /// Same face with a material index.
  pub fn with_material(mut self, material: u32) -> Self {
    self.material = Some(material);
    self
  }

  /// True when two or more indices coincide.
  #[inline]
  pub fn is_degenerate(&self) -> bool {
    let [a, b, c] = self.indices;
    a == b || b == c || a == c
  }
}

/// Flat triangle mesh: the exchange format between loader, weld engine,
/// half-edge mesh and tile writer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
  pub vertices: Vec<Vertex>,
  pub faces: Vec<Face>,
}

impl Mesh {
  pub fn new(vertices: Vec<Vertex>, faces: Vec<Face>) -> Self {
    Self { vertices, faces }
  }

  /// Number of triangles.
  #[inline]
  pub fn triangle_count(&self) -> usize {
    self.faces.len()
  }

  /// True when the mesh has no triangles.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.faces.is_empty()
  }

  /// Bounds of all vertex positions.
  pub fn bounds(&self) -> BoundingBox {
    BoundingBox::from_points(self.vertices.iter().map(|v| v.position))
  }
}

/// Point as produced by a point source, before staging.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawPoint {
  /// Position, already de-scaled and offset.
  pub position: DVec3,
  /// Color when the source carries one.
  pub color: Option<Color>,
}

impl RawPoint {
  pub fn new(position: DVec3, color: Option<Color>) -> Self {
    Self { position, color }
  }
}

/// Staged point record, as written to and read from a point store.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
  pub position: DVec3,
  pub color: Color,
}

impl PointRecord {
  pub fn new(position: DVec3, color: Color) -> Self {
    Self { position, color }
  }
}

/// Gray color proportional to the height of `z` inside `bounds`.
///
/// Used for sources that carry no color channel.
pub fn height_color(z: f64, bounds: &BoundingBox) -> Color {
  let height = bounds.size().z;
  let t = if height > 0.0 {
    ((z - bounds.min.z) / height).clamp(0.0, 1.0)
  } else {
    0.5
  };
  let gray = (t * 255.0).round() as u8;
  [gray, gray, gray]
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
