//! Test utilities shared across modules.
//!
//! Mesh fixtures with known topology, point fixtures for partitioning and
//! a recording tile writer.

use std::collections::HashSet;
use std::f64::consts::PI;
use std::sync::Mutex;

use glam::DVec3;

use crate::error::TilerError;
use crate::pipeline::{TileContent, TileInfo, TileWriter};
use crate::types::{Face, Mesh, RawPoint, Vertex};

// =============================================================================
// Mesh Fixtures
// =============================================================================

/// Flat `n x n` quad grid in the XY plane, two triangles per cell.
///
/// Vertex `(i, j)` has index `j * (n + 1) + i`. Normals face +Z.
pub fn grid_mesh(n: u32, cell: f64) -> Mesh {
  let stride = n + 1;
  let mut vertices = Vec::with_capacity((stride * stride) as usize);
  for j in 0..=n {
    for i in 0..=n {
      vertices.push(Vertex::at(DVec3::new(i as f64 * cell, j as f64 * cell, 0.0)));
    }
  }

  let mut faces = Vec::with_capacity((n * n * 2) as usize);
  for j in 0..n {
    for i in 0..n {
      let v00 = j * stride + i;
      let v10 = v00 + 1;
      let v01 = v00 + stride;
      let v11 = v01 + 1;
      faces.push(Face::new(v00, v10, v11));
      faces.push(Face::new(v00, v11, v01));
    }
  }

  Mesh::new(vertices, faces)
}

/// Unit cube, 8 shared vertices, 12 outward-facing triangles.
pub fn cube_mesh() -> Mesh {
  let vertices = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [1.0, 1.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 1.0],
    [1.0, 1.0, 1.0],
    [0.0, 1.0, 1.0],
  ]
  .into_iter()
  .map(|p| Vertex::at(DVec3::from_array(p)))
  .collect();

  let faces = [
    [0, 2, 1],
    [0, 3, 2],
    [4, 5, 6],
    [4, 6, 7],
    [0, 1, 5],
    [0, 5, 4],
    [3, 7, 6],
    [3, 6, 2],
    [0, 4, 7],
    [0, 7, 3],
    [1, 2, 6],
    [1, 6, 5],
  ]
  .into_iter()
  .map(|[a, b, c]| Face::new(a, b, c))
  .collect();

  Mesh::new(vertices, faces)
}

/// Closed tetrahedron, 4 vertices and 4 outward-facing triangles.
pub fn tetrahedron_mesh() -> Mesh {
  let vertices = vec![
    Vertex::at(DVec3::ZERO),
    Vertex::at(DVec3::X),
    Vertex::at(DVec3::Y),
    Vertex::at(DVec3::Z),
  ];
  let faces = vec![
    Face::new(0, 2, 1),
    Face::new(0, 1, 3),
    Face::new(0, 3, 2),
    Face::new(1, 2, 3),
  ];
  Mesh::new(vertices, faces)
}

/// Closed UV sphere with `2 * segments * (rings - 1)` triangles.
///
/// `rings >= 2`, `segments >= 3`.
pub fn sphere_mesh(rings: u32, segments: u32, radius: f64) -> Mesh {
  let mut vertices = vec![Vertex::at(DVec3::new(0.0, 0.0, radius))];
  for k in 1..rings {
    let theta = PI * k as f64 / rings as f64;
    for s in 0..segments {
      let phi = 2.0 * PI * s as f64 / segments as f64;
      vertices.push(Vertex::at(
        DVec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos()) * radius,
      ));
    }
  }
  let south = vertices.len() as u32;
  vertices.push(Vertex::at(DVec3::new(0.0, 0.0, -radius)));

  let ring = |k: u32, s: u32| 1 + (k - 1) * segments + (s % segments);
  let mut faces = Vec::new();
  for s in 0..segments {
    faces.push(Face::new(0, ring(1, s), ring(1, s + 1)));
  }
  for k in 1..rings - 1 {
    for s in 0..segments {
      let (a, b) = (ring(k, s), ring(k, s + 1));
      let (c, d) = (ring(k + 1, s), ring(k + 1, s + 1));
      faces.push(Face::new(a, c, d));
      faces.push(Face::new(a, d, b));
    }
  }
  for s in 0..segments {
    faces.push(Face::new(south, ring(rings - 1, s + 1), ring(rings - 1, s)));
  }

  Mesh::new(vertices, faces)
}

/// Unwelded copy of a mesh: every face gets three private vertices.
pub fn triangle_soup(mesh: &Mesh) -> Mesh {
  let mut vertices = Vec::with_capacity(mesh.faces.len() * 3);
  let mut faces = Vec::with_capacity(mesh.faces.len());
  for face in &mesh.faces {
    let base = vertices.len() as u32;
    for &index in &face.indices {
      vertices.push(mesh.vertices[index as usize]);
    }
    faces.push(Face {
      indices: [base, base + 1, base + 2],
      ..*face
    });
  }
  Mesh::new(vertices, faces)
}

// =============================================================================
// Point Fixtures
// =============================================================================

/// Deterministic pseudo-random points inside `[min, max]` (xorshift).
pub fn scattered_points(count: usize, min: DVec3, max: DVec3, seed: u64) -> Vec<RawPoint> {
  let mut state = seed.max(1);
  let mut next = move || {
    state ^= state << 13;
    state ^= state >> 7;
    state ^= state << 17;
    (state >> 11) as f64 / (1u64 << 53) as f64
  };
  let size = max - min;
  (0..count)
    .map(|_| {
      let p = min + DVec3::new(next(), next(), next()) * size;
      RawPoint::new(p, None)
    })
    .collect()
}

// =============================================================================
// Tile Writer
// =============================================================================

/// Tile writer that keeps every call in memory and fails on chosen addresses.
#[derive(Default)]
pub struct RecordingWriter {
  fail_content: HashSet<String>,
  fail_refinement: HashSet<String>,
  contents: Mutex<Vec<(TileInfo, TileContent)>>,
  refinements: Mutex<Vec<(TileInfo, Vec<TileInfo>, bool)>>,
}

impl RecordingWriter {
  pub fn new() -> Self {
    Self::default()
  }

  /// Content writes for these addresses fail with an I/O error.
  pub fn failing_content(mut self, addresses: &[&str]) -> Self {
    self.fail_content.extend(addresses.iter().map(|a| a.to_string()));
    self
  }

  /// Refinement writes for these addresses fail with an I/O error.
  pub fn failing_refinement(mut self, addresses: &[&str]) -> Self {
    self.fail_refinement.extend(addresses.iter().map(|a| a.to_string()));
    self
  }

  /// Addresses whose content was written, sorted.
  pub fn written(&self) -> Vec<String> {
    let mut addresses: Vec<String> = self
      .contents
      .lock()
      .unwrap()
      .iter()
      .map(|(info, _)| info.address.clone())
      .collect();
    addresses.sort();
    addresses
  }

  pub fn content(&self, address: &str) -> Option<TileContent> {
    self
      .contents
      .lock()
      .unwrap()
      .iter()
      .find(|(info, _)| info.address == address)
      .map(|(_, content)| content.clone())
  }

  /// Successful children and partial flag written for `address`.
  pub fn refinement(&self, address: &str) -> Option<(Vec<String>, bool)> {
    self
      .refinements
      .lock()
      .unwrap()
      .iter()
      .find(|(parent, _, _)| parent.address == address)
      .map(|(_, children, partial)| {
        let addresses = children.iter().map(|c| c.address.clone()).collect();
        (addresses, *partial)
      })
  }

  pub fn refinement_count(&self) -> usize {
    self.refinements.lock().unwrap().len()
  }
}

fn injected(address: &str) -> TilerError {
  TilerError::io(
    format!("writing tile {}", address),
    std::io::Error::other("injected failure"),
  )
}

impl TileWriter for RecordingWriter {
  fn write_content(&self, tile: &TileInfo, content: &TileContent) -> Result<(), TilerError> {
    if self.fail_content.contains(&tile.address) {
      return Err(injected(&tile.address));
    }
    self
      .contents
      .lock()
      .unwrap()
      .push((tile.clone(), content.clone()));
    Ok(())
  }

  fn write_refinement(
    &self,
    parent: &TileInfo,
    children: &[TileInfo],
    partial: bool,
  ) -> Result<(), TilerError> {
    if self.fail_refinement.contains(&parent.address) {
      return Err(injected(&parent.address));
    }
    self
      .refinements
      .lock()
      .unwrap()
      .push((parent.clone(), children.to_vec(), partial));
    Ok(())
  }
}
