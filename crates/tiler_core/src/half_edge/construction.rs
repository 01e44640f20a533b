//! Building a half-edge mesh from indexed triangles, and flattening it back.

use std::collections::{HashMap, HashSet};

use smallvec::SmallVec;

use super::{FaceId, HalfEdge, HalfEdgeId, HalfEdgeMesh, HeFace, HeVertex, VertexId};
use crate::error::TilerError;
use crate::types::{Face, Mesh, Vertex};

/// Anomalies repaired while building.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
  /// Undirected edges used by more than two faces, or twice in the same
  /// direction. Extra half-edges on them stay unlinked.
  pub non_manifold_edges: usize,

  /// Faces dropped because they were degenerate or referenced a missing
  /// vertex.
  pub dropped_faces: usize,
}

impl BuildReport {
  pub fn is_clean(&self) -> bool {
    self.non_manifold_edges == 0 && self.dropped_faces == 0
  }
}

impl HalfEdgeMesh {
  /// Build adjacency for an indexed triangle list.
  ///
  /// Two faces sharing an edge in opposite directions become twins. A third
  /// face on the same edge keeps an unlinked (boundary) half-edge and both
  /// endpoints are flagged non-manifold. Degenerate faces are dropped.
  ///
  /// Fails only when faces were given and none of them survived.
  pub fn build(vertices: &[Vertex], faces: &[Face]) -> Result<Self, TilerError> {
    let mut report = BuildReport::default();

    let mut mesh_vertices: Vec<HeVertex> = vertices
      .iter()
      .map(|data| HeVertex {
        data: *data,
        faces: SmallVec::new(),
        non_manifold: false,
        removed: false,
      })
      .collect();
    let mut half_edges: Vec<HalfEdge> = Vec::with_capacity(faces.len() * 3);
    let mut mesh_faces: Vec<HeFace> = Vec::with_capacity(faces.len());

    for face in faces {
      let in_range = face.indices.iter().all(|&i| (i as usize) < vertices.len());
      if !in_range || face.is_degenerate() {
        report.dropped_faces += 1;
        continue;
      }

      let f = FaceId(mesh_faces.len() as u32);
      for corner in 0..3 {
        let origin = face.indices[corner];
        half_edges.push(HalfEdge {
          origin: VertexId(origin),
          twin: None,
          next: HalfEdgeId(f.0 * 3 + ((corner + 1) % 3) as u32),
          face: f,
        });
        mesh_vertices[origin as usize].faces.push(f);
      }
      mesh_faces.push(HeFace {
        has_normal: face.normal.is_some(),
        material: face.material,
        removed: false,
      });
    }

    if mesh_faces.is_empty() && !faces.is_empty() {
      return Err(TilerError::Geometry(format!(
        "all {} faces are degenerate or reference missing vertices",
        faces.len()
      )));
    }

    // Pair each directed edge with the first opposite one. Any repeat of a
    // directed edge means a third face (or flipped winding) on that edge.
    let mut directed: HashMap<(u32, u32), HalfEdgeId> = HashMap::with_capacity(half_edges.len());
    let mut non_manifold: HashSet<(u32, u32)> = HashSet::new();
    for index in 0..half_edges.len() {
      let h = HalfEdgeId(index as u32);
      let a = half_edges[index].origin.0;
      let b = half_edges[half_edges[index].next.index()].origin.0;

      if directed.contains_key(&(a, b)) {
        non_manifold.insert((a.min(b), a.max(b)));
        continue;
      }
      directed.insert((a, b), h);

      if let Some(&opposite) = directed.get(&(b, a)) {
        if half_edges[opposite.index()].twin.is_none() {
          half_edges[index].twin = Some(opposite);
          half_edges[opposite.index()].twin = Some(h);
        }
      }
    }

    for &(a, b) in &non_manifold {
      mesh_vertices[a as usize].non_manifold = true;
      mesh_vertices[b as usize].non_manifold = true;
    }
    report.non_manifold_edges = non_manifold.len();

    // Vertices no face uses are not part of the surface.
    let mut live_vertices = 0;
    for vertex in &mut mesh_vertices {
      if vertex.faces.is_empty() {
        vertex.removed = true;
      } else {
        live_vertices += 1;
      }
    }

    if report.non_manifold_edges > 0 {
      tracing::warn!(
        "half-edge build: {} non-manifold edges kept as boundary",
        report.non_manifold_edges
      );
    }
    if report.dropped_faces > 0 {
      tracing::warn!(
        "half-edge build: dropped {} of {} faces",
        report.dropped_faces,
        faces.len()
      );
    }

    Ok(Self {
      vertices: mesh_vertices,
      half_edges,
      live_faces: mesh_faces.len(),
      faces: mesh_faces,
      live_vertices,
      report,
    })
  }

  /// Convert back to an indexed triangle list.
  ///
  /// Only live vertices used by a live face are emitted, renumbered in
  /// first-use order. Faces that carried a normal get a recomputed one.
  pub fn flatten(&self) -> Mesh {
    let mut remap = vec![u32::MAX; self.vertices.len()];
    let mut vertices = Vec::with_capacity(self.live_vertices);
    let mut faces = Vec::with_capacity(self.live_faces);

    for f in self.face_ids() {
      let mut indices = [0u32; 3];
      for (slot, v) in indices.iter_mut().zip(self.face_vertices(f)) {
        let mapped = &mut remap[v.index()];
        if *mapped == u32::MAX {
          *mapped = vertices.len() as u32;
          vertices.push(*self.vertex(v));
        }
        *slot = *mapped;
      }

      let face = &self.faces[f.index()];
      faces.push(Face {
        indices,
        normal: face.has_normal.then(|| self.face_normal(f).as_vec3()),
        material: face.material,
      });
    }

    Mesh::new(vertices, faces)
  }
}
