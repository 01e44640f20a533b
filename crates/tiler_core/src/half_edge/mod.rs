//! Half-edge mesh stored as index arenas.
//!
//! Vertices, half-edges and faces live in growable tables and reference each
//! other by integer handle, so collapsing an edge only flips `removed` flags
//! and rewrites handles. Nothing is ever freed while the mesh is alive.
//!
//! ```text
//!            c
//!           / \
//!      h2  /   \  h1        face f owns half-edges 3f, 3f+1, 3f+2
//!         /  f  \           h0: a -> b   (origin a)
//!        a ----> b          h1: b -> c   next(h0) = h1
//!           h0              h2: c -> a   next(h1) = h2, next(h2) = h0
//!        a <---- b
//!          twin             twin(h0) lives in the neighbouring face, or is
//!                           None on a boundary
//! ```
//!
//! Built fresh per LOD level from welded data ([`HalfEdgeMesh::build`]) and
//! converted back with [`HalfEdgeMesh::flatten`].

mod construction;
mod topology;
mod validation;

pub use construction::BuildReport;
pub use topology::CollapseRejection;

use smallvec::SmallVec;

use crate::types::Vertex;

/// Handle of a vertex in a [`HalfEdgeMesh`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VertexId(pub u32);

/// Handle of a half-edge in a [`HalfEdgeMesh`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HalfEdgeId(pub u32);

/// Handle of a face in a [`HalfEdgeMesh`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FaceId(pub u32);

impl VertexId {
  #[inline]
  pub fn index(self) -> usize {
    self.0 as usize
  }
}

impl HalfEdgeId {
  #[inline]
  pub fn index(self) -> usize {
    self.0 as usize
  }

  /// Face owning this half-edge. Half-edges are allocated three per face.
  #[inline]
  pub fn face(self) -> FaceId {
    FaceId(self.0 / 3)
  }
}

impl FaceId {
  #[inline]
  pub fn index(self) -> usize {
    self.0 as usize
  }

  /// The three half-edges of this face, in winding order.
  #[inline]
  pub fn half_edges(self) -> [HalfEdgeId; 3] {
    let base = self.0 * 3;
    [HalfEdgeId(base), HalfEdgeId(base + 1), HalfEdgeId(base + 2)]
  }
}

#[derive(Clone, Debug)]
pub(crate) struct HeVertex {
  pub data: Vertex,
  /// Faces using this vertex, live ones only.
  pub faces: SmallVec<[FaceId; 8]>,
  /// Touches an edge shared by more than two faces.
  pub non_manifold: bool,
  pub removed: bool,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct HalfEdge {
  pub origin: VertexId,
  pub twin: Option<HalfEdgeId>,
  pub next: HalfEdgeId,
  pub face: FaceId,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct HeFace {
  /// True when the source face carried a normal; flatten recomputes it.
  pub has_normal: bool,
  pub material: Option<u32>,
  pub removed: bool,
}

/// Triangle mesh with half-edge adjacency.
#[derive(Clone, Debug, Default)]
pub struct HalfEdgeMesh {
  vertices: Vec<HeVertex>,
  half_edges: Vec<HalfEdge>,
  faces: Vec<HeFace>,
  live_faces: usize,
  live_vertices: usize,
  report: BuildReport,
}

impl HalfEdgeMesh {
  /// Number of live triangles.
  #[inline]
  pub fn face_count(&self) -> usize {
    self.live_faces
  }

  /// Number of live vertices.
  #[inline]
  pub fn vertex_count(&self) -> usize {
    self.live_vertices
  }

  /// Anomalies found while building.
  pub fn build_report(&self) -> &BuildReport {
    &self.report
  }

  /// Vertex payload.
  #[inline]
  pub fn vertex(&self, v: VertexId) -> &Vertex {
    &self.vertices[v.index()].data
  }

  #[inline]
  pub fn is_vertex_removed(&self, v: VertexId) -> bool {
    self.vertices[v.index()].removed
  }

  #[inline]
  pub fn is_face_removed(&self, f: FaceId) -> bool {
    self.faces[f.index()].removed
  }

  /// Material of a face.
  #[inline]
  pub fn material(&self, f: FaceId) -> Option<u32> {
    self.faces[f.index()].material
  }

  #[inline]
  pub fn origin(&self, h: HalfEdgeId) -> VertexId {
    self.half_edges[h.index()].origin
  }

  #[inline]
  pub fn twin(&self, h: HalfEdgeId) -> Option<HalfEdgeId> {
    self.half_edges[h.index()].twin
  }

  #[inline]
  pub fn next(&self, h: HalfEdgeId) -> HalfEdgeId {
    self.half_edges[h.index()].next
  }

  #[inline]
  pub fn face_of(&self, h: HalfEdgeId) -> FaceId {
    self.half_edges[h.index()].face
  }

  /// Vertex a half-edge points to.
  #[inline]
  pub fn dest(&self, h: HalfEdgeId) -> VertexId {
    self.origin(self.next(h))
  }

  /// Live faces around a vertex, in no particular order.
  #[inline]
  pub fn vertex_faces(&self, v: VertexId) -> &[FaceId] {
    &self.vertices[v.index()].faces
  }

  /// Ids of all live faces.
  pub fn face_ids(&self) -> impl Iterator<Item = FaceId> + '_ {
    self
      .faces
      .iter()
      .enumerate()
      .filter(|(_, f)| !f.removed)
      .map(|(i, _)| FaceId(i as u32))
  }

  /// One half-edge per live undirected edge.
  pub fn edge_ids(&self) -> impl Iterator<Item = HalfEdgeId> + '_ {
    self.face_ids().flat_map(|f| f.half_edges()).filter(|&h| match self.twin(h) {
      Some(twin) => h < twin,
      None => true,
    })
  }

  /// Store a new position (and attributes) for a vertex.
  pub fn set_vertex(&mut self, v: VertexId, data: Vertex) {
    self.vertices[v.index()].data = data;
  }

  /// Size of the vertex table, removed slots included.
  #[inline]
  pub(crate) fn vertex_slots(&self) -> usize {
    self.vertices.len()
  }

  /// True when the vertex touches a non-manifold edge.
  #[inline]
  pub fn is_non_manifold_vertex(&self, v: VertexId) -> bool {
    self.vertices[v.index()].non_manifold
  }
}
