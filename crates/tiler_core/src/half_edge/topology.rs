//! Adjacency queries and edge collapse.
//!
//! Collapsing half-edge `h = a -> b` keeps `a` and removes `b`:
//!
//! ```text
//!        c                    c
//!       / \                   |
//!   t2 /f1 \ t1              t2|t1     f1, f2 removed
//!     a --h-> b      =>       a        t1 <-> t2 and u1 <-> u2 become twins
//!   u1 \f2 / u2              u1|u2     faces of b now start at a
//!       \ /                   |
//!        d                    d
//! ```

use glam::DVec3;
use smallvec::SmallVec;

use super::{FaceId, HalfEdgeId, HalfEdgeMesh, VertexId};
use crate::types::Vertex;

/// Why an edge cannot be collapsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollapseRejection {
  /// The half-edge belongs to a removed face.
  Removed,
  /// An endpoint touches a non-manifold edge.
  NonManifold,
  /// The endpoints share a neighbour outside the edge's own faces, or an
  /// interior edge joins two border vertices.
  LinkCondition,
  /// Two faces would end up on the same three vertices.
  DuplicateFace,
  /// A surviving face would turn past the angle limit or lose its area.
  NormalFlip,
}

impl HalfEdgeMesh {
  /// Corners of a face, in winding order.
  #[inline]
  pub fn face_vertices(&self, f: FaceId) -> [VertexId; 3] {
    let [h0, h1, h2] = f.half_edges();
    [self.origin(h0), self.origin(h1), self.origin(h2)]
  }

  #[inline]
  pub fn position(&self, v: VertexId) -> DVec3 {
    self.vertex(v).position
  }

  /// Unit normal of a face, zero when the face has no area.
  pub fn face_normal(&self, f: FaceId) -> DVec3 {
    let [a, b, c] = self.face_vertices(f).map(|v| self.position(v));
    (b - a).cross(c - a).normalize_or_zero()
  }

  pub fn edge_length(&self, h: HalfEdgeId) -> f64 {
    self.position(self.origin(h)).distance(self.position(self.dest(h)))
  }

  /// Distinct vertices sharing a face with `v`.
  pub fn neighbors(&self, v: VertexId) -> SmallVec<[VertexId; 12]> {
    let mut out = SmallVec::new();
    for &f in self.vertex_faces(v) {
      for u in self.face_vertices(f) {
        if u != v && !out.contains(&u) {
          out.push(u);
        }
      }
    }
    out
  }

  #[inline]
  pub fn is_boundary_edge(&self, h: HalfEdgeId) -> bool {
    self.twin(h).is_none()
  }

  /// True when the vertex lies on an open border.
  pub fn is_boundary_vertex(&self, v: VertexId) -> bool {
    self.vertex_faces(v).iter().any(|&f| {
      f.half_edges()
        .into_iter()
        .any(|h| self.twin(h).is_none() && (self.origin(h) == v || self.dest(h) == v))
    })
  }

  /// Half-edges of live faces that start or end at `v`.
  pub fn vertex_half_edges(&self, v: VertexId) -> SmallVec<[HalfEdgeId; 16]> {
    let mut out = SmallVec::new();
    for &f in self.vertex_faces(v) {
      for h in f.half_edges() {
        if self.origin(h) == v || self.dest(h) == v {
          out.push(h);
        }
      }
    }
    out
  }

  /// Angle between the normals of the two faces on an edge, in radians.
  /// Zero on a border.
  pub fn dihedral_angle(&self, h: HalfEdgeId) -> f64 {
    match self.twin(h) {
      None => 0.0,
      Some(twin) => {
        let n1 = self.face_normal(self.face_of(h));
        let n2 = self.face_normal(self.face_of(twin));
        n1.dot(n2).clamp(-1.0, 1.0).acos()
      }
    }
  }

  fn collapse_faces(&self, h: HalfEdgeId) -> [Option<FaceId>; 2] {
    [Some(self.face_of(h)), self.twin(h).map(|t| self.face_of(t))]
  }

  /// Check that collapsing `h` with the survivor moved to `target` keeps a
  /// valid 2-manifold.
  ///
  /// Returns the largest rotation of any surviving face normal, in radians.
  pub fn check_collapse(
    &self,
    h: HalfEdgeId,
    target: DVec3,
    max_deviation: f64,
  ) -> Result<f64, CollapseRejection> {
    if self.is_face_removed(self.face_of(h)) {
      return Err(CollapseRejection::Removed);
    }
    let a = self.origin(h);
    let b = self.dest(h);
    if self.is_non_manifold_vertex(a) || self.is_non_manifold_vertex(b) {
      return Err(CollapseRejection::NonManifold);
    }

    let interior = self.twin(h).is_some();
    let na = self.neighbors(a);
    let nb = self.neighbors(b);
    let shared = na.iter().filter(|v| nb.contains(v)).count();
    if shared != if interior { 2 } else { 1 } {
      return Err(CollapseRejection::LinkCondition);
    }
    if interior && self.is_boundary_vertex(a) && self.is_boundary_vertex(b) {
      return Err(CollapseRejection::LinkCondition);
    }

    let removed = self.collapse_faces(h);
    let survives = |f: FaceId| !removed.contains(&Some(f));

    let mut around_a: SmallVec<[[VertexId; 3]; 16]> = SmallVec::new();
    for &f in self.vertex_faces(a).iter().filter(|f| survives(**f)) {
      let mut key = self.face_vertices(f);
      key.sort_unstable();
      around_a.push(key);
    }
    for &f in self.vertex_faces(b).iter().filter(|f| survives(**f)) {
      let mut key = self.face_vertices(f).map(|v| if v == b { a } else { v });
      key.sort_unstable();
      if around_a.contains(&key) {
        return Err(CollapseRejection::DuplicateFace);
      }
    }

    let min_cos = max_deviation.cos();
    let mut worst = 0.0f64;
    for v in [a, b] {
      for &f in self.vertex_faces(v).iter().filter(|f| survives(**f)) {
        let before = self.face_normal(f);
        let [p0, p1, p2] = self.face_vertices(f).map(|u| {
          if u == a || u == b {
            target
          } else {
            self.position(u)
          }
        });
        let after = (p1 - p0).cross(p2 - p0).normalize_or_zero();
        if after == DVec3::ZERO {
          return Err(CollapseRejection::NormalFlip);
        }
        if before == DVec3::ZERO {
          continue;
        }
        let cos = before.dot(after).clamp(-1.0, 1.0);
        if cos < min_cos {
          return Err(CollapseRejection::NormalFlip);
        }
        worst = worst.max(cos.acos());
      }
    }

    Ok(worst)
  }

  /// Collapse `h = a -> b` into `a`, which takes `survivor` as its data.
  ///
  /// Callers must have accepted the collapse with [`check_collapse`]
  /// first. Returns the surviving vertex.
  ///
  /// [`check_collapse`]: HalfEdgeMesh::check_collapse
  pub fn collapse_edge(&mut self, h: HalfEdgeId, survivor: Vertex) -> VertexId {
    let a = self.origin(h);
    let b = self.dest(h);
    let inner = [Some(h), self.twin(h)];

    for edge in inner.into_iter().flatten() {
      let face = self.face_of(edge);
      let o1 = self.next(edge);
      let o2 = self.next(o1);
      let t1 = self.twin(o1);
      let t2 = self.twin(o2);
      if let Some(t) = t1 {
        self.half_edges[t.index()].twin = t2;
      }
      if let Some(t) = t2 {
        self.half_edges[t.index()].twin = t1;
      }

      self.faces[face.index()].removed = true;
      self.live_faces -= 1;
      for v in self.face_vertices(face) {
        self.vertices[v.index()].faces.retain(|g| *g != face);
      }
    }

    let moved = std::mem::take(&mut self.vertices[b.index()].faces);
    for &f in &moved {
      for he in f.half_edges() {
        if self.half_edges[he.index()].origin == b {
          self.half_edges[he.index()].origin = a;
        }
      }
    }
    self.vertices[a.index()].faces.extend(moved);
    self.vertices[a.index()].data = survivor;
    self.vertices[b.index()].removed = true;
    self.live_vertices -= 1;

    // A collapse of the last face around a vertex leaves it isolated.
    for edge in inner.into_iter().flatten() {
      for v in self.face_vertices(self.face_of(edge)) {
        let vertex = &mut self.vertices[v.index()];
        if !vertex.removed && vertex.faces.is_empty() {
          vertex.removed = true;
          self.live_vertices -= 1;
        }
      }
    }

    a
  }
}
