//! Structural invariant checks.

use super::HalfEdgeMesh;
use crate::error::TilerError;

impl HalfEdgeMesh {
  /// Verify the mesh invariants, reporting the first violation.
  ///
  /// - every live face has three distinct, live corners and a closed
  ///   `next` cycle of length three
  /// - every linked half-edge is its twin's twin, runs the opposite way, and
  ///   belongs to a live face
  /// - vertex incidence lists and the live face count agree with the faces
  pub fn validate(&self) -> Result<(), TilerError> {
    let mut live = 0usize;

    for f in self.face_ids() {
      live += 1;
      let [h0, h1, h2] = f.half_edges();
      if self.next(h0) != h1 || self.next(h1) != h2 || self.next(h2) != h0 {
        return Err(TilerError::Geometry(format!("face {} does not close after 3 half-edges", f.0)));
      }

      let [a, b, c] = self.face_vertices(f);
      if a == b || b == c || a == c {
        return Err(TilerError::Geometry(format!(
          "face {} is degenerate ({}, {}, {})",
          f.0, a.0, b.0, c.0
        )));
      }
      for v in [a, b, c] {
        if self.is_vertex_removed(v) {
          return Err(TilerError::Geometry(format!("face {} uses removed vertex {}", f.0, v.0)));
        }
        if !self.vertex_faces(v).contains(&f) {
          return Err(TilerError::Geometry(format!(
            "vertex {} does not list its face {}",
            v.0, f.0
          )));
        }
      }

      for h in f.half_edges() {
        if self.face_of(h) != f {
          return Err(TilerError::Geometry(format!("half-edge {} has the wrong face", h.0)));
        }
        let Some(twin) = self.twin(h) else {
          continue;
        };
        if self.is_face_removed(self.face_of(twin)) {
          return Err(TilerError::Geometry(format!("half-edge {} has a removed twin", h.0)));
        }
        if self.twin(twin) != Some(h) {
          return Err(TilerError::Geometry(format!(
            "half-edge {} twin {} does not point back",
            h.0, twin.0
          )));
        }
        if self.origin(twin) != self.dest(h) || self.dest(twin) != self.origin(h) {
          return Err(TilerError::Geometry(format!(
            "half-edge {} and twin {} do not run opposite ways",
            h.0, twin.0
          )));
        }
      }
    }

    if live != self.face_count() {
      return Err(TilerError::Geometry(format!(
        "live face count {} does not match {} live faces",
        self.face_count(),
        live
      )));
    }

    Ok(())
  }
}
