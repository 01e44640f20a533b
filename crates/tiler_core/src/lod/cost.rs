//! Collapse cost, protected edges and survivor placement.

use crate::config::BoundaryProtection;
use crate::half_edge::{HalfEdgeId, HalfEdgeMesh, VertexId};
use crate::types::Vertex;

/// Cost multiplier for edges on a material seam or open border. UV islands
/// show up as borders once texcoord welding has split them.
const SEAM_PENALTY: f64 = 4.0;

/// Where the surviving vertex of a collapse ends up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Placement {
  Midpoint,
  /// Origin is pinned, keep it.
  KeepOrigin,
  /// Destination is pinned, the survivor takes its data.
  KeepDest,
}

/// True when the edge itself must never collapse.
pub(crate) fn is_protected(mesh: &HalfEdgeMesh, h: HalfEdgeId, protection: &BoundaryProtection) -> bool {
  let Some(twin) = mesh.twin(h) else {
    return protection.mesh_border;
  };
  if protection.material_seam && mesh.material(mesh.face_of(h)) != mesh.material(mesh.face_of(twin)) {
    return true;
  }
  match protection.hard_edge_angle_deg {
    Some(limit) => mesh.dihedral_angle(h) > limit.to_radians(),
    None => false,
  }
}

/// True when the vertex sits on a protected or non-manifold edge and must
/// not move.
pub(crate) fn is_pinned(mesh: &HalfEdgeMesh, v: VertexId, protection: &BoundaryProtection) -> bool {
  mesh.is_non_manifold_vertex(v)
    || mesh
      .vertex_half_edges(v)
      .into_iter()
      .any(|h| is_protected(mesh, h, protection))
}

/// Placement for collapsing `h`, or `None` when it is ineligible.
pub(crate) fn placement(
  mesh: &HalfEdgeMesh,
  h: HalfEdgeId,
  protection: &BoundaryProtection,
) -> Option<Placement> {
  if is_protected(mesh, h, protection) {
    return None;
  }
  match (
    is_pinned(mesh, mesh.origin(h), protection),
    is_pinned(mesh, mesh.dest(h), protection),
  ) {
    (false, false) => Some(Placement::Midpoint),
    (true, false) => Some(Placement::KeepOrigin),
    (false, true) => Some(Placement::KeepDest),
    (true, true) => None,
  }
}

/// Data of the vertex left behind by collapsing `h`.
pub(crate) fn survivor(mesh: &HalfEdgeMesh, h: HalfEdgeId, placement: Placement) -> Vertex {
  let a = mesh.vertex(mesh.origin(h));
  let b = mesh.vertex(mesh.dest(h));
  match placement {
    Placement::KeepOrigin => *a,
    Placement::KeepDest => *b,
    Placement::Midpoint => Vertex {
      position: a.position.lerp(b.position, 0.5),
      normal: match (a.normal, b.normal) {
        (Some(na), Some(nb)) => Some((na + nb).try_normalize().unwrap_or(na)),
        (na, _) => na,
      },
      texcoord: match (a.texcoord, b.texcoord) {
        (Some(ta), Some(tb)) => Some(ta.lerp(tb, 0.5)),
        (ta, _) => ta,
      },
      ..*a
    },
  }
}

/// Collapse cost: grows with edge length and normal deviation, and is
/// multiplied up on seams.
pub(crate) fn collapse_cost(mesh: &HalfEdgeMesh, h: HalfEdgeId, deviation: f64) -> f64 {
  let on_seam = match mesh.twin(h) {
    None => true,
    Some(twin) => mesh.material(mesh.face_of(h)) != mesh.material(mesh.face_of(twin)),
  };
  let cost = mesh.edge_length(h) * (1.0 + deviation);
  if on_seam {
    cost * SEAM_PENALTY
  } else {
    cost
  }
}
