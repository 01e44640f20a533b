//! Priority-queue edge collapse.
//!
//! Candidates are pushed with version stamps of both endpoints. A collapse
//! bumps the stamps of the survivor and its one-ring, so entries whose
//! neighbourhood changed are skipped when popped instead of being searched
//! for and removed from the heap.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::cost::{collapse_cost, placement, survivor};
use super::{ReduceOptions, ReductionStats};
use crate::half_edge::{HalfEdgeId, HalfEdgeMesh, VertexId};

#[derive(Clone, Copy, Debug)]
struct Candidate {
  cost: f64,
  edge: HalfEdgeId,
  origin: VertexId,
  dest: VertexId,
  stamps: [u32; 2],
}

impl PartialEq for Candidate {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Candidate {
  /// Reversed so the max-heap pops the cheapest edge; ties go to the lower
  /// half-edge id.
  fn cmp(&self, other: &Self) -> Ordering {
    other
      .cost
      .total_cmp(&self.cost)
      .then_with(|| other.edge.cmp(&self.edge))
  }
}

struct Queue<'a> {
  heap: BinaryHeap<Candidate>,
  versions: Vec<u32>,
  options: &'a ReduceOptions,
  max_deviation: f64,
}

impl Queue<'_> {
  /// Queue `h` if it is currently collapsible.
  fn push(&mut self, mesh: &HalfEdgeMesh, h: HalfEdgeId) {
    let Some(placement) = placement(mesh, h, &self.options.protection) else {
      return;
    };
    let target = survivor(mesh, h, placement).position;
    let Ok(deviation) = mesh.check_collapse(h, target, self.max_deviation) else {
      return;
    };
    let (origin, dest) = (mesh.origin(h), mesh.dest(h));
    self.heap.push(Candidate {
      cost: collapse_cost(mesh, h, deviation),
      edge: h,
      origin,
      dest,
      stamps: [self.versions[origin.index()], self.versions[dest.index()]],
    });
  }

  fn is_stale(&self, mesh: &HalfEdgeMesh, candidate: &Candidate) -> bool {
    let h = candidate.edge;
    mesh.is_face_removed(mesh.face_of(h))
      || mesh.origin(h) != candidate.origin
      || mesh.dest(h) != candidate.dest
      || self.versions[candidate.origin.index()] != candidate.stamps[0]
      || self.versions[candidate.dest.index()] != candidate.stamps[1]
  }
}

/// Canonical half-edge of an undirected edge.
#[inline]
fn canonical(mesh: &HalfEdgeMesh, h: HalfEdgeId) -> HalfEdgeId {
  match mesh.twin(h) {
    Some(twin) if twin < h => twin,
    _ => h,
  }
}

/// Collapse edges in place until the target is met or no eligible edge
/// remains.
///
/// Every successful collapse removes one face on a border edge or two
/// otherwise, so the triangle count never increases and the result may land
/// one below the target.
pub fn reduce(mesh: &mut HalfEdgeMesh, options: &ReduceOptions) -> ReductionStats {
  let initial = mesh.face_count();
  let target = options.target.face_count(initial);
  let mut stats = ReductionStats {
    initial_faces: initial,
    final_faces: initial,
    ..Default::default()
  };
  if initial <= target {
    return stats;
  }

  let mut queue = Queue {
    heap: BinaryHeap::with_capacity(initial * 3 / 2),
    versions: vec![0; mesh.vertex_slots()],
    options,
    max_deviation: options.max_normal_deviation_deg.to_radians(),
  };
  let edges: Vec<HalfEdgeId> = mesh.edge_ids().collect();
  for h in edges {
    queue.push(mesh, h);
  }

  while mesh.face_count() > target {
    let Some(candidate) = queue.heap.pop() else {
      break;
    };
    if queue.is_stale(mesh, &candidate) {
      continue;
    }

    let h = candidate.edge;
    let Some(placement) = placement(mesh, h, &options.protection) else {
      stats.rejected += 1;
      continue;
    };
    let data = survivor(mesh, h, placement);
    if mesh.check_collapse(h, data.position, queue.max_deviation).is_err() {
      stats.rejected += 1;
      continue;
    }

    let length = mesh.edge_length(h);
    let kept = mesh.collapse_edge(h, data);
    stats.collapses += 1;
    stats.max_collapsed_edge = stats.max_collapsed_edge.max(length);

    let mut ring = mesh.neighbors(kept);
    ring.push(kept);
    for v in &ring {
      queue.versions[v.index()] += 1;
    }
    let mut touched: Vec<HalfEdgeId> = ring
      .iter()
      .flat_map(|&v| mesh.vertex_half_edges(v))
      .map(|h| canonical(mesh, h))
      .collect();
    touched.sort_unstable();
    touched.dedup();
    for h in touched {
      queue.push(mesh, h);
    }
  }

  stats.final_faces = mesh.face_count();
  tracing::trace!(
    "reduce: {} -> {} faces, {} collapses, {} rejected",
    stats.initial_faces,
    stats.final_faces,
    stats.collapses,
    stats.rejected
  );
  stats
}

/// Non-destructive variant of [`reduce`]: reduces a copy.
pub fn reduced(mesh: &HalfEdgeMesh, options: &ReduceOptions) -> (HalfEdgeMesh, ReductionStats) {
  let mut copy = mesh.clone();
  let stats = reduce(&mut copy, options);
  (copy, stats)
}

#[cfg(test)]
#[path = "reducer_test.rs"]
mod reducer_test;
