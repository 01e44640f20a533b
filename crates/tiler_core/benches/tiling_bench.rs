//! Tiling benchmarks.
//!
//! - **weld**: triangle soup of a subdivided grid, every corner duplicated
//! - **reduce**: half-edge reduction of the welded grid to fixed ratios
//! - **partition**: one streaming octree pass over a pseudo-random cloud

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use glam::DVec3;
use tiler_core::{
  partition, reduced, weld, Face, HalfEdgeMesh, InMemoryPoints, Mesh, OctreeSettings, RawPoint,
  ReduceOptions, ReductionTarget, TilerConfig, Vertex, WeldFlags,
};

// =============================================================================
// Synthetic Inputs
// =============================================================================

/// `n x n` grid with a gentle height field, two triangles per cell.
fn height_grid(n: u32) -> Mesh {
  let stride = n + 1;
  let mut vertices = Vec::with_capacity((stride * stride) as usize);
  for j in 0..=n {
    for i in 0..=n {
      let (x, y) = (i as f64, j as f64);
      let z = (x * 0.3).sin() * (y * 0.2).cos();
      vertices.push(Vertex::at(DVec3::new(x, y, z)));
    }
  }

  let mut faces = Vec::with_capacity((n * n * 2) as usize);
  for j in 0..n {
    for i in 0..n {
      let v00 = j * stride + i;
      let v01 = v00 + stride;
      faces.push(Face::new(v00, v00 + 1, v01 + 1));
      faces.push(Face::new(v00, v01 + 1, v01));
    }
  }
  Mesh::new(vertices, faces)
}

/// Every face gets its own three vertices.
fn soup(mesh: &Mesh) -> Mesh {
  let mut vertices = Vec::with_capacity(mesh.faces.len() * 3);
  let mut faces = Vec::with_capacity(mesh.faces.len());
  for face in &mesh.faces {
    let base = vertices.len() as u32;
    for &i in &face.indices {
      vertices.push(mesh.vertices[i as usize]);
    }
    faces.push(Face::new(base, base + 1, base + 2));
  }
  Mesh::new(vertices, faces)
}

/// Deterministic xorshift cloud inside `[0, extent]³`.
fn cloud(count: usize, extent: f64) -> Vec<RawPoint> {
  let mut state = 0x9E37_79B9_7F4A_7C15_u64;
  let mut next = move || {
    state ^= state << 13;
    state ^= state >> 7;
    state ^= state << 17;
    (state >> 11) as f64 / (1u64 << 53) as f64
  };
  (0..count)
    .map(|_| RawPoint::new(DVec3::new(next(), next(), next()) * extent, None))
    .collect()
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_weld(c: &mut Criterion) {
  let mut group = c.benchmark_group("weld");
  for n in [32u32, 128] {
    let mesh = soup(&height_grid(n));
    group.throughput(Throughput::Elements(mesh.vertices.len() as u64));
    group.bench_with_input(BenchmarkId::from_parameter(n), &mesh, |b, mesh| {
      b.iter(|| black_box(weld(&mesh.vertices, &mesh.faces, 1e-6, WeldFlags::NONE)))
    });
  }
  group.finish();
}

fn bench_reduce(c: &mut Criterion) {
  let mut group = c.benchmark_group("reduce_128");
  let grid = height_grid(128);
  let Ok(mesh) = HalfEdgeMesh::build(&grid.vertices, &grid.faces) else {
    return;
  };
  let config = TilerConfig::default();
  group.throughput(Throughput::Elements(grid.faces.len() as u64));

  for ratio in [0.5, 0.25, 0.1] {
    let options = ReduceOptions::from_config(&config, ReductionTarget::Ratio(ratio));
    group.bench_with_input(BenchmarkId::from_parameter(ratio), &options, |b, options| {
      b.iter(|| black_box(reduced(&mesh, options).1))
    });
  }
  group.finish();
}

fn bench_partition(c: &mut Criterion) {
  let mut group = c.benchmark_group("partition");
  group.sample_size(10);
  let points = cloud(100_000, 100.0);
  group.throughput(Throughput::Elements(points.len() as u64));

  for max_depth in [4u32, 6] {
    let settings = OctreeSettings {
      max_depth,
      ..Default::default()
    };
    group.bench_with_input(BenchmarkId::from_parameter(max_depth), &settings, |b, settings| {
      b.iter(|| {
        let Ok(dir) = tempfile::tempdir() else {
          return;
        };
        let mut source = InMemoryPoints::new("bench", points.clone());
        if let Ok(octree) = partition(&mut source, settings, dir.path()) {
          black_box(octree.root().point_count);
        }
      })
    });
  }
  group.finish();
}

criterion_group!(benches, bench_weld, bench_reduce, bench_partition);
criterion_main!(benches);
