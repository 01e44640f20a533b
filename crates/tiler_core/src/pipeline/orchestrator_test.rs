use glam::DVec3;

use super::*;
use crate::config::OctreeSettings;
use crate::pipeline::{InMemoryPoints, InMemoryScene};
use crate::test_utils::{scattered_points, sphere_mesh, triangle_soup, RecordingWriter};
use crate::types::{Face, Mesh, RawPoint, Vertex};

fn config(temp: &Path) -> TilerConfig {
  TilerConfig {
    workers: 2,
    temp_dir: Some(temp.to_path_buf()),
    octree: OctreeSettings {
      max_depth: 2,
      min_cell_size: 1.0,
      ..Default::default()
    },
    ..Default::default()
  }
}

fn pipeline(config: TilerConfig, writer: RecordingWriter) -> TilePipeline<RecordingWriter> {
  TilePipeline::new(Arc::new(config), Arc::new(writer)).unwrap()
}

fn scene(name: &str) -> TileSource {
  TileSource::Scene(Box::new(InMemoryScene::new(
    name,
    triangle_soup(&sphere_mesh(8, 12, 1.0)),
  )))
}

fn cloud(name: &str, points: Vec<RawPoint>) -> TileSource {
  TileSource::Points(Box::new(InMemoryPoints::new(name, points)))
}

/// Point source whose stream breaks after the header.
struct BrokenStream;

impl PointSource for BrokenStream {
  fn name(&self) -> &str {
    "broken.xyz"
  }

  fn read_header(&mut self) -> Result<BoundingBox, TilerError> {
    Ok(BoundingBox::new(DVec3::ZERO, DVec3::ONE))
  }

  fn next_point(&mut self) -> Result<Option<RawPoint>, TilerError> {
    Err(TilerError::input("broken.xyz", "line 1: expected 3 or 6 fields"))
  }
}

// =============================================================================
// Mesh content
// =============================================================================

#[test]
fn test_mesh_builds_lod_chain() {
  let temp = tempfile::tempdir().unwrap();
  let mut pipeline = pipeline(config(temp.path()), RecordingWriter::new());
  let output = pipeline.build_tile(scene("sphere")).unwrap();
  let root = output.root.unwrap();

  let chain: Vec<&TileNode> = root.walk();
  let addresses: Vec<&str> = chain.iter().map(|n| n.address()).collect();
  assert_eq!(addresses, vec!["root", "0", "0_0"]);
  let levels: Vec<u32> = chain.iter().map(|n| n.info.level).collect();
  assert_eq!(levels, vec![2, 1, 0]);

  let triangles: Vec<usize> = chain
    .iter()
    .map(|n| match n.info.content {
      ContentRef::MeshLod { triangles, .. } => triangles,
      other => panic!("unexpected content {:?}", other),
    })
    .collect();
  assert!(triangles[0] <= triangles[1] && triangles[1] <= triangles[2]);
  assert_eq!(triangles[2], 2 * 12 * 7);

  for pair in chain.windows(2) {
    assert!(pair[0].info.geometric_error >= pair[1].info.geometric_error);
  }
  for node in &chain {
    assert_eq!(node.state, TileState::Merged);
    assert_eq!(node.info.refine, Refine::Replace);
    assert!(!node.partial);
  }
  assert_eq!(root.info.bounds, chain[2].info.bounds.unioned(&root.info.bounds));

  assert_eq!(output.report.nodes_written, 3);
  assert_eq!(output.report.nodes_merged, 3);
  assert_eq!(output.report.reductions.len(), 3);
  assert!(!output.report.has_failures());

  let writer = pipeline.writer();
  assert_eq!(writer.written(), vec!["0", "0_0", "root"]);
  assert_eq!(writer.refinement_count(), 2);
  assert_eq!(writer.refinement("root"), Some((vec!["0".to_string()], false)));
}

#[test]
fn test_degenerate_mesh_fails_root() {
  let temp = tempfile::tempdir().unwrap();
  let mut pipeline = pipeline(config(temp.path()), RecordingWriter::new());
  let mesh = Mesh::new(
    vec![Vertex::at(DVec3::ZERO), Vertex::at(DVec3::X)],
    vec![Face::new(0, 0, 1), Face::new(1, 1, 0)],
  );
  let source = TileSource::Scene(Box::new(InMemoryScene::new("flat", mesh)));

  let output = pipeline.build_tile(source).unwrap();
  let root = output.root.unwrap();
  assert_eq!(root.state, TileState::Failed);
  assert!(root.failure.as_deref().unwrap().contains("Geometry"));
  assert_eq!(output.report.failures.len(), 1);
  assert_eq!(output.report.failures[0].address.as_deref(), Some("root"));
  assert!(pipeline.writer().written().is_empty());
}

// =============================================================================
// Point content
// =============================================================================

#[test]
fn test_points_build_octree_tiles() {
  let temp = tempfile::tempdir().unwrap();
  let mut pipeline = pipeline(config(temp.path()), RecordingWriter::new());
  let points = scattered_points(2000, DVec3::ZERO, DVec3::splat(8.0), 9);
  let output = pipeline.build_tile(cloud("cloud", points)).unwrap();
  let root = output.root.unwrap();

  assert_eq!(root.state, TileState::Merged);
  assert!(!root.partial);
  assert_eq!(root.info.refine, Refine::Add);
  assert_eq!(root.info.content, ContentRef::None);
  assert_eq!(root.children.len(), 8);

  let nodes = root.walk();
  assert_eq!(nodes.len(), 1 + 8 + 64);
  let mut union = BoundingBox::EMPTY;
  let mut total = 0;
  for leaf in nodes.iter().filter(|n| n.children.is_empty()) {
    assert_eq!(leaf.info.level, 2);
    assert_eq!(leaf.info.geometric_error, 0.0);
    match leaf.info.content {
      ContentRef::PointLeaf { points } => total += points,
      other => panic!("unexpected content {:?}", other),
    }
    union.union(&leaf.info.bounds);
  }
  assert_eq!(total, 2000);
  assert_eq!(root.info.bounds, union);
  assert!(root.info.geometric_error >= root.children[0].info.geometric_error);

  assert_eq!(output.report.partitions.len(), 1);
  assert_eq!(output.report.nodes_written, 73);
  assert_eq!(pipeline.writer().written().len(), 73);

  // Stores are staged under the temp dir and removed afterwards.
  assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

/// Two failed children and one written: the parent merges with the written
/// child's bounds only and is flagged partial.
#[test]
fn test_failed_children_do_not_block_merge() {
  let temp = tempfile::tempdir().unwrap();
  let mut config = config(temp.path());
  config.octree.max_depth = 1;
  let writer = RecordingWriter::new().failing_content(&["0", "2"]);
  let mut pipeline = pipeline(config, writer);

  let points = vec![
    RawPoint::new(DVec3::new(1.0, 1.0, 1.0), None),
    RawPoint::new(DVec3::new(6.0, 1.0, 1.0), None),
    RawPoint::new(DVec3::new(1.0, 6.0, 1.0), None),
  ];
  let source = InMemoryPoints::new("three", points)
    .with_header(BoundingBox::new(DVec3::ZERO, DVec3::splat(10.0)));
  let output = pipeline
    .build_tile(TileSource::Points(Box::new(source)))
    .unwrap();
  let root = output.root.unwrap();

  let states: Vec<(&str, TileState)> = root
    .children
    .iter()
    .map(|c| (c.address(), c.state))
    .collect();
  assert_eq!(
    states,
    vec![
      ("0", TileState::Failed),
      ("1", TileState::Merged),
      ("2", TileState::Failed),
    ]
  );
  assert!(root.children[0].failure.as_deref().unwrap().contains("injected failure"));

  assert_eq!(root.state, TileState::Merged);
  assert!(root.partial);
  assert_eq!(root.info.bounds, root.children[1].info.bounds);
  assert_eq!(
    root.info.bounds,
    BoundingBox::new(DVec3::new(6.0, 1.0, 1.0), DVec3::new(6.0, 1.0, 1.0))
  );

  assert_eq!(output.report.failures.len(), 2);
  assert!(output.report.has_failures());
  assert_eq!(
    pipeline.writer().refinement("root"),
    Some((vec!["1".to_string()], true))
  );
}

#[test]
fn test_refinement_failure_fails_parent_only() {
  let temp = tempfile::tempdir().unwrap();
  let writer = RecordingWriter::new().failing_refinement(&["root"]);
  let mut pipeline = pipeline(config(temp.path()), writer);

  let output = pipeline.build_tile(scene("sphere")).unwrap();
  let root = output.root.unwrap();
  assert_eq!(root.state, TileState::Failed);
  assert_eq!(root.children[0].state, TileState::Merged);
  assert_eq!(output.report.failures.len(), 1);
  assert_eq!(output.report.nodes_written, 3);
}

#[test]
fn test_non_finite_point_fails_root() {
  let temp = tempfile::tempdir().unwrap();
  let mut pipeline = pipeline(config(temp.path()), RecordingWriter::new());
  let source = InMemoryPoints::new("nan", vec![RawPoint::new(DVec3::NAN, None)])
    .with_header(BoundingBox::new(DVec3::ZERO, DVec3::ONE));

  let output = pipeline
    .build_tile(TileSource::Points(Box::new(source)))
    .unwrap();
  let root = output.root.unwrap();
  assert_eq!(root.state, TileState::Failed);
  assert_eq!(root.info.refine, Refine::Add);
  assert!(root.failure.unwrap().contains("non-finite"));
  assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[test]
fn test_unreadable_input_is_an_error() {
  let temp = tempfile::tempdir().unwrap();
  let mut pipeline = pipeline(config(temp.path()), RecordingWriter::new());
  let result = pipeline.build_tile(TileSource::Points(Box::new(BrokenStream)));
  assert!(matches!(result, Err(TilerError::InputRead { .. })));
}

#[test]
fn test_invalid_config_is_rejected() {
  let temp = tempfile::tempdir().unwrap();
  let mut config = config(temp.path());
  config.lods.clear();
  let result = TilePipeline::new(Arc::new(config), Arc::new(RecordingWriter::new()));
  assert!(matches!(result, Err(TilerError::Config(_))));
}

// =============================================================================
// Batches
// =============================================================================

#[test]
fn test_batch_skips_unreadable_inputs() {
  let temp = tempfile::tempdir().unwrap();
  let mut pipeline = pipeline(config(temp.path()), RecordingWriter::new());
  let inputs = vec![
    TileSource::Points(Box::new(BrokenStream)),
    scene("sphere"),
  ];

  let output = pipeline.run_batch(inputs).unwrap();
  assert_eq!(output.report.skipped_inputs.len(), 1);
  assert_eq!(output.report.skipped_inputs[0].input, "broken.xyz");
  assert_eq!(output.report.inputs_built, 1);
  assert!(output.report.has_failures());

  let root = output.root.unwrap();
  assert_eq!(root.address(), "root");
  assert_eq!(root.info.refine, Refine::Add);
  assert_eq!(root.children.len(), 1);
  assert_eq!(root.children[0].address(), "1");
  assert_eq!(root.children[0].info.refine, Refine::Replace);
  assert_eq!(pipeline.writer().written(), vec!["1", "1_0", "1_0_0"]);
}

#[test]
fn test_single_input_batch_keeps_addresses() {
  let temp = tempfile::tempdir().unwrap();
  let mut pipeline = pipeline(config(temp.path()), RecordingWriter::new());
  let output = pipeline.run_batch(vec![scene("sphere")]).unwrap();

  let root = output.root.unwrap();
  assert_eq!(root.address(), "root");
  assert_eq!(root.info.refine, Refine::Replace);
  assert_eq!(pipeline.writer().written(), vec!["0", "0_0", "root"]);
}

#[test]
fn test_batch_merges_trees() {
  let temp = tempfile::tempdir().unwrap();
  let mut pipeline = pipeline(config(temp.path()), RecordingWriter::new());
  let points = scattered_points(300, DVec3::splat(5.0), DVec3::splat(9.0), 4);
  let inputs = vec![scene("sphere"), cloud("cloud", points)];

  let output = pipeline.run_batch(inputs).unwrap();
  let root = output.root.unwrap();
  assert_eq!(output.report.inputs_built, 2);
  assert!(!output.report.has_failures());

  assert_eq!(root.state, TileState::Merged);
  assert_eq!(root.info.refine, Refine::Add);
  assert_eq!(root.children[0].address(), "0");
  assert_eq!(root.children[0].children[0].address(), "0_0");
  assert_eq!(root.children[1].address(), "1");
  assert!(root.children[1].children[0].address().starts_with("1_"));

  let expected = root.children[0]
    .info
    .bounds
    .unioned(&root.children[1].info.bounds);
  assert_eq!(root.info.bounds, expected);

  let (children, partial) = pipeline.writer().refinement("root").unwrap();
  assert!(!partial);
  assert_eq!(children, vec!["0".to_string(), "1".to_string()]);
}

#[test]
fn test_empty_batch() {
  let temp = tempfile::tempdir().unwrap();
  let mut pipeline = pipeline(config(temp.path()), RecordingWriter::new());
  let output = pipeline.run_batch(Vec::new()).unwrap();
  assert!(output.root.is_none());
  assert!(!output.report.has_failures());
}
