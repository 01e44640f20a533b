//! Filesystem tile writer and tileset metadata.
//!
//! Layout under the output directory:
//!
//! ```text
//! out/
//! ├── tileset.json
//! └── tiles/
//!     ├── root/content.json
//!     ├── root/children.json
//!     └── 3/3_5/content.json
//! ```

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tiler_core::{
	BoundingBox, ContentRef, Face, PointRecord, Refine, TileContent, TileInfo, TileNode, TileState,
	TileWriter, TilerError, Vertex,
};

const CONTENT_FILE: &str = "content.json";
const CHILDREN_FILE: &str = "children.json";

/// Writes each node under `tiles/<ancestors>/<address>/`.
///
/// Every node owns its own directory, so concurrent writes never touch the
/// same file.
pub struct FsTileWriter {
	root: PathBuf,
}

impl FsTileWriter {
	pub fn new(root: impl Into<PathBuf>) -> Result<Self, TilerError> {
		let root = root.into();
		fs::create_dir_all(root.join("tiles"))
			.map_err(|e| TilerError::io_at("creating output directory", &root, e))?;
		Ok(Self { root })
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn tile_dir(&self, tile: &TileInfo) -> PathBuf {
		let mut dir = self.root.join("tiles");
		dir.extend(tile.path_segments());
		dir
	}

	fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), TilerError> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).map_err(|e| TilerError::io_at("creating", parent, e))?;
		}
		let file = fs::File::create(path).map_err(|e| TilerError::io_at("creating", path, e))?;
		serde_json::to_writer(BufWriter::new(file), value)
			.map_err(|e| TilerError::io_at("writing", path, e.into()))
	}

	/// Write `tileset.json` for a finished tree.
	pub fn write_tileset(&self, root: &TileNode) -> Result<PathBuf, TilerError> {
		let path = self.root.join("tileset.json");
		let tileset = Tileset {
			asset: Asset { version: "1.0" },
			geometric_error: root.info.geometric_error,
			root: TilesetNode::from_tile(root),
		};
		self.write_json(&path, &tileset)?;
		Ok(path)
	}
}

/// Serialized body of one content file.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBody<'a> {
	Mesh {
		vertices: &'a [Vertex],
		faces: &'a [Face],
	},
	Points {
		points: &'a [PointRecord],
	},
}

#[derive(Serialize)]
struct Refinement<'a> {
	address: &'a str,
	bounds: &'a BoundingBox,
	geometric_error: f64,
	partial: bool,
	children: Vec<&'a str>,
}

impl TileWriter for FsTileWriter {
	fn write_content(&self, tile: &TileInfo, content: &TileContent) -> Result<(), TilerError> {
		let body = match content {
			TileContent::Mesh(mesh) => ContentBody::Mesh {
				vertices: &mesh.vertices,
				faces: &mesh.faces,
			},
			TileContent::Points(points) => ContentBody::Points { points },
			TileContent::Empty => return Ok(()),
		};
		let path = self.tile_dir(tile).join(CONTENT_FILE);
		tracing::trace!("writing {}", path.display());
		self.write_json(&path, &body)
	}

	fn write_refinement(
		&self,
		parent: &TileInfo,
		children: &[TileInfo],
		partial: bool,
	) -> Result<(), TilerError> {
		let refinement = Refinement {
			address: &parent.address,
			bounds: &parent.bounds,
			geometric_error: parent.geometric_error,
			partial,
			children: children.iter().map(|c| c.address.as_str()).collect(),
		};
		self.write_json(&self.tile_dir(parent).join(CHILDREN_FILE), &refinement)
	}
}

// =============================================================================
// tileset.json
// =============================================================================

#[derive(Serialize)]
struct Asset {
	version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Tileset {
	asset: Asset,
	geometric_error: f64,
	root: TilesetNode,
}

#[derive(Serialize)]
struct BoundingVolume {
	/// Center followed by the three half-axis vectors.
	#[serde(rename = "box")]
	oriented_box: [f64; 12],
}

#[derive(Serialize)]
struct ContentUri {
	uri: String,
}

#[derive(Serialize)]
struct Extras {
	address: String,
	state: TileState,
	#[serde(skip_serializing_if = "std::ops::Not::not")]
	partial: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	failure: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TilesetNode {
	bounding_volume: BoundingVolume,
	geometric_error: f64,
	refine: Refine,
	#[serde(skip_serializing_if = "Option::is_none")]
	content: Option<ContentUri>,
	extras: Extras,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	children: Vec<TilesetNode>,
}

impl TilesetNode {
	/// Failed nodes stay in the tree with their failure recorded; their
	/// children are kept when they were written.
	fn from_tile(tile: &TileNode) -> Self {
		let has_content = tile.state.is_written() && tile.info.content != ContentRef::None;
		let content = has_content.then(|| ContentUri {
			uri: format!("tiles/{}/{}", tile.info.path_segments().join("/"), CONTENT_FILE),
		});

		Self {
			bounding_volume: BoundingVolume {
				oriented_box: box_volume(&tile.info.bounds),
			},
			geometric_error: tile.info.geometric_error,
			refine: tile.info.refine,
			content,
			extras: Extras {
				address: tile.info.address.clone(),
				state: tile.state,
				partial: tile.partial,
				failure: tile.failure.clone(),
			},
			children: tile.children.iter().map(Self::from_tile).collect(),
		}
	}
}

fn box_volume(bounds: &BoundingBox) -> [f64; 12] {
	if bounds.is_empty() {
		return [0.0; 12];
	}
	let c = bounds.center();
	let h = bounds.size() * 0.5;
	[c.x, c.y, c.z, h.x, 0.0, 0.0, 0.0, h.y, 0.0, 0.0, 0.0, h.z]
}

#[cfg(test)]
mod tests {
	use super::*;
	use glam::DVec3;

	fn info(address: &str, content: ContentRef) -> TileInfo {
		TileInfo {
			address: address.to_string(),
			level: 1,
			bounds: BoundingBox::new(DVec3::ZERO, DVec3::new(2.0, 4.0, 6.0)),
			geometric_error: 1.5,
			refine: Refine::Add,
			content,
		}
	}

	#[test]
	fn test_content_lands_under_ancestors() {
		let dir = tempfile::tempdir().unwrap();
		let writer = FsTileWriter::new(dir.path()).unwrap();

		let points = vec![PointRecord::new(DVec3::ONE, [1, 2, 3])];
		writer
			.write_content(&info("3_5", ContentRef::PointLeaf { points: 1 }), &TileContent::Points(points))
			.unwrap();

		let path = dir.path().join("tiles/3/3_5/content.json");
		let value: serde_json::Value = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
		assert_eq!(value["type"], "points");
		assert_eq!(value["points"].as_array().unwrap().len(), 1);
	}

	#[test]
	fn test_empty_content_writes_nothing() {
		let dir = tempfile::tempdir().unwrap();
		let writer = FsTileWriter::new(dir.path()).unwrap();
		writer.write_content(&info("0", ContentRef::None), &TileContent::Empty).unwrap();
		assert!(!dir.path().join("tiles/0").exists());
	}

	#[test]
	fn test_refinement_lists_children() {
		let dir = tempfile::tempdir().unwrap();
		let writer = FsTileWriter::new(dir.path()).unwrap();
		let children = [info("0", ContentRef::None), info("2", ContentRef::None)];
		writer.write_refinement(&info("root", ContentRef::None), &children, true).unwrap();

		let bytes = fs::read(dir.path().join("tiles/root/children.json")).unwrap();
		let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
		assert_eq!(value["children"], serde_json::json!(["0", "2"]));
		assert_eq!(value["partial"], true);
	}

	#[test]
	fn test_tileset_marks_failures() {
		let dir = tempfile::tempdir().unwrap();
		let writer = FsTileWriter::new(dir.path()).unwrap();

		let leaf = TileNode {
			info: info("0", ContentRef::PointLeaf { points: 10 }),
			state: TileState::Merged,
			partial: false,
			failure: None,
			children: Vec::new(),
		};
		let failed = TileNode {
			info: info("1", ContentRef::PointLeaf { points: 10 }),
			state: TileState::Failed,
			partial: false,
			failure: Some("disk full".into()),
			children: Vec::new(),
		};
		let root = TileNode {
			info: info("root", ContentRef::None),
			state: TileState::Merged,
			partial: true,
			failure: None,
			children: vec![leaf, failed],
		};

		let path = writer.write_tileset(&root).unwrap();
		let value: serde_json::Value = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();

		let root = &value["root"];
		assert_eq!(root["refine"], "ADD");
		assert_eq!(root["extras"]["partial"], true);
		assert!(root.get("content").is_none());
		assert_eq!(
			root["boundingVolume"]["box"],
			serde_json::json!([1.0, 2.0, 3.0, 1.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 3.0])
		);

		let children = root["children"].as_array().unwrap();
		assert_eq!(children[0]["content"]["uri"], "tiles/0/content.json");
		assert!(children[1].get("content").is_none());
		assert_eq!(children[1]["extras"]["state"], "failed");
		assert_eq!(children[1]["extras"]["failure"], "disk full");
	}

	#[test]
	fn test_pipeline_writes_tileset() {
		use std::sync::Arc;
		use tiler_core::{InMemoryPoints, RawPoint, TilePipeline, TileSource, TilerConfig};

		let dir = tempfile::tempdir().unwrap();
		let mut config = TilerConfig::default();
		config.workers = 2;
		config.temp_dir = Some(dir.path().join("tmp"));
		config.octree.max_depth = 1;

		let points = (0..8)
			.map(|i| {
				let corner = DVec3::new((i & 1) as f64, ((i >> 1) & 1) as f64, ((i >> 2) & 1) as f64);
				RawPoint::new(corner * 8.0, None)
			})
			.collect();
		let source = InMemoryPoints::new("corners", points);

		let writer = Arc::new(FsTileWriter::new(dir.path().join("out")).unwrap());
		let mut pipeline = TilePipeline::new(Arc::new(config), writer.clone()).unwrap();
		let output = pipeline.run_batch(vec![TileSource::Points(Box::new(source))]).unwrap();
		assert!(!output.report.has_failures());

		let root = output.root.unwrap();
		assert_eq!(root.children.len(), 8);
		writer.write_tileset(&root).unwrap();

		let out = dir.path().join("out");
		assert!(out.join("tiles/root/children.json").exists());
		assert!(out.join("tiles/0/content.json").exists());
		assert!(out.join("tiles/7/content.json").exists());

		let bytes = fs::read(out.join("tileset.json")).unwrap();
		let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
		assert_eq!(value["root"]["children"].as_array().unwrap().len(), 8);
	}
}
