//! Reference input readers.
//!
//! - `.xyz` / `.txt`: ASCII points, one `x y z [r g b]` per line
//! - `.json`: a serialized [`Mesh`]

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use glam::DVec3;
use tiler_core::{BoundingBox, Mesh, PointSource, RawPoint, SceneSource, TileSource, TilerError};

/// Pick a reader from the file extension.
pub fn open(path: &Path) -> Result<TileSource, TilerError> {
	let extension = path
		.extension()
		.and_then(|e| e.to_str())
		.map(str::to_ascii_lowercase);
	match extension.as_deref() {
		Some("xyz") | Some("txt") => Ok(TileSource::Points(Box::new(XyzPointSource::new(path)))),
		Some("json") => Ok(TileSource::Scene(Box::new(JsonSceneSource::new(path)))),
		_ => Err(TilerError::input(
			path.display().to_string(),
			"unsupported extension (expected .xyz, .txt or .json)",
		)),
	}
}

// =============================================================================
// ASCII points
// =============================================================================

/// Streams points from a whitespace separated text file.
///
/// The file carries no header, so [`read_header`](PointSource::read_header)
/// scans it once for bounds; points are then streamed in a second pass.
pub struct XyzPointSource {
	path: PathBuf,
	name: String,
	lines: Option<std::io::Lines<BufReader<File>>>,
	line_no: usize,
}

impl XyzPointSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		let path = path.into();
		Self {
			name: path.display().to_string(),
			path,
			lines: None,
			line_no: 0,
		}
	}

	fn reader(&self) -> Result<std::io::Lines<BufReader<File>>, TilerError> {
		let file = File::open(&self.path).map_err(|e| TilerError::input(&self.name, e.to_string()))?;
		Ok(BufReader::new(file).lines())
	}

	fn parse(&self, line: &str) -> Result<Option<RawPoint>, TilerError> {
		let line = line.trim();
		if line.is_empty() || line.starts_with('#') {
			return Ok(None);
		}
		let fields: Vec<&str> = line.split_whitespace().collect();
		let bad = |what: &str| {
			TilerError::input(&self.name, format!("line {}: {}", self.line_no, what))
		};

		if fields.len() != 3 && fields.len() != 6 {
			return Err(bad("expected `x y z` or `x y z r g b`"));
		}
		let mut xyz = [0.0; 3];
		for (slot, field) in xyz.iter_mut().zip(&fields[..3]) {
			*slot = field.parse().map_err(|_| bad("coordinate is not a number"))?;
		}
		let color = if fields.len() == 6 {
			let mut rgb = [0u8; 3];
			for (slot, field) in rgb.iter_mut().zip(&fields[3..]) {
				*slot = field.parse().map_err(|_| bad("color channel is not in 0..=255"))?;
			}
			Some(rgb)
		} else {
			None
		};
		Ok(Some(RawPoint::new(DVec3::from_array(xyz), color)))
	}
}

impl PointSource for XyzPointSource {
	fn name(&self) -> &str {
		&self.name
	}

	fn read_header(&mut self) -> Result<BoundingBox, TilerError> {
		let mut bounds = BoundingBox::EMPTY;
		self.line_no = 0;
		for line in self.reader()? {
			self.line_no += 1;
			let line = line.map_err(|e| TilerError::input(&self.name, e.to_string()))?;
			if let Some(point) = self.parse(&line)? {
				if point.position.is_finite() {
					bounds.add_point(point.position);
				}
			}
		}
		if bounds.is_empty() {
			return Err(TilerError::input(&self.name, "no points"));
		}
		tracing::debug!("{}: {} lines scanned", self.name, self.line_no);

		self.lines = Some(self.reader()?);
		self.line_no = 0;
		Ok(bounds)
	}

	fn next_point(&mut self) -> Result<Option<RawPoint>, TilerError> {
		if self.lines.is_none() {
			self.lines = Some(self.reader()?);
		}
		loop {
			let next = self.lines.as_mut().and_then(|lines| lines.next());
			let Some(line) = next else {
				return Ok(None);
			};
			self.line_no += 1;
			let line = line.map_err(|e| TilerError::input(&self.name, e.to_string()))?;
			if let Some(point) = self.parse(&line)? {
				return Ok(Some(point));
			}
		}
	}
}

// =============================================================================
// JSON scenes
// =============================================================================

/// Loads a whole [`Mesh`] from JSON.
pub struct JsonSceneSource {
	path: PathBuf,
	name: String,
}

impl JsonSceneSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		let path = path.into();
		Self {
			name: path.display().to_string(),
			path,
		}
	}
}

impl SceneSource for JsonSceneSource {
	fn name(&self) -> &str {
		&self.name
	}

	fn load(&mut self) -> Result<Mesh, TilerError> {
		let file = File::open(&self.path).map_err(|e| TilerError::input(&self.name, e.to_string()))?;
		serde_json::from_reader(BufReader::new(file))
			.map_err(|e| TilerError::input(&self.name, e.to_string()))
	}
}
