//! Run configuration: TOML file plus command-line overrides.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use tiler_core::TilerConfig;

/// Values given on the command line win over the file.
#[derive(Debug, Default)]
pub struct Overrides {
	pub weld_epsilon: Option<f64>,
	pub max_depth: Option<u32>,
	pub min_cell_size: Option<f64>,
	pub sampling_percent: Option<u8>,
	pub workers: Option<usize>,
	pub temp_dir: Option<PathBuf>,
}

/// Load the configuration, apply overrides and validate.
///
/// Without a file every setting starts from its default.
pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<TilerConfig> {
	let mut config = match path {
		Some(path) => parse(
			&std::fs::read_to_string(path)
				.with_context(|| format!("Failed to read config file: {}", path.display()))?,
		)
		.with_context(|| format!("Failed to parse config TOML: {}", path.display()))?,
		None => TilerConfig::default(),
	};

	apply(&mut config, overrides);
	config.validate().context("Invalid configuration")?;
	Ok(config)
}

fn parse(content: &str) -> Result<TilerConfig> {
	Ok(toml::from_str(content)?)
}

fn apply(config: &mut TilerConfig, overrides: Overrides) {
	if let Some(epsilon) = overrides.weld_epsilon {
		config.weld_epsilon = epsilon;
	}
	if let Some(depth) = overrides.max_depth {
		config.octree.max_depth = depth;
	}
	if let Some(size) = overrides.min_cell_size {
		config.octree.min_cell_size = size;
	}
	if let Some(percent) = overrides.sampling_percent {
		config.octree.sampling_percent = percent;
	}
	if let Some(workers) = overrides.workers {
		config.workers = workers;
	}
	if overrides.temp_dir.is_some() {
		config.temp_dir = overrides.temp_dir;
	}
}
