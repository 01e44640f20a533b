//! Tiler command-line front end.
//!
//! Reads point clouds (`.xyz`) and meshes (`.json`), runs them through the
//! tile pipeline and writes the tile hierarchy plus `tileset.json`.
//!
//! Exit status is non-zero when any node failed or any input was skipped.

mod config;
mod sources;
mod writer;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tiler_core::{NodeFailure, TilePipeline, TileSource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Overrides;
use writer::FsTileWriter;

/// Out-of-core tiling of meshes and point clouds.
#[derive(Parser, Debug)]
#[command(name = "tiler")]
#[command(about = "Builds a multi-resolution tile hierarchy from meshes and point clouds")]
struct Args {
	/// Input files (.xyz/.txt points, .json meshes).
	#[arg(required = true)]
	inputs: Vec<PathBuf>,

	/// Output directory.
	#[arg(short, long, default_value = "tiles_out")]
	output: PathBuf,

	/// Path to configuration TOML file.
	#[arg(short, long)]
	config: Option<PathBuf>,

	/// Per-axis weld tolerance.
	#[arg(long)]
	weld_epsilon: Option<f64>,

	/// Maximum octree depth.
	#[arg(long)]
	max_depth: Option<u32>,

	/// Smallest octree cell that may still split.
	#[arg(long)]
	min_cell_size: Option<f64>,

	/// Percentage of points kept (1-100).
	#[arg(long)]
	sampling: Option<u8>,

	/// Worker threads (0 = one per CPU).
	#[arg(short = 'j', long)]
	workers: Option<usize>,

	/// Directory for temporary point stores.
	#[arg(long)]
	temp_dir: Option<PathBuf>,

	/// Also write the run report as JSON.
	#[arg(long)]
	report: Option<PathBuf>,

	/// Only log warnings and errors.
	#[arg(short, long, conflicts_with = "verbose")]
	quiet: bool,

	/// Log per-node progress.
	#[arg(short, long)]
	verbose: bool,
}

fn main() -> Result<ExitCode> {
	let args = Args::parse();
	init_logging(&args);

	let overrides = Overrides {
		weld_epsilon: args.weld_epsilon,
		max_depth: args.max_depth,
		min_cell_size: args.min_cell_size,
		sampling_percent: args.sampling,
		workers: args.workers,
		temp_dir: args.temp_dir.clone(),
	};
	let config = config::load(args.config.as_deref(), overrides)?;

	let (inputs, skipped) = open_inputs(&args.inputs);

	let writer = Arc::new(
		FsTileWriter::new(&args.output)
			.with_context(|| format!("Failed to create output dir: {}", args.output.display()))?,
	);
	let mut pipeline =
		TilePipeline::new(Arc::new(config), writer.clone()).context("Failed to start pipeline")?;

	tracing::info!("tiling {} input(s) into {}", inputs.len(), writer.root().display());
	let mut output = pipeline.run_batch(inputs).context("Tiling run aborted")?;
	output.report.skipped_inputs.extend(skipped);

	if let Some(root) = &output.root {
		let path = writer.write_tileset(root).context("Failed to write tileset")?;
		tracing::info!("wrote {}", path.display());
	}
	if let Some(path) = &args.report {
		let json = serde_json::to_string_pretty(&output.report)?;
		std::fs::write(path, json)
			.with_context(|| format!("Failed to write report: {}", path.display()))?;
	}

	print!("{}", output.report);
	if output.report.has_failures() {
		return Ok(ExitCode::FAILURE);
	}
	Ok(ExitCode::SUCCESS)
}

/// Open every input by extension. Inputs that cannot be opened are skipped
/// and returned as failures.
fn open_inputs(paths: &[PathBuf]) -> (Vec<TileSource>, Vec<NodeFailure>) {
	let mut inputs = Vec::with_capacity(paths.len());
	let mut skipped = Vec::new();
	for path in paths {
		match sources::open(path) {
			Ok(source) => inputs.push(source),
			Err(err) => {
				tracing::warn!("skipping input '{}': {}", path.display(), err);
				skipped.push(NodeFailure::input(&path.display().to_string(), &err));
			}
		}
	}
	(inputs, skipped)
}

/// `RUST_LOG` wins; otherwise `info`, lowered by `--quiet`, raised by `--verbose`.
fn init_logging(args: &Args) {
	let level = if args.quiet {
		"warn"
	} else if args.verbose {
		"debug"
	} else {
		"info"
	};
	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
		.with(tracing_subscriber::fmt::layer().with_target(false))
		.init();
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;

	#[test]
	fn test_args_are_consistent() {
		Args::command().debug_assert();
	}

	#[test]
	fn test_unsupported_input_is_skipped() {
		let dir = tempfile::tempdir().unwrap();
		let cloud = dir.path().join("cloud.xyz");
		std::fs::write(&cloud, "0 0 0\n1 1 1\n").unwrap();
		let paths = vec![PathBuf::from("a.las"), cloud];

		let (inputs, skipped) = open_inputs(&paths);
		assert_eq!(inputs.len(), 1);
		assert!(matches!(inputs[0], TileSource::Points(_)));
		assert_eq!(skipped.len(), 1);
		assert_eq!(skipped[0].input, "a.las");
		assert!(skipped[0].address.is_none());
	}

	#[test]
	fn test_quiet_conflicts_with_verbose() {
		assert!(Args::try_parse_from(["tiler", "a.xyz", "-q", "-v"]).is_err());
		let args = Args::try_parse_from(["tiler", "a.xyz", "b.json", "-j", "2"]).unwrap();
		assert_eq!(args.inputs.len(), 2);
		assert_eq!(args.workers, Some(2));
	}
}
