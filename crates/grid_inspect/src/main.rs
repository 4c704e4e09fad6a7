//! Adaptive grid inspector.
//!
//! Loads a scene, steps it on the host device and prints what the grid
//! looks like after the last frame:
//! - nodes and mip tiles per level
//! - atlas and mip atlas sizes
//! - neighbor pairs and the kernels of the last frame
//! - device memory and how often resources were recreated

mod config;
mod report;

use adaptive_grid::{AdaptiveGrid, HostDevice};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use config::SceneConfig;
use report::RunReport;

/// Adaptive grid inspector.
#[derive(Parser, Debug)]
#[command(name = "grid_inspect")]
#[command(about = "Steps an adaptive grid scene on the CPU and reports per-level statistics")]
struct Args {
	/// Path to scene TOML file.
	#[arg(short, long)]
	scene: PathBuf,

	/// Frames to simulate (overrides the scene file).
	#[arg(short, long)]
	frames: Option<u32>,

	/// Seconds per frame (overrides the scene file).
	#[arg(long)]
	dt: Option<f32>,

	/// Write the report as TOML to this path.
	#[arg(short, long)]
	output: Option<PathBuf>,
}

fn main() -> Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
	let args = Args::parse();

	println!("Loading scene from: {}", args.scene.display());
	let scene = SceneConfig::load(&args.scene)?;
	let frames = args.frames.unwrap_or(scene.run.frames);
	let dt = args.dt.unwrap_or(scene.run.dt);

	let mut device = match scene.run.memory_budget {
		Some(budget) => HostDevice::with_memory_budget(budget),
		None => HostDevice::new(),
	};
	let mut grid = AdaptiveGrid::new(scene.grid).context("Failed to create grid")?;

	println!("Simulating {} frames at dt = {:.4} s", frames, dt);

	let mut resize_frames = 0;
	for frame in 0..frames {
		// Keep only the last frame's kernels.
		device.clear_dispatch_log();
		let stats = grid
			.update(&mut device, dt)
			.with_context(|| format!("Frame {} failed", frame))?;
		if stats.resized_buffers > 0 || stats.atlas_resized {
			resize_frames += 1;
			log::info!(
				"frame {}: {} buffers recreated, atlas {}³",
				frame,
				stats.resized_buffers,
				stats.atlas_side_length
			);
		}
	}

	let report = RunReport::collect(&grid, &device, resize_frames);
	report.print();

	if let Some(path) = &args.output {
		let text = toml::to_string_pretty(&report).context("Failed to serialize report")?;
		std::fs::write(path, text)
			.with_context(|| format!("Failed to write: {}", path.display()))?;
		println!("\nReport written to: {}", path.display());
	}

	Ok(())
}
