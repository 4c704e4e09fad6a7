//! Per-level and per-run statistics of an inspection run.

use adaptive_grid::gpu::KernelKind;
use adaptive_grid::{AdaptiveGrid, FrameStats, HostDevice};
use serde::Serialize;
use std::collections::BTreeMap;

/// One level of the final frame.
#[derive(Debug, Serialize)]
pub struct LevelReport {
	pub level: usize,
	pub resolution: u32,
	pub cell_size: f32,
	pub nodes: usize,
	/// Nodes with a merged mip tile.
	pub mips: usize,
}

/// Summary written after the last frame.
#[derive(Debug, Serialize)]
pub struct RunReport {
	pub frames: u64,
	pub levels: Vec<LevelReport>,
	pub image_slots: u32,
	pub atlas_side_length: u32,
	pub mip_atlas_side_length: u32,
	pub neighbor_pairs: usize,
	pub mip_neighbor_pairs: usize,
	pub particles: usize,
	/// Kernels of the last frame by kind.
	pub kernels: BTreeMap<String, usize>,
	pub device_bytes: u64,
	pub resize_frames: u64,
	/// Averages over the recent frame window.
	pub avg_rebuild_us: f64,
	pub avg_submit_us: f64,
}

impl RunReport {
	pub fn collect(
		grid: &AdaptiveGrid,
		device: &HostDevice,
		resize_frames: u64,
	) -> Self {
		let stats: &FrameStats = grid.stats();
		let metrics = grid.metrics();
		let levels = grid
			.grid()
			.levels()
			.iter()
			.enumerate()
			.map(|(level, data)| LevelReport {
				level,
				resolution: data.resolution(),
				cell_size: data.cell_size(),
				nodes: data.node_count(),
				mips: data.mip_count(),
			})
			.collect();

		let mut kernels = BTreeMap::new();
		for kind in device.dispatch_log() {
			*kernels.entry(kernel_name(*kind).to_string()).or_insert(0) += 1;
		}

		Self {
			frames: stats.frame_number,
			levels,
			image_slots: stats.image_slots,
			atlas_side_length: stats.atlas_side_length,
			mip_atlas_side_length: stats.mip_atlas_side_length,
			neighbor_pairs: stats.neighbor_pairs,
			mip_neighbor_pairs: stats.mip_neighbor_pairs,
			particles: stats.particle_count,
			kernels,
			device_bytes: device.allocated_bytes(),
			resize_frames,
			avg_rebuild_us: metrics.avg_rebuild_us(),
			avg_submit_us: metrics.avg_submit_us(),
		}
	}

	/// Human-readable table.
	pub fn print(&self) {
		println!("\nAfter {} frames:", self.frames);
		println!("  level  res   cell size      nodes   mips");
		for level in &self.levels {
			println!(
				"  {:>5}  {:>3}   {:>9.4}  {:>9}  {:>5}",
				level.level, level.resolution, level.cell_size, level.nodes, level.mips
			);
		}
		println!(
			"  atlas: {} slots in {}³ tiles, mip atlas {}³",
			self.image_slots, self.atlas_side_length, self.mip_atlas_side_length
		);
		println!(
			"  neighbors: {} pairs, {} mip pairs",
			self.neighbor_pairs, self.mip_neighbor_pairs
		);
		println!("  particles: {}", self.particles);
		let kernels: Vec<String> = self
			.kernels
			.iter()
			.map(|(name, count)| format!("{name} x{count}"))
			.collect();
		println!("  last frame kernels: {}", kernels.join(", "));
		println!(
			"  device memory: {:.2} MiB, {} frames resized resources",
			self.device_bytes as f64 / (1024.0 * 1024.0),
			self.resize_frames
		);
		println!(
			"  average rebuild: {:.1} µs, submit: {:.1} µs",
			self.avg_rebuild_us, self.avg_submit_us
		);
	}
}

fn kernel_name(kind: KernelKind) -> &'static str {
	match kind {
		KernelKind::ClearImage => "clear_image",
		KernelKind::FillTile => "fill_tile",
		KernelKind::GroundFog => "ground_fog",
		KernelKind::Particles => "particles",
		KernelKind::DebugFilling => "debug_filling",
		KernelKind::MipAveraging => "mip_averaging",
		KernelKind::MipMerging => "mip_merging",
		KernelKind::NeighborCopy => "neighbor_copy",
		KernelKind::Raymarch => "raymarch",
	}
}
