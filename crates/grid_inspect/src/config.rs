//! Scene file parsing for grid inspection.
//!
//! ```toml
//! [run]
//! frames = 120
//! dt = 0.016
//!
//! [grid]
//! extent = 512.0
//! level_resolutions = [1, 16, 16]
//! ```

use adaptive_grid::GridConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Root of a scene file.
#[derive(Debug, Deserialize)]
pub struct SceneConfig {
	/// How the scene is stepped.
	#[serde(default)]
	pub run: RunSettings,
	/// Grid layout and volumes.
	#[serde(default)]
	pub grid: GridConfig,
}

/// Frame stepping of an inspection run.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunSettings {
	/// Frames to simulate.
	pub frames: u32,
	/// Seconds per frame.
	pub dt: f32,
	/// Host device memory budget in bytes (unlimited if absent).
	pub memory_budget: Option<u64>,
}

impl Default for RunSettings {
	fn default() -> Self {
		Self {
			frames: 60,
			dt: 1.0 / 60.0,
			memory_budget: None,
		}
	}
}

impl SceneConfig {
	/// Load a scene from a TOML file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read scene file: {}", path.display()))?;
		let scene: SceneConfig =
			toml::from_str(&content).with_context(|| "Failed to parse scene TOML")?;

		scene
			.grid
			.validate()
			.with_context(|| format!("Invalid grid in {}", path.display()))?;
		if scene.run.frames == 0 {
			anyhow::bail!("run.frames must be at least 1");
		}
		if !(scene.run.dt >= 0.0) {
			anyhow::bail!("run.dt must be non-negative, got {}", scene.run.dt);
		}

		Ok(scene)
	}
}
