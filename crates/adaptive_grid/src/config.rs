//! GridConfig - world extent, level layout and the media that fill the grid.
//!
//! Everything here is plain data that survives across frames. The sparse
//! structure itself is rebuilt from scratch every frame from this config.
//!
//! ```toml
//! world_min = [-256.0, -256.0, -256.0]
//! extent = 512.0
//! level_resolutions = [1, 16, 16]
//!
//! [global]
//! scattering = 0.01
//!
//! [ground_fog]
//! height_fraction = 0.2
//! medium = { scattering = 0.3, absorption = 0.05, phase_g = 0.2 }
//! ```

use std::path::Path;

use glam::{Vec3, Vec4};
use serde::Deserialize;

use crate::constants::NODE_RESOLUTION;
use crate::error::{GridError, GridResult};

/// Root configuration of an [`AdaptiveGrid`](crate::AdaptiveGrid).
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct GridConfig {
  /// World-space minimum corner of the grid.
  pub world_min: [f32; 3],

  /// Edge length of the cubic grid in world units.
  pub extent: f32,

  /// Cells per axis for every level, coarsest first.
  pub level_resolutions: Vec<u32>,

  /// Number of GPU frames that may be in flight at once.
  pub frames_in_flight: usize,

  /// Shadow ray samples per cell, used to derive per-level step sizes.
  pub shadow_rays_per_level: u32,

  /// Homogeneous medium filling the root tile.
  pub global: MediumSettings,

  /// Height fog layer.
  pub ground_fog: GroundFogSettings,

  /// Particle systems inserted into the leaf level.
  pub particles: Vec<ParticleSystemSettings>,

  /// Fixed nodes inserted every frame with a constant medium.
  pub debug_nodes: Vec<DebugNodeSettings>,
}

impl GridConfig {
  /// Parse and validate a TOML document.
  pub fn from_toml_str(source: &str) -> GridResult<Self> {
    let config: GridConfig = toml::from_str(source)?;
    config.validate()?;
    Ok(config)
  }

  /// Load and validate a TOML file.
  pub fn load(path: &Path) -> GridResult<Self> {
    let content = std::fs::read_to_string(path)?;
    let config = Self::from_toml_str(&content)?;
    log::info!("Loaded grid config from {}", path.display());
    Ok(config)
  }

  /// Check the invariants the rebuild relies on.
  pub fn validate(&self) -> GridResult<()> {
    let levels = &self.level_resolutions;
    if levels.len() < 2 {
      return Err(invalid(format!(
        "at least 2 levels required, found {}",
        levels.len()
      )));
    }
    if levels[0] != 1 {
      return Err(invalid(format!(
        "root level resolution must be 1, got {}",
        levels[0]
      )));
    }
    if let Some((index, res)) = levels
      .iter()
      .enumerate()
      .skip(1)
      .find(|&(_, &res)| res != NODE_RESOLUTION)
    {
      return Err(invalid(format!(
        "level {} resolution must be {}, got {}",
        index, NODE_RESOLUTION, res
      )));
    }
    if !(self.extent.is_finite() && self.extent > 0.0) {
      return Err(invalid(format!("extent must be positive, got {}", self.extent)));
    }
    if self.frames_in_flight == 0 {
      return Err(invalid("frames_in_flight must be at least 1".into()));
    }
    if self.shadow_rays_per_level == 0 {
      return Err(invalid("shadow_rays_per_level must be at least 1".into()));
    }
    if !(0.0..=1.0).contains(&self.ground_fog.height_fraction) {
      return Err(invalid(format!(
        "ground_fog.height_fraction must be in [0, 1], got {}",
        self.ground_fog.height_fraction
      )));
    }
    for node in &self.debug_nodes {
      if node.level >= levels.len() {
        return Err(invalid(format!(
          "debug node level {} out of range (levels: {})",
          node.level,
          levels.len()
        )));
      }
    }
    for system in &self.particles {
      system.validate()?;
    }
    Ok(())
  }

  /// World-space minimum corner as a vector.
  #[inline]
  pub fn world_min(&self) -> Vec3 {
    Vec3::from_array(self.world_min)
  }

  /// Number of levels.
  #[inline]
  pub fn level_count(&self) -> usize {
    self.level_resolutions.len()
  }
}

impl Default for GridConfig {
  fn default() -> Self {
    Self {
      world_min: [-256.0; 3],
      extent: 512.0,
      level_resolutions: crate::constants::DEFAULT_LEVEL_RESOLUTIONS.to_vec(),
      frames_in_flight: 2,
      shadow_rays_per_level: 4,
      global: MediumSettings::default(),
      ground_fog: GroundFogSettings::default(),
      particles: Vec::new(),
      debug_nodes: Vec::new(),
    }
  }
}

fn invalid(message: String) -> GridError {
  GridError::InvalidConfig(message)
}

/// Participating medium coefficients.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct MediumSettings {
  pub scattering: f32,
  pub absorption: f32,
  /// Henyey-Greenstein anisotropy.
  pub phase_g: f32,
}

impl MediumSettings {
  pub const fn new(scattering: f32, absorption: f32, phase_g: f32) -> Self {
    Self {
      scattering,
      absorption,
      phase_g,
    }
  }

  #[inline]
  pub fn extinction(&self) -> f32 {
    self.scattering + self.absorption
  }

  /// True when the medium contributes nothing.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.scattering == 0.0 && self.extinction() == 0.0
  }

  /// Texel value stored in the atlas: (scattering, extinction, g, 0).
  #[inline]
  pub fn texel(&self) -> Vec4 {
    Vec4::new(self.scattering, self.extinction(), self.phase_g, 0.0)
  }
}

/// Height fog settings. A zero `height_fraction` disables the fog.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct GroundFogSettings {
  /// Fraction of the grid extent covered by fog, measured from the far Y side.
  pub height_fraction: f32,
  pub medium: MediumSettings,
  pub noise_scale: f32,
}

/// One particle system.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParticleSystemSettings {
  pub name: String,
  pub medium: MediumSettings,
  /// Static particles, world space.
  pub particles: Vec<ParticleSettings>,
  /// Optional emitter simulated every frame.
  pub emitter: Option<EmitterSettings>,
}

impl ParticleSystemSettings {
  /// Check radii and emitter ranges. Also run for systems added after
  /// construction, since the emitter samples these ranges every frame.
  pub fn validate(&self) -> GridResult<()> {
    if let Some(p) = self
      .particles
      .iter()
      .find(|p| !(p.radius.is_finite() && p.radius > 0.0))
    {
      return Err(invalid(format!(
        "{}: particle radius must be positive and finite, got {}",
        self.name, p.radius
      )));
    }
    let Some(emitter) = &self.emitter else {
      return Ok(());
    };
    let radii_finite = emitter.min_radius.is_finite() && emitter.max_radius.is_finite();
    if !radii_finite || emitter.min_radius <= 0.0 || emitter.max_radius < emitter.min_radius {
      return Err(invalid(format!(
        "{}: emitter radius range [{}, {}] is invalid",
        self.name, emitter.min_radius, emitter.max_radius
      )));
    }
    if !(emitter.spawn_radius.is_finite() && emitter.spawn_radius >= 0.0) {
      return Err(invalid(format!(
        "{}: emitter spawn_radius must be finite and not negative, got {}",
        self.name, emitter.spawn_radius
      )));
    }
    Ok(())
  }
}

/// Static particle in world space.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct ParticleSettings {
  pub position: [f32; 3],
  pub radius: f32,
}

/// Emitter that spawns, advects and kills particles.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmitterSettings {
  /// World-space spawn center.
  pub position: [f32; 3],
  /// Half extent of the spawn cube.
  pub spawn_radius: f32,
  pub max_particles: usize,
  pub emissions_per_second: f32,
  /// Seconds before a particle is removed.
  pub lifetime: f32,
  /// Downward speed in world units per second.
  pub speed: f32,
  pub min_radius: f32,
  pub max_radius: f32,
  pub seed: u64,
}

impl Default for EmitterSettings {
  fn default() -> Self {
    Self {
      position: [0.0; 3],
      spawn_radius: 1.0,
      max_particles: 40,
      emissions_per_second: 5.0,
      lifetime: 15.0,
      speed: 0.5,
      min_radius: 0.1,
      max_radius: 1.0,
      seed: 0,
    }
  }
}

/// Node inserted at a fixed world position on a given level.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct DebugNodeSettings {
  pub level: usize,
  pub position: [f32; 3],
  #[serde(default)]
  pub medium: MediumSettings,
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
