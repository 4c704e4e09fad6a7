//! GroundFog - a height fog layer resolved on level 1.
//!
//! Grid space Y grows downward from the fog's point of view: fog occupies
//! `[grid_space_height, extent]`. Only the single layer of level-1 cells
//! containing the fog surface is refined; the kernel fills every texel of
//! that layer at or beyond the surface and weights the edge texel by the
//! fraction it is covered.
//!
//! ```text
//!   y = 0 ─────────────────────────
//!              (clear)
//!   grid_space_height ─ ─ ─ ─ ─ ─ ─   <- surface inside the cell layer at grid_y
//!   ░░░░░░░░░░░░ fog ░░░░░░░░░░░░░
//!   y = extent ────────────────────
//! ```

use glam::Vec3;

use super::GridVolume;
use crate::config::GroundFogSettings;
use crate::gpu::layout::{FogCell, FogConstants};
use crate::grid::{pack_atlas_offset, GridHierarchy};

/// Level the fog layer is inserted into.
pub const FOG_LEVEL: usize = 1;

#[derive(Clone, Debug, Default)]
pub struct GroundFog {
  settings: GroundFogSettings,
  nodes: Vec<u32>,
  cells: Vec<FogCell>,
  constants: FogConstants,
}

impl GroundFog {
  pub fn new(settings: GroundFogSettings) -> Self {
    Self {
      settings,
      ..Default::default()
    }
  }

  pub fn set_settings(&mut self, settings: GroundFogSettings) {
    self.settings = settings;
  }

  /// A zero height fraction disables the fog.
  #[inline]
  pub fn is_enabled(&self) -> bool {
    self.settings.height_fraction > 0.0
  }

  /// Grid-space Y of the fog surface.
  #[inline]
  pub fn grid_space_height(&self, extent: f32) -> f32 {
    extent - self.settings.height_fraction * extent
  }

  /// Level-1 cell row holding the fog surface.
  pub fn grid_y(&self, extent: f32, cell_size: f32, resolution: u32) -> u32 {
    let row = (self.grid_space_height(extent) / cell_size).floor() as i64;
    row.clamp(0, resolution as i64 - 1) as u32
  }

  pub fn cells(&self) -> &[FogCell] {
    &self.cells
  }

  pub fn constants(&self) -> &FogConstants {
    &self.constants
  }

  fn update_constants(&mut self, extent: f32, texel_size: f32) {
    let medium = &self.settings.medium;
    self.constants = FogConstants {
      scattering: medium.scattering,
      extinction: medium.extinction(),
      phase_g: medium.phase_g,
      texel_world_size: texel_size,
      noise_scale: self.settings.noise_scale,
      grid_space_height: self.grid_space_height(extent),
      padding: [0; 2],
    };
  }
}

impl GridVolume for GroundFog {
  fn name(&self) -> &'static str {
    "ground_fog"
  }

  fn insert_nodes(&mut self, grid: &mut GridHierarchy) {
    self.nodes.clear();
    if !self.is_enabled() || grid.level_count() <= FOG_LEVEL {
      return;
    }

    let extent = grid.extent();
    let level = grid.level(FOG_LEVEL);
    let cell_size = level.cell_size();
    let resolution = level.resolution();
    let grid_y = self.grid_y(extent, cell_size, resolution);
    self.update_constants(extent, level.texel_size());

    for z in 0..resolution {
      for x in 0..resolution {
        let center = (Vec3::new(x as f32, grid_y as f32, z as f32) + Vec3::splat(0.5)) * cell_size;
        self.nodes.push(grid.add_node(FOG_LEVEL, center));
      }
    }
  }

  fn update_records(&mut self, grid: &GridHierarchy) {
    self.cells.clear();
    for &node in &self.nodes {
      let origin = grid.node_origin(FOG_LEVEL, node);
      let tile = grid.level(FOG_LEVEL).nodes().image_info(node).tile;
      self.cells.push(FogCell {
        world_offset: origin.to_array(),
        image_offset: pack_atlas_offset(tile),
      });
    }
  }
}

#[cfg(test)]
#[path = "ground_fog_test.rs"]
mod ground_fog_test;
