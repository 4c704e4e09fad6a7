//! Grid hierarchy - an arena of [`GridLevel`]s addressed by integer indices.
//!
//! Level 0 is a single root cell covering the whole extent; every following
//! level subdivides each cell of the previous one into `R`³ cells. Nodes are
//! instantiated lazily, only where content is inserted, and the whole arena
//! is rebuilt every frame.
//!
//! ```text
//! level 0   [root]                                  cell = extent
//!             │ active bits: R1³
//! level 1   [n0][n1][n2] ...                        cell = extent / R1
//!             │ active bits: R2³ per node
//! level 2   [n0][n1] ...                            cell = extent / (R1 * R2)
//! ```

pub mod level;
pub mod node;

pub use level::GridLevel;
pub use node::{
  has_mip_map, pack_atlas_offset, slot_to_tile, unpack_atlas_offset, with_mip_map_bit, ImageInfo,
  NodeData,
};

use glam::{IVec3, Vec3};

use crate::constants::grid_index;

/// All levels of one grid, coarsest first.
#[derive(Clone, Debug)]
pub struct GridHierarchy {
  extent: f32,
  levels: Vec<GridLevel>,
}

impl GridHierarchy {
  /// Build the level arena for a cubic grid of `extent` world units.
  ///
  /// # Panics
  ///
  /// If `resolutions` is empty.
  pub fn new(extent: f32, resolutions: &[u32]) -> Self {
    assert!(!resolutions.is_empty(), "grid needs at least one level");
    let mut global_resolution = 1u32;
    let levels = resolutions
      .iter()
      .enumerate()
      .map(|(i, &resolution)| {
        global_resolution *= resolution;
        let child_resolution = resolutions.get(i + 1).copied().unwrap_or(resolution);
        let cell_size = extent / global_resolution as f32;
        GridLevel::new(
          resolution,
          child_resolution,
          cell_size,
          i + 1 == resolutions.len(),
        )
      })
      .collect();
    Self { extent, levels }
  }

  /// Clear all levels for a new frame.
  pub fn reset(&mut self) {
    for level in &mut self.levels {
      level.reset();
    }
  }

  /// Whether a grid-space position lies inside the grid.
  #[inline]
  pub fn contains(&self, grid_pos: Vec3) -> bool {
    grid_pos.cmpge(Vec3::ZERO).all() && grid_pos.cmplt(Vec3::splat(self.extent)).all()
  }

  /// Insert the node of `level` containing `grid_pos`, creating missing
  /// ancestors first. Idempotent within a frame.
  ///
  /// # Panics
  ///
  /// If `grid_pos` lies outside the grid.
  pub fn add_node(&mut self, level: usize, grid_pos: Vec3) -> u32 {
    assert!(
      self.contains(grid_pos),
      "grid position {grid_pos} outside grid of extent {}",
      self.extent
    );
    self.add_node_recursive(level, grid_pos)
  }

  fn add_node_recursive(&mut self, level: usize, grid_pos: Vec3) -> u32 {
    let (parent, parent_global) = if level == 0 {
      (0, IVec3::ZERO)
    } else {
      let parent = self.add_node_recursive(level - 1, grid_pos);
      (parent, self.levels[level - 1].global_grid_pos(grid_pos))
    };

    let current = &self.levels[level];
    let resolution = current.resolution() as i32;
    let local = (current.global_grid_pos(grid_pos) - parent_global * resolution)
      .clamp(IVec3::ZERO, IVec3::splat(resolution - 1))
      .as_uvec3();

    let (node, created) = self.levels[level].insert(local, parent);
    if created && level > 0 {
      let index = grid_index(local, resolution as u32);
      self.levels[level - 1].register_child(parent, index, node);
    }
    node
  }

  /// Run `GridLevel::update` on every level, parent before child.
  ///
  /// Returns the total number of child-array entries.
  pub fn update_levels(&mut self) -> u32 {
    let mut child_offset = 0;
    let mut parent_image_offset = 0;
    for level in &mut self.levels {
      child_offset = level.update(child_offset, parent_image_offset);
      parent_image_offset = level.image_offset();
    }
    child_offset
  }

  /// Atlas slots needed this frame: every node plus every mip slot.
  pub fn image_slot_count(&self) -> u32 {
    self.levels.last().map_or(0, GridLevel::image_offset)
  }

  /// Pack tile coordinates on every level for the final atlas side length.
  pub fn update_image_indices(&mut self, atlas_side_length: u32) {
    for level in &mut self.levels {
      level.update_image_indices(atlas_side_length);
    }
  }

  /// Grid-space minimum corner of a node.
  pub fn node_origin(&self, level: usize, node: u32) -> Vec3 {
    let mut origin = Vec3::ZERO;
    let mut current = node;
    for tier in self.levels[..=level].iter().rev() {
      origin += tier.nodes().grid_pos(current).as_vec3() * tier.cell_size();
      current = tier.nodes().parent(current);
    }
    origin
  }

  /// Grid-space bounding box (min, max) of a node.
  pub fn node_bounds(&self, level: usize, node: u32) -> (Vec3, Vec3) {
    let min = self.node_origin(level, node);
    (min, min + Vec3::splat(self.levels[level].cell_size()))
  }

  #[inline]
  pub fn extent(&self) -> f32 {
    self.extent
  }

  #[inline]
  pub fn levels(&self) -> &[GridLevel] {
    &self.levels
  }

  #[inline]
  pub fn level(&self, index: usize) -> &GridLevel {
    &self.levels[index]
  }

  #[inline]
  pub fn level_count(&self) -> usize {
    self.levels.len()
  }

  /// Index of the most detailed level.
  #[inline]
  pub fn leaf_level(&self) -> usize {
    self.levels.len() - 1
  }

  /// Total nodes across all levels.
  pub fn node_count(&self) -> usize {
    self.levels.iter().map(GridLevel::node_count).sum()
  }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
