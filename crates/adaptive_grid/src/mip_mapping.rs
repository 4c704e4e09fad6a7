//! MipMapping - per-frame lists that drive mip-map averaging and merging.
//!
//! Every parent with children owns one reserved slot in the main atlas
//! (its *merged* tile) and one tile in the separate mip atlas (its *averaged*
//! tile). Each child contributes exactly one averaged texel, located at the
//! child's local grid position inside the parent's mip tile.
//!
//! ```text
//!   averaging (level L):   mip[parent] = 0;  mip[parent][child.grid_pos] = mean(child tile)
//!   merging   (level L):   atlas[parent.mip_slot] = atlas[parent.slot] + mip[parent]
//! ```
//!
//! Levels are dispatched from the most detailed parent level up to the root,
//! so a child that is itself a parent is already merged when it is averaged.

use crate::atlas::ImageAtlas;
use crate::constants::MIP_IMAGE_RESOLUTION;
use crate::error::GpuError;
use crate::gpu::layout::{MipChildEntry, MipParentEntry};
use crate::gpu::GpuDevice;
use crate::grid::{pack_atlas_offset, slot_to_tile, unpack_atlas_offset, GridLevel};

/// Entry ranges of one parent level inside the shared lists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LevelMipRange {
  pub child_start: u32,
  pub child_count: u32,
  pub parent_start: u32,
  pub parent_count: u32,
}

impl LevelMipRange {
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.parent_count == 0
  }
}

/// Mip entry lists plus the mip atlas.
#[derive(Debug)]
pub struct MipMapping {
  child_entries: Vec<MipChildEntry>,
  parent_entries: Vec<MipParentEntry>,
  /// Parent entry receiving each child entry.
  child_parents: Vec<u32>,
  /// Indexed by parent level.
  ranges: Vec<LevelMipRange>,
  atlas: ImageAtlas,
}

impl Default for MipMapping {
  fn default() -> Self {
    Self::new()
  }
}

impl MipMapping {
  pub fn new() -> Self {
    Self {
      child_entries: Vec::new(),
      parent_entries: Vec::new(),
      child_parents: Vec::new(),
      ranges: Vec::new(),
      atlas: ImageAtlas::new("mip_atlas", MIP_IMAGE_RESOLUTION),
    }
  }

  /// Drop last frame's lists. Keeps the mip atlas image.
  pub fn reset(&mut self, level_count: usize) {
    self.child_entries.clear();
    self.parent_entries.clear();
    self.child_parents.clear();
    self.ranges.clear();
    self.ranges.resize(level_count, LevelMipRange::default());
  }

  /// Append the entries of one adjacent level pair.
  ///
  /// Call for every pair, coarsest first, after image indices are assigned.
  /// Child entries point at the child's merged mip tile when it has one and
  /// at its raw tile otherwise (always the raw tile on the leaf level).
  pub fn update_mip_nodes(&mut self, parent_level: usize, parent: &GridLevel, child: &GridLevel) {
    let mut range = LevelMipRange {
      child_start: self.child_entries.len() as u32,
      parent_start: self.parent_entries.len() as u32,
      ..Default::default()
    };

    for node in parent.parents_with_children() {
      let info = parent.nodes().image_info(node);
      // Set by update_image_indices for every parent with children.
      let Some(mip_tile) = info.mip_tile else {
        continue;
      };
      let parent_index = self.parent_entries.len() as u32;
      self.parent_entries.push(MipParentEntry {
        image_atlas_offset: pack_atlas_offset(info.tile),
        image_atlas_mip_offset: pack_atlas_offset(mip_tile),
        mip_offset: 0,
      });

      for (_, child_node) in parent.children(node) {
        let child_info = child.nodes().image_info(child_node);
        let source = match child_info.mip_tile {
          Some(merged) if !child.is_leaf() => merged,
          _ => child_info.tile,
        };
        self.child_entries.push(MipChildEntry {
          child_image_offset: pack_atlas_offset(source),
          parent_texel: pack_atlas_offset(child.nodes().grid_pos(child_node)),
        });
        self.child_parents.push(parent_index);
      }
    }

    range.child_count = self.child_entries.len() as u32 - range.child_start;
    range.parent_count = self.parent_entries.len() as u32 - range.parent_start;
    if parent_level >= self.ranges.len() {
      self.ranges.resize(parent_level + 1, LevelMipRange::default());
    }
    self.ranges[parent_level] = range;
  }

  /// Size the mip atlas for this frame's parents and turn the relative child
  /// texels into absolute mip-atlas texels.
  pub fn update_image_offsets(&mut self) {
    let side = self.atlas.update_size(self.parent_entries.len() as u32);
    let origins: Vec<_> = (0..self.parent_entries.len() as u32)
      .map(|index| self.atlas.tile_origin(slot_to_tile(index, side)))
      .collect();

    for (parent, origin) in self.parent_entries.iter_mut().zip(&origins) {
      parent.mip_offset = pack_atlas_offset(*origin);
    }
    for (child, &parent) in self.child_entries.iter_mut().zip(&self.child_parents) {
      let local = unpack_atlas_offset(child.parent_texel);
      child.parent_texel = pack_atlas_offset(local + origins[parent as usize]);
    }
  }

  /// Grow the mip atlas image if needed.
  pub fn resize_atlas<D: GpuDevice>(&mut self, device: &mut D) -> Result<bool, GpuError> {
    self.atlas.resize_image(device)
  }

  pub fn release_atlas<D: GpuDevice>(&mut self, device: &mut D) {
    self.atlas.release(device);
  }

  /// Parent levels with work, most detailed first.
  pub fn dispatch_levels(&self) -> impl Iterator<Item = usize> + '_ {
    self
      .ranges
      .iter()
      .enumerate()
      .rev()
      .filter(|(_, range)| !range.is_empty())
      .map(|(level, _)| level)
  }

  pub fn range(&self, parent_level: usize) -> LevelMipRange {
    self.ranges.get(parent_level).copied().unwrap_or_default()
  }

  pub fn ranges(&self) -> &[LevelMipRange] {
    &self.ranges
  }

  pub fn child_entries(&self) -> &[MipChildEntry] {
    &self.child_entries
  }

  pub fn parent_entries(&self) -> &[MipParentEntry] {
    &self.parent_entries
  }

  /// Parents with a mip tile this frame.
  #[inline]
  pub fn mip_count(&self) -> usize {
    self.parent_entries.len()
  }

  pub fn atlas(&self) -> &ImageAtlas {
    &self.atlas
  }
}

#[cfg(test)]
#[path = "mip_mapping_test.rs"]
mod mip_mapping_test;
