//! NeighborCells - face-adjacent tile pairs whose borders must be exchanged.
//!
//! For every node below the root and every one of the six directions the
//! neighbor on the *same* level is looked up. A step that leaves the
//! parent's grid wraps to the opposite face and continues inside the
//! parent's neighbor, resolved recursively one level up:
//!
//! ```text
//!   parent P          parent Q = neighbor(P, +X)
//!  ┌────────────┬────────────┐
//!  │        [a]─┼─►[b]       │   a at x = R-1, b at x = 0 inside Q
//!  └────────────┴────────────┘
//! ```
//!
//! Each adjacency is found twice (once from each side) and stored once.

use std::collections::HashSet;

use glam::IVec3;

use crate::constants::{
  direction_axis, direction_offset, direction_step, grid_index, opposite_direction,
  DIRECTION_COUNT,
};
use crate::gpu::layout::NeighborInfo;
use crate::grid::{pack_atlas_offset, GridHierarchy, GridLevel};

/// Two tiles sharing a face: `second` lies one step from `first` along
/// `direction`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NeighborPair {
  pub first: u32,
  pub second: u32,
  pub direction: u32,
}

impl NeighborPair {
  pub fn new(first: u32, second: u32, direction: u32) -> Self {
    Self {
      first,
      second,
      direction,
    }
  }

  /// Same adjacency seen from the other tile.
  #[inline]
  pub fn reversed(&self) -> Self {
    Self::new(
      self.second,
      self.first,
      opposite_direction(self.direction as usize) as u32,
    )
  }

  /// Orientation-independent form (positive direction).
  #[inline]
  fn canonical(&self) -> Self {
    if direction_step(self.direction as usize) > 0 {
      *self
    } else {
      self.reversed()
    }
  }

  pub fn to_info(&self) -> NeighborInfo {
    NeighborInfo {
      first: self.first,
      second: self.second,
      direction: self.direction as i32,
      padding: 0,
    }
  }
}

/// Node of `level` one step along `direction` from `node`, if instantiated.
///
/// The root level has no neighbors.
pub fn find_neighbor(levels: &[GridLevel], level: usize, node: u32, direction: usize) -> Option<u32> {
  if level == 0 {
    return None;
  }
  let current = &levels[level];
  let resolution = current.resolution() as i32;
  let parent = current.nodes().parent(node);
  let mut pos = current.nodes().grid_pos(node).as_ivec3() + direction_offset(direction);

  let inside = pos.cmpge(IVec3::ZERO).all() && pos.cmplt(IVec3::splat(resolution)).all();
  if inside {
    return current.find_index_node(parent, grid_index(pos.as_uvec3(), resolution as u32));
  }

  let parent_neighbor = find_neighbor(levels, level - 1, parent, direction)?;
  pos[direction_axis(direction)] = if direction_step(direction) < 0 {
    resolution - 1
  } else {
    0
  };
  current.find_index_node(parent_neighbor, grid_index(pos.as_uvec3(), resolution as u32))
}

/// Deduplicated neighbor pairs of raw tiles and of merged mip tiles.
#[derive(Debug, Default)]
pub struct NeighborCells {
  regular: Vec<NeighborPair>,
  mip: Vec<NeighborPair>,
  seen: HashSet<NeighborPair>,
  seen_mip: HashSet<NeighborPair>,
}

impl NeighborCells {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn reset(&mut self) {
    self.regular.clear();
    self.mip.clear();
    self.seen.clear();
    self.seen_mip.clear();
  }

  /// Collect all pairs of the frame. Image indices must be assigned.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "neighbors::update"))]
  pub fn update(&mut self, grid: &GridHierarchy) {
    self.reset();
    let levels = grid.levels();

    for (level_index, level) in levels.iter().enumerate().skip(1) {
      let nodes = level.nodes();
      for node in 0..nodes.len() as u32 {
        for direction in 0..DIRECTION_COUNT {
          let Some(other) = find_neighbor(levels, level_index, node, direction) else {
            continue;
          };
          let a = nodes.image_info(node);
          let b = nodes.image_info(other);
          let dir = direction as u32;

          Self::insert(
            &mut self.regular,
            &mut self.seen,
            NeighborPair::new(pack_atlas_offset(a.tile), pack_atlas_offset(b.tile), dir),
          );
          if let (Some(a_mip), Some(b_mip)) = (a.mip_tile, b.mip_tile) {
            Self::insert(
              &mut self.mip,
              &mut self.seen_mip,
              NeighborPair::new(pack_atlas_offset(a_mip), pack_atlas_offset(b_mip), dir),
            );
          }
        }
      }
    }
  }

  fn insert(list: &mut Vec<NeighborPair>, seen: &mut HashSet<NeighborPair>, pair: NeighborPair) {
    let canonical = pair.canonical();
    if seen.insert(canonical) {
      list.push(canonical);
    }
  }

  pub fn regular(&self) -> &[NeighborPair] {
    &self.regular
  }

  pub fn mip(&self) -> &[NeighborPair] {
    &self.mip
  }

  /// First mip pair in the uploaded record list.
  #[inline]
  pub fn mip_start(&self) -> u32 {
    self.regular.len() as u32
  }

  /// Regular pairs followed by mip pairs, as uploaded.
  pub fn records(&self) -> Vec<NeighborInfo> {
    self
      .regular
      .iter()
      .chain(&self.mip)
      .map(NeighborPair::to_info)
      .collect()
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.regular.len() + self.mip.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
#[path = "neighbors_test.rs"]
mod neighbors_test;
