//! GridLevel - one resolution tier of the adaptive grid.
//!
//! A level owns its nodes, the `(parent node, local grid index) -> node`
//! lookup and the parent-to-children mapping of its *own* nodes (whose
//! children live on the next finer level). Insertion across levels is driven
//! by [`GridHierarchy`](super::GridHierarchy), because a node can only be
//! created once its parent exists.
//!
//! # Per-frame lifecycle
//!
//! ```text
//! reset ──► insert / register_child (many) ──► update ──► update_image_indices
//! ```

use std::collections::{BTreeMap, HashMap};

use glam::{IVec3, UVec3, Vec3};

use super::node::NodeData;
use crate::constants::{grid_index, NODE_RESOLUTION};

/// One tier of the grid hierarchy.
#[derive(Clone, Debug)]
pub struct GridLevel {
  resolution: u32,
  cell_size: f32,
  is_leaf: bool,
  nodes: NodeData,
  /// (parent node, local grid index) -> node.
  node_lookup: HashMap<(u32, u32), u32>,
  /// parent node -> (child grid index -> child node on the next level).
  parent_children: BTreeMap<u32, BTreeMap<u32, u32>>,
  /// Compacted child node indices of this level's nodes.
  child_indices: Vec<i32>,
  slot_counter: u32,
  image_offset: u32,
  parent_image_offset: u32,
  child_offset: u32,
  updated: bool,
}

impl GridLevel {
  /// Create a level of `resolution`³ cells per parent cell.
  ///
  /// `child_resolution` sizes the active-child bitmask of every node.
  pub fn new(resolution: u32, child_resolution: u32, cell_size: f32, is_leaf: bool) -> Self {
    Self {
      resolution,
      cell_size,
      is_leaf,
      nodes: NodeData::new(child_resolution),
      node_lookup: HashMap::new(),
      parent_children: BTreeMap::new(),
      child_indices: Vec::new(),
      slot_counter: 0,
      image_offset: 0,
      parent_image_offset: 0,
      child_offset: 0,
      updated: false,
    }
  }

  /// Discard all transient state of the previous frame.
  pub fn reset(&mut self) {
    self.nodes.clear();
    self.node_lookup.clear();
    self.parent_children.clear();
    self.child_indices.clear();
    self.slot_counter = 0;
    self.image_offset = 0;
    self.parent_image_offset = 0;
    self.child_offset = 0;
    self.updated = false;
  }

  /// Grid-space position to this level's global cell coordinate.
  #[inline]
  pub fn global_grid_pos(&self, grid_pos: Vec3) -> IVec3 {
    (grid_pos / self.cell_size).floor().as_ivec3()
  }

  /// Find or create the node at `local` under `parent`.
  ///
  /// Returns the node index and whether it was created by this call.
  pub fn insert(&mut self, local: UVec3, parent: u32) -> (u32, bool) {
    let index = grid_index(local, self.resolution);
    if let Some(&node) = self.node_lookup.get(&(parent, index)) {
      return (node, false);
    }
    let slot = self.slot_counter;
    self.slot_counter += 1;
    let node = self.nodes.push(local, index, parent, slot);
    self.node_lookup.insert((parent, index), node);
    (node, true)
  }

  /// Record that `child_node` (next level) occupies cell `child_grid_index`
  /// of `node`. Sets the bitmask bit and updates prefix counts.
  pub fn register_child(&mut self, node: u32, child_grid_index: u32, child_node: u32) {
    if self.nodes.set_bit(node, child_grid_index) {
      self
        .parent_children
        .entry(node)
        .or_default()
        .insert(child_grid_index, child_node);
    }
  }

  /// Node stored at `(parent, grid_index)`, if any.
  #[inline]
  pub fn find_index_node(&self, parent: u32, grid_index: u32) -> Option<u32> {
    self.node_lookup.get(&(parent, grid_index)).copied()
  }

  /// Assign child-array offsets and reserve mip slots.
  ///
  /// Parents are visited in ascending node order, their children in grid
  /// index order so the compacted list matches prefix-count ranks. Every
  /// parent with children gets one mip slot after this level's node slots.
  /// Must run after the parent level's `update` (its final image offset is
  /// `parent_image_offset`).
  ///
  /// Returns the child offset following this level's children.
  pub fn update(&mut self, parent_child_offset: u32, parent_image_offset: u32) -> u32 {
    self.parent_image_offset = parent_image_offset;
    self.image_offset = self.nodes.len() as u32 + parent_image_offset;
    self.child_offset = parent_child_offset;
    self.child_indices.clear();

    let mut child_offset = parent_child_offset;
    for (&parent, children) in &self.parent_children {
      self.nodes.set_child_offset(parent, child_offset);
      self
        .child_indices
        .extend(children.values().map(|&child| child as i32));
      child_offset += children.len() as u32;

      if !children.is_empty() {
        self.nodes.set_mip_slot(parent, self.image_offset);
        self.image_offset += 1;
      }
    }

    self.updated = true;
    child_offset
  }

  /// Convert slots to packed tile coordinates for the final atlas size.
  pub fn update_image_indices(&mut self, atlas_side_length: u32) {
    debug_assert!(self.updated, "update must run before update_image_indices");
    self
      .nodes
      .update_image_offsets(self.parent_image_offset, atlas_side_length);
  }

  /// Children of `node` as (grid index, child node) in grid index order.
  pub fn children(&self, node: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
    self
      .parent_children
      .get(&node)
      .into_iter()
      .flat_map(|children| children.iter().map(|(&index, &child)| (index, child)))
  }

  /// Parents with at least one child, ascending.
  pub fn parents_with_children(&self) -> impl Iterator<Item = u32> + '_ {
    self.parent_children.keys().copied()
  }

  #[inline]
  pub fn resolution(&self) -> u32 {
    self.resolution
  }

  /// World size of one cell on this level.
  #[inline]
  pub fn cell_size(&self) -> f32 {
    self.cell_size
  }

  /// World size of one interior texel of this level's tiles. Borders are
  /// copies of the neighbor's edge, so a cell spans exactly the interior.
  #[inline]
  pub fn texel_size(&self) -> f32 {
    self.cell_size / NODE_RESOLUTION as f32
  }

  #[inline]
  pub fn is_leaf(&self) -> bool {
    self.is_leaf
  }

  #[inline]
  pub fn node_count(&self) -> usize {
    self.nodes.len()
  }

  /// Slot counter after `update`: this level's nodes and mips end here.
  #[inline]
  pub fn image_offset(&self) -> u32 {
    self.image_offset
  }

  #[inline]
  pub fn parent_image_offset(&self) -> u32 {
    self.parent_image_offset
  }

  /// First child-array element written by this level.
  #[inline]
  pub fn child_offset(&self) -> u32 {
    self.child_offset
  }

  pub fn nodes(&self) -> &NodeData {
    &self.nodes
  }

  pub fn child_indices(&self) -> &[i32] {
    &self.child_indices
  }

  /// Number of reserved mip slots (parents with children).
  pub fn mip_count(&self) -> usize {
    self.parent_children.len()
  }
}

#[cfg(test)]
#[path = "level_test.rs"]
mod level_test;
