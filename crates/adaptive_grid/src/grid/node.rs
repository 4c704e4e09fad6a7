//! NodeData - per-level node storage as parallel columns, plus the atlas
//! descriptor bit packing.
//!
//! A node is never stored as one record. Index `i` into every column below
//! describes node `i` of the owning level:
//!
//! ```text
//! grid_pos      local cell inside the parent            (0..R-1 per axis)
//! grid_index    (z*R + y)*R + x of grid_pos
//! parent        node index in the parent level          (0 on the root level)
//! child_count   number of set bits in the bitmask
//! active_bits   words_per_node u32 words                (Rc³ bits, Rc = child res)
//! bit_counts    words_per_node prefix popcounts         (set bits in words [0, w))
//! node_infos    GPU record                              (packed tiles, child offset)
//! image_infos   1-D slot, optional mip slot, 3-D tiles
//! ```

use glam::UVec3;

use crate::constants::{
  BITS_PER_WORD, MAX_PACKED_COORD, MIP_MAP_BIT, PACK_X_SHIFT, PACK_Y_SHIFT, PACK_Z_SHIFT,
};
use crate::gpu::layout::NodeInfo;

// =============================================================================
// Atlas descriptor packing
// =============================================================================

const COORD_MASK: u32 = MAX_PACKED_COORD;

/// Pack a 3-D atlas coordinate into a descriptor (flags cleared).
///
/// # Panics
///
/// If any component exceeds 1023.
#[inline]
pub fn pack_atlas_offset(coord: UVec3) -> u32 {
  assert!(
    coord.max_element() <= MAX_PACKED_COORD,
    "atlas coordinate {coord} does not fit 10 bits"
  );
  coord.x << PACK_X_SHIFT | coord.y << PACK_Y_SHIFT | coord.z << PACK_Z_SHIFT
}

/// Extract the 3-D coordinate of a descriptor, ignoring flag bits.
#[inline]
pub fn unpack_atlas_offset(packed: u32) -> UVec3 {
  UVec3::new(
    (packed >> PACK_X_SHIFT) & COORD_MASK,
    (packed >> PACK_Y_SHIFT) & COORD_MASK,
    (packed >> PACK_Z_SHIFT) & COORD_MASK,
  )
}

#[inline]
pub fn has_mip_map(packed: u32) -> bool {
  packed & MIP_MAP_BIT != 0
}

#[inline]
pub fn with_mip_map_bit(packed: u32) -> u32 {
  packed | MIP_MAP_BIT
}

/// 1-D slot index to 3-D tile coordinate in a cube of `side_length` tiles.
#[inline]
pub fn slot_to_tile(slot: u32, side_length: u32) -> UVec3 {
  UVec3::new(
    slot % side_length,
    (slot / side_length) % side_length,
    slot / (side_length * side_length),
  )
}

// =============================================================================
// Node columns
// =============================================================================

/// Atlas placement of a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImageInfo {
  /// Atlas slot. Level-local until `update_image_offsets` adds the parent offset.
  pub slot: u32,
  /// Absolute atlas slot of the merged mip-map, if the node has children.
  pub mip_slot: Option<u32>,
  /// Tile coordinate of `slot`.
  pub tile: UVec3,
  /// Tile coordinate of `mip_slot`.
  pub mip_tile: Option<UVec3>,
}

/// Parallel-column node storage of one grid level.
#[derive(Clone, Debug)]
pub struct NodeData {
  words_per_node: usize,
  pub(crate) grid_pos: Vec<UVec3>,
  pub(crate) grid_index: Vec<u32>,
  pub(crate) parent: Vec<u32>,
  pub(crate) child_count: Vec<u32>,
  pub(crate) active_bits: Vec<u32>,
  pub(crate) bit_counts: Vec<u32>,
  pub(crate) node_infos: Vec<NodeInfo>,
  pub(crate) image_infos: Vec<ImageInfo>,
}

impl NodeData {
  /// Storage for nodes whose children live in a `child_resolution`³ grid.
  pub fn new(child_resolution: u32) -> Self {
    let bits = (child_resolution as usize).pow(3);
    let words_per_node = bits.div_ceil(BITS_PER_WORD as usize).max(1);
    Self {
      words_per_node,
      grid_pos: Vec::new(),
      grid_index: Vec::new(),
      parent: Vec::new(),
      child_count: Vec::new(),
      active_bits: Vec::new(),
      bit_counts: Vec::new(),
      node_infos: Vec::new(),
      image_infos: Vec::new(),
    }
  }

  /// Drop all nodes, keeping allocations for the next frame.
  pub fn clear(&mut self) {
    self.grid_pos.clear();
    self.grid_index.clear();
    self.parent.clear();
    self.child_count.clear();
    self.active_bits.clear();
    self.bit_counts.clear();
    self.node_infos.clear();
    self.image_infos.clear();
  }

  /// Append a node and return its index.
  pub fn push(&mut self, grid_pos: UVec3, grid_index: u32, parent: u32, slot: u32) -> u32 {
    let index = self.len() as u32;
    self.grid_pos.push(grid_pos);
    self.grid_index.push(grid_index);
    self.parent.push(parent);
    self.child_count.push(0);
    self
      .active_bits
      .resize(self.active_bits.len() + self.words_per_node, 0);
    self
      .bit_counts
      .resize(self.bit_counts.len() + self.words_per_node, 0);
    self.node_infos.push(NodeInfo {
      child_array_offset: -1,
      ..Default::default()
    });
    self.image_infos.push(ImageInfo {
      slot,
      ..Default::default()
    });
    index
  }

  /// Mark child cell `bit` of `node` as active.
  ///
  /// Returns false (and changes nothing) if the bit was already set.
  /// Otherwise bumps the prefix count of every later word of this node and
  /// the node's child count.
  pub fn set_bit(&mut self, node: u32, bit: u32) -> bool {
    let base = node as usize * self.words_per_node;
    let word = base + (bit / BITS_PER_WORD) as usize;
    let mask = 1u32 << (bit % BITS_PER_WORD);
    debug_assert!(word < base + self.words_per_node, "bit {bit} out of range");

    if self.active_bits[word] & mask != 0 {
      return false;
    }
    self.active_bits[word] |= mask;
    for count in &mut self.bit_counts[word + 1..base + self.words_per_node] {
      *count += 1;
    }
    self.child_count[node as usize] += 1;
    true
  }

  /// Whether child cell `bit` of `node` is active.
  #[inline]
  pub fn is_bit_set(&self, node: u32, bit: u32) -> bool {
    let word = node as usize * self.words_per_node + (bit / BITS_PER_WORD) as usize;
    self.active_bits[word] & (1 << (bit % BITS_PER_WORD)) != 0
  }

  /// Rank of an active child among its siblings (position in the compacted
  /// child list), via the prefix counts. `None` if the bit is not set.
  #[cfg(test)]
  pub(crate) fn child_rank(&self, node: u32, bit: u32) -> Option<u32> {
    if !self.is_bit_set(node, bit) {
      return None;
    }
    let word = node as usize * self.words_per_node + (bit / BITS_PER_WORD) as usize;
    let below = self.active_bits[word] & ((1u32 << (bit % BITS_PER_WORD)) - 1);
    Some(self.bit_counts[word] + below.count_ones())
  }

  pub fn set_child_offset(&mut self, node: u32, offset: u32) {
    self.node_infos[node as usize].child_array_offset = offset as i32;
  }

  /// Reserve the merged mip-map slot of a node.
  pub fn set_mip_slot(&mut self, node: u32, slot: u32) {
    self.image_infos[node as usize].mip_slot = Some(slot);
    let info = &mut self.node_infos[node as usize];
    info.packed_atlas_offset = with_mip_map_bit(info.packed_atlas_offset);
  }

  /// Shift every slot by `parent_image_offset` and pack the 3-D tiles for an
  /// atlas of `side_length` tiles per axis.
  pub fn update_image_offsets(&mut self, parent_image_offset: u32, side_length: u32) {
    for (image, info) in self.image_infos.iter_mut().zip(&mut self.node_infos) {
      image.slot += parent_image_offset;
      image.tile = slot_to_tile(image.slot, side_length);
      info.packed_atlas_offset = pack_atlas_offset(image.tile);

      if let Some(mip_slot) = image.mip_slot {
        let mip_tile = slot_to_tile(mip_slot, side_length);
        image.mip_tile = Some(mip_tile);
        info.packed_atlas_offset = with_mip_map_bit(info.packed_atlas_offset);
        info.packed_mip_atlas_offset = pack_atlas_offset(mip_tile);
      }
    }
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.grid_pos.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.grid_pos.is_empty()
  }

  #[inline]
  pub fn words_per_node(&self) -> usize {
    self.words_per_node
  }

  pub fn grid_pos(&self, node: u32) -> UVec3 {
    self.grid_pos[node as usize]
  }

  pub fn grid_index(&self, node: u32) -> u32 {
    self.grid_index[node as usize]
  }

  pub fn parent(&self, node: u32) -> u32 {
    self.parent[node as usize]
  }

  pub fn child_count(&self, node: u32) -> u32 {
    self.child_count[node as usize]
  }

  /// Bitmask words of one node.
  pub fn active_words(&self, node: u32) -> &[u32] {
    let start = node as usize * self.words_per_node;
    &self.active_bits[start..start + self.words_per_node]
  }

  /// Prefix counts of one node.
  pub fn bit_count_words(&self, node: u32) -> &[u32] {
    let start = node as usize * self.words_per_node;
    &self.bit_counts[start..start + self.words_per_node]
  }

  pub fn node_info(&self, node: u32) -> &NodeInfo {
    &self.node_infos[node as usize]
  }

  pub fn image_info(&self, node: u32) -> &ImageInfo {
    &self.image_infos[node as usize]
  }

  pub fn node_infos(&self) -> &[NodeInfo] {
    &self.node_infos
  }

  pub fn active_bits(&self) -> &[u32] {
    &self.active_bits
  }

  pub fn bit_counts(&self) -> &[u32] {
    &self.bit_counts
  }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
