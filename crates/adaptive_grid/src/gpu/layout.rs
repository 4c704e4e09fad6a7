//! Byte-exact records shared with the compute and ray-marching kernels.
//!
//! All records are `#[repr(C)]` + `Pod` so whole slices can be uploaded with
//! `bytemuck::cast_slice`. Sizes are checked in `layout_test.rs`.

use bytemuck::{Pod, Zeroable};

/// Per-node traversal record.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct NodeInfo {
  /// Packed atlas tile of the node (mip flag in bit 1).
  pub packed_atlas_offset: u32,
  /// Packed atlas tile of the merged mip-map, 0 when the node has none.
  pub packed_mip_atlas_offset: u32,
  /// Start of this node's children in the child array, -1 without children.
  pub child_array_offset: i32,
}

/// Per-level metadata consumed by the ray-marcher.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct LevelData {
  pub cell_size: f32,
  pub resolution: i32,
  /// Byte offset of this level's block in the node-info buffer.
  pub node_array_offset: i32,
  /// Byte size of this level's node-info block.
  pub node_size: i32,
  /// Byte offset of this level's block in the child buffer.
  pub child_array_offset: i32,
  pub child_cell_size: f32,
  /// Element offset matching `node_array_offset`.
  pub node_offset: i32,
  /// Element offset matching `child_array_offset`.
  pub child_offset: i32,
  pub shadow_ray_step_size: f32,
  pub texel_scale: f32,
  pub padding: [f32; 2],
}

/// Two atlas tiles sharing a face.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct NeighborInfo {
  /// Packed tile of the node the direction is measured from.
  pub first: u32,
  /// Packed tile of the neighbor one step along `direction`.
  pub second: u32,
  pub direction: i32,
  pub padding: i32,
}

/// One child tile averaged into one texel of its parent's mip tile.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct MipChildEntry {
  /// Packed tile to average (raw tile or the child's merged mip tile).
  pub child_image_offset: u32,
  /// Packed texel in the mip atlas receiving the average.
  pub parent_texel: u32,
}

/// One parent whose raw tile is merged with its averaged children.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct MipParentEntry {
  /// Packed raw tile in the main atlas.
  pub image_atlas_offset: u32,
  /// Packed reserved mip slot in the main atlas.
  pub image_atlas_mip_offset: u32,
  /// Packed texel origin of the parent's tile in the mip atlas.
  pub mip_offset: u32,
}

/// Ground fog cell.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FogCell {
  /// Grid-space minimum corner of the cell.
  pub world_offset: [f32; 3],
  /// Packed atlas tile.
  pub image_offset: u32,
}

/// Ground fog constants.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FogConstants {
  pub scattering: f32,
  pub extinction: f32,
  pub phase_g: f32,
  pub texel_world_size: f32,
  pub noise_scale: f32,
  /// Grid-space Y of the fog surface; texels above it stay empty.
  pub grid_space_height: f32,
  pub padding: [u32; 2],
}

/// Particle as uploaded: grid-space position and squared radius.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ParticleGpu {
  pub position: [f32; 3],
  pub radius_sq: f32,
}

/// Leaf node touched by at least one particle.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ParticleNode {
  /// Grid-space minimum corner of the node.
  pub world_offset: [f32; 3],
  pub particle_count: u32,
  /// First entry in the particle index buffer.
  pub particle_offset: u32,
  pub image_offset: u32,
  pub padding: [u32; 2],
}

/// Medium of a particle system plus the texel size of the leaf level.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ParticleConstants {
  pub scattering: f32,
  pub extinction: f32,
  pub phase_g: f32,
  pub texel_world_size: f32,
}

/// Constant medium written into a single tile.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DebugNode {
  pub value: [f32; 4],
  pub image_offset: u32,
  pub padding: [u32; 3],
}

/// Decode a tightly packed slice of `T` from raw buffer bytes.
///
/// Trailing bytes that do not form a whole record are ignored.
pub fn read_records<T: Pod>(bytes: &[u8]) -> Vec<T> {
  bytes
    .chunks_exact(std::mem::size_of::<T>())
    .map(bytemuck::pod_read_unaligned)
    .collect()
}

#[cfg(test)]
#[path = "layout_test.rs"]
mod layout_test;
