//! Tile, packing and direction constants for the adaptive grid.
//!
//! # Atlas Tile Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      ATLAS TILE (one per node slot)                     │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Texel index:  0     1     2    ...    15    16    17                   │
//! │                │     │                       │     │                    │
//! │                │     └──── 16 interior ──────┘     │                    │
//! │                │      texels (one per child cell)  │                    │
//! │                └─ border (copied from -neighbor)   └─ border (+neighbor)│
//! │                                                                         │
//! │  Stride in the main atlas:  18 = 16 + 2 * border                        │
//! │  Stride in the mip atlas:   17 = 16 + 1 padding texel                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Packed Atlas Descriptor
//!
//! ```text
//!  31        22 21        12 11         2   1   0
//! ┌────────────┬────────────┬────────────┬───┬───┐
//! │   X (10)   │   Y (10)   │   Z (10)   │ M │ R │
//! └────────────┴────────────┴────────────┴───┴───┘
//!   M = has mip-map flag, R = reserved
//! ```
//!
//! # Grid Indexing
//!
//! ```text
//! index = (z * R + y) * R + x
//! ```
//!
//! # Directions
//!
//! ```text
//! dir:    0    1    2    3    4    5
//! axis:   X    X    Y    Y    Z    Z
//! step:  -1   +1   -1   +1   -1   +1
//! ```

use glam::{IVec3, UVec3};

/// Interior texels per tile axis. Equals the resolution of every non-root level.
pub const NODE_RESOLUTION: u32 = 16;

/// Border texels on each side of a main-atlas tile.
pub const TILE_BORDER: u32 = 1;

/// Main atlas tile stride per axis (18).
pub const IMAGE_RESOLUTION: u32 = NODE_RESOLUTION + 2 * TILE_BORDER;

/// Mip atlas tile stride per axis (17, one padding texel for sampling).
pub const MIP_IMAGE_RESOLUTION: u32 = NODE_RESOLUTION + 1;

/// Default level layout: a single root cell, then two 16³ subdivisions.
pub const DEFAULT_LEVEL_RESOLUTIONS: [u32; 3] = [1, NODE_RESOLUTION, NODE_RESOLUTION];

/// Bits in one active-child bitmask word.
pub const BITS_PER_WORD: u32 = u32::BITS;

/// Bits available per packed coordinate component.
pub const COORD_BITS: u32 = 10;

/// Largest coordinate that fits a packed component (1023).
pub const MAX_PACKED_COORD: u32 = (1 << COORD_BITS) - 1;

/// Bit position of the X component.
pub const PACK_X_SHIFT: u32 = 22;

/// Bit position of the Y component.
pub const PACK_Y_SHIFT: u32 = 12;

/// Bit position of the Z component.
pub const PACK_Z_SHIFT: u32 = 2;

/// "Has mip-map" flag.
pub const MIP_MAP_BIT: u32 = 1 << 1;

/// Reserved bit, always zero.
pub const RESERVED_BIT: u32 = 1 << 0;

/// Number of axis-aligned neighbor directions.
pub const DIRECTION_COUNT: usize = 6;

/// Bytes per atlas texel (RGBA32F: scattering, extinction, phase g, unused).
pub const TEXEL_BYTES: u64 = 16;

/// Linear grid index of a local position inside a `resolution`³ grid.
#[inline]
pub fn grid_index(pos: UVec3, resolution: u32) -> u32 {
  (pos.z * resolution + pos.y) * resolution + pos.x
}

/// Inverse of [`grid_index`].
#[inline]
pub fn grid_position(index: u32, resolution: u32) -> UVec3 {
  UVec3::new(
    index % resolution,
    (index / resolution) % resolution,
    index / (resolution * resolution),
  )
}

/// Axis (0 = X, 1 = Y, 2 = Z) of a direction.
#[inline]
pub fn direction_axis(direction: usize) -> usize {
  direction / 2
}

/// Unit step of a direction along its axis.
#[inline]
pub fn direction_step(direction: usize) -> i32 {
  if direction % 2 == 0 {
    -1
  } else {
    1
  }
}

/// Direction pointing the other way along the same axis.
#[inline]
pub fn opposite_direction(direction: usize) -> usize {
  direction ^ 1
}

/// Integer offset of one step in `direction`.
#[inline]
pub fn direction_offset(direction: usize) -> IVec3 {
  let mut offset = IVec3::ZERO;
  offset[direction_axis(direction)] = direction_step(direction);
  offset
}

#[cfg(test)]
#[path = "constants_test.rs"]
mod constants_test;
