use glam::{UVec3, Vec3};

use super::*;
use crate::atlas::side_length_for;
use crate::grid::GridHierarchy;

/// Two leaves under one mid node, one leaf under another, plus a childless
/// mid node. Returns the prepared hierarchy and its mip lists.
fn build() -> (GridHierarchy, MipMapping) {
  let mut grid = GridHierarchy::new(256.0, &[1, 16, 16]);
  grid.add_node(2, Vec3::new(1.0, 1.0, 1.0));
  grid.add_node(2, Vec3::new(2.0, 1.0, 1.0));
  grid.add_node(2, Vec3::new(20.0, 1.0, 1.0));
  grid.add_node(1, Vec3::new(200.0, 1.0, 1.0));
  grid.update_levels();
  grid.update_image_indices(side_length_for(grid.image_slot_count()));

  let mut mips = MipMapping::new();
  mips.reset(grid.level_count());
  for level in 0..grid.leaf_level() {
    mips.update_mip_nodes(level, grid.level(level), grid.level(level + 1));
  }
  mips.update_image_offsets();
  (grid, mips)
}

#[test]
fn test_level_ranges() {
  let (_, mips) = build();

  assert_eq!(
    mips.range(0),
    LevelMipRange {
      child_start: 0,
      child_count: 3,
      parent_start: 0,
      parent_count: 1,
    }
  );
  assert_eq!(
    mips.range(1),
    LevelMipRange {
      child_start: 3,
      child_count: 3,
      parent_start: 1,
      parent_count: 2,
    }
  );
  assert!(mips.range(2).is_empty());
  assert_eq!(mips.mip_count(), 3);
}

#[test]
fn test_dispatch_levels_most_detailed_first() {
  let (_, mips) = build();
  assert_eq!(mips.dispatch_levels().collect::<Vec<_>>(), vec![1, 0]);
}

/// Children that own a merged tile are averaged from it, the rest from their
/// raw tile.
#[test]
fn test_child_sources() {
  let (grid, mips) = build();
  let mid = grid.level(1).nodes();
  let leaf = grid.level(2).nodes();
  let root_children = &mips.child_entries()[..3];

  // Mid nodes 0 and 1 have children, node 2 does not.
  assert_eq!(
    root_children[0].child_image_offset,
    pack_atlas_offset(mid.image_info(0).mip_tile.unwrap())
  );
  assert_eq!(
    root_children[1].child_image_offset,
    pack_atlas_offset(mid.image_info(1).mip_tile.unwrap())
  );
  assert_eq!(
    root_children[2].child_image_offset,
    pack_atlas_offset(mid.image_info(2).tile)
  );

  let leaf_children = &mips.child_entries()[3..];
  for (entry, node) in leaf_children.iter().zip(0..) {
    assert_eq!(entry.child_image_offset, pack_atlas_offset(leaf.image_info(node).tile));
  }
}

#[test]
fn test_parent_entries() {
  let (grid, mips) = build();
  let root = grid.level(0).nodes().image_info(0);
  let entry = mips.parent_entries()[0];

  assert_eq!(entry.image_atlas_offset, pack_atlas_offset(root.tile));
  assert_eq!(entry.image_atlas_mip_offset, pack_atlas_offset(root.mip_tile.unwrap()));
}

/// Mip tile origins follow the parent entry order in a 17-texel stride and
/// every child texel lands inside its parent's mip tile.
#[test]
fn test_mip_atlas_offsets() {
  let (grid, mips) = build();
  assert_eq!(mips.atlas().side_length(), 2);

  let origins: Vec<UVec3> = mips
    .parent_entries()
    .iter()
    .map(|entry| unpack_atlas_offset(entry.mip_offset))
    .collect();
  assert_eq!(
    origins,
    vec![UVec3::ZERO, UVec3::new(17, 0, 0), UVec3::new(0, 17, 0)]
  );

  // Root children are mid nodes at local (0,0,0), (1,0,0), (12,0,0).
  let texels: Vec<UVec3> = mips.child_entries()[..3]
    .iter()
    .map(|entry| unpack_atlas_offset(entry.parent_texel))
    .collect();
  assert_eq!(
    texels,
    vec![UVec3::ZERO, UVec3::new(1, 0, 0), UVec3::new(12, 0, 0)]
  );

  // Leaf (2,1,1) of mid node 0 lands in the second mip tile.
  let second_leaf = mips.child_entries()[4];
  assert_eq!(unpack_atlas_offset(second_leaf.parent_texel), UVec3::new(19, 1, 1));
  // The only leaf of mid node 1, local (4,1,1), lands in the third.
  let third_leaf = mips.child_entries()[5];
  assert_eq!(
    grid.level(2).nodes().grid_pos(2),
    UVec3::new(4, 1, 1)
  );
  assert_eq!(unpack_atlas_offset(third_leaf.parent_texel), UVec3::new(4, 18, 1));
}

#[test]
fn test_reset_clears_lists() {
  let (grid, mut mips) = build();
  mips.reset(grid.level_count());
  assert_eq!(mips.mip_count(), 0);
  assert!(mips.child_entries().is_empty());
  assert_eq!(mips.dispatch_levels().count(), 0);
}
