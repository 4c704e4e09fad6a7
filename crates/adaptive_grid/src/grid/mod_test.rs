use glam::UVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;

fn two_level() -> GridHierarchy {
  GridHierarchy::new(16.0, &[1, 16])
}

fn three_level() -> GridHierarchy {
  GridHierarchy::new(256.0, &[1, 16, 16])
}

// =========================================================================
// End-to-end scenario
// =========================================================================

/// Insert (0,0,0), (1,0,0), (0,1,0) into a resolution-16 level: three nodes,
/// root bits 0, 1 and 16, and child list [0, 1, 2] at offset 0.
#[test]
fn test_three_cell_scenario() {
  let mut grid = two_level();
  let a = grid.add_node(1, Vec3::new(0.0, 0.0, 0.0));
  let b = grid.add_node(1, Vec3::new(1.0, 0.0, 0.0));
  let c = grid.add_node(1, Vec3::new(0.0, 1.0, 0.0));
  assert_eq!((a, b, c), (0, 1, 2));

  assert_eq!(grid.level(1).node_count(), 3);
  assert_eq!(grid.level(0).node_count(), 1);

  let root = grid.level(0).nodes();
  let set_bits: Vec<u32> = (0..4096).filter(|&bit| root.is_bit_set(0, bit)).collect();
  assert_eq!(set_bits, vec![0, 1, 16]);
  assert_eq!(root.child_count(0), 3);

  let total = grid.update_levels();
  assert_eq!(total, 3);
  assert_eq!(grid.level(0).nodes().node_info(0).child_array_offset, 0);
  assert_eq!(grid.level(0).child_indices(), &[0, 1, 2]);
}

/// Level update invoked directly on the root with offset 0.
#[test]
fn test_root_update_from_zero() {
  let mut grid = two_level();
  for x in [0.0, 1.0] {
    grid.add_node(1, Vec3::new(x, 0.0, 0.0));
  }
  grid.add_node(1, Vec3::new(0.0, 1.0, 0.0));

  let mut root = grid.level(0).clone();
  assert_eq!(root.update(0, 0), 3);
  assert_eq!(root.child_indices(), &[0, 1, 2]);
}

// =========================================================================
// Insertion
// =========================================================================

#[test]
fn test_add_node_is_idempotent() {
  let mut grid = three_level();
  let p = Vec3::new(100.5, 3.25, 77.0);

  let first = grid.add_node(2, p);
  let root_children = grid.level(0).nodes().child_count(0);
  let mid_children = grid.level(1).nodes().child_count(0);
  let second = grid.add_node(2, p);

  assert_eq!(first, second);
  assert_eq!(grid.level(0).nodes().child_count(0), root_children);
  assert_eq!(grid.level(1).nodes().child_count(0), mid_children);
  assert_eq!(root_children, 1);
  assert_eq!(mid_children, 1);
  assert_eq!(grid.node_count(), 3);
}

/// Two positions in the same leaf cell share a node.
#[test]
fn test_positions_in_same_cell_share_node() {
  let mut grid = three_level();
  let a = grid.add_node(2, Vec3::new(17.1, 17.9, 17.5));
  let b = grid.add_node(2, Vec3::new(17.9, 17.1, 17.0));
  assert_eq!(a, b);
}

#[test]
fn test_local_positions_are_relative_to_parent() {
  let mut grid = three_level();
  // Leaf cell size is 1, mid cell size 16: global leaf cell (33, 2, 47).
  let leaf = grid.add_node(2, Vec3::new(33.5, 2.5, 47.5));
  let leaf_level = grid.level(2).nodes();
  assert_eq!(leaf_level.grid_pos(leaf), UVec3::new(1, 2, 15));

  let mid = leaf_level.parent(leaf);
  assert_eq!(grid.level(1).nodes().grid_pos(mid), UVec3::new(2, 0, 2));
  assert_eq!(grid.node_origin(2, leaf), Vec3::new(33.0, 2.0, 47.0));

  let (min, max) = grid.node_bounds(1, mid);
  assert_eq!(min, Vec3::new(32.0, 0.0, 32.0));
  assert_eq!(max, Vec3::new(48.0, 16.0, 48.0));
}

#[test]
#[should_panic(expected = "outside grid")]
fn test_add_node_outside_grid_panics() {
  let mut grid = three_level();
  grid.add_node(2, Vec3::new(-1.0, 0.0, 0.0));
}

/// For every node, prefix counts equal the set bits of earlier words and the
/// popcount equals the child count.
#[test]
fn test_bitcount_invariant_random_inserts() {
  let mut grid = three_level();
  let mut rng = StdRng::seed_from_u64(42);
  for _ in 0..2000 {
    let p = Vec3::new(
      rng.random_range(0.0..256.0),
      rng.random_range(0.0..256.0),
      rng.random_range(0.0..256.0),
    );
    grid.add_node(2, p);
  }

  for (level_index, level) in grid.levels().iter().enumerate() {
    let nodes = level.nodes();
    for node in 0..nodes.len() as u32 {
      let mut running = 0;
      for (&word, &count) in nodes.active_words(node).iter().zip(nodes.bit_count_words(node)) {
        assert_eq!(count, running, "level {} node {}", level_index, node);
        running += word.count_ones();
      }
      assert_eq!(running, nodes.child_count(node));
    }
  }

  let leaves = grid.level(2).node_count() as u32;
  let mids: u32 = (0..grid.level(1).node_count() as u32)
    .map(|n| grid.level(1).nodes().child_count(n))
    .sum();
  assert_eq!(leaves, mids);
}

// =========================================================================
// Slot layout
// =========================================================================

/// [L0 nodes][L0 mips][L1 nodes][L1 mips][L2 nodes]
#[test]
fn test_slot_layout_across_levels() {
  let mut grid = three_level();
  grid.add_node(2, Vec3::new(1.0, 1.0, 1.0));
  grid.add_node(2, Vec3::new(20.0, 1.0, 1.0));
  grid.add_node(1, Vec3::new(200.0, 1.0, 1.0));

  grid.update_levels();
  // Root: 1 node + 1 mip. Mid: 3 nodes + 2 mips. Leaf: 2 nodes.
  assert_eq!(grid.level(0).image_offset(), 2);
  assert_eq!(grid.level(1).image_offset(), 7);
  assert_eq!(grid.image_slot_count(), 9);

  grid.update_image_indices(3);

  let root = grid.level(0).nodes().image_info(0);
  assert_eq!(root.slot, 0);
  assert_eq!(root.mip_slot, Some(1));

  let mid = grid.level(1).nodes();
  let slots: Vec<u32> = (0..3).map(|n| mid.image_info(n).slot).collect();
  assert_eq!(slots, vec![2, 3, 4]);
  assert_eq!(mid.image_info(0).mip_slot, Some(5));
  assert_eq!(mid.image_info(1).mip_slot, Some(6));
  assert_eq!(mid.image_info(2).mip_slot, None);

  let leaf = grid.level(2).nodes();
  assert_eq!(leaf.image_info(0).slot, 7);
  assert_eq!(leaf.image_info(1).slot, 8);
  assert_eq!(leaf.image_info(1).tile, UVec3::new(2, 2, 0));
}

#[test]
fn test_child_offsets_are_global() {
  let mut grid = three_level();
  grid.add_node(2, Vec3::new(1.0, 1.0, 1.0));
  grid.add_node(2, Vec3::new(2.0, 1.0, 1.0));
  grid.add_node(2, Vec3::new(20.0, 1.0, 1.0));

  let total = grid.update_levels();
  assert_eq!(total, 2 + 3);
  assert_eq!(grid.level(1).child_offset(), 2);
  assert_eq!(grid.level(1).nodes().node_info(0).child_array_offset, 2);
  assert_eq!(grid.level(1).nodes().node_info(1).child_array_offset, 4);
  assert_eq!(grid.level(1).child_indices(), &[0, 1, 2]);
}

#[test]
fn test_reset_discards_frame() {
  let mut grid = three_level();
  grid.add_node(2, Vec3::splat(5.0));
  grid.update_levels();
  grid.reset();

  assert_eq!(grid.node_count(), 0);
  assert_eq!(grid.image_slot_count(), 0);
}

#[test]
fn test_cell_sizes() {
  let grid = three_level();
  assert_eq!(grid.level(0).cell_size(), 256.0);
  assert_eq!(grid.level(1).cell_size(), 16.0);
  assert_eq!(grid.level(2).cell_size(), 1.0);
  assert_eq!(grid.level(1).texel_size(), 1.0);
  assert_eq!(grid.level(2).texel_size(), 1.0 / 16.0);
  assert!(grid.level(2).is_leaf());
  assert!(!grid.level(1).is_leaf());
}
