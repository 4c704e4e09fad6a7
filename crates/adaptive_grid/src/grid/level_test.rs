use super::*;

fn leaf_level() -> GridLevel {
  GridLevel::new(16, 16, 1.0, true)
}

#[test]
fn test_insert_is_idempotent() {
  let mut level = leaf_level();
  let (a, created_a) = level.insert(UVec3::new(3, 4, 5), 0);
  let (b, created_b) = level.insert(UVec3::new(3, 4, 5), 0);

  assert_eq!(a, b);
  assert!(created_a);
  assert!(!created_b);
  assert_eq!(level.node_count(), 1);
}

/// Same local cell under different parents is a different node.
#[test]
fn test_insert_keys_by_parent() {
  let mut level = leaf_level();
  let (a, _) = level.insert(UVec3::new(1, 1, 1), 0);
  let (b, _) = level.insert(UVec3::new(1, 1, 1), 1);

  assert_ne!(a, b);
  assert_eq!(level.find_index_node(0, grid_index(UVec3::new(1, 1, 1), 16)), Some(a));
  assert_eq!(level.find_index_node(1, grid_index(UVec3::new(1, 1, 1), 16)), Some(b));
}

#[test]
fn test_find_index_node_miss_is_none() {
  let level = leaf_level();
  assert_eq!(level.find_index_node(0, 0), None);
}

#[test]
fn test_slots_are_assigned_in_creation_order() {
  let mut level = leaf_level();
  level.insert(UVec3::new(5, 0, 0), 0);
  level.insert(UVec3::new(0, 0, 0), 0);
  level.insert(UVec3::new(5, 0, 0), 0);

  assert_eq!(level.nodes().image_info(0).slot, 0);
  assert_eq!(level.nodes().image_info(1).slot, 1);
}

#[test]
fn test_update_reserves_mip_slots_after_nodes() {
  let mut level = GridLevel::new(16, 16, 1.0, false);
  level.insert(UVec3::ZERO, 0);
  level.insert(UVec3::new(1, 0, 0), 0);
  level.insert(UVec3::new(2, 0, 0), 0);

  // Node 2 gets two children, node 0 one, node 1 none.
  level.register_child(2, 7, 0);
  level.register_child(0, 3, 1);
  level.register_child(2, 1, 2);

  let next = level.update(10, 4);

  assert_eq!(next, 13);
  assert_eq!(level.image_offset(), 4 + 3 + 2);
  assert_eq!(level.child_offset(), 10);
  assert_eq!(level.mip_count(), 2);

  let nodes = level.nodes();
  assert_eq!(nodes.node_info(0).child_array_offset, 10);
  assert_eq!(nodes.node_info(1).child_array_offset, -1);
  assert_eq!(nodes.node_info(2).child_array_offset, 11);
  assert_eq!(nodes.image_info(0).mip_slot, Some(7));
  assert_eq!(nodes.image_info(1).mip_slot, None);
  assert_eq!(nodes.image_info(2).mip_slot, Some(8));

  // Node 2's children in grid index order: index 1 -> child 2, index 7 -> child 0.
  assert_eq!(level.child_indices(), &[1, 2, 0]);
}

#[test]
fn test_register_child_twice_is_noop() {
  let mut level = GridLevel::new(16, 16, 1.0, false);
  level.insert(UVec3::ZERO, 0);
  level.register_child(0, 5, 0);
  level.register_child(0, 5, 0);

  assert_eq!(level.nodes().child_count(0), 1);
  assert_eq!(level.children(0).count(), 1);
}

#[test]
fn test_reset_clears_everything() {
  let mut level = GridLevel::new(16, 16, 1.0, false);
  level.insert(UVec3::ZERO, 0);
  level.register_child(0, 1, 0);
  level.update(0, 0);
  level.reset();

  assert_eq!(level.node_count(), 0);
  assert_eq!(level.mip_count(), 0);
  assert!(level.child_indices().is_empty());
  assert_eq!(level.image_offset(), 0);
  assert_eq!(level.find_index_node(0, 0), None);

  let (node, created) = level.insert(UVec3::ZERO, 0);
  assert_eq!(node, 0);
  assert!(created);
  assert_eq!(level.nodes().image_info(0).slot, 0);
}

#[test]
fn test_global_grid_pos_floors() {
  let level = GridLevel::new(16, 16, 2.0, true);
  assert_eq!(level.global_grid_pos(Vec3::new(0.0, 1.99, 2.0)), IVec3::new(0, 0, 1));
  assert_eq!(level.global_grid_pos(Vec3::new(-0.5, 5.0, 31.9)), IVec3::new(-1, 2, 15));
}
