use super::*;
use crate::config::MediumSettings;

fn fog(height_fraction: f32) -> GroundFog {
  GroundFog::new(GroundFogSettings {
    height_fraction,
    medium: MediumSettings::new(0.3, 0.1, 0.2),
    noise_scale: 1.5,
  })
}

#[test]
fn test_zero_height_inserts_nothing() {
  let mut grid = GridHierarchy::new(512.0, &[1, 16, 16]);
  let mut fog = fog(0.0);
  fog.insert_nodes(&mut grid);
  assert_eq!(grid.node_count(), 0);
}

/// 512 extent, 20% fog: surface at 409.6, level-1 cells of 32 -> row 12.
#[test]
fn test_inserts_one_layer() {
  let mut grid = GridHierarchy::new(512.0, &[1, 16, 16]);
  let mut fog = fog(0.2);
  fog.insert_nodes(&mut grid);

  assert!((fog.grid_space_height(512.0) - 409.6).abs() < 1e-3);
  assert_eq!(fog.grid_y(512.0, 32.0, 16), 12);
  assert_eq!(grid.level(1).node_count(), 256);
  assert_eq!(grid.level(0).node_count(), 1);
  let nodes = grid.level(1).nodes();
  assert!((0..256).all(|node| nodes.grid_pos(node).y == 12));
}

#[test]
fn test_constants() {
  let mut grid = GridHierarchy::new(512.0, &[1, 16, 16]);
  let mut fog = fog(0.2);
  fog.insert_nodes(&mut grid);
  let constants = fog.constants();

  assert!((constants.extinction - 0.4).abs() < 1e-6);
  assert_eq!(constants.texel_world_size, 2.0);
  assert_eq!(constants.noise_scale, 1.5);
  assert!((constants.grid_space_height - 409.6).abs() < 1e-3);
}

/// Texel rows follow the 16-texel interior: with the surface 25.6 into the
/// row-12 cell, interior row 12 is the partly covered edge.
#[test]
fn test_edge_texel_row() {
  let mut grid = GridHierarchy::new(512.0, &[1, 16, 16]);
  let mut fog = fog(0.2);
  fog.insert_nodes(&mut grid);
  let constants = fog.constants();

  let cell_y = 12.0 * 32.0;
  let row_top = |row: u32| cell_y + row as f32 * constants.texel_world_size;
  assert!(row_top(12) < constants.grid_space_height);
  assert!(row_top(13) > constants.grid_space_height);
  assert!((row_top(13) - constants.grid_space_height - 0.4).abs() < 1e-3);
}

#[test]
fn test_full_height_uses_top_row() {
  let grid = GridHierarchy::new(512.0, &[1, 16, 16]);
  let fog = fog(1.0);
  assert_eq!(fog.grid_y(grid.extent(), 32.0, 16), 0);
}

#[test]
fn test_records_match_nodes() {
  let mut grid = GridHierarchy::new(512.0, &[1, 16, 16]);
  let mut fog = fog(0.5);
  fog.insert_nodes(&mut grid);
  grid.update_levels();
  grid.update_image_indices(crate::atlas::side_length_for(grid.image_slot_count()));
  fog.update_records(&grid);

  assert_eq!(fog.cells().len(), 256);
  let first = fog.cells()[0];
  assert_eq!(first.world_offset, [0.0, 256.0, 0.0]);
  assert_eq!(
    first.image_offset,
    pack_atlas_offset(grid.level(1).nodes().image_info(0).tile)
  );
}
