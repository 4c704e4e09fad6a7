//! Fixed nodes with a constant medium, for inspecting mip-maps and seams.

use std::collections::BTreeMap;

use glam::{Vec3, Vec4};

use super::GridVolume;
use crate::config::DebugNodeSettings;
use crate::gpu::layout::DebugNode;
use crate::grid::{pack_atlas_offset, GridHierarchy};

#[derive(Clone, Debug, Default)]
pub struct DebugFilling {
  nodes: Vec<DebugNodeSettings>,
  world_min: Vec3,
  /// (level, node) -> summed medium of every setting landing in that node.
  inserted: BTreeMap<(usize, u32), Vec4>,
  records: Vec<DebugNode>,
}

impl DebugFilling {
  pub fn new(nodes: Vec<DebugNodeSettings>, world_min: Vec3) -> Self {
    Self {
      nodes,
      world_min,
      inserted: BTreeMap::new(),
      records: Vec::new(),
    }
  }

  pub fn records(&self) -> &[DebugNode] {
    &self.records
  }
}

impl GridVolume for DebugFilling {
  fn name(&self) -> &'static str {
    "debug_filling"
  }

  fn insert_nodes(&mut self, grid: &mut GridHierarchy) {
    self.inserted.clear();
    for setting in &self.nodes {
      let position = Vec3::from_array(setting.position) - self.world_min;
      if !grid.contains(position) || setting.level >= grid.level_count() {
        log::debug!("debug node at {:?} outside grid, skipped", setting.position);
        continue;
      }
      let node = grid.add_node(setting.level, position);
      let texel = setting.medium.texel();
      self
        .inserted
        .entry((setting.level, node))
        .and_modify(|value| {
          value.x += texel.x;
          value.y += texel.y;
        })
        .or_insert(texel);
    }
  }

  fn update_records(&mut self, grid: &GridHierarchy) {
    self.records.clear();
    self
      .records
      .extend(self.inserted.iter().map(|(&(level, node), value)| DebugNode {
        value: value.to_array(),
        image_offset: pack_atlas_offset(grid.level(level).nodes().image_info(node).tile),
        padding: [0; 3],
      }));
  }
}
