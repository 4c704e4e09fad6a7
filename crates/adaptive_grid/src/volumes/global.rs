//! Homogeneous medium in the root tile.

use glam::{UVec3, Vec3, Vec4};

use super::GridVolume;
use crate::config::MediumSettings;
use crate::grid::GridHierarchy;

/// Always inserts the root node. Fills its tile when the medium is nonzero.
#[derive(Clone, Debug, Default)]
pub struct GlobalVolume {
  medium: MediumSettings,
  root_tile: Option<UVec3>,
}

impl GlobalVolume {
  pub fn new(medium: MediumSettings) -> Self {
    Self {
      medium,
      root_tile: None,
    }
  }

  pub fn set_medium(&mut self, medium: MediumSettings) {
    self.medium = medium;
  }

  pub fn medium(&self) -> &MediumSettings {
    &self.medium
  }

  /// Tile and value to write this frame, `None` for an empty medium.
  pub fn fill(&self) -> Option<(UVec3, Vec4)> {
    if self.medium.is_empty() {
      return None;
    }
    self.root_tile.map(|tile| (tile, self.medium.texel()))
  }
}

impl GridVolume for GlobalVolume {
  fn name(&self) -> &'static str {
    "global"
  }

  fn insert_nodes(&mut self, grid: &mut GridHierarchy) {
    grid.add_node(0, Vec3::ZERO);
  }

  fn update_records(&mut self, grid: &GridHierarchy) {
    let root = grid.level(0).nodes();
    self.root_tile = (!root.is_empty()).then(|| root.image_info(0).tile);
  }
}
