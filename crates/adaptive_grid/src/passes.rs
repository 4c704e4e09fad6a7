//! GridPass - the compute passes of one frame, in dispatch order.
//!
//! ```text
//!   Global ─► GroundFog ─► Particles ─► DebugFilling
//!     ─► (MipAveraging L, MipMerging L) for L = most detailed parent .. 0
//!     ─► NeighborUpdate (raw tiles) ─► NeighborUpdate (merged tiles)
//!     ─► Raymarching
//! ```
//!
//! Border exchange runs after every mip pass so the merged tiles written by
//! merging are final before their borders are copied.

/// One compute pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GridPass {
  /// Clear the atlas, fill the root tile with the global medium.
  Global,
  GroundFog,
  Particles,
  DebugFilling,
  /// Average the children of parent level `level` into the mip atlas.
  MipAveraging { level: usize },
  /// Write raw + averaged tiles of parent level `level` into their mip slots.
  MipMerging { level: usize },
  /// Exchange tile borders of raw tiles (`mip == false`) or merged tiles.
  NeighborUpdate { mip: bool },
  Raymarching,
}

impl GridPass {
  pub fn name(&self) -> &'static str {
    match self {
      GridPass::Global => "global",
      GridPass::GroundFog => "ground_fog",
      GridPass::Particles => "particles",
      GridPass::DebugFilling => "debug_filling",
      GridPass::MipAveraging { .. } => "mip_averaging",
      GridPass::MipMerging { .. } => "mip_merging",
      GridPass::NeighborUpdate { mip: false } => "neighbor_update",
      GridPass::NeighborUpdate { mip: true } => "neighbor_update_mip",
      GridPass::Raymarching => "raymarching",
    }
  }
}

/// Full pass list of a frame. `mip_levels` yields the parent levels with mip
/// work, most detailed first.
pub fn frame_schedule(mip_levels: impl IntoIterator<Item = usize>) -> Vec<GridPass> {
  let mut passes = vec![
    GridPass::Global,
    GridPass::GroundFog,
    GridPass::Particles,
    GridPass::DebugFilling,
  ];
  for level in mip_levels {
    passes.push(GridPass::MipAveraging { level });
    passes.push(GridPass::MipMerging { level });
  }
  passes.extend([
    GridPass::NeighborUpdate { mip: false },
    GridPass::NeighborUpdate { mip: true },
    GridPass::Raymarching,
  ]);
  passes
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_schedule_order() {
    let passes = frame_schedule([1, 0]);
    assert_eq!(
      passes,
      vec![
        GridPass::Global,
        GridPass::GroundFog,
        GridPass::Particles,
        GridPass::DebugFilling,
        GridPass::MipAveraging { level: 1 },
        GridPass::MipMerging { level: 1 },
        GridPass::MipAveraging { level: 0 },
        GridPass::MipMerging { level: 0 },
        GridPass::NeighborUpdate { mip: false },
        GridPass::NeighborUpdate { mip: true },
        GridPass::Raymarching,
      ]
    );
  }

  #[test]
  fn test_schedule_without_mips() {
    let passes = frame_schedule(std::iter::empty());
    assert_eq!(passes.len(), 7);
    assert!(!passes.iter().any(|p| matches!(p, GridPass::MipAveraging { .. })));
  }
}
