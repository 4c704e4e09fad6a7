//! Volumes - content that instantiates grid nodes and fills their tiles.
//!
//! Each frame the grid asks every volume, in a fixed order, to insert the
//! nodes it covers. Once tiles are assigned, each volume builds the records
//! its fill kernel reads.
//!
//! ```text
//!   insert_nodes    GlobalVolume  -> root
//!                   DebugFilling  -> configured level
//!                   GroundFog     -> level 1
//!                   ParticleSystems -> leaf level
//!   update_records  (after atlas tiles are known)
//! ```

pub mod debug_filling;
pub mod global;
pub mod ground_fog;
pub mod particles;

pub use debug_filling::DebugFilling;
pub use global::GlobalVolume;
pub use ground_fog::GroundFog;
pub use particles::{Particle, ParticleSystem, ParticleSystems};

use crate::grid::GridHierarchy;

/// Grid content source.
pub trait GridVolume {
  /// Short name for logs.
  fn name(&self) -> &'static str;

  /// Insert every node this volume touches in the current frame.
  fn insert_nodes(&mut self, grid: &mut GridHierarchy);

  /// Build the kernel records. Image indices of `grid` are assigned.
  fn update_records(&mut self, grid: &GridHierarchy);
}
