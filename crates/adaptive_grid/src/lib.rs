//! adaptive_grid - Hierarchical sparse grid for volumetric media
//!
//! This crate rebuilds a multi-level sparse grid every frame from a set of
//! volumes (a global medium, ground fog, particle systems and fixed debug
//! nodes), packs every node into a 3-D texture atlas and records the compute
//! passes that fill, mip-map and seam the atlas for a ray-marcher.
//!
//! # Features
//!
//! - **Sparse levels**: nodes exist only where content is inserted, with
//!   per-node child bitmasks and prefix counts for O(1) child lookup
//! - **Tile atlas**: one 18³ tile per node (16³ interior + border), cubic
//!   layout, grow-only image
//! - **Mip-maps**: every parent carries an averaged copy of its children,
//!   merged with its own content, evaluated bottom-up
//! - **Seams**: face neighbors exchange one border layer per frame
//! - **Device abstraction**: everything goes through [`gpu::GpuDevice`];
//!   [`gpu::HostDevice`] runs all kernels on the CPU with rayon
//!
//! # Example
//!
//! ```ignore
//! use adaptive_grid::{AdaptiveGrid, GridConfig};
//! use adaptive_grid::gpu::HostDevice;
//!
//! let config = GridConfig::from_toml_str(include_str!("scene.toml"))?;
//! let mut grid = AdaptiveGrid::new(config)?;
//! let mut device = HostDevice::new();
//!
//! for _ in 0..60 {
//!     let stats = grid.update(&mut device, 1.0 / 60.0)?;
//!     println!("{:?} nodes per level", stats.nodes_per_level);
//! }
//! ```

pub mod constants;
pub mod error;
pub use constants::{
  grid_index, grid_position, IMAGE_RESOLUTION, MIP_IMAGE_RESOLUTION, NODE_RESOLUTION,
};
pub use error::{GpuError, GridError, GridResult};

pub mod config;
pub use config::{
  DebugNodeSettings, EmitterSettings, GridConfig, GroundFogSettings, MediumSettings,
  ParticleSettings, ParticleSystemSettings,
};

// Sparse level arena
pub mod grid;
pub use grid::{GridHierarchy, GridLevel};

// Device abstraction and CPU backend
pub mod gpu;
pub use gpu::{GpuDevice, HostDevice, Kernel};

pub mod atlas;
pub use atlas::ImageAtlas;

pub mod mip_mapping;
pub use mip_mapping::MipMapping;

pub mod neighbors;
pub use neighbors::NeighborCells;

// Content sources
pub mod volumes;
pub use volumes::{GridVolume, Particle, ParticleSystem};

pub mod passes;
pub use passes::GridPass;

// Per-frame orchestration
pub mod adaptive_grid;
pub use adaptive_grid::{AdaptiveGrid, FrameStage, FrameStats, GridBuffer};

pub mod metrics;
