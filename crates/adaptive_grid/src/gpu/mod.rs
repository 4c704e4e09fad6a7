//! GPU device abstraction.
//!
//! The grid never talks to a graphics API directly. It creates buffers and
//! images, uploads bytes and records [`Kernel`] dispatches through the
//! [`GpuDevice`] trait. [`HostDevice`] implements the trait on the CPU and
//! executes every kernel over host-side texel arrays.
//!
//! ```text
//!   AdaptiveGrid ──create/destroy──► GpuDevice ◄── HostDevice (CPU kernels)
//!        │        ──write_buffer──►     ▲
//!        │        ──dispatch(Kernel)──► │
//!        └─wait_for_frame / submit_frame┘
//! ```

pub mod frames;
pub mod host;
pub mod layout;

pub use frames::{FrameBuffer, FrameRing};
pub use host::{HostDevice, HostImage};

use glam::{UVec3, Vec4};

use crate::error::GpuError;
use layout::{FogConstants, ParticleConstants};

/// Opaque buffer handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u32);

impl BufferHandle {
  pub fn raw(&self) -> u32 {
    self.0
  }
}

/// Opaque 3-D image handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub(crate) u32);

impl ImageHandle {
  pub fn raw(&self) -> u32 {
    self.0
  }
}

/// How a buffer is bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
  Storage,
  Uniform,
}

/// Buffer creation parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferDesc {
  pub label: &'static str,
  pub size: u64,
  pub usage: BufferUsage,
}

/// 3-D RGBA32F image creation parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageDesc {
  pub label: &'static str,
  /// Texels per axis.
  pub extent: UVec3,
}

impl ImageDesc {
  pub fn byte_size(&self) -> u64 {
    self.extent.x as u64
      * self.extent.y as u64
      * self.extent.z as u64
      * crate::constants::TEXEL_BYTES
  }
}

/// A compute dispatch. Every variant names the resources it binds.
///
/// Ranges (`*_start`, `*_count`) select records inside a buffer shared by
/// several dispatches of the same frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Kernel {
  /// Zero every texel.
  ClearImage { image: ImageHandle },

  /// Write `value` to every texel of one atlas tile, border included.
  FillTile {
    atlas: ImageHandle,
    tile: UVec3,
    value: Vec4,
  },

  /// Fill ground fog cells (`FogCell` records).
  GroundFog {
    atlas: ImageHandle,
    cells: BufferHandle,
    cell_count: u32,
    constants: FogConstants,
  },

  /// Splat spherical particles into leaf tiles (`ParticleNode` records,
  /// `u32` particle indices, `ParticleGpu` records).
  Particles {
    atlas: ImageHandle,
    nodes: BufferHandle,
    node_start: u32,
    node_count: u32,
    indices: BufferHandle,
    particles: BufferHandle,
    constants: ParticleConstants,
  },

  /// Write constant media into tiles (`DebugNode` records).
  DebugFilling {
    atlas: ImageHandle,
    nodes: BufferHandle,
    node_count: u32,
  },

  /// Clear the parents' mip tiles, then average each child tile into one
  /// mip texel (`MipParentEntry` / `MipChildEntry` records).
  MipAveraging {
    atlas: ImageHandle,
    mip_atlas: ImageHandle,
    children: BufferHandle,
    child_start: u32,
    child_count: u32,
    parents: BufferHandle,
    parent_start: u32,
    parent_count: u32,
  },

  /// Raw tile + averaged mip tile into the parent's reserved mip slot.
  MipMerging {
    atlas: ImageHandle,
    mip_atlas: ImageHandle,
    parents: BufferHandle,
    parent_start: u32,
    parent_count: u32,
  },

  /// Copy one border layer between face neighbors (`NeighborInfo` records).
  NeighborCopy {
    atlas: ImageHandle,
    pairs: BufferHandle,
    pair_start: u32,
    pair_count: u32,
  },

  /// Traverse the grid. Read-only consumer of every uploaded buffer.
  Raymarch {
    atlas: ImageHandle,
    levels: BufferHandle,
    level_count: u32,
    node_infos: BufferHandle,
    active_bits: BufferHandle,
    bit_counts: BufferHandle,
    childs: BufferHandle,
  },
}

/// Data-free tag of a [`Kernel`], for logs and dispatch histories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KernelKind {
  ClearImage,
  FillTile,
  GroundFog,
  Particles,
  DebugFilling,
  MipAveraging,
  MipMerging,
  NeighborCopy,
  Raymarch,
}

impl Kernel {
  pub fn kind(&self) -> KernelKind {
    match self {
      Kernel::ClearImage { .. } => KernelKind::ClearImage,
      Kernel::FillTile { .. } => KernelKind::FillTile,
      Kernel::GroundFog { .. } => KernelKind::GroundFog,
      Kernel::Particles { .. } => KernelKind::Particles,
      Kernel::DebugFilling { .. } => KernelKind::DebugFilling,
      Kernel::MipAveraging { .. } => KernelKind::MipAveraging,
      Kernel::MipMerging { .. } => KernelKind::MipMerging,
      Kernel::NeighborCopy { .. } => KernelKind::NeighborCopy,
      Kernel::Raymarch { .. } => KernelKind::Raymarch,
    }
  }
}

/// Minimal device surface the grid needs.
///
/// Creation failures are fatal for the grid; implementations must not retry.
pub trait GpuDevice {
  fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferHandle, GpuError>;

  fn destroy_buffer(&mut self, buffer: BufferHandle);

  /// Copy `data` into `buffer` at byte `offset`.
  fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8])
    -> Result<(), GpuError>;

  fn create_image(&mut self, desc: &ImageDesc) -> Result<ImageHandle, GpuError>;

  fn destroy_image(&mut self, image: ImageHandle);

  /// Block until all submitted work has finished.
  fn wait_idle(&mut self);

  /// Block until the last submission of frame slot `frame` has finished.
  fn wait_for_frame(&mut self, frame: usize);

  /// Close the frame slot's recording; its fence signals on completion.
  fn submit_frame(&mut self, frame: usize);

  fn dispatch(&mut self, kernel: &Kernel) -> Result<(), GpuError>;
}
