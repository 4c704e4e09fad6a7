//! Error types for the adaptive grid.
//!
//! Only fatal conditions live here. Lookup misses are `Option::None`, and
//! precondition violations (out-of-range packing, out-of-order level updates)
//! are assertions.

use thiserror::Error;

/// Failure reported by a [`GpuDevice`](crate::gpu::GpuDevice).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GpuError {
  /// Allocation would exceed the device memory budget.
  #[error("out of device memory: requested {requested} bytes, {available} of {budget} available")]
  OutOfMemory {
    requested: u64,
    available: u64,
    budget: u64,
  },

  /// Buffer handle is not (or no longer) alive.
  #[error("unknown buffer handle {0}")]
  UnknownBuffer(u32),

  /// Image handle is not (or no longer) alive.
  #[error("unknown image handle {0}")]
  UnknownImage(u32),

  /// Upload does not fit the destination buffer.
  #[error("write of {len} bytes at offset {offset} exceeds buffer size {size}")]
  WriteOutOfBounds { offset: u64, len: u64, size: u64 },

  /// Kernel record range does not fit the bound buffer.
  #[error("read of {len} bytes at offset {offset} exceeds buffer size {size}")]
  ReadOutOfBounds { offset: u64, len: u64, size: u64 },
}

/// Top-level error for grid setup and per-frame updates.
#[derive(Debug, Error)]
pub enum GridError {
  /// GPU resource creation or upload failed. Fatal for the subsystem.
  #[error("gpu resource failure: {0}")]
  Gpu(#[from] GpuError),

  /// Configuration values are inconsistent.
  #[error("invalid grid configuration: {0}")]
  InvalidConfig(String),

  /// More mip tiles than packed mip-atlas texel coordinates can address.
  #[error("{parents} mip tiles exceed the mip atlas capacity of {capacity}")]
  MipAtlasFull { parents: usize, capacity: usize },

  /// A pass was recorded before the frame created its resources.
  #[error("{0} used before the first frame created it")]
  MissingResource(&'static str),

  /// Configuration TOML could not be parsed.
  #[error("failed to parse grid configuration: {0}")]
  ConfigParse(#[from] toml::de::Error),

  /// Configuration file could not be read.
  #[error("failed to read grid configuration: {0}")]
  Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type GridResult<T> = Result<T, GridError>;
