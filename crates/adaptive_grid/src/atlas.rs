//! ImageAtlas - cubic 3-D image of equally sized tiles.
//!
//! The atlas holds `side_length`³ tiles; node slot `s` lives at tile
//! `(s % side, (s / side) % side, s / side²)`. The side length is the
//! smallest integer whose cube holds every slot of the frame.
//!
//! The backing image only ever grows. Growth waits for the device to go
//! idle, destroys the old image and creates a new one; texel contents are
//! not carried over because the first pass of every frame clears the atlas.

use glam::UVec3;

use crate::constants::{IMAGE_RESOLUTION, NODE_RESOLUTION};
use crate::error::GpuError;
use crate::gpu::{GpuDevice, ImageDesc, ImageHandle};

/// Smallest `side >= 1` with `side³ >= slot_count`, in exact integer math.
pub fn side_length_for(slot_count: u32) -> u32 {
  if slot_count <= 1 {
    return 1;
  }
  let count = slot_count as u64;
  let mut side = (count as f64).cbrt().round() as u64;
  while side.pow(3) < count {
    side += 1;
  }
  while side > 1 && (side - 1).pow(3) >= count {
    side -= 1;
  }
  side as u32
}

/// Cubic tile atlas backed by a single device image.
#[derive(Debug)]
pub struct ImageAtlas {
  label: &'static str,
  tile_resolution: u32,
  side_length: u32,
  /// Side length the current image was created with.
  allocated_side_length: u32,
  image: Option<ImageHandle>,
}

impl ImageAtlas {
  /// Atlas whose tiles are `tile_resolution` texels per axis.
  pub fn new(label: &'static str, tile_resolution: u32) -> Self {
    Self {
      label,
      tile_resolution,
      side_length: 1,
      allocated_side_length: 0,
      image: None,
    }
  }

  /// Size the atlas for `slot_count` tiles. Returns the new side length.
  pub fn update_size(&mut self, slot_count: u32) -> u32 {
    self.side_length = side_length_for(slot_count);
    self.side_length
  }

  /// Whether the next `resize_image` will (re)create the image.
  #[inline]
  pub fn needs_resize(&self) -> bool {
    self.image.is_none() || self.side_length > self.allocated_side_length
  }

  /// Grow the backing image if the current side length does not fit.
  ///
  /// Returns `true` if a new image was created.
  pub fn resize_image<D: GpuDevice>(&mut self, device: &mut D) -> Result<bool, GpuError> {
    if !self.needs_resize() {
      return Ok(false);
    }

    if let Some(old) = self.image.take() {
      device.wait_idle();
      device.destroy_image(old);
    }

    let desc = ImageDesc {
      label: self.label,
      extent: UVec3::splat(self.side_length * self.tile_resolution),
    };
    let image = device.create_image(&desc)?;
    log::debug!(
      "{}: resized to {}³ tiles ({} bytes)",
      self.label,
      self.side_length,
      desc.byte_size()
    );

    self.image = Some(image);
    self.allocated_side_length = self.side_length;
    Ok(true)
  }

  /// Destroy the backing image. The next `resize_image` recreates it.
  pub fn release<D: GpuDevice>(&mut self, device: &mut D) {
    if let Some(image) = self.image.take() {
      device.destroy_image(image);
    }
    self.allocated_side_length = 0;
  }

  /// Scale from grid space to atlas texture coordinates for a level of
  /// `cell_size`: one cell maps to the 16 interior texels of its tile.
  #[inline]
  pub fn texel_scale(&self, cell_size: f32) -> f32 {
    NODE_RESOLUTION as f32 / (IMAGE_RESOLUTION * self.side_length) as f32 / cell_size
  }

  /// First texel of a tile.
  #[inline]
  pub fn tile_origin(&self, tile: UVec3) -> UVec3 {
    tile * self.tile_resolution
  }

  #[inline]
  pub fn side_length(&self) -> u32 {
    self.side_length
  }

  #[inline]
  pub fn allocated_side_length(&self) -> u32 {
    self.allocated_side_length
  }

  #[inline]
  pub fn tile_resolution(&self) -> u32 {
    self.tile_resolution
  }

  #[inline]
  pub fn image(&self) -> Option<ImageHandle> {
    self.image
  }
}

#[cfg(test)]
#[path = "atlas_test.rs"]
mod atlas_test;
