//! Frames in flight.
//!
//! Every per-frame resource exists once per frame slot so the CPU can fill
//! frame `n + 1` while the device still reads frame `n`. All copies of a
//! resource share one size; growing any of them is a stop-the-world event:
//!
//! ```text
//! required > max_size ──► wait_idle ──► destroy all copies ──► create all copies
//! ```

use crate::error::GpuError;
use crate::gpu::{BufferDesc, BufferHandle, BufferUsage, GpuDevice};

/// Smallest buffer ever created. Empty record lists still bind something.
const MIN_BUFFER_SIZE: u64 = 16;

/// Round-robin frame slot counter.
#[derive(Clone, Copy, Debug)]
pub struct FrameRing {
  frames_in_flight: usize,
  current: usize,
  frame_number: u64,
}

impl FrameRing {
  pub fn new(frames_in_flight: usize) -> Self {
    Self {
      frames_in_flight: frames_in_flight.max(1),
      current: 0,
      frame_number: 0,
    }
  }

  /// Move to the next frame slot and return it.
  pub fn advance(&mut self) -> usize {
    if self.frame_number > 0 {
      self.current = (self.current + 1) % self.frames_in_flight;
    }
    self.frame_number += 1;
    self.current
  }

  #[inline]
  pub fn current(&self) -> usize {
    self.current
  }

  /// Frames started so far.
  #[inline]
  pub fn frame_number(&self) -> u64 {
    self.frame_number
  }

  #[inline]
  pub fn frames_in_flight(&self) -> usize {
    self.frames_in_flight
  }
}

/// One logical buffer with a copy per frame slot.
#[derive(Debug)]
pub struct FrameBuffer {
  label: &'static str,
  usage: BufferUsage,
  max_size: u64,
  handles: Vec<BufferHandle>,
}

impl FrameBuffer {
  pub fn new(label: &'static str, usage: BufferUsage) -> Self {
    Self {
      label,
      usage,
      max_size: 0,
      handles: Vec::new(),
    }
  }

  /// Whether `required` bytes do not fit the current copies.
  #[inline]
  pub fn needs_resize(&self, required: u64) -> bool {
    self.handles.is_empty() || required > self.max_size
  }

  /// Destroy every copy and create `frames_in_flight` new ones of at least
  /// `required` bytes. The caller must have waited for the device to idle.
  pub fn recreate<D: GpuDevice>(
    &mut self,
    device: &mut D,
    frames_in_flight: usize,
    required: u64,
  ) -> Result<(), GpuError> {
    for handle in self.handles.drain(..) {
      device.destroy_buffer(handle);
    }
    self.max_size = required.max(self.max_size).max(MIN_BUFFER_SIZE);

    let desc = BufferDesc {
      label: self.label,
      size: self.max_size,
      usage: self.usage,
    };
    for _ in 0..frames_in_flight {
      let handle = device.create_buffer(&desc)?;
      self.handles.push(handle);
    }
    log::debug!(
      "{}: {} copies of {} bytes",
      self.label,
      frames_in_flight,
      self.max_size
    );
    Ok(())
  }

  /// Destroy every copy. The next `needs_resize` reports true.
  pub fn release<D: GpuDevice>(&mut self, device: &mut D) {
    for handle in self.handles.drain(..) {
      device.destroy_buffer(handle);
    }
    self.max_size = 0;
  }

  /// Write `bytes` at the start of the frame slot's copy.
  pub fn upload<D: GpuDevice>(
    &self,
    device: &mut D,
    frame: usize,
    bytes: &[u8],
  ) -> Result<(), GpuError> {
    if bytes.is_empty() {
      return Ok(());
    }
    device.write_buffer(self.handle(frame), 0, bytes)
  }

  /// Copy of the given frame slot.
  ///
  /// # Panics
  ///
  /// If the buffer has not been created yet.
  #[inline]
  pub fn handle(&self, frame: usize) -> BufferHandle {
    self.handles[frame]
  }

  #[inline]
  pub fn label(&self) -> &'static str {
    self.label
  }

  #[inline]
  pub fn max_size(&self) -> u64 {
    self.max_size
  }

  #[inline]
  pub fn copies(&self) -> usize {
    self.handles.len()
  }
}
