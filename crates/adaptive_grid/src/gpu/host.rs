//! HostDevice - [`GpuDevice`] on the CPU.
//!
//! Buffers are byte vectors, images are `Vec4` texel arrays, and every
//! [`Kernel`] runs immediately on `dispatch`. Per-tile work is spread with
//! rayon: texel values are computed in parallel against the current image,
//! then written back sequentially.
//!
//! An optional memory budget turns allocations past the budget into
//! [`GpuError::OutOfMemory`].

use std::collections::HashMap;

use bytemuck::Pod;
use glam::{UVec3, Vec3, Vec4};
use rayon::prelude::*;

use super::layout::{
  read_records, DebugNode, FogCell, FogConstants, MipChildEntry, MipParentEntry, NeighborInfo,
  ParticleConstants, ParticleGpu, ParticleNode,
};
use super::{BufferDesc, BufferHandle, GpuDevice, ImageDesc, ImageHandle, Kernel, KernelKind};
use crate::constants::{
  direction_axis, direction_step, IMAGE_RESOLUTION, MIP_IMAGE_RESOLUTION, NODE_RESOLUTION,
  TEXEL_BYTES, TILE_BORDER,
};
use crate::error::GpuError;
use crate::grid::unpack_atlas_offset;

// =============================================================================
// HostImage
// =============================================================================

/// 3-D RGBA32F image in host memory.
#[derive(Clone, Debug)]
pub struct HostImage {
  extent: UVec3,
  texels: Vec<Vec4>,
}

impl HostImage {
  pub fn new(extent: UVec3) -> Self {
    let count = extent.x as usize * extent.y as usize * extent.z as usize;
    Self {
      extent,
      texels: vec![Vec4::ZERO; count],
    }
  }

  #[inline]
  pub fn extent(&self) -> UVec3 {
    self.extent
  }

  #[inline]
  fn index(&self, p: UVec3) -> usize {
    debug_assert!(p.cmplt(self.extent).all(), "texel {p} outside {}", self.extent);
    ((p.z as usize * self.extent.y as usize) + p.y as usize) * self.extent.x as usize + p.x as usize
  }

  #[inline]
  pub fn texel(&self, p: UVec3) -> Vec4 {
    self.texels[self.index(p)]
  }

  #[inline]
  pub fn set_texel(&mut self, p: UVec3, value: Vec4) {
    let index = self.index(p);
    self.texels[index] = value;
  }

  pub fn texels(&self) -> &[Vec4] {
    &self.texels
  }

  pub fn byte_size(&self) -> u64 {
    self.texels.len() as u64 * TEXEL_BYTES
  }

  fn apply(&mut self, writes: Vec<(UVec3, Vec4)>) {
    for (p, value) in writes {
      self.set_texel(p, value);
    }
  }
}

/// Every coordinate of a `size`³ block, x fastest.
fn block(size: u32) -> impl Iterator<Item = UVec3> {
  (0..size).flat_map(move |z| {
    (0..size).flat_map(move |y| (0..size).map(move |x| UVec3::new(x, y, z)))
  })
}

/// First interior texel of a packed main-atlas tile.
#[inline]
fn tile_interior(packed: u32) -> UVec3 {
  unpack_atlas_offset(packed) * IMAGE_RESOLUTION + UVec3::splat(TILE_BORDER)
}

/// Add a medium sample: coefficients sum, the phase of the newest medium wins.
#[inline]
fn add_medium(old: Vec4, medium: Vec4) -> Vec4 {
  Vec4::new(old.x + medium.x, old.y + medium.y, medium.z, 0.0)
}

// =============================================================================
// HostDevice
// =============================================================================

/// CPU implementation of [`GpuDevice`].
#[derive(Debug, Default)]
pub struct HostDevice {
  buffers: HashMap<u32, Vec<u8>>,
  images: HashMap<u32, HostImage>,
  next_handle: u32,
  memory_budget: Option<u64>,
  allocated_bytes: u64,
  /// Frame slots submitted but not yet waited on.
  pending_frames: Vec<bool>,
  wait_idle_count: u32,
  fence_wait_count: u32,
  submitted_frames: u64,
  dispatch_log: Vec<KernelKind>,
}

impl HostDevice {
  pub fn new() -> Self {
    Self::default()
  }

  /// Device that fails allocations past `budget` bytes.
  pub fn with_memory_budget(budget: u64) -> Self {
    Self {
      memory_budget: Some(budget),
      ..Self::default()
    }
  }

  pub fn image(&self, image: ImageHandle) -> Option<&HostImage> {
    self.images.get(&image.0)
  }

  pub fn buffer(&self, buffer: BufferHandle) -> Option<&[u8]> {
    self.buffers.get(&buffer.0).map(Vec::as_slice)
  }

  #[inline]
  pub fn allocated_bytes(&self) -> u64 {
    self.allocated_bytes
  }

  #[inline]
  pub fn live_buffers(&self) -> usize {
    self.buffers.len()
  }

  #[inline]
  pub fn wait_idle_count(&self) -> u32 {
    self.wait_idle_count
  }

  #[inline]
  pub fn fence_wait_count(&self) -> u32 {
    self.fence_wait_count
  }

  #[inline]
  pub fn submitted_frames(&self) -> u64 {
    self.submitted_frames
  }

  /// Kernels dispatched since the last `clear_dispatch_log`, in order.
  pub fn dispatch_log(&self) -> &[KernelKind] {
    &self.dispatch_log
  }

  pub fn clear_dispatch_log(&mut self) {
    self.dispatch_log.clear();
  }

  fn allocate(&mut self, size: u64) -> Result<u32, GpuError> {
    if let Some(budget) = self.memory_budget {
      let available = budget.saturating_sub(self.allocated_bytes);
      if size > available {
        return Err(GpuError::OutOfMemory {
          requested: size,
          available,
          budget,
        });
      }
    }
    self.allocated_bytes += size;
    let handle = self.next_handle;
    self.next_handle += 1;
    Ok(handle)
  }

  fn image_ref(&self, image: ImageHandle) -> Result<&HostImage, GpuError> {
    self.images.get(&image.0).ok_or(GpuError::UnknownImage(image.0))
  }

  fn image_mut(&mut self, image: ImageHandle) -> Result<&mut HostImage, GpuError> {
    self
      .images
      .get_mut(&image.0)
      .ok_or(GpuError::UnknownImage(image.0))
  }

  /// Decode `count` records of `T` starting at record `start`.
  fn records<T: Pod>(&self, buffer: BufferHandle, start: u32, count: u32) -> Result<Vec<T>, GpuError> {
    let bytes = self.all_bytes(buffer)?;
    let size = std::mem::size_of::<T>();
    let begin = start as usize * size;
    let len = count as usize * size;
    let slice = bytes.get(begin..begin + len).ok_or(GpuError::ReadOutOfBounds {
      offset: begin as u64,
      len: len as u64,
      size: bytes.len() as u64,
    })?;
    Ok(read_records(slice))
  }

  fn all_bytes(&self, buffer: BufferHandle) -> Result<&[u8], GpuError> {
    self
      .buffers
      .get(&buffer.0)
      .map(Vec::as_slice)
      .ok_or(GpuError::UnknownBuffer(buffer.0))
  }

  // ===========================================================================
  // Kernels
  // ===========================================================================

  fn fill_tile(&mut self, atlas: ImageHandle, tile: UVec3, value: Vec4) -> Result<(), GpuError> {
    let image = self.image_mut(atlas)?;
    let origin = tile * IMAGE_RESOLUTION;
    for p in block(IMAGE_RESOLUTION) {
      image.set_texel(origin + p, value);
    }
    Ok(())
  }

  fn ground_fog(
    &mut self,
    atlas: ImageHandle,
    cells: BufferHandle,
    cell_count: u32,
    constants: &FogConstants,
  ) -> Result<(), GpuError> {
    let cells: Vec<FogCell> = self.records(cells, 0, cell_count)?;
    let image = self.image_ref(atlas)?;
    let texel = constants.texel_world_size;
    let medium = Vec4::new(constants.scattering, constants.extinction, constants.phase_g, 0.0);

    let writes: Vec<(UVec3, Vec4)> = cells
      .par_iter()
      .flat_map_iter(|cell| {
        let origin = tile_interior(cell.image_offset);
        let cell_y = cell.world_offset[1];
        block(NODE_RESOLUTION).filter_map(move |p| {
          // Fog fills grid-space y >= grid_space_height.
          let texel_max_y = cell_y + (p.y + 1) as f32 * texel;
          let coverage = ((texel_max_y - constants.grid_space_height) / texel).clamp(0.0, 1.0);
          (coverage > 0.0).then(|| {
            let sample = Vec4::new(medium.x * coverage, medium.y * coverage, medium.z, 0.0);
            (origin + p, add_medium(image.texel(origin + p), sample))
          })
        })
      })
      .collect();

    self.image_mut(atlas)?.apply(writes);
    Ok(())
  }

  #[allow(clippy::too_many_arguments)]
  fn particles(
    &mut self,
    atlas: ImageHandle,
    nodes: BufferHandle,
    node_start: u32,
    node_count: u32,
    indices: BufferHandle,
    particles: BufferHandle,
    constants: &ParticleConstants,
  ) -> Result<(), GpuError> {
    let nodes: Vec<ParticleNode> = self.records(nodes, node_start, node_count)?;
    let indices: Vec<u32> = read_records(self.all_bytes(indices)?);
    let particles: Vec<ParticleGpu> = read_records(self.all_bytes(particles)?);
    let image = self.image_ref(atlas)?;
    let texel = constants.texel_world_size;
    let medium = Vec4::new(constants.scattering, constants.extinction, constants.phase_g, 0.0);

    let writes: Vec<(UVec3, Vec4)> = nodes
      .par_iter()
      .flat_map_iter(|node| {
        let start = node.particle_offset as usize;
        let end = start + node.particle_count as usize;
        let touching: Vec<ParticleGpu> = indices
          .get(start..end)
          .unwrap_or_default()
          .iter()
          .filter_map(|&i| particles.get(i as usize).copied())
          .collect();
        let origin = tile_interior(node.image_offset);
        let world_offset = Vec3::from_array(node.world_offset);

        block(NODE_RESOLUTION).filter_map(move |p| {
          let center = world_offset + (p.as_vec3() + Vec3::splat(0.5)) * texel;
          let inside = touching
            .iter()
            .any(|particle| center.distance_squared(Vec3::from_array(particle.position)) <= particle.radius_sq);
          inside.then(|| (origin + p, add_medium(image.texel(origin + p), medium)))
        })
      })
      .collect();

    self.image_mut(atlas)?.apply(writes);
    Ok(())
  }

  fn debug_filling(
    &mut self,
    atlas: ImageHandle,
    nodes: BufferHandle,
    node_count: u32,
  ) -> Result<(), GpuError> {
    let nodes: Vec<DebugNode> = self.records(nodes, 0, node_count)?;
    let image = self.image_ref(atlas)?;

    let writes: Vec<(UVec3, Vec4)> = nodes
      .par_iter()
      .flat_map_iter(|node| {
        let origin = tile_interior(node.image_offset);
        let value = Vec4::from_array(node.value);
        block(NODE_RESOLUTION).map(move |p| (origin + p, add_medium(image.texel(origin + p), value)))
      })
      .collect();

    self.image_mut(atlas)?.apply(writes);
    Ok(())
  }

  #[allow(clippy::too_many_arguments)]
  fn mip_averaging(
    &mut self,
    atlas: ImageHandle,
    mip_atlas: ImageHandle,
    children: BufferHandle,
    child_start: u32,
    child_count: u32,
    parents: BufferHandle,
    parent_start: u32,
    parent_count: u32,
  ) -> Result<(), GpuError> {
    let parents: Vec<MipParentEntry> = self.records(parents, parent_start, parent_count)?;
    let children: Vec<MipChildEntry> = self.records(children, child_start, child_count)?;
    let source = self.image_ref(atlas)?;
    let texel_count = NODE_RESOLUTION.pow(3) as f32;

    let averages: Vec<(UVec3, Vec4)> = children
      .par_iter()
      .map(|child| {
        let origin = tile_interior(child.child_image_offset);
        let sum: Vec4 = block(NODE_RESOLUTION).map(|p| source.texel(origin + p)).sum();
        (unpack_atlas_offset(child.parent_texel), sum / texel_count)
      })
      .collect();

    let mip = self.image_mut(mip_atlas)?;
    for parent in &parents {
      let origin = unpack_atlas_offset(parent.mip_offset);
      for p in block(MIP_IMAGE_RESOLUTION) {
        mip.set_texel(origin + p, Vec4::ZERO);
      }
    }
    mip.apply(averages);
    Ok(())
  }

  fn mip_merging(
    &mut self,
    atlas: ImageHandle,
    mip_atlas: ImageHandle,
    parents: BufferHandle,
    parent_start: u32,
    parent_count: u32,
  ) -> Result<(), GpuError> {
    let parents: Vec<MipParentEntry> = self.records(parents, parent_start, parent_count)?;
    let source = self.image_ref(atlas)?;
    let mip = self.image_ref(mip_atlas)?;

    let writes: Vec<(UVec3, Vec4)> = parents
      .par_iter()
      .flat_map_iter(|parent| {
        let raw = tile_interior(parent.image_atlas_offset);
        let merged = tile_interior(parent.image_atlas_mip_offset);
        let averaged = unpack_atlas_offset(parent.mip_offset);
        block(NODE_RESOLUTION)
          .map(move |p| (merged + p, source.texel(raw + p) + mip.texel(averaged + p)))
      })
      .collect();

    self.image_mut(atlas)?.apply(writes);
    Ok(())
  }

  fn neighbor_copy(
    &mut self,
    atlas: ImageHandle,
    pairs: BufferHandle,
    pair_start: u32,
    pair_count: u32,
  ) -> Result<(), GpuError> {
    let pairs: Vec<NeighborInfo> = self.records(pairs, pair_start, pair_count)?;
    let image = self.image_mut(atlas)?;
    let last = IMAGE_RESOLUTION - 1;
    let inner = NODE_RESOLUTION;

    for pair in &pairs {
      let a = unpack_atlas_offset(pair.first) * IMAGE_RESOLUTION;
      let b = unpack_atlas_offset(pair.second) * IMAGE_RESOLUTION;
      let direction = pair.direction as usize;
      let axis = direction_axis(direction);

      // (a border, b interior, b border, a interior) layers along the axis
      let (a_border, b_source, b_border, a_source) = if direction_step(direction) < 0 {
        (0, inner, last, 1)
      } else {
        (last, 1, 0, inner)
      };

      for v in 0..NODE_RESOLUTION {
        for u in 0..NODE_RESOLUTION {
          let at = |layer: u32| face_texel(axis, layer, u, v);
          let from_b = image.texel(b + at(b_source));
          let from_a = image.texel(a + at(a_source));
          image.set_texel(a + at(a_border), from_b);
          image.set_texel(b + at(b_border), from_a);
        }
      }
    }
    Ok(())
  }
}

/// Texel of a tile face: `layer` along `axis`, interior `(u, v)` across it.
#[inline]
fn face_texel(axis: usize, layer: u32, u: u32, v: u32) -> UVec3 {
  let mut p = UVec3::ZERO;
  p[axis] = layer;
  p[(axis + 1) % 3] = u + TILE_BORDER;
  p[(axis + 2) % 3] = v + TILE_BORDER;
  p
}

impl GpuDevice for HostDevice {
  fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferHandle, GpuError> {
    let handle = self.allocate(desc.size)?;
    self.buffers.insert(handle, vec![0; desc.size as usize]);
    Ok(BufferHandle(handle))
  }

  fn destroy_buffer(&mut self, buffer: BufferHandle) {
    match self.buffers.remove(&buffer.0) {
      Some(bytes) => self.allocated_bytes -= bytes.len() as u64,
      None => log::warn!("destroy of unknown buffer {}", buffer.0),
    }
  }

  fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<(), GpuError> {
    let bytes = self
      .buffers
      .get_mut(&buffer.0)
      .ok_or(GpuError::UnknownBuffer(buffer.0))?;
    let end = offset + data.len() as u64;
    if end > bytes.len() as u64 {
      return Err(GpuError::WriteOutOfBounds {
        offset,
        len: data.len() as u64,
        size: bytes.len() as u64,
      });
    }
    bytes[offset as usize..end as usize].copy_from_slice(data);
    Ok(())
  }

  fn create_image(&mut self, desc: &ImageDesc) -> Result<ImageHandle, GpuError> {
    let handle = self.allocate(desc.byte_size())?;
    self.images.insert(handle, HostImage::new(desc.extent));
    Ok(ImageHandle(handle))
  }

  fn destroy_image(&mut self, image: ImageHandle) {
    match self.images.remove(&image.0) {
      Some(host) => self.allocated_bytes -= host.byte_size(),
      None => log::warn!("destroy of unknown image {}", image.0),
    }
  }

  fn wait_idle(&mut self) {
    self.wait_idle_count += 1;
    self.pending_frames.fill(false);
  }

  fn wait_for_frame(&mut self, frame: usize) {
    if let Some(pending) = self.pending_frames.get_mut(frame) {
      if *pending {
        self.fence_wait_count += 1;
        *pending = false;
      }
    }
  }

  fn submit_frame(&mut self, frame: usize) {
    if self.pending_frames.len() <= frame {
      self.pending_frames.resize(frame + 1, false);
    }
    self.pending_frames[frame] = true;
    self.submitted_frames += 1;
  }

  fn dispatch(&mut self, kernel: &Kernel) -> Result<(), GpuError> {
    #[cfg(feature = "tracing")]
    let _span = tracing::info_span!("host_kernel", kind = ?kernel.kind()).entered();
    self.dispatch_log.push(kernel.kind());

    match *kernel {
      Kernel::ClearImage { image } => {
        self.image_mut(image)?.texels.fill(Vec4::ZERO);
        Ok(())
      }
      Kernel::FillTile { atlas, tile, value } => self.fill_tile(atlas, tile, value),
      Kernel::GroundFog {
        atlas,
        cells,
        cell_count,
        constants,
      } => self.ground_fog(atlas, cells, cell_count, &constants),
      Kernel::Particles {
        atlas,
        nodes,
        node_start,
        node_count,
        indices,
        particles,
        constants,
      } => self.particles(atlas, nodes, node_start, node_count, indices, particles, &constants),
      Kernel::DebugFilling {
        atlas,
        nodes,
        node_count,
      } => self.debug_filling(atlas, nodes, node_count),
      Kernel::MipAveraging {
        atlas,
        mip_atlas,
        children,
        child_start,
        child_count,
        parents,
        parent_start,
        parent_count,
      } => self.mip_averaging(
        atlas,
        mip_atlas,
        children,
        child_start,
        child_count,
        parents,
        parent_start,
        parent_count,
      ),
      Kernel::MipMerging {
        atlas,
        mip_atlas,
        parents,
        parent_start,
        parent_count,
      } => self.mip_merging(atlas, mip_atlas, parents, parent_start, parent_count),
      Kernel::NeighborCopy {
        atlas,
        pairs,
        pair_start,
        pair_count,
      } => self.neighbor_copy(atlas, pairs, pair_start, pair_count),
      Kernel::Raymarch {
        atlas,
        levels,
        level_count,
        ..
      } => {
        self.image_ref(atlas)?;
        self.all_bytes(levels)?;
        log::trace!("raymarch over {} levels", level_count);
        Ok(())
      }
    }
  }
}

#[cfg(test)]
#[path = "host_test.rs"]
mod host_test;
