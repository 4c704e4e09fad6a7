use super::*;
use crate::gpu::BufferUsage;
use crate::grid::pack_atlas_offset;

fn atlas(device: &mut HostDevice, side: u32) -> ImageHandle {
  device
    .create_image(&ImageDesc {
      label: "atlas",
      extent: UVec3::splat(side * IMAGE_RESOLUTION),
    })
    .unwrap()
}

fn upload<T: Pod>(device: &mut HostDevice, records: &[T]) -> BufferHandle {
  let bytes: &[u8] = bytemuck::cast_slice(records);
  let buffer = device
    .create_buffer(&BufferDesc {
      label: "records",
      size: bytes.len().max(16) as u64,
      usage: BufferUsage::Storage,
    })
    .unwrap();
  device.write_buffer(buffer, 0, bytes).unwrap();
  buffer
}

fn fill_interior(device: &mut HostDevice, image: ImageHandle, tile: UVec3, value: Vec4) {
  let host = device.image_mut(image).unwrap();
  let origin = tile * IMAGE_RESOLUTION + UVec3::ONE;
  for p in block(NODE_RESOLUTION) {
    host.set_texel(origin + p, value);
  }
}

// =========================================================================
// Resources
// =========================================================================

#[test]
fn test_memory_budget_is_enforced() {
  let mut device = HostDevice::with_memory_budget(1024);
  let desc = BufferDesc {
    label: "big",
    size: 1000,
    usage: BufferUsage::Storage,
  };
  let first = device.create_buffer(&desc).unwrap();

  let err = device.create_buffer(&desc).unwrap_err();
  assert_eq!(
    err,
    GpuError::OutOfMemory {
      requested: 1000,
      available: 24,
      budget: 1024
    }
  );

  // Freed memory can be reused.
  device.destroy_buffer(first);
  assert_eq!(device.allocated_bytes(), 0);
  assert!(device.create_buffer(&desc).is_ok());
}

#[test]
fn test_write_out_of_bounds_is_rejected() {
  let mut device = HostDevice::new();
  let buffer = device
    .create_buffer(&BufferDesc {
      label: "small",
      size: 8,
      usage: BufferUsage::Uniform,
    })
    .unwrap();

  assert!(matches!(
    device.write_buffer(buffer, 4, &[0u8; 8]),
    Err(GpuError::WriteOutOfBounds { offset: 4, len: 8, size: 8 })
  ));
  assert!(device.write_buffer(buffer, 0, &[7u8; 8]).is_ok());
  assert_eq!(device.buffer(buffer).unwrap(), &[7u8; 8]);
}

#[test]
fn test_unknown_handles() {
  let mut device = HostDevice::new();
  let result = device.dispatch(&Kernel::ClearImage {
    image: ImageHandle(99),
  });
  assert_eq!(result, Err(GpuError::UnknownImage(99)));
  assert_eq!(
    device.write_buffer(BufferHandle(5), 0, &[1]),
    Err(GpuError::UnknownBuffer(5))
  );
}

#[test]
fn test_frame_fences() {
  let mut device = HostDevice::new();
  device.wait_for_frame(0);
  assert_eq!(device.fence_wait_count(), 0);

  device.submit_frame(0);
  device.submit_frame(1);
  device.wait_for_frame(0);
  device.wait_for_frame(0);
  assert_eq!(device.fence_wait_count(), 1);
  assert_eq!(device.submitted_frames(), 2);
}

// =========================================================================
// Kernels
// =========================================================================

#[test]
fn test_fill_tile_includes_border() {
  let mut device = HostDevice::new();
  let image = atlas(&mut device, 2);
  let value = Vec4::new(1.0, 2.0, 0.5, 0.0);
  device
    .dispatch(&Kernel::FillTile {
      atlas: image,
      tile: UVec3::new(1, 0, 0),
      value,
    })
    .unwrap();

  let host = device.image(image).unwrap();
  assert_eq!(host.texel(UVec3::new(18, 0, 0)), value);
  assert_eq!(host.texel(UVec3::new(35, 17, 17)), value);
  assert_eq!(host.texel(UVec3::new(17, 0, 0)), Vec4::ZERO);
  assert_eq!(device.dispatch_log(), &[KernelKind::FillTile]);
}

/// Cell at y = 32 with 2-unit texels, surface at 41: interior row 4 spans
/// 40..42 and is half covered, rows above the surface stay empty.
#[test]
fn test_ground_fog_partial_edge_texel() {
  let mut device = HostDevice::new();
  let image = atlas(&mut device, 1);
  let cells = upload(
    &mut device,
    &[FogCell {
      world_offset: [0.0, 32.0, 0.0],
      image_offset: pack_atlas_offset(UVec3::ZERO),
    }],
  );
  let constants = FogConstants {
    scattering: 0.4,
    extinction: 0.8,
    phase_g: 0.2,
    texel_world_size: 2.0,
    grid_space_height: 41.0,
    ..Default::default()
  };
  device
    .dispatch(&Kernel::GroundFog {
      atlas: image,
      cells,
      cell_count: 1,
      constants,
    })
    .unwrap();

  let host = device.image(image).unwrap();
  let at = |y: u32| host.texel(UVec3::new(3, y + 1, 7));
  assert_eq!(at(3), Vec4::ZERO);
  assert_eq!(at(4), Vec4::new(0.2, 0.4, 0.2, 0.0));
  assert_eq!(at(5), Vec4::new(0.4, 0.8, 0.2, 0.0));
  assert_eq!(at(15), Vec4::new(0.4, 0.8, 0.2, 0.0));
  // Borders are left to the neighbor pass.
  assert_eq!(host.texel(UVec3::new(0, 10, 7)), Vec4::ZERO);
}

/// +X pair: a's +X border gets b's first interior layer and b's -X border
/// gets a's last interior layer.
#[test]
fn test_neighbor_copy_positive_direction() {
  let mut device = HostDevice::new();
  let image = atlas(&mut device, 2);
  let a = UVec3::new(0, 0, 0);
  let b = UVec3::new(1, 0, 0);
  fill_interior(&mut device, image, a, Vec4::splat(1.0));
  fill_interior(&mut device, image, b, Vec4::splat(2.0));

  let pairs = upload(
    &mut device,
    &[NeighborInfo {
      first: pack_atlas_offset(a),
      second: pack_atlas_offset(b),
      direction: 1,
      padding: 0,
    }],
  );
  device
    .dispatch(&Kernel::NeighborCopy {
      atlas: image,
      pairs,
      pair_start: 0,
      pair_count: 1,
    })
    .unwrap();

  let host = device.image(image).unwrap();
  for (y, z) in [(1, 1), (5, 9), (16, 16)] {
    assert_eq!(host.texel(UVec3::new(17, y, z)), Vec4::splat(2.0));
    assert_eq!(host.texel(UVec3::new(18, y, z)), Vec4::splat(1.0));
  }
  // Edges of the face stay untouched.
  assert_eq!(host.texel(UVec3::new(17, 0, 5)), Vec4::ZERO);
  // The far borders are not written.
  assert_eq!(host.texel(UVec3::new(0, 5, 5)), Vec4::ZERO);
  assert_eq!(host.texel(UVec3::new(35, 5, 5)), Vec4::ZERO);
}

/// -Y pair: b lies below a.
#[test]
fn test_neighbor_copy_negative_direction() {
  let mut device = HostDevice::new();
  let image = atlas(&mut device, 2);
  let a = UVec3::new(0, 1, 0);
  let b = UVec3::new(0, 0, 0);
  fill_interior(&mut device, image, a, Vec4::splat(3.0));
  fill_interior(&mut device, image, b, Vec4::splat(4.0));

  let pairs = upload(
    &mut device,
    &[NeighborInfo {
      first: pack_atlas_offset(a),
      second: pack_atlas_offset(b),
      direction: 2,
      padding: 0,
    }],
  );
  device
    .dispatch(&Kernel::NeighborCopy {
      atlas: image,
      pairs,
      pair_start: 0,
      pair_count: 1,
    })
    .unwrap();

  let host = device.image(image).unwrap();
  // a's -Y border (y = 18) holds b's top interior layer.
  assert_eq!(host.texel(UVec3::new(3, 18, 7)), Vec4::splat(4.0));
  // b's +Y border (y = 17) holds a's bottom interior layer.
  assert_eq!(host.texel(UVec3::new(3, 17, 7)), Vec4::splat(3.0));
}

#[test]
fn test_mip_average_then_merge() {
  let mut device = HostDevice::new();
  let image = atlas(&mut device, 2);
  let mip_atlas = device
    .create_image(&ImageDesc {
      label: "mip",
      extent: UVec3::splat(MIP_IMAGE_RESOLUTION),
    })
    .unwrap();

  // Parent raw tile 0 holds 0.5, its mip slot is tile 2, the child tile 1 holds 8
  // in a single texel.
  let parent_raw = UVec3::new(0, 0, 0);
  let child = UVec3::new(1, 0, 0);
  let parent_mip = UVec3::new(0, 1, 0);
  fill_interior(&mut device, image, parent_raw, Vec4::splat(0.5));
  {
    let host = device.image_mut(image).unwrap();
    host.set_texel(UVec3::new(19, 1, 1), Vec4::splat(4096.0 * 8.0));
  }

  let children = upload(
    &mut device,
    &[MipChildEntry {
      child_image_offset: pack_atlas_offset(child),
      parent_texel: pack_atlas_offset(UVec3::new(3, 0, 0)),
    }],
  );
  let parents = upload(
    &mut device,
    &[MipParentEntry {
      image_atlas_offset: pack_atlas_offset(parent_raw),
      image_atlas_mip_offset: pack_atlas_offset(parent_mip),
      mip_offset: pack_atlas_offset(UVec3::ZERO),
    }],
  );

  device
    .dispatch(&Kernel::MipAveraging {
      atlas: image,
      mip_atlas,
      children,
      child_start: 0,
      child_count: 1,
      parents,
      parent_start: 0,
      parent_count: 1,
    })
    .unwrap();
  let mip = device.image(mip_atlas).unwrap();
  assert_eq!(mip.texel(UVec3::new(3, 0, 0)), Vec4::splat(8.0));
  assert_eq!(mip.texel(UVec3::new(4, 0, 0)), Vec4::ZERO);

  device
    .dispatch(&Kernel::MipMerging {
      atlas: image,
      mip_atlas,
      parents,
      parent_start: 0,
      parent_count: 1,
    })
    .unwrap();
  let host = device.image(image).unwrap();
  let merged = UVec3::new(0, 18, 0) + UVec3::ONE;
  assert_eq!(host.texel(merged + UVec3::new(3, 0, 0)), Vec4::splat(8.5));
  assert_eq!(host.texel(merged + UVec3::new(4, 0, 0)), Vec4::splat(0.5));
}

#[test]
fn test_record_range_out_of_bounds() {
  let mut device = HostDevice::new();
  let image = atlas(&mut device, 1);
  let nodes = upload(
    &mut device,
    &[DebugNode {
      value: [1.0; 4],
      image_offset: 0,
      padding: [0; 3],
    }],
  );
  let result = device.dispatch(&Kernel::DebugFilling {
    atlas: image,
    nodes,
    node_count: 2,
  });
  assert!(matches!(result, Err(GpuError::ReadOutOfBounds { .. })));
}
