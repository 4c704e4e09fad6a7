//! AdaptiveGrid - rebuilds the sparse grid every frame and records its passes.
//!
//! # Frame
//!
//! ```text
//!  wait_for_frame(slot)
//!   │
//!   ├─ Reset             clear levels, mip lists, neighbor sets
//!   ├─ Insert            global → debug filling → ground fog → particles
//!   ├─ Compact           child offsets, mip slot reservation (GridLevel::update)
//!   ├─ SizeAtlas         side = ⌈∛(node slots + mip slots)⌉
//!   ├─ AssignIndices     slot → packed tile for every node and mip slot
//!   ├─ Derive            volume records, mip entries, neighbor pairs, level data
//!   ├─ ResizeGpuBuffers  wait_idle once, recreate grown buffers / atlases
//!   ├─ Upload            every buffer into this slot's copy
//!   └─ Dispatch          frame_schedule → one Kernel per non-empty pass
//!   │
//!  submit_frame(slot)
//! ```
//!
//! The grid keeps nothing structural between frames. Only GPU resources,
//! particle simulation state and configuration survive.

use std::mem::size_of;

use web_time::Instant;

use crate::atlas::{side_length_for, ImageAtlas};
use crate::config::{GridConfig, GroundFogSettings, MediumSettings, ParticleSystemSettings};
use crate::constants::{IMAGE_RESOLUTION, MAX_PACKED_COORD, MIP_IMAGE_RESOLUTION, NODE_RESOLUTION};
use crate::error::{GpuError, GridError, GridResult};
use crate::gpu::layout::{
  DebugNode, FogCell, LevelData, MipChildEntry, MipParentEntry, NeighborInfo, NodeInfo,
  ParticleGpu, ParticleNode,
};
use crate::gpu::{BufferHandle, BufferUsage, FrameBuffer, FrameRing, GpuDevice, ImageHandle, Kernel};
use crate::grid::GridHierarchy;
use crate::metrics::FrameMetrics;
use crate::mip_mapping::MipMapping;
use crate::neighbors::NeighborCells;
use crate::passes::{frame_schedule, GridPass};
use crate::volumes::{DebugFilling, GlobalVolume, GridVolume, GroundFog, ParticleSystem, ParticleSystems};

// =============================================================================
// Frame stages and statistics
// =============================================================================

/// Steps of one frame, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FrameStage {
  Reset,
  Insert,
  Compact,
  SizeAtlas,
  AssignIndices,
  Derive,
  ResizeGpuBuffers,
  Upload,
  Dispatch,
}

/// Summary of the last finished frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameStats {
  pub frame_number: u64,
  pub frame_slot: usize,
  pub nodes_per_level: Vec<usize>,
  pub image_slots: u32,
  pub atlas_side_length: u32,
  pub mip_count: usize,
  pub mip_atlas_side_length: u32,
  pub child_entries: usize,
  pub neighbor_pairs: usize,
  pub mip_neighbor_pairs: usize,
  pub particle_count: usize,
  /// Buffers recreated this frame.
  pub resized_buffers: usize,
  /// Main or mip atlas recreated this frame.
  pub atlas_resized: bool,
  pub passes: usize,
  pub kernels: usize,
  /// Reset through Derive.
  pub rebuild_us: u64,
  /// ResizeGpuBuffers through submit.
  pub submit_us: u64,
}

// =============================================================================
// GPU buffers
// =============================================================================

/// Every per-frame buffer the grid owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GridBuffer {
  NodeInfos,
  ActiveBits,
  BitCounts,
  Childs,
  Levels,
  FogCells,
  ParticleNodes,
  ParticleIndices,
  Particles,
  DebugNodes,
  MipChildren,
  MipParents,
  Neighbors,
}

impl GridBuffer {
  pub const ALL: [GridBuffer; 13] = [
    GridBuffer::NodeInfos,
    GridBuffer::ActiveBits,
    GridBuffer::BitCounts,
    GridBuffer::Childs,
    GridBuffer::Levels,
    GridBuffer::FogCells,
    GridBuffer::ParticleNodes,
    GridBuffer::ParticleIndices,
    GridBuffer::Particles,
    GridBuffer::DebugNodes,
    GridBuffer::MipChildren,
    GridBuffer::MipParents,
    GridBuffer::Neighbors,
  ];

  pub fn label(&self) -> &'static str {
    match self {
      GridBuffer::NodeInfos => "node_infos",
      GridBuffer::ActiveBits => "active_bits",
      GridBuffer::BitCounts => "bit_counts",
      GridBuffer::Childs => "childs",
      GridBuffer::Levels => "levels",
      GridBuffer::FogCells => "fog_cells",
      GridBuffer::ParticleNodes => "particle_nodes",
      GridBuffer::ParticleIndices => "particle_indices",
      GridBuffer::Particles => "particles",
      GridBuffer::DebugNodes => "debug_nodes",
      GridBuffer::MipChildren => "mip_children",
      GridBuffer::MipParents => "mip_parents",
      GridBuffer::Neighbors => "neighbors",
    }
  }

  pub fn usage(&self) -> BufferUsage {
    match self {
      GridBuffer::Levels => BufferUsage::Uniform,
      _ => BufferUsage::Storage,
    }
  }

  /// Bytes of one record.
  pub fn record_size(&self) -> u64 {
    let size = match self {
      GridBuffer::NodeInfos => size_of::<NodeInfo>(),
      GridBuffer::ActiveBits | GridBuffer::BitCounts | GridBuffer::ParticleIndices => {
        size_of::<u32>()
      }
      GridBuffer::Childs => size_of::<i32>(),
      GridBuffer::Levels => size_of::<LevelData>(),
      GridBuffer::FogCells => size_of::<FogCell>(),
      GridBuffer::ParticleNodes => size_of::<ParticleNode>(),
      GridBuffer::Particles => size_of::<ParticleGpu>(),
      GridBuffer::DebugNodes => size_of::<DebugNode>(),
      GridBuffer::MipChildren => size_of::<MipChildEntry>(),
      GridBuffer::MipParents => size_of::<MipParentEntry>(),
      GridBuffer::Neighbors => size_of::<NeighborInfo>(),
    };
    size as u64
  }

  #[inline]
  fn index(self) -> usize {
    self as usize
  }
}

/// Largest mip atlas side whose texels still fit a packed coordinate.
const MAX_MIP_SIDE: u32 = (MAX_PACKED_COORD + 1) / MIP_IMAGE_RESOLUTION;

// =============================================================================
// AdaptiveGrid
// =============================================================================

/// Sparse multi-level volume grid for one scene.
pub struct AdaptiveGrid {
  config: GridConfig,
  grid: GridHierarchy,
  atlas: ImageAtlas,
  mip_mapping: MipMapping,
  neighbors: NeighborCells,

  global: GlobalVolume,
  debug_filling: DebugFilling,
  ground_fog: GroundFog,
  particles: ParticleSystems,

  frames: FrameRing,
  buffers: Vec<FrameBuffer>,

  // Flattened traversal arrays, level after level.
  node_infos: Vec<NodeInfo>,
  active_bits: Vec<u32>,
  bit_counts: Vec<u32>,
  childs: Vec<i32>,
  level_data: Vec<LevelData>,
  neighbor_records: Vec<NeighborInfo>,

  schedule: Vec<GridPass>,
  stage: Option<FrameStage>,
  stage_log: Vec<FrameStage>,
  stats: FrameStats,
  metrics: FrameMetrics,
  /// Set once a resource failure made the grid unusable.
  failure: Option<GpuError>,
  /// Mip atlas side limit, [`MAX_MIP_SIDE`] outside of tests.
  mip_side_limit: u32,
}

impl AdaptiveGrid {
  /// Validate `config` and build an empty grid. No device resources are
  /// created until the first [`update`](Self::update).
  pub fn new(config: GridConfig) -> GridResult<Self> {
    config.validate()?;
    let world_min = config.world_min();
    let grid = GridHierarchy::new(config.extent, &config.level_resolutions);

    log::info!(
      "Adaptive grid: extent {}, levels {:?}, {} frames in flight",
      config.extent,
      config.level_resolutions,
      config.frames_in_flight
    );

    Ok(Self {
      grid,
      atlas: ImageAtlas::new("atlas", IMAGE_RESOLUTION),
      mip_mapping: MipMapping::new(),
      neighbors: NeighborCells::new(),
      global: GlobalVolume::new(config.global),
      debug_filling: DebugFilling::new(config.debug_nodes.clone(), world_min),
      ground_fog: GroundFog::new(config.ground_fog),
      particles: ParticleSystems::new(&config.particles, world_min),
      frames: FrameRing::new(config.frames_in_flight),
      buffers: GridBuffer::ALL
        .iter()
        .map(|buffer| FrameBuffer::new(buffer.label(), buffer.usage()))
        .collect(),
      node_infos: Vec::new(),
      active_bits: Vec::new(),
      bit_counts: Vec::new(),
      childs: Vec::new(),
      level_data: Vec::new(),
      neighbor_records: Vec::new(),
      schedule: Vec::new(),
      stage: None,
      stage_log: Vec::new(),
      stats: FrameStats::default(),
      metrics: FrameMetrics::new(),
      failure: None,
      mip_side_limit: MAX_MIP_SIDE,
      config,
    })
  }

  /// Run one frame: simulate particles by `dt` seconds, rebuild the grid,
  /// upload it and record every pass on `device`.
  ///
  /// A device failure is fatal: it is returned for this frame and for every
  /// later call. A failed frame is never submitted.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "adaptive_grid::update"))]
  pub fn update<D: GpuDevice>(&mut self, device: &mut D, dt: f32) -> GridResult<&FrameStats> {
    if let Some(error) = &self.failure {
      return Err(GridError::Gpu(error.clone()));
    }

    let frame_start = Instant::now();
    let frame = self.frames.advance();
    device.wait_for_frame(frame);
    self.particles.update(dt);
    self.stage_log.clear();

    self.enter(FrameStage::Reset);
    self.reset();

    self.enter(FrameStage::Insert);
    self.insert_nodes();

    self.enter(FrameStage::Compact);
    let child_count = self.grid.update_levels();

    self.enter(FrameStage::SizeAtlas);
    let side = self.atlas.update_size(self.grid.image_slot_count());

    self.enter(FrameStage::AssignIndices);
    self.grid.update_image_indices(side);

    self.enter(FrameStage::Derive);
    self.derive(child_count)?;
    let rebuild_us = frame_start.elapsed().as_micros() as u64;

    let submit_start = Instant::now();
    self.enter(FrameStage::ResizeGpuBuffers);
    let (resized_buffers, atlas_resized) = match self.resize_gpu_buffers(device) {
      Ok(resized) => resized,
      Err(error) => return Err(self.fail(error)),
    };

    self.enter(FrameStage::Upload);
    if let Err(error) = self.upload(device, frame) {
      return Err(self.fail(error));
    }

    self.enter(FrameStage::Dispatch);
    let kernels = match self.dispatch(device, frame) {
      Ok(kernels) => kernels,
      Err(GridError::Gpu(error)) => return Err(self.fail(error)),
      Err(error) => return Err(error),
    };
    device.submit_frame(frame);

    self.stats = FrameStats {
      frame_number: self.frames.frame_number(),
      frame_slot: frame,
      nodes_per_level: self.grid.levels().iter().map(|l| l.node_count()).collect(),
      image_slots: self.grid.image_slot_count(),
      atlas_side_length: side,
      mip_count: self.mip_mapping.mip_count(),
      mip_atlas_side_length: self.mip_mapping.atlas().side_length(),
      child_entries: child_count as usize,
      neighbor_pairs: self.neighbors.regular().len(),
      mip_neighbor_pairs: self.neighbors.mip().len(),
      particle_count: self.particles.particles().len(),
      resized_buffers,
      atlas_resized,
      passes: self.schedule.len(),
      kernels,
      rebuild_us,
      submit_us: submit_start.elapsed().as_micros() as u64,
    };
    self.metrics.record_frame(&self.stats);

    log::trace!(
      "frame {} (slot {}): {} nodes, atlas {}³, {} mips, {} kernels",
      self.stats.frame_number,
      frame,
      self.grid.node_count(),
      side,
      self.stats.mip_count,
      kernels
    );
    Ok(&self.stats)
  }

  #[cfg(test)]
  fn set_mip_side_limit(&mut self, limit: u32) {
    self.mip_side_limit = limit;
  }

  fn enter(&mut self, stage: FrameStage) {
    debug_assert!(
      self.stage_log.last().map_or(stage == FrameStage::Reset, |&last| stage > last),
      "frame stage {stage:?} out of order"
    );
    self.stage = Some(stage);
    self.stage_log.push(stage);
  }

  fn fail(&mut self, error: GpuError) -> GridError {
    log::error!("Adaptive grid disabled after GPU failure: {error}");
    self.failure = Some(error.clone());
    GridError::Gpu(error)
  }

  // ===========================================================================
  // Rebuild
  // ===========================================================================

  fn reset(&mut self) {
    self.grid.reset();
    self.mip_mapping.reset(self.grid.level_count());
    self.neighbors.reset();
  }

  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "adaptive_grid::insert"))]
  fn insert_nodes(&mut self) {
    let volumes: [&mut dyn GridVolume; 4] = [
      &mut self.global,
      &mut self.debug_filling,
      &mut self.ground_fog,
      &mut self.particles,
    ];
    for volume in volumes {
      let before = self.grid.node_count();
      volume.insert_nodes(&mut self.grid);
      log::trace!(
        "{}: {} new nodes",
        volume.name(),
        self.grid.node_count() - before
      );
    }
  }

  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "adaptive_grid::derive"))]
  fn derive(&mut self, child_count: u32) -> GridResult<()> {
    let volumes: [&mut dyn GridVolume; 4] = [
      &mut self.global,
      &mut self.debug_filling,
      &mut self.ground_fog,
      &mut self.particles,
    ];
    for volume in volumes {
      volume.update_records(&self.grid);
    }

    let levels = self.grid.levels();
    for parent_level in 0..levels.len() - 1 {
      self.mip_mapping.update_mip_nodes(
        parent_level,
        &levels[parent_level],
        &levels[parent_level + 1],
      );
    }
    let mips = self.mip_mapping.mip_count();
    if side_length_for(mips as u32) > self.mip_side_limit {
      let capacity = self.mip_side_limit.pow(3) as usize;
      return Err(GridError::MipAtlasFull {
        parents: mips,
        capacity,
      });
    }
    self.mip_mapping.update_image_offsets();

    self.neighbors.update(&self.grid);
    self.neighbor_records = self.neighbors.records();

    self.flatten_levels(child_count);
    self.schedule = frame_schedule(self.mip_mapping.dispatch_levels());
    Ok(())
  }

  /// Concatenate every level's node arrays and build its [`LevelData`].
  fn flatten_levels(&mut self, child_count: u32) {
    self.node_infos.clear();
    self.active_bits.clear();
    self.bit_counts.clear();
    self.childs.clear();
    self.childs.reserve(child_count as usize);
    self.level_data.clear();

    let levels = self.grid.levels();
    let shadow_rays = self.config.shadow_rays_per_level as f32;
    for (index, level) in levels.iter().enumerate() {
      let nodes = level.nodes();
      let node_offset = self.node_infos.len();
      let child_cell_size = levels
        .get(index + 1)
        .map_or(level.cell_size() / NODE_RESOLUTION as f32, |child| {
          child.cell_size()
        });

      self.level_data.push(LevelData {
        cell_size: level.cell_size(),
        resolution: level.resolution() as i32,
        node_array_offset: (node_offset * size_of::<NodeInfo>()) as i32,
        node_size: (nodes.len() * size_of::<NodeInfo>()) as i32,
        child_array_offset: (level.child_offset() as usize * size_of::<i32>()) as i32,
        child_cell_size,
        node_offset: node_offset as i32,
        child_offset: level.child_offset() as i32,
        shadow_ray_step_size: level.cell_size() / shadow_rays,
        texel_scale: self.atlas.texel_scale(level.cell_size()),
        padding: [0.0; 2],
      });

      self.node_infos.extend_from_slice(nodes.node_infos());
      self.active_bits.extend_from_slice(nodes.active_bits());
      self.bit_counts.extend_from_slice(nodes.bit_counts());
      self.childs.extend_from_slice(level.child_indices());
    }
    debug_assert_eq!(self.childs.len(), child_count as usize);
  }

  // ===========================================================================
  // GPU resources
  // ===========================================================================

  fn buffer_bytes(&self, buffer: GridBuffer) -> &[u8] {
    match buffer {
      GridBuffer::NodeInfos => bytemuck::cast_slice(&self.node_infos),
      GridBuffer::ActiveBits => bytemuck::cast_slice(&self.active_bits),
      GridBuffer::BitCounts => bytemuck::cast_slice(&self.bit_counts),
      GridBuffer::Childs => bytemuck::cast_slice(&self.childs),
      GridBuffer::Levels => bytemuck::cast_slice(&self.level_data),
      GridBuffer::FogCells => bytemuck::cast_slice(self.ground_fog.cells()),
      GridBuffer::ParticleNodes => bytemuck::cast_slice(self.particles.nodes()),
      GridBuffer::ParticleIndices => bytemuck::cast_slice(self.particles.indices()),
      GridBuffer::Particles => bytemuck::cast_slice(self.particles.particles()),
      GridBuffer::DebugNodes => bytemuck::cast_slice(self.debug_filling.records()),
      GridBuffer::MipChildren => bytemuck::cast_slice(self.mip_mapping.child_entries()),
      GridBuffer::MipParents => bytemuck::cast_slice(self.mip_mapping.parent_entries()),
      GridBuffer::Neighbors => bytemuck::cast_slice(&self.neighbor_records),
    }
  }

  /// Bytes a buffer needs this frame, never less than one record.
  pub fn required_size(&self, buffer: GridBuffer) -> u64 {
    (self.buffer_bytes(buffer).len() as u64).max(buffer.record_size())
  }

  /// Grow buffers and atlases that no longer fit. The device is drained at
  /// most once for all buffers.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "adaptive_grid::resize"))]
  fn resize_gpu_buffers<D: GpuDevice>(&mut self, device: &mut D) -> Result<(usize, bool), GpuError> {
    let grown: Vec<(GridBuffer, u64)> = GridBuffer::ALL
      .iter()
      .map(|&buffer| (buffer, self.required_size(buffer)))
      .filter(|&(buffer, size)| self.buffers[buffer.index()].needs_resize(size))
      .collect();

    if !grown.is_empty() {
      device.wait_idle();
      let frames_in_flight = self.frames.frames_in_flight();
      for &(buffer, size) in &grown {
        self.buffers[buffer.index()].recreate(device, frames_in_flight, size)?;
      }
      log::debug!("Recreated {} grid buffers", grown.len());
    }

    let atlas_resized = self.atlas.resize_image(device)?;
    let mip_resized = self.mip_mapping.resize_atlas(device)?;
    Ok((grown.len(), atlas_resized || mip_resized))
  }

  fn upload<D: GpuDevice>(&self, device: &mut D, frame: usize) -> Result<(), GpuError> {
    for buffer in GridBuffer::ALL {
      self.buffers[buffer.index()].upload(device, frame, self.buffer_bytes(buffer))?;
    }
    Ok(())
  }

  /// Release every device resource. The next `update` recreates them.
  pub fn destroy<D: GpuDevice>(&mut self, device: &mut D) {
    device.wait_idle();
    for buffer in &mut self.buffers {
      buffer.release(device);
    }
    self.atlas.release(device);
    self.mip_mapping.release_atlas(device);
  }

  // ===========================================================================
  // Dispatch
  // ===========================================================================

  fn dispatch<D: GpuDevice>(&self, device: &mut D, frame: usize) -> GridResult<usize> {
    let mut kernels = 0;
    for &pass in &self.schedule {
      #[cfg(feature = "tracing")]
      let _span = tracing::info_span!("record_pass", pass = pass.name()).entered();
      kernels += self.record_pass(device, pass, frame)?;
    }
    Ok(kernels)
  }

  fn buffer(&self, buffer: GridBuffer, frame: usize) -> GridResult<BufferHandle> {
    let buffer = &self.buffers[buffer.index()];
    if buffer.copies() <= frame {
      return Err(GridError::MissingResource(buffer.label()));
    }
    Ok(buffer.handle(frame))
  }

  fn atlas_image(&self) -> GridResult<ImageHandle> {
    self.atlas.image().ok_or(GridError::MissingResource("atlas"))
  }

  fn mip_atlas_image(&self) -> GridResult<ImageHandle> {
    self
      .mip_mapping
      .atlas()
      .image()
      .ok_or(GridError::MissingResource("mip_atlas"))
  }

  /// Record the kernels of one pass for frame slot `frame`. Passes without
  /// work this frame record nothing. Returns the number of kernels.
  pub fn record_pass<D: GpuDevice>(
    &self,
    device: &mut D,
    pass: GridPass,
    frame: usize,
  ) -> GridResult<usize> {
    let atlas = self.atlas_image()?;
    let mut kernels = Vec::new();

    match pass {
      GridPass::Global => {
        kernels.push(Kernel::ClearImage { image: atlas });
        if let Some((tile, value)) = self.global.fill() {
          kernels.push(Kernel::FillTile { atlas, tile, value });
        }
      }
      GridPass::GroundFog => {
        let cells = self.ground_fog.cells();
        if !cells.is_empty() {
          kernels.push(Kernel::GroundFog {
            atlas,
            cells: self.buffer(GridBuffer::FogCells, frame)?,
            cell_count: cells.len() as u32,
            constants: *self.ground_fog.constants(),
          });
        }
      }
      GridPass::Particles => {
        for dispatch in self.particles.dispatches() {
          kernels.push(Kernel::Particles {
            atlas,
            nodes: self.buffer(GridBuffer::ParticleNodes, frame)?,
            node_start: dispatch.node_start,
            node_count: dispatch.node_count,
            indices: self.buffer(GridBuffer::ParticleIndices, frame)?,
            particles: self.buffer(GridBuffer::Particles, frame)?,
            constants: dispatch.constants,
          });
        }
      }
      GridPass::DebugFilling => {
        let records = self.debug_filling.records();
        if !records.is_empty() {
          kernels.push(Kernel::DebugFilling {
            atlas,
            nodes: self.buffer(GridBuffer::DebugNodes, frame)?,
            node_count: records.len() as u32,
          });
        }
      }
      GridPass::MipAveraging { level } => {
        let range = self.mip_mapping.range(level);
        if !range.is_empty() {
          kernels.push(Kernel::MipAveraging {
            atlas,
            mip_atlas: self.mip_atlas_image()?,
            children: self.buffer(GridBuffer::MipChildren, frame)?,
            child_start: range.child_start,
            child_count: range.child_count,
            parents: self.buffer(GridBuffer::MipParents, frame)?,
            parent_start: range.parent_start,
            parent_count: range.parent_count,
          });
        }
      }
      GridPass::MipMerging { level } => {
        let range = self.mip_mapping.range(level);
        if !range.is_empty() {
          kernels.push(Kernel::MipMerging {
            atlas,
            mip_atlas: self.mip_atlas_image()?,
            parents: self.buffer(GridBuffer::MipParents, frame)?,
            parent_start: range.parent_start,
            parent_count: range.parent_count,
          });
        }
      }
      GridPass::NeighborUpdate { mip } => {
        let (pair_start, pair_count) = if mip {
          (self.neighbors.mip_start(), self.neighbors.mip().len() as u32)
        } else {
          (0, self.neighbors.regular().len() as u32)
        };
        if pair_count > 0 {
          kernels.push(Kernel::NeighborCopy {
            atlas,
            pairs: self.buffer(GridBuffer::Neighbors, frame)?,
            pair_start,
            pair_count,
          });
        }
      }
      GridPass::Raymarching => {
        kernels.push(Kernel::Raymarch {
          atlas,
          levels: self.buffer(GridBuffer::Levels, frame)?,
          level_count: self.level_data.len() as u32,
          node_infos: self.buffer(GridBuffer::NodeInfos, frame)?,
          active_bits: self.buffer(GridBuffer::ActiveBits, frame)?,
          bit_counts: self.buffer(GridBuffer::BitCounts, frame)?,
          childs: self.buffer(GridBuffer::Childs, frame)?,
        });
      }
    }

    if kernels.is_empty() {
      log::trace!("{}: nothing to do", pass.name());
    }
    for kernel in &kernels {
      device.dispatch(kernel)?;
    }
    Ok(kernels.len())
  }

  // ===========================================================================
  // Scene edits
  // ===========================================================================

  pub fn set_global_medium(&mut self, medium: MediumSettings) {
    self.config.global = medium;
    self.global.set_medium(medium);
  }

  pub fn set_ground_fog(&mut self, settings: GroundFogSettings) {
    self.config.ground_fog = settings;
    self.ground_fog.set_settings(settings);
  }

  /// Add a particle system after construction. Rejected settings leave the
  /// scene unchanged.
  pub fn add_particle_system(&mut self, settings: ParticleSystemSettings) -> GridResult<()> {
    settings.validate()?;
    self.particles.push(ParticleSystem::from_settings(
      &settings,
      self.config.world_min(),
    ));
    self.config.particles.push(settings);
    Ok(())
  }

  // ===========================================================================
  // Accessors
  // ===========================================================================

  pub fn config(&self) -> &GridConfig {
    &self.config
  }

  pub fn grid(&self) -> &GridHierarchy {
    &self.grid
  }

  pub fn atlas(&self) -> &ImageAtlas {
    &self.atlas
  }

  pub fn mip_mapping(&self) -> &MipMapping {
    &self.mip_mapping
  }

  pub fn neighbors(&self) -> &NeighborCells {
    &self.neighbors
  }

  pub fn particles(&self) -> &ParticleSystems {
    &self.particles
  }

  pub fn ground_fog(&self) -> &GroundFog {
    &self.ground_fog
  }

  pub fn level_data(&self) -> &[LevelData] {
    &self.level_data
  }

  pub fn node_infos(&self) -> &[NodeInfo] {
    &self.node_infos
  }

  pub fn childs(&self) -> &[i32] {
    &self.childs
  }

  /// Passes of the last frame, in dispatch order.
  pub fn schedule(&self) -> &[GridPass] {
    &self.schedule
  }

  /// Last stage entered.
  pub fn stage(&self) -> Option<FrameStage> {
    self.stage
  }

  /// Stages of the last frame, in the order they ran.
  pub fn stage_log(&self) -> &[FrameStage] {
    &self.stage_log
  }

  pub fn stats(&self) -> &FrameStats {
    &self.stats
  }

  pub fn metrics(&self) -> &FrameMetrics {
    &self.metrics
  }

  pub fn frame_buffer(&self, buffer: GridBuffer) -> &FrameBuffer {
    &self.buffers[buffer.index()]
  }

  pub fn frames(&self) -> &FrameRing {
    &self.frames
  }

  /// Whether a GPU failure disabled the grid.
  pub fn is_failed(&self) -> bool {
    self.failure.is_some()
  }
}

#[cfg(test)]
#[path = "adaptive_grid_test.rs"]
mod adaptive_grid_test;
