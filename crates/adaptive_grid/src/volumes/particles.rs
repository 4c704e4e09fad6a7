//! Particle systems - spherical media splatted into leaf tiles.
//!
//! Every leaf cell overlapped by a particle's bounding box is inserted. The
//! kernel receives, per touched node, the range of particle indices that can
//! reach it:
//!
//! ```text
//!   ParticleNode { world_offset, particle_count, particle_offset, image_offset }
//!                                      │               │
//!   indices:  [ 0 3 | 1 | 1 2 3 | ... ]◄───────────────┘
//!   particles:[ p0 p1 p2 p3 ... ]  (position, radius²)
//! ```
//!
//! Systems with an emitter spawn particles at a fixed rate, let them sink at
//! a constant speed and remove them after their lifetime.

use std::collections::BTreeMap;

use glam::{IVec3, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smallvec::SmallVec;

use super::GridVolume;
use crate::config::{EmitterSettings, MediumSettings, ParticleSystemSettings};
use crate::gpu::layout::{ParticleConstants, ParticleGpu, ParticleNode};
use crate::grid::{pack_atlas_offset, GridHierarchy};

/// Grid-space sphere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
  pub position: Vec3,
  pub radius: f32,
}

impl Particle {
  pub fn new(position: Vec3, radius: f32) -> Self {
    Self { position, radius }
  }

  fn to_gpu(self) -> ParticleGpu {
    ParticleGpu {
      position: self.position.to_array(),
      radius_sq: self.radius * self.radius,
    }
  }
}

#[derive(Clone, Copy, Debug)]
struct LiveParticle {
  particle: Particle,
  age: f32,
}

#[derive(Clone, Debug)]
struct Emitter {
  settings: EmitterSettings,
  /// Grid-space spawn center.
  center: Vec3,
  rng: StdRng,
  /// Fractional emissions carried to the next update.
  pending: f32,
}

// =============================================================================
// ParticleSystem
// =============================================================================

/// One system: static particles plus the live particles of its emitter.
#[derive(Clone, Debug)]
pub struct ParticleSystem {
  name: String,
  medium: MediumSettings,
  static_particles: Vec<Particle>,
  live: Vec<LiveParticle>,
  emitter: Option<Emitter>,
}

impl ParticleSystem {
  /// Build from settings; world positions are shifted by `world_min`.
  pub fn from_settings(settings: &ParticleSystemSettings, world_min: Vec3) -> Self {
    let static_particles = settings
      .particles
      .iter()
      .map(|p| Particle::new(Vec3::from_array(p.position) - world_min, p.radius))
      .collect();
    let emitter = settings.emitter.map(|emitter| Emitter {
      settings: emitter,
      center: Vec3::from_array(emitter.position) - world_min,
      rng: StdRng::seed_from_u64(emitter.seed),
      pending: 0.0,
    });
    Self {
      name: settings.name.clone(),
      medium: settings.medium,
      static_particles,
      live: Vec::new(),
      emitter,
    }
  }

  /// Spawn, advect and kill emitter particles.
  pub fn update(&mut self, dt: f32) {
    let Some(emitter) = &mut self.emitter else {
      return;
    };
    let settings = emitter.settings;

    emitter.pending += settings.emissions_per_second * dt;
    let requested = emitter.pending.floor().max(0.0) as usize;
    let room = settings.max_particles.saturating_sub(self.live.len());
    let spawned = requested.min(room);
    for _ in 0..spawned {
      let r = settings.spawn_radius;
      let offset = Vec3::new(
        emitter.rng.random_range(-r..=r),
        emitter.rng.random_range(-r..=r),
        emitter.rng.random_range(-r..=r),
      );
      let radius = emitter
        .rng
        .random_range(settings.min_radius..=settings.max_radius);
      self.live.push(LiveParticle {
        particle: Particle::new(emitter.center + offset, radius),
        age: 0.0,
      });
    }
    emitter.pending -= spawned as f32;
    if self.live.len() >= settings.max_particles {
      emitter.pending = 0.0;
    }

    for live in &mut self.live {
      live.age += dt;
      live.particle.position.y -= dt * settings.speed;
    }
    self.live.retain(|live| live.age <= settings.lifetime);
  }

  /// Static particles followed by live ones.
  pub fn particles(&self) -> impl Iterator<Item = Particle> + '_ {
    self
      .static_particles
      .iter()
      .copied()
      .chain(self.live.iter().map(|live| live.particle))
  }

  pub fn particle_count(&self) -> usize {
    self.static_particles.len() + self.live.len()
  }

  pub fn live_count(&self) -> usize {
    self.live.len()
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn medium(&self) -> &MediumSettings {
    &self.medium
  }
}

// =============================================================================
// ParticleSystems
// =============================================================================

/// Node range and constants of one system inside the shared record lists.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SystemDispatch {
  pub node_start: u32,
  pub node_count: u32,
  pub constants: ParticleConstants,
}

/// All particle systems of the grid and their shared GPU records.
#[derive(Clone, Debug, Default)]
pub struct ParticleSystems {
  systems: Vec<ParticleSystem>,
  /// Per system: leaf node -> indices into `particles`.
  node_particles: Vec<BTreeMap<u32, SmallVec<[u32; 8]>>>,
  particles: Vec<ParticleGpu>,
  nodes: Vec<ParticleNode>,
  indices: Vec<u32>,
  dispatches: Vec<SystemDispatch>,
}

impl ParticleSystems {
  pub fn new(settings: &[ParticleSystemSettings], world_min: Vec3) -> Self {
    Self {
      systems: settings
        .iter()
        .map(|s| ParticleSystem::from_settings(s, world_min))
        .collect(),
      ..Default::default()
    }
  }

  pub fn push(&mut self, system: ParticleSystem) {
    self.systems.push(system);
  }

  /// Advance every emitter.
  pub fn update(&mut self, dt: f32) {
    for system in &mut self.systems {
      system.update(dt);
    }
  }

  pub fn systems(&self) -> &[ParticleSystem] {
    &self.systems
  }

  pub fn particles(&self) -> &[ParticleGpu] {
    &self.particles
  }

  pub fn nodes(&self) -> &[ParticleNode] {
    &self.nodes
  }

  pub fn indices(&self) -> &[u32] {
    &self.indices
  }

  /// One entry per system with at least one touched node.
  pub fn dispatches(&self) -> &[SystemDispatch] {
    &self.dispatches
  }

  /// Leaf nodes touched by a system this frame.
  pub fn touched_nodes(&self, system: usize) -> impl Iterator<Item = u32> + '_ {
    self
      .node_particles
      .get(system)
      .into_iter()
      .flat_map(|map| map.keys().copied())
  }
}

/// Inclusive leaf cell range covered by a sphere, clamped to the grid.
/// `None` if the sphere misses the grid.
fn covered_cells(particle: &Particle, cell_size: f32, cells_per_axis: i32) -> Option<(IVec3, IVec3)> {
  let radius = Vec3::splat(particle.radius);
  let min = ((particle.position - radius) / cell_size).floor().as_ivec3();
  let max = ((particle.position + radius) / cell_size).ceil().as_ivec3() - IVec3::ONE;
  let limit = IVec3::splat(cells_per_axis - 1);
  if max.cmplt(IVec3::ZERO).any() || min.cmpgt(limit).any() {
    return None;
  }
  Some((min.max(IVec3::ZERO), max.min(limit)))
}

impl GridVolume for ParticleSystems {
  fn name(&self) -> &'static str {
    "particles"
  }

  fn insert_nodes(&mut self, grid: &mut GridHierarchy) {
    self.particles.clear();
    self.node_particles.clear();

    let leaf = grid.leaf_level();
    let cell_size = grid.level(leaf).cell_size();
    let cells_per_axis = (grid.extent() / cell_size).round() as i32;

    for system in &self.systems {
      let mut mapping: BTreeMap<u32, SmallVec<[u32; 8]>> = BTreeMap::new();
      for particle in system.particles() {
        let index = self.particles.len() as u32;
        self.particles.push(particle.to_gpu());

        let Some((min, max)) = covered_cells(&particle, cell_size, cells_per_axis) else {
          continue;
        };
        for z in min.z..=max.z {
          for y in min.y..=max.y {
            for x in min.x..=max.x {
              let center = (IVec3::new(x, y, z).as_vec3() + Vec3::splat(0.5)) * cell_size;
              let node = grid.add_node(leaf, center);
              mapping.entry(node).or_default().push(index);
            }
          }
        }
      }
      self.node_particles.push(mapping);
    }
  }

  fn update_records(&mut self, grid: &GridHierarchy) {
    self.nodes.clear();
    self.indices.clear();
    self.dispatches.clear();

    let leaf = grid.leaf_level();
    let texel_size = grid.level(leaf).texel_size();
    let leaf_nodes = grid.level(leaf).nodes();

    for (system, mapping) in self.systems.iter().zip(&self.node_particles) {
      if mapping.is_empty() {
        continue;
      }
      let node_start = self.nodes.len() as u32;
      for (&node, particles) in mapping {
        self.nodes.push(ParticleNode {
          world_offset: grid.node_origin(leaf, node).to_array(),
          particle_count: particles.len() as u32,
          particle_offset: self.indices.len() as u32,
          image_offset: pack_atlas_offset(leaf_nodes.image_info(node).tile),
          padding: [0; 2],
        });
        self.indices.extend_from_slice(particles);
      }

      let medium = system.medium();
      self.dispatches.push(SystemDispatch {
        node_start,
        node_count: self.nodes.len() as u32 - node_start,
        constants: ParticleConstants {
          scattering: medium.scattering,
          extinction: medium.extinction(),
          phase_g: medium.phase_g,
          texel_world_size: texel_size,
        },
      });
    }
  }
}

#[cfg(test)]
#[path = "particles_test.rs"]
mod particles_test;
