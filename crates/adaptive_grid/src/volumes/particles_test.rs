use super::*;
use crate::atlas::side_length_for;
use crate::config::{ParticleSettings, ParticleSystemSettings};

fn grid() -> GridHierarchy {
  GridHierarchy::new(256.0, &[1, 16, 16])
}

fn system(particles: &[([f32; 3], f32)]) -> ParticleSystemSettings {
  ParticleSystemSettings {
    name: "smoke".into(),
    medium: MediumSettings::new(1.0, 0.5, 0.0),
    particles: particles
      .iter()
      .map(|&(position, radius)| ParticleSettings { position, radius })
      .collect(),
    emitter: None,
  }
}

fn emitter(max_particles: usize) -> EmitterSettings {
  EmitterSettings {
    position: [100.0, 100.0, 100.0],
    spawn_radius: 2.0,
    max_particles,
    emissions_per_second: 10.0,
    lifetime: 1.0,
    speed: 2.0,
    min_radius: 0.5,
    max_radius: 1.0,
    seed: 3,
  }
}

// =========================================================================
// Node insertion
// =========================================================================

#[test]
fn test_covered_cells() {
  let particle = Particle::new(Vec3::new(10.5, 10.5, 10.5), 0.25);
  assert_eq!(
    covered_cells(&particle, 1.0, 256),
    Some((IVec3::splat(10), IVec3::splat(10)))
  );

  // Upper bound touching a cell face does not include that cell.
  let particle = Particle::new(Vec3::new(10.0, 10.0, 10.0), 1.0);
  assert_eq!(
    covered_cells(&particle, 1.0, 256),
    Some((IVec3::splat(9), IVec3::splat(10)))
  );

  let outside = Particle::new(Vec3::new(-5.0, 3.0, 3.0), 1.0);
  assert_eq!(covered_cells(&outside, 1.0, 256), None);

  let clipped = Particle::new(Vec3::new(0.5, 0.5, 0.5), 1.0);
  assert_eq!(
    covered_cells(&clipped, 1.0, 256),
    Some((IVec3::ZERO, IVec3::ONE))
  );
}

#[test]
fn test_inserts_overlapped_leaf_cells() {
  let mut grid = grid();
  let mut systems = ParticleSystems::new(&[system(&[([10.0, 10.0, 10.0], 1.0)])], Vec3::ZERO);
  systems.insert_nodes(&mut grid);

  assert_eq!(grid.level(2).node_count(), 8);
  assert_eq!(systems.touched_nodes(0).count(), 8);
  assert_eq!(systems.particles().len(), 1);
  assert_eq!(systems.particles()[0].radius_sq, 1.0);
}

#[test]
fn test_records_share_index_ranges() {
  let mut grid = grid();
  let settings = system(&[([10.5, 10.5, 10.5], 0.2), ([10.6, 10.4, 10.5], 0.2), ([40.5, 3.5, 3.5], 0.2)]);
  let mut systems = ParticleSystems::new(&[settings], Vec3::ZERO);
  systems.insert_nodes(&mut grid);
  grid.update_levels();
  grid.update_image_indices(side_length_for(grid.image_slot_count()));
  systems.update_records(&grid);

  let nodes = systems.nodes();
  assert_eq!(nodes.len(), 2);
  assert_eq!(nodes[0].particle_count, 2);
  assert_eq!(nodes[0].particle_offset, 0);
  assert_eq!(nodes[1].particle_count, 1);
  assert_eq!(nodes[1].particle_offset, 2);
  assert_eq!(systems.indices(), &[0, 1, 2]);
  assert_eq!(nodes[0].world_offset, [10.0, 10.0, 10.0]);

  let dispatch = systems.dispatches()[0];
  assert_eq!(dispatch.node_start, 0);
  assert_eq!(dispatch.node_count, 2);
  assert_eq!(dispatch.constants.extinction, 1.5);
  assert_eq!(dispatch.constants.texel_world_size, 1.0 / 16.0);
}

#[test]
fn test_world_min_shifts_particles() {
  let mut grid = grid();
  let mut systems = ParticleSystems::new(&[system(&[([-117.5, -117.5, -117.5], 0.2)])], Vec3::splat(-128.0));
  systems.insert_nodes(&mut grid);

  assert_eq!(systems.particles()[0].position, [10.5, 10.5, 10.5]);
  assert_eq!(grid.level(2).node_count(), 1);
}

#[test]
fn test_two_systems_get_separate_dispatches() {
  let mut grid = grid();
  let a = system(&[([10.5, 10.5, 10.5], 0.2)]);
  let b = system(&[([10.5, 10.5, 10.5], 0.2), ([50.5, 10.5, 10.5], 0.2)]);
  let mut systems = ParticleSystems::new(&[a, b], Vec3::ZERO);
  systems.insert_nodes(&mut grid);
  grid.update_levels();
  grid.update_image_indices(side_length_for(grid.image_slot_count()));
  systems.update_records(&grid);

  let dispatches = systems.dispatches();
  assert_eq!(dispatches.len(), 2);
  assert_eq!((dispatches[0].node_start, dispatches[0].node_count), (0, 1));
  assert_eq!((dispatches[1].node_start, dispatches[1].node_count), (1, 2));
  // Both systems touch the same leaf node but reference their own particles.
  assert_eq!(systems.nodes()[0].image_offset, systems.nodes()[1].image_offset);
  assert_eq!(systems.indices(), &[0, 1, 2]);
}

// =========================================================================
// Simulation
// =========================================================================

#[test]
fn test_emitter_spawns_at_rate() {
  let mut settings = system(&[]);
  settings.emitter = Some(emitter(100));
  let mut system = ParticleSystem::from_settings(&settings, Vec3::ZERO);

  system.update(0.25);
  assert_eq!(system.live_count(), 2);
  system.update(0.25);
  assert_eq!(system.live_count(), 5);

  for particle in system.particles() {
    assert!((0.5..=1.0).contains(&particle.radius));
    assert!((particle.position.x - 100.0).abs() <= 2.0);
  }
}

#[test]
fn test_emitter_respects_max_particles() {
  let mut settings = system(&[]);
  settings.emitter = Some(emitter(3));
  let mut system = ParticleSystem::from_settings(&settings, Vec3::ZERO);

  system.update(0.9);
  assert_eq!(system.live_count(), 3);
}

#[test]
fn test_particles_sink_and_expire() {
  let mut settings = system(&[([1.0, 1.0, 1.0], 0.5)]);
  settings.emitter = Some(emitter(100));
  let mut system = ParticleSystem::from_settings(&settings, Vec3::ZERO);

  system.update(0.1);
  let first: Vec<Particle> = system.particles().skip(1).collect();
  assert_eq!(first.len(), 1);
  system.update(0.1);
  let moved = system.particles().nth(1).unwrap();
  assert!((first[0].position.y - moved.position.y - 0.2).abs() < 1e-4);

  // Lifetime of 1 s: the first three spawns are gone at 1.3 s.
  for _ in 0..11 {
    system.update(0.1);
  }
  assert!(system.live_count() <= 10);
  assert!(system.live_count() > 0);
  assert!(system.particles().skip(1).all(|p| p.position.y >= 100.0 - 2.0 - 2.0 - 1e-3));
  // The static particle never moves or expires.
  assert_eq!(system.particles().next().unwrap().position, Vec3::ONE);
}

#[test]
fn test_same_seed_same_particles() {
  let mut settings = system(&[]);
  settings.emitter = Some(emitter(100));
  let mut a = ParticleSystem::from_settings(&settings, Vec3::ZERO);
  let mut b = ParticleSystem::from_settings(&settings, Vec3::ZERO);
  a.update(0.5);
  b.update(0.5);
  assert_eq!(a.particles().collect::<Vec<_>>(), b.particles().collect::<Vec<_>>());
}
