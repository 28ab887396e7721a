use std::collections::HashSet;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;

use glam::{DVec3, IVec3};

use super::*;
use crate::region::Plane;
use crate::terrain::FlatDensity;

fn flat_world(workers: usize, max_lod: u32) -> VoxelWorld {
  let config = StreamConfig {
    lod_radius: 1,
    max_lod,
    worker_count: Some(workers),
    ..Default::default()
  };
  VoxelWorld::with_density(config, Arc::new(FlatDensity::new(0.0))).expect("valid config")
}

fn converged(workers: usize, max_lod: u32, observer: DVec3) -> (VoxelWorld, HeadlessSink) {
  let mut world = flat_world(workers, max_lod);
  let mut sink = HeadlessSink::default();
  assert!(world
    .run_until_idle(observer, &mut sink, 64)
    .expect("finite observer"));
  (world, sink)
}

/// Frustum containing all of space.
fn everything() -> Frustum {
  let far = 1.0e12;
  Frustum::new([
    Plane::new(DVec3::X, far),
    Plane::new(DVec3::NEG_X, far),
    Plane::new(DVec3::Y, far),
    Plane::new(DVec3::NEG_Y, far),
    Plane::new(DVec3::Z, far),
    Plane::new(DVec3::NEG_Z, far),
  ])
}

#[test]
fn world_id_is_unique() {
  let id1 = WorldId::new();
  let id2 = WorldId::new();
  assert_ne!(id1, id2);
  assert!(id2.raw() > id1.raw());
}

// =========================================================================
// Configuration
// =========================================================================

#[test]
fn test_invalid_config_rejected() {
  let nan = StreamConfig {
    voxel_size: f64::NAN,
    ..Default::default()
  };
  assert!(matches!(
    VoxelWorld::with_density(nan, Arc::new(FlatDensity::new(0.0))),
    Err(ParamsError::NotFinite { name: "voxel_size", .. })
  ));

  let zero_radius = StreamConfig {
    lod_radius: 0,
    worker_count: Some(0),
    ..Default::default()
  };
  assert!(matches!(
    VoxelWorld::with_density(zero_radius, Arc::new(FlatDensity::new(0.0))),
    Err(ParamsError::OutOfRange { name: "lod_radius", .. })
  ));
}

#[test]
fn test_rejects_non_finite_observer() {
  let mut world = flat_world(0, 3);
  let result = world.tick(DVec3::new(0.0, f64::NAN, 0.0), &mut NullSink);

  assert!(matches!(result, Err(ParamsError::InvalidObserver(_))));
  assert_eq!(world.octree().region_count(), 0);
}

// =========================================================================
// Streaming
// =========================================================================

/// With manual draining, one tick takes every new Region through the whole
/// pipeline, and the next tick is quiet.
#[test]
fn test_manual_drain_converges_in_two_ticks() {
  let mut world = flat_world(0, 3);
  let mut sink = HeadlessSink::default();

  let first = world.tick(DVec3::ZERO, &mut sink).expect("tick");
  assert!(first.created > 0);
  assert!(first.uploads > 0);

  let second = world.tick(DVec3::ZERO, &mut sink).expect("tick");
  assert!(second.is_quiet(), "{:?}", second);
  assert!(world.is_settled());
}

/// Observer at the origin over a flat floor: (2N+1) LOD-0 widths around it,
/// coarser Regions further out, no overlap.
#[test]
fn test_converged_world_covers_observer() {
  let (world, _sink) = converged(0, 3, DVec3::ZERO);
  let tree = world.octree();
  assert!(tree.validate().is_empty(), "{:?}", tree.validate());

  for i in -1..=1 {
    for j in -1..=1 {
      let p = DVec3::new(i as f64 * 32.0 + 16.0, 16.0, j as f64 * 32.0 + 16.0);
      let region = tree.region_at(p).expect("covered");
      assert_eq!(region.lod(), 0, "at {}", p);
      assert!(tree.is_resident(region.id()));
    }
  }

  let stats = world.stats();
  assert!(stats.resident_per_lod[0] >= 27);
  assert!(stats.resident_per_lod[1..].iter().sum::<usize>() > 0);
  assert_eq!(
    stats.resident_per_lod.iter().sum::<usize>(),
    tree.resident().count()
  );
}

#[test]
fn test_render_list_matches_sink() {
  let (world, sink) = converged(0, 3, DVec3::ZERO);
  let items = world.render_list(&everything());

  assert!(!items.is_empty());
  for item in &items {
    assert_eq!(sink.buffers.get(&item.id), Some(&(item.vertex_count, item.index_count)));
    assert!(item.index_count > 0);
  }
  let stats = world.stats();
  assert_eq!(
    stats.vertex_count,
    items.iter().map(|item| item.vertex_count).sum::<usize>()
  );
}

#[test]
fn test_render_list_culls_outside_frustum() {
  let (world, _sink) = converged(0, 3, DVec3::ZERO);
  let mut planes = everything().planes;
  // Only x >= 1e9 is inside.
  planes[0] = Plane::new(DVec3::X, -1.0e9);

  assert!(world.render_list(&Frustum::new(planes)).is_empty());
}

/// Leaving the area releases every fine Region's buffers.
#[test]
fn test_freed_regions_release_buffers() {
  let (mut world, mut sink) = converged(0, 3, DVec3::ZERO);
  assert!(sink.buffers.len() > 1);

  assert!(world
    .run_until_idle(DVec3::splat(1.0e6), &mut sink, 64)
    .expect("tick"));

  assert_eq!(world.octree().region_count(), 1);
  assert_eq!(sink.buffers.len(), 1);
  for id in sink.buffers.keys() {
    assert!(world.octree().get(*id).is_some());
  }
  assert!(sink.releases > 0);
}

// =========================================================================
// Collision and queries
// =========================================================================

/// Box dropped at (0, 5, 0) comes to rest on the floor's top surface.
#[test]
fn test_falling_box_comes_to_rest() {
  let (world, _sink) = converged(0, 3, DVec3::new(0.0, 5.0, 0.0));
  let mut collider = BoxCollider::new(DVec3::new(0.0, 5.0, 0.0), DVec3::ONE);

  for _ in 0..240 {
    world
      .move_box(&mut collider, 1.0 / 60.0)
      .expect("resolved ground");
  }

  assert_eq!(collider.velocity.y, 0.0);
  assert!((collider.center.y - 1.5).abs() < 1.0);
  assert!(collider.is_grounded());
}

/// Collision outside resolved LOD-0 space fails and moves nothing.
#[test]
fn test_move_box_needs_resolved_lod0() {
  let mut world = flat_world(0, 3);
  let mut collider = BoxCollider::new(DVec3::new(0.0, 5.0, 0.0), DVec3::ONE);
  let before = collider;
  assert!(matches!(
    world.move_box(&mut collider, 0.1),
    Err(QueryError::OutOfRange(_))
  ));
  assert_eq!(collider, before);

  world.tick(DVec3::ZERO, &mut NullSink).expect("tick");
  let mut far = BoxCollider::new(DVec3::new(100.0, 5.0, 0.0), DVec3::ONE);
  let before = far;
  assert!(matches!(
    world.move_box(&mut far, 0.1),
    Err(QueryError::CoarseLod { .. })
  ));
  assert_eq!(far, before);
}

#[test]
fn test_raycast_hits_floor() {
  let (world, _sink) = converged(0, 3, DVec3::ZERO);
  let hit = world
    .raycast(DVec3::new(3.5, 20.5, -7.5), DVec3::NEG_Y, 64.0)
    .expect("hit");

  assert_eq!(hit.voxel, IVec3::new(3, 0, -8));
  assert_eq!(hit.material, Material::Grass);
  assert_eq!(hit.normal, IVec3::Y);
  assert!((hit.distance - 19.5).abs() < 1e-9);

  // Into coarse space: no answer.
  assert!(world
    .raycast(DVec3::new(0.5, 5.5, 0.5), DVec3::X, 200.0)
    .is_none());
}

/// Deleting a voxel at a Region corner remeshes the Region and the three
/// neighbors sharing that corner's faces.
#[test]
fn test_delete_voxel_remeshes_region_and_neighbors() {
  let (mut world, mut sink) = converged(0, 3, DVec3::ZERO);
  let pos = DVec3::new(0.5, 0.5, 0.5);
  assert_eq!(world.voxel_at(pos), Ok(Material::Grass));

  assert_eq!(world.delete_voxel(pos), Ok(Material::Grass));
  assert_eq!(world.voxel_at(pos), Ok(Material::Air));
  assert_eq!(world.delete_voxel(pos), Ok(Material::Air));

  let summary = world.tick(DVec3::ZERO, &mut sink).expect("tick");
  assert!(summary.meshes_queued >= 4, "{:?}", summary);
  assert!(summary.uploads >= 1);

  let hit = world
    .raycast(DVec3::new(0.5, 10.5, 0.5), DVec3::NEG_Y, 64.0)
    .expect("hit");
  assert_eq!(hit.voxel, IVec3::new(0, -1, 0));
  assert_eq!(hit.material, Material::Dirt);
  assert!((hit.distance - 10.5).abs() < 1e-9);
}

#[test]
fn test_delete_voxel_outside_lod0_fails() {
  let (mut world, _sink) = converged(0, 3, DVec3::ZERO);
  assert!(matches!(
    world.delete_voxel(DVec3::new(100.5, 0.5, 0.5)),
    Err(QueryError::CoarseLod { .. })
  ));
}

// =========================================================================
// Parameter hot-swap
// =========================================================================

#[test]
fn test_set_params_resets_tree() {
  let config = StreamConfig {
    lod_radius: 1,
    max_lod: 3,
    worker_count: Some(0),
    ..Default::default()
  };
  let params = WorldParams {
    flat_world: true,
    ..Default::default()
  };
  let mut world = VoxelWorld::new(config, params.clone()).expect("valid");
  let mut sink = HeadlessSink::default();
  assert!(world.run_until_idle(DVec3::ZERO, &mut sink, 64).expect("tick"));
  let old: HashSet<RegionId> = sink.buffers.keys().copied().collect();
  assert!(!old.is_empty());

  let rejected = WorldParams {
    terrain_height: f64::NAN,
    ..params.clone()
  };
  assert!(world.set_params(rejected).is_err());
  assert!(world.octree().region_count() > 0);

  let reseeded = WorldParams {
    seed: 7,
    ..params
  };
  world.set_params(reseeded.clone()).expect("valid params");
  assert_eq!(world.params(), &reseeded);
  assert_eq!(world.octree().region_count(), 0);
  assert_eq!(world.octree().node_count(), 1);

  assert!(world.run_until_idle(DVec3::ZERO, &mut sink, 64).expect("tick"));
  assert!(sink.buffers.keys().all(|id| !old.contains(id)));
  assert!(!sink.buffers.is_empty());
  assert!(world.octree().validate().is_empty());
}

// =========================================================================
// Concurrency
// =========================================================================

/// Real workers, slow jobs, a moving observer and a reset mid-run: no job
/// ever touches a freed Region and the world still settles.
#[test]
fn test_threaded_churn_settles_without_panics() {
  let calls = Arc::new(AtomicUsize::new(0));
  let slow = {
    let calls = Arc::clone(&calls);
    move |p: DVec3, lod: u32| {
      if calls.fetch_add(1, Ordering::Relaxed) % 4096 == 0 {
        std::thread::sleep(Duration::from_micros(200));
      }
      FlatDensity::new(0.0).material(p, lod)
    }
  };
  let config = StreamConfig {
    lod_radius: 1,
    max_lod: 4,
    worker_count: Some(4),
    ..Default::default()
  };
  let mut world = VoxelWorld::with_density(config, Arc::new(slow)).expect("valid");
  let mut sink = HeadlessSink::default();

  let path = [
    DVec3::ZERO,
    DVec3::new(150.0, 0.0, 0.0),
    DVec3::new(-200.0, 40.0, 90.0),
    DVec3::splat(1.0e6),
    DVec3::new(30.0, -30.0, 300.0),
  ];
  for (step, &observer) in path.iter().enumerate() {
    for _ in 0..3 {
      world.tick(observer, &mut sink).expect("tick");
      assert!(world.octree().validate().is_empty());
    }
    if step == 2 {
      world.set_density(Arc::new(FlatDensity::new(4.0)));
    }
  }

  assert!(world
    .run_until_idle(DVec3::ZERO, &mut sink, 256)
    .expect("tick"));
  assert_eq!(world.scheduler().panicked_count(), 0);
  assert!(world.octree().validate().is_empty());
  assert!(calls.load(Ordering::Relaxed) > 0);
  for id in sink.buffers.keys() {
    assert!(world.octree().get(*id).is_some());
  }
}
