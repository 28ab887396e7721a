use super::*;

fn small() -> OctreeConfig {
  OctreeConfig::centered(1.0, 3, 1)
}

/// At LOD 0 with voxel_size=1.0, cell_size = 32.
#[test]
fn test_cell_size_doubles_per_lod() {
  let config = small();
  assert_eq!(config.get_cell_size(0), 32.0);
  assert_eq!(config.get_cell_size(1), 64.0);
  assert_eq!(config.get_cell_size(3), 256.0);
}

#[test]
fn test_voxel_size_at_lod() {
  let config = small();
  assert_eq!(config.get_voxel_size(0), 1.0);
  assert_eq!(config.get_voxel_size(1), 2.0);
  assert_eq!(config.get_voxel_size(3), 8.0);
}

/// The root cube is centered on the world origin.
#[test]
fn test_centered_root() {
  let config = small();
  assert_eq!(config.world_origin, DVec3::splat(-128.0));
  let root = config.root_bounds();
  assert_eq!(root.min, DVec3::splat(-128.0));
  assert_eq!(root.max, DVec3::splat(128.0));
  assert_eq!(root.center(), DVec3::ZERO);
}

/// LOD-0 region borders fall on multiples of the region size.
#[test]
fn test_lod0_regions_are_grid_aligned() {
  let config = small();
  let key = config.key_at(DVec3::new(0.5, -0.5, 31.9), 0).unwrap();
  let min = config.get_node_min(&key);
  assert_eq!(min, DVec3::new(0.0, -32.0, 0.0));
}

/// lod_distance = (R + 0.5) * cell_size
#[test]
fn test_lod_distance() {
  let config = OctreeConfig::centered(1.0, 8, 2);
  assert_eq!(config.get_lod_distance(0), 2.5 * 32.0);
  assert_eq!(config.get_lod_distance(3), 2.5 * 256.0);
}

#[test]
fn test_node_center() {
  let config = small();
  let key = NodeKey::new(0, 0, 0, 0);
  assert_eq!(
    config.get_node_center(&key),
    config.world_origin + DVec3::splat(16.0)
  );
}

#[test]
fn test_key_at_outside_root_is_none() {
  let config = small();
  assert!(config.key_at(DVec3::new(128.0, 0.0, 0.0), 0).is_none());
  assert!(config.key_at(DVec3::new(-128.5, 0.0, 0.0), 0).is_none());
  assert!(config.key_at(DVec3::NAN, 0).is_none());
  assert_eq!(config.key_at(DVec3::ZERO, 3), Some(config.root_key()));
}

#[test]
fn test_voxel_mapping() {
  let config = OctreeConfig::centered(0.5, 3, 1);
  assert_eq!(config.voxel_at(DVec3::new(0.25, -0.25, 1.0)), IVec3::new(0, -1, 2));
  assert_eq!(config.voxel_min(IVec3::new(0, -1, 2)), DVec3::new(0.0, -0.5, 1.0));
}
