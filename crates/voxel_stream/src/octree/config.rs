//! OctreeConfig - LOD distance thresholds and world coordinate mapping.

use glam::{DVec3, IVec3};

use super::{DAabb3, NodeKey};
use crate::constants::{DEFAULT_LOD_RADIUS, DEFAULT_MAX_LOD, REGION_SIZE};

/// Configuration for octree refinement and world coordinate mapping.
#[derive(Clone, Debug, PartialEq)]
pub struct OctreeConfig {
  /// World size of one LOD-0 voxel.
  pub voxel_size: f64,

  /// World position of the root's minimum corner.
  pub world_origin: DVec3,

  /// LOD of the root node.
  pub max_lod: u32,

  /// Region widths kept at each LOD around the observer.
  pub lod_radius: u32,
}

impl OctreeConfig {
  /// Root cube centered on the world origin.
  pub fn centered(voxel_size: f64, max_lod: u32, lod_radius: u32) -> Self {
    let mut config = Self {
      voxel_size,
      world_origin: DVec3::ZERO,
      max_lod,
      lod_radius,
    };
    config.world_origin = DVec3::splat(-0.5 * config.get_cell_size(max_lod));
    config
  }

  /// Region edge length at given LOD.
  /// cell_size = voxel_size * REGION_SIZE * 2^LOD
  #[inline]
  pub fn get_cell_size(&self, lod: u32) -> f64 {
    self.voxel_size * (REGION_SIZE as f64) * (1u64 << lod) as f64
  }

  /// Voxel size at given LOD: voxel_size * 2^LOD
  #[inline]
  pub fn get_voxel_size(&self, lod: u32) -> f64 {
    self.voxel_size * (1u64 << lod) as f64
  }

  /// Subdivision threshold: a node whose center is closer than this to the
  /// observer (dominant axis) is split.
  ///
  /// lod_distance = (lod_radius + 0.5) * cell_size(lod)
  #[inline]
  pub fn get_lod_distance(&self, lod: u32) -> f64 {
    (self.lod_radius as f64 + 0.5) * self.get_cell_size(lod)
  }

  #[inline]
  pub fn get_node_min(&self, key: &NodeKey) -> DVec3 {
    self.world_origin + key.coords().as_dvec3() * self.get_cell_size(key.lod)
  }

  #[inline]
  pub fn get_node_center(&self, key: &NodeKey) -> DVec3 {
    self.get_node_min(key) + DVec3::splat(self.get_cell_size(key.lod) * 0.5)
  }

  pub fn get_node_bounds(&self, key: &NodeKey) -> DAabb3 {
    let min = self.get_node_min(key);
    DAabb3::new(min, min + DVec3::splat(self.get_cell_size(key.lod)))
  }

  pub fn root_key(&self) -> NodeKey {
    NodeKey::new(0, 0, 0, self.max_lod)
  }

  pub fn root_bounds(&self) -> DAabb3 {
    self.get_node_bounds(&self.root_key())
  }

  /// Key of the node at `lod` containing `pos`, or None outside the root.
  pub fn key_at(&self, pos: DVec3, lod: u32) -> Option<NodeKey> {
    let rel = (pos - self.world_origin) / self.get_cell_size(lod);
    if !rel.is_finite() || rel.min_element() < 0.0 {
      return None;
    }
    let cells = 1i64 << (self.max_lod - lod.min(self.max_lod));
    let c = rel.floor();
    if c.max_element() >= cells as f64 {
      return None;
    }
    Some(NodeKey::new(c.x as i32, c.y as i32, c.z as i32, lod))
  }

  /// World position of the minimum corner of LOD-0 voxel `voxel`.
  pub fn voxel_min(&self, voxel: IVec3) -> DVec3 {
    voxel.as_dvec3() * self.voxel_size
  }

  /// LOD-0 voxel containing `pos`.
  pub fn voxel_at(&self, pos: DVec3) -> IVec3 {
    (pos / self.voxel_size).floor().as_ivec3()
  }
}

impl Default for OctreeConfig {
  fn default() -> Self {
    Self::centered(1.0, DEFAULT_MAX_LOD, DEFAULT_LOD_RADIUS)
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
