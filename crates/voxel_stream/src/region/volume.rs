//! 32³ material volume with a compact form for homogeneous Regions.
//!
//! Most streamed Regions are entirely air (sky) or entirely solid (deep
//! ground). Those collapse to [`Volume::Uniform`] after synthesis, which keeps
//! a full tree resident without paying 32 KiB per Region.

use glam::DVec3;
use rayon::prelude::*;

use crate::constants::{coord_to_index, layer_index, REGION_SIZE, REGION_SIZE_CB, REGION_SIZE_SQ};
use crate::terrain::DensityFn;
use crate::types::{Face, Material};

/// Material grid of one Region.
#[derive(Clone, Debug, PartialEq)]
pub enum Volume {
  /// Every voxel holds the same material.
  Uniform(Material),
  /// Row-major grid, `coord_to_index` layout.
  Dense(Box<[Material]>),
}

impl Default for Volume {
  fn default() -> Self {
    Volume::Uniform(Material::Air)
  }
}

impl Volume {
  /// Evaluate `density` at the world position of every voxel.
  ///
  /// Voxel `(x, y, z)` samples `origin + (x, y, z) * voxel_size`. X-slabs are
  /// filled in parallel.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "volume::synthesize"))]
  pub fn synthesize(origin: DVec3, voxel_size: f64, lod: u32, density: &dyn DensityFn) -> Self {
    let mut voxels = vec![Material::Air; REGION_SIZE_CB].into_boxed_slice();
    voxels
      .par_chunks_mut(REGION_SIZE_SQ)
      .enumerate()
      .for_each(|(x, slab)| {
        for y in 0..REGION_SIZE {
          for z in 0..REGION_SIZE {
            let pos = origin + DVec3::new(x as f64, y as f64, z as f64) * voxel_size;
            slab[layer_index(y, z)] = density.material(pos, lod);
          }
        }
      });
    Self::from_dense(voxels)
  }

  /// Wrap a dense grid, collapsing it if homogeneous.
  pub fn from_dense(voxels: Box<[Material]>) -> Self {
    debug_assert_eq!(voxels.len(), REGION_SIZE_CB);
    match voxels.first() {
      Some(&first) if voxels.iter().all(|&m| m == first) => Volume::Uniform(first),
      _ => Volume::Dense(voxels),
    }
  }

  #[inline]
  pub fn get(&self, x: usize, y: usize, z: usize) -> Material {
    match self {
      Volume::Uniform(material) => *material,
      Volume::Dense(voxels) => voxels[coord_to_index(x, y, z)],
    }
  }

  /// Write one voxel, returning the previous material.
  pub fn set(&mut self, x: usize, y: usize, z: usize, material: Material) -> Material {
    if let Volume::Uniform(current) = *self {
      if current == material {
        return current;
      }
      *self = Volume::Dense(vec![current; REGION_SIZE_CB].into_boxed_slice());
    }
    match self {
      Volume::Dense(voxels) => std::mem::replace(&mut voxels[coord_to_index(x, y, z)], material),
      Volume::Uniform(_) => unreachable!("densified above"),
    }
  }

  /// True when no voxel is solid.
  pub fn is_empty(&self) -> bool {
    match self {
      Volume::Uniform(material) => !material.is_solid(),
      Volume::Dense(voxels) => !voxels.iter().any(|m| m.is_solid()),
    }
  }

  /// Number of solid voxels.
  pub fn solid_count(&self) -> usize {
    match self {
      Volume::Uniform(material) if material.is_solid() => REGION_SIZE_CB,
      Volume::Uniform(_) => 0,
      Volume::Dense(voxels) => voxels.iter().filter(|m| m.is_solid()).count(),
    }
  }

  /// Copy of the 32² voxel slice touching `face`.
  pub fn boundary_layer(&self, face: Face) -> BoundaryLayer {
    let voxels = match self {
      Volume::Uniform(material) => return BoundaryLayer::Uniform(*material),
      Volume::Dense(voxels) => voxels,
    };
    let fixed = if face.is_positive() { REGION_SIZE - 1 } else { 0 };
    let mut layer = vec![Material::Air; REGION_SIZE_SQ].into_boxed_slice();
    for a in 0..REGION_SIZE {
      for b in 0..REGION_SIZE {
        let index = match face.axis() {
          0 => coord_to_index(fixed, a, b),
          1 => coord_to_index(a, fixed, b),
          _ => coord_to_index(a, b, fixed),
        };
        layer[layer_index(a, b)] = voxels[index];
      }
    }
    BoundaryLayer::Layer(layer)
  }
}

/// Snapshot of one face-adjacent voxel slice.
///
/// Indexed by the two axes other than the face axis, in ascending axis order
/// (see [`crate::constants`]).
#[derive(Clone, Debug, PartialEq)]
pub enum BoundaryLayer {
  Uniform(Material),
  Layer(Box<[Material]>),
}

impl BoundaryLayer {
  #[inline]
  pub fn get(&self, a: usize, b: usize) -> Material {
    match self {
      BoundaryLayer::Uniform(material) => *material,
      BoundaryLayer::Layer(layer) => layer[layer_index(a, b)],
    }
  }
}

#[cfg(test)]
#[path = "volume_test.rs"]
mod volume_test;
