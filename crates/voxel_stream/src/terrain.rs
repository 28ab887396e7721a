//! Density functions: world position → material.
//!
//! The streaming core never generates terrain itself; it calls an injected
//! [`DensityFn`] once per voxel from worker threads. [`TerrainDensity`] is the
//! stock noise heightfield with caves, [`FlatDensity`] a deterministic floor
//! for tests and benchmarks.

use glam::DVec3;
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use crate::error::ParamsError;
use crate::types::Material;

/// Material at a world position. `lod` is the sampling Region's LOD, for
/// functions that want to skip detail at coarse levels.
pub trait DensityFn: Send + Sync {
  fn material(&self, world_pos: DVec3, lod: u32) -> Material;
}

impl<F> DensityFn for F
where
  F: Fn(DVec3, u32) -> Material + Send + Sync,
{
  fn material(&self, world_pos: DVec3, lod: u32) -> Material {
    self(world_pos, lod)
  }
}

// =============================================================================
// WorldParams
// =============================================================================

/// Terrain generation parameters. Changing them regenerates the world.
#[derive(Clone, Debug, PartialEq)]
pub struct WorldParams {
  pub seed: u32,
  /// Peak height of the heightfield above y = 0, in LOD-0 voxels.
  pub terrain_height: f64,
  /// Base frequency of the heightfield noise.
  pub terrain_frequency: f64,
  /// Frequency of the 3D cave noise. 0 disables caves.
  pub cave_frequency: f64,
  /// Cave noise above this value carves air.
  pub cave_threshold: f64,
  /// Heightfield fBm octaves.
  pub octaves: usize,
  /// Ignore noise: solid for y <= 0.
  pub flat_world: bool,
}

impl Default for WorldParams {
  fn default() -> Self {
    Self {
      seed: 1337,
      terrain_height: 48.0,
      terrain_frequency: 0.004,
      cave_frequency: 0.03,
      cave_threshold: 0.55,
      octaves: 5,
      flat_world: false,
    }
  }
}

impl WorldParams {
  pub fn validate(&self) -> Result<(), ParamsError> {
    finite("terrain_height", self.terrain_height)?;
    finite("terrain_frequency", self.terrain_frequency)?;
    finite("cave_frequency", self.cave_frequency)?;
    finite("cave_threshold", self.cave_threshold)?;
    within("terrain_height", self.terrain_height, 0.0, 4096.0)?;
    within("terrain_frequency", self.terrain_frequency, 0.0, 1.0)?;
    within("cave_frequency", self.cave_frequency, 0.0, 1.0)?;
    within("cave_threshold", self.cave_threshold, -1.0, 1.0)?;
    within("octaves", self.octaves as f64, 1.0, MAX_OCTAVES as f64)?;
    Ok(())
  }
}

fn finite(name: &'static str, value: f64) -> Result<(), ParamsError> {
  if value.is_finite() {
    Ok(())
  } else {
    Err(ParamsError::NotFinite { name, value })
  }
}

fn within(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ParamsError> {
  if (min..=max).contains(&value) {
    Ok(())
  } else {
    Err(ParamsError::OutOfRange {
      name,
      value,
      min,
      max,
    })
  }
}

// =============================================================================
// TerrainDensity
// =============================================================================

/// Upper bound the fBm generator accepts.
const MAX_OCTAVES: usize = 32;

/// Dirt layers between the grass cap and stone.
const DIRT_DEPTH: f64 = 4.0;

/// Caves stay this far below the surface so they do not punch the grass.
const CAVE_MIN_DEPTH: f64 = 3.0;

/// fBm heightfield with Perlin caves.
///
/// A column is solid up to its surface height. The top voxel is grass, the
/// next few dirt, the rest stone.
pub struct TerrainDensity {
  params: WorldParams,
  height: Fbm<Perlin>,
  caves: Perlin,
}

impl TerrainDensity {
  pub fn new(params: WorldParams) -> Result<Self, ParamsError> {
    params.validate()?;
    let height = Fbm::<Perlin>::new(params.seed)
      .set_octaves(params.octaves)
      .set_frequency(params.terrain_frequency);
    let caves = Perlin::new(params.seed.wrapping_add(1));
    Ok(Self {
      params,
      height,
      caves,
    })
  }

  pub fn params(&self) -> &WorldParams {
    &self.params
  }

  /// Surface height of the column at (x, z).
  pub fn surface_height(&self, x: f64, z: f64) -> f64 {
    if self.params.flat_world {
      return 0.0;
    }
    (self.height.get([x, z]) * self.params.terrain_height).floor()
  }
}

impl DensityFn for TerrainDensity {
  fn material(&self, world_pos: DVec3, _lod: u32) -> Material {
    let surface = self.surface_height(world_pos.x, world_pos.z);
    let depth = surface - world_pos.y.floor();
    if depth < 0.0 {
      return Material::Air;
    }

    if !self.params.flat_world && self.params.cave_frequency > 0.0 && depth >= CAVE_MIN_DEPTH {
      let p = world_pos * self.params.cave_frequency;
      if self.caves.get([p.x, p.y, p.z]) > self.params.cave_threshold {
        return Material::Air;
      }
    }

    if depth < 1.0 {
      Material::Grass
    } else if depth <= DIRT_DEPTH {
      Material::Dirt
    } else {
      Material::Stone
    }
  }
}

/// Solid at and below `height`, grass on top.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlatDensity {
  pub height: f64,
}

impl FlatDensity {
  pub fn new(height: f64) -> Self {
    Self { height }
  }
}

impl DensityFn for FlatDensity {
  fn material(&self, world_pos: DVec3, _lod: u32) -> Material {
    let depth = self.height.floor() - world_pos.y.floor();
    if depth < 0.0 {
      Material::Air
    } else if depth < 1.0 {
      Material::Grass
    } else if depth <= DIRT_DEPTH {
      Material::Dirt
    } else {
      Material::Stone
    }
  }
}

#[cfg(test)]
#[path = "terrain_test.rs"]
mod terrain_test;
