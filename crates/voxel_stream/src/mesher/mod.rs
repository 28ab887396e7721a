//! Blocky mesh extraction for one 32³ Region.
//!
//! Two interchangeable strategies produce the same visible surface:
//!
//! - [`greedy`]: merges coplanar, same-material faces into maximal rectangles
//!   (width first, then height), one quad per rectangle.
//! - [`naive`]: one quad per exposed voxel face. Reference and fallback.
//!
//! # Ownership rule
//!
//! A face between two voxels is emitted only when exactly one side is solid,
//! and only by the Region that owns the solid voxel. Voxels across a Region
//! boundary are read from a [`Neighborhood`] snapshot, never from the live
//! neighbor, so a mesh job holds no lock but its own volume's.
//!
//! # Output
//!
//! Vertex positions are region-local voxel units in `[0, 32]`; the render
//! boundary scales them by the Region's voxel size. Each quad is four
//! vertices and six indices, counter-clockwise seen from outside.

pub mod greedy;
pub mod naive;

use crate::constants::REGION_SIZE;
use crate::region::{BoundaryLayer, Volume};
use crate::types::{Face, Material, MeshOutput, Vertex};

/// Extraction strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MeshMode {
  #[default]
  Greedy,
  Naive,
}

/// How a face with no same-LOD neighbor is sampled from outside.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BoundaryRule {
  /// Treat the outside as solid: no faces toward missing neighbors.
  #[default]
  Solid,
  /// Treat the outside as air: missing neighbors are walled off.
  Empty,
}

impl BoundaryRule {
  /// Material standing in for the missing neighbor.
  pub fn fill(self) -> Material {
    match self {
      BoundaryRule::Solid => Material::Stone,
      BoundaryRule::Empty => Material::Air,
    }
  }
}

/// Voxels just outside each of the six faces of a Region.
#[derive(Clone, Debug, PartialEq)]
pub struct Neighborhood {
  layers: [BoundaryLayer; 6],
}

impl Neighborhood {
  /// Every face sampled as `material`.
  pub fn uniform(material: Material) -> Self {
    Self {
      layers: std::array::from_fn(|_| BoundaryLayer::Uniform(material)),
    }
  }

  pub fn set(&mut self, face: Face, layer: BoundaryLayer) {
    self.layers[face.index()] = layer;
  }

  pub fn layer(&self, face: Face) -> &BoundaryLayer {
    &self.layers[face.index()]
  }
}

/// Volume plus neighborhood, addressable one voxel past every face.
pub(crate) struct PaddedVolume<'a> {
  volume: &'a Volume,
  neighborhood: &'a Neighborhood,
}

impl<'a> PaddedVolume<'a> {
  pub(crate) fn new(volume: &'a Volume, neighborhood: &'a Neighborhood) -> Self {
    Self {
      volume,
      neighborhood,
    }
  }

  /// Material at `p`, where each coordinate is in `-1..=32` and at most one
  /// lies outside the Region.
  #[inline]
  pub(crate) fn get(&self, p: [i32; 3]) -> Material {
    const N: i32 = REGION_SIZE as i32;
    let outside = (0..3).find(|&axis| p[axis] < 0 || p[axis] >= N);
    match outside {
      None => self.volume.get(p[0] as usize, p[1] as usize, p[2] as usize),
      Some(axis) => {
        let face = Face::from_axis(axis, p[axis] >= N);
        let (a, b) = match axis {
          0 => (p[1], p[2]),
          1 => (p[0], p[2]),
          _ => (p[0], p[1]),
        };
        if a < 0 || a >= N || b < 0 || b >= N {
          // Edge and corner cells are never sampled by face extraction.
          return Material::Air;
        }
        self.neighborhood.layer(face).get(a as usize, b as usize)
      }
    }
  }
}

/// Extract the surface of `volume` with the given strategy.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "mesher::generate"))]
pub fn generate(volume: &Volume, neighborhood: &Neighborhood, mode: MeshMode) -> MeshOutput {
  let mut output = MeshOutput::new();
  if volume.is_empty() {
    return output;
  }
  match mode {
    MeshMode::Greedy => greedy::extract(volume, neighborhood, &mut output),
    MeshMode::Naive => naive::extract(volume, neighborhood, &mut output),
  }
  output
}

/// Append one quad on plane `x[d] = plane`, covering `[i, i+w) × [j, j+h)`
/// along the two in-plane axes `u = (d+1)%3`, `v = (d+2)%3`.
pub(crate) fn emit_quad(
  output: &mut MeshOutput,
  d: usize,
  plane: i32,
  (i, j): (i32, i32),
  (w, h): (i32, i32),
  positive: bool,
  material: Material,
) {
  let u = (d + 1) % 3;
  let v = (d + 2) % 3;
  let corner = |du: i32, dv: i32| {
    let mut p = [0.0f32; 3];
    p[d] = plane as f32;
    p[u] = (i + du) as f32;
    p[v] = (j + dv) as f32;
    p
  };

  let normal = Face::from_axis(d, positive).normal();
  let base = output.vertices.len() as u32;
  for position in [corner(0, 0), corner(w, 0), corner(w, h), corner(0, h)] {
    output.vertices.push(Vertex {
      position,
      normal,
      material,
    });
  }

  // u × v = +d, so 0-1-2 is counter-clockwise seen from +d.
  let order: [u32; 6] = if positive {
    [0, 1, 2, 0, 2, 3]
  } else {
    [0, 2, 1, 0, 3, 2]
  };
  output.indices.extend(order.iter().map(|k| base + k));
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
