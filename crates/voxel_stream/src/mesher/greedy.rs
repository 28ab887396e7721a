//! Greedy quad merging.
//!
//! Sweeps a plane along each axis `d`. For every plane position a 32×32
//! mask records, per cell, the face between the voxel behind (`x[d]`) and
//! ahead (`x[d] + 1`):
//!
//! ```text
//!  mask > 0   behind solid, ahead air  -> +d face, material  mask
//!  mask < 0   behind air, ahead solid  -> -d face, material -mask
//!  mask = 0   no face, or owned by the neighbor Region
//! ```
//!
//! Runs of equal mask values grow first along `u`, then along `v`; each
//! rectangle becomes one quad and is cleared from the mask.

use super::{emit_quad, Neighborhood, PaddedVolume};
use crate::constants::{REGION_SIZE, REGION_SIZE_SQ};
use crate::region::Volume;
use crate::types::{Material, MeshOutput};

pub fn extract(volume: &Volume, neighborhood: &Neighborhood, output: &mut MeshOutput) {
  const N: i32 = REGION_SIZE as i32;
  let padded = PaddedVolume::new(volume, neighborhood);
  let mut mask = vec![0i16; REGION_SIZE_SQ];

  for d in 0..3 {
    let u = (d + 1) % 3;
    let v = (d + 2) % 3;
    let mut x = [0i32; 3];
    let mut q = [0i32; 3];
    q[d] = 1;

    x[d] = -1;
    while x[d] < N {
      // Build the mask for the plane between x[d] and x[d] + 1.
      let mut n = 0;
      x[v] = 0;
      while x[v] < N {
        x[u] = 0;
        while x[u] < N {
          let behind = padded.get(x);
          let ahead = padded.get([x[0] + q[0], x[1] + q[1], x[2] + q[2]]);
          mask[n] = match (behind.is_solid(), ahead.is_solid()) {
            (true, false) if x[d] >= 0 => behind.id() as i16,
            (false, true) if x[d] + 1 < N => -(ahead.id() as i16),
            _ => 0,
          };
          n += 1;
          x[u] += 1;
        }
        x[v] += 1;
      }

      x[d] += 1;
      merge_plane(&mut mask, d, x[d], output);
    }
  }
}

fn merge_plane(mask: &mut [i16], d: usize, plane: i32, output: &mut MeshOutput) {
  const N: usize = REGION_SIZE;
  let mut n = 0;
  for j in 0..N {
    let mut i = 0;
    while i < N {
      let c = mask[n];
      if c == 0 {
        i += 1;
        n += 1;
        continue;
      }

      let mut w = 1;
      while i + w < N && mask[n + w] == c {
        w += 1;
      }

      let mut h = 1;
      'grow: while j + h < N {
        for k in 0..w {
          if mask[n + k + h * N] != c {
            break 'grow;
          }
        }
        h += 1;
      }

      emit_quad(
        output,
        d,
        plane,
        (i as i32, j as i32),
        (w as i32, h as i32),
        c > 0,
        Material::from_id(c.unsigned_abs() as u8),
      );

      for l in 0..h {
        mask[n + l * N..n + l * N + w].fill(0);
      }
      i += w;
      n += w;
    }
  }
}
