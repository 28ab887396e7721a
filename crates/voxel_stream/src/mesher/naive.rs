//! One quad per exposed voxel face.

use super::{emit_quad, Neighborhood, PaddedVolume};
use crate::constants::REGION_SIZE;
use crate::region::Volume;
use crate::types::{Face, MeshOutput};

pub fn extract(volume: &Volume, neighborhood: &Neighborhood, output: &mut MeshOutput) {
  let padded = PaddedVolume::new(volume, neighborhood);

  for x in 0..REGION_SIZE {
    for y in 0..REGION_SIZE {
      for z in 0..REGION_SIZE {
        let material = volume.get(x, y, z);
        if !material.is_solid() {
          continue;
        }
        let p = [x as i32, y as i32, z as i32];
        for face in Face::ALL {
          let o = face.offset();
          if padded.get([p[0] + o.x, p[1] + o.y, p[2] + o.z]).is_solid() {
            continue;
          }
          let d = face.axis();
          let plane = p[d] + face.is_positive() as i32;
          emit_quad(
            output,
            d,
            plane,
            (p[(d + 1) % 3], p[(d + 2) % 3]),
            (1, 1),
            face.is_positive(),
            material,
          );
        }
      }
    }
  }
}
