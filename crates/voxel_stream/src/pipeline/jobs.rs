//! Job bodies run on worker threads.

use web_time::Instant;

use super::PipelineContext;
use crate::mesher;
use crate::region::{Region, RegionState, Volume};

/// Synthesize the Region's volume, then report it to every linked neighbor.
///
/// Any Region this completes (its own or a neighbor's last missing face) is
/// pushed to the mesh-ready queue.
pub fn generate_volume(region: &Region, context: &PipelineContext) {
  debug_assert!(!region.is_retired(), "volume job on freed region {:?}", region.id());
  let start = Instant::now();

  let volume = Volume::synthesize(
    region.origin(),
    region.voxel_size(),
    region.lod(),
    context.density.as_ref(),
  );
  region.install_volume(volume);
  let neighbors = region.finish_volume();

  for (face, neighbor) in neighbors {
    if neighbor.mark_neighbor_ready(face.opposite()) {
      context.notify_mesh_ready(neighbor.id());
    }
  }
  if region.try_enter_mesh_ready() {
    context.notify_mesh_ready(region.id());
  }

  region.record_volume_time(start.elapsed().as_micros() as u64);
}

/// Extract the mesh from the Region's volume and boundary snapshots.
pub fn generate_mesh(region: &Region, context: &PipelineContext) {
  debug_assert!(!region.is_retired(), "mesh job on freed region {:?}", region.id());
  if !region.begin_mesh() {
    log::trace!("stale mesh job for {:?}", region.id());
    return;
  }
  let start = Instant::now();

  let neighborhood = region.neighborhood(context.boundary_rule);
  let mesh = {
    let volume = region.volume();
    mesher::generate(&volume, &neighborhood, context.mesh_mode)
  };
  let next = region.store_mesh(mesh);
  region.record_mesh_time(start.elapsed().as_micros() as u64);

  if next == RegionState::GeneratingBuffers {
    context.notify_render_ready(region.id());
  }
}

#[cfg(test)]
#[path = "jobs_test.rs"]
mod jobs_test;
