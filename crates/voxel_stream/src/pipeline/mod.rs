//! Region pipeline: job bodies and the queues that hand Regions between
//! workers and the main thread.
//!
//! ```text
//!  main thread                 workers                       main thread
//! ┌──────────────┐  volume   ┌──────────────────┐
//! │ octree update├──────────►│ generate_volume  │
//! └──────────────┘   job     └────────┬─────────┘
//!                                     │ neighbors notified, mask full
//!                            mesh_ready queue
//!                                     ▼
//! ┌──────────────┐   mesh    ┌──────────────────┐  render_ready  ┌─────────────┐
//! │ drain queue  ├──────────►│ generate_mesh    ├───────────────►│ BufferSink  │
//! └──────────────┘   job     └──────────────────┘     queue      └─────────────┘
//! ```
//!
//! Everything a job needs travels in [`PipelineContext`]: the density
//! function, mesh options and the sending halves of both queues. Jobs touch
//! no other shared state than their Region and its neighbors.

pub mod jobs;

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::mesher::{BoundaryRule, MeshMode};
use crate::region::{Region, RegionId};
use crate::scheduler::{JobPriority, Scheduler};
use crate::terrain::DensityFn;

/// Shared, immutable inputs for every job of one world generation.
///
/// Replaced wholesale when world parameters change.
pub struct PipelineContext {
  pub density: Arc<dyn DensityFn>,
  pub mesh_mode: MeshMode,
  pub boundary_rule: BoundaryRule,
  mesh_ready: Sender<RegionId>,
  render_ready: Sender<RegionId>,
}

/// Receiving halves of the hand-off queues, drained by the main thread.
pub struct HandOff {
  pub mesh_ready: Receiver<RegionId>,
  pub render_ready: Receiver<RegionId>,
}

impl HandOff {
  /// Discard queued ids. Used after a reset, when every id is stale.
  pub fn clear(&self) -> usize {
    self.mesh_ready.try_iter().count() + self.render_ready.try_iter().count()
  }
}

impl PipelineContext {
  pub fn new(
    density: Arc<dyn DensityFn>,
    mesh_mode: MeshMode,
    boundary_rule: BoundaryRule,
  ) -> (Arc<Self>, HandOff) {
    let (mesh_tx, mesh_rx) = unbounded();
    let (render_tx, render_rx) = unbounded();
    let context = Arc::new(Self {
      density,
      mesh_mode,
      boundary_rule,
      mesh_ready: mesh_tx,
      render_ready: render_tx,
    });
    (
      context,
      HandOff {
        mesh_ready: mesh_rx,
        render_ready: render_rx,
      },
    )
  }

  /// Same queues, different generation inputs.
  pub fn with_density(&self, density: Arc<dyn DensityFn>) -> Arc<Self> {
    Arc::new(Self {
      density,
      mesh_mode: self.mesh_mode,
      boundary_rule: self.boundary_rule,
      mesh_ready: self.mesh_ready.clone(),
      render_ready: self.render_ready.clone(),
    })
  }

  pub(crate) fn notify_mesh_ready(&self, id: RegionId) {
    // The receiver only disappears with the world itself.
    let _ = self.mesh_ready.send(id);
  }

  pub(crate) fn notify_render_ready(&self, id: RegionId) {
    let _ = self.render_ready.send(id);
  }
}

/// Full-resolution Regions around the observer go first.
pub fn priority_for_lod(lod: u32) -> JobPriority {
  if lod == 0 {
    JobPriority::High
  } else {
    JobPriority::Medium
  }
}

/// Queue volume synthesis. The Region must be `BrandNew`.
pub fn submit_volume(scheduler: &Scheduler, region: Arc<Region>, context: &Arc<PipelineContext>) {
  let started = region.begin_volume();
  debug_assert!(started, "volume job for {:?}", region);
  let context = Arc::clone(context);
  scheduler.submit(priority_for_lod(region.lod()), move || {
    jobs::generate_volume(&region, &context)
  });
}

/// Queue mesh extraction. The Region must be `WaitingForMeshGeneration`.
pub fn submit_mesh(scheduler: &Scheduler, region: Arc<Region>, context: &Arc<PipelineContext>) {
  let context = Arc::clone(context);
  scheduler.submit(priority_for_lod(region.lod()), move || {
    jobs::generate_mesh(&region, &context)
  });
}
