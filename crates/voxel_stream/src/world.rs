//! VoxelWorld: the per-tick driver tying tree, scheduler and pipeline
//! together.
//!
//! Everything here runs on the main thread. One [`VoxelWorld::tick`]:
//!
//! ```text
//! observer ─► octree.update ─► queue volume jobs for new Regions
//!                            ─► release freed Regions from the sink
//!          ─► resubmit Regions flagged for remesh
//!          ─► (manual drain) run queued jobs on this thread
//!          ─► mesh_ready queue ─► queue mesh jobs
//!          ─► render_ready queue ─► BufferSink::upload ─► Done
//! ```
//!
//! Worker threads only ever see a Region through a job closure; ids cross
//! back through the hand-off queues and are resolved against the pool, so a
//! freed Region's id simply fails to resolve.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::{DAffine3, DVec3};
use rayon::prelude::*;
use web_time::Instant;

use crate::collision::{self, BoxCollider, CollisionSettings, Contact, RayHit};
use crate::constants::{
  DEFAULT_LOD_RADIUS, DEFAULT_MAX_LOD, DEFAULT_REGION_CAPACITY, REGION_SIZE,
};
use crate::error::{ParamsError, QueryError};
use crate::mesher::{BoundaryRule, MeshMode};
use crate::metrics::WorldMetrics;
use crate::octree::{Octree, OctreeConfig, TreeStats};
use crate::pipeline::{submit_mesh, submit_volume, HandOff, PipelineContext};
use crate::region::{Frustum, Region, RegionId, RegionState};
use crate::scheduler::Scheduler;
use crate::terrain::{DensityFn, TerrainDensity, WorldParams};
use crate::types::{Face, Material, MeshOutput};

// =============================================================================
// WorldId - unique identifier
// =============================================================================

static WORLD_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque world identifier, unique within the process.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct WorldId(u64);

impl WorldId {
  pub fn new() -> Self {
    Self(WORLD_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
  }

  pub fn raw(&self) -> u64 {
    self.0
  }
}

impl Default for WorldId {
  fn default() -> Self {
    Self::new()
  }
}

// =============================================================================
// Configuration
// =============================================================================

/// Streaming parameters fixed for the lifetime of a world.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamConfig {
  /// Regions kept at each LOD around the observer, per side.
  pub lod_radius: u32,
  /// LOD of the root node.
  pub max_lod: u32,
  /// World size of one LOD-0 voxel.
  pub voxel_size: f64,
  /// `None`: one worker per hardware thread. `Some(0)`: jobs run inside
  /// [`VoxelWorld::tick`] on the calling thread.
  pub worker_count: Option<usize>,
  pub mesh_mode: MeshMode,
  pub boundary_rule: BoundaryRule,
  /// Upper bound on live Regions. Exceeding it panics.
  pub region_capacity: usize,
}

impl Default for StreamConfig {
  fn default() -> Self {
    Self {
      lod_radius: DEFAULT_LOD_RADIUS,
      max_lod: DEFAULT_MAX_LOD,
      voxel_size: 1.0,
      worker_count: None,
      mesh_mode: MeshMode::Greedy,
      boundary_rule: BoundaryRule::Solid,
      region_capacity: DEFAULT_REGION_CAPACITY,
    }
  }
}

impl StreamConfig {
  pub fn validate(&self) -> Result<(), ParamsError> {
    if !self.voxel_size.is_finite() {
      return Err(ParamsError::NotFinite {
        name: "voxel_size",
        value: self.voxel_size,
      });
    }
    check_range("voxel_size", self.voxel_size, 1.0e-6, 1.0e6)?;
    check_range("lod_radius", self.lod_radius as f64, 1.0, 64.0)?;
    check_range("max_lod", self.max_lod as f64, 0.0, 20.0)?;
    check_range("region_capacity", self.region_capacity as f64, 1.0, u32::MAX as f64)?;
    Ok(())
  }

  pub fn octree_config(&self) -> OctreeConfig {
    OctreeConfig::centered(self.voxel_size, self.max_lod, self.lod_radius)
  }
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ParamsError> {
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
// Render boundary
// =============================================================================

/// Receives finished meshes on the main thread.
///
/// The sink owns every GPU-side object; the world only tells it when a
/// Region's buffers appear, change or go away.
pub trait BufferSink {
  /// Create or replace the buffers of Region `id`.
  fn upload(&mut self, id: RegionId, transform: DAffine3, mesh: &MeshOutput);

  /// Drop the buffers of Region `id`. Called for ids never uploaded too.
  fn release(&mut self, id: RegionId);
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl BufferSink for NullSink {
  fn upload(&mut self, _id: RegionId, _transform: DAffine3, _mesh: &MeshOutput) {}

  fn release(&mut self, _id: RegionId) {}
}

/// Keeps buffer sizes in memory. Useful for tests and headless runs.
#[derive(Debug, Default)]
pub struct HeadlessSink {
  /// `(vertex count, index count)` per live upload.
  pub buffers: std::collections::HashMap<RegionId, (usize, usize)>,
  pub uploads: u64,
  pub releases: u64,
}

impl HeadlessSink {
  pub fn vertex_count(&self) -> usize {
    self.buffers.values().map(|&(v, _)| v).sum()
  }
}

impl BufferSink for HeadlessSink {
  fn upload(&mut self, id: RegionId, _transform: DAffine3, mesh: &MeshOutput) {
    self
      .buffers
      .insert(id, (mesh.vertices.len(), mesh.indices.len()));
    self.uploads += 1;
  }

  fn release(&mut self, id: RegionId) {
    if self.buffers.remove(&id).is_some() {
      self.releases += 1;
    }
  }
}

/// One entry of [`VoxelWorld::render_list`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderItem {
  pub id: RegionId,
  pub lod: u32,
  /// Maps region-local voxel units to world space.
  pub transform: DAffine3,
  pub vertex_count: usize,
  pub index_count: usize,
}

// =============================================================================
// Reports
// =============================================================================

/// What one tick did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
  pub created: usize,
  pub freed: usize,
  pub resident: usize,
  pub meshes_queued: usize,
  pub uploads: usize,
}

impl TickSummary {
  /// Nothing structural changed and nothing reached the sink.
  pub fn is_quiet(&self) -> bool {
    self.created == 0 && self.freed == 0 && self.meshes_queued == 0 && self.uploads == 0
  }
}

/// Snapshot returned by [`VoxelWorld::stats`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorldStats {
  /// Resident Regions per LOD (index = LOD).
  pub resident_per_lod: Vec<usize>,
  pub live_regions: usize,
  pub nodes: usize,
  pub pending_jobs: usize,
  pub running_jobs: usize,
  /// Vertices and indices of resident, renderable Regions.
  pub vertex_count: usize,
  pub index_count: usize,
  pub tree: TreeStats,
  pub ticks: u64,
}

// =============================================================================
// VoxelWorld
// =============================================================================

pub struct VoxelWorld {
  id: WorldId,
  config: StreamConfig,
  params: WorldParams,
  octree: Octree,
  scheduler: Scheduler,
  context: Arc<PipelineContext>,
  handoff: HandOff,
  collision: CollisionSettings,
  /// Regions whose buffers currently live in the sink.
  uploaded: HashSet<RegionId>,
  /// Freed by a reset; released from the sink on the next tick.
  pending_release: Vec<RegionId>,
  ticks: u64,
  metrics: WorldMetrics,
}

impl VoxelWorld {
  /// World generated by [`TerrainDensity`] from `params`.
  pub fn new(config: StreamConfig, params: WorldParams) -> Result<Self, ParamsError> {
    let density = TerrainDensity::new(params.clone())?;
    let mut world = Self::with_density(config, Arc::new(density))?;
    world.params = params;
    Ok(world)
  }

  /// World generated by a caller-supplied density function.
  pub fn with_density(
    config: StreamConfig,
    density: Arc<dyn DensityFn>,
  ) -> Result<Self, ParamsError> {
    config.validate()?;
    let scheduler = match config.worker_count {
      Some(count) => Scheduler::new(count),
      None => Scheduler::with_hardware_concurrency(),
    };
    let (context, handoff) = PipelineContext::new(density, config.mesh_mode, config.boundary_rule);
    let octree = Octree::new(config.octree_config(), config.region_capacity);

    Ok(Self {
      id: WorldId::new(),
      config,
      params: WorldParams::default(),
      octree,
      scheduler,
      context,
      handoff,
      collision: CollisionSettings::default(),
      uploaded: HashSet::new(),
      pending_release: Vec::new(),
      ticks: 0,
      metrics: WorldMetrics::new(),
    })
  }

  pub fn id(&self) -> WorldId {
    self.id
  }

  pub fn config(&self) -> &StreamConfig {
    &self.config
  }

  pub fn params(&self) -> &WorldParams {
    &self.params
  }

  pub fn octree(&self) -> &Octree {
    &self.octree
  }

  pub fn scheduler(&self) -> &Scheduler {
    &self.scheduler
  }

  pub fn metrics(&self) -> &WorldMetrics {
    &self.metrics
  }

  pub fn collision_settings(&self) -> &CollisionSettings {
    &self.collision
  }

  pub fn collision_settings_mut(&mut self) -> &mut CollisionSettings {
    &mut self.collision
  }

  // ===========================================================================
  // Tick
  // ===========================================================================

  /// Stream around `observer` and move finished work along the pipeline.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "world::tick"))]
  pub fn tick(
    &mut self,
    observer: DVec3,
    sink: &mut dyn BufferSink,
  ) -> Result<TickSummary, ParamsError> {
    if !observer.is_finite() {
      return Err(ParamsError::InvalidObserver(observer));
    }
    let start = Instant::now();
    let mut summary = TickSummary::default();

    for id in self.pending_release.drain(..) {
      sink.release(id);
    }

    let out = self.octree.update(observer);
    summary.created = out.created.len();
    summary.freed = out.freed.len();
    summary.resident = out.resident.len();

    for region in out.created {
      submit_volume(&self.scheduler, region, &self.context);
    }
    for id in out.freed {
      if self.uploaded.remove(&id) {
        sink.release(id);
      }
    }
    for id in out.ready {
      summary.meshes_queued += self.queue_mesh(id) as usize;
    }
    summary.meshes_queued += self.resubmit_remeshes();

    summary.meshes_queued += self.pump();
    summary.uploads = self.upload_finished(sink);
    self.release_emptied(sink);

    self.ticks += 1;
    self
      .metrics
      .update_from_regions(self.octree.resident().map(|region| region.as_ref()));
    self
      .metrics
      .record_tick_timing(start.elapsed().as_micros() as u64);
    Ok(summary)
  }

  /// Tick until a tick changes nothing and no job is left, or `max_ticks`
  /// ran out. Blocks on the workers between ticks.
  ///
  /// Returns whether the world settled.
  pub fn run_until_idle(
    &mut self,
    observer: DVec3,
    sink: &mut dyn BufferSink,
    max_ticks: usize,
  ) -> Result<bool, ParamsError> {
    for _ in 0..max_ticks {
      let summary = self.tick(observer, sink)?;
      if summary.is_quiet() && self.is_settled() {
        return Ok(true);
      }
      if self.scheduler.worker_count() > 0 {
        self.scheduler.wait_for_all_threads_finished();
      }
    }
    Ok(false)
  }

  /// No job queued or running, nothing waiting in the hand-off queues, and
  /// every Region at the end of its pipeline.
  pub fn is_settled(&self) -> bool {
    self.scheduler.is_idle()
      && self.handoff.mesh_ready.is_empty()
      && self.handoff.render_ready.is_empty()
      && self
        .octree
        .regions()
        .all(|region| region.state() == RegionState::Done && !region.remesh_requested())
  }

  fn queue_mesh(&self, id: RegionId) -> bool {
    match self.octree.get(id) {
      Some(region) if region.state() == RegionState::WaitingForMeshGeneration => {
        submit_mesh(&self.scheduler, Arc::clone(region), &self.context);
        true
      }
      _ => false,
    }
  }

  fn resubmit_remeshes(&self) -> usize {
    let mut queued = 0;
    for region in self.octree.regions() {
      if region.take_remesh() {
        submit_mesh(&self.scheduler, Arc::clone(region), &self.context);
        queued += 1;
      }
    }
    queued
  }

  /// Feed the mesh-ready queue into mesh jobs. Without workers, also run
  /// every queued job here, until volume jobs stop producing mesh work.
  fn pump(&mut self) -> usize {
    let manual = self.scheduler.worker_count() == 0;
    let mut queued = 0;
    loop {
      if manual {
        self.scheduler.run_pending(usize::MAX);
      }
      let ready: Vec<RegionId> = self.handoff.mesh_ready.try_iter().collect();
      if ready.is_empty() {
        break;
      }
      for id in ready {
        if let Some(region) = self.octree.get(id) {
          self.metrics.record_volume_timing(region.volume_time_us());
        }
        queued += self.queue_mesh(id) as usize;
      }
      if !manual {
        break;
      }
    }
    queued
  }

  /// Hand finished meshes to the sink and complete their pipeline.
  fn upload_finished(&mut self, sink: &mut dyn BufferSink) -> usize {
    let mut uploads = 0;
    for id in self.handoff.render_ready.try_iter() {
      let Some(region) = self.octree.get(id) else {
        continue;
      };
      if region.state() != RegionState::GeneratingBuffers {
        // Reset for a remesh since; a newer hand-off follows.
        continue;
      }
      {
        let mesh = region.mesh();
        sink.upload(id, region.transform(), &mesh);
      }
      region.complete_upload();
      self.metrics.record_mesh_timing(region.mesh_time_us());
      self.metrics.record_upload();
      self.uploaded.insert(id);
      uploads += 1;
    }
    uploads
  }

  /// Drop buffers of Regions whose latest mesh came out empty.
  fn release_emptied(&mut self, sink: &mut dyn BufferSink) {
    let octree = &self.octree;
    let emptied: Vec<RegionId> = self
      .uploaded
      .iter()
      .copied()
      .filter(|&id| {
        octree
          .get(id)
          .is_some_and(|region| region.state() == RegionState::Done && !region.is_renderable())
      })
      .collect();
    for id in emptied {
      self.uploaded.remove(&id);
      sink.release(id);
    }
  }

  // ===========================================================================
  // Render boundary
  // ===========================================================================

  /// Renderable resident Regions intersecting `frustum`.
  pub fn render_list(&self, frustum: &Frustum) -> Vec<RenderItem> {
    let resident: Vec<&Arc<Region>> = self.octree.resident().collect();
    resident
      .par_iter()
      .filter(|region| region.is_renderable() && region.is_in_frustum(frustum))
      .map(|region| {
        let mesh = region.mesh();
        RenderItem {
          id: region.id(),
          lod: region.lod(),
          transform: region.transform(),
          vertex_count: mesh.vertices.len(),
          index_count: mesh.indices.len(),
        }
      })
      .collect()
  }

  // ===========================================================================
  // Queries and edits
  // ===========================================================================

  /// Advance `collider` by `dt` seconds against resident LOD-0 voxels.
  ///
  /// Fails without moving anything if the swept area is not resolved.
  pub fn move_box(
    &self,
    collider: &mut BoxCollider,
    dt: f64,
  ) -> Result<Vec<Contact>, QueryError> {
    collision::resolve(collider, dt, &self.octree, &self.collision)
  }

  pub fn raycast(&self, origin: DVec3, direction: DVec3, max_distance: f64) -> Option<RayHit> {
    collision::raycast(&self.octree, origin, direction, max_distance)
  }

  /// Material of the LOD-0 voxel containing `pos`.
  pub fn voxel_at(&self, pos: DVec3) -> Result<Material, QueryError> {
    let voxel = self.octree.config().voxel_at(pos);
    let (region, [x, y, z]) = self.octree.resolve_voxel(voxel)?;
    Ok(region.voxel(x, y, z))
  }

  /// Clear the LOD-0 voxel containing `pos`. Returns what was there.
  ///
  /// The Region, and any neighbor sharing the touched boundary, is remeshed
  /// on a later tick. The edit lives only as long as the Region.
  pub fn delete_voxel(&mut self, pos: DVec3) -> Result<Material, QueryError> {
    let voxel = self.octree.config().voxel_at(pos);
    let (region, local) = self.octree.resolve_voxel(voxel)?;
    let previous = region.set_voxel(local[0], local[1], local[2], Material::Air);
    if !previous.is_solid() {
      return Ok(previous);
    }

    region.request_remesh();
    for axis in 0..3 {
      let touched = if local[axis] == 0 {
        Some(Face::from_axis(axis, false))
      } else if local[axis] == REGION_SIZE - 1 {
        Some(Face::from_axis(axis, true))
      } else {
        None
      };
      if let Some(neighbor) = touched.and_then(|face| region.neighbor(face)) {
        neighbor.request_remesh();
      }
    }
    log::debug!("deleted {:?} voxel {} in {:?}", previous, voxel, region.id());
    Ok(previous)
  }

  // ===========================================================================
  // Parameter hot-swap
  // ===========================================================================

  /// Regenerate the world from new terrain parameters.
  pub fn set_params(&mut self, params: WorldParams) -> Result<(), ParamsError> {
    let density = TerrainDensity::new(params.clone())?;
    self.set_density(Arc::new(density));
    self.params = params;
    Ok(())
  }

  /// Replace the density function and rebuild the tree from the root.
  ///
  /// Drops queued jobs, waits for running ones, then frees every Region.
  /// Their buffers are released on the next tick.
  pub fn set_density(&mut self, density: Arc<dyn DensityFn>) {
    let discarded = self.scheduler.clear_job_pool();
    self.scheduler.wait_for_all_threads_finished();

    let freed = self.octree.clear(&self.scheduler);
    let stale = self.handoff.clear();
    self.context = self.context.with_density(density);

    self.uploaded.clear();
    self.pending_release.extend(freed.iter().copied());
    self.metrics.reset();
    log::info!(
      "world {} reset: {} jobs discarded, {} regions freed, {} stale hand-offs",
      self.id.raw(),
      discarded,
      freed.len(),
      stale
    );
  }

  // ===========================================================================
  // Statistics
  // ===========================================================================

  pub fn stats(&self) -> WorldStats {
    let mut resident_per_lod = vec![0; self.config.max_lod as usize + 1];
    let mut vertex_count = 0;
    let mut index_count = 0;
    for region in self.octree.resident() {
      if let Some(count) = resident_per_lod.get_mut(region.lod() as usize) {
        *count += 1;
      }
      if region.is_renderable() {
        let mesh = region.mesh();
        vertex_count += mesh.vertices.len();
        index_count += mesh.indices.len();
      }
    }

    WorldStats {
      resident_per_lod,
      live_regions: self.octree.region_count(),
      nodes: self.octree.node_count(),
      pending_jobs: self.scheduler.pending_count(),
      running_jobs: self.scheduler.running_count(),
      vertex_count,
      index_count,
      tree: self.octree.stats(),
      ticks: self.ticks,
    }
  }
}

#[cfg(test)]
#[path = "world_test.rs"]
mod world_test;
