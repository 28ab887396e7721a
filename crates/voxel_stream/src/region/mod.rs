//! Region: one 32³ block of voxels at one LOD, the unit of streaming.
//!
//! A Region is shared between the main thread (tree owner) and the worker
//! running its current job, so it lives behind an `Arc` and every field the
//! two sides both touch is an atomic or a lock. Neighbor links are `Weak`;
//! the tree's pool holds the only long-lived strong reference.
//!
//! # Neighbor protocol
//!
//! A Region may be meshed only once all six faces are accounted for: either a
//! same-LOD neighbor has finished its volume, or the face was declared
//! boundary-complete (no neighbor at this LOD). Each side reports the other:
//!
//! ```text
//! worker (volume done)                 main thread (link new neighbor)
//! ────────────────────                 ───────────────────────────────
//! lock self.neighbors                  lock a.neighbors
//!   GeneratingVolume → Collecting        a.neighbors[f] = b
//!   copy neighbor list                   a_ready = a has volume
//! unlock                               unlock
//! notify every copied neighbor         (same for b)
//! ```
//!
//! Because the state change and the list copy happen under the same lock the
//! main thread links under, a ready volume is always reported by exactly one
//! side: the worker if the link came first, the main thread otherwise.

mod frustum;
mod state;
mod volume;

pub use frustum::{Frustum, Plane};
pub use state::{AtomicRegionState, NeighborMask, RegionState};
pub use volume::{BoundaryLayer, Volume};

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, Weak};

use glam::{DAffine3, DVec3};
use smallvec::SmallVec;

use crate::arena::Handle;
use crate::mesher::{BoundaryRule, Neighborhood};
use crate::octree::{DAabb3, NodeKey, OctreeConfig};
use crate::types::{Face, Material, MeshOutput};

/// Pool handle of a Region. Stale once the Region is freed.
pub type RegionId = Handle<Arc<Region>>;

/// Neighbors reported back by a state change, for the caller to notify.
pub type NeighborList = SmallVec<[(Face, Arc<Region>); 6]>;

pub struct Region {
  id: RegionId,
  key: NodeKey,
  origin: DVec3,
  voxel_size: f64,
  bounds: DAabb3,

  state: AtomicRegionState,
  neighbor_mask: NeighborMask,
  /// Faces completed by the boundary rule rather than a real neighbor.
  boundary_faces: AtomicU8,
  /// Faces bordering finer LOD; their outside is meshed as empty.
  seam_faces: AtomicU8,

  empty: AtomicBool,
  no_geometry: AtomicBool,
  remesh_requested: AtomicBool,
  retired: AtomicBool,

  neighbors: Mutex<[Option<Weak<Region>>; 6]>,
  volume: RwLock<Volume>,
  mesh: Mutex<MeshOutput>,

  volume_us: AtomicU64,
  mesh_us: AtomicU64,
}

impl std::fmt::Debug for Region {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Region")
      .field("id", &self.id)
      .field("key", &self.key)
      .field("state", &self.state())
      .field("neighbor_mask", &self.neighbor_mask.load())
      .finish()
  }
}

impl Region {
  pub fn new(id: RegionId, key: NodeKey, config: &OctreeConfig) -> Self {
    Self {
      id,
      key,
      origin: config.get_node_min(&key),
      voxel_size: config.get_voxel_size(key.lod),
      bounds: config.get_node_bounds(&key),
      state: AtomicRegionState::new(RegionState::BrandNew),
      neighbor_mask: NeighborMask::new(),
      boundary_faces: AtomicU8::new(0),
      seam_faces: AtomicU8::new(0),
      empty: AtomicBool::new(false),
      no_geometry: AtomicBool::new(false),
      remesh_requested: AtomicBool::new(false),
      retired: AtomicBool::new(false),
      neighbors: Mutex::new(Default::default()),
      volume: RwLock::new(Volume::default()),
      mesh: Mutex::new(MeshOutput::new()),
      volume_us: AtomicU64::new(0),
      mesh_us: AtomicU64::new(0),
    }
  }

  // ===========================================================================
  // Accessors
  // ===========================================================================

  pub fn id(&self) -> RegionId {
    self.id
  }

  pub fn key(&self) -> NodeKey {
    self.key
  }

  pub fn lod(&self) -> u32 {
    self.key.lod
  }

  /// World position of voxel (0, 0, 0).
  pub fn origin(&self) -> DVec3 {
    self.origin
  }

  /// World size of one voxel of this Region.
  pub fn voxel_size(&self) -> f64 {
    self.voxel_size
  }

  pub fn bounds(&self) -> &DAabb3 {
    &self.bounds
  }

  /// Model transform from region-local voxel units to world space.
  pub fn transform(&self) -> DAffine3 {
    DAffine3::from_translation(self.origin) * DAffine3::from_scale(DVec3::splat(self.voxel_size))
  }

  pub fn state(&self) -> RegionState {
    self.state.load()
  }

  pub fn neighbor_mask(&self) -> u8 {
    self.neighbor_mask.load()
  }

  pub fn boundary_faces(&self) -> u8 {
    self.boundary_faces.load(Ordering::SeqCst)
  }

  pub fn seam_faces(&self) -> u8 {
    self.seam_faces.load(Ordering::SeqCst)
  }

  // ===========================================================================
  // Predicates
  // ===========================================================================

  /// Volume synthesized with no solid voxel.
  pub fn is_empty(&self) -> bool {
    self.empty.load(Ordering::Acquire)
  }

  /// Meshed to zero faces despite holding solid voxels.
  pub fn has_no_geometry(&self) -> bool {
    self.no_geometry.load(Ordering::Acquire)
  }

  pub fn is_renderable(&self) -> bool {
    matches!(
      self.state(),
      RegionState::GeneratingBuffers | RegionState::Done
    ) && !self.is_empty()
      && !self.has_no_geometry()
  }

  /// True when no job is in flight for this Region.
  pub fn is_deletable(&self) -> bool {
    self.state().is_deletable()
  }

  pub fn is_in_frustum(&self, frustum: &Frustum) -> bool {
    frustum.intersects_aabb(&self.bounds)
  }

  /// True once the Region has been freed from the tree.
  pub fn is_retired(&self) -> bool {
    self.retired.load(Ordering::Acquire)
  }

  pub fn remesh_requested(&self) -> bool {
    self.remesh_requested.load(Ordering::Acquire)
  }

  // ===========================================================================
  // Volume
  // ===========================================================================

  /// `BrandNew → GeneratingVolume`, done right before the volume job is queued.
  pub fn begin_volume(&self) -> bool {
    self
      .state
      .advance(RegionState::BrandNew, RegionState::GeneratingVolume)
  }

  pub fn install_volume(&self, volume: Volume) {
    debug_assert_eq!(self.state(), RegionState::GeneratingVolume);
    self.empty.store(volume.is_empty(), Ordering::Release);
    *self.volume.write().unwrap_or_else(PoisonError::into_inner) = volume;
  }

  /// `GeneratingVolume → CollectingNeighborRefs` and snapshot of the current
  /// neighbors, both under the neighbor lock.
  pub fn finish_volume(&self) -> NeighborList {
    let guard = self.lock_neighbors();
    let advanced = self.state.advance(
      RegionState::GeneratingVolume,
      RegionState::CollectingNeighborRefs,
    );
    debug_assert!(advanced, "finish_volume on {:?}", self.state());
    upgrade_all(&guard)
  }

  pub fn volume(&self) -> RwLockReadGuard<'_, Volume> {
    self.volume.read().unwrap_or_else(PoisonError::into_inner)
  }

  /// Read one voxel by region-local coordinate.
  pub fn voxel(&self, x: usize, y: usize, z: usize) -> Material {
    self.volume().get(x, y, z)
  }

  /// Overwrite one voxel. Returns the previous material.
  pub fn set_voxel(&self, x: usize, y: usize, z: usize, material: Material) -> Material {
    let mut volume = self.volume.write().unwrap_or_else(PoisonError::into_inner);
    let previous = volume.set(x, y, z, material);
    self.empty.store(volume.is_empty(), Ordering::Release);
    previous
  }

  // ===========================================================================
  // Neighbor protocol
  // ===========================================================================

  fn lock_neighbors(&self) -> MutexGuard<'_, [Option<Weak<Region>>; 6]> {
    self.neighbors.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Link two same-LOD Regions across `face` of `a`.
  ///
  /// Returns the Regions that became mesh-ready as a result.
  pub fn link(a: &Arc<Region>, face: Face, b: &Arc<Region>) -> SmallVec<[RegionId; 2]> {
    debug_assert_eq!(a.lod(), b.lod());
    debug_assert_eq!(a.key.neighbor(face), b.key);

    let a_ready = {
      let mut guard = a.lock_neighbors();
      guard[face.index()] = Some(Arc::downgrade(b));
      a.state().has_volume()
    };
    let b_ready = {
      let mut guard = b.lock_neighbors();
      guard[face.opposite().index()] = Some(Arc::downgrade(a));
      b.state().has_volume()
    };

    let mut ready = SmallVec::new();
    if a_ready && b.mark_neighbor_ready(face.opposite()) {
      ready.push(b.id);
    }
    if b_ready && a.mark_neighbor_ready(face) {
      ready.push(a.id);
    }
    ready
  }

  /// A real neighbor across `face` has its volume.
  ///
  /// Returns true if this call made the Region mesh-ready.
  pub fn mark_neighbor_ready(&self, face: Face) -> bool {
    let bit = face.bit();
    let was_boundary = self.boundary_faces.fetch_and(!bit, Ordering::SeqCst) & bit != 0;
    if was_boundary && self.state() >= RegionState::GeneratingMesh {
      self.request_remesh();
    }
    self.neighbor_mask.set(face);
    self.try_enter_mesh_ready()
  }

  /// Declare `face` boundary-complete.
  ///
  /// Returns true if this call made the Region mesh-ready.
  pub fn mark_boundary(&self, face: Face) -> bool {
    self.boundary_faces.fetch_or(face.bit(), Ordering::SeqCst);
    self.neighbor_mask.set(face);
    self.try_enter_mesh_ready()
  }

  /// Drop the link across `face`; the face falls back to the boundary rule.
  pub fn forget_neighbor(&self, face: Face) -> bool {
    self.lock_neighbors()[face.index()] = None;
    if self.state() >= RegionState::GeneratingMesh {
      self.request_remesh();
    }
    self.mark_boundary(face)
  }

  /// Clear every link, returning the neighbors that were still alive.
  pub fn unlink_all(&self) -> NeighborList {
    let mut guard = self.lock_neighbors();
    let alive = upgrade_all(&guard);
    *guard = Default::default();
    alive
  }

  /// Live neighbor across `face`, if linked.
  pub fn neighbor(&self, face: Face) -> Option<Arc<Region>> {
    self.lock_neighbors()[face.index()]
      .as_ref()
      .and_then(Weak::upgrade)
  }

  /// Replace the set of faces bordering finer detail.
  ///
  /// Owned by the tree; neighbor traffic never touches it. Returns true if
  /// the mask changed.
  pub fn set_seams(&self, faces: u8) -> bool {
    let previous = self.seam_faces.swap(faces, Ordering::SeqCst);
    if previous == faces {
      return false;
    }
    if self.state() >= RegionState::GeneratingMesh {
      self.request_remesh();
    }
    true
  }

  /// `CollectingNeighborRefs → WaitingForMeshGeneration` once the mask is full.
  pub fn try_enter_mesh_ready(&self) -> bool {
    self.neighbor_mask.is_complete()
      && self.state.advance(
        RegionState::CollectingNeighborRefs,
        RegionState::WaitingForMeshGeneration,
      )
  }

  /// Boundary samples for meshing: live neighbor layers where available,
  /// empty across seams, the boundary rule elsewhere.
  pub fn neighborhood(&self, rule: BoundaryRule) -> Neighborhood {
    let neighbors: [Option<Arc<Region>>; 6] = {
      let guard = self.lock_neighbors();
      std::array::from_fn(|i| guard[i].as_ref().and_then(Weak::upgrade))
    };
    let seams = self.seam_faces();

    let mut neighborhood = Neighborhood::uniform(rule.fill());
    for face in Face::ALL {
      if seams & face.bit() != 0 {
        neighborhood.set(face, BoundaryLayer::Uniform(Material::Air));
        continue;
      }
      if let Some(neighbor) = &neighbors[face.index()] {
        if neighbor.state().has_volume() {
          neighborhood.set(face, neighbor.volume().boundary_layer(face.opposite()));
        }
      }
    }
    neighborhood
  }

  // ===========================================================================
  // Mesh
  // ===========================================================================

  /// `WaitingForMeshGeneration → GeneratingMesh`. False if the job is stale.
  pub fn begin_mesh(&self) -> bool {
    debug_assert!(
      self.neighbor_mask.is_complete(),
      "mesh job for region {:?} before all neighbors reported",
      self.id
    );
    self.state.advance(
      RegionState::WaitingForMeshGeneration,
      RegionState::GeneratingMesh,
    )
  }

  /// Store a finished mesh and leave `GeneratingMesh`.
  ///
  /// Returns the new state: `GeneratingBuffers` when there is geometry to
  /// upload, `Done` otherwise.
  pub fn store_mesh(&self, mesh: MeshOutput) -> RegionState {
    let has_faces = !mesh.is_empty();
    self
      .no_geometry
      .store(!has_faces && !self.is_empty(), Ordering::Release);
    *self.mesh.lock().unwrap_or_else(PoisonError::into_inner) = mesh;

    let next = if has_faces {
      RegionState::GeneratingBuffers
    } else {
      RegionState::Done
    };
    let advanced = self.state.advance(RegionState::GeneratingMesh, next);
    debug_assert!(advanced, "store_mesh on {:?}", self.state());
    next
  }

  pub fn mesh(&self) -> MutexGuard<'_, MeshOutput> {
    self.mesh.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// `GeneratingBuffers → Done` after the render boundary took the mesh.
  pub fn complete_upload(&self) -> bool {
    self
      .state
      .advance(RegionState::GeneratingBuffers, RegionState::Done)
  }

  pub fn request_remesh(&self) {
    self.remesh_requested.store(true, Ordering::Release);
  }

  /// Consume a pending remesh request if the Region is idle.
  ///
  /// Resets `Done`/`GeneratingBuffers → WaitingForMeshGeneration`; the caller
  /// queues the mesh job.
  pub fn take_remesh(&self) -> bool {
    if !self.remesh_requested() {
      return false;
    }
    for from in [RegionState::Done, RegionState::GeneratingBuffers] {
      if self
        .state
        .advance(from, RegionState::WaitingForMeshGeneration)
      {
        self.remesh_requested.store(false, Ordering::Release);
        return true;
      }
    }
    false
  }

  // ===========================================================================
  // Bookkeeping
  // ===========================================================================

  pub fn retire(&self) {
    self.retired.store(true, Ordering::Release);
  }

  pub fn record_volume_time(&self, micros: u64) {
    self.volume_us.store(micros, Ordering::Relaxed);
  }

  pub fn record_mesh_time(&self, micros: u64) {
    self.mesh_us.store(micros, Ordering::Relaxed);
  }

  pub fn volume_time_us(&self) -> u64 {
    self.volume_us.load(Ordering::Relaxed)
  }

  pub fn mesh_time_us(&self) -> u64 {
    self.mesh_us.load(Ordering::Relaxed)
  }
}

fn upgrade_all(links: &[Option<Weak<Region>>; 6]) -> NeighborList {
  links
    .iter()
    .enumerate()
    .filter_map(|(i, link)| {
      link
        .as_ref()
        .and_then(Weak::upgrade)
        .map(|region| (Face::from_index(i), region))
    })
    .collect()
}
