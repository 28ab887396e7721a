//! Spatial LOD tree deciding which Regions exist, and at what resolution.
//!
//! Nodes live in an arena; Regions live in a bounded [`RegionPool`]. Every
//! tick [`Octree::update`] walks the tree once from the root with an explicit
//! stack and compares each node's center to the observer along the dominant
//! axis:
//!
//! ```text
//! within (R + 0.5) * cell(lod), lod > 0       otherwise
//! ─────────────────────────────────────       ─────────────────────────────
//! split (create 8 children if missing)        resolve to one Region here
//! keep own Region until the subtree           create it if missing
//!   has settled, covering the children        collapse children once every
//! push children                                 subtree Region is deletable
//! ```
//!
//! # LOD Convention
//!
//! LOD 0 = finest detail (smallest cells), higher LOD = coarser.
//!
//! ```text
//! Cell Size = REGION_SIZE * voxel_size * 2^LOD
//!           = 32 * voxel_size * 2^LOD
//! ```
//!
//! # Residency
//!
//! The resident set is what the render and collision boundaries see. It
//! never contains two overlapping Regions: a coarse Region kept while its
//! children load covers them, and a deferred collapse keeps last tick's
//! fine Regions resident until the coarse Region has a mesh.

pub mod bounds;
pub mod config;
pub mod key;
pub mod node;
pub mod pool;

// Re-exports
pub use bounds::DAabb3;
pub use config::OctreeConfig;
pub use key::NodeKey;
pub use node::{NodeId, OctreeNode};
pub use pool::RegionPool;

use std::collections::HashSet;
use std::sync::Arc;

use glam::{DVec3, IVec3};

use crate::arena::Arena;
use crate::collision::VoxelQuery;
use crate::error::QueryError;
use crate::region::{Region, RegionId, RegionState};
use crate::scheduler::Scheduler;
use crate::types::{Face, Material};

/// Result of one [`Octree::update`] pass.
#[derive(Default)]
pub struct TickOutput {
  /// Regions allocated this tick, still `BrandNew`: the caller queues their
  /// volume jobs.
  pub created: Vec<Arc<Region>>,
  /// Non-overlapping set of Regions currently standing for the world.
  pub resident: Vec<Arc<Region>>,
  /// Regions freed this tick. Their ids are already stale.
  pub freed: Vec<RegionId>,
  /// Regions made mesh-ready on the main thread (linking, freeing).
  pub ready: Vec<RegionId>,
}

/// Cumulative tree counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TreeStats {
  pub regions_created: u64,
  pub regions_freed: u64,
  pub collapses_deferred: u64,
}

pub struct Octree {
  config: OctreeConfig,
  nodes: Arena<OctreeNode>,
  root: NodeId,
  pool: RegionPool,
  /// Resident set of the previous tick.
  resident: HashSet<RegionId>,
  stats: TreeStats,
}

/// Meshed and not being worked on: safe to show, safe to retire.
fn is_settled(region: &Region) -> bool {
  matches!(
    region.state(),
    RegionState::GeneratingBuffers | RegionState::Done
  )
}

impl Octree {
  pub fn new(config: OctreeConfig, region_capacity: usize) -> Self {
    let mut nodes = Arena::new();
    let root = nodes.insert(OctreeNode::new(config.root_key()));
    Self {
      config,
      nodes,
      root,
      pool: RegionPool::new(region_capacity),
      resident: HashSet::new(),
      stats: TreeStats::default(),
    }
  }

  pub fn config(&self) -> &OctreeConfig {
    &self.config
  }

  pub fn stats(&self) -> TreeStats {
    self.stats
  }

  pub fn node_count(&self) -> usize {
    self.nodes.len()
  }

  pub fn region_count(&self) -> usize {
    self.pool.len()
  }

  pub fn get(&self, id: RegionId) -> Option<&Arc<Region>> {
    self.pool.get(id)
  }

  /// Every live Region, resident or not.
  pub fn regions(&self) -> impl Iterator<Item = &Arc<Region>> {
    self.pool.iter()
  }

  /// The resident set as of the last update.
  pub fn resident(&self) -> impl Iterator<Item = &Arc<Region>> {
    self.resident.iter().filter_map(|&id| self.pool.get(id))
  }

  pub fn is_resident(&self, id: RegionId) -> bool {
    self.resident.contains(&id)
  }

  // ===========================================================================
  // Update
  // ===========================================================================

  /// One streaming pass around `observer`.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "octree::update"))]
  pub fn update(&mut self, observer: DVec3) -> TickOutput {
    let mut out = TickOutput::default();

    {
      #[cfg(feature = "tracing")]
      let _span = tracing::info_span!("walk").entered();
      self.walk(observer, &mut out);
    }

    {
      #[cfg(feature = "tracing")]
      let _span = tracing::info_span!("close_faces").entered();
      if !out.created.is_empty() || !out.freed.is_empty() {
        self.refresh_seams();
      }
      let mut ready = Vec::new();
      for region in &out.created {
        for face in Face::ALL {
          if region.neighbor(face).is_none() && region.mark_boundary(face) {
            ready.push(region.id());
          }
        }
      }
      out.ready.extend(ready);
    }

    self.resident = out.resident.iter().map(|region| region.id()).collect();
    if !out.created.is_empty() || !out.freed.is_empty() {
      log::debug!(
        "octree: {} created, {} freed, {} resident, {} live",
        out.created.len(),
        out.freed.len(),
        out.resident.len(),
        self.pool.len()
      );
    }
    out
  }

  fn wants_split(&self, key: &NodeKey, observer: DVec3) -> bool {
    if key.lod == 0 {
      return false;
    }
    let offset = (self.config.get_node_center(key) - observer).abs();
    offset.max_element() < self.config.get_lod_distance(key.lod)
  }

  fn walk(&mut self, observer: DVec3, out: &mut TickOutput) {
    // (node, covered): a covered node sits under a resident coarse Region.
    let mut stack: Vec<(NodeId, bool)> = vec![(self.root, false)];

    while let Some((node_id, covered)) = stack.pop() {
      let key = self.nodes[node_id].key;

      if self.wants_split(&key, observer) {
        if let Some(children) = self.split(node_id) {
          let children_covered = self.retire_split_region(node_id, children, covered, out);
          stack.extend(children.iter().map(|&child| (child, children_covered)));
          continue;
        }
      }

      let existing = self.nodes[node_id]
        .region
        .and_then(|id| self.pool.get(id))
        .cloned();
      let region = match existing {
        Some(region) => region,
        None => self.create_region(node_id, out),
      };

      match self.nodes[node_id].children {
        Some(children) => {
          if self.try_collapse(node_id, children, &region, out) {
            if !covered {
              out.resident.push(region);
            }
          } else {
            self.stats.collapses_deferred += 1;
            if !covered {
              self.push_previously_resident(children, out);
            }
          }
        }
        None => {
          if !covered {
            out.resident.push(region);
          }
        }
      }
    }
  }

  /// Children of `node_id`, creating them if needed. None at LOD 0.
  fn split(&mut self, node_id: NodeId) -> Option<[NodeId; 8]> {
    if let Some(children) = self.nodes[node_id].children {
      return Some(children);
    }
    let keys = self.nodes[node_id].key.children()?;
    let children = keys.map(|key| self.nodes.insert(OctreeNode::new(key)));
    self.nodes[node_id].children = Some(children);
    Some(children)
  }

  /// Deal with the Region a split node held as a leaf.
  ///
  /// Returns whether the children are covered.
  fn retire_split_region(
    &mut self,
    node_id: NodeId,
    children: [NodeId; 8],
    covered: bool,
    out: &mut TickOutput,
  ) -> bool {
    let Some(region_id) = self.nodes[node_id].region else {
      return covered;
    };
    let Some(region) = self.pool.get(region_id).cloned() else {
      self.nodes[node_id].region = None;
      return covered;
    };

    if region.is_deletable() && self.subtree_settled(children) {
      self.nodes[node_id].region = None;
      self.free_region(region_id, out);
      return covered;
    }
    if is_settled(&region) {
      if !covered {
        out.resident.push(region);
      }
      return true;
    }
    covered
  }

  /// Fold the subtree back into `region` once it is safe to.
  fn try_collapse(
    &mut self,
    node_id: NodeId,
    children: [NodeId; 8],
    region: &Region,
    out: &mut TickOutput,
  ) -> bool {
    if !is_settled(region) {
      return false;
    }
    let (nodes, regions) = self.subtree(children);
    let all_deletable = regions
      .iter()
      .all(|&id| self.pool.get(id).map_or(true, |r| r.is_deletable()));
    if !all_deletable {
      return false;
    }

    for id in regions {
      self.free_region(id, out);
    }
    for id in nodes {
      self.nodes.remove(id);
    }
    self.nodes[node_id].children = None;
    true
  }

  /// Every descendant node and the Regions they hold.
  fn subtree(&self, children: [NodeId; 8]) -> (Vec<NodeId>, Vec<RegionId>) {
    let mut nodes = Vec::new();
    let mut regions = Vec::new();
    let mut stack = children.to_vec();
    while let Some(id) = stack.pop() {
      let node = &self.nodes[id];
      nodes.push(id);
      regions.extend(node.region);
      if let Some(grandchildren) = node.children {
        stack.extend(grandchildren);
      }
    }
    (nodes, regions)
  }

  /// Every leaf below holds a settled Region.
  fn subtree_settled(&self, children: [NodeId; 8]) -> bool {
    let mut stack = children.to_vec();
    while let Some(id) = stack.pop() {
      let node = &self.nodes[id];
      match node.children {
        Some(grandchildren) => stack.extend(grandchildren),
        None => {
          let settled = node
            .region
            .and_then(|region| self.pool.get(region))
            .is_some_and(|region| is_settled(region));
          if !settled {
            return false;
          }
        }
      }
    }
    true
  }

  fn push_previously_resident(&self, children: [NodeId; 8], out: &mut TickOutput) {
    let (_, regions) = self.subtree(children);
    for id in regions {
      if self.resident.contains(&id) {
        if let Some(region) = self.pool.get(id) {
          out.resident.push(Arc::clone(region));
        }
      }
    }
  }

  // ===========================================================================
  // Region lifetime
  // ===========================================================================

  /// Allocate the Region for a node and link it to its same-LOD neighbors.
  ///
  /// Faces still unlinked after the walk are closed as boundary-complete.
  fn create_region(&mut self, node_id: NodeId, out: &mut TickOutput) -> Arc<Region> {
    let key = self.nodes[node_id].key;
    let region = self.pool.allocate(key, &self.config);
    self.nodes[node_id].region = Some(region.id());

    for face in Face::ALL {
      if let Some(neighbor) = self.pool.find(&key.neighbor(face)).cloned() {
        out.ready.extend(Region::link(&region, face, &neighbor));
      }
    }

    self.stats.regions_created += 1;
    out.created.push(Arc::clone(&region));
    region
  }

  /// Release a deletable Region and clear every back-reference to it.
  fn free_region(&mut self, id: RegionId, out: &mut TickOutput) {
    let Some(region) = self.pool.release(id) else {
      return;
    };
    debug_assert!(
      region.is_deletable(),
      "freeing region {:?} while a job may hold it",
      region
    );
    region.retire();

    for (face, neighbor) in region.unlink_all() {
      if neighbor.forget_neighbor(face.opposite()) {
        out.ready.push(neighbor.id());
      }
    }
    self.stats.regions_freed += 1;
    out.freed.push(id);
  }

  /// Recompute the seam faces of every live Region.
  ///
  /// A face is a seam while the same-LOD node across it is split, whether or
  /// not that node still holds a Region of its own. Topology only changes on
  /// ticks that create or free Regions.
  fn refresh_seams(&self) {
    let mut changed = 0usize;
    for region in self.pool.iter() {
      if region.set_seams(self.seam_mask(&region.key())) {
        changed += 1;
      }
    }
    if changed > 0 {
      log::trace!("octree: {} seam masks changed", changed);
    }
  }

  /// Faces of `key` bordering a split node of the same LOD.
  fn seam_mask(&self, key: &NodeKey) -> u8 {
    Face::ALL
      .into_iter()
      .filter(|&face| {
        let across = key.neighbor(face);
        self
          .deepest_node(&across)
          .map(|id| &self.nodes[id])
          .is_some_and(|node| node.key == across && node.children.is_some())
      })
      .fold(0, |mask, face| mask | face.bit())
  }

  /// The node at `key`, or the deepest existing node containing it.
  fn deepest_node(&self, key: &NodeKey) -> Option<NodeId> {
    let mut id = self.root;
    if !key.is_within(&self.nodes[id].key) {
      return None;
    }
    loop {
      let node = &self.nodes[id];
      if node.key == *key {
        return Some(id);
      }
      match node.children {
        Some(children) => {
          let shift = node.key.lod - 1 - key.lod;
          let toward = NodeKey::new(key.x >> shift, key.y >> shift, key.z >> shift, 0);
          id = children[toward.octant() as usize];
        }
        None => return Some(id),
      }
    }
  }

  // ===========================================================================
  // Teardown
  // ===========================================================================

  /// Free the whole tree and rebuild the root.
  ///
  /// Blocks until every Region is deletable or no job is left that could
  /// touch one. With no workers, pending jobs are drained on this thread.
  pub fn clear(&mut self, scheduler: &Scheduler) -> Vec<RegionId> {
    while !(self.pool.iter().all(|region| region.is_deletable()) || scheduler.is_idle()) {
      if scheduler.worker_count() == 0 {
        scheduler.run_pending(usize::MAX);
      } else {
        std::thread::yield_now();
      }
    }

    let freed: Vec<RegionId> = self
      .pool
      .drain()
      .into_iter()
      .map(|region| {
        region.retire();
        region.id()
      })
      .collect();

    self.nodes = Arena::new();
    self.root = self.nodes.insert(OctreeNode::new(self.config.root_key()));
    self.resident.clear();
    self.stats.regions_freed += freed.len() as u64;
    log::info!("octree cleared, {} regions freed", freed.len());
    freed
  }

  // ===========================================================================
  // Queries
  // ===========================================================================

  /// The resident Region covering `pos`.
  ///
  /// Residents never overlap, so at most one lies on the path from the root.
  pub fn region_at(&self, pos: DVec3) -> Option<&Arc<Region>> {
    let target = self.config.key_at(pos, 0)?;
    let mut id = self.root;
    loop {
      let node = &self.nodes[id];
      if let Some(region_id) = node.region.filter(|region| self.resident.contains(region)) {
        return self.pool.get(region_id);
      }
      match node.children {
        Some(children) => {
          let shift = node.key.lod - 1;
          let toward = NodeKey::new(target.x >> shift, target.y >> shift, target.z >> shift, 0);
          id = children[toward.octant() as usize];
        }
        None => return None,
      }
    }
  }

  /// Meshed, resident LOD-0 Region holding `voxel`, with the local
  /// coordinate.
  pub fn resolve_voxel(&self, voxel: IVec3) -> Result<(Arc<Region>, [usize; 3]), QueryError> {
    let center = self.config.voxel_min(voxel) + DVec3::splat(0.5 * self.config.voxel_size);
    let region = self
      .region_at(center)
      .ok_or(QueryError::OutOfRange(voxel))?;
    if region.lod() != 0 {
      return Err(QueryError::CoarseLod {
        voxel,
        lod: region.lod(),
      });
    }
    if !is_settled(region) {
      return Err(QueryError::Unresolved(voxel));
    }

    let local = voxel - (region.origin() / self.config.voxel_size).round().as_ivec3();
    debug_assert!(
      local.min_element() >= 0 && local.max_element() < crate::constants::REGION_SIZE as i32,
      "voxel {} resolved outside region {:?}",
      voxel,
      region
    );
    Ok((
      Arc::clone(region),
      [local.x as usize, local.y as usize, local.z as usize],
    ))
  }

  // ===========================================================================
  // Validation
  // ===========================================================================

  /// Check structural invariants. Returns one message per violation.
  pub fn validate(&self) -> Vec<String> {
    let mut errors = Vec::new();
    let mut reached_nodes = 0usize;
    let mut reached_regions = HashSet::new();

    if self.nodes.get(self.root).map(|n| n.key) != Some(self.config.root_key()) {
      errors.push(format!("root is not {:?}", self.config.root_key()));
    }

    let mut stack = vec![self.root];
    while let Some(id) = stack.pop() {
      let Some(node) = self.nodes.get(id) else {
        errors.push(format!("dangling node handle {:?}", id));
        continue;
      };
      reached_nodes += 1;

      if let Some(children) = node.children {
        for (octant, &child) in children.iter().enumerate() {
          match self.nodes.get(child) {
            Some(c) if Some(c.key) == node.key.get_child(octant as u8) => stack.push(child),
            Some(c) => errors.push(format!(
              "node {:?} holds {:?} at octant {}",
              node.key, c.key, octant
            )),
            None => errors.push(format!("node {:?} has a dangling child", node.key)),
          }
        }
      }

      if let Some(region_id) = node.region {
        match self.pool.get(region_id) {
          Some(region) if region.key() != node.key => errors.push(format!(
            "node {:?} holds region keyed {:?}",
            node.key,
            region.key()
          )),
          Some(_) => {
            if !reached_regions.insert(region_id) {
              errors.push(format!("region {:?} reachable twice", region_id));
            }
          }
          None => errors.push(format!("node {:?} holds a freed region", node.key)),
        }
      }
    }

    if reached_nodes != self.nodes.len() {
      errors.push(format!(
        "{} nodes allocated, {} reachable",
        self.nodes.len(),
        reached_nodes
      ));
    }
    if reached_regions.len() != self.pool.len() {
      errors.push(format!(
        "{} regions pooled, {} reachable",
        self.pool.len(),
        reached_regions.len()
      ));
    }

    let mut resident_keys = HashSet::new();
    for &id in &self.resident {
      match self.pool.get(id) {
        Some(region) => {
          resident_keys.insert(region.key());
        }
        None => errors.push(format!("resident region {:?} was freed", id)),
      }
    }
    for key in &resident_keys {
      let mut parent = key.get_parent(self.config.max_lod);
      while let Some(p) = parent {
        if resident_keys.contains(&p) {
          errors.push(format!("resident {:?} overlaps resident {:?}", key, p));
        }
        parent = p.get_parent(self.config.max_lod);
      }
    }

    errors
  }
}

impl VoxelQuery for Octree {
  fn voxel(&self, voxel: IVec3) -> Result<Material, QueryError> {
    let (region, [x, y, z]) = self.resolve_voxel(voxel)?;
    Ok(region.voxel(x, y, z))
  }

  fn voxel_size(&self) -> f64 {
    self.config.voxel_size
  }
}
