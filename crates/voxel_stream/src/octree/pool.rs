//! Bounded Region storage.
//!
//! The pool holds the only long-lived strong reference to each Region and
//! indexes Regions by key for same-LOD neighbor lookup. It never grows past
//! its capacity: running out is a configuration error and panics.

use std::collections::HashMap;
use std::sync::Arc;

use super::{NodeKey, OctreeConfig};
use crate::arena::Arena;
use crate::region::{Region, RegionId};

pub struct RegionPool {
  arena: Arena<Arc<Region>>,
  by_key: HashMap<NodeKey, RegionId>,
  capacity: usize,
}

impl RegionPool {
  pub fn new(capacity: usize) -> Self {
    Self {
      arena: Arena::with_capacity(capacity.min(1024)),
      by_key: HashMap::new(),
      capacity,
    }
  }

  /// Allocate a `BrandNew` Region for `key`.
  ///
  /// # Panics
  /// Panics when the pool is full or `key` already has a Region.
  pub fn allocate(&mut self, key: NodeKey, config: &OctreeConfig) -> Arc<Region> {
    if self.arena.len() >= self.capacity {
      panic!(
        "region pool exhausted: {} regions live; raise region_capacity or lower lod_radius",
        self.capacity
      );
    }
    assert!(
      !self.by_key.contains_key(&key),
      "region for {:?} allocated twice",
      key
    );
    let id = self
      .arena
      .insert_with(|id| Arc::new(Region::new(id, key, config)));
    self.by_key.insert(key, id);
    Arc::clone(&self.arena[id])
  }

  /// Remove a Region. The returned handle is the last pool reference.
  pub fn release(&mut self, id: RegionId) -> Option<Arc<Region>> {
    let region = self.arena.remove(id)?;
    self.by_key.remove(&region.key());
    Some(region)
  }

  pub fn get(&self, id: RegionId) -> Option<&Arc<Region>> {
    self.arena.get(id)
  }

  pub fn find(&self, key: &NodeKey) -> Option<&Arc<Region>> {
    self.by_key.get(key).and_then(|&id| self.arena.get(id))
  }

  pub fn iter(&self) -> impl Iterator<Item = &Arc<Region>> {
    self.arena.iter().map(|(_, region)| region)
  }

  pub fn len(&self) -> usize {
    self.arena.len()
  }

  pub fn is_empty(&self) -> bool {
    self.arena.is_empty()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Remove every Region.
  pub fn drain(&mut self) -> Vec<Arc<Region>> {
    self.by_key.clear();
    self.arena.drain()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config() -> OctreeConfig {
    OctreeConfig::centered(1.0, 3, 1)
  }

  #[test]
  fn test_allocate_find_release() {
    let mut pool = RegionPool::new(4);
    let key = NodeKey::new(1, 2, 3, 0);
    let region = pool.allocate(key, &config());

    assert_eq!(pool.len(), 1);
    assert_eq!(pool.find(&key).map(|r| r.id()), Some(region.id()));
    assert!(pool.release(region.id()).is_some());
    assert!(pool.find(&key).is_none());
    assert!(pool.get(region.id()).is_none());
  }

  /// Released slots are reused without reviving old ids.
  #[test]
  fn test_released_ids_go_stale() {
    let mut pool = RegionPool::new(1);
    let first = pool.allocate(NodeKey::new(0, 0, 0, 0), &config()).id();
    pool.release(first);
    let second = pool.allocate(NodeKey::new(1, 0, 0, 0), &config()).id();

    assert_ne!(first, second);
    assert!(pool.get(first).is_none());
  }

  #[test]
  #[should_panic(expected = "region pool exhausted")]
  fn test_exhaustion_panics() {
    let mut pool = RegionPool::new(2);
    for x in 0..3 {
      pool.allocate(NodeKey::new(x, 0, 0, 0), &config());
    }
  }
}
