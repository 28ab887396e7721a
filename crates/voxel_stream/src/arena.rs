//! Generational arena with stable, staleness-checked handles.
//!
//! Octree nodes and Regions live in arenas instead of behind owning pointers.
//! A freed slot bumps its generation, so a handle kept across a free (a
//! queued Region id, a back-reference) resolves to `None` rather than to
//! whatever reuses the slot.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// Index + generation pair addressing one arena slot.
pub struct Handle<T> {
  index: u32,
  generation: u32,
  _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
  fn new(index: u32, generation: u32) -> Self {
    Self {
      index,
      generation,
      _marker: PhantomData,
    }
  }

  /// Slot index (stable while the value is alive).
  pub fn index(&self) -> u32 {
    self.index
  }

  pub fn generation(&self) -> u32 {
    self.generation
  }
}

// Manual impls: derives would put bounds on T.
impl<T> Clone for Handle<T> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
  fn eq(&self, other: &Self) -> bool {
    self.index == other.index && self.generation == other.generation
  }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.index.hash(state);
    self.generation.hash(state);
  }
}

impl<T> fmt::Debug for Handle<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}v{}", self.index, self.generation)
  }
}

struct Slot<T> {
  generation: u32,
  value: Option<T>,
}

/// Slot storage with a free list.
pub struct Arena<T> {
  slots: Vec<Slot<T>>,
  free: Vec<u32>,
  len: usize,
}

impl<T> Arena<T> {
  pub fn new() -> Self {
    Self {
      slots: Vec::new(),
      free: Vec::new(),
      len: 0,
    }
  }

  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      slots: Vec::with_capacity(capacity),
      free: Vec::new(),
      len: 0,
    }
  }

  pub fn insert(&mut self, value: T) -> Handle<T> {
    self.insert_with(|_| value)
  }

  /// Insert a value that needs to know its own handle.
  pub fn insert_with(&mut self, make: impl FnOnce(Handle<T>) -> T) -> Handle<T> {
    let handle = match self.free.pop() {
      Some(index) => Handle::new(index, self.slots[index as usize].generation),
      None => {
        self.slots.push(Slot {
          generation: 0,
          value: None,
        });
        Handle::new((self.slots.len() - 1) as u32, 0)
      }
    };
    self.slots[handle.index as usize].value = Some(make(handle));
    self.len += 1;
    handle
  }

  pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
    let slot = self.slots.get_mut(handle.index as usize)?;
    if slot.generation != handle.generation {
      return None;
    }
    let value = slot.value.take()?;
    slot.generation = slot.generation.wrapping_add(1);
    self.free.push(handle.index);
    self.len -= 1;
    Some(value)
  }

  pub fn get(&self, handle: Handle<T>) -> Option<&T> {
    self
      .slots
      .get(handle.index as usize)
      .filter(|slot| slot.generation == handle.generation)
      .and_then(|slot| slot.value.as_ref())
  }

  pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
    self
      .slots
      .get_mut(handle.index as usize)
      .filter(|slot| slot.generation == handle.generation)
      .and_then(|slot| slot.value.as_mut())
  }

  pub fn contains(&self, handle: Handle<T>) -> bool {
    self.get(handle).is_some()
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Iterate live entries in slot order.
  pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
    self.slots.iter().enumerate().filter_map(|(index, slot)| {
      slot
        .value
        .as_ref()
        .map(|value| (Handle::new(index as u32, slot.generation), value))
    })
  }

  /// Remove every entry, invalidating all outstanding handles.
  pub fn drain(&mut self) -> Vec<T> {
    let mut out = Vec::with_capacity(self.len);
    for (index, slot) in self.slots.iter_mut().enumerate() {
      if let Some(value) = slot.value.take() {
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index as u32);
        out.push(value);
      }
    }
    self.len = 0;
    out
  }
}

impl<T> Index<Handle<T>> for Arena<T> {
  type Output = T;

  /// # Panics
  /// Panics on a stale handle.
  fn index(&self, handle: Handle<T>) -> &T {
    match self.get(handle) {
      Some(value) => value,
      None => panic!("stale arena handle {:?}", handle),
    }
  }
}

impl<T> IndexMut<Handle<T>> for Arena<T> {
  fn index_mut(&mut self, handle: Handle<T>) -> &mut T {
    match self.get_mut(handle) {
      Some(value) => value,
      None => panic!("stale arena handle {:?}", handle),
    }
  }
}

impl<T> Default for Arena<T> {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_insert_get_remove() {
    let mut arena = Arena::new();
    let a = arena.insert("a");
    let b = arena.insert("b");

    assert_eq!(arena.len(), 2);
    assert_eq!(arena.get(a), Some(&"a"));
    assert_eq!(arena.remove(a), Some("a"));
    assert_eq!(arena.get(a), None);
    assert_eq!(arena.get(b), Some(&"b"));
    assert_eq!(arena.len(), 1);
  }

  /// A reused slot must not answer to the old handle.
  #[test]
  fn test_stale_handle_after_reuse() {
    let mut arena = Arena::new();
    let old = arena.insert(1);
    arena.remove(old);
    let new = arena.insert(2);

    assert_eq!(old.index(), new.index());
    assert_ne!(old, new);
    assert_eq!(arena.get(old), None);
    assert_eq!(arena.remove(old), None);
    assert_eq!(arena.get(new), Some(&2));
  }

  #[test]
  fn test_insert_with_sees_own_handle() {
    let mut arena: Arena<(u32, u32)> = Arena::new();
    let handle = arena.insert_with(|h| (h.index(), h.generation()));
    assert_eq!(
      arena.get(handle),
      Some(&(handle.index(), handle.generation()))
    );
  }

  #[test]
  fn test_drain_invalidates_everything() {
    let mut arena = Arena::new();
    let handles: Vec<_> = (0..5).map(|i| arena.insert(i)).collect();

    let mut drained = arena.drain();
    drained.sort();
    assert_eq!(drained, vec![0, 1, 2, 3, 4]);
    assert!(arena.is_empty());
    assert!(handles.iter().all(|&h| !arena.contains(h)));
  }

  #[test]
  fn test_iter_skips_free_slots() {
    let mut arena = Arena::new();
    let a = arena.insert('a');
    let _b = arena.insert('b');
    arena.remove(a);

    let live: Vec<_> = arena.iter().map(|(_, v)| *v).collect();
    assert_eq!(live, vec!['b']);
  }
}
