//! NodeKey - immutable value type naming a position in the octree.
//!
//! Keys are grid coordinates at their own LOD level.
//! LOD 0 = finest detail (smallest cells), higher LOD = coarser.

use glam::IVec3;

use crate::types::Face;

/// Octree position: grid coordinates at the key's own LOD.
///
/// Coordinates count cells from the tree's world origin, so every key inside
/// the root is non-negative.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeKey {
  pub x: i32,
  pub y: i32,
  pub z: i32,
  /// Level of detail (0 = finest, higher = coarser)
  pub lod: u32,
}

impl NodeKey {
  pub fn new(x: i32, y: i32, z: i32, lod: u32) -> Self {
    Self { x, y, z, lod }
  }

  pub fn coords(&self) -> IVec3 {
    IVec3::new(self.x, self.y, self.z)
  }

  /// Get child key (finer detail: LOD - 1).
  ///
  /// Octant: 0-7 where bits represent +X, +Y, +Z offsets:
  /// - bit 0: X offset (0 or 1)
  /// - bit 1: Y offset (0 or 1)
  /// - bit 2: Z offset (0 or 1)
  ///
  /// Returns None at LOD 0.
  pub fn get_child(&self, octant: u8) -> Option<Self> {
    self.children().map(|children| children[(octant & 7) as usize])
  }

  /// All 8 children, indexed by octant. None at LOD 0.
  pub fn children(&self) -> Option<[Self; 8]> {
    if self.lod == 0 {
      return None;
    }
    Some(std::array::from_fn(|octant| Self {
      x: self.x * 2 + (octant & 1) as i32,
      y: self.y * 2 + ((octant >> 1) & 1) as i32,
      z: self.z * 2 + ((octant >> 2) & 1) as i32,
      lod: self.lod - 1,
    }))
  }

  /// Get parent key (coarser: LOD + 1). None at `max_lod`.
  pub fn get_parent(&self, max_lod: u32) -> Option<Self> {
    if self.lod >= max_lod {
      return None;
    }
    // Arithmetic shift floors, so keys left of the origin map correctly.
    Some(Self {
      x: self.x >> 1,
      y: self.y >> 1,
      z: self.z >> 1,
      lod: self.lod + 1,
    })
  }

  /// Octant of this key within its parent.
  pub fn octant(&self) -> u8 {
    ((self.x & 1) | (self.y & 1) << 1 | (self.z & 1) << 2) as u8
  }

  /// Same-LOD key across `face`.
  pub fn neighbor(&self, face: Face) -> Self {
    let c = self.coords() + face.offset();
    Self::new(c.x, c.y, c.z, self.lod)
  }

  /// True if `self` is `other` or lies inside it.
  pub fn is_within(&self, other: &NodeKey) -> bool {
    if self.lod > other.lod {
      return false;
    }
    let shift = other.lod - self.lod;
    (self.x >> shift, self.y >> shift, self.z >> shift) == (other.x, other.y, other.z)
  }
}

#[cfg(test)]
#[path = "key_test.rs"]
mod key_test;
