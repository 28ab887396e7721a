//! Double-precision boxes for node extents, Region bounds and colliders.

use glam::DVec3;

/// Axis-aligned box, `min` and `max` both inclusive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DAabb3 {
  pub min: DVec3,
  pub max: DVec3,
}

impl DAabb3 {
  /// # Panics
  /// Debug builds panic when `min` exceeds `max` on any axis.
  pub fn new(min: DVec3, max: DVec3) -> Self {
    debug_assert!(min.cmple(max).all(), "inverted box {} .. {}", min, max);
    Self { min, max }
  }

  pub fn from_center_half_extents(center: DVec3, half_extents: DVec3) -> Self {
    Self::new(center - half_extents, center + half_extents)
  }

  /// Shared volume. Boxes that only touch along a face do not overlap.
  #[inline]
  pub fn overlaps_interior(&self, other: &DAabb3) -> bool {
    self.min.cmplt(other.max).all() && other.min.cmplt(self.max).all()
  }

  #[inline]
  pub fn contains_point(&self, point: DVec3) -> bool {
    self.min.cmple(point).all() && point.cmple(self.max).all()
  }

  /// Smallest box holding both. The swept volume of a moving collider.
  #[inline]
  pub fn union(&self, other: &DAabb3) -> DAabb3 {
    Self {
      min: self.min.min(other.min),
      max: self.max.max(other.max),
    }
  }

  #[inline]
  pub fn translated(&self, offset: DVec3) -> DAabb3 {
    Self {
      min: self.min + offset,
      max: self.max + offset,
    }
  }

  /// Grown by `padding` on all six sides.
  #[inline]
  pub fn expanded(&self, padding: f64) -> DAabb3 {
    Self {
      min: self.min - padding,
      max: self.max + padding,
    }
  }

  #[inline]
  pub fn size(&self) -> DVec3 {
    self.max - self.min
  }

  #[inline]
  pub fn center(&self) -> DVec3 {
    (self.min + self.max) * 0.5
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn unit_at(x: f64, y: f64, z: f64) -> DAabb3 {
    let min = DVec3::new(x, y, z);
    DAabb3::new(min, min + DVec3::ONE)
  }

  /// Neighboring voxels share a face but no volume.
  #[test]
  fn test_adjacent_voxels_do_not_overlap() {
    let a = unit_at(0.0, 0.0, 0.0);
    assert!(!a.overlaps_interior(&unit_at(1.0, 0.0, 0.0)));
    assert!(!a.overlaps_interior(&unit_at(0.0, -1.0, 0.0)));
    assert!(!a.overlaps_interior(&unit_at(1.0, 1.0, 1.0)));
  }

  #[test]
  fn test_overlap_is_symmetric() {
    let region = DAabb3::new(DVec3::ZERO, DVec3::splat(32.0));
    let collider = DAabb3::from_center_half_extents(DVec3::new(32.0, 4.0, 4.0), DVec3::splat(0.5));
    assert!(region.overlaps_interior(&collider));
    assert!(collider.overlaps_interior(&region));
  }

  #[test]
  fn test_contains_point_is_inclusive() {
    let region = DAabb3::new(DVec3::ZERO, DVec3::splat(32.0));
    assert!(region.contains_point(DVec3::ZERO));
    assert!(region.contains_point(DVec3::splat(32.0)));
    assert!(!region.contains_point(DVec3::new(16.0, -0.001, 16.0)));
  }

  /// Swept box of a collider falling two units, padded by one voxel.
  #[test]
  fn test_swept_bounds() {
    let start = DAabb3::from_center_half_extents(DVec3::new(0.5, 5.0, 0.5), DVec3::splat(0.5));
    let swept = start.union(&start.translated(DVec3::new(0.0, -2.0, 0.0)));
    assert_eq!(swept.min, DVec3::new(0.0, 2.5, 0.0));
    assert_eq!(swept.max, DVec3::new(1.0, 5.5, 1.0));

    let padded = swept.expanded(1.0);
    assert_eq!(padded.size(), DVec3::new(3.0, 5.0, 3.0));
    assert_eq!(padded.center(), swept.center());
  }
}
