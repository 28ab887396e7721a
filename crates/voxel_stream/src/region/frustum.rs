//! View frustum as six inward-facing planes.

use glam::{DMat4, DVec3, DVec4};

use crate::octree::DAabb3;

/// Plane `n·p + d = 0`; points with `n·p + d >= 0` are inside.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
  pub normal: DVec3,
  pub distance: f64,
}

impl Plane {
  pub fn new(normal: DVec3, distance: f64) -> Self {
    Self { normal, distance }
  }

  fn from_row(row: DVec4) -> Self {
    let normal = row.truncate();
    let len = normal.length();
    if len > 0.0 {
      Self::new(normal / len, row.w / len)
    } else {
      Self::new(normal, row.w)
    }
  }

  #[inline]
  pub fn signed_distance(&self, point: DVec3) -> f64 {
    self.normal.dot(point) + self.distance
  }
}

/// Six clipping planes: left, right, bottom, top, near, far.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
  pub planes: [Plane; 6],
}

impl Frustum {
  pub fn new(planes: [Plane; 6]) -> Self {
    Self { planes }
  }

  /// Extract planes from a view-projection matrix (0..1 clip depth, as
  /// produced by glam's `perspective_*` constructors).
  pub fn from_view_projection(view_proj: DMat4) -> Self {
    let r0 = view_proj.row(0);
    let r1 = view_proj.row(1);
    let r2 = view_proj.row(2);
    let r3 = view_proj.row(3);
    Self::new([
      Plane::from_row(r3 + r0),
      Plane::from_row(r3 - r0),
      Plane::from_row(r3 + r1),
      Plane::from_row(r3 - r1),
      Plane::from_row(r2),
      Plane::from_row(r3 - r2),
    ])
  }

  /// Conservative AABB test: false only when the box is fully outside one
  /// plane. Uses the corner furthest along each plane normal.
  pub fn intersects_aabb(&self, aabb: &DAabb3) -> bool {
    self.planes.iter().all(|plane| {
      let p = DVec3::select(plane.normal.cmpge(DVec3::ZERO), aabb.max, aabb.min);
      plane.signed_distance(p) >= 0.0
    })
  }
}
