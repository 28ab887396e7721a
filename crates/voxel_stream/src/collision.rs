//! Swept AABB collision and ray queries against full-resolution voxels.
//!
//! Both run on the main thread against whatever is resident, through the
//! [`VoxelQuery`] trait. A query that lands on an unresolved or coarse Region
//! aborts the whole operation: [`resolve`] then leaves the collider exactly
//! as it was, and [`raycast`] reports no hit.
//!
//! ```text
//!   start ┌──┐              swept box = start ∪ target, padded by 1 voxel
//!         │  │ ──v·dt──▶ ┌──┐
//!         └──┘    ▓▓     │  │  every solid voxel inside is slab-tested;
//!                 ▓▓     └──┘  the earliest entry time wins
//! ```

use glam::{DVec3, IVec3};

use crate::error::QueryError;
use crate::octree::DAabb3;
use crate::types::Material;

/// Read access to LOD-0 voxels by global voxel coordinate.
pub trait VoxelQuery {
  /// Material of voxel `voxel`, or why it cannot be read.
  fn voxel(&self, voxel: IVec3) -> Result<Material, QueryError>;

  /// World size of one voxel.
  fn voxel_size(&self) -> f64;
}

/// An axis-aligned box moved by [`resolve`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxCollider {
  pub center: DVec3,
  pub half_extents: DVec3,
  pub velocity: DVec3,
  /// Per axis, the side of the box resting against a surface: -1, +1, or 0.
  /// Velocity into a contact side is suppressed until the box separates.
  pub contact: IVec3,
}

impl BoxCollider {
  pub fn new(center: DVec3, size: DVec3) -> Self {
    Self {
      center,
      half_extents: size * 0.5,
      velocity: DVec3::ZERO,
      contact: IVec3::ZERO,
    }
  }

  pub fn bounds(&self) -> DAabb3 {
    DAabb3::from_center_half_extents(self.center, self.half_extents)
  }

  /// Resting on a surface below.
  pub fn is_grounded(&self) -> bool {
    self.contact.y < 0
  }

  pub fn is_sliding(&self, axis: usize) -> bool {
    self.contact[axis] != 0
  }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionSettings {
  /// Downward acceleration, world units per second squared.
  pub gravity: f64,
  /// Sweeps per resolve; each contact consumes one.
  pub max_iterations: usize,
}

impl Default for CollisionSettings {
  fn default() -> Self {
    Self {
      gravity: 18.0,
      max_iterations: 3,
    }
  }
}

/// First contact of a swept box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
  /// Fraction of the displacement travelled before touching, in `[0, 1]`.
  pub time: f64,
  /// Contact axis (0 = x, 1 = y, 2 = z).
  pub axis: usize,
  /// Surface normal, pointing back at the moving box.
  pub normal: IVec3,
  /// Coordinate of the touched plane along `axis`.
  pub plane: f64,
}

/// Penetration tolerated before a contact is dismissed as already inside.
const CONTACT_EPSILON: f64 = 1e-9;

/// Slab test of `moving` displaced by `displacement` against static `target`.
///
/// Returns the entry time if the boxes start touching within the
/// displacement. Faces merely touching on an axis with no motion are
/// separated. Equal entry times on several axes resolve to the lowest axis.
pub fn sweep_aabb(moving: &DAabb3, displacement: DVec3, target: &DAabb3) -> Option<Contact> {
  let mut t_entry = f64::NEG_INFINITY;
  let mut t_exit = f64::INFINITY;
  let mut hit_axis = None;

  for axis in 0..3 {
    let d = displacement[axis];
    if d == 0.0 {
      if moving.max[axis] <= target.min[axis] || moving.min[axis] >= target.max[axis] {
        return None;
      }
      continue;
    }

    let (enter, exit) = if d > 0.0 {
      (target.min[axis] - moving.max[axis], target.max[axis] - moving.min[axis])
    } else {
      (target.max[axis] - moving.min[axis], target.min[axis] - moving.max[axis])
    };
    let (t0, t1) = (enter / d, exit / d);
    if t0 > t_entry {
      t_entry = t0;
      hit_axis = Some(axis);
    }
    t_exit = t_exit.min(t1);
  }

  let axis = hit_axis?;
  if t_entry >= t_exit || t_entry < -CONTACT_EPSILON || t_entry > 1.0 {
    return None;
  }

  let mut normal = IVec3::ZERO;
  let plane = if displacement[axis] > 0.0 {
    normal[axis] = -1;
    target.min[axis]
  } else {
    normal[axis] = 1;
    target.max[axis]
  };
  Some(Contact {
    time: t_entry.max(0.0),
    axis,
    normal,
    plane,
  })
}

/// Earlier time wins; ties go to the lower axis.
fn is_earlier(candidate: &Contact, current: &Contact) -> bool {
  candidate.time < current.time || (candidate.time == current.time && candidate.axis < current.axis)
}

fn voxel_box(voxel: IVec3, voxel_size: f64) -> DAabb3 {
  let min = voxel.as_dvec3() * voxel_size;
  DAabb3::new(min, min + DVec3::splat(voxel_size))
}

/// Integer voxel range covering `bounds`, inclusive.
fn voxel_range(bounds: &DAabb3, voxel_size: f64) -> (IVec3, IVec3) {
  let min = (bounds.min / voxel_size).floor().as_ivec3();
  let max = (bounds.max / voxel_size).floor().as_ivec3();
  (min, max)
}

/// Earliest contact of `bounds` moving by `displacement` against any solid
/// voxel near the path.
fn first_contact<Q: VoxelQuery + ?Sized>(
  world: &Q,
  bounds: &DAabb3,
  displacement: DVec3,
) -> Result<Option<Contact>, QueryError> {
  let voxel_size = world.voxel_size();
  let swept = bounds
    .union(&bounds.translated(displacement))
    .expanded(voxel_size);
  let (min, max) = voxel_range(&swept, voxel_size);

  let mut first: Option<Contact> = None;
  for z in min.z..=max.z {
    for y in min.y..=max.y {
      for x in min.x..=max.x {
        let voxel = IVec3::new(x, y, z);
        if !world.voxel(voxel)?.is_solid() {
          continue;
        }
        if let Some(contact) = sweep_aabb(bounds, displacement, &voxel_box(voxel, voxel_size)) {
          if first.map_or(true, |current| is_earlier(&contact, &current)) {
            first = Some(contact);
          }
        }
      }
    }
  }
  Ok(first)
}

/// Keep a contact only while the box still touches a solid voxel there.
fn still_touching<Q: VoxelQuery + ?Sized>(
  world: &Q,
  collider: &BoxCollider,
  axis: usize,
) -> Result<bool, QueryError> {
  let voxel_size = world.voxel_size();
  let bounds = collider.bounds();
  let side = collider.contact[axis];
  let edge = if side < 0 {
    bounds.min[axis]
  } else {
    bounds.max[axis]
  };
  let face = edge / voxel_size;
  if (face - face.round()).abs() > 1e-6 {
    return Ok(false);
  }

  let layer = face.round() as i32 + if side < 0 { -1 } else { 0 };
  let (mut min, mut max) = voxel_range(&bounds, voxel_size);
  // Voxels ending exactly at the box edge only touch it.
  let upper = (bounds.max / voxel_size).ceil().as_ivec3() - IVec3::ONE;
  max = max.min(upper);
  min[axis] = layer;
  max[axis] = layer;

  for z in min.z..=max.z {
    for y in min.y..=max.y {
      for x in min.x..=max.x {
        if world.voxel(IVec3::new(x, y, z))?.is_solid() {
          return Ok(true);
        }
      }
    }
  }
  Ok(false)
}

/// Advance `collider` by one tick of `dt` seconds.
///
/// Applies gravity unless grounded, sweeps up to `max_iterations` times,
/// stops exactly at each contact, zeroes velocity on the contact axis and
/// slides along the rest. Returns the contacts in order.
///
/// On error nothing is applied.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "collision::resolve"))]
pub fn resolve<Q: VoxelQuery + ?Sized>(
  collider: &mut BoxCollider,
  dt: f64,
  world: &Q,
  settings: &CollisionSettings,
) -> Result<Vec<Contact>, QueryError> {
  let mut next = *collider;

  for axis in 0..3 {
    if next.contact[axis] != 0 && !still_touching(world, &next, axis)? {
      next.contact[axis] = 0;
    }
  }

  if !next.is_grounded() {
    next.velocity.y -= settings.gravity * dt;
  }
  for axis in 0..3 {
    if next.velocity[axis] * next.contact[axis] as f64 > 0.0 {
      next.velocity[axis] = 0.0;
    }
  }

  let mut contacts = Vec::new();
  let mut remaining = 1.0;
  for _ in 0..settings.max_iterations {
    let displacement = next.velocity * dt * remaining;
    if displacement == DVec3::ZERO {
      break;
    }

    match first_contact(world, &next.bounds(), displacement)? {
      None => {
        next.center += displacement;
        break;
      }
      Some(contact) => {
        let axis = contact.axis;
        next.center += displacement * contact.time;
        next.center[axis] = contact.plane + contact.normal[axis] as f64 * next.half_extents[axis];
        next.velocity[axis] = 0.0;
        next.contact[axis] = -contact.normal[axis];
        remaining *= 1.0 - contact.time;
        contacts.push(contact);
      }
    }
  }

  *collider = next;
  Ok(contacts)
}

/// First solid voxel hit by a ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
  pub voxel: IVec3,
  /// Face normal of the entered side. Zero if the ray starts inside.
  pub normal: IVec3,
  /// World distance from the ray origin to the entry point.
  pub distance: f64,
  pub material: Material,
}

/// Walk voxels along a ray (3D DDA) up to `max_distance`.
///
/// Returns None on a miss, or as soon as the ray reaches a voxel that
/// cannot be read.
pub fn raycast<Q: VoxelQuery + ?Sized>(
  world: &Q,
  origin: DVec3,
  direction: DVec3,
  max_distance: f64,
) -> Option<RayHit> {
  let direction = direction.try_normalize()?;
  if !origin.is_finite() || max_distance.is_nan() || max_distance < 0.0 {
    return None;
  }
  let voxel_size = world.voxel_size();
  let start = origin / voxel_size;
  let max_t = max_distance / voxel_size;

  let mut voxel = start.floor().as_ivec3();
  let step = IVec3::new(
    if direction.x >= 0.0 { 1 } else { -1 },
    if direction.y >= 0.0 { 1 } else { -1 },
    if direction.z >= 0.0 { 1 } else { -1 },
  );

  // Ray parameter (in voxel units) per voxel crossed, and to the first
  // boundary on each axis.
  let mut t_delta = DVec3::ZERO;
  let mut t_max = DVec3::ZERO;
  for axis in 0..3 {
    let d = direction[axis];
    if d.abs() < 1e-12 {
      t_delta[axis] = f64::INFINITY;
      t_max[axis] = f64::INFINITY;
    } else {
      t_delta[axis] = (1.0 / d).abs();
      let boundary = if d > 0.0 {
        voxel[axis] as f64 + 1.0
      } else {
        voxel[axis] as f64
      };
      t_max[axis] = (boundary - start[axis]) / d;
    }
  }

  let mut t = 0.0;
  let mut normal = IVec3::ZERO;
  while t <= max_t {
    let material = world.voxel(voxel).ok()?;
    if material.is_solid() {
      return Some(RayHit {
        voxel,
        normal,
        distance: t * voxel_size,
        material,
      });
    }

    let axis = if t_max.x < t_max.y {
      if t_max.x < t_max.z {
        0
      } else {
        2
      }
    } else if t_max.y < t_max.z {
      1
    } else {
      2
    };
    t = t_max[axis];
    t_max[axis] += t_delta[axis];
    voxel[axis] += step[axis];
    normal = IVec3::ZERO;
    normal[axis] = -step[axis];
  }
  None
}

#[cfg(test)]
#[path = "collision_test.rs"]
mod collision_test;
