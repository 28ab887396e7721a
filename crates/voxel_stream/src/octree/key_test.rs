use std::collections::HashSet;

use super::*;

/// Two keys with same x, y, z, lod are equal and hash together.
#[test]
fn test_key_equality_and_hash() {
  let a = NodeKey::new(1, 2, 3, 5);
  let b = NodeKey::new(1, 2, 3, 5);
  let c = NodeKey::new(1, 2, 3, 6);

  assert_eq!(a, b);
  assert_ne!(a, c);

  let set: HashSet<_> = [a, b, c].into_iter().collect();
  assert_eq!(set.len(), 2);
}

/// All 8 octants produce distinct children one LOD finer.
#[test]
fn test_get_child_all_8_octants() {
  let parent = NodeKey::new(3, 4, 5, 10);

  let children: HashSet<_> = (0u8..8)
    .map(|octant| {
      let child = parent
        .get_child(octant)
        .unwrap_or_else(|| panic!("Octant {} should return a child", octant));
      assert_eq!(child.x, parent.x * 2 + (octant & 1) as i32);
      assert_eq!(child.y, parent.y * 2 + ((octant >> 1) & 1) as i32);
      assert_eq!(child.z, parent.z * 2 + ((octant >> 2) & 1) as i32);
      assert_eq!(child.lod, 9);
      assert_eq!(child.octant(), octant);
      child
    })
    .collect();
  assert_eq!(children.len(), 8);
}

#[test]
fn test_get_child_at_lod_0_returns_none() {
  let key = NodeKey::new(100, 200, 300, 0);
  assert!((0u8..8).all(|octant| key.get_child(octant).is_none()));
}

#[test]
fn test_get_parent_at_max_lod_returns_none() {
  assert!(NodeKey::new(0, 0, 0, 15).get_parent(15).is_none());
}

/// parent(child(key, octant)) == key for every octant.
#[test]
fn test_child_parent_roundtrip() {
  let original = NodeKey::new(7, 8, 9, 10);
  for octant in 0u8..8 {
    let child = original.get_child(octant).unwrap();
    assert_eq!(child.get_parent(30), Some(original));
  }
}

/// Parents of negative coordinates floor instead of truncating.
#[test]
fn test_get_parent_floors_negative_coords() {
  let key = NodeKey::new(-1, -2, -3, 0);
  assert_eq!(key.get_parent(4), Some(NodeKey::new(-1, -1, -2, 1)));
}

#[test]
fn test_neighbor_across_faces() {
  let key = NodeKey::new(4, 5, 6, 2);
  assert_eq!(key.neighbor(Face::PosX), NodeKey::new(5, 5, 6, 2));
  assert_eq!(key.neighbor(Face::NegY), NodeKey::new(4, 4, 6, 2));
  for face in Face::ALL {
    assert_eq!(key.neighbor(face).neighbor(face.opposite()), key);
  }
}

#[test]
fn test_is_within() {
  let root = NodeKey::new(0, 0, 0, 3);
  let leaf = NodeKey::new(7, 0, 5, 0);
  assert!(leaf.is_within(&root));
  assert!(root.is_within(&root));
  assert!(!root.is_within(&leaf));
  assert!(!NodeKey::new(8, 0, 0, 0).is_within(&root));
}
