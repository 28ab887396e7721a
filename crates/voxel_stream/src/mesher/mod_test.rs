use std::collections::BTreeSet;

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;
use crate::constants::{coord_to_index, REGION_SIZE_CB, REGION_SIZE_SQ};

const SOLIDS: [Material; 3] = [Material::Dirt, Material::Grass, Material::Stone];

/// (face, plane, u, v, material) for every unit face a mesh covers.
type FaceCell = (u8, i32, i32, i32, u8);

fn rasterize(mesh: &MeshOutput) -> BTreeSet<FaceCell> {
  let mut cells = BTreeSet::new();
  for quad in mesh.vertices.chunks_exact(4) {
    let face = Face::ALL
      .into_iter()
      .find(|f| f.normal() == quad[0].normal)
      .expect("axis-aligned normal");
    let d = face.axis();
    let (u, v) = ((d + 1) % 3, (d + 2) % 3);
    let plane = quad[0].position[d] as i32;
    let lo = |axis: usize| quad.iter().map(|p| p.position[axis] as i32).min().unwrap();
    let hi = |axis: usize| quad.iter().map(|p| p.position[axis] as i32).max().unwrap();
    for a in lo(u)..hi(u) {
      for b in lo(v)..hi(v) {
        let fresh = cells.insert((face as u8, plane, a, b, quad[0].material.id()));
        assert!(fresh, "face cell covered twice");
      }
    }
  }
  cells
}

fn dense(fill: impl Fn(usize, usize, usize) -> Material) -> Volume {
  let mut voxels = vec![Material::Air; REGION_SIZE_CB].into_boxed_slice();
  for x in 0..REGION_SIZE {
    for y in 0..REGION_SIZE {
      for z in 0..REGION_SIZE {
        voxels[coord_to_index(x, y, z)] = fill(x, y, z);
      }
    }
  }
  Volume::from_dense(voxels)
}

fn random_volume(rng: &mut StdRng, density: f64) -> Volume {
  let mut voxels = vec![Material::Air; REGION_SIZE_CB].into_boxed_slice();
  for voxel in voxels.iter_mut() {
    if rng.random_bool(density) {
      *voxel = SOLIDS[rng.random_range(0..SOLIDS.len())];
    }
  }
  Volume::from_dense(voxels)
}

fn random_neighborhood(rng: &mut StdRng) -> Neighborhood {
  let mut neighborhood = Neighborhood::uniform(Material::Air);
  for face in Face::ALL {
    let layer = match rng.random_range(0..3) {
      0 => BoundaryLayer::Uniform(Material::Air),
      1 => BoundaryLayer::Uniform(Material::Stone),
      _ => BoundaryLayer::Layer(
        (0..REGION_SIZE_SQ)
          .map(|_| {
            if rng.random_bool(0.5) {
              Material::Dirt
            } else {
              Material::Air
            }
          })
          .collect(),
      ),
    };
    neighborhood.set(face, layer);
  }
  neighborhood
}

fn single_voxel() -> Volume {
  let mut volume = Volume::Uniform(Material::Air);
  volume.set(5, 6, 7, Material::Grass);
  volume
}

#[test]
fn test_empty_volume_has_no_faces() {
  let air = Neighborhood::uniform(Material::Air);
  for mode in [MeshMode::Greedy, MeshMode::Naive] {
    assert!(generate(&Volume::Uniform(Material::Air), &air, mode).is_empty());
  }
}

/// One isolated voxel: six unit quads in either mode.
#[test]
fn test_single_voxel_six_quads() {
  let air = Neighborhood::uniform(Material::Air);
  for mode in [MeshMode::Greedy, MeshMode::Naive] {
    let mesh = generate(&single_voxel(), &air, mode);
    assert_eq!(mesh.quad_count(), 6, "{:?}", mode);
    assert_eq!(mesh.vertices.len(), 24);
    assert_eq!(mesh.indices.len(), 36);
    assert!(mesh.vertices.iter().all(|v| v.material == Material::Grass));
  }
}

/// A full block against air merges each side into one quad.
#[test]
fn test_full_block_greedy_merges_sides() {
  let block = Volume::Uniform(Material::Stone);
  let air = Neighborhood::uniform(Material::Air);

  let greedy = generate(&block, &air, MeshMode::Greedy);
  let naive = generate(&block, &air, MeshMode::Naive);
  assert_eq!(greedy.quad_count(), 6);
  assert_eq!(naive.quad_count(), 6 * REGION_SIZE_SQ);
  assert_eq!(rasterize(&greedy), rasterize(&naive));
}

/// Solid outside on every face: a full block has nothing to show.
#[test]
fn test_full_block_with_solid_neighbors_has_no_faces() {
  let block = Volume::Uniform(Material::Stone);
  let solid = Neighborhood::uniform(BoundaryRule::Solid.fill());
  assert!(generate(&block, &solid, MeshMode::Greedy).is_empty());
  assert!(generate(&block, &solid, MeshMode::Naive).is_empty());
}

/// Faces whose solid voxel lies in the neighbor are never emitted.
#[test]
fn test_neighbor_owned_faces_are_skipped() {
  let mut volume = Volume::Uniform(Material::Air);
  volume.set(20, 20, 20, Material::Dirt);

  let mut neighborhood = Neighborhood::uniform(Material::Air);
  neighborhood.set(Face::NegX, BoundaryLayer::Uniform(Material::Stone));

  let mesh = generate(&volume, &neighborhood, MeshMode::Greedy);
  assert_eq!(mesh.quad_count(), 6);
  assert!(mesh
    .vertices
    .iter()
    .all(|v| v.position[0] > 0.0 || v.normal != Face::PosX.normal()));
}

/// Boundary voxels face outward only where the neighbor is empty.
#[test]
fn test_boundary_faces_follow_neighbor_layer() {
  let slab = dense(|x, _, _| if x == 0 { Material::Dirt } else { Material::Air });

  let mut layer = vec![Material::Stone; REGION_SIZE_SQ].into_boxed_slice();
  // One hole in the neighbor's +X layer at (y=3, z=4).
  layer[crate::constants::layer_index(3, 4)] = Material::Air;
  let mut neighborhood = Neighborhood::uniform(Material::Air);
  neighborhood.set(Face::NegX, BoundaryLayer::Layer(layer));

  let mesh = generate(&slab, &neighborhood, MeshMode::Greedy);
  let neg_x: Vec<_> = rasterize(&mesh)
    .into_iter()
    .filter(|c| c.0 == Face::NegX as u8)
    .collect();
  assert_eq!(neg_x, vec![(Face::NegX as u8, 0, 3, 4, Material::Dirt.id())]);
}

/// Different materials on one plane never merge.
#[test]
fn test_greedy_respects_material_boundaries() {
  let striped = dense(|x, y, _| {
    if y != 0 {
      Material::Air
    } else if x < 16 {
      Material::Grass
    } else {
      Material::Dirt
    }
  });
  let air = Neighborhood::uniform(Material::Air);
  let mesh = generate(&striped, &air, MeshMode::Greedy);

  let top: Vec<_> = mesh
    .vertices
    .chunks_exact(4)
    .filter(|q| q[0].normal == Face::PosY.normal())
    .collect();
  assert_eq!(top.len(), 2);
  assert_ne!(top[0][0].material, top[1][0].material);
}

/// Triangles wind counter-clockwise seen from outside.
#[test]
fn test_winding_matches_normals() {
  let mut rng = StdRng::seed_from_u64(7);
  let volume = random_volume(&mut rng, 0.2);
  let air = Neighborhood::uniform(Material::Air);

  for mode in [MeshMode::Greedy, MeshMode::Naive] {
    let mesh = generate(&volume, &air, mode);
    for tri in mesh.indices.chunks_exact(3) {
      let p = |k: usize| Vec3::from(mesh.vertices[tri[k] as usize].position);
      let n = (p(1) - p(0)).cross(p(2) - p(0));
      let normal = Vec3::from(mesh.vertices[tri[0] as usize].normal);
      assert!(n.dot(normal) > 0.0, "{:?} triangle faces inward", mode);
    }
  }
}

/// Greedy and naive cover exactly the same face cells with the same
/// materials, across random volumes and neighborhoods.
#[test]
fn test_greedy_equals_naive_on_random_grids() {
  let mut rng = StdRng::seed_from_u64(0x5EED);
  for round in 0..12 {
    let density = [0.05, 0.3, 0.6, 0.95][round % 4];
    let volume = random_volume(&mut rng, density);
    let neighborhood = random_neighborhood(&mut rng);

    let greedy = generate(&volume, &neighborhood, MeshMode::Greedy);
    let naive = generate(&volume, &neighborhood, MeshMode::Naive);

    assert_eq!(
      rasterize(&greedy),
      rasterize(&naive),
      "round {} density {}",
      round,
      density
    );
    assert!(greedy.quad_count() <= naive.quad_count());
  }
}

#[test]
fn test_vertices_fit_packed_format() {
  let mut rng = StdRng::seed_from_u64(3);
  let volume = random_volume(&mut rng, 0.5);
  let mesh = generate(&volume, &Neighborhood::uniform(Material::Air), MeshMode::Greedy);
  assert_eq!(mesh.packed_vertices().len(), mesh.vertices.len());
  assert!(mesh
    .vertices
    .iter()
    .flat_map(|v| v.position)
    .all(|c| (0.0..=REGION_SIZE as f32).contains(&c)));
}
