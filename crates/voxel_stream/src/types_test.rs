use super::*;

// Material tests
#[test]
fn test_only_air_is_not_solid() {
  assert!(!Material::Air.is_solid());
  assert!(Material::Dirt.is_solid());
  assert!(Material::Grass.is_solid());
  assert!(Material::Stone.is_solid());
}

#[test]
fn test_material_id_roundtrip() {
  for material in [Material::Air, Material::Dirt, Material::Grass, Material::Stone] {
    assert_eq!(Material::from_id(material.id()), material);
  }
}

// Face tests
#[test]
fn test_face_opposite_is_involution() {
  for face in Face::ALL {
    assert_ne!(face, face.opposite());
    assert_eq!(face.opposite().opposite(), face);
    assert_eq!(face.axis(), face.opposite().axis());
    assert_eq!(face.offset(), -face.opposite().offset());
  }
}

#[test]
fn test_face_bits_are_distinct() {
  let mask = Face::ALL.iter().fold(0u8, |acc, f| {
    assert_eq!(acc & f.bit(), 0, "{:?} bit overlaps", f);
    acc | f.bit()
  });
  assert_eq!(mask, 0b11_1111);
}

#[test]
fn test_face_from_axis() {
  assert_eq!(Face::from_axis(0, true), Face::PosX);
  assert_eq!(Face::from_axis(1, false), Face::NegY);
  assert_eq!(Face::from_axis(2, true), Face::PosZ);
}

// Packed vertex tests
#[test]
fn test_packed_vertex_fields() {
  let packed = PackedVertex::new([32, 0, 17], Face::NegZ, Material::Grass);
  assert_eq!(packed.position(), [32, 0, 17]);
  assert_eq!(packed.face(), Face::NegZ);
  assert_eq!(packed.material(), Material::Grass);
}

/// Maximum field values must not bleed into neighboring fields.
#[test]
fn test_packed_vertex_field_isolation() {
  let packed = PackedVertex::new([63, 63, 63], Face::PosZ, Material::Stone);
  assert_eq!(packed.position(), [63, 63, 63]);
  assert_eq!(packed.face(), Face::PosZ);
  assert_eq!(packed.material(), Material::Stone);
  assert!(packed.0 < 1 << 29);
}

#[test]
fn test_vertex_pack_uses_normal_as_face() {
  let vertex = Vertex {
    position: [1.0, 2.0, 3.0],
    normal: Face::PosY.normal(),
    material: Material::Dirt,
  };
  let packed = vertex.pack().expect("axis-aligned normal packs");
  assert_eq!(packed.face(), Face::PosY);
  assert_eq!(packed.position(), [1, 2, 3]);
}

#[test]
fn test_mesh_output_counts() {
  let mut output = MeshOutput::new();
  assert!(output.is_empty());

  let v = Vertex {
    position: [0.0; 3],
    normal: Face::PosX.normal(),
    material: Material::Stone,
  };
  output.vertices.extend([v; 4]);
  output.indices.extend([0, 1, 2, 0, 2, 3]);
  assert_eq!(output.quad_count(), 1);
  assert_eq!(output.triangle_count(), 2);

  output.clear();
  assert!(output.is_empty());
}
