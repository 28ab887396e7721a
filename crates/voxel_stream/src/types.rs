//! Core data types for region volumes and mesh output.

use glam::IVec3;

/// Voxel material code.
///
/// A single concrete tag per voxel; `Air` is the only non-solid value.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Material {
  #[default]
  Air = 0,
  Dirt = 1,
  Grass = 2,
  Stone = 3,
}

impl Material {
  /// True for every material except `Air`.
  #[inline(always)]
  pub const fn is_solid(self) -> bool {
    !matches!(self, Material::Air)
  }

  /// Raw material id, as folded into mesh masks and packed vertices.
  #[inline(always)]
  pub const fn id(self) -> u8 {
    self as u8
  }

  /// Decode a raw material id. Unknown ids decode as `Stone`.
  pub const fn from_id(id: u8) -> Self {
    match id {
      0 => Material::Air,
      1 => Material::Dirt,
      2 => Material::Grass,
      _ => Material::Stone,
    }
  }
}

/// One of the six axis-aligned face directions.
///
/// Discriminant = `axis * 2 + positive`, so `face ^ 1` is the opposite face
/// and `face >> 1` is the axis (0 = X, 1 = Y, 2 = Z).
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Face {
  NegX = 0,
  PosX = 1,
  NegY = 2,
  PosY = 3,
  NegZ = 4,
  PosZ = 5,
}

impl Face {
  /// All faces in discriminant order.
  pub const ALL: [Face; 6] = [
    Face::NegX,
    Face::PosX,
    Face::NegY,
    Face::PosY,
    Face::NegZ,
    Face::PosZ,
  ];

  #[inline(always)]
  pub const fn index(self) -> usize {
    self as usize
  }

  /// Bit for this face in a 6-bit neighbor mask.
  #[inline(always)]
  pub const fn bit(self) -> u8 {
    1 << (self as u8)
  }

  #[inline(always)]
  pub const fn from_index(index: usize) -> Self {
    Self::ALL[index % 6]
  }

  /// Face on an axis with the given sign.
  #[inline(always)]
  pub const fn from_axis(axis: usize, positive: bool) -> Self {
    Self::from_index(axis * 2 + positive as usize)
  }

  #[inline(always)]
  pub const fn opposite(self) -> Self {
    Self::from_index(self as usize ^ 1)
  }

  #[inline(always)]
  pub const fn axis(self) -> usize {
    (self as usize) >> 1
  }

  #[inline(always)]
  pub const fn is_positive(self) -> bool {
    (self as usize) & 1 == 1
  }

  /// Unit grid offset toward the neighbor across this face.
  pub const fn offset(self) -> IVec3 {
    let s = if self.is_positive() { 1 } else { -1 };
    match self.axis() {
      0 => IVec3::new(s, 0, 0),
      1 => IVec3::new(0, s, 0),
      _ => IVec3::new(0, 0, s),
    }
  }

  /// Outward unit normal.
  pub fn normal(self) -> [f32; 3] {
    self.offset().as_vec3().to_array()
  }
}

/// Output vertex with all mesh attributes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
  /// Vertex position in region-local voxel coordinates [0, 32].
  pub position: [f32; 3],

  /// Face normal (unit, axis-aligned).
  pub normal: [f32; 3],

  /// Material of the voxel this face belongs to.
  pub material: Material,
}

impl Vertex {
  /// Compact 32-bit encoding of this vertex.
  ///
  /// Returns `None` if the normal is not axis-aligned.
  pub fn pack(&self) -> Option<PackedVertex> {
    let face = Face::ALL.into_iter().find(|f| f.normal() == self.normal)?;
    Some(PackedVertex::new(
      [
        self.position[0] as u32,
        self.position[1] as u32,
        self.position[2] as u32,
      ],
      face,
      self.material,
    ))
  }
}

/// Vertex packed into one `u32`.
///
/// ```text
/// bits  0..6   x   (0..=63)
/// bits  6..12  y   (0..=63)
/// bits 12..18  z   (0..=63)
/// bits 18..21  face
/// bits 21..29  material id
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PackedVertex(pub u32);

impl PackedVertex {
  const AXIS_BITS: u32 = 6;
  const AXIS_MASK: u32 = (1 << Self::AXIS_BITS) - 1;
  const FACE_SHIFT: u32 = 18;
  const MATERIAL_SHIFT: u32 = 21;

  pub fn new(position: [u32; 3], face: Face, material: Material) -> Self {
    debug_assert!(
      position.iter().all(|&p| p <= Self::AXIS_MASK),
      "packed vertex position out of range: {:?}",
      position
    );
    Self(
      (position[0] & Self::AXIS_MASK)
        | (position[1] & Self::AXIS_MASK) << Self::AXIS_BITS
        | (position[2] & Self::AXIS_MASK) << (2 * Self::AXIS_BITS)
        | (face as u32) << Self::FACE_SHIFT
        | (material.id() as u32) << Self::MATERIAL_SHIFT,
    )
  }

  pub fn position(self) -> [u32; 3] {
    [
      self.0 & Self::AXIS_MASK,
      (self.0 >> Self::AXIS_BITS) & Self::AXIS_MASK,
      (self.0 >> (2 * Self::AXIS_BITS)) & Self::AXIS_MASK,
    ]
  }

  pub fn face(self) -> Face {
    Face::from_index(((self.0 >> Self::FACE_SHIFT) & 0b111) as usize)
  }

  pub fn material(self) -> Material {
    Material::from_id(((self.0 >> Self::MATERIAL_SHIFT) & 0xFF) as u8)
  }
}

/// Mesh generation result.
#[derive(Clone, Debug, Default)]
pub struct MeshOutput {
  /// Four vertices per quad.
  pub vertices: Vec<Vertex>,

  /// Triangle indices (6 per quad).
  pub indices: Vec<u32>,
}

impl MeshOutput {
  pub fn new() -> Self {
    Self::default()
  }

  /// Clear all buffers, preserving capacity.
  pub fn clear(&mut self) {
    self.vertices.clear();
    self.indices.clear();
  }

  /// Returns true if no geometry was generated.
  pub fn is_empty(&self) -> bool {
    self.vertices.is_empty()
  }

  /// Number of emitted quads.
  pub fn quad_count(&self) -> usize {
    self.vertices.len() / 4
  }

  /// Number of triangles in the mesh.
  pub fn triangle_count(&self) -> usize {
    self.indices.len() / 3
  }

  /// Pack every vertex for compact upload.
  pub fn packed_vertices(&self) -> Vec<PackedVertex> {
    self.vertices.iter().filter_map(Vertex::pack).collect()
  }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
