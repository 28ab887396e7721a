//! Region layout constants for 32³ voxel regions.
//!
//! Every Region, at every LOD, stores the same 32³ grid of material codes.
//! A Region at LOD `n` spans `32 * 2^n` world units per axis, so one of its
//! voxels covers `2^n` LOD-0 voxels.
//!
//! # Memory Layout
//!
//! ```text
//! Volume memory layout (row-major, Z innermost):
//!
//! Address:  0    1    2   ...  31   32   33  ...  1023  1024 ...
//! Content: [0,0,0][0,0,1]...[0,0,31][0,1,0]...[0,31,31][1,0,0]...
//!          └─────── Z ───────┘└─────── Z ───────┘
//! ```
//!
//! # 3D Indexing
//!
//! ```text
//! index = x << 10 | y << 5 | z
//!       = x * 1024 + y * 32 + z
//! ```
//!
//! # Boundary Layers
//!
//! A boundary layer is the 32² slice of voxels touching one face. Layers are
//! indexed by the two remaining axes in ascending axis order:
//!
//! ```text
//! face ±X: layer[y << 5 | z]
//! face ±Y: layer[x << 5 | z]
//! face ±Z: layer[x << 5 | y]
//! ```

/// Number of voxels per region axis (must be 32 for bit-shift indexing)
pub const REGION_SIZE: usize = 32;

/// Voxels in one boundary layer (32² = 1024)
pub const REGION_SIZE_SQ: usize = REGION_SIZE * REGION_SIZE;

/// Total voxels in a region (32³ = 32768)
pub const REGION_SIZE_CB: usize = REGION_SIZE * REGION_SIZE * REGION_SIZE;

/// Maximum valid voxel index per axis (31)
pub const MAX_VOXEL_INDEX: usize = REGION_SIZE - 1;

/// Bit shift for Y coordinate indexing (log2(32) = 5)
pub const Y_SHIFT: u32 = 5;

/// Bit shift for X coordinate indexing (log2(1024) = 10)
pub const X_SHIFT: u32 = 10;

/// Mask for extracting single axis from index (0x1F = 31)
pub const INDEX_MASK: usize = 0x1F;

/// Coarsest LOD the tree root sits at by default.
pub const DEFAULT_MAX_LOD: u32 = 8;

/// Number of Region widths kept at each LOD around the observer.
pub const DEFAULT_LOD_RADIUS: u32 = 2;

/// Default bound on simultaneously allocated Regions.
pub const DEFAULT_REGION_CAPACITY: usize = 16384;

/// Convert 3D coordinates to linear index using bit shifts.
///
/// Layout: X is major axis (stride 1024), Y is middle (stride 32), Z is minor
/// (stride 1)
#[inline(always)]
pub const fn coord_to_index(x: usize, y: usize, z: usize) -> usize {
  (x << X_SHIFT) | (y << Y_SHIFT) | z
}

/// Convert linear index to 3D coordinates.
#[inline(always)]
pub const fn index_to_coord(idx: usize) -> (usize, usize, usize) {
  let x = idx >> X_SHIFT;
  let y = (idx >> Y_SHIFT) & INDEX_MASK;
  let z = idx & INDEX_MASK;
  (x, y, z)
}

/// Index into a boundary layer from its two in-plane coordinates.
#[inline(always)]
pub const fn layer_index(a: usize, b: usize) -> usize {
  (a << Y_SHIFT) | b
}

#[cfg(test)]
#[path = "constants_test.rs"]
mod constants_test;
