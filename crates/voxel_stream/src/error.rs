//! Recoverable error types.
//!
//! Scheduling bugs (meshing before neighbors are ready, illegal lifecycle
//! transitions) are debug assertions, and an exhausted Region pool panics.
//! Only conditions a caller can act on are represented here.

use glam::{DVec3, IVec3};
use thiserror::Error;

/// A voxel query landed outside resolved, full-resolution space.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum QueryError {
  /// No Region currently covers the position.
  #[error("no region covers voxel {0}")]
  OutOfRange(IVec3),

  /// The covering Region has no mesh yet.
  #[error("region covering voxel {0} is not resolved yet")]
  Unresolved(IVec3),

  /// The covering Region is not at LOD 0.
  #[error("region covering voxel {voxel} is at lod {lod}, collision needs lod 0")]
  CoarseLod { voxel: IVec3, lod: u32 },
}

impl QueryError {
  /// Voxel coordinate the query failed at.
  pub fn voxel(&self) -> IVec3 {
    match *self {
      QueryError::OutOfRange(v) | QueryError::Unresolved(v) => v,
      QueryError::CoarseLod { voxel, .. } => voxel,
    }
  }
}

/// Invalid world-generation or streaming parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamsError {
  #[error("{name} must be finite, got {value}")]
  NotFinite { name: &'static str, value: f64 },

  #[error("{name} must be within {min}..={max}, got {value}")]
  OutOfRange {
    name: &'static str,
    value: f64,
    min: f64,
    max: f64,
  },

  #[error("observer position {0} is not finite")]
  InvalidObserver(DVec3),
}
