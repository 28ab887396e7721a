//! Region lifecycle state and neighbor-ready mask.
//!
//! ```text
//! BrandNew ─► GeneratingVolume ─► CollectingNeighborRefs ─► WaitingForMeshGeneration
//!                                                                 │        ▲
//!                                                                 ▼        │ remesh
//!                                  Done ◄── GeneratingBuffers ◄── GeneratingMesh
//!                                   ▲                               │
//!                                   └──────── (no geometry) ────────┘
//! ```
//!
//! Both words are atomics shared between the main thread and workers. Every
//! transition is a compare-and-swap, so exactly one caller wins each edge.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::types::Face;

/// Lifecycle state of a Region. Ordered: later states compare greater.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegionState {
  BrandNew = 0,
  GeneratingVolume = 1,
  CollectingNeighborRefs = 2,
  WaitingForMeshGeneration = 3,
  GeneratingMesh = 4,
  GeneratingBuffers = 5,
  Done = 6,
}

impl RegionState {
  const ALL: [RegionState; 7] = [
    RegionState::BrandNew,
    RegionState::GeneratingVolume,
    RegionState::CollectingNeighborRefs,
    RegionState::WaitingForMeshGeneration,
    RegionState::GeneratingMesh,
    RegionState::GeneratingBuffers,
    RegionState::Done,
  ];

  fn from_u8(raw: u8) -> Self {
    Self::ALL[(raw as usize).min(Self::ALL.len() - 1)]
  }

  /// True for the states in which the Region owns no in-flight job.
  pub fn is_deletable(self) -> bool {
    matches!(
      self,
      RegionState::BrandNew | RegionState::GeneratingBuffers | RegionState::Done
    )
  }

  /// True once the volume is synthesized and safe to read.
  pub fn has_volume(self) -> bool {
    self >= RegionState::CollectingNeighborRefs
  }

  /// Legal edges of the lifecycle graph.
  ///
  /// Besides the forward chain: a mesh with no faces skips buffer creation,
  /// and a meshed Region may be reset for a remesh.
  pub fn can_transition(self, to: RegionState) -> bool {
    use RegionState::*;
    (to as u8 == self as u8 + 1)
      || matches!(
        (self, to),
        (GeneratingMesh, Done)
          | (GeneratingBuffers, WaitingForMeshGeneration)
          | (Done, WaitingForMeshGeneration)
      )
  }
}

/// Atomic holder for [`RegionState`].
#[derive(Debug)]
pub struct AtomicRegionState(AtomicU8);

impl AtomicRegionState {
  pub fn new(state: RegionState) -> Self {
    Self(AtomicU8::new(state as u8))
  }

  pub fn load(&self) -> RegionState {
    RegionState::from_u8(self.0.load(Ordering::SeqCst))
  }

  /// Move `from → to` if the current state is `from`.
  ///
  /// Returns false when another caller got there first.
  pub fn advance(&self, from: RegionState, to: RegionState) -> bool {
    debug_assert!(
      from.can_transition(to),
      "illegal region transition {:?} -> {:?}",
      from,
      to
    );
    self
      .0
      .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
      .is_ok()
  }
}

/// Six-bit set of faces whose neighbor is accounted for.
///
/// Bits only ever get set; a mask reaches [`NeighborMask::COMPLETE`] once.
#[derive(Debug, Default)]
pub struct NeighborMask(AtomicU8);

impl NeighborMask {
  pub const COMPLETE: u8 = 0b11_1111;

  pub fn new() -> Self {
    Self(AtomicU8::new(0))
  }

  /// Set a face bit. Returns the mask after the update.
  pub fn set(&self, face: Face) -> u8 {
    self.0.fetch_or(face.bit(), Ordering::SeqCst) | face.bit()
  }

  pub fn load(&self) -> u8 {
    self.0.load(Ordering::SeqCst)
  }

  pub fn contains(&self, face: Face) -> bool {
    self.load() & face.bit() != 0
  }

  pub fn is_complete(&self) -> bool {
    self.load() == Self::COMPLETE
  }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod state_test;
