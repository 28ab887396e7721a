use std::sync::Arc;

use super::*;

#[test]
fn test_forward_chain_is_legal() {
  use RegionState::*;
  let chain = [
    BrandNew,
    GeneratingVolume,
    CollectingNeighborRefs,
    WaitingForMeshGeneration,
    GeneratingMesh,
    GeneratingBuffers,
    Done,
  ];
  for pair in chain.windows(2) {
    assert!(pair[0].can_transition(pair[1]), "{:?}", pair);
  }
}

/// Only the empty-mesh shortcut and the explicit remesh reset leave the chain.
#[test]
fn test_shortcut_edges() {
  use RegionState::*;
  assert!(GeneratingMesh.can_transition(Done));
  assert!(Done.can_transition(WaitingForMeshGeneration));
  assert!(GeneratingBuffers.can_transition(WaitingForMeshGeneration));

  assert!(!BrandNew.can_transition(Done));
  assert!(!GeneratingVolume.can_transition(GeneratingMesh));
  assert!(!Done.can_transition(BrandNew));
  assert!(!GeneratingMesh.can_transition(WaitingForMeshGeneration));
}

#[test]
fn test_deletable_states() {
  use RegionState::*;
  let deletable: Vec<_> = RegionState::ALL
    .into_iter()
    .filter(|s| s.is_deletable())
    .collect();
  assert_eq!(deletable, vec![BrandNew, GeneratingBuffers, Done]);
}

#[test]
fn test_advance_requires_expected_state() {
  let state = AtomicRegionState::new(RegionState::BrandNew);
  assert!(!state.advance(
    RegionState::GeneratingVolume,
    RegionState::CollectingNeighborRefs
  ));
  assert_eq!(state.load(), RegionState::BrandNew);

  assert!(state.advance(RegionState::BrandNew, RegionState::GeneratingVolume));
  assert_eq!(state.load(), RegionState::GeneratingVolume);
}

/// Racing callers: exactly one wins the same edge.
#[test]
fn test_advance_has_single_winner() {
  for _ in 0..50 {
    let state = Arc::new(AtomicRegionState::new(
      RegionState::CollectingNeighborRefs,
    ));
    let handles: Vec<_> = (0..8)
      .map(|_| {
        let state = Arc::clone(&state);
        std::thread::spawn(move || {
          state.advance(
            RegionState::CollectingNeighborRefs,
            RegionState::WaitingForMeshGeneration,
          )
        })
      })
      .collect();
    let winners = handles
      .into_iter()
      .map(|h| h.join().unwrap())
      .filter(|&won| won)
      .count();
    assert_eq!(winners, 1);
  }
}

#[test]
fn test_neighbor_mask_completes_once_all_faces_set() {
  let mask = NeighborMask::new();
  for (i, face) in Face::ALL.into_iter().enumerate() {
    assert!(!mask.is_complete());
    let after = mask.set(face);
    assert_eq!(after.count_ones() as usize, i + 1);
  }
  assert!(mask.is_complete());

  // Idempotent.
  assert_eq!(mask.set(Face::PosY), NeighborMask::COMPLETE);
}
