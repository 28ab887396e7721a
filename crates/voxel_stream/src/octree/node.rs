//! Arena-resident tree node.

use super::NodeKey;
use crate::arena::Handle;
use crate::region::RegionId;

pub type NodeId = Handle<OctreeNode>;

/// One octree cell. Either a leaf or exactly eight children; may hold a
/// Region at any depth (a coarse Region lingers while its children load).
#[derive(Clone, Debug)]
pub struct OctreeNode {
  pub key: NodeKey,
  pub children: Option<[NodeId; 8]>,
  pub region: Option<RegionId>,
}

impl OctreeNode {
  pub fn new(key: NodeKey) -> Self {
    Self {
      key,
      children: None,
      region: None,
    }
  }

  pub fn is_leaf(&self) -> bool {
    self.children.is_none()
  }
}
