//! voxel_stream - Engine independent voxel world streaming
//!
//! Streams a blocky voxel world around a moving observer, one 32³ Region at
//! a time, and resolves box movement against it.
//!
//! # Features
//!
//! - **LOD octree**: subdivides by Chebyshev distance to the observer,
//!   collapses only once every Region below is safe to free
//! - **Region pipeline**: volume synthesis and mesh extraction on a worker
//!   pool, gated by a per-Region neighbor bitmask
//! - **Greedy meshing**: maximal-rectangle face merging, with a naive
//!   one-quad-per-face reference
//! - **Swept collision**: slab-method AABB sweep against LOD-0 voxels, plus a
//!   DDA ray query
//!
//! # Example
//!
//! ```ignore
//! use voxel_stream::{HeadlessSink, StreamConfig, VoxelWorld, WorldParams};
//!
//! let mut world = VoxelWorld::new(StreamConfig::default(), WorldParams::default())?;
//! let mut sink = HeadlessSink::default();
//!
//! loop {
//!   world.tick(camera_position, &mut sink)?;
//!   for item in world.render_list(&frustum) {
//!     draw(item.id, item.transform);
//!   }
//! }
//! ```

pub mod arena;
pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items
pub use constants::{coord_to_index, index_to_coord, REGION_SIZE, REGION_SIZE_CB};
pub use error::{ParamsError, QueryError};
pub use types::{Face, Material, MeshOutput, PackedVertex, Vertex};

// Worker pool
pub mod scheduler;
pub use scheduler::{JobPriority, Scheduler};

// Region lifecycle and voxel storage
pub mod region;
pub use region::{Frustum, Plane, Region, RegionId, RegionState, Volume};

// Mesh extraction
pub mod mesher;
pub use mesher::{BoundaryRule, MeshMode};

// LOD octree
pub mod octree;
pub use octree::{DAabb3, NodeKey, Octree, OctreeConfig};

// Job bodies and hand-off queues
pub mod pipeline;

// Collision and ray queries
pub mod collision;
pub use collision::{BoxCollider, CollisionSettings, Contact, RayHit, VoxelQuery};

// Density functions
pub mod terrain;
pub use terrain::{DensityFn, FlatDensity, TerrainDensity, WorldParams};

// Per-tick driver
pub mod world;
pub use world::{
  BufferSink, HeadlessSink, NullSink, RenderItem, StreamConfig, TickSummary, VoxelWorld, WorldId,
  WorldStats,
};

pub mod metrics;
