//! Spatial data structures
//!
//! Bounding volumes, chunk addressing for incremental baking, an octree for ray
//! queries and the tetrahedral mesh used to interpolate light probes.

mod aabb;
mod chunk;
mod frustum;
mod octree;
pub mod tetrahedral_mesh;

pub use aabb::AABB;
pub use chunk::{chunk_bounding_box, chunk_of_position, sort_chunks, swizzle, ChunkIndex};
pub use frustum::{Frustum, Plane};
pub use octree::{Octree, OctreeConfig, OctreeItem, OctreeNode};
pub use tetrahedral_mesh::{TetrahedralMesh, Tetrahedron};
