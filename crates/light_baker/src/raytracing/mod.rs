//! Ray casting against static scene geometry
//!
//! The tracing passes talk to a [`RayIntersectionService`]. [`TriangleMeshScene`] is the
//! CPU implementation used by the baker.

mod primitives;
mod service;
mod triangle_scene;

pub use primitives::{Ray, Triangle};
pub use service::{
    GeometryMask, RayFilter, RayHit, RayIntersectionService, RayQuery, RaytracerGeometry, RaytracerMaterial,
    VertexAttribute,
};
pub use triangle_scene::{create_raytracer_scene, RaytracingGeometrySource, TriangleMeshScene};
