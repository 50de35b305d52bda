//! Convex volumes bounded by planes
//!
//! The baker only needs orthographic volumes: the region a directional light sweeps
//! through on its way to a chunk.

use crate::foundation::math::{utils, Vec3};

use super::AABB;

/// Plane defined by normal and distance from origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Normal vector (should be normalized)
    pub normal: Vec3,
    /// Distance from origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Create a new plane from normal and distance
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal: normal.normalize(), distance }
    }

    /// Plane through `point` facing `normal`
    pub fn from_normal_point(normal: Vec3, point: &Vec3) -> Self {
        let normal = normal.normalize();
        Self { normal, distance: -normal.dot(point) }
    }

    /// Calculate signed distance from plane to point
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }
}

/// Convex volume, inside is the positive side of every plane
#[derive(Debug, Clone)]
pub struct Frustum {
    /// Six planes defining the volume
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Create a frustum from six planes
    pub fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Volume swept by `bounds` moving `distance` units toward a directional light.
    ///
    /// `light_direction` is the direction light travels in. The result is an oriented
    /// box aligned with the light that covers the chunk and everything between the
    /// chunk and the light up to the given distance.
    pub fn from_light_extrusion(bounds: &AABB, light_direction: &Vec3, distance: f32) -> Self {
        let axis = light_direction.normalize();
        let (e1, e2) = utils::orthonormal_basis(&axis);

        let mut min = Vec3::repeat(f32::INFINITY);
        let mut max = Vec3::repeat(f32::NEG_INFINITY);
        for corner in bounds.corners() {
            let projected = Vec3::new(corner.dot(&e1), corner.dot(&e2), corner.dot(&axis));
            min = min.inf(&projected);
            max = max.sup(&projected);
        }
        // Extend toward the light, i.e. against the direction light travels
        min.z -= distance.max(0.0);

        Self::new([
            Plane { normal: e1, distance: -min.x },
            Plane { normal: -e1, distance: max.x },
            Plane { normal: e2, distance: -min.y },
            Plane { normal: -e2, distance: max.y },
            Plane { normal: axis, distance: -min.z },
            Plane { normal: -axis, distance: max.z },
        ])
    }

    /// Check if a point is inside the frustum
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance_to_point(point) >= 0.0)
    }

    /// Check if an AABB is inside or intersects the frustum
    pub fn intersects_aabb(&self, aabb: &AABB) -> bool {
        for plane in &self.planes {
            // Corner furthest along the plane normal
            let mut p = aabb.min;
            if plane.normal.x >= 0.0 { p.x = aabb.max.x; }
            if plane.normal.y >= 0.0 { p.y = aabb.max.y; }
            if plane.normal.z >= 0.0 { p.z = aabb.max.z; }

            if plane.distance_to_point(p) < 0.0 {
                return false;
            }
        }
        true
    }
}
