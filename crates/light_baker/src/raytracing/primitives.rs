//! Ray and triangle primitives

use crate::foundation::math::Vec3;

/// Ray with an unnormalized direction.
///
/// Hit distances are measured in units of `direction`, so a shadow ray whose direction
/// spans the whole segment to the light uses `t` in [0, 1].
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// The origin point of the ray in world space
    pub origin: Vec3,
    /// The direction of the ray, not necessarily normalized
    pub direction: Vec3,
}

impl Ray {
    /// Creates a new ray with the given origin and direction
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Get a point along the ray at parameter t
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// A triangle in world space
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    /// First vertex
    pub v0: Vec3,
    /// Second vertex
    pub v1: Vec3,
    /// Third vertex
    pub v2: Vec3,
}

impl Triangle {
    /// Creates a new triangle
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self { v0, v1, v2 }
    }

    /// Unnormalized normal of the counter-clockwise front face
    pub fn geometric_normal(&self) -> Vec3 {
        (self.v1 - self.v0).cross(&(self.v2 - self.v0))
    }

    /// Calculates the centroid (center point) of the triangle
    pub fn centroid(&self) -> Vec3 {
        (self.v0 + self.v1 + self.v2) / 3.0
    }

    /// Radius of the sphere around the centroid that contains the triangle
    pub fn bounding_radius(&self) -> f32 {
        let centroid = self.centroid();
        (self.v0 - centroid)
            .norm()
            .max((self.v1 - centroid).norm())
            .max((self.v2 - centroid).norm())
    }

    /// Möller-Trumbore ray-triangle intersection, hitting both faces.
    ///
    /// Returns `(t, u, v)` where the hit point is `(1 - u - v)·v0 + u·v1 + v·v2`.
    /// Barycentrics are accepted with a small tolerance so rays through shared edges
    /// cannot slip between two triangles.
    pub fn intersect_ray(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<(f32, f32, f32)> {
        const EPSILON: f32 = 0.000_000_1;
        const EDGE_TOLERANCE: f32 = 0.000_01;

        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let h = ray.direction.cross(&edge2);
        let a = edge1.dot(&h);

        // Ray parallel to triangle
        if a.abs() < EPSILON * ray.direction.norm() * edge1.norm() * edge2.norm() {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin - self.v0;
        let u = f * s.dot(&h);
        if !(-EDGE_TOLERANCE..=1.0 + EDGE_TOLERANCE).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = f * ray.direction.dot(&q);
        if v < -EDGE_TOLERANCE || u + v > 1.0 + EDGE_TOLERANCE {
            return None;
        }

        let t = f * edge2.dot(&q);
        if t >= t_min && t <= t_max {
            Some((t, u, v))
        } else {
            None
        }
    }
}
