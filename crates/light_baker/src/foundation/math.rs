//! Math utilities and types
//!
//! Provides the vector aliases and numeric helpers shared by the baking passes.

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix3, Matrix3x4, Matrix4,
    Quaternion, UnitQuaternion,
    Unit,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3D vector in double precision
pub type DVec3 = Vector3<f64>;

/// 2D integer vector type
pub type IntVec2 = Vector2<i32>;

/// 3D integer vector type
pub type IntVec3 = Vector3<i32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 3x4 matrix type
pub type Mat3x4 = Matrix3x4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Quaternion type for rotations
pub type Quat = UnitQuaternion<f32>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// 2 * Pi
    pub const TAU: f32 = 2.0 * PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Tight tolerance for exact geometric predicates
    pub const EPSILON: f32 = 0.000_001;

    /// Loose tolerance for comparisons of baked values and positions
    pub const LARGE_EPSILON: f32 = 0.000_05;

    /// Stand-in for "infinitely far"
    pub const LARGE_VALUE: f32 = 100_000_000.0;
}

/// Math utility functions
pub mod utils {
    use super::*;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Clamp a value between min and max
    pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
        if value < min { min } else if value > max { max } else { value }
    }

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Component-wise linear interpolation of colors or vectors
    pub fn lerp_vec3(a: &Vec3, b: &Vec3, t: f32) -> Vec3 {
        a + (b - a) * t
    }

    /// World-space forward axis
    pub fn forward() -> Vec3 {
        Vec3::new(0.0, 0.0, 1.0)
    }

    /// Relative luminance of a linear color
    pub fn luminance(color: &Vec3) -> f32 {
        0.2126 * color.x + 0.7152 * color.y + 0.0722 * color.z
    }

    /// Convert one linear color channel to sRGB gamma space
    pub fn linear_to_gamma_channel(value: f32) -> f32 {
        if value <= 0.003_130_8 {
            value * 12.92
        } else {
            1.055 * value.powf(1.0 / 2.4) - 0.055
        }
    }

    /// Convert one sRGB gamma channel to linear space
    pub fn gamma_to_linear_channel(value: f32) -> f32 {
        if value <= 0.040_45 {
            value / 12.92
        } else {
            ((value + 0.055) / 1.055).powf(2.4)
        }
    }

    /// Convert a linear color to sRGB gamma space
    pub fn linear_to_gamma(color: &Vec3) -> Vec3 {
        color.map(linear_to_gamma_channel)
    }

    /// Component-wise maximum with zero
    pub fn max_zero(value: &Vec3) -> Vec3 {
        value.map(|c| c.max(0.0))
    }

    /// Scale applied to position biases so that they grow with distance from the origin.
    ///
    /// Floating point precision degrades with magnitude, so positions far away need
    /// proportionally larger offsets. The scale is capped at one near the origin.
    pub fn bias_scale(position: &Vec3) -> f32 {
        position.x.abs().max(position.y.abs()).max(position.z.abs()).min(1.0)
    }

    /// Sign of each component, with zero mapped to one
    pub fn sign(value: &Vec3) -> Vec3 {
        value.map(|c| if c < 0.0 { -1.0 } else { 1.0 })
    }

    /// Build an orthonormal basis `(e1, e2)` perpendicular to the unit vector `e3`
    pub fn orthonormal_basis(e3: &Vec3) -> (Vec3, Vec3) {
        let e2 = if e3.x.abs() > e3.y.abs() {
            Vec3::new(-e3.z, 0.0, e3.x).normalize()
        } else {
            Vec3::new(0.0, e3.z, -e3.y).normalize()
        };
        let e1 = e2.cross(e3);
        (e1, e2)
    }

    /// Shortest rotation taking direction `from` onto direction `to`
    pub fn rotation_between(from: &Vec3, to: &Vec3) -> Quat {
        Quat::rotation_between(from, to).unwrap_or_else(|| {
            // Opposite directions, rotate half a turn around any perpendicular axis
            let (axis, _) = orthonormal_basis(&from.normalize());
            Quat::from_axis_angle(&Unit::new_normalize(axis), constants::PI)
        })
    }

    /// Component-wise minimum of integer vectors
    pub fn min_int_vec3(a: &IntVec3, b: &IntVec3) -> IntVec3 {
        IntVec3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z))
    }
}
