//! Lights as seen by the baker
//!
//! Three light types are supported, matching the classic real-time set:
//! - **Directional**: parallel rays from an infinitely distant source (sun)
//! - **Point**: omnidirectional light with a finite range
//! - **Spot**: a cone of light with a finite range
//!
//! Every light may have a physical size (disk radius or angular diameter) which turns
//! hard shadows into soft ones at the cost of more samples.

use serde::{Deserialize, Serialize};

use crate::foundation::math::{utils, Quat, Vec3};
use crate::spatial::AABB;

/// Types of lights supported by the baker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightType {
    /// Parallel light rays (like sunlight)
    Directional,
    /// Light radiating from a point
    Point,
    /// Cone of light from a point
    Spot,
}

/// How a light participates in baking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightMode {
    /// Rendered at runtime only. Still contributes bounced light.
    Realtime,
    /// Direct light at runtime, bounced light baked
    Mixed,
    /// Direct and bounced light both baked
    Baked,
}

/// Light description consumed by the tracing passes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BakedLight {
    /// Type of light
    pub light_type: LightType,
    /// Baking mode
    pub light_mode: LightMode,
    /// Linear color multiplied by intensity
    pub color: Vec3,
    /// Multiplier of this light in bounced lighting
    pub indirect_brightness: f32,
    /// World position (unused for directional lights)
    pub position: Vec3,
    /// World rotation, the light shines along its local forward axis
    pub rotation: Quat,
    /// Normalized world direction the light shines toward
    pub direction: Vec3,
    /// Attenuation range of point and spot lights
    pub distance: f32,
    /// Emitter disk radius of point and spot lights
    pub radius: f32,
    /// Angular diameter of directional lights in radians
    pub angle: f32,
    /// Tangent of half of `angle`
    pub half_angle_tan: f32,
    /// Cosine of the spot cone half angle
    pub cutoff: f32,
    /// Bit mask matched against geometry and probe light masks
    pub light_mask: u32,
}

impl BakedLight {
    fn base(light_type: LightType, color: Vec3) -> Self {
        Self {
            light_type,
            light_mode: LightMode::Baked,
            color,
            indirect_brightness: 1.0,
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            direction: utils::forward(),
            distance: 0.0,
            radius: 0.0,
            angle: 0.0,
            half_angle_tan: 0.0,
            cutoff: 0.0,
            light_mask: u32::MAX,
        }
    }

    /// Create a directional light shining along `direction`
    pub fn directional(direction: Vec3, color: Vec3) -> Self {
        let mut light = Self::base(LightType::Directional, color);
        light.set_direction(&direction);
        light
    }

    /// Create a point light
    pub fn point(position: Vec3, color: Vec3, range: f32) -> Self {
        let mut light = Self::base(LightType::Point, color);
        light.position = position;
        light.distance = range;
        light
    }

    /// Create a spot light with the full cone angle in degrees
    pub fn spot(position: Vec3, direction: Vec3, color: Vec3, range: f32, fov_degrees: f32) -> Self {
        let mut light = Self::base(LightType::Spot, color);
        light.position = position;
        light.distance = range;
        light.cutoff = utils::deg_to_rad(fov_degrees * 0.5).cos();
        light.set_direction(&direction);
        light
    }

    fn set_direction(&mut self, direction: &Vec3) {
        self.direction = direction.normalize();
        self.rotation = utils::rotation_between(&utils::forward(), &self.direction);
    }

    /// Set baking mode
    pub fn with_mode(mut self, light_mode: LightMode) -> Self {
        self.light_mode = light_mode;
        self
    }

    /// Set emitter radius of point and spot lights
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    /// Set angular diameter of a directional light in degrees
    pub fn with_angle(mut self, angle_degrees: f32) -> Self {
        self.angle = utils::deg_to_rad(angle_degrees);
        self.half_angle_tan = (self.angle * 0.5).tan();
        self
    }

    /// Set light mask
    pub fn with_light_mask(mut self, light_mask: u32) -> Self {
        self.light_mask = light_mask;
        self
    }

    /// Set bounced light multiplier
    pub fn with_indirect_brightness(mut self, indirect_brightness: f32) -> Self {
        self.indirect_brightness = indirect_brightness;
        self
    }

    /// Whether direct light of this light is stored in lightmaps
    pub fn is_baked(&self) -> bool {
        self.light_mode == LightMode::Baked
    }

    /// World-space volume lit by this light, `None` when unbounded
    pub fn bounding_box(&self) -> Option<AABB> {
        match self.light_type {
            LightType::Directional => None,
            LightType::Point | LightType::Spot => {
                let reach = self.distance + self.radius;
                Some(AABB::from_center_extents(self.position, Vec3::new(reach, reach, reach)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_directional_light_rotation_matches_direction() {
        let light = BakedLight::directional(Vec3::new(0.0, -2.0, 0.0), Vec3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(light.direction, Vec3::new(0.0, -1.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(light.rotation * utils::forward(), light.direction, epsilon = 1e-5);
        assert!(light.bounding_box().is_none());
    }

    #[test]
    fn test_spot_light_cutoff() {
        let light = BakedLight::spot(Vec3::zeros(), Vec3::x(), Vec3::new(1.0, 1.0, 1.0), 10.0, 90.0);
        assert_relative_eq!(light.cutoff, std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-5);
    }

    #[test]
    fn test_point_light_bounds() {
        let light = BakedLight::point(Vec3::new(1.0, 2.0, 3.0), Vec3::new(1.0, 1.0, 1.0), 5.0).with_radius(1.0);
        let bounds = light.bounding_box().unwrap();
        assert_eq!(bounds.min, Vec3::new(-5.0, -4.0, -3.0));
        assert_eq!(bounds.max, Vec3::new(7.0, 8.0, 9.0));
    }
}
