//! Light arriving from outside the scene

use std::sync::Arc;

use image::Rgb32FImage;

use crate::foundation::math::{Vec2, Vec3};

/// What a ray sees when it leaves the scene
#[derive(Debug, Clone)]
pub enum BakedSceneBackground {
    /// Uniform color in every direction
    Solid(Vec3),
    /// Linear HDR cube map, faces ordered +X, -X, +Y, -Y, +Z, -Z
    CubeMap {
        /// Square faces of equal size
        faces: [Arc<Rgb32FImage>; 6],
    },
}

impl Default for BakedSceneBackground {
    fn default() -> Self {
        Self::Solid(Vec3::zeros())
    }
}

impl BakedSceneBackground {
    /// Radiance arriving from `direction`
    pub fn sample(&self, direction: &Vec3) -> Vec3 {
        match self {
            Self::Solid(color) => *color,
            Self::CubeMap { faces } => {
                let (face, uv) = cube_face_uv(direction);
                sample_bilinear(&faces[face], &uv)
            }
        }
    }
}

/// Face index and face coordinates in [0, 1] of a direction
fn cube_face_uv(direction: &Vec3) -> (usize, Vec2) {
    let abs = direction.abs();
    let (face, major, s, t) = if abs.x >= abs.y && abs.x >= abs.z {
        if direction.x >= 0.0 {
            (0, abs.x, -direction.z, -direction.y)
        } else {
            (1, abs.x, direction.z, -direction.y)
        }
    } else if abs.y >= abs.z {
        if direction.y >= 0.0 {
            (2, abs.y, direction.x, direction.z)
        } else {
            (3, abs.y, direction.x, -direction.z)
        }
    } else if direction.z >= 0.0 {
        (4, abs.z, direction.x, -direction.y)
    } else {
        (5, abs.z, -direction.x, -direction.y)
    };

    let major = major.max(f32::MIN_POSITIVE);
    (face, Vec2::new((s / major + 1.0) * 0.5, (t / major + 1.0) * 0.5))
}

fn sample_bilinear(image: &Rgb32FImage, uv: &Vec2) -> Vec3 {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Vec3::zeros();
    }

    let x = (uv.x * width as f32 - 0.5).clamp(0.0, (width - 1) as f32);
    let y = (uv.y * height as f32 - 0.5).clamp(0.0, (height - 1) as f32);
    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(width - 1), (y0 + 1).min(height - 1));
    let (fx, fy) = (x - x0 as f32, y - y0 as f32);

    let texel = |x: u32, y: u32| {
        let pixel = image.get_pixel(x, y);
        Vec3::new(pixel.0[0], pixel.0[1], pixel.0[2])
    };
    let top = texel(x0, y0) * (1.0 - fx) + texel(x1, y0) * fx;
    let bottom = texel(x0, y1) * (1.0 - fx) + texel(x1, y1) * fx;
    top * (1.0 - fy) + bottom * fy
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn face(color: [f32; 3]) -> Arc<Rgb32FImage> {
        Arc::new(Rgb32FImage::from_pixel(4, 4, image::Rgb(color)))
    }

    #[test]
    fn test_solid_background() {
        let background = BakedSceneBackground::Solid(Vec3::new(0.1, 0.2, 0.3));
        assert_eq!(background.sample(&Vec3::x()), Vec3::new(0.1, 0.2, 0.3));
        assert_eq!(BakedSceneBackground::default().sample(&Vec3::y()), Vec3::zeros());
    }

    #[test]
    fn test_cube_map_face_selection() {
        let background = BakedSceneBackground::CubeMap {
            faces: [
                face([1.0, 0.0, 0.0]),
                face([2.0, 0.0, 0.0]),
                face([3.0, 0.0, 0.0]),
                face([4.0, 0.0, 0.0]),
                face([5.0, 0.0, 0.0]),
                face([6.0, 0.0, 0.0]),
            ],
        };
        assert_relative_eq!(background.sample(&Vec3::new(1.0, 0.1, 0.2)).x, 1.0);
        assert_relative_eq!(background.sample(&Vec3::new(-1.0, 0.1, 0.2)).x, 2.0);
        assert_relative_eq!(background.sample(&Vec3::new(0.0, 1.0, 0.0)).x, 3.0);
        assert_relative_eq!(background.sample(&Vec3::new(0.0, -1.0, 0.0)).x, 4.0);
        assert_relative_eq!(background.sample(&Vec3::new(0.0, 0.3, 1.0)).x, 5.0);
        assert_relative_eq!(background.sample(&Vec3::new(0.0, 0.3, -1.0)).x, 6.0);
    }

    #[test]
    fn test_face_uv_center() {
        let (face, uv) = cube_face_uv(&Vec3::new(0.0, 0.0, -2.0));
        assert_eq!(face, 5);
        assert_relative_eq!(uv, Vec2::new(0.5, 0.5));
    }
}
