//! CPU rasterizer for geometry buffers
//!
//! Triangles are rasterized in chart texel space. Each triangle is drawn once per entry
//! of [`MULTI_TAP_OFFSETS`], sampling at the texel center shifted by the tap. Later taps
//! override earlier ones, so the exact center sample always wins, while the outer taps
//! make coverage conservative: every texel a triangle touches gets written.

use crate::foundation::math::{utils, Vec2, Vec3};

use super::baking_scene::{BakingMesh, GeometryBakingScene};
use super::{GeometryBufferBaker, LightmapChartGeometryBuffer};

/// Sample offsets in half-texel units, in drawing order
pub const MULTI_TAP_OFFSETS: [[f32; 2]; 25] = [
    [1.0, 1.0],
    [1.0, -1.0],
    [-1.0, 1.0],
    [-1.0, -1.0],
    [1.0, 0.5],
    [1.0, -0.5],
    [-1.0, 0.5],
    [-1.0, -0.5],
    [0.5, 1.0],
    [0.5, -1.0],
    [-0.5, 1.0],
    [-0.5, -1.0],
    [1.0, 0.0],
    [-1.0, 0.0],
    [0.0, 1.0],
    [0.0, -1.0],
    [0.5, 0.5],
    [0.5, -0.5],
    [-0.5, 0.5],
    [-0.5, -0.5],
    [0.5, 0.0],
    [-0.5, 0.0],
    [0.0, 0.5],
    [0.0, -0.5],
    [0.0, 0.0],
];

const INSIDE_EPSILON: f32 = 1e-6;

/// Geometry buffer baker running on the CPU
#[derive(Debug, Clone, Default)]
pub struct SoftwareGeometryBufferBaker;

impl SoftwareGeometryBufferBaker {
    /// Create a baker
    pub fn new() -> Self {
        Self
    }
}

/// Triangle prepared for rasterization
struct RasterTriangle<'a> {
    mesh: &'a BakingMesh,
    indices: [usize; 3],
    texel_positions: [Vec2; 3],
    inverse_area: f32,
    face_normal: Vec3,
    texel_radius: f32,
}

impl<'a> RasterTriangle<'a> {
    fn new(mesh: &'a BakingMesh, triangle: usize, size: f32) -> Option<Self> {
        let indices = [
            mesh.indices[triangle * 3] as usize,
            mesh.indices[triangle * 3 + 1] as usize,
            mesh.indices[triangle * 3 + 2] as usize,
        ];
        let texel_positions = indices.map(|index| mesh.lightmap_uvs[index] * size);
        let texel_area = edge_function(&texel_positions[0], &texel_positions[1], &texel_positions[2]);
        if texel_area.abs() < INSIDE_EPSILON {
            return None;
        }

        let [p0, p1, p2] = indices.map(|index| mesh.positions[index]);
        let cross = (p1 - p0).cross(&(p2 - p0));
        let world_area = cross.norm() * 0.5;
        let face_normal = cross.try_normalize(0.0)?;

        // World size of one texel side, from the area ratio
        let texel_size = (world_area / (texel_area.abs() * 0.5)).sqrt();
        Some(Self {
            mesh,
            indices,
            texel_positions,
            inverse_area: 1.0 / texel_area,
            face_normal,
            texel_radius: texel_size * std::f32::consts::FRAC_1_SQRT_2,
        })
    }

    fn barycentrics(&self, point: &Vec2) -> Option<[f32; 3]> {
        let [t0, t1, t2] = &self.texel_positions;
        let weights = [
            edge_function(t1, t2, point) * self.inverse_area,
            edge_function(t2, t0, point) * self.inverse_area,
            edge_function(t0, t1, point) * self.inverse_area,
        ];
        weights.iter().all(|weight| *weight >= -INSIDE_EPSILON).then_some(weights)
    }

    fn blend3(&self, values: &[Vec3], weights: &[f32; 3]) -> Vec3 {
        values[self.indices[0]] * weights[0] + values[self.indices[1]] * weights[1] + values[self.indices[2]] * weights[2]
    }

    fn blend2(&self, values: &[Vec2], weights: &[f32; 3]) -> Vec2 {
        values[self.indices[0]] * weights[0] + values[self.indices[1]] * weights[1] + values[self.indices[2]] * weights[2]
    }
}

/// Twice the signed area of the triangle `a`, `b`, `c`
fn edge_function(a: &Vec2, b: &Vec2, c: &Vec2) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn write_texel(
    buffer: &mut LightmapChartGeometryBuffer,
    scene: &GeometryBakingScene,
    triangle: &RasterTriangle<'_>,
    index: usize,
    weights: &[f32; 3],
) {
    let mesh = triangle.mesh;
    let smooth_position = triangle.blend3(&mesh.positions, weights);
    let smooth_normal = triangle
        .blend3(&mesh.normals, weights)
        .try_normalize(0.0)
        .unwrap_or(triangle.face_normal);
    let bias = scene.scaled_position_bias * utils::bias_scale(&smooth_position) + scene.constant_position_bias;

    let uv = triangle.blend2(&mesh.uvs, weights);
    let material = &mesh.material;
    let albedo = material.diffuse_color.xyz().component_mul(&material.sample_diffuse(&uv).xyz());

    buffer.positions[index] = smooth_position + triangle.face_normal * bias;
    buffer.smooth_positions[index] = smooth_position;
    buffer.face_normals[index] = triangle.face_normal;
    buffer.smooth_normals[index] = smooth_normal;
    buffer.geometry_ids[index] = mesh.geometry_id;
    buffer.light_masks[index] = mesh.light_mask;
    buffer.background_ids[index] = mesh.background_id;
    buffer.texel_radiuses[index] = triangle.texel_radius;
    buffer.albedo[index] = albedo;
    buffer.emission[index] = material.emission;
}

fn rasterize_triangle(
    buffer: &mut LightmapChartGeometryBuffer,
    scene: &GeometryBakingScene,
    triangle: &RasterTriangle<'_>,
    tap: &Vec2,
) {
    let size = buffer.size as i64;
    let [t0, t1, t2] = &triangle.texel_positions;
    let min_x = t0.x.min(t1.x).min(t2.x).floor() as i64 - 1;
    let max_x = t0.x.max(t1.x).max(t2.x).ceil() as i64 + 1;
    let min_y = t0.y.min(t1.y).min(t2.y).floor() as i64 - 1;
    let max_y = t0.y.max(t1.y).max(t2.y).ceil() as i64 + 1;

    for y in min_y.max(0)..max_y.min(size) {
        for x in min_x.max(0)..max_x.min(size) {
            let sample = Vec2::new(x as f32 + 0.5, y as f32 + 0.5) + tap;
            if let Some(weights) = triangle.barycentrics(&sample) {
                write_texel(buffer, scene, triangle, (y * size + x) as usize, &weights);
            }
        }
    }
}

impl GeometryBufferBaker for SoftwareGeometryBufferBaker {
    fn pixel_uv_offset(&self) -> Vec2 {
        Vec2::zeros()
    }

    fn bake(&self, scene: &GeometryBakingScene) -> LightmapChartGeometryBuffer {
        let mut buffer = LightmapChartGeometryBuffer::new(scene.lightmap_index, scene.lightmap_size);
        buffer.seams = scene.seams.clone();

        // Less detailed LODs first so that LOD 0 wins where they overlap
        let mut meshes: Vec<&BakingMesh> = scene.meshes.iter().collect();
        meshes.sort_by_key(|mesh| std::cmp::Reverse(mesh.lod_index));

        let size = scene.lightmap_size as f32;
        let triangles: Vec<RasterTriangle<'_>> = meshes
            .iter()
            .copied()
            .flat_map(|mesh| (0..mesh.indices.len() / 3).filter_map(move |triangle| RasterTriangle::new(mesh, triangle, size)))
            .collect();

        for offset in &MULTI_TAP_OFFSETS {
            let tap = Vec2::new(offset[0], offset[1]) * 0.5;
            for triangle in &triangles {
                rasterize_triangle(&mut buffer, scene, triangle, &tap);
            }
        }

        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeometryBufferSettings;
    use crate::foundation::math::{Mat4, Vec4};
    use crate::geometry_buffer::{generate_geometry_baking_scenes, EMPTY_GEOMETRY_ID};
    use crate::scene::{procedural, GeometryPart, Material, StaticGeometry};
    use approx::assert_relative_eq;

    fn bake_quad(geometry: StaticGeometry, settings: &GeometryBufferSettings) -> LightmapChartGeometryBuffer {
        let scenes = generate_geometry_baking_scenes(&[&geometry], 8, settings);
        SoftwareGeometryBufferBaker::new().bake(&scenes.scenes[0])
    }

    fn placed(mut geometry: StaticGeometry) -> StaticGeometry {
        geometry.lightmap_index = Some(0);
        geometry.lightmap_scale_offset = Vec4::new(0.5, 0.5, 0.25, 0.25);
        geometry
    }

    #[test]
    fn test_region_is_covered_and_rest_is_empty() {
        let material = Material::diffuse(Vec3::new(0.5, 0.25, 1.0)).with_emission(Vec3::new(2.0, 0.0, 0.0));
        let geometry = placed(procedural::quad_geometry("quad", Mat4::new_scaling(4.0), material));
        let buffer = bake_quad(geometry, &GeometryBufferSettings::default());

        for y in 0..8 {
            for x in 0..8 {
                let index = y * 8 + x;
                // Texels touching the region border are covered too
                let inside = (1..7).contains(&x) && (1..7).contains(&y);
                assert_eq!(buffer.is_empty_texel(index), !inside, "texel {x} {y}");
            }
        }

        let index = 3 * 8 + 3;
        assert_eq!(buffer.geometry_ids[index], 1);
        assert_relative_eq!(buffer.face_normals[index], Vec3::z(), epsilon = 1e-5);
        assert_relative_eq!(buffer.albedo[index], Vec3::new(0.5, 0.25, 1.0), epsilon = 1e-5);
        assert_eq!(buffer.emission[index], Vec3::new(2.0, 0.0, 0.0));
        // Four world units over four texels
        assert_relative_eq!(buffer.texel_radiuses[index], std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-4);
        assert_eq!(buffer.geometry_ids[0], EMPTY_GEOMETRY_ID);
    }

    #[test]
    fn test_position_is_biased_along_face_normal() {
        let settings = GeometryBufferSettings { scaled_position_bias: 0.0, constant_position_bias: 0.25 };
        let geometry = placed(procedural::quad_geometry("quad", Mat4::identity(), Material::default()));
        let buffer = bake_quad(geometry, &settings);
        let index = 3 * 8 + 3;
        assert_relative_eq!(buffer.positions[index].z, 0.25, epsilon = 1e-5);
        assert_relative_eq!(buffer.smooth_positions[index].z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_primary_lod_wins() {
        let lod = procedural::quad_lod(Vec3::new(-0.5, -0.5, 0.0), Vec3::x(), Vec3::y());
        let geometry = placed(
            StaticGeometry::new("lods", Mat4::identity())
                .with_part(GeometryPart::new(lod.clone(), Material::default()).with_lod(lod)),
        );
        let buffer = bake_quad(geometry, &GeometryBufferSettings::default());
        let covered: Vec<u32> = buffer.geometry_ids.iter().copied().filter(|id| *id != EMPTY_GEOMETRY_ID).collect();
        assert!(!covered.is_empty());
        assert!(covered.iter().all(|id| *id == 1));
    }

    #[test]
    fn test_baker_reports_no_pixel_offset() {
        assert_eq!(SoftwareGeometryBufferBaker::new().pixel_uv_offset(), Vec2::zeros());
    }
}
