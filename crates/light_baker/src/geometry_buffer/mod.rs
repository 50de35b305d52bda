//! Lightmap geometry buffers
//!
//! A geometry buffer stores, for every texel of a lightmap chart, the surface it covers:
//! world position, normals, material and bookkeeping ids. All tracing passes iterate
//! over geometry buffers instead of meshes.
//!
//! Texels not covered by any triangle carry [`EMPTY_GEOMETRY_ID`] and are skipped
//! by every downstream pass.

mod baking_scene;
mod preprocess;
mod seams;
mod software_baker;

pub use baking_scene::{
    generate_geometry_baking_scenes, map_geometry_ids_to_raytracer, BakingMesh, GeometryBakingScene,
    GeometryBakingScenes, GeometryIdMapping, EMPTY_GEOMETRY_ID,
};
pub use preprocess::preprocess_geometry_buffer;
pub use seams::{collect_geometry_seams, LightmapSeam};
pub use software_baker::SoftwareGeometryBufferBaker;

use crate::foundation::math::{Vec2, Vec3};

/// Per-texel surface description of one lightmap chart
#[derive(Debug, Clone)]
pub struct LightmapChartGeometryBuffer {
    /// Global lightmap index
    pub index: u32,
    /// Width and height in texels
    pub size: u32,
    /// World position, biased off the surface
    pub positions: Vec<Vec3>,
    /// Interpolated world position without bias
    pub smooth_positions: Vec<Vec3>,
    /// Triangle normal
    pub face_normals: Vec<Vec3>,
    /// Interpolated vertex normal
    pub smooth_normals: Vec<Vec3>,
    /// Geometry id, [`EMPTY_GEOMETRY_ID`] for empty texels
    pub geometry_ids: Vec<u32>,
    /// Light mask of the covering object
    pub light_masks: Vec<u32>,
    /// Background of the covering object
    pub background_ids: Vec<u32>,
    /// Half of the world-space texel diagonal
    pub texel_radiuses: Vec<f32>,
    /// Linear diffuse color
    pub albedo: Vec<Vec3>,
    /// Linear emitted radiance
    pub emission: Vec<Vec3>,
    /// Seams in chart UV space
    pub seams: Vec<LightmapSeam>,
}

impl LightmapChartGeometryBuffer {
    /// Buffer with every texel empty
    pub fn new(index: u32, size: u32) -> Self {
        let num_texels = (size as usize) * (size as usize);
        Self {
            index,
            size,
            positions: vec![Vec3::zeros(); num_texels],
            smooth_positions: vec![Vec3::zeros(); num_texels],
            face_normals: vec![Vec3::zeros(); num_texels],
            smooth_normals: vec![Vec3::zeros(); num_texels],
            geometry_ids: vec![EMPTY_GEOMETRY_ID; num_texels],
            light_masks: vec![0; num_texels],
            background_ids: vec![0; num_texels],
            texel_radiuses: vec![0.0; num_texels],
            albedo: vec![Vec3::zeros(); num_texels],
            emission: vec![Vec3::zeros(); num_texels],
            seams: Vec::new(),
        }
    }

    /// Number of texels
    pub fn num_texels(&self) -> usize {
        self.geometry_ids.len()
    }

    /// Whether no triangle covers the texel
    pub fn is_empty_texel(&self, index: usize) -> bool {
        self.geometry_ids[index] == EMPTY_GEOMETRY_ID
    }

    /// Index of the texel containing a chart UV, clamped to the chart
    pub fn nearest_location(&self, uv: &Vec2) -> usize {
        nearest_texel(self.size, uv)
    }
}

/// Index of the texel of a `size`-wide chart containing `uv`, clamped to the chart
pub fn nearest_texel(size: u32, uv: &Vec2) -> usize {
    let max = size.saturating_sub(1) as f32;
    let x = (uv.x * size as f32).floor().clamp(0.0, max) as usize;
    let y = (uv.y * size as f32).floor().clamp(0.0, max) as usize;
    y * size as usize + x
}

/// Rasterizes baking scenes into geometry buffers
pub trait GeometryBufferBaker: Send + Sync {
    /// Offset between texel centers and the UVs the baker samples at, in texels.
    /// The rest of the pipeline expects zero.
    fn pixel_uv_offset(&self) -> Vec2;

    /// Rasterize one chart
    fn bake(&self, scene: &GeometryBakingScene) -> LightmapChartGeometryBuffer;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_empty() {
        let buffer = LightmapChartGeometryBuffer::new(2, 4);
        assert_eq!(buffer.num_texels(), 16);
        assert!((0..16).all(|index| buffer.is_empty_texel(index)));
    }

    #[test]
    fn test_nearest_location_is_clamped() {
        let buffer = LightmapChartGeometryBuffer::new(0, 4);
        assert_eq!(buffer.nearest_location(&Vec2::new(0.0, 0.0)), 0);
        assert_eq!(buffer.nearest_location(&Vec2::new(0.3, 0.6)), 2 * 4 + 1);
        assert_eq!(buffer.nearest_location(&Vec2::new(1.0, 1.0)), 15);
        assert_eq!(buffer.nearest_location(&Vec2::new(-1.0, 2.0)), 12);
    }
}
