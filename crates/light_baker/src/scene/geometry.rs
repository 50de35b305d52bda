//! Static geometry as seen by the baker
//!
//! A [`StaticGeometry`] is one scene object. It owns one or more [`GeometryPart`]s, each
//! with its own material and a chain of level-of-detail meshes. All LODs of an object share
//! a single lightmap region.

use std::sync::Arc;

use image::RgbaImage;

use crate::foundation::math::{utils, Mat3, Mat4, Vec2, Vec3, Vec4};
use crate::spatial::AABB;

/// Vertex layout used by baked meshes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelVertex {
    /// Object-space position
    pub position: Vec3,
    /// Object-space smooth normal
    pub normal: Vec3,
    /// Material texture coordinates
    pub uv: Vec2,
    /// Lightmap texture coordinates in [0, 1]
    pub lightmap_uv: Vec2,
}

impl ModelVertex {
    /// Create a vertex
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2, lightmap_uv: Vec2) -> Self {
        Self { position, normal, uv, lightmap_uv }
    }
}

/// Indexed triangle list of one level of detail
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryLod {
    /// Vertices
    pub vertices: Vec<ModelVertex>,
    /// Three indices per triangle, counter-clockwise front faces
    pub indices: Vec<u32>,
}

impl GeometryLod {
    /// Create from vertices and indices
    pub fn new(vertices: Vec<ModelVertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Number of triangles
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertex indices of a triangle
    pub fn triangle(&self, index: usize) -> [usize; 3] {
        [
            self.indices[index * 3] as usize,
            self.indices[index * 3 + 1] as usize,
            self.indices[index * 3 + 2] as usize,
        ]
    }

    /// Surface area after applying `transform`
    pub fn surface_area(&self, transform: &Mat4) -> f32 {
        let world = |index: usize| transform.transform_point(&self.vertices[index].position.into()).coords;
        (0..self.num_triangles())
            .map(|triangle| {
                let [i0, i1, i2] = self.triangle(triangle);
                let (p0, p1, p2) = (world(i0), world(i1), world(i2));
                (p1 - p0).cross(&(p2 - p0)).norm() * 0.5
            })
            .sum()
    }
}

/// Surface description used for albedo, emission and ray transparency
#[derive(Debug, Clone)]
pub struct Material {
    /// Linear diffuse color, alpha in `w`
    pub diffuse_color: Vec4,
    /// Linear emitted radiance
    pub emission: Vec3,
    /// Optional sRGB diffuse texture
    pub diffuse_image: Option<Arc<RgbaImage>>,
    /// Texture coordinate transform: `xy` scale, `zw` offset
    pub uv_scale_offset: Vec4,
    /// Opaque surfaces always block rays
    pub opaque: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            diffuse_color: Vec4::new(1.0, 1.0, 1.0, 1.0),
            emission: Vec3::zeros(),
            diffuse_image: None,
            uv_scale_offset: Vec4::new(1.0, 1.0, 0.0, 0.0),
            opaque: true,
        }
    }
}

impl Material {
    /// Opaque material of a single color
    pub fn diffuse(color: Vec3) -> Self {
        Self {
            diffuse_color: Vec4::new(color.x, color.y, color.z, 1.0),
            ..Self::default()
        }
    }

    /// Set emission
    pub fn with_emission(mut self, emission: Vec3) -> Self {
        self.emission = emission;
        self
    }

    /// Make the material alpha blended with the given opacity
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.diffuse_color.w = alpha;
        self.opaque = false;
        self
    }

    /// Set diffuse texture
    pub fn with_diffuse_image(mut self, image: Arc<RgbaImage>) -> Self {
        self.diffuse_image = Some(image);
        self
    }

    /// Apply the texture coordinate transform
    pub fn convert_uv(&self, uv: &Vec2) -> Vec2 {
        convert_uv(&self.uv_scale_offset, uv)
    }

    /// Linear color and alpha of the diffuse texture, white when there is none
    pub fn sample_diffuse(&self, uv: &Vec2) -> Vec4 {
        match &self.diffuse_image {
            Some(image) => sample_image(image, &self.convert_uv(uv)),
            None => Vec4::new(1.0, 1.0, 1.0, 1.0),
        }
    }
}

/// Apply an `xy` scale, `zw` offset transform to a UV
pub(crate) fn convert_uv(scale_offset: &Vec4, uv: &Vec2) -> Vec2 {
    Vec2::new(uv.x * scale_offset.x + scale_offset.z, uv.y * scale_offset.y + scale_offset.w)
}

/// Nearest texel of an sRGB image with repeat wrapping, converted to linear
pub(crate) fn sample_image(image: &RgbaImage, uv: &Vec2) -> Vec4 {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Vec4::new(1.0, 1.0, 1.0, 1.0);
    }

    let x = ((uv.x - uv.x.floor()) * width as f32) as u32;
    let y = ((uv.y - uv.y.floor()) * height as f32) as u32;
    let pixel = image.get_pixel(x.min(width - 1), y.min(height - 1));
    let channel = |index: usize| f32::from(pixel.0[index]) / 255.0;
    Vec4::new(
        utils::gamma_to_linear_channel(channel(0)),
        utils::gamma_to_linear_channel(channel(1)),
        utils::gamma_to_linear_channel(channel(2)),
        channel(3),
    )
}

/// Part of an object with one material and its LOD chain
#[derive(Debug, Clone)]
pub struct GeometryPart {
    /// Levels of detail, most detailed first
    pub lods: Vec<GeometryLod>,
    /// Surface material
    pub material: Material,
}

impl GeometryPart {
    /// Part with a single LOD
    pub fn new(lod: GeometryLod, material: Material) -> Self {
        Self { lods: vec![lod], material }
    }

    /// Append a less detailed LOD
    pub fn with_lod(mut self, lod: GeometryLod) -> Self {
        self.lods.push(lod);
        self
    }
}

/// Static object that receives a lightmap, casts shadows, or both
#[derive(Debug, Clone)]
pub struct StaticGeometry {
    /// Name used in diagnostics
    pub name: String,
    /// Object to world transform
    pub transform: Mat4,
    /// Parts of the object
    pub parts: Vec<GeometryPart>,
    /// Whether the object gets a lightmap. Otherwise it only occludes and reflects.
    pub bake_lightmap: bool,
    /// Multiplier of the lightmap region size
    pub scale_in_lightmap: f32,
    /// Bit mask matched against light masks
    pub light_mask: u32,
    /// Background seen by rays leaving this object
    pub background_id: u32,
    /// Assigned lightmap chart
    pub lightmap_index: Option<u32>,
    /// Placement inside the chart: `xy` scale, `zw` offset
    pub lightmap_scale_offset: Vec4,
    /// All LODs share one lightmap UV layout
    pub shared_lightmap_uv: bool,
}

impl StaticGeometry {
    /// Create an empty lightmapped object
    pub fn new(name: impl Into<String>, transform: Mat4) -> Self {
        Self {
            name: name.into(),
            transform,
            parts: Vec::new(),
            bake_lightmap: true,
            scale_in_lightmap: 1.0,
            light_mask: u32::MAX,
            background_id: 0,
            lightmap_index: None,
            lightmap_scale_offset: Vec4::new(1.0, 1.0, 0.0, 0.0),
            shared_lightmap_uv: false,
        }
    }

    /// Add a part
    pub fn with_part(mut self, part: GeometryPart) -> Self {
        self.parts.push(part);
        self
    }

    /// Set whether the object gets a lightmap
    pub fn with_bake_lightmap(mut self, bake_lightmap: bool) -> Self {
        self.bake_lightmap = bake_lightmap;
        self
    }

    /// Set light mask
    pub fn with_light_mask(mut self, light_mask: u32) -> Self {
        self.light_mask = light_mask;
        self
    }

    /// Set lightmap scale
    pub fn with_scale_in_lightmap(mut self, scale_in_lightmap: f32) -> Self {
        self.scale_in_lightmap = scale_in_lightmap;
        self
    }

    /// Transform an object-space position to world space
    pub fn world_position(&self, position: &Vec3) -> Vec3 {
        self.transform.transform_point(&(*position).into()).coords
    }

    /// Matrix taking object-space normals to world space
    pub fn normal_matrix(&self) -> Mat3 {
        let linear: Mat3 = self.transform.fixed_view::<3, 3>(0, 0).into_owned();
        linear.try_inverse().map_or(linear, |inverse| inverse.transpose())
    }

    /// World bounds of every LOD of every part
    pub fn world_bounding_box(&self) -> AABB {
        let mut bounds = AABB::empty();
        for lod in self.parts.iter().flat_map(|part| part.lods.iter()) {
            for vertex in &lod.vertices {
                bounds.merge_point(&self.world_position(&vertex.position));
            }
        }
        bounds
    }

    /// World surface area of the most detailed LOD of every part
    pub fn world_surface_area(&self) -> f32 {
        self.parts
            .iter()
            .filter_map(|part| part.lods.first())
            .map(|lod| lod.surface_area(&self.transform))
            .sum()
    }

    /// Map a mesh lightmap UV into the assigned chart region
    pub fn chart_uv(&self, lightmap_uv: &Vec2) -> Vec2 {
        convert_uv(&self.lightmap_scale_offset, lightmap_uv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_triangle() -> GeometryLod {
        let normal = Vec3::z();
        GeometryLod::new(
            vec![
                ModelVertex::new(Vec3::new(0.0, 0.0, 0.0), normal, Vec2::zeros(), Vec2::new(0.0, 0.0)),
                ModelVertex::new(Vec3::new(1.0, 0.0, 0.0), normal, Vec2::zeros(), Vec2::new(1.0, 0.0)),
                ModelVertex::new(Vec3::new(0.0, 1.0, 0.0), normal, Vec2::zeros(), Vec2::new(0.0, 1.0)),
            ],
            vec![0, 1, 2],
        )
    }

    #[test]
    fn test_surface_area_uses_transform() {
        let geometry = StaticGeometry::new("triangle", Mat4::new_scaling(2.0))
            .with_part(GeometryPart::new(unit_triangle(), Material::default()));
        assert_relative_eq!(geometry.world_surface_area(), 2.0, epsilon = 1e-5);
        let bounds = geometry.world_bounding_box();
        assert_eq!(bounds.max, Vec3::new(2.0, 2.0, 0.0));
    }

    #[test]
    fn test_chart_uv() {
        let mut geometry = StaticGeometry::new("triangle", Mat4::identity());
        geometry.lightmap_scale_offset = Vec4::new(0.5, 0.25, 0.5, 0.0);
        assert_eq!(geometry.chart_uv(&Vec2::new(1.0, 1.0)), Vec2::new(1.0, 0.25));
    }

    #[test]
    fn test_sample_diffuse_texture() {
        let image = RgbaImage::from_pixel(2, 2, image::Rgba([255, 255, 255, 128]));
        let material = Material::default().with_diffuse_image(Arc::new(image));
        let sample = material.sample_diffuse(&Vec2::new(0.75, 0.25));
        assert_relative_eq!(sample.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(sample.w, 128.0 / 255.0, epsilon = 1e-5);
        assert_eq!(Material::default().sample_diffuse(&Vec2::zeros()), Vec4::new(1.0, 1.0, 1.0, 1.0));
    }
}
