//! Ray intersection interface shared by the tracing passes

use std::sync::Arc;

use bitflags::bitflags;
use image::RgbaImage;

use crate::foundation::math::{Vec2, Vec3, Vec4};
use crate::scene::geometry::{convert_uv, sample_image};
use crate::scene::{BakedSceneBackground, Material};

bitflags! {
    /// Classes of ray geometry, matched against the mask of a query
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GeometryMask: u32 {
        /// Geometry outside the chunk vicinity that only casts direct shadows
        const DIRECT_SHADOW_ONLY = 1 << 0;
        /// Most detailed LOD of bakeable geometry
        const PRIMARY_LOD = 1 << 1;
        /// Less detailed LODs
        const SECONDARY_LOD = 1 << 2;
        /// Everything
        const ALL = Self::DIRECT_SHADOW_ONLY.bits() | Self::PRIMARY_LOD.bits() | Self::SECONDARY_LOD.bits();
    }
}

/// Surface properties needed while tracing
#[derive(Debug, Clone)]
pub struct RaytracerMaterial {
    /// Opaque surfaces always block rays
    pub opaque: bool,
    /// Material alpha
    pub alpha: f32,
    /// Linear diffuse color
    pub diffuse_color: Vec3,
    /// Optional diffuse texture
    pub diffuse_image: Option<Arc<RgbaImage>>,
    /// Texture coordinate transform: `xy` scale, `zw` offset
    pub uv_scale_offset: Vec4,
}

impl From<&Material> for RaytracerMaterial {
    fn from(material: &Material) -> Self {
        Self {
            opaque: material.opaque,
            alpha: material.diffuse_color.w,
            diffuse_color: material.diffuse_color.xyz(),
            diffuse_image: material.diffuse_image.clone(),
            uv_scale_offset: material.uv_scale_offset,
        }
    }
}

impl RaytracerMaterial {
    /// Linear color and alpha of the diffuse texture at a material UV, white without one
    pub fn sample_texture(&self, uv: &Vec2) -> Vec4 {
        match &self.diffuse_image {
            Some(image) => sample_image(image, &convert_uv(&self.uv_scale_offset, uv)),
            None => Vec4::new(1.0, 1.0, 1.0, 1.0),
        }
    }
}

/// One LOD of one part of one object in a ray scene
#[derive(Debug, Clone)]
pub struct RaytracerGeometry {
    /// Object index in the list the scene was built from
    pub object_index: u32,
    /// Part index within the object
    pub geometry_index: u32,
    /// LOD index within the part
    pub lod_index: u32,
    /// Number of LODs of the part
    pub num_lods: u32,
    /// Lightmap holding the surface light, `None` for geometry without a baked lightmap
    pub lightmap_index: Option<u32>,
    /// Geometry class
    pub mask: GeometryMask,
    /// Surface properties
    pub material: RaytracerMaterial,
}

impl RaytracerGeometry {
    /// Whether a shadow ray cast from this geometry should ignore `other`.
    ///
    /// Secondary LODs of other objects are skipped, and of this object only the LOD the
    /// ray starts from is considered.
    pub fn is_unwanted_lod(&self, other: &RaytracerGeometry) -> bool {
        let same_geometry = self.object_index == other.object_index && self.geometry_index == other.geometry_index;
        if same_geometry {
            other.lod_index != self.lod_index
        } else {
            other.lod_index != 0
        }
    }
}

/// Ray query
#[derive(Debug, Clone, Copy)]
pub struct RayQuery {
    /// Ray origin
    pub origin: Vec3,
    /// Ray direction, hit distances are in units of its length
    pub direction: Vec3,
    /// Closest accepted hit distance
    pub tnear: f32,
    /// Farthest accepted hit distance
    pub tfar: f32,
    /// Geometry classes the ray can hit
    pub mask: GeometryMask,
}

impl RayQuery {
    /// Query in `[0, tfar]`
    pub fn new(origin: Vec3, direction: Vec3, tfar: f32, mask: GeometryMask) -> Self {
        Self { origin, direction, tnear: 0.0, tfar, mask }
    }
}

/// Ray hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Index into [`RayIntersectionService::geometries`]
    pub geometry_id: u32,
    /// Triangle index within the geometry
    pub primitive_id: u32,
    /// Hit distance in units of the ray direction
    pub t: f32,
    /// Barycentric weight of the second vertex
    pub u: f32,
    /// Barycentric weight of the third vertex
    pub v: f32,
    /// Unnormalized front face normal in world space
    pub geometric_normal: Vec3,
}

/// Per-vertex attribute interpolated at a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexAttribute {
    /// Lightmap UV in chart space, in `xy`
    LightmapUv,
    /// World-space smooth normal
    Normal,
    /// Material UV, in `xy`
    Uv,
}

/// Filter deciding whether a candidate hit is accepted. Rejected hits let the ray continue.
pub type RayFilter<'a> = dyn FnMut(&RayHit, &RaytracerGeometry) -> bool + 'a;

/// Ray casting over a static scene
pub trait RayIntersectionService: Send + Sync {
    /// Closest hit within the query range that matches its mask and passes `filter`.
    ///
    /// Candidates are offered to the filter in order of increasing distance.
    fn intersect(&self, query: &RayQuery, filter: &mut RayFilter<'_>) -> Option<RayHit>;

    /// Interpolate a vertex attribute at a hit
    fn interpolate(&self, hit: &RayHit, attribute: VertexAttribute) -> Vec3;

    /// Geometries indexed by geometry id
    fn geometries(&self) -> &[RaytracerGeometry];

    /// Backgrounds indexed by background id
    fn backgrounds(&self) -> &[BakedSceneBackground];

    /// Ray length spanning the whole scene
    fn max_distance(&self) -> f32;

    /// Closest hit without filtering
    fn intersect_closest(&self, query: &RayQuery) -> Option<RayHit> {
        self.intersect(query, &mut |_, _| true)
    }

    /// Radiance of a background in a direction, black for unknown ids
    fn sample_background(&self, id: u32, direction: &Vec3) -> Vec3 {
        self.backgrounds()
            .get(id as usize)
            .map_or_else(Vec3::zeros, |background| background.sample(direction))
    }
}
