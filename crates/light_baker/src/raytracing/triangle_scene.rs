//! Octree-accelerated triangle scene
//!
//! Every LOD of every part of every source object becomes one ray geometry. Triangles are
//! stored in world space and indexed by an octree over their centroids. A query gathers
//! candidate triangles from the octree, intersects them, and offers the hits to the
//! filter from nearest to farthest.

use crate::foundation::logging::warn;
use crate::foundation::math::{Vec2, Vec3};
use crate::scene::{BakedSceneBackground, StaticGeometry};
use crate::spatial::{Octree, OctreeConfig, AABB};

use super::primitives::{Ray, Triangle};
use super::service::{
    GeometryMask, RayFilter, RayHit, RayIntersectionService, RayQuery, RaytracerGeometry, RaytracerMaterial,
    VertexAttribute,
};

/// Object to put into a ray scene
#[derive(Debug, Clone, Copy)]
pub struct RaytracingGeometrySource<'a> {
    /// Scene object
    pub geometry: &'a StaticGeometry,
    /// Object only casts direct shadows
    pub direct_shadow_only: bool,
}

#[derive(Debug, Clone, Default)]
struct SceneMesh {
    normals: Vec<Vec3>,
    uvs: Vec<Vec2>,
    lightmap_uvs: Vec<Vec2>,
    indices: Vec<u32>,
}

#[derive(Debug, Clone, Copy)]
struct SceneTriangle {
    geometry_id: u32,
    primitive_id: u32,
    triangle: Triangle,
}

/// Ray scene over world-space triangles
#[derive(Debug)]
pub struct TriangleMeshScene {
    geometries: Vec<RaytracerGeometry>,
    meshes: Vec<SceneMesh>,
    triangles: Vec<SceneTriangle>,
    octree: Octree,
    backgrounds: Vec<BakedSceneBackground>,
    max_distance: f32,
}

fn geometry_mask(geometry: &StaticGeometry, direct_shadow_only: bool, lod_index: usize) -> GeometryMask {
    if direct_shadow_only || !geometry.bake_lightmap {
        GeometryMask::DIRECT_SHADOW_ONLY
    } else if lod_index == 0 {
        GeometryMask::PRIMARY_LOD
    } else {
        GeometryMask::SECONDARY_LOD
    }
}

/// Build a ray scene from scene objects.
///
/// Object indices of the resulting geometries are positions in `sources`. Lightmap UVs
/// are mapped into chart space and clamped to [0, 1].
pub fn create_raytracer_scene(
    sources: &[RaytracingGeometrySource<'_>],
    backgrounds: Vec<BakedSceneBackground>,
) -> TriangleMeshScene {
    let mut geometries = Vec::new();
    let mut meshes = Vec::new();
    let mut triangles = Vec::new();
    let mut bounds = AABB::empty();
    let mut uvs_clamped = false;

    for (object_index, source) in sources.iter().enumerate() {
        let geometry = source.geometry;
        let normal_matrix = geometry.normal_matrix();
        let lightmap_index = if source.direct_shadow_only || !geometry.bake_lightmap {
            None
        } else {
            geometry.lightmap_index
        };

        for (geometry_index, part) in geometry.parts.iter().enumerate() {
            let material = RaytracerMaterial::from(&part.material);
            for (lod_index, lod) in part.lods.iter().enumerate() {
                let geometry_id = geometries.len() as u32;
                geometries.push(RaytracerGeometry {
                    object_index: object_index as u32,
                    geometry_index: geometry_index as u32,
                    lod_index: lod_index as u32,
                    num_lods: part.lods.len() as u32,
                    lightmap_index,
                    mask: geometry_mask(geometry, source.direct_shadow_only, lod_index),
                    material: material.clone(),
                });

                let positions: Vec<Vec3> =
                    lod.vertices.iter().map(|vertex| geometry.world_position(&vertex.position)).collect();
                let mut mesh = SceneMesh {
                    normals: lod
                        .vertices
                        .iter()
                        .map(|vertex| (normal_matrix * vertex.normal).try_normalize(0.0).unwrap_or_else(Vec3::zeros))
                        .collect(),
                    uvs: lod.vertices.iter().map(|vertex| vertex.uv).collect(),
                    lightmap_uvs: Vec::with_capacity(lod.vertices.len()),
                    indices: lod.indices.clone(),
                };
                for vertex in &lod.vertices {
                    let uv = geometry.chart_uv(&vertex.lightmap_uv);
                    let clamped = uv.map(|c| c.clamp(0.0, 1.0));
                    uvs_clamped |= clamped != uv;
                    mesh.lightmap_uvs.push(clamped);
                }

                for primitive_id in 0..lod.num_triangles() {
                    let [i0, i1, i2] = lod.triangle(primitive_id);
                    let triangle = Triangle::new(positions[i0], positions[i1], positions[i2]);
                    for position in [&triangle.v0, &triangle.v1, &triangle.v2] {
                        bounds.merge_point(position);
                    }
                    triangles.push(SceneTriangle { geometry_id, primitive_id: primitive_id as u32, triangle });
                }
                meshes.push(mesh);
            }
        }
    }

    if uvs_clamped {
        warn!("Lightmap UVs are outside of [0, 1] range, they are clamped");
    }

    if !bounds.is_valid() {
        bounds = AABB::new(Vec3::zeros(), Vec3::zeros());
    }
    // Diagonal with a margin, so rays between opposite corners still reach
    let max_distance = (bounds.size().norm() * 1.01).max(1.0);

    let mut octree = Octree::new(bounds.padded(max_distance * 0.01), OctreeConfig::default());
    for (index, scene_triangle) in triangles.iter().enumerate() {
        let triangle = &scene_triangle.triangle;
        octree.insert(index as u32, triangle.centroid(), triangle.bounding_radius());
    }

    TriangleMeshScene {
        geometries,
        meshes,
        triangles,
        octree,
        backgrounds,
        max_distance,
    }
}

impl TriangleMeshScene {
    /// Number of triangles over all geometries
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }
}

impl RayIntersectionService for TriangleMeshScene {
    fn intersect(&self, query: &RayQuery, filter: &mut RayFilter<'_>) -> Option<RayHit> {
        let ray = Ray::new(query.origin, query.direction);
        let mut hits: Vec<RayHit> = self
            .octree
            .query_ray(query.origin, query.direction)
            .iter()
            .filter_map(|item| {
                let scene_triangle = &self.triangles[item.id as usize];
                let geometry = &self.geometries[scene_triangle.geometry_id as usize];
                if !geometry.mask.intersects(query.mask) {
                    return None;
                }
                let (t, u, v) = scene_triangle.triangle.intersect_ray(&ray, query.tnear, query.tfar)?;
                Some(RayHit {
                    geometry_id: scene_triangle.geometry_id,
                    primitive_id: scene_triangle.primitive_id,
                    t,
                    u,
                    v,
                    geometric_normal: scene_triangle.triangle.geometric_normal(),
                })
            })
            .collect();

        hits.sort_by(|a, b| a.t.total_cmp(&b.t));
        hits.into_iter()
            .find(|hit| filter(hit, &self.geometries[hit.geometry_id as usize]))
    }

    fn interpolate(&self, hit: &RayHit, attribute: VertexAttribute) -> Vec3 {
        let mesh = &self.meshes[hit.geometry_id as usize];
        let base = hit.primitive_id as usize * 3;
        let [i0, i1, i2] = [
            mesh.indices[base] as usize,
            mesh.indices[base + 1] as usize,
            mesh.indices[base + 2] as usize,
        ];
        let weights = [1.0 - hit.u - hit.v, hit.u, hit.v];
        let blend2 = |values: &[Vec2]| {
            let uv = values[i0] * weights[0] + values[i1] * weights[1] + values[i2] * weights[2];
            Vec3::new(uv.x, uv.y, 0.0)
        };

        match attribute {
            VertexAttribute::LightmapUv => blend2(&mesh.lightmap_uvs),
            VertexAttribute::Uv => blend2(&mesh.uvs),
            VertexAttribute::Normal => {
                let normal = mesh.normals[i0] * weights[0] + mesh.normals[i1] * weights[1] + mesh.normals[i2] * weights[2];
                normal.try_normalize(0.0).unwrap_or_else(Vec3::zeros)
            }
        }
    }

    fn geometries(&self) -> &[RaytracerGeometry] {
        &self.geometries
    }

    fn backgrounds(&self) -> &[BakedSceneBackground] {
        &self.backgrounds
    }

    fn max_distance(&self) -> f32 {
        self.max_distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Vec4};
    use crate::scene::{procedural, Material};
    use approx::assert_relative_eq;

    fn two_quads() -> (StaticGeometry, StaticGeometry) {
        let near = procedural::quad_geometry("near", Mat4::new_translation(&Vec3::new(0.0, 0.0, 1.0)), Material::default());
        let mut far = procedural::quad_geometry("far", Mat4::identity(), Material::default());
        far.lightmap_index = Some(4);
        far.lightmap_scale_offset = Vec4::new(0.5, 0.5, 0.5, 0.0);
        (near, far)
    }

    #[test]
    fn test_closest_hit_and_filter_order() {
        let (near, far) = two_quads();
        let sources = [
            RaytracingGeometrySource { geometry: &near, direct_shadow_only: false },
            RaytracingGeometrySource { geometry: &far, direct_shadow_only: false },
        ];
        let scene = create_raytracer_scene(&sources, vec![BakedSceneBackground::default()]);
        assert_eq!(scene.num_triangles(), 4);

        let query = RayQuery::new(Vec3::new(0.2, -0.1, 5.0), Vec3::new(0.0, 0.0, -1.0), 10.0, GeometryMask::ALL);
        let hit = scene.intersect_closest(&query).unwrap();
        assert_eq!(scene.geometries()[hit.geometry_id as usize].object_index, 0);
        assert_relative_eq!(hit.t, 4.0, epsilon = 1e-5);

        let mut visited = Vec::new();
        let hit = scene
            .intersect(&query, &mut |hit, geometry| {
                visited.push(hit.t);
                geometry.object_index == 1
            })
            .unwrap();
        assert_eq!(scene.geometries()[hit.geometry_id as usize].object_index, 1);
        assert_eq!(visited.len(), 2);
        assert!(visited[0] < visited[1]);
    }

    #[test]
    fn test_mask_excludes_shadow_only_geometry() {
        let (near, far) = two_quads();
        let sources = [
            RaytracingGeometrySource { geometry: &near, direct_shadow_only: true },
            RaytracingGeometrySource { geometry: &far, direct_shadow_only: false },
        ];
        let scene = create_raytracer_scene(&sources, Vec::new());
        assert_eq!(scene.geometries()[0].lightmap_index, None);
        assert_eq!(scene.geometries()[1].lightmap_index, Some(4));

        let query = RayQuery::new(Vec3::new(0.2, -0.1, 5.0), Vec3::new(0.0, 0.0, -1.0), 10.0, GeometryMask::PRIMARY_LOD);
        let hit = scene.intersect_closest(&query).unwrap();
        assert_eq!(hit.geometry_id, 1);
        assert!(hit.geometric_normal.dot(&query.direction) < 0.0);
    }

    #[test]
    fn test_interpolated_lightmap_uv_is_in_chart_space() {
        let (_, far) = two_quads();
        let sources = [RaytracingGeometrySource { geometry: &far, direct_shadow_only: false }];
        let scene = create_raytracer_scene(&sources, Vec::new());

        let query = RayQuery::new(Vec3::new(0.1, -0.2, 1.0), Vec3::new(0.0, 0.0, -1.0), 10.0, GeometryMask::ALL);
        let hit = scene.intersect_closest(&query).unwrap();
        let uv = scene.interpolate(&hit, VertexAttribute::LightmapUv);
        assert_relative_eq!(uv.x, 0.8, epsilon = 1e-5);
        assert_relative_eq!(uv.y, 0.15, epsilon = 1e-5);
        let normal = scene.interpolate(&hit, VertexAttribute::Normal);
        assert_relative_eq!(normal, Vec3::z(), epsilon = 1e-5);
    }

    #[test]
    fn test_range_limits_hits() {
        let (near, _) = two_quads();
        let sources = [RaytracingGeometrySource { geometry: &near, direct_shadow_only: false }];
        let scene = create_raytracer_scene(&sources, Vec::new());
        let query = RayQuery::new(Vec3::new(0.2, -0.1, 5.0), Vec3::new(0.0, 0.0, -1.0), 3.0, GeometryMask::ALL);
        assert!(scene.intersect_closest(&query).is_none());
        assert!(scene.max_distance() >= 1.0);
    }

    #[test]
    fn test_max_distance_spans_room_diagonal() {
        let room = procedural::box_room(4.0, Vec3::zeros());
        let sources: Vec<_> = room
            .iter()
            .map(|geometry| RaytracingGeometrySource { geometry, direct_shadow_only: false })
            .collect();
        let scene = create_raytracer_scene(&sources, Vec::new());
        assert!(scene.max_distance() > 4.0 * 3.0_f32.sqrt());

        // Slanted ray across the room, longer than any side
        let origin = Vec3::new(-1.99, -1.99, -1.99);
        let direction = Vec3::new(1.0, 0.9, 0.8).normalize();
        let query = RayQuery::new(origin, direction, scene.max_distance(), GeometryMask::ALL);
        let hit = scene.intersect_closest(&query).unwrap();
        assert!(hit.t > 6.0);
        assert!(hit.t < scene.max_distance());
    }
}
