//! Per-lightmap rasterization input

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::GeometryBufferSettings;
use crate::foundation::math::{Vec2, Vec3};
use crate::raytracing::RaytracerGeometry;
use crate::scene::{Material, StaticGeometry};

use super::seams::{collect_geometry_seams, LightmapSeam};

/// Geometry id of empty texels
pub const EMPTY_GEOMETRY_ID: u32 = 0;

/// Source of a geometry buffer id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryIdMapping {
    /// Position of the object in the baked object list
    pub object_index: u32,
    /// Part of the object
    pub geometry_index: u32,
    /// Level of detail of the part
    pub lod_index: u32,
}

/// World-space mesh of one LOD, ready to be rasterized into a chart
#[derive(Debug, Clone)]
pub struct BakingMesh {
    /// Id written into covered texels
    pub geometry_id: u32,
    /// Level of detail, LOD 0 is drawn last
    pub lod_index: u32,
    /// World positions
    pub positions: Vec<Vec3>,
    /// World smooth normals
    pub normals: Vec<Vec3>,
    /// Material texture coordinates
    pub uvs: Vec<Vec2>,
    /// Lightmap UVs in chart space
    pub lightmap_uvs: Vec<Vec2>,
    /// Three indices per triangle
    pub indices: Vec<u32>,
    /// Surface material
    pub material: Material,
    /// Object light mask
    pub light_mask: u32,
    /// Object background
    pub background_id: u32,
}

/// Everything rasterized into one lightmap chart
#[derive(Debug, Clone)]
pub struct GeometryBakingScene {
    /// Global lightmap index
    pub lightmap_index: u32,
    /// Chart width and height in texels
    pub lightmap_size: u32,
    /// Meshes of every LOD of every object in the chart
    pub meshes: Vec<BakingMesh>,
    /// Seams in chart UV space
    pub seams: Vec<LightmapSeam>,
    /// Offset along the face normal scaled with position magnitude
    pub scaled_position_bias: f32,
    /// Constant offset along the face normal
    pub constant_position_bias: f32,
}

/// Baking scenes of a set of objects together with their shared id table
#[derive(Debug, Clone, Default)]
pub struct GeometryBakingScenes {
    /// One scene per lightmap, ordered by lightmap index
    pub scenes: Vec<GeometryBakingScene>,
    /// Geometry id to source, entry 0 is the reserved empty id
    pub id_to_object: Vec<GeometryIdMapping>,
}

/// Group objects by lightmap and assign geometry ids.
///
/// Only lightmapped objects with an assigned chart take part. Ids are global over the
/// call and appended in object, part, LOD order. The object index of a mapping is the
/// position of the object in `geometries`.
pub fn generate_geometry_baking_scenes(
    geometries: &[&StaticGeometry],
    lightmap_size: u32,
    settings: &GeometryBufferSettings,
) -> GeometryBakingScenes {
    let mut id_to_object = vec![GeometryIdMapping::default()];
    let mut scenes: BTreeMap<u32, GeometryBakingScene> = BTreeMap::new();

    for (object_index, geometry) in geometries.iter().enumerate() {
        let Some(lightmap_index) = geometry.lightmap_index.filter(|_| geometry.bake_lightmap) else {
            continue;
        };

        let scene = scenes.entry(lightmap_index).or_insert_with(|| GeometryBakingScene {
            lightmap_index,
            lightmap_size,
            meshes: Vec::new(),
            seams: Vec::new(),
            scaled_position_bias: settings.scaled_position_bias,
            constant_position_bias: settings.constant_position_bias,
        });

        let normal_matrix = geometry.normal_matrix();
        for (geometry_index, part) in geometry.parts.iter().enumerate() {
            for (lod_index, lod) in part.lods.iter().enumerate() {
                let geometry_id = id_to_object.len() as u32;
                id_to_object.push(GeometryIdMapping {
                    object_index: object_index as u32,
                    geometry_index: geometry_index as u32,
                    lod_index: lod_index as u32,
                });

                scene.meshes.push(BakingMesh {
                    geometry_id,
                    lod_index: lod_index as u32,
                    positions: lod.vertices.iter().map(|vertex| geometry.world_position(&vertex.position)).collect(),
                    normals: lod
                        .vertices
                        .iter()
                        .map(|vertex| (normal_matrix * vertex.normal).try_normalize(0.0).unwrap_or_else(Vec3::zeros))
                        .collect(),
                    uvs: lod.vertices.iter().map(|vertex| vertex.uv).collect(),
                    lightmap_uvs: lod.vertices.iter().map(|vertex| geometry.chart_uv(&vertex.lightmap_uv)).collect(),
                    indices: lod.indices.clone(),
                    material: part.material.clone(),
                    light_mask: geometry.light_mask,
                    background_id: geometry.background_id,
                });
            }
        }

        scene.seams.extend(
            collect_geometry_seams(geometry)
                .iter()
                .map(|seam| seam.transformed(&geometry.lightmap_scale_offset)),
        );
    }

    GeometryBakingScenes {
        scenes: scenes.into_values().collect(),
        id_to_object,
    }
}

/// Ray geometry id of every geometry buffer id.
///
/// Both id spaces must come from the same object list. The reserved empty id and ids
/// without a matching ray geometry map to `None`.
pub fn map_geometry_ids_to_raytracer(
    id_to_object: &[GeometryIdMapping],
    geometries: &[RaytracerGeometry],
) -> Vec<Option<u32>> {
    let raytracer_ids: HashMap<(u32, u32, u32), u32> = geometries
        .iter()
        .enumerate()
        .map(|(id, geometry)| ((geometry.object_index, geometry.geometry_index, geometry.lod_index), id as u32))
        .collect();

    id_to_object
        .iter()
        .enumerate()
        .map(|(id, mapping)| {
            if id == EMPTY_GEOMETRY_ID as usize {
                return None;
            }
            raytracer_ids
                .get(&(mapping.object_index, mapping.geometry_index, mapping.lod_index))
                .copied()
        })
        .collect()
}
