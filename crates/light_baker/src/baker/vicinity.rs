//! Everything needed to bake the lightmaps and probes of one chunk
//!
//! The vicinity of a chunk holds its own geometry buffers, the lights that reach it, the
//! probes it owns followed by nearby probes, and a ray scene of every object that can
//! cast light or shadow onto it.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::config::LightBakingSettings;
use crate::foundation::logging::{debug, error};
use crate::geometry_buffer::{
    generate_geometry_baking_scenes, map_geometry_ids_to_raytracer, preprocess_geometry_buffer,
    GeometryBufferBaker, LightmapChartGeometryBuffer, EMPTY_GEOMETRY_ID,
};
use crate::raytracing::{create_raytracer_scene, RayIntersectionService, RaytracingGeometrySource};
use crate::scene::{BakedLight, GeometryKey, LightProbeCollection, LightProbeGroupKey, LightType, SceneCollector, StaticGeometry};
use crate::spatial::{chunk_bounding_box, ChunkIndex, Frustum};

/// Baking inputs of one chunk
pub struct BakedSceneChunkVicinity {
    /// Lightmaps owned by the chunk
    pub lightmaps: Vec<u32>,
    /// Geometry buffer per owned lightmap
    pub geometry_buffers: Vec<LightmapChartGeometryBuffer>,
    /// Objects that affect the chunk
    pub raytracing_scene: Arc<dyn RayIntersectionService>,
    /// Lights that reach the chunk
    pub lights: Vec<BakedLight>,
    /// Probes owned by the chunk, then nearby probes
    pub light_probes: LightProbeCollection,
    /// Ray geometry id per geometry buffer id
    pub geometry_buffer_to_raytracer: Vec<u32>,
    /// Lightmaps whose direct light the ray scene references
    pub required_direct_lightmaps: Vec<u32>,
}

impl std::fmt::Debug for BakedSceneChunkVicinity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BakedSceneChunkVicinity")
            .field("lightmaps", &self.lightmaps)
            .field("num_geometries", &self.raytracing_scene.geometries().len())
            .field("num_lights", &self.lights.len())
            .field("num_probes", &self.light_probes.num_probes())
            .field("required_direct_lightmaps", &self.required_direct_lightmaps)
            .finish()
    }
}

fn push_unique<K: Copy + Eq + std::hash::Hash>(keys: &mut Vec<K>, seen: &mut HashSet<K>, extra: impl IntoIterator<Item = K>) {
    for key in extra {
        if seen.insert(key) {
            keys.push(key);
        }
    }
}

fn resolve_geometries<'a>(collector: &'a dyn SceneCollector, keys: &[GeometryKey]) -> Vec<&'a StaticGeometry> {
    keys.iter().filter_map(|key| collector.geometry(*key)).collect()
}

/// Zero geometry ids of texels whose geometry has no ray scene counterpart
fn clear_unmapped_texels(buffer: &mut LightmapChartGeometryBuffer, mapping: &[Option<u32>]) -> usize {
    let mut num_cleared = 0;
    for geometry_id in &mut buffer.geometry_ids {
        if *geometry_id != EMPTY_GEOMETRY_ID && mapping.get(*geometry_id as usize).copied().flatten().is_none() {
            *geometry_id = EMPTY_GEOMETRY_ID;
            num_cleared += 1;
        }
    }
    num_cleared
}

/// Gather and prepare the baking inputs of a chunk.
///
/// Charts of the chunk's geometries must already be committed to the collector.
pub fn create_baked_scene_chunk_vicinity(
    collector: &dyn SceneCollector,
    chunk: &ChunkIndex,
    settings: &LightBakingSettings,
    geometry_buffer_baker: &dyn GeometryBufferBaker,
) -> BakedSceneChunkVicinity {
    let incremental = &settings.incremental;
    let bounding_box = chunk_bounding_box(chunk, &incremental.chunk_size);
    let padded_bounding_box = bounding_box.padded(incremental.indirect_padding);

    let lights: Vec<BakedLight> = collector
        .lights_in_bounding_box(chunk, &bounding_box)
        .into_iter()
        .filter_map(|key| collector.light(key).cloned())
        .collect();

    // Owned geometries come first so that object indices agree between geometry buffers
    // and the ray scene
    let unique_geometries = collector.unique_geometries(chunk);
    let mut seen = HashSet::new();
    let mut indirect_geometries = Vec::new();
    push_unique(&mut indirect_geometries, &mut seen, unique_geometries.iter().copied());
    push_unique(&mut indirect_geometries, &mut seen, collector.geometries_in_bounding_box(chunk, &padded_bounding_box));

    let mut shadow_geometries = Vec::new();
    for light in lights.iter().filter(|light| light.light_type == LightType::Directional) {
        let frustum = Frustum::from_light_extrusion(
            &bounding_box,
            &light.direction,
            incremental.directional_light_shadow_distance,
        );
        push_unique(&mut shadow_geometries, &mut seen, collector.geometries_in_frustum(chunk, &frustum));
    }

    let owned_objects = resolve_geometries(collector, &unique_geometries);
    let indirect_objects = resolve_geometries(collector, &indirect_geometries);
    let shadow_objects = resolve_geometries(collector, &shadow_geometries);
    let sources: Vec<RaytracingGeometrySource<'_>> = indirect_objects
        .iter()
        .map(|geometry| RaytracingGeometrySource { geometry: *geometry, direct_shadow_only: false })
        .chain(
            shadow_objects
                .iter()
                .map(|geometry| RaytracingGeometrySource { geometry: *geometry, direct_shadow_only: true }),
        )
        .collect();
    let raytracing_scene = create_raytracer_scene(&sources, collector.backgrounds());

    let required_direct_lightmaps: Vec<u32> = raytracing_scene
        .geometries()
        .iter()
        .filter_map(|geometry| geometry.lightmap_index)
        .collect::<BTreeSet<u32>>()
        .into_iter()
        .collect();

    let baking_scenes = generate_geometry_baking_scenes(&owned_objects, settings.charting.lightmap_size, &settings.geometry_buffer);
    let mapping = map_geometry_ids_to_raytracer(&baking_scenes.id_to_object, raytracing_scene.geometries());
    let geometry_buffer_to_raytracer: Vec<u32> = mapping.iter().map(|id| id.unwrap_or_default()).collect();

    let mut lightmaps = Vec::with_capacity(baking_scenes.scenes.len());
    let mut geometry_buffers = Vec::with_capacity(baking_scenes.scenes.len());
    for scene in &baking_scenes.scenes {
        let mut buffer = geometry_buffer_baker.bake(scene);
        let num_cleared = clear_unmapped_texels(&mut buffer, &mapping);
        if num_cleared > 0 {
            error!(
                "Lightmap {} has {} texels of geometry missing from the ray scene of chunk [{}, {}, {}]",
                scene.lightmap_index, num_cleared, chunk.x, chunk.y, chunk.z
            );
        }
        preprocess_geometry_buffer(&mut buffer, &raytracing_scene, &geometry_buffer_to_raytracer, &settings.preprocess);

        lightmaps.push(scene.lightmap_index);
        geometry_buffers.push(buffer);
    }

    let unique_groups = collector.unique_light_probe_groups(chunk);
    let mut seen_groups = HashSet::new();
    let mut group_keys: Vec<LightProbeGroupKey> = Vec::new();
    push_unique(&mut group_keys, &mut seen_groups, unique_groups.iter().copied());
    push_unique(&mut group_keys, &mut seen_groups, collector.light_probe_groups_in_bounding_box(chunk, &padded_bounding_box));

    let mut light_probes = LightProbeCollection::default();
    for key in &group_keys {
        if let Some(group) = collector.light_probe_group(*key) {
            light_probes.add_group(group);
        }
    }
    light_probes.num_unique_groups = unique_groups.len();

    debug!(
        "Chunk [{}, {}, {}]: {} lightmaps, {} lights, {} ray geometries, {} probes",
        chunk.x,
        chunk.y,
        chunk.z,
        lightmaps.len(),
        lights.len(),
        raytracing_scene.geometries().len(),
        light_probes.num_probes()
    );

    BakedSceneChunkVicinity {
        lightmaps,
        geometry_buffers,
        raytracing_scene: Arc::new(raytracing_scene),
        lights,
        light_probes,
        geometry_buffer_to_raytracer,
        required_direct_lightmaps,
    }
}
