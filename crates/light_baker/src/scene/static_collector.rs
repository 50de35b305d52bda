//! In-memory scene collector
//!
//! Holds plain scene objects in slot maps. Objects are owned by the chunk containing the
//! center of their world bounding box. Spatial queries scan every object, which is fine
//! for the scene sizes this collector is meant for.

use std::collections::HashMap;

use slotmap::SlotMap;

use crate::foundation::logging::debug;
use crate::foundation::math::{Vec3, Vec4};
use crate::spatial::{chunk_of_position, sort_chunks, ChunkIndex, Frustum, AABB};

use super::{
    BakedLight, BakedSceneBackground, GeometryKey, LightKey, LightProbeGroup, LightProbeGroupBakedData,
    LightProbeGroupKey, SceneCollector, StaticGeometry,
};

/// Scene collector over objects held in memory
#[derive(Debug, Default)]
pub struct StaticSceneCollector {
    geometries: SlotMap<GeometryKey, StaticGeometry>,
    lights: SlotMap<LightKey, BakedLight>,
    light_probe_groups: SlotMap<LightProbeGroupKey, LightProbeGroup>,
    backgrounds: Vec<BakedSceneBackground>,
    scene_file_name: Option<String>,

    chunk_geometries: HashMap<ChunkIndex, Vec<GeometryKey>>,
    chunk_light_probe_groups: HashMap<ChunkIndex, Vec<LightProbeGroupKey>>,
    pending_placements: HashMap<GeometryKey, (u32, Vec4)>,
    lightmaps: Vec<(u32, String)>,
}

impl StaticSceneCollector {
    /// Create an empty scene with a black background
    pub fn new() -> Self {
        Self {
            backgrounds: vec![BakedSceneBackground::default()],
            ..Self::default()
        }
    }

    /// Set the scene file name
    pub fn with_scene_file_name(mut self, name: impl Into<String>) -> Self {
        self.scene_file_name = Some(name.into());
        self
    }

    /// Add a geometry
    pub fn add_geometry(&mut self, geometry: StaticGeometry) -> GeometryKey {
        self.geometries.insert(geometry)
    }

    /// Add a light
    pub fn add_light(&mut self, light: BakedLight) -> LightKey {
        self.lights.insert(light)
    }

    /// Add a light probe group
    pub fn add_light_probe_group(&mut self, group: LightProbeGroup) -> LightProbeGroupKey {
        self.light_probe_groups.insert(group)
    }

    /// Replace the background with the given id, growing the list as needed
    pub fn set_background(&mut self, id: u32, background: BakedSceneBackground) {
        let id = id as usize;
        if self.backgrounds.len() <= id {
            self.backgrounds.resize(id + 1, BakedSceneBackground::default());
        }
        self.backgrounds[id] = background;
    }

    /// Lightmap files registered by the last bake
    pub fn lightmaps(&self) -> &[(u32, String)] {
        &self.lightmaps
    }

    fn filter_lights(&self, mut predicate: impl FnMut(&AABB) -> bool) -> Vec<LightKey> {
        self.lights
            .iter()
            .filter(|(_, light)| light.bounding_box().map_or(true, |bounds| predicate(&bounds)))
            .map(|(key, _)| key)
            .collect()
    }

    fn filter_geometries(&self, mut predicate: impl FnMut(&AABB) -> bool) -> Vec<GeometryKey> {
        self.geometries
            .iter()
            .filter(|(_, geometry)| predicate(&geometry.world_bounding_box()))
            .map(|(key, _)| key)
            .collect()
    }

    fn filter_light_probe_groups(&self, mut predicate: impl FnMut(&AABB) -> bool) -> Vec<LightProbeGroupKey> {
        self.light_probe_groups
            .iter()
            .filter(|(_, group)| !group.probes.is_empty() && predicate(&group.world_bounding_box()))
            .map(|(key, _)| key)
            .collect()
    }
}

impl SceneCollector for StaticSceneCollector {
    fn lock_scene(&mut self, chunk_size: &Vec3) {
        self.chunk_geometries.clear();
        self.chunk_light_probe_groups.clear();

        for (key, geometry) in &self.geometries {
            let bounds = geometry.world_bounding_box();
            if !bounds.is_valid() {
                continue;
            }
            let chunk = chunk_of_position(&bounds.center(), chunk_size);
            self.chunk_geometries.entry(chunk).or_default().push(key);
        }

        for (key, group) in &self.light_probe_groups {
            let bounds = group.world_bounding_box();
            if !bounds.is_valid() {
                continue;
            }
            let chunk = chunk_of_position(&bounds.center(), chunk_size);
            self.chunk_light_probe_groups.entry(chunk).or_default().push(key);
        }

        debug!(
            "Scene locked: {} geometries and {} light probe groups in {} chunks",
            self.geometries.len(),
            self.light_probe_groups.len(),
            self.chunks().len()
        );
    }

    fn unlock_scene(&mut self) {
        self.chunk_geometries.clear();
        self.chunk_light_probe_groups.clear();
    }

    fn chunks(&self) -> Vec<ChunkIndex> {
        let mut chunks: Vec<ChunkIndex> = self
            .chunk_geometries
            .keys()
            .chain(self.chunk_light_probe_groups.keys())
            .copied()
            .collect();
        chunks.sort_by_key(|chunk| (chunk.x, chunk.y, chunk.z));
        chunks.dedup();
        sort_chunks(&mut chunks);
        chunks
    }

    fn backgrounds(&self) -> Vec<BakedSceneBackground> {
        self.backgrounds.clone()
    }

    fn scene_file_name(&self) -> Option<String> {
        self.scene_file_name.clone()
    }

    fn unique_geometries(&self, chunk: &ChunkIndex) -> Vec<GeometryKey> {
        self.chunk_geometries.get(chunk).cloned().unwrap_or_default()
    }

    fn unique_light_probe_groups(&self, chunk: &ChunkIndex) -> Vec<LightProbeGroupKey> {
        self.chunk_light_probe_groups.get(chunk).cloned().unwrap_or_default()
    }

    fn commit_geometries(&mut self, chunk: &ChunkIndex) {
        for key in self.unique_geometries(chunk) {
            let Some((lightmap_index, scale_offset)) = self.pending_placements.remove(&key) else {
                continue;
            };
            if let Some(geometry) = self.geometries.get_mut(key) {
                geometry.lightmap_index = Some(lightmap_index);
                geometry.lightmap_scale_offset = scale_offset;
            }
        }
    }

    fn lights_in_bounding_box(&self, _chunk: &ChunkIndex, bounding_box: &AABB) -> Vec<LightKey> {
        self.filter_lights(|bounds| bounds.intersects(bounding_box))
    }

    fn geometries_in_bounding_box(&self, _chunk: &ChunkIndex, bounding_box: &AABB) -> Vec<GeometryKey> {
        self.filter_geometries(|bounds| bounds.intersects(bounding_box))
    }

    fn light_probe_groups_in_bounding_box(&self, _chunk: &ChunkIndex, bounding_box: &AABB) -> Vec<LightProbeGroupKey> {
        self.filter_light_probe_groups(|bounds| bounds.intersects(bounding_box))
    }

    fn lights_in_frustum(&self, _chunk: &ChunkIndex, frustum: &Frustum) -> Vec<LightKey> {
        self.filter_lights(|bounds| frustum.intersects_aabb(bounds))
    }

    fn geometries_in_frustum(&self, _chunk: &ChunkIndex, frustum: &Frustum) -> Vec<GeometryKey> {
        self.filter_geometries(|bounds| frustum.intersects_aabb(bounds))
    }

    fn light_probe_groups_in_frustum(&self, _chunk: &ChunkIndex, frustum: &Frustum) -> Vec<LightProbeGroupKey> {
        self.filter_light_probe_groups(|bounds| frustum.intersects_aabb(bounds))
    }

    fn geometry(&self, key: GeometryKey) -> Option<&StaticGeometry> {
        self.geometries.get(key)
    }

    fn light(&self, key: LightKey) -> Option<&BakedLight> {
        self.lights.get(key)
    }

    fn light_probe_group(&self, key: LightProbeGroupKey) -> Option<&LightProbeGroup> {
        self.light_probe_groups.get(key)
    }

    fn set_lightmap_placement(&mut self, key: GeometryKey, lightmap_index: u32, scale_offset: Vec4) {
        self.pending_placements.insert(key, (lightmap_index, scale_offset));
    }

    fn set_light_probe_baked_data_file(&mut self, key: LightProbeGroupKey, path: String) {
        if let Some(group) = self.light_probe_groups.get_mut(key) {
            group.baked_data_file = Some(path);
        }
    }

    fn commit_light_probe_group(&mut self, key: LightProbeGroupKey, data: LightProbeGroupBakedData) {
        if let Some(group) = self.light_probe_groups.get_mut(key) {
            group.baked_data = Some(data);
        }
    }

    fn set_lightmaps(&mut self, lightmaps: Vec<(u32, String)>) {
        self.lightmaps = lightmaps;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4;
    use crate::scene::procedural;
    use crate::scene::Material;

    fn quad_at(collector: &mut StaticSceneCollector, center: Vec3) -> GeometryKey {
        let geometry = procedural::quad_geometry("quad", Mat4::new_translation(&center), Material::default());
        collector.add_geometry(geometry)
    }

    #[test]
    fn test_geometries_are_owned_by_center_chunk() {
        let mut collector = StaticSceneCollector::new();
        let a = quad_at(&mut collector, Vec3::new(1.0, 1.0, 1.0));
        let b = quad_at(&mut collector, Vec3::new(15.0, 1.0, 1.0));
        collector.lock_scene(&Vec3::new(10.0, 10.0, 10.0));

        let chunks = collector.chunks();
        assert_eq!(chunks, vec![ChunkIndex::new(0, 0, 0), ChunkIndex::new(1, 0, 0)]);
        assert_eq!(collector.unique_geometries(&chunks[0]), vec![a]);
        assert_eq!(collector.unique_geometries(&chunks[1]), vec![b]);
    }

    #[test]
    fn test_placement_applies_on_commit() {
        let mut collector = StaticSceneCollector::new();
        let key = quad_at(&mut collector, Vec3::zeros());
        collector.lock_scene(&Vec3::new(10.0, 10.0, 10.0));
        let chunk = collector.chunks()[0];

        collector.set_lightmap_placement(key, 3, Vec4::new(0.5, 0.5, 0.0, 0.5));
        assert_eq!(collector.geometry(key).unwrap().lightmap_index, None);
        collector.commit_geometries(&chunk);
        assert_eq!(collector.geometry(key).unwrap().lightmap_index, Some(3));
    }

    #[test]
    fn test_directional_lights_are_everywhere() {
        let mut collector = StaticSceneCollector::new();
        let sun = collector.add_light(BakedLight::directional(-Vec3::y(), Vec3::new(1.0, 1.0, 1.0)));
        let lamp = collector.add_light(BakedLight::point(Vec3::new(100.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0), 5.0));

        let chunk = ChunkIndex::zeros();
        let bounds = AABB::new(Vec3::zeros(), Vec3::new(10.0, 10.0, 10.0));
        assert_eq!(collector.lights_in_bounding_box(&chunk, &bounds), vec![sun]);
        let far = AABB::new(Vec3::new(98.0, -1.0, -1.0), Vec3::new(99.0, 1.0, 1.0));
        assert_eq!(collector.lights_in_bounding_box(&chunk, &far), vec![sun, lamp]);
    }
}
