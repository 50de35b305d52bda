//! Scene access used by the incremental baker
//!
//! The baker never walks the scene directly. It asks a [`SceneCollector`] for chunks and
//! for everything near a chunk, and writes its results back through the same interface.
//! Queries take the chunk being processed so implementations may cache per chunk.

use slotmap::new_key_type;

use crate::foundation::math::{Vec3, Vec4};
use crate::spatial::{ChunkIndex, Frustum, AABB};

use super::{BakedLight, BakedSceneBackground, LightProbeGroup, LightProbeGroupBakedData, StaticGeometry};

new_key_type! {
    /// Handle of a static geometry
    pub struct GeometryKey;
    /// Handle of a light
    pub struct LightKey;
    /// Handle of a light probe group
    pub struct LightProbeGroupKey;
}

/// Scene partitioned into chunks
pub trait SceneCollector {
    /// Partition the scene. Chunk contents stay fixed until [`Self::unlock_scene`].
    fn lock_scene(&mut self, chunk_size: &Vec3);

    /// Release the partition
    fn unlock_scene(&mut self);

    /// Every non-empty chunk
    fn chunks(&self) -> Vec<ChunkIndex>;

    /// Backgrounds indexed by background id
    fn backgrounds(&self) -> Vec<BakedSceneBackground>;

    /// Path of the scene file, used to derive the output directory
    fn scene_file_name(&self) -> Option<String>;

    /// Geometries owned by a chunk
    fn unique_geometries(&self, chunk: &ChunkIndex) -> Vec<GeometryKey>;

    /// Light probe groups owned by a chunk
    fn unique_light_probe_groups(&self, chunk: &ChunkIndex) -> Vec<LightProbeGroupKey>;

    /// Make lightmap placements of the chunk's geometries visible to later queries
    fn commit_geometries(&mut self, chunk: &ChunkIndex);

    /// Lights affecting a volume
    fn lights_in_bounding_box(&self, chunk: &ChunkIndex, bounding_box: &AABB) -> Vec<LightKey>;

    /// Geometries overlapping a volume
    fn geometries_in_bounding_box(&self, chunk: &ChunkIndex, bounding_box: &AABB) -> Vec<GeometryKey>;

    /// Light probe groups overlapping a volume
    fn light_probe_groups_in_bounding_box(&self, chunk: &ChunkIndex, bounding_box: &AABB) -> Vec<LightProbeGroupKey>;

    /// Lights affecting a frustum
    fn lights_in_frustum(&self, chunk: &ChunkIndex, frustum: &Frustum) -> Vec<LightKey>;

    /// Geometries overlapping a frustum
    fn geometries_in_frustum(&self, chunk: &ChunkIndex, frustum: &Frustum) -> Vec<GeometryKey>;

    /// Light probe groups overlapping a frustum
    fn light_probe_groups_in_frustum(&self, chunk: &ChunkIndex, frustum: &Frustum) -> Vec<LightProbeGroupKey>;

    /// Geometry by key
    fn geometry(&self, key: GeometryKey) -> Option<&StaticGeometry>;

    /// Light by key
    fn light(&self, key: LightKey) -> Option<&BakedLight>;

    /// Light probe group by key
    fn light_probe_group(&self, key: LightProbeGroupKey) -> Option<&LightProbeGroup>;

    /// Assign a lightmap region. Takes effect on [`Self::commit_geometries`].
    fn set_lightmap_placement(&mut self, key: GeometryKey, lightmap_index: u32, scale_offset: Vec4);

    /// Assign the file baked probe data is written to
    fn set_light_probe_baked_data_file(&mut self, key: LightProbeGroupKey, path: String);

    /// Store baked probe data in the group
    fn commit_light_probe_group(&mut self, key: LightProbeGroupKey, data: LightProbeGroupBakedData);

    /// Register lightmap files by lightmap index
    fn set_lightmaps(&mut self, lightmaps: Vec<(u32, String)>);
}
