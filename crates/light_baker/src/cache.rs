//! Storage of intermediate bake results
//!
//! Pipeline stages hand data to each other only through a [`BakedLightCache`]: chunk
//! vicinities, direct light per lightmap and final lightmaps. Loaded values are shared
//! with `Arc` so later stages may hold them while others are still stored.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::baker::BakedSceneChunkVicinity;
use crate::foundation::logging::debug;
use crate::light_tracer::{BakedLightmap, LightmapChartBakedDirect};
use crate::spatial::ChunkIndex;

/// Cache errors
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded or decoded
    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// Nothing stored under the key
    #[error("Missing cache entry: {0}")]
    Missing(String),
}

/// Result of cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Key-value storage shared by the baking stages.
///
/// Each key has at most one writer. Stores are visible to loads issued after they return.
pub trait BakedLightCache: Send + Sync {
    /// Store the vicinity of a chunk
    fn store_vicinity(&self, chunk: ChunkIndex, vicinity: BakedSceneChunkVicinity) -> CacheResult<()>;

    /// Load the vicinity of a chunk
    fn load_vicinity(&self, chunk: &ChunkIndex) -> CacheResult<Arc<BakedSceneChunkVicinity>>;

    /// Drop the vicinity of a chunk
    fn release_vicinity(&self, chunk: &ChunkIndex);

    /// Store direct light of a lightmap
    fn store_direct_light(&self, lightmap_index: u32, direct: LightmapChartBakedDirect) -> CacheResult<()>;

    /// Load direct light of a lightmap
    fn load_direct_light(&self, lightmap_index: u32) -> CacheResult<Arc<LightmapChartBakedDirect>>;

    /// Drop direct light of a lightmap
    fn release_direct_light(&self, lightmap_index: u32);

    /// Store a final lightmap
    fn store_lightmap(&self, lightmap_index: u32, lightmap: BakedLightmap) -> CacheResult<()>;

    /// Load a final lightmap
    fn load_lightmap(&self, lightmap_index: u32) -> CacheResult<Arc<BakedLightmap>>;

    /// Drop a final lightmap
    fn release_lightmap(&self, lightmap_index: u32);
}

fn missing_chunk(chunk: &ChunkIndex) -> CacheError {
    CacheError::Missing(format!("vicinity of chunk [{}, {}, {}]", chunk.x, chunk.y, chunk.z))
}

fn missing_lightmap(kind: &str, lightmap_index: u32) -> CacheError {
    CacheError::Missing(format!("{kind} of lightmap {lightmap_index}"))
}

/// Cache keeping everything in memory
#[derive(Default)]
pub struct BakedLightMemoryCache {
    vicinities: RwLock<HashMap<ChunkIndex, Arc<BakedSceneChunkVicinity>>>,
    direct_lights: RwLock<HashMap<u32, Arc<LightmapChartBakedDirect>>>,
    lightmaps: RwLock<HashMap<u32, Arc<BakedLightmap>>>,
}

impl BakedLightMemoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Indices of lightmaps with stored direct light
    pub fn direct_light_indices(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = self.direct_lights.read().keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    /// Indices of stored final lightmaps
    pub fn lightmap_indices(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = self.lightmaps.read().keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.vicinities.read().is_empty() && self.direct_lights.read().is_empty() && self.lightmaps.read().is_empty()
    }
}

impl BakedLightCache for BakedLightMemoryCache {
    fn store_vicinity(&self, chunk: ChunkIndex, vicinity: BakedSceneChunkVicinity) -> CacheResult<()> {
        self.vicinities.write().insert(chunk, Arc::new(vicinity));
        Ok(())
    }

    fn load_vicinity(&self, chunk: &ChunkIndex) -> CacheResult<Arc<BakedSceneChunkVicinity>> {
        self.vicinities.read().get(chunk).cloned().ok_or_else(|| missing_chunk(chunk))
    }

    fn release_vicinity(&self, chunk: &ChunkIndex) {
        self.vicinities.write().remove(chunk);
    }

    fn store_direct_light(&self, lightmap_index: u32, direct: LightmapChartBakedDirect) -> CacheResult<()> {
        self.direct_lights.write().insert(lightmap_index, Arc::new(direct));
        Ok(())
    }

    fn load_direct_light(&self, lightmap_index: u32) -> CacheResult<Arc<LightmapChartBakedDirect>> {
        self.direct_lights
            .read()
            .get(&lightmap_index)
            .cloned()
            .ok_or_else(|| missing_lightmap("direct light", lightmap_index))
    }

    fn release_direct_light(&self, lightmap_index: u32) {
        self.direct_lights.write().remove(&lightmap_index);
    }

    fn store_lightmap(&self, lightmap_index: u32, lightmap: BakedLightmap) -> CacheResult<()> {
        self.lightmaps.write().insert(lightmap_index, Arc::new(lightmap));
        Ok(())
    }

    fn load_lightmap(&self, lightmap_index: u32) -> CacheResult<Arc<BakedLightmap>> {
        self.lightmaps
            .read()
            .get(&lightmap_index)
            .cloned()
            .ok_or_else(|| missing_lightmap("lightmap", lightmap_index))
    }

    fn release_lightmap(&self, lightmap_index: u32) {
        self.lightmaps.write().remove(&lightmap_index);
    }
}

/// Cache writing light buffers to a directory as bincode files.
///
/// Vicinities hold a live ray scene and stay in memory.
pub struct BakedLightDiskCache {
    directory: PathBuf,
    vicinities: RwLock<HashMap<ChunkIndex, Arc<BakedSceneChunkVicinity>>>,
}

impl BakedLightDiskCache {
    /// Create a cache in `directory`, creating it if needed
    pub fn new(directory: impl Into<PathBuf>) -> CacheResult<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        debug!("Baked light cache at {}", directory.display());
        Ok(Self {
            directory,
            vicinities: RwLock::new(HashMap::new()),
        })
    }

    /// Directory holding the cached files
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn direct_light_path(&self, lightmap_index: u32) -> PathBuf {
        self.directory.join(format!("direct-{lightmap_index}.bin"))
    }

    fn lightmap_path(&self, lightmap_index: u32) -> PathBuf {
        self.directory.join(format!("lightmap-{lightmap_index}.bin"))
    }

    fn write<T: Serialize>(path: &Path, value: &T) -> CacheResult<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, value)?;
        Ok(())
    }

    fn read<T: DeserializeOwned>(path: &Path, kind: &str, lightmap_index: u32) -> CacheResult<Arc<T>> {
        if !path.exists() {
            return Err(missing_lightmap(kind, lightmap_index));
        }
        let reader = BufReader::new(File::open(path)?);
        Ok(Arc::new(bincode::deserialize_from(reader)?))
    }

    fn remove(path: &Path) {
        if let Err(error) = fs::remove_file(path) {
            if error.kind() != std::io::ErrorKind::NotFound {
                debug!("Cannot remove cached file {}: {error}", path.display());
            }
        }
    }
}

impl BakedLightCache for BakedLightDiskCache {
    fn store_vicinity(&self, chunk: ChunkIndex, vicinity: BakedSceneChunkVicinity) -> CacheResult<()> {
        self.vicinities.write().insert(chunk, Arc::new(vicinity));
        Ok(())
    }

    fn load_vicinity(&self, chunk: &ChunkIndex) -> CacheResult<Arc<BakedSceneChunkVicinity>> {
        self.vicinities.read().get(chunk).cloned().ok_or_else(|| missing_chunk(chunk))
    }

    fn release_vicinity(&self, chunk: &ChunkIndex) {
        self.vicinities.write().remove(chunk);
    }

    fn store_direct_light(&self, lightmap_index: u32, direct: LightmapChartBakedDirect) -> CacheResult<()> {
        Self::write(&self.direct_light_path(lightmap_index), &direct)
    }

    fn load_direct_light(&self, lightmap_index: u32) -> CacheResult<Arc<LightmapChartBakedDirect>> {
        Self::read(&self.direct_light_path(lightmap_index), "direct light", lightmap_index)
    }

    fn release_direct_light(&self, lightmap_index: u32) {
        Self::remove(&self.direct_light_path(lightmap_index));
    }

    fn store_lightmap(&self, lightmap_index: u32, lightmap: BakedLightmap) -> CacheResult<()> {
        Self::write(&self.lightmap_path(lightmap_index), &lightmap)
    }

    fn load_lightmap(&self, lightmap_index: u32) -> CacheResult<Arc<BakedLightmap>> {
        Self::read(&self.lightmap_path(lightmap_index), "lightmap", lightmap_index)
    }

    fn release_lightmap(&self, lightmap_index: u32) {
        Self::remove(&self.lightmap_path(lightmap_index));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    fn direct_light() -> LightmapChartBakedDirect {
        let mut direct = LightmapChartBakedDirect::new(2);
        direct.direct_light[1] = Vec3::new(1.0, 2.0, 3.0);
        direct.albedo[3] = Vec3::new(0.5, 0.5, 0.5);
        direct
    }

    fn exercise(cache: &dyn BakedLightCache) {
        assert!(matches!(cache.load_direct_light(4), Err(CacheError::Missing(_))));

        cache.store_direct_light(4, direct_light()).unwrap();
        assert_eq!(*cache.load_direct_light(4).unwrap(), direct_light());

        let mut lightmap = BakedLightmap::new(2);
        lightmap.lighting[0] = Vec3::new(0.25, 0.0, 0.0);
        cache.store_lightmap(4, lightmap.clone()).unwrap();
        assert_eq!(*cache.load_lightmap(4).unwrap(), lightmap);

        cache.release_direct_light(4);
        cache.release_lightmap(4);
        assert!(cache.load_direct_light(4).is_err());
        assert!(cache.load_lightmap(4).is_err());
        assert!(cache.load_vicinity(&ChunkIndex::new(0, 0, 0)).is_err());
    }

    #[test]
    fn test_memory_cache() {
        let cache = BakedLightMemoryCache::new();
        exercise(&cache);
        assert!(cache.is_empty());
        cache.store_direct_light(7, direct_light()).unwrap();
        cache.store_direct_light(2, direct_light()).unwrap();
        assert_eq!(cache.direct_light_indices(), vec![2, 7]);
    }

    #[test]
    fn test_disk_cache() {
        let directory = std::env::temp_dir().join(format!("light_baker_cache_{}", std::process::id()));
        let cache = BakedLightDiskCache::new(&directory).unwrap();
        exercise(&cache);

        cache.store_direct_light(1, direct_light()).unwrap();
        assert!(directory.join("direct-1.bin").exists());
        let reopened = BakedLightDiskCache::new(&directory).unwrap();
        assert_eq!(*reopened.load_direct_light(1).unwrap(), direct_light());

        let _ = fs::remove_dir_all(&directory);
    }
}
