//! # Incremental Light Baker
//!
//! Bakes a chunked scene one chunk at a time. Every stage is a step function over the
//! sorted chunk list that processes a single chunk per call and reports when the stage
//! is complete:
//!
//! 1. Charting assigns lightmap regions and probe data files.
//! 2. Vicinity building rasterizes geometry buffers and builds ray scenes.
//! 3. Direct light is traced for every lightmap.
//! 4. Indirect light is traced, filtered, stitched and saved, then probes are finished.
//! 5. Commit writes results back to the scene.
//!
//! Stages hand data to each other through a [`BakedLightCache`]. The baking state is
//! plain data and can be checkpointed with [`IncrementalLightBaker::checkpoint`].
//! Charting and commit need the scene collector and must run on the thread that owns
//! it. [`IncrementalLightBaker::bake`] does not and may run on a worker thread.

mod output;
mod status;
mod vicinity;

pub use output::{
    encode_lightmap_texel, resolve_output_directory, save_lightmap_png, write_placeholder_lightmap,
    LIGHTMAP_OUTPUT_SCALE,
};
pub use status::{BakerPhase, BakerStatus, StopToken};
pub use vicinity::{create_baked_scene_chunk_vicinity, BakedSceneChunkVicinity};

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::BakedLightCache;
use crate::charting::{apply_lightmap_charts, generate_lightmap_charts};
use crate::config::LightBakingSettings;
use crate::filter::{filter_direct_light, filter_indirect_light};
use crate::foundation::logging::{debug, error, info, warn};
use crate::foundation::math::{utils, Vec2, Vec3, Vec4};
use crate::geometry_buffer::GeometryBufferBaker;
use crate::light_tracer::{
    bake_direct_light_for_charts, bake_direct_light_for_light_probes, bake_emission_light,
    bake_indirect_light_for_charts, bake_indirect_light_for_light_probes, BakedLightmap, IndirectLightSources,
    LightProbeCollectionBakedData, LightmapChartBakedDirect, LightmapChartBakedIndirect, RandomStream, TracingPass,
};
use crate::scene::{GeometryKey, LightProbeGroupBakedData, SceneCollector, StaticGeometry};
use crate::spatial::{sort_chunks, ChunkIndex, TetrahedralMesh};
use crate::stitcher::stitch_lightmap_seams;

/// Errors that prevent a bake from starting
#[derive(thiserror::Error, Debug)]
pub enum BakeError {
    /// Settings are out of range
    #[error("Invalid settings: {0}")]
    Settings(String),

    /// Geometry buffer baker samples away from texel centers
    #[error("Geometry buffer baker uses pixel UV offset ({}, {}), expected zero", .0.x, .0.y)]
    PixelUvConvention(Vec2),

    /// Output directory cannot be derived or created
    #[error("Cannot find output directory for lightmaps: {0}")]
    OutputDirectory(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result of fallible baker operations
pub type BakeResult<T> = Result<T, BakeError>;

/// Position of a stage in the chunk list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkContext {
    /// Next chunk to process
    pub current_chunk_index: usize,
}

/// Stage of the bake together with its cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BakingState {
    /// Assigning lightmap regions
    Charting(ChunkContext),
    /// Building chunk vicinities
    Vicinity(ChunkContext),
    /// Tracing direct light
    DirectLight(ChunkContext),
    /// Tracing indirect light and writing lightmaps
    IndirectLight(ChunkContext),
    /// Results are ready to commit
    Baked,
    /// Results were written back to the scene
    Committed,
}

impl BakingState {
    fn ordinal(&self) -> u8 {
        match self {
            Self::Charting(_) => 0,
            Self::Vicinity(_) => 1,
            Self::DirectLight(_) => 2,
            Self::IndirectLight(_) => 3,
            Self::Baked => 4,
            Self::Committed => 5,
        }
    }
}

/// Baked probe data of the groups owned by a chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkLightProbes {
    /// Chunk
    pub chunk: ChunkIndex,
    /// Data per unique group, in collector order
    pub groups: Vec<LightProbeGroupBakedData>,
}

/// Serializable state of a bake in progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BakerCheckpoint {
    /// Current stage
    pub state: BakingState,
    /// Chunks in processing order
    pub chunks: Vec<ChunkIndex>,
    /// Directory results are written to
    pub output_directory: PathBuf,
    /// Lightmaps allocated by charting
    pub num_lightmap_charts: u32,
    /// Lightmaps owned by all built vicinities
    pub num_lightmaps_total: usize,
    /// Probe data waiting to be committed
    pub light_probes: Vec<ChunkLightProbes>,
    /// Lightmaps finished by the completed chunks of the current stage
    pub processed_lightmaps: usize,
    /// Last chunk cursor whose indirect pass reads the direct light of each lightmap
    pub direct_light_last_use: BTreeMap<u32, usize>,
}

/// Chunked lightmap and light probe baker
pub struct IncrementalLightBaker {
    settings: LightBakingSettings,
    cache: Arc<dyn BakedLightCache>,
    geometry_buffer_baker: Arc<dyn GeometryBufferBaker>,
    status: Arc<BakerStatus>,
    checkpoint: BakerCheckpoint,
}

fn advance(
    chunks: &[ChunkIndex],
    next_chunk_index: usize,
    current: fn(ChunkContext) -> BakingState,
    next: BakingState,
) -> (BakingState, bool) {
    if next_chunk_index < chunks.len() {
        (current(ChunkContext { current_chunk_index: next_chunk_index }), false)
    } else {
        (next, true)
    }
}

impl IncrementalLightBaker {
    /// Validate settings, resolve the output directory and lock the scene.
    ///
    /// # Arguments
    /// * `settings` - Settings of every pass
    /// * `collector` - Scene to bake, locked until [`Self::commit_scene`]
    /// * `cache` - Storage for intermediate results
    /// * `geometry_buffer_baker` - Rasterizer of geometry buffers
    pub fn initialize(
        settings: LightBakingSettings,
        collector: &mut dyn SceneCollector,
        cache: Arc<dyn BakedLightCache>,
        geometry_buffer_baker: Arc<dyn GeometryBufferBaker>,
    ) -> BakeResult<Self> {
        settings.validate().map_err(BakeError::Settings)?;

        let pixel_uv_offset = geometry_buffer_baker.pixel_uv_offset();
        if pixel_uv_offset != Vec2::zeros() {
            return Err(BakeError::PixelUvConvention(pixel_uv_offset));
        }

        let scene_file_name = collector.scene_file_name();
        let output_directory = resolve_output_directory(&settings.incremental, scene_file_name.as_deref())?;

        collector.lock_scene(&settings.incremental.chunk_size);
        let mut chunks = collector.chunks();
        sort_chunks(&mut chunks);
        info!("Light baking initialized with {} chunks", chunks.len());

        let checkpoint = BakerCheckpoint {
            state: BakingState::Charting(ChunkContext::default()),
            chunks,
            output_directory,
            num_lightmap_charts: 0,
            num_lightmaps_total: 0,
            light_probes: Vec::new(),
            processed_lightmaps: 0,
            direct_light_last_use: BTreeMap::new(),
        };
        Ok(Self::from_checkpoint(settings, cache, geometry_buffer_baker, checkpoint))
    }

    /// Resume a bake from a checkpoint.
    ///
    /// The cache must be the one the checkpointed baker used, and the settings must match.
    /// Status counters start from the work the checkpoint already holds.
    pub fn from_checkpoint(
        settings: LightBakingSettings,
        cache: Arc<dyn BakedLightCache>,
        geometry_buffer_baker: Arc<dyn GeometryBufferBaker>,
        checkpoint: BakerCheckpoint,
    ) -> Self {
        let status = BakerStatus::default();
        let phase = match checkpoint.state {
            BakingState::DirectLight(_) => Some(BakerPhase::BakingDirectLighting),
            BakingState::IndirectLight(_) => Some(BakerPhase::BakingIndirectLighting),
            BakingState::Baked => {
                status.set_phase(BakerPhase::Finalizing);
                None
            }
            _ => None,
        };
        if let Some(phase) = phase {
            status.begin_phase(phase, checkpoint.num_lightmaps_total);
            status.set_processed_lightmaps(checkpoint.processed_lightmaps);
        }

        Self {
            settings,
            cache,
            geometry_buffer_baker,
            status: Arc::new(status),
            checkpoint,
        }
    }

    /// Snapshot of the baking state
    pub fn checkpoint(&self) -> BakerCheckpoint {
        self.checkpoint.clone()
    }

    /// Current stage
    pub fn state(&self) -> BakingState {
        self.checkpoint.state
    }

    /// Chunks in processing order
    pub fn chunks(&self) -> &[ChunkIndex] {
        &self.checkpoint.chunks
    }

    /// Directory results are written to
    pub fn output_directory(&self) -> &Path {
        &self.checkpoint.output_directory
    }

    /// Progress shared with other threads
    pub fn status(&self) -> Arc<BakerStatus> {
        Arc::clone(&self.status)
    }

    /// Number of lightmaps allocated by charting
    pub fn num_lightmaps(&self) -> u32 {
        self.checkpoint.num_lightmap_charts
    }

    /// Final lighting of a lightmap, available from its indirect pass until commit
    pub fn load_lightmap(&self, lightmap_index: u32) -> Option<Arc<BakedLightmap>> {
        self.cache.load_lightmap(lightmap_index).ok()
    }

    /// Path of a lightmap image
    pub fn lightmap_path(&self, lightmap_index: u32) -> PathBuf {
        self.checkpoint
            .output_directory
            .join(self.settings.incremental.lightmap_file_name(lightmap_index))
    }

    /// Path of the baked data of a probe group owned by a chunk
    pub fn light_probe_group_path(&self, chunk: &ChunkIndex, group: usize) -> PathBuf {
        self.checkpoint
            .output_directory
            .join(self.settings.incremental.light_probe_group_file_name([chunk.x, chunk.y, chunk.z], group))
    }

    fn cursor(&self, ordinal: u8) -> Result<usize, bool> {
        let state = self.checkpoint.state;
        match state {
            BakingState::Charting(context)
            | BakingState::Vicinity(context)
            | BakingState::DirectLight(context)
            | BakingState::IndirectLight(context)
                if state.ordinal() == ordinal =>
            {
                Ok(context.current_chunk_index)
            }
            _ => Err(state.ordinal() > ordinal),
        }
    }

    /// Chart the geometries and assign probe files of the next chunk.
    ///
    /// Returns `true` once every chunk is charted.
    pub fn step_charting(&mut self, collector: &mut dyn SceneCollector) -> bool {
        let chunk_index = match self.cursor(0) {
            Ok(chunk_index) => chunk_index,
            Err(done) => return done,
        };
        if chunk_index == 0 {
            self.checkpoint.num_lightmap_charts = 0;
        }

        if let Some(chunk) = self.checkpoint.chunks.get(chunk_index).copied() {
            let keys = collector.unique_geometries(&chunk);
            let geometries: Vec<(GeometryKey, &StaticGeometry)> = keys
                .iter()
                .filter_map(|key| collector.geometry(*key).map(|geometry| (*key, geometry)))
                .collect();
            let charts = generate_lightmap_charts(&geometries, &self.settings.charting, self.checkpoint.num_lightmap_charts);
            apply_lightmap_charts(collector, &charts);
            collector.commit_geometries(&chunk);
            self.checkpoint.num_lightmap_charts += charts.len() as u32;

            for (group, key) in collector.unique_light_probe_groups(&chunk).into_iter().enumerate() {
                let path = self.light_probe_group_path(&chunk, group);
                collector.set_light_probe_baked_data_file(key, path.to_string_lossy().into_owned());
            }
        }

        let (state, done) = advance(
            &self.checkpoint.chunks,
            chunk_index + 1,
            BakingState::Charting,
            BakingState::Vicinity(ChunkContext::default()),
        );
        self.checkpoint.state = state;
        if done {
            self.write_placeholder_lightmaps();
        }
        done
    }

    fn write_placeholder_lightmaps(&self) {
        for lightmap_index in 0..self.checkpoint.num_lightmap_charts {
            let path = self.lightmap_path(lightmap_index);
            if let Err(err) = write_placeholder_lightmap(&path) {
                error!("Cannot write placeholder lightmap '{}': {}", path.display(), err);
            }
        }
    }

    /// Build and cache the vicinity of the next chunk.
    ///
    /// Returns `true` once every vicinity is built.
    pub fn step_vicinity(&mut self, collector: &dyn SceneCollector) -> bool {
        let chunk_index = match self.cursor(1) {
            Ok(chunk_index) => chunk_index,
            Err(done) => return done,
        };
        if chunk_index == 0 {
            self.checkpoint.num_lightmaps_total = 0;
            self.checkpoint.direct_light_last_use.clear();
        }

        if let Some(chunk) = self.checkpoint.chunks.get(chunk_index).copied() {
            let vicinity =
                create_baked_scene_chunk_vicinity(collector, &chunk, &self.settings, self.geometry_buffer_baker.as_ref());
            self.checkpoint.num_lightmaps_total += vicinity.lightmaps.len();
            for lightmap_index in vicinity.lightmaps.iter().chain(&vicinity.required_direct_lightmaps) {
                let last_use = self.checkpoint.direct_light_last_use.entry(*lightmap_index).or_insert(chunk_index);
                *last_use = (*last_use).max(chunk_index);
            }
            if let Err(err) = self.cache.store_vicinity(chunk, vicinity) {
                error!("Cannot store vicinity of chunk {}: {}", format_chunk(&chunk), err);
            }
        }

        let (state, done) = advance(
            &self.checkpoint.chunks,
            chunk_index + 1,
            BakingState::Vicinity,
            BakingState::DirectLight(ChunkContext::default()),
        );
        self.checkpoint.state = state;
        done
    }

    /// Run charting and vicinity building for every chunk
    pub fn process_scene(&mut self, collector: &mut dyn SceneCollector) {
        while !self.step_charting(collector) {}
        while !self.step_vicinity(collector) {}
    }

    /// Trace direct light of the lightmaps of the next chunk.
    ///
    /// Returns `true` once every chunk is done. A stop request leaves the cursor on the
    /// current chunk.
    pub fn step_direct(&mut self, stop_token: &StopToken) -> bool {
        let chunk_index = match self.cursor(2) {
            Ok(chunk_index) => chunk_index,
            Err(done) => return done,
        };
        if chunk_index == 0 {
            self.checkpoint.processed_lightmaps = 0;
        }
        self.begin_chunk_status(BakerPhase::BakingDirectLighting);

        if let Some(chunk) = self.checkpoint.chunks.get(chunk_index).copied() {
            if !self.bake_direct_for_chunk(&chunk, stop_token) {
                return false;
            }
        }
        self.checkpoint.processed_lightmaps = self.status.processed_lightmaps();

        let (state, done) = advance(
            &self.checkpoint.chunks,
            chunk_index + 1,
            BakingState::DirectLight,
            BakingState::IndirectLight(ChunkContext::default()),
        );
        self.checkpoint.state = state;
        if done {
            self.checkpoint.processed_lightmaps = 0;
        }
        done
    }

    /// Enter a phase if needed and drop counts of a chunk that was interrupted
    fn begin_chunk_status(&self, phase: BakerPhase) {
        if self.status.phase() != phase {
            self.status.begin_phase(phase, self.checkpoint.num_lightmaps_total);
        }
        self.status.set_processed_lightmaps(self.checkpoint.processed_lightmaps);
    }

    fn bake_direct_for_chunk(&self, chunk: &ChunkIndex, stop_token: &StopToken) -> bool {
        let vicinity = match self.cache.load_vicinity(chunk) {
            Ok(vicinity) => vicinity,
            Err(err) => {
                error!("Cannot bake direct light of chunk {}: {}", format_chunk(chunk), err);
                return true;
            }
        };

        let settings = &self.settings;
        for (lightmap_index, buffer) in vicinity.lightmaps.iter().zip(&vicinity.geometry_buffers) {
            if stop_token.is_stopped() {
                return false;
            }

            let mut direct = LightmapChartBakedDirect::new(buffer.size);
            bake_emission_light(&mut direct, buffer, &settings.emission_tracing, &settings.properties);
            for (light_index, light) in vicinity.lights.iter().enumerate() {
                let random = RandomStream::new(
                    settings.random_seed,
                    TracingPass::DirectCharts,
                    u64::from(*lightmap_index),
                    light_index as u64,
                );
                bake_direct_light_for_charts(
                    &mut direct,
                    buffer,
                    vicinity.raytracing_scene.as_ref(),
                    &vicinity.geometry_buffer_to_raytracer,
                    light,
                    &settings.direct_chart_tracing,
                    random,
                );
            }

            if let Err(err) = self.cache.store_direct_light(*lightmap_index, direct) {
                error!("Cannot store direct light of lightmap {}: {}", lightmap_index, err);
            }
            self.status.lightmap_processed();
        }
        true
    }

    /// Trace indirect light of the next chunk, write its lightmaps and probe files.
    ///
    /// Returns `true` once every chunk is done. A stop request leaves the cursor on the
    /// current chunk.
    pub fn step_indirect(&mut self, stop_token: &StopToken) -> bool {
        let chunk_index = match self.cursor(3) {
            Ok(chunk_index) => chunk_index,
            Err(done) => return done,
        };
        if chunk_index == 0 {
            self.checkpoint.processed_lightmaps = 0;
        }
        self.begin_chunk_status(BakerPhase::BakingIndirectLighting);

        if let Some(chunk) = self.checkpoint.chunks.get(chunk_index).copied() {
            match self.bake_indirect_for_chunk(&chunk, chunk_index, stop_token) {
                Some(groups) => {
                    self.checkpoint.light_probes.retain(|probes| probes.chunk != chunk);
                    self.checkpoint.light_probes.push(ChunkLightProbes { chunk, groups });
                    self.cache.release_vicinity(&chunk);
                }
                None if stop_token.is_stopped() => return false,
                None => {}
            }
        }
        self.checkpoint.processed_lightmaps = self.status.processed_lightmaps();
        self.release_direct_lights(chunk_index);

        let (state, done) = advance(
            &self.checkpoint.chunks,
            chunk_index + 1,
            BakingState::IndirectLight,
            BakingState::Baked,
        );
        self.checkpoint.state = state;
        if done {
            self.status.set_phase(BakerPhase::Finalizing);
        }
        done
    }

    /// Release direct light no chunk after `chunk_index` reads
    fn release_direct_lights(&mut self, chunk_index: usize) {
        let cache = &self.cache;
        self.checkpoint.direct_light_last_use.retain(|lightmap_index, last_use| {
            if *last_use > chunk_index {
                return true;
            }
            cache.release_direct_light(*lightmap_index);
            false
        });
    }

    fn bake_indirect_for_chunk(
        &self,
        chunk: &ChunkIndex,
        chunk_index: usize,
        stop_token: &StopToken,
    ) -> Option<Vec<LightProbeGroupBakedData>> {
        let vicinity = match self.cache.load_vicinity(chunk) {
            Ok(vicinity) => vicinity,
            Err(err) => {
                error!("Cannot bake indirect light of chunk {}: {}", format_chunk(chunk), err);
                return None;
            }
        };
        let settings = &self.settings;
        let scene = vicinity.raytracing_scene.as_ref();
        let collection = &vicinity.light_probes;

        let mut direct_lights = HashMap::new();
        for lightmap_index in &vicinity.required_direct_lightmaps {
            match self.cache.load_direct_light(*lightmap_index) {
                Ok(direct) => {
                    direct_lights.insert(*lightmap_index, direct);
                }
                Err(err) => warn!("Indirect light of chunk {} ignores lightmap {}: {}", format_chunk(chunk), lightmap_index, err),
            }
        }

        let mut light_probes = LightProbeCollectionBakedData::new(collection.num_probes());
        let light_probe_mesh = TetrahedralMesh::new(&collection.world_positions);
        {
            let no_light_probes = LightProbeCollectionBakedData::default();
            let sources = IndirectLightSources {
                scene,
                direct_lights: &direct_lights,
                light_probe_mesh: &light_probe_mesh,
                light_probes: &no_light_probes,
            };
            let random = RandomStream::new(settings.random_seed, TracingPass::IndirectProbes, chunk_index as u64, 0);
            bake_indirect_light_for_light_probes(
                &mut light_probes,
                collection,
                &sources,
                &settings.indirect_probes_tracing,
                random,
            );
        }

        let sources = IndirectLightSources {
            scene,
            direct_lights: &direct_lights,
            light_probe_mesh: &light_probe_mesh,
            light_probes: &light_probes,
        };
        let lightmap_size = settings.charting.lightmap_size;
        let mut indirect = LightmapChartBakedIndirect::new(lightmap_size);
        let (mut direct_filtered, mut indirect_filtered, mut stitched) = (Vec::new(), Vec::new(), Vec::new());
        for (lightmap_index, buffer) in vicinity.lightmaps.iter().zip(&vicinity.geometry_buffers) {
            if stop_token.is_stopped() {
                return None;
            }

            let direct = match direct_lights.get(lightmap_index).cloned() {
                Some(direct) => direct,
                None => match self.cache.load_direct_light(*lightmap_index) {
                    Ok(direct) => direct,
                    Err(err) => {
                        error!("Cannot finish lightmap {}: {}", lightmap_index, err);
                        continue;
                    }
                },
            };

            indirect.reset();
            let random = RandomStream::new(settings.random_seed, TracingPass::IndirectCharts, u64::from(*lightmap_index), 0);
            bake_indirect_light_for_charts(
                &mut indirect,
                buffer,
                &sources,
                &vicinity.geometry_buffer_to_raytracer,
                &settings.indirect_chart_tracing,
                random,
            );
            indirect.normalize_light();

            filter_direct_light(&direct, &mut direct_filtered, buffer, &settings.direct_filter, settings.direct_chart_tracing.num_tasks);
            filter_indirect_light(
                &indirect,
                &mut indirect_filtered,
                buffer,
                &settings.indirect_filter,
                settings.indirect_chart_tracing.num_tasks,
            );
            let lighting: Vec<Vec3> = direct_filtered
                .iter()
                .zip(&indirect_filtered)
                .map(|(direct, indirect): (&Vec3, &Vec4)| utils::max_zero(direct) + utils::max_zero(&indirect.xyz()))
                .collect();

            stitch_lightmap_seams(&lighting, &mut stitched, buffer.size, &buffer.seams, &settings.stitching);

            let path = self.lightmap_path(*lightmap_index);
            if let Err(err) = save_lightmap_png(&path, buffer.size, &stitched) {
                error!("Cannot save lightmap '{}': {}", path.display(), err);
            }
            let lightmap = BakedLightmap { lightmap_size: buffer.size, lighting: stitched.clone() };
            if let Err(err) = self.cache.store_lightmap(*lightmap_index, lightmap) {
                error!("Cannot store lightmap {}: {}", lightmap_index, err);
            }
            self.status.lightmap_processed();
        }

        for (light_index, light) in vicinity.lights.iter().enumerate() {
            let random = RandomStream::new(
                settings.random_seed,
                TracingPass::DirectProbes,
                chunk_index as u64,
                light_index as u64,
            );
            bake_direct_light_for_light_probes(
                &mut light_probes,
                collection,
                scene,
                light,
                &settings.direct_probes_tracing,
                random,
            );
        }

        let num_unique_groups = collection.num_unique_groups.min(collection.num_groups());
        let mut groups = Vec::with_capacity(num_unique_groups);
        for group in 0..num_unique_groups {
            let data = light_probes.group_data(collection.group_range(group));
            let path = self.light_probe_group_path(chunk, group);
            if let Err(err) = data.save_to_file(&path) {
                error!(
                    "Cannot save light probes for group '{}' in chunk {}: {}",
                    collection.names[group],
                    format_chunk(chunk),
                    err
                );
            }
            groups.push(data);
        }
        debug!("Chunk {} baked", format_chunk(chunk));
        Some(groups)
    }

    /// Run the direct and indirect stages until done or stopped.
    ///
    /// Returns `false` when stopped. Calling again resumes where the bake stopped.
    pub fn bake(&mut self, stop_token: &StopToken) -> bool {
        loop {
            if stop_token.is_stopped() {
                return false;
            }
            if self.step_direct(stop_token) {
                break;
            }
        }
        loop {
            if stop_token.is_stopped() {
                return false;
            }
            if self.step_indirect(stop_token) {
                break;
            }
        }
        true
    }

    /// Write baked probe data and lightmap files back to the scene and unlock it
    pub fn commit_scene(&mut self, collector: &mut dyn SceneCollector) {
        if self.checkpoint.state != BakingState::Baked {
            warn!("Light baking results committed before baking finished");
        }

        for probes in &self.checkpoint.light_probes {
            let keys = collector.unique_light_probe_groups(&probes.chunk);
            for (key, data) in keys.into_iter().zip(&probes.groups) {
                collector.commit_light_probe_group(key, data.clone());
            }
        }

        let lightmaps = (0..self.checkpoint.num_lightmap_charts)
            .map(|lightmap_index| (lightmap_index, self.lightmap_path(lightmap_index).to_string_lossy().into_owned()))
            .collect();
        collector.set_lightmaps(lightmaps);
        collector.unlock_scene();
        for lightmap_index in 0..self.checkpoint.num_lightmap_charts {
            self.cache.release_lightmap(lightmap_index);
        }

        self.checkpoint.state = BakingState::Committed;
        info!("Light baking committed {} lightmaps", self.checkpoint.num_lightmap_charts);
    }
}

fn format_chunk(chunk: &ChunkIndex) -> String {
    format!("[{}, {}, {}]", chunk.x, chunk.y, chunk.z)
}
