//! # Light Baking Settings
//!
//! Every pass of the pipeline reads one section of [`LightBakingSettings`]. All fields
//! are optional in stored files and fall back to the defaults below.

use serde::{Deserialize, Serialize};

use super::Config;
use crate::foundation::math::Vec3;

/// Maximum supported filter kernel radius
pub const MAX_FILTER_KERNEL_RADIUS: u32 = 5;

/// Maximum supported number of indirect bounces
pub const MAX_BOUNCES: u32 = 8;

/// Lightmap atlas layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartingSettings {
    /// Width and height of every lightmap chart in texels
    pub lightmap_size: u32,
    /// Empty texels kept around every allocated region
    pub padding: u32,
    /// Texels per world unit
    pub texel_density: f32,
    /// Lower bound for the per-object lightmap scale
    pub min_object_scale: f32,
}

impl ChartingSettings {
    /// Create charting settings for the given atlas size
    pub fn new(lightmap_size: u32) -> Self {
        Self {
            lightmap_size,
            padding: 1,
            texel_density: 10.0,
            min_object_scale: 0.0,
        }
    }

    /// Set region padding
    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    /// Set texel density
    pub fn with_texel_density(mut self, texel_density: f32) -> Self {
        self.texel_density = texel_density;
        self
    }

    /// Validate charting parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.lightmap_size <= 2 * self.padding {
            return Err(format!(
                "Lightmap size {} leaves no room for padding {}",
                self.lightmap_size, self.padding
            ));
        }
        if self.texel_density <= 0.0 {
            return Err("Texel density must be positive".to_string());
        }
        Ok(())
    }
}

impl Default for ChartingSettings {
    fn default() -> Self {
        Self::new(512)
    }
}

/// Geometry buffer rasterization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryBufferSettings {
    /// Offset along the face normal, scaled with position magnitude
    pub scaled_position_bias: f32,
    /// Constant offset along the face normal
    pub constant_position_bias: f32,
}

impl Default for GeometryBufferSettings {
    fn default() -> Self {
        Self {
            scaled_position_bias: 0.001,
            constant_position_bias: 0.0,
        }
    }
}

/// Geometry buffer backface correction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryBufferPreprocessSettings {
    /// Number of parallel tasks, zero for one per thread
    pub num_tasks: usize,
    /// Backface bias scaled with position magnitude
    pub scaled_backface_bias: f32,
    /// Constant backface bias
    pub constant_backface_bias: f32,
}

impl Default for GeometryBufferPreprocessSettings {
    fn default() -> Self {
        Self {
            num_tasks: 0,
            scaled_backface_bias: 0.02,
            constant_backface_bias: 0.005,
        }
    }
}

/// Emission pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissionLightTracingSettings {
    /// Number of parallel tasks, zero for one per thread
    pub num_tasks: usize,
}

/// Direct light tracing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectLightTracingSettings {
    /// Number of parallel tasks, zero for one per thread
    pub num_tasks: usize,
    /// Samples per element for lights with non-zero size
    pub max_samples: u32,
}

impl DirectLightTracingSettings {
    /// Create with the given sample count
    pub fn new(max_samples: u32) -> Self {
        Self { num_tasks: 0, max_samples }
    }

    /// Validate sample count
    pub fn validate(&self) -> Result<(), String> {
        if self.max_samples == 0 {
            return Err("Direct light tracing needs at least one sample".to_string());
        }
        Ok(())
    }
}

impl Default for DirectLightTracingSettings {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Indirect light tracing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndirectLightTracingSettings {
    /// Number of parallel tasks, zero for one per thread
    pub num_tasks: usize,
    /// Paths traced per element
    pub max_samples: u32,
    /// Path segments per sample, zero disables the pass
    pub max_bounces: u32,
    /// Bounce origin offset scaled with position magnitude
    pub scaled_position_bounce_bias: f32,
    /// Constant bounce origin offset
    pub constant_position_bounce_bias: f32,
}

impl IndirectLightTracingSettings {
    /// Create with the given sample and bounce counts
    pub fn new(max_samples: u32, max_bounces: u32) -> Self {
        Self {
            num_tasks: 0,
            max_samples,
            max_bounces,
            scaled_position_bounce_bias: 0.0001,
            constant_position_bounce_bias: 0.0,
        }
    }

    /// Set bounce count
    pub fn with_max_bounces(mut self, max_bounces: u32) -> Self {
        self.max_bounces = max_bounces;
        self
    }

    /// Validate sample and bounce counts
    pub fn validate(&self) -> Result<(), String> {
        if self.max_samples == 0 {
            return Err("Indirect light tracing needs at least one sample".to_string());
        }
        if self.max_bounces > MAX_BOUNCES {
            return Err(format!("At most {MAX_BOUNCES} bounces are supported, got {}", self.max_bounces));
        }
        Ok(())
    }
}

impl Default for IndirectLightTracingSettings {
    fn default() -> Self {
        Self::new(10, 2)
    }
}

/// Edge-stopping lightmap filter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightmapFilterSettings {
    /// Kernel radius in texels, zero disables filtering
    pub kernel_radius: u32,
    /// Luminance difference falloff
    pub luminance_sigma: f32,
    /// Exponent of the normal similarity term
    pub normal_power: f32,
    /// Position difference falloff
    pub position_sigma: f32,
}

impl LightmapFilterSettings {
    /// Create with the given kernel radius
    pub fn new(kernel_radius: u32) -> Self {
        Self {
            kernel_radius,
            luminance_sigma: 10.0,
            normal_power: 4.0,
            position_sigma: 1.0,
        }
    }

    /// Validate kernel parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.kernel_radius > MAX_FILTER_KERNEL_RADIUS {
            return Err(format!(
                "Filter kernel radius {} exceeds {MAX_FILTER_KERNEL_RADIUS}",
                self.kernel_radius
            ));
        }
        if self.luminance_sigma <= 0.0 || self.position_sigma <= 0.0 {
            return Err("Filter sigmas must be positive".to_string());
        }
        Ok(())
    }
}

impl Default for LightmapFilterSettings {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Seam stitching
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightmapStitchingSettings {
    /// Diffusion passes, zero disables stitching
    pub num_iterations: u32,
    /// How far each seam texel moves toward the seam mean per pass
    pub blend_factor: f32,
}

impl Default for LightmapStitchingSettings {
    fn default() -> Self {
        Self {
            num_iterations: 8,
            blend_factor: 0.5,
        }
    }
}

/// Chunking and output layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IncrementalBakingSettings {
    /// World-space size of one chunk
    pub chunk_size: Vec3,
    /// Distance around a chunk whose geometry contributes indirect light
    pub indirect_padding: f32,
    /// How far toward a directional light shadow casters are collected
    pub directional_light_shadow_distance: f32,
    /// Output directory. Derived from the scene file name when unset.
    pub output_directory: Option<String>,
    /// Lightmap file name pattern, `{index}` is replaced with the lightmap index
    pub lightmap_name_format: String,
    /// Probe file name pattern with `{x}`, `{y}`, `{z}` and `{group}` placeholders
    pub light_probe_group_name_format: String,
}

impl IncrementalBakingSettings {
    /// Lightmap file name for the given index
    pub fn lightmap_file_name(&self, index: u32) -> String {
        self.lightmap_name_format.replace("{index}", &index.to_string())
    }

    /// Probe group file name for a chunk and group ordinal
    pub fn light_probe_group_file_name(&self, chunk: [i32; 3], group: usize) -> String {
        self.light_probe_group_name_format
            .replace("{x}", &chunk[0].to_string())
            .replace("{y}", &chunk[1].to_string())
            .replace("{z}", &chunk[2].to_string())
            .replace("{group}", &group.to_string())
    }

    /// Validate chunking and name patterns
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size.iter().any(|c| *c <= 0.0) {
            return Err("Chunk size must be positive on every axis".to_string());
        }
        if !self.lightmap_name_format.contains("{index}") {
            return Err("Lightmap name format must contain {index}".to_string());
        }
        if !self.light_probe_group_name_format.contains("{group}") {
            return Err("Light probe group name format must contain {group}".to_string());
        }
        Ok(())
    }
}

impl Default for IncrementalBakingSettings {
    fn default() -> Self {
        Self {
            chunk_size: Vec3::new(64.0, 64.0, 64.0),
            indirect_padding: 32.0,
            directional_light_shadow_distance: 128.0,
            output_directory: None,
            lightmap_name_format: "Lightmap-{index}.png".to_string(),
            light_probe_group_name_format: "LightProbes-{x}-{y}-{z}-{group}.bin".to_string(),
        }
    }
}

/// Scene-wide lighting properties
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneBakingProperties {
    /// Multiplier of emission when it seeds indirect light
    pub emission_brightness: f32,
}

impl Default for SceneBakingProperties {
    fn default() -> Self {
        Self { emission_brightness: 1.0 }
    }
}

/// Complete set of light baking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightBakingSettings {
    /// Chunking and output layout
    pub incremental: IncrementalBakingSettings,
    /// Lightmap atlas layout
    pub charting: ChartingSettings,
    /// Geometry buffer rasterization
    pub geometry_buffer: GeometryBufferSettings,
    /// Geometry buffer backface correction
    pub preprocess: GeometryBufferPreprocessSettings,
    /// Scene-wide properties
    pub properties: SceneBakingProperties,
    /// Emission pass
    pub emission_tracing: EmissionLightTracingSettings,
    /// Direct light for lightmaps
    pub direct_chart_tracing: DirectLightTracingSettings,
    /// Direct light for probes
    pub direct_probes_tracing: DirectLightTracingSettings,
    /// Indirect light for lightmaps
    pub indirect_chart_tracing: IndirectLightTracingSettings,
    /// Indirect light for probes
    pub indirect_probes_tracing: IndirectLightTracingSettings,
    /// Direct light filter
    pub direct_filter: LightmapFilterSettings,
    /// Indirect light filter
    pub indirect_filter: LightmapFilterSettings,
    /// Seam stitching
    pub stitching: LightmapStitchingSettings,
    /// Seed of all Monte-Carlo passes
    pub random_seed: u64,
}

impl LightBakingSettings {
    /// Create default settings
    pub fn new() -> Self {
        Self {
            incremental: IncrementalBakingSettings::default(),
            charting: ChartingSettings::default(),
            geometry_buffer: GeometryBufferSettings::default(),
            preprocess: GeometryBufferPreprocessSettings::default(),
            properties: SceneBakingProperties::default(),
            emission_tracing: EmissionLightTracingSettings::default(),
            direct_chart_tracing: DirectLightTracingSettings::new(10),
            direct_probes_tracing: DirectLightTracingSettings::new(32),
            indirect_chart_tracing: IndirectLightTracingSettings::new(10, 2),
            indirect_probes_tracing: IndirectLightTracingSettings::new(64, 2),
            direct_filter: LightmapFilterSettings::new(1),
            indirect_filter: LightmapFilterSettings::new(2),
            stitching: LightmapStitchingSettings::default(),
            random_seed: 0x5EED,
        }
    }

    /// Set the output directory
    pub fn with_output_directory(mut self, directory: impl Into<String>) -> Self {
        self.incremental.output_directory = Some(directory.into());
        self
    }

    /// Set the chunk size
    pub fn with_chunk_size(mut self, chunk_size: Vec3) -> Self {
        self.incremental.chunk_size = chunk_size;
        self
    }

    /// Set the lightmap chart size
    pub fn with_lightmap_size(mut self, lightmap_size: u32) -> Self {
        self.charting.lightmap_size = lightmap_size;
        self
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), String> {
        self.incremental.validate()?;
        self.charting.validate()?;
        self.direct_chart_tracing.validate()?;
        self.direct_probes_tracing.validate()?;
        self.indirect_chart_tracing.validate()?;
        self.indirect_probes_tracing.validate()?;
        self.direct_filter.validate()?;
        self.indirect_filter.validate()?;
        if !(0.0..=1.0).contains(&self.stitching.blend_factor) {
            return Err("Stitching blend factor must be within [0, 1]".to_string());
        }
        Ok(())
    }
}

impl Default for LightBakingSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for LightBakingSettings {
    fn check(&self) -> Result<(), String> {
        self.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(LightBakingSettings::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_kernel_radius() {
        let mut settings = LightBakingSettings::default();
        settings.indirect_filter.kernel_radius = 6;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_file_name_patterns() {
        let settings = IncrementalBakingSettings::default();
        assert_eq!(settings.lightmap_file_name(3), "Lightmap-3.png");
        assert_eq!(settings.light_probe_group_file_name([1, -2, 0], 4), "LightProbes-1--2-0-4.bin");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings: LightBakingSettings = toml::from_str(
            "random_seed = 9\n[charting]\nlightmap_size = 128\n[indirect_chart_tracing]\nmax_bounces = 1\n",
        )
        .unwrap();
        assert_eq!(settings.random_seed, 9);
        assert_eq!(settings.charting.lightmap_size, 128);
        assert_eq!(settings.charting.padding, 1);
        assert_eq!(settings.indirect_chart_tracing.max_bounces, 1);
        assert_eq!(settings.indirect_chart_tracing.max_samples, 10);
    }

    #[test]
    fn test_save_and_load_ron() {
        let path = std::env::temp_dir().join(format!("light_baker_settings_{}.ron", std::process::id()));
        let path = path.to_string_lossy().to_string();
        let settings = LightBakingSettings::default().with_lightmap_size(256);
        settings.save_to_file(&path).unwrap();
        let loaded = LightBakingSettings::load_from_file(&path).unwrap();
        assert_eq!(loaded.charting.lightmap_size, 256);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_rejects_out_of_range_settings() {
        let path = std::env::temp_dir().join(format!("light_baker_invalid_{}.toml", std::process::id()));
        std::fs::write(&path, "[direct_filter]\nkernel_radius = 8\n").unwrap();
        let result = LightBakingSettings::load_from_file(&path.to_string_lossy());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
        let _ = std::fs::remove_file(&path);

        assert!(matches!(
            LightBakingSettings::default().save_to_file("settings.json"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
