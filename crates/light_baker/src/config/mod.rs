//! Configuration system
//!
//! Bake settings are plain serde structs that can be stored as TOML or RON next to a scene.

mod settings;

pub use serde::{Serialize, Deserialize};
pub use settings::{
    ChartingSettings, DirectLightTracingSettings, EmissionLightTracingSettings,
    GeometryBufferPreprocessSettings, GeometryBufferSettings, IncrementalBakingSettings,
    IndirectLightTracingSettings, LightBakingSettings, LightmapFilterSettings,
    LightmapStitchingSettings, SceneBakingProperties, MAX_BOUNCES, MAX_FILTER_KERNEL_RADIUS,
};

/// File formats settings can be stored in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.toml`
    Toml,
    /// `.ron`
    Ron,
}

impl ConfigFormat {
    /// Format implied by the file extension
    pub fn from_path(path: &str) -> Result<Self, ConfigError> {
        match std::path::Path::new(path).extension().and_then(|extension| extension.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.to_string())),
        }
    }
}

/// Settings loadable from TOML or RON, checked after parsing
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Range checks run after loading
    fn check(&self) -> Result<(), String> {
        Ok(())
    }

    /// Load and check settings. Missing fields take their default values.
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let format = ConfigFormat::from_path(path)?;
        let contents = std::fs::read_to_string(path)?;

        let config: Self = match format {
            ConfigFormat::Toml => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?,
            ConfigFormat::Ron => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?,
        };
        config.check().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Save settings in the format implied by the extension
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = match ConfigFormat::from_path(path)? {
            ConfigFormat::Toml => toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?,
            ConfigFormat::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };

        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Settings were parsed but are out of range
    #[error("Invalid settings: {0}")]
    Invalid(String),
}
