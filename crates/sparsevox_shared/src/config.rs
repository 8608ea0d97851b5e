//! # Engine Configuration
//!
//! Loaded once at startup from TOML. Everything that sizes a GPU resource
//! lives here; everything that may change per frame lives in
//! [`VoxelSettings`].
//!
//! ```toml
//! voxel_dims = 128
//! mip_levels = 6
//! instance_capacity = 1000000
//! count_readback = "indirect"
//!
//! [settings]
//! voxel_size = 0.25
//! show_voxels = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    DEFAULT_INSTANCE_CAPACITY, DEFAULT_MIP_LEVELS, DEFAULT_RENDER_HEIGHT, DEFAULT_RENDER_WIDTH,
    DEFAULT_VOXEL_DIMS, MAX_VOXEL_DIMS, MIN_MIP_LEVELS, MIN_VOXEL_DIMS,
};
use crate::settings::VoxelSettings;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File that failed.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is outside its accepted range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// How the voxel draw learns its instance count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountReadback {
    /// The GPU writes indirect draw args; the CPU never waits.
    #[default]
    Indirect,
    /// The CPU maps the counter after compaction and issues a direct draw.
    Mapped,
}

/// Adapter preference passed to the GPU backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpuPowerPreference {
    /// Prefer an integrated or low power adapter.
    LowPower,
    /// Prefer a discrete adapter.
    #[default]
    HighPerformance,
}

/// Startup configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Voxel grid side length. Power of two.
    pub voxel_dims: u32,
    /// Number of mip levels, clamped to the grid's full chain.
    pub mip_levels: u32,
    /// Maximum voxel instances the compaction stage stores.
    pub instance_capacity: u32,
    /// Instance count delivery for the voxel draw.
    pub count_readback: CountReadback,
    /// Offscreen target width.
    pub render_width: u32,
    /// Offscreen target height.
    pub render_height: u32,
    /// Adapter preference.
    pub power_preference: GpuPowerPreference,
    /// Initial tunable settings.
    pub settings: VoxelSettings,
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or [`ConfigError::InvalidValue`].
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise
    /// the errors of [`EngineConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::info!(path = %path.display(), dims = config.voxel_dims, "loaded engine config");
        Ok(config)
    }

    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for the first bad field.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.voxel_dims.is_power_of_two()
            || !(MIN_VOXEL_DIMS..=MAX_VOXEL_DIMS).contains(&self.voxel_dims)
        {
            return Err(ConfigError::InvalidValue {
                field: "voxel_dims",
                reason: format!(
                    "{} must be a power of two in {MIN_VOXEL_DIMS}..={MAX_VOXEL_DIMS}",
                    self.voxel_dims
                ),
            });
        }
        let required = MIN_MIP_LEVELS.min(self.full_mip_chain());
        if self.mip_levels < required {
            return Err(ConfigError::InvalidValue {
                field: "mip_levels",
                reason: format!(
                    "{} is below the {required} levels a {}^3 grid requires",
                    self.mip_levels, self.voxel_dims
                ),
            });
        }
        if self.instance_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "instance_capacity",
                reason: "capacity must be non-zero".to_string(),
            });
        }
        if self.render_width == 0 || self.render_height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "render_width/render_height",
                reason: format!("{}x{} is empty", self.render_width, self.render_height),
            });
        }
        self.settings.validate()
    }

    /// Mip levels actually allocated: never more than the grid supports.
    #[must_use]
    pub fn effective_mip_levels(&self) -> u32 {
        self.mip_levels.clamp(1, self.full_mip_chain())
    }

    fn full_mip_chain(&self) -> u32 {
        self.voxel_dims.max(1).ilog2() + 1
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            voxel_dims: DEFAULT_VOXEL_DIMS,
            mip_levels: DEFAULT_MIP_LEVELS,
            instance_capacity: DEFAULT_INSTANCE_CAPACITY,
            count_readback: CountReadback::Indirect,
            render_width: DEFAULT_RENDER_WIDTH,
            render_height: DEFAULT_RENDER_HEIGHT,
            power_preference: GpuPowerPreference::HighPerformance,
            settings: VoxelSettings::new(),
        }
    }
}
