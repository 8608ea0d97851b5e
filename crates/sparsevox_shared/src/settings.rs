//! Tunable voxel settings.
//!
//! The renderer owns one `VoxelSettings` value and only changes it through
//! [`VoxelSettings::apply`] at frame boundaries.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ConfigResult};
use crate::constants::{DEFAULT_VOXEL_SIZE, MIN_VOXEL_SIZE};
use crate::events::ControlEvent;

/// Settings a user may change while the renderer runs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelSettings {
    /// World-space edge length of one voxel at mip 0.
    pub voxel_size: f32,
    /// Mip level scanned by compaction and drawn as cubes.
    pub debug_mip_level: u32,
    /// Sample level used by the direct pass when reading the volume.
    pub mip_interpolation: f32,
    /// Draw voxels as cubes instead of the shaded scene.
    pub show_voxels: bool,
    /// Output the raw volume sample in the direct pass.
    pub show_texture: bool,
    /// Wireframe voxel cubes.
    pub wireframe: bool,
}

/// What applying an event did to the settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsEffect {
    /// The event matched the current value.
    Unchanged,
    /// Presentation changed; the volume is still valid.
    Presentation,
    /// The volume no longer matches the settings and must be rebuilt.
    InvalidatesVolume,
}

impl VoxelSettings {
    /// Creates the default settings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            voxel_size: DEFAULT_VOXEL_SIZE,
            debug_mip_level: 0,
            mip_interpolation: 0.0,
            show_voxels: false,
            show_texture: false,
            wireframe: false,
        }
    }

    /// Applies one control event.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for non-finite or out of range
    /// values; the settings are left untouched in that case.
    pub fn apply(&mut self, event: ControlEvent) -> ConfigResult<SettingsEffect> {
        let effect = match event {
            ControlEvent::SetVoxelSize(size) => {
                if !size.is_finite() || size < MIN_VOXEL_SIZE {
                    return Err(ConfigError::InvalidValue {
                        field: "voxel_size",
                        reason: format!("{size} is not a finite size >= {MIN_VOXEL_SIZE}"),
                    });
                }
                if (self.voxel_size - size).abs() <= f32::EPSILON {
                    SettingsEffect::Unchanged
                } else {
                    self.voxel_size = size;
                    SettingsEffect::InvalidatesVolume
                }
            }
            ControlEvent::SetMipInterpolation(level) => {
                if !level.is_finite() || level < 0.0 {
                    return Err(ConfigError::InvalidValue {
                        field: "mip_interpolation",
                        reason: format!("{level} is not a finite level >= 0"),
                    });
                }
                Self::presentation(&mut self.mip_interpolation, level)
            }
            ControlEvent::SetDebugMipLevel(level) => Self::presentation(&mut self.debug_mip_level, level),
            ControlEvent::SetShowVoxels(on) => Self::presentation(&mut self.show_voxels, on),
            ControlEvent::SetShowTexture(on) => Self::presentation(&mut self.show_texture, on),
            ControlEvent::SetWireframe(on) => Self::presentation(&mut self.wireframe, on),
            ControlEvent::RegenerateVoxels => SettingsEffect::InvalidatesVolume,
        };
        Ok(effect)
    }

    /// Checks values loaded from a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for the first bad field.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut scratch = Self::new();
        scratch.apply(ControlEvent::SetVoxelSize(self.voxel_size))?;
        scratch.apply(ControlEvent::SetMipInterpolation(self.mip_interpolation))?;
        Ok(())
    }

    fn presentation<T: PartialEq>(slot: &mut T, value: T) -> SettingsEffect {
        if *slot == value {
            SettingsEffect::Unchanged
        } else {
            *slot = value;
            SettingsEffect::Presentation
        }
    }
}

impl Default for VoxelSettings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voxel_size_invalidates_volume() {
        let mut settings = VoxelSettings::new();
        let effect = settings.apply(ControlEvent::SetVoxelSize(0.5)).unwrap();
        assert_eq!(effect, SettingsEffect::InvalidatesVolume);
        assert_eq!(settings.voxel_size, 0.5);

        let again = settings.apply(ControlEvent::SetVoxelSize(0.5)).unwrap();
        assert_eq!(again, SettingsEffect::Unchanged);
    }

    #[test]
    fn test_toggles_are_presentation_only() {
        let mut settings = VoxelSettings::new();
        assert_eq!(
            settings.apply(ControlEvent::SetShowVoxels(true)).unwrap(),
            SettingsEffect::Presentation
        );
        assert_eq!(
            settings.apply(ControlEvent::SetDebugMipLevel(3)).unwrap(),
            SettingsEffect::Presentation
        );
        assert!(settings.show_voxels);
        assert_eq!(settings.debug_mip_level, 3);
    }

    #[test]
    fn test_rejects_bad_voxel_size() {
        let mut settings = VoxelSettings::new();
        assert!(settings.apply(ControlEvent::SetVoxelSize(f32::NAN)).is_err());
        assert!(settings.apply(ControlEvent::SetVoxelSize(0.0)).is_err());
        assert!(settings.apply(ControlEvent::SetMipInterpolation(-1.0)).is_err());
        assert_eq!(settings, VoxelSettings::new());
    }

    #[test]
    fn test_regenerate_always_invalidates() {
        let mut settings = VoxelSettings::new();
        assert_eq!(
            settings.apply(ControlEvent::RegenerateVoxels).unwrap(),
            SettingsEffect::InvalidatesVolume
        );
    }
}
