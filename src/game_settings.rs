//! User-facing graphics settings and their mapping onto the controller.
//!
//! Settings screens speak in coarse names ("high", "auto", particle density
//! "low") rather than raw knobs. [`GameSettings::plan`] turns such a record
//! into the concrete changes the controller applies.

use crate::config::PartialConfig;
use crate::error::QualityError;
use crate::quality::{QualityLevel, SettingsOverrides};
use serde::{Deserialize, Serialize};

/// Coarse three-step choice used by several settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingTier {
    Low,
    #[default]
    Medium,
    High,
}

impl SettingTier {
    pub fn shadow_map_size(self) -> u32 {
        match self {
            SettingTier::Low => 512,
            SettingTier::Medium => 1024,
            SettingTier::High => 2048,
        }
    }

    pub fn particle_multiplier(self) -> f32 {
        match self {
            SettingTier::Low => 0.3,
            SettingTier::Medium => 0.6,
            SettingTier::High => 1.0,
        }
    }
}

/// The settings-screen record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// A quality level name, or "auto" to hand control back to the
    /// controller.
    pub graphics_quality: String,
    pub shadows_enabled: bool,
    pub shadow_quality: SettingTier,
    pub particle_density: SettingTier,
    pub post_processing: bool,
    /// Explicit render scale cap, if the user picked one.
    pub resolution_scale: Option<f32>,
    pub fps_cap: Option<u32>,
    pub show_fps: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            graphics_quality: "auto".to_string(),
            shadows_enabled: true,
            shadow_quality: SettingTier::Medium,
            particle_density: SettingTier::Medium,
            post_processing: true,
            resolution_scale: None,
            fps_cap: None,
            show_fps: false,
        }
    }
}

/// Quality selection carried by a settings record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualitySelection {
    Auto,
    Fixed(QualityLevel),
}

/// Concrete changes derived from a [`GameSettings`] record.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsPlan {
    pub selection: QualitySelection,
    pub overrides: SettingsOverrides,
    /// Resolution cap and target FPS derived from the record. Layered over
    /// the controller's own config and replaced as a whole by the next sync.
    pub layer: PartialConfig,
    pub show_fps: bool,
}

impl GameSettings {
    /// Map this record onto controller changes.
    ///
    /// `min_resolution_scale` and `min_target_fps` come from the config the
    /// layer will sit on, so the result stays valid over it.
    pub fn plan(&self, min_resolution_scale: f32, min_target_fps: u32) -> Result<SettingsPlan, QualityError> {
        let selection = match self.graphics_quality.trim().to_lowercase().as_str() {
            "auto" | "" => QualitySelection::Auto,
            name => QualitySelection::Fixed(name.parse()?),
        };

        let overrides = SettingsOverrides {
            shadows_enabled: Some(self.shadows_enabled),
            shadow_map_size: self
                .shadows_enabled
                .then(|| self.shadow_quality.shadow_map_size()),
            particle_multiplier: Some(self.particle_density.particle_multiplier()),
            post_processing: Some(self.post_processing),
            target_fps: self.fps_cap.filter(|cap| *cap > 0),
        };

        let layer = PartialConfig {
            max_resolution_scale: self
                .resolution_scale
                .filter(|s| s.is_finite())
                .map(|s| s.clamp(min_resolution_scale, 1.0)),
            min_target_fps: self
                .fps_cap
                .filter(|cap| *cap > 0 && *cap < min_target_fps),
            ..Default::default()
        };

        Ok(SettingsPlan {
            selection,
            overrides,
            layer,
            show_fps: self.show_fps,
        })
    }
}
