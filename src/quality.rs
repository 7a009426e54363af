//! Quality levels and the static preset table.
//!
//! A [`QualityLevel`] is a discrete fidelity step; [`QualitySettings`] is the
//! bundle of rendering knobs that step stands for. The table is pure data and
//! every level costs at least as much as the one below it on every field.

use crate::error::QualityError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Discrete quality level, totally ordered from cheapest to most expensive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Potato,
    Low,
    #[default]
    Medium,
    High,
    Ultra,
}

impl QualityLevel {
    /// All levels in ascending order.
    pub const ALL: [QualityLevel; 5] = [
        QualityLevel::Potato,
        QualityLevel::Low,
        QualityLevel::Medium,
        QualityLevel::High,
        QualityLevel::Ultra,
    ];

    /// The lowest level.
    pub const FLOOR: QualityLevel = QualityLevel::Potato;

    /// One step cheaper, or `None` at the floor.
    pub fn step_down(self) -> Option<QualityLevel> {
        match self {
            QualityLevel::Potato => None,
            QualityLevel::Low => Some(QualityLevel::Potato),
            QualityLevel::Medium => Some(QualityLevel::Low),
            QualityLevel::High => Some(QualityLevel::Medium),
            QualityLevel::Ultra => Some(QualityLevel::High),
        }
    }

    /// One step more expensive, or `None` at the top.
    pub fn step_up(self) -> Option<QualityLevel> {
        match self {
            QualityLevel::Potato => Some(QualityLevel::Low),
            QualityLevel::Low => Some(QualityLevel::Medium),
            QualityLevel::Medium => Some(QualityLevel::High),
            QualityLevel::High => Some(QualityLevel::Ultra),
            QualityLevel::Ultra => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QualityLevel::Potato => "potato",
            QualityLevel::Low => "low",
            QualityLevel::Medium => "medium",
            QualityLevel::High => "high",
            QualityLevel::Ultra => "ultra",
        }
    }

    /// Preset bundle for this level.
    pub fn settings(self) -> QualitySettings {
        PRESETS[self as usize]
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityLevel {
    type Err = QualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "potato" => Ok(QualityLevel::Potato),
            "low" => Ok(QualityLevel::Low),
            "medium" => Ok(QualityLevel::Medium),
            "high" => Ok(QualityLevel::High),
            "ultra" => Ok(QualityLevel::Ultra),
            _ => Err(QualityError::UnknownLevel(s.to_string())),
        }
    }
}

/// Rendering knobs bundled under one quality level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualitySettings {
    /// Render-target scale relative to the display, in (0, 1].
    pub resolution_scale: f32,
    pub particle_multiplier: f32,
    /// Shadow map edge in texels; 0 when shadows are off.
    pub shadow_map_size: u32,
    pub shadows_enabled: bool,
    pub lod_distance_multiplier: f32,
    pub max_particle_systems: u32,
    pub post_processing: bool,
    pub texture_quality: f32,
    pub anti_alias_samples: u32,
    /// Soft ceiling, only used for budget warnings.
    pub draw_call_budget: u32,
    pub target_fps: u32,
}

impl QualitySettings {
    /// Scale a base particle count by this bundle's multiplier.
    pub fn adjusted_particle_count(&self, base: u32) -> u32 {
        (base as f64 * self.particle_multiplier as f64).floor() as u32
    }

    /// Layer user overrides on top of the preset.
    pub fn with_overrides(mut self, overrides: &SettingsOverrides) -> Self {
        if let Some(shadows) = overrides.shadows_enabled {
            self.shadows_enabled = shadows;
            if !shadows {
                self.shadow_map_size = 0;
            }
        }
        if let Some(size) = overrides.shadow_map_size {
            if self.shadows_enabled {
                self.shadow_map_size = size;
            }
        }
        if let Some(multiplier) = overrides.particle_multiplier {
            self.particle_multiplier = multiplier;
        }
        if let Some(post) = overrides.post_processing {
            self.post_processing = post;
        }
        if let Some(fps) = overrides.target_fps {
            self.target_fps = fps;
        }
        self
    }
}

/// Per-field overrides coming from the user-facing settings screen.
///
/// `None` leaves the preset value in place. Overrides survive tier changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsOverrides {
    pub shadows_enabled: Option<bool>,
    pub shadow_map_size: Option<u32>,
    pub particle_multiplier: Option<f32>,
    pub post_processing: Option<bool>,
    pub target_fps: Option<u32>,
}

impl SettingsOverrides {
    pub fn is_empty(&self) -> bool {
        *self == SettingsOverrides::default()
    }
}

const PRESETS: [QualitySettings; 5] = [
    // potato
    QualitySettings {
        resolution_scale: 0.5,
        particle_multiplier: 0.1,
        shadow_map_size: 0,
        shadows_enabled: false,
        lod_distance_multiplier: 0.5,
        max_particle_systems: 2,
        post_processing: false,
        texture_quality: 0.25,
        anti_alias_samples: 0,
        draw_call_budget: 100,
        target_fps: 30,
    },
    // low
    QualitySettings {
        resolution_scale: 0.7,
        particle_multiplier: 0.3,
        shadow_map_size: 512,
        shadows_enabled: true,
        lod_distance_multiplier: 0.75,
        max_particle_systems: 5,
        post_processing: false,
        texture_quality: 0.5,
        anti_alias_samples: 0,
        draw_call_budget: 200,
        target_fps: 30,
    },
    // medium
    QualitySettings {
        resolution_scale: 0.85,
        particle_multiplier: 0.6,
        shadow_map_size: 1024,
        shadows_enabled: true,
        lod_distance_multiplier: 1.0,
        max_particle_systems: 10,
        post_processing: true,
        texture_quality: 0.75,
        anti_alias_samples: 2,
        draw_call_budget: 400,
        target_fps: 60,
    },
    // high
    QualitySettings {
        resolution_scale: 1.0,
        particle_multiplier: 1.0,
        shadow_map_size: 2048,
        shadows_enabled: true,
        lod_distance_multiplier: 1.25,
        max_particle_systems: 20,
        post_processing: true,
        texture_quality: 1.0,
        anti_alias_samples: 4,
        draw_call_budget: 800,
        target_fps: 60,
    },
    // ultra
    QualitySettings {
        resolution_scale: 1.0,
        particle_multiplier: 1.5,
        shadow_map_size: 4096,
        shadows_enabled: true,
        lod_distance_multiplier: 1.5,
        max_particle_systems: 40,
        post_processing: true,
        texture_quality: 1.0,
        anti_alias_samples: 8,
        draw_call_budget: 1500,
        target_fps: 60,
    },
];
