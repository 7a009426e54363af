//! Controller configuration.
//!
//! This module holds the tunables of both feedback loops and the partial
//! updates applied through `configure`.

use crate::error::ConfigError;
use crate::tier_adjuster::MIN_SAMPLES;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for the frame history window.
pub const MAX_FRAME_HISTORY_LENGTH: usize = 600;

/// Controller configuration.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    /// Enable the fast resolution loop.
    pub dynamic_resolution: bool,
    pub min_resolution_scale: f32,
    pub max_resolution_scale: f32,
    /// Fast loop steps resolution down below this FPS.
    pub low_fps_threshold: f64,
    /// Fast loop recovers resolution above this FPS.
    pub high_fps_threshold: f64,
    /// Resolution step per fast-loop adjustment.
    pub scaling_aggressiveness: f32,
    pub frame_history_length: usize,
    /// Enable the slow tier loop.
    pub auto_quality_adjustment: bool,
    /// FPS the tier loop aims for.
    pub min_target_fps: u32,
    pub quality_degrade_delay_ms: u64,
    pub quality_upgrade_delay_ms: u64,
    pub debug_overlay: bool,
    /// Frames between two fast-loop adjustments.
    pub scaling_cooldown_frames: u32,
    /// Minimum time between two automatic tier changes.
    pub adjustment_cooldown_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            dynamic_resolution: true,
            min_resolution_scale: 0.5,
            max_resolution_scale: 1.0,
            low_fps_threshold: 30.0,
            high_fps_threshold: 55.0,
            scaling_aggressiveness: 0.1,
            frame_history_length: 60,
            auto_quality_adjustment: true,
            min_target_fps: 30,
            quality_degrade_delay_ms: 3_000,
            quality_upgrade_delay_ms: 10_000,
            debug_overlay: false,
            scaling_cooldown_frames: 30,
            adjustment_cooldown_ms: 5_000,
        }
    }
}

impl ControllerConfig {
    /// Validate configuration values.
    /// Returns Ok(()) if valid, Err with descriptive message if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: String| Err(ConfigError::ValidationError(msg));

        if !(self.min_resolution_scale > 0.0 && self.min_resolution_scale <= 1.0) {
            return fail(format!(
                "min_resolution_scale ({}) must be in (0, 1]",
                self.min_resolution_scale
            ));
        }
        if !(self.max_resolution_scale <= 1.0) {
            return fail(format!(
                "max_resolution_scale ({}) must not exceed 1.0",
                self.max_resolution_scale
            ));
        }
        if self.max_resolution_scale < self.min_resolution_scale {
            return fail(format!(
                "max_resolution_scale ({}) cannot be less than min_resolution_scale ({})",
                self.max_resolution_scale, self.min_resolution_scale
            ));
        }
        if !(self.low_fps_threshold > 0.0) || !(self.high_fps_threshold > 0.0) {
            return fail("FPS thresholds must be positive".to_string());
        }
        if self.low_fps_threshold >= self.high_fps_threshold {
            return fail(format!(
                "low_fps_threshold ({}) must be below high_fps_threshold ({})",
                self.low_fps_threshold, self.high_fps_threshold
            ));
        }
        if !(self.scaling_aggressiveness > 0.0 && self.scaling_aggressiveness <= 0.5) {
            return fail(format!(
                "scaling_aggressiveness ({}) must be in (0, 0.5]",
                self.scaling_aggressiveness
            ));
        }
        if self.frame_history_length == 0 || self.frame_history_length > MAX_FRAME_HISTORY_LENGTH {
            return fail(format!(
                "frame_history_length ({}) must be between 1 and {}",
                self.frame_history_length, MAX_FRAME_HISTORY_LENGTH
            ));
        }
        if self.auto_quality_adjustment && self.frame_history_length < MIN_SAMPLES {
            return fail(format!(
                "frame_history_length ({}) must be at least {} while auto_quality_adjustment is on",
                self.frame_history_length, MIN_SAMPLES
            ));
        }
        if self.min_target_fps == 0 {
            return fail("min_target_fps must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn degrade_delay(&self) -> Duration {
        Duration::from_millis(self.quality_degrade_delay_ms)
    }

    pub fn upgrade_delay(&self) -> Duration {
        Duration::from_millis(self.quality_upgrade_delay_ms)
    }

    pub fn adjustment_cooldown(&self) -> Duration {
        Duration::from_millis(self.adjustment_cooldown_ms)
    }

    /// Frame-time budget implied by the target FPS, in milliseconds.
    pub fn frame_budget_ms(&self) -> f64 {
        1000.0 / self.min_target_fps.max(1) as f64
    }

    /// Return a copy with `partial` merged in. The result is not validated.
    pub fn merged(&self, partial: &PartialConfig) -> Self {
        let mut next = self.clone();
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = partial.$field { next.$field = v; })*
            };
        }
        merge!(
            dynamic_resolution,
            min_resolution_scale,
            max_resolution_scale,
            low_fps_threshold,
            high_fps_threshold,
            scaling_aggressiveness,
            frame_history_length,
            auto_quality_adjustment,
            min_target_fps,
            quality_degrade_delay_ms,
            quality_upgrade_delay_ms,
            debug_overlay,
            scaling_cooldown_frames,
            adjustment_cooldown_ms,
        );
        next
    }
}

/// Partial update for [`ControllerConfig`]; `None` keeps the current value.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct PartialConfig {
    pub dynamic_resolution: Option<bool>,
    pub min_resolution_scale: Option<f32>,
    pub max_resolution_scale: Option<f32>,
    pub low_fps_threshold: Option<f64>,
    pub high_fps_threshold: Option<f64>,
    pub scaling_aggressiveness: Option<f32>,
    pub frame_history_length: Option<usize>,
    pub auto_quality_adjustment: Option<bool>,
    pub min_target_fps: Option<u32>,
    pub quality_degrade_delay_ms: Option<u64>,
    pub quality_upgrade_delay_ms: Option<u64>,
    pub debug_overlay: Option<bool>,
    pub scaling_cooldown_frames: Option<u32>,
    pub adjustment_cooldown_ms: Option<u64>,
}
