//! Metrics exposed to the host.
//!
//! [`PerformanceMetrics`] is the per-frame snapshot returned by
//! `QualityController::metrics`. [`AdjustmentCounters`] tracks how often the
//! controller moved and is reported as an [`AdjustmentReport`].

use crate::quality::QualityLevel;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Window used for the tier-changes-per-hour figure.
const RATE_WINDOW: Duration = Duration::from_secs(3600);

/// Snapshot of the controller and the last frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub fps: f64,
    /// Mean frame time over the window in milliseconds.
    pub frame_time: f64,
    pub p50_frame_time: f64,
    pub p95_frame_time: f64,
    pub draw_calls: u32,
    pub active_meshes: u32,
    pub active_particles: u32,
    pub quality_level: QualityLevel,
    pub dynamic_scaling_active: bool,
    pub current_resolution_scale: f32,
    pub quality_locked: bool,
    pub low_battery_mode: bool,
}

impl PerformanceMetrics {
    /// Single-line text for the debug overlay.
    pub fn overlay_line(&self) -> String {
        format!(
            "{:.0} FPS | {:.1}ms (p95 {:.1}ms) | {} @ {:.0}%{}{} | {} draws",
            self.fps,
            self.frame_time,
            self.p95_frame_time,
            self.quality_level,
            self.current_resolution_scale * 100.0,
            if self.dynamic_scaling_active { " dyn" } else { "" },
            if self.quality_locked { " locked" } else { "" },
            self.draw_calls,
        )
    }
}

/// Serializable view of [`AdjustmentCounters`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentReport {
    pub demotions: u64,
    pub promotions: u64,
    pub resolution_steps_down: u64,
    pub resolution_steps_up: u64,
    pub battery_demotions: u64,
    /// Tier changes, automatic or not, in the last hour.
    pub tier_changes_per_hour: u64,
    pub secs_since_last_tier_change: Option<f64>,
}

/// Running totals of every adjustment the controller made.
#[derive(Debug, Clone, Default)]
pub struct AdjustmentCounters {
    demotions: u64,
    promotions: u64,
    resolution_steps_down: u64,
    resolution_steps_up: u64,
    battery_demotions: u64,
    recent_tier_changes: VecDeque<Instant>,
    last_tier_change: Option<Instant>,
}

impl AdjustmentCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a level change from `from` to `to`.
    pub fn record_tier_change(&mut self, from: QualityLevel, to: QualityLevel, now: Instant) {
        if to < from {
            self.demotions += 1;
        } else if to > from {
            self.promotions += 1;
        } else {
            return;
        }

        self.recent_tier_changes.push_back(now);
        while let Some(oldest) = self.recent_tier_changes.front() {
            if now.saturating_duration_since(*oldest) > RATE_WINDOW {
                self.recent_tier_changes.pop_front();
            } else {
                break;
            }
        }
        self.last_tier_change = Some(now);
    }

    pub fn record_battery_demotion(&mut self) {
        self.battery_demotions += 1;
    }

    pub fn record_resolution_step(&mut self, down: bool) {
        if down {
            self.resolution_steps_down += 1;
        } else {
            self.resolution_steps_up += 1;
        }
    }

    pub fn demotions(&self) -> u64 {
        self.demotions
    }

    pub fn promotions(&self) -> u64 {
        self.promotions
    }

    pub fn battery_demotions(&self) -> u64 {
        self.battery_demotions
    }

    pub fn resolution_steps_down(&self) -> u64 {
        self.resolution_steps_down
    }

    pub fn resolution_steps_up(&self) -> u64 {
        self.resolution_steps_up
    }

    pub fn last_tier_change(&self) -> Option<Instant> {
        self.last_tier_change
    }

    pub fn report(&self, now: Instant) -> AdjustmentReport {
        let tier_changes_per_hour = self
            .recent_tier_changes
            .iter()
            .filter(|t| now.saturating_duration_since(**t) <= RATE_WINDOW)
            .count() as u64;

        AdjustmentReport {
            demotions: self.demotions,
            promotions: self.promotions,
            resolution_steps_down: self.resolution_steps_down,
            resolution_steps_up: self.resolution_steps_up,
            battery_demotions: self.battery_demotions,
            tier_changes_per_hour,
            secs_since_last_tier_change: self
                .last_tier_change
                .map(|t| now.saturating_duration_since(t).as_secs_f64()),
        }
    }
}
