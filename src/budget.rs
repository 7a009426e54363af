//! Advisory budget warnings.
//!
//! Overruns are only logged. Nothing here feeds back into the control
//! loops; the tier adjuster already reacts to the FPS that the overrun
//! causes.

use crate::engine::RenderStats;
use crate::quality::QualitySettings;
use std::time::{Duration, Instant};
use tracing::warn;

/// Minimum time between two warnings of the same kind.
pub const WARNING_INTERVAL: Duration = Duration::from_secs(5);

/// p95 frame time may exceed the frame budget by this factor before warning.
pub const P95_TOLERANCE: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetKind {
    DrawCalls,
    ParticleSystems,
    FrameTime,
}

impl BudgetKind {
    fn index(self) -> usize {
        match self {
            BudgetKind::DrawCalls => 0,
            BudgetKind::ParticleSystems => 1,
            BudgetKind::FrameTime => 2,
        }
    }
}

/// One frame's worth of budget inputs.
#[derive(Debug, Clone, Copy)]
pub struct BudgetSample<'a> {
    pub stats: RenderStats,
    pub settings: &'a QualitySettings,
    pub p95_frame_ms: f64,
    /// `1000 / min_target_fps`.
    pub frame_budget_ms: f64,
}

/// Rate-limited overrun reporter.
#[derive(Debug, Clone)]
pub struct BudgetMonitor {
    last_warned: [Option<Instant>; 3],
    interval: Duration,
}

impl BudgetMonitor {
    pub fn new() -> Self {
        Self::with_interval(WARNING_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            last_warned: [None; 3],
            interval,
        }
    }

    /// Check every budget and log the overruns that are not rate-limited.
    /// Returns the kinds that were actually logged.
    pub fn check(&mut self, now: Instant, sample: &BudgetSample<'_>) -> Vec<BudgetKind> {
        let mut logged = Vec::new();

        if sample.stats.draw_calls > sample.settings.draw_call_budget
            && self.should_warn(BudgetKind::DrawCalls, now)
        {
            warn!(
                draw_calls = sample.stats.draw_calls,
                budget = sample.settings.draw_call_budget,
                "Draw call budget exceeded"
            );
            logged.push(BudgetKind::DrawCalls);
        }

        if sample.stats.active_particle_systems > sample.settings.max_particle_systems
            && self.should_warn(BudgetKind::ParticleSystems, now)
        {
            warn!(
                particle_systems = sample.stats.active_particle_systems,
                max = sample.settings.max_particle_systems,
                "Particle system budget exceeded"
            );
            logged.push(BudgetKind::ParticleSystems);
        }

        let p95_limit = sample.frame_budget_ms * P95_TOLERANCE;
        if sample.p95_frame_ms > p95_limit && self.should_warn(BudgetKind::FrameTime, now) {
            warn!(
                p95_ms = format!("{:.2}", sample.p95_frame_ms),
                limit_ms = format!("{:.2}", p95_limit),
                "p95 frame time over budget"
            );
            logged.push(BudgetKind::FrameTime);
        }

        logged
    }

    fn should_warn(&mut self, kind: BudgetKind, now: Instant) -> bool {
        let slot = &mut self.last_warned[kind.index()];
        let due = slot.map_or(true, |last| now.saturating_duration_since(last) >= self.interval);
        if due {
            *slot = Some(now);
        }
        due
    }

    pub fn reset(&mut self) {
        self.last_warned = [None; 3];
    }
}

impl Default for BudgetMonitor {
    fn default() -> Self {
        Self::new()
    }
}
