//! Quality tier adjuster implementing the slow hysteresis loop.
//!
//! This module contains the state machine that promotes or demotes the
//! discrete quality level based on sustained FPS relative to a target.
//! Demotion reacts after a short dwell, promotion after a much longer one.

use crate::quality::QualityLevel;
use std::time::{Duration, Instant};

/// Minimum frames of history before the adjuster acts.
pub const MIN_SAMPLES: usize = 30;

/// FPS below this fraction of the target counts as "low".
pub const DEGRADE_RATIO: f64 = 0.8;

/// FPS above this fraction of the target counts as "high".
pub const UPGRADE_RATIO: f64 = 0.9;

/// Algorithm state for the dwell timers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AdjusterState {
    /// FPS inside the band, no timer running.
    #[default]
    Stable,
    /// FPS below the degrade threshold since `since`.
    Degrading { since: Instant },
    /// FPS above the upgrade threshold since `since`.
    Upgrading { since: Instant },
}

/// Everything the adjuster needs to know about one evaluation.
///
/// The resolution deficit comes from the fast scaler so the adjuster never
/// reaches into its state.
#[derive(Debug, Clone, Copy)]
pub struct TierInputs {
    pub now: Instant,
    pub fps: f64,
    pub target_fps: f64,
    pub sample_count: usize,
    pub level: QualityLevel,
    /// Highest level automatic promotion may reach.
    pub ceiling: QualityLevel,
    /// How far the resolution scale sits below the preset ceiling.
    pub resolution_deficit: f32,
}

/// Action the controller must carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierDecision {
    /// Drop to the given level.
    Demote(QualityLevel),
    /// Already at the floor: shrink resolution further instead.
    ShrinkResolution,
    /// Give back the resolution the fast loop took before raising the level.
    RestoreResolution,
    /// Raise to the given level.
    Promote(QualityLevel),
}

/// Slow-timescale controller for the discrete quality level.
#[derive(Debug, Clone)]
pub struct TierAdjuster {
    state: AdjusterState,
    /// Duration FPS must stay low before demoting.
    degrade_delay: Duration,
    /// Duration FPS must stay high before upgrading.
    upgrade_delay: Duration,
    /// Minimum time between automatic adjustments.
    cooldown: Duration,
    last_adjustment: Option<Instant>,
}

impl TierAdjuster {
    pub fn new(degrade_delay: Duration, upgrade_delay: Duration, cooldown: Duration) -> Self {
        Self {
            state: AdjusterState::Stable,
            degrade_delay,
            upgrade_delay,
            cooldown,
            last_adjustment: None,
        }
    }

    pub fn state(&self) -> AdjusterState {
        self.state
    }

    pub fn last_adjustment(&self) -> Option<Instant> {
        self.last_adjustment
    }

    /// Update dwell delays (resets the timers).
    pub fn set_delays(&mut self, degrade_delay: Duration, upgrade_delay: Duration, cooldown: Duration) {
        self.degrade_delay = degrade_delay;
        self.upgrade_delay = upgrade_delay;
        self.cooldown = cooldown;
        self.state = AdjusterState::Stable;
    }

    /// Drop both dwell timers.
    pub fn reset(&mut self) {
        self.state = AdjusterState::Stable;
    }

    /// Note a level change made from outside (user choice, battery) so the
    /// cooldown applies to it too.
    pub fn mark_adjusted(&mut self, now: Instant) {
        self.last_adjustment = Some(now);
        self.state = AdjusterState::Stable;
    }

    fn can_adjust(&self, now: Instant) -> bool {
        match self.last_adjustment {
            Some(last) => now.saturating_duration_since(last) >= self.cooldown,
            None => true,
        }
    }

    /// Process one evaluation and decide whether the level should move.
    pub fn evaluate(&mut self, inputs: &TierInputs) -> Option<TierDecision> {
        if inputs.sample_count < MIN_SAMPLES {
            return None;
        }

        let now = inputs.now;
        let low = inputs.fps < inputs.target_fps * DEGRADE_RATIO;
        let high = inputs.fps > inputs.target_fps * UPGRADE_RATIO;

        match self.state {
            AdjusterState::Stable => {
                if low {
                    self.state = AdjusterState::Degrading { since: now };
                } else if high {
                    self.state = AdjusterState::Upgrading { since: now };
                }
                None
            }

            AdjusterState::Degrading { since } => {
                if !low {
                    // Recovered: drop the low timer and, if FPS is already
                    // high, start the high one.
                    self.state = if high {
                        AdjusterState::Upgrading { since: now }
                    } else {
                        AdjusterState::Stable
                    };
                    None
                } else if now.saturating_duration_since(since) >= self.degrade_delay
                    && self.can_adjust(now)
                {
                    self.mark_adjusted(now);
                    Some(match inputs.level.step_down() {
                        Some(lower) => TierDecision::Demote(lower),
                        None => TierDecision::ShrinkResolution,
                    })
                } else {
                    None
                }
            }

            AdjusterState::Upgrading { since } => {
                if !high {
                    self.state = if low {
                        AdjusterState::Degrading { since: now }
                    } else {
                        AdjusterState::Stable
                    };
                    None
                } else if now.saturating_duration_since(since) >= self.upgrade_delay
                    && self.can_adjust(now)
                {
                    if inputs.resolution_deficit > crate::resolution::SCALE_EPSILON {
                        self.mark_adjusted(now);
                        return Some(TierDecision::RestoreResolution);
                    }
                    match inputs.level.step_up().filter(|next| *next <= inputs.ceiling) {
                        Some(next) => {
                            self.mark_adjusted(now);
                            Some(TierDecision::Promote(next))
                        }
                        None => {
                            // Nothing left to gain; start a fresh dwell.
                            self.state = AdjusterState::Stable;
                            None
                        }
                    }
                } else {
                    None
                }
            }
        }
    }
}
