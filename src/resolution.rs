//! Dynamic resolution scaler.
//!
//! The fast feedback loop. Nudges a continuous resolution scale between a
//! floor and the active preset's ceiling based on short-term FPS, with a
//! frame cooldown between adjustments. It never touches the quality level.

use tracing::debug;

/// Distance from the ceiling under which the scale counts as fully restored.
pub const SCALE_EPSILON: f32 = 0.01;

/// Thresholds and step sizes for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalerLimits {
    pub low_fps_threshold: f64,
    pub high_fps_threshold: f64,
    /// Degrade step; recovery uses half of it.
    pub step: f32,
    pub floor: f32,
    /// `min(max_resolution_scale, preset.resolution_scale)`.
    pub ceiling: f32,
    pub cooldown_frames: u32,
}

/// Direction of a committed scale change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleChange {
    Down(f32),
    Up(f32),
}

impl ScaleChange {
    pub fn scale(self) -> f32 {
        match self {
            ScaleChange::Down(s) | ScaleChange::Up(s) => s,
        }
    }
}

/// Continuous resolution-scale state.
#[derive(Debug, Clone)]
pub struct ResolutionScaler {
    scale: f32,
    active: bool,
    cooldown: u32,
}

impl ResolutionScaler {
    pub fn new(initial_scale: f32) -> Self {
        Self {
            scale: initial_scale,
            active: false,
            cooldown: 0,
        }
    }

    /// Current continuous scale.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// True while the scale sits below the ceiling because of low FPS.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Frames left before the next adjustment may happen.
    pub fn cooldown(&self) -> u32 {
        self.cooldown
    }

    /// How far below `ceiling` the scale currently sits (0 when at or above).
    pub fn deficit(&self, ceiling: f32) -> f32 {
        (ceiling - self.scale).max(0.0)
    }

    /// Evaluate one frame.
    ///
    /// Returns the new scale when it changed; the caller forwards it to the
    /// engine exactly once.
    pub fn evaluate(&mut self, fps: f64, limits: &ScalerLimits) -> Option<ScaleChange> {
        if self.cooldown > 0 {
            self.cooldown -= 1;
            return None;
        }

        if fps < limits.low_fps_threshold {
            let next = (self.scale - limits.step).max(limits.floor).min(limits.ceiling);
            self.active = true;
            if (next - self.scale).abs() > f32::EPSILON {
                self.scale = next;
                self.cooldown = limits.cooldown_frames;
                debug!(scale = next, fps, "Resolution scaled down");
                return Some(ScaleChange::Down(next));
            }
            None
        } else if fps > limits.high_fps_threshold && self.active {
            let next = (self.scale + limits.step / 2.0).min(limits.ceiling);
            if limits.ceiling - next < SCALE_EPSILON {
                self.active = false;
            }
            if (next - self.scale).abs() > f32::EPSILON {
                self.scale = next;
                self.cooldown = limits.cooldown_frames;
                debug!(scale = next, fps, "Resolution scaled up");
                return Some(ScaleChange::Up(next));
            }
            None
        } else {
            None
        }
    }

    /// Shrink one step below the current scale without touching the
    /// cooldown. Used as the last resort when the level cannot drop further.
    /// Returns `None` once the floor is reached.
    pub fn shrink(&mut self, step: f32, floor: f32) -> Option<f32> {
        let next = (self.scale - step).max(floor);
        if self.scale - next <= f32::EPSILON {
            return None;
        }
        self.scale = next;
        self.active = true;
        Some(next)
    }

    /// Jump to `ceiling` and clear the active flag.
    pub fn restore(&mut self, ceiling: f32) {
        self.scale = ceiling;
        self.active = false;
        self.cooldown = 0;
    }

    /// Pull the scale back inside `[floor, ceiling]`.
    ///
    /// Returns the new value when clamping moved it.
    pub fn clamp_to(&mut self, floor: f32, ceiling: f32) -> Option<f32> {
        let clamped = self.scale.clamp(floor.min(ceiling), ceiling);
        if (clamped - self.scale).abs() > f32::EPSILON {
            self.scale = clamped;
            if ceiling - clamped < SCALE_EPSILON {
                self.active = false;
            }
            return Some(clamped);
        }
        None
    }
}
