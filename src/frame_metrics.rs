//! Frame metrics aggregation.
//!
//! Keeps a bounded rolling window of frame durations and derives FPS and
//! frame-time percentiles from it.

use std::collections::VecDeque;

/// Default window length (one second at 60 FPS).
pub const DEFAULT_HISTORY_LENGTH: usize = 60;

/// Samples above this are treated as stalls (tab suspend, debugger break)
/// and discarded.
pub const MAX_PLAUSIBLE_FRAME_MS: f64 = 500.0;

/// FPS reported while the window is empty.
pub const DEFAULT_FPS: f64 = 60.0;

/// Ring buffer of recent frame durations in milliseconds.
///
/// The oldest sample is evicted once the window is full.
#[derive(Debug, Clone)]
pub struct FrameHistory {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl FrameHistory {
    /// Create a new history with the default capacity (60 samples).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_LENGTH)
    }

    /// Create a new history with a specific capacity (at least 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record one frame duration.
    ///
    /// Returns `false` when the sample was discarded as implausible.
    pub fn record(&mut self, duration_ms: f64) -> bool {
        if !duration_ms.is_finite() || duration_ms <= 0.0 || duration_ms > MAX_PLAUSIBLE_FRAME_MS {
            return false;
        }
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(duration_ms);
        true
    }

    /// Mean frame duration, or `None` when empty.
    pub fn mean_frame_time(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    /// Frames per second over the window: 1000 / mean duration.
    pub fn fps(&self) -> f64 {
        self.mean_frame_time()
            .map(|mean| 1000.0 / mean)
            .unwrap_or(DEFAULT_FPS)
    }

    /// Frame-time percentile, `p` in [0, 1]. Returns 0.0 when empty.
    ///
    /// Indexes a sorted copy at `floor(len * p)`, clamped to the last sample.
    pub fn percentile(&self, p: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_unstable_by(|a, b| a.total_cmp(b));

        let index = (sorted.len() as f64 * p.clamp(0.0, 1.0)).floor() as usize;
        sorted[index.min(sorted.len() - 1)]
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the window length, keeping the newest samples.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.samples.iter()
    }
}

impl Default for FrameHistory {
    fn default() -> Self {
        Self::new()
    }
}
