//! Adaptive quality control for real-time renderers.
//!
//! The controller watches frame timing and device state and keeps a bundle
//! of rendering knobs (resolution scale, shadows, particles, post-processing,
//! LOD) trending toward a frame-time target. It never renders anything
//! itself; it drives the engine through the traits in [`engine`].
//!
//! Two loops run inside [`QualityController::update`]: a fast dynamic
//! resolution loop with a frame cooldown, and a slow hysteresis loop that
//! moves the discrete [`QualityLevel`].

pub mod battery;
pub mod budget;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod frame_metrics;
pub mod game_settings;
pub mod gpu_probe;
pub mod metrics;
pub mod quality;
pub mod resolution;
pub mod shadows;
pub mod tier_adjuster;

#[cfg(test)]
mod test_support;

pub use battery::{BatteryEvent, BatterySender, BatteryState};
pub use config::{ControllerConfig, PartialConfig};
pub use controller::QualityController;
pub use engine::{MeshId, RenderEngine, RenderStats, ShadowCaster};
pub use error::{ConfigError, QualityError};
pub use game_settings::{GameSettings, SettingTier};
pub use gpu_probe::{DeviceClass, DeviceProfile, GpuCapabilities, GpuLimits, PerformanceTier};
pub use metrics::{AdjustmentReport, PerformanceMetrics};
pub use quality::{QualityLevel, QualitySettings, SettingsOverrides};
pub use shadows::{ShadowFilter, ShadowParams};
