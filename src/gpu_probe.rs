//! One-shot GPU capability probe.
//!
//! Inspects static graphics-context limits (no timed draws) and classifies
//! the device into a coarse [`PerformanceTier`]. Handheld devices are capped
//! regardless of raw capability. The probe never fails: when the limits
//! cannot be queried the tier defaults to medium.

use crate::error::QualityError;
use crate::quality::QualityLevel;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info};

/// Texture edge required for the high tier.
const HIGH_MAX_TEXTURE_SIZE: u32 = 8192;
/// Vertex attributes required for the high tier.
const HIGH_MAX_VERTEX_ATTRIBS: u32 = 16;
/// Texture edge required for the medium tier.
const MEDIUM_MAX_TEXTURE_SIZE: u32 = 4096;
/// Vertex attributes required for the medium tier.
const MEDIUM_MAX_VERTEX_ATTRIBS: u32 = 12;
/// First API version with the modern rendering path.
const MODERN_API_VERSION: u32 = 2;

/// Handheld devices below these are forced to the low tier.
const HANDHELD_MIN_CORES: u32 = 4;
const HANDHELD_MIN_MEMORY_GB: f32 = 3.0;

/// Coarse device performance classification, written once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceTier {
    Low,
    #[default]
    Medium,
    High,
}

impl PerformanceTier {
    /// Quality level this tier seeds at startup.
    pub fn seed_level(self) -> QualityLevel {
        match self {
            PerformanceTier::Low => QualityLevel::Low,
            PerformanceTier::Medium => QualityLevel::Medium,
            PerformanceTier::High => QualityLevel::High,
        }
    }
}

impl FromStr for PerformanceTier {
    type Err = QualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(PerformanceTier::Low),
            "medium" => Ok(PerformanceTier::Medium),
            "high" => Ok(PerformanceTier::High),
            _ => Err(QualityError::UnknownTier(s.to_string())),
        }
    }
}

/// Device form factor as reported by the host's screen probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Phone,
    Tablet,
    #[default]
    Desktop,
}

impl DeviceClass {
    /// Baseline quality expected on this form factor. Automatic promotion
    /// never goes above it.
    pub fn default_level(self) -> QualityLevel {
        match self {
            DeviceClass::Phone => QualityLevel::Low,
            DeviceClass::Tablet => QualityLevel::Medium,
            DeviceClass::Desktop => QualityLevel::High,
        }
    }
}

impl FromStr for DeviceClass {
    type Err = QualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "phone" => Ok(DeviceClass::Phone),
            "tablet" => Ok(DeviceClass::Tablet),
            "desktop" => Ok(DeviceClass::Desktop),
            _ => Err(QualityError::UnknownDeviceClass(s.to_string())),
        }
    }
}

/// What the host knows about the device it runs on.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub class: DeviceClass,
    pub pixel_ratio: f32,
    pub touch: bool,
    /// Logical CPU cores, if the platform exposes them.
    pub cpu_cores: Option<u32>,
    /// Installed memory in GiB, if the platform exposes it.
    pub memory_gb: Option<f32>,
}

impl DeviceProfile {
    pub fn desktop() -> Self {
        Self {
            class: DeviceClass::Desktop,
            pixel_ratio: 1.0,
            ..Default::default()
        }
    }

    pub fn phone() -> Self {
        Self {
            class: DeviceClass::Phone,
            pixel_ratio: 3.0,
            touch: true,
            ..Default::default()
        }
    }

    /// Touch devices and non-desktop form factors carry thermal and
    /// battery risk.
    pub fn is_handheld(&self) -> bool {
        self.touch || self.class != DeviceClass::Desktop
    }

    fn below_handheld_floor(&self) -> bool {
        self.cpu_cores.is_some_and(|c| c < HANDHELD_MIN_CORES)
            || self.memory_gb.is_some_and(|m| m < HANDHELD_MIN_MEMORY_GB)
    }
}

/// Static limits read from the graphics context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GpuLimits {
    pub max_texture_size: u32,
    pub max_vertex_attribs: u32,
    /// Major version of the graphics API in use (1 = legacy, 2 = modern).
    pub api_version: u32,
}

/// Result of the probe, kept read-only for the life of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuCapabilities {
    pub tier: PerformanceTier,
    pub estimated_draw_call_budget: u32,
    pub supports_gpu_particles: bool,
    pub max_texture_size: u32,
    pub estimated_vram_mb: u32,
}

impl GpuCapabilities {
    /// Capabilities assumed when the context cannot be queried.
    pub fn fallback() -> Self {
        Self {
            tier: PerformanceTier::Medium,
            estimated_draw_call_budget: draw_call_budget(PerformanceTier::Medium),
            supports_gpu_particles: false,
            max_texture_size: MEDIUM_MAX_TEXTURE_SIZE,
            estimated_vram_mb: 1024,
        }
    }

    /// Starting quality: the tier's seed, clamped to the device baseline.
    pub fn initial_level(&self, device: &DeviceProfile) -> QualityLevel {
        self.tier.seed_level().min(device.class.default_level())
    }
}

fn draw_call_budget(tier: PerformanceTier) -> u32 {
    match tier {
        PerformanceTier::Low => 200,
        PerformanceTier::Medium => 500,
        PerformanceTier::High => 1000,
    }
}

fn raw_tier(limits: &GpuLimits) -> PerformanceTier {
    let modern = limits.api_version >= MODERN_API_VERSION;
    if modern
        && limits.max_texture_size >= HIGH_MAX_TEXTURE_SIZE
        && limits.max_vertex_attribs >= HIGH_MAX_VERTEX_ATTRIBS
    {
        PerformanceTier::High
    } else if limits.max_texture_size >= MEDIUM_MAX_TEXTURE_SIZE
        && limits.max_vertex_attribs >= MEDIUM_MAX_VERTEX_ATTRIBS
    {
        PerformanceTier::Medium
    } else {
        PerformanceTier::Low
    }
}

/// Classify the device. `limits` is `None` when the capability query
/// surface is unavailable.
pub fn probe(limits: Option<&GpuLimits>, device: &DeviceProfile) -> GpuCapabilities {
    let Some(limits) = limits else {
        debug!("GPU capability queries unavailable, assuming medium tier");
        return GpuCapabilities::fallback();
    };

    let mut tier = raw_tier(limits);
    if device.is_handheld() {
        tier = tier.min(PerformanceTier::Medium);
        if device.below_handheld_floor() {
            tier = PerformanceTier::Low;
        }
    }

    // Rough VRAM guess from the texture ceiling; handhelds share system memory.
    let mut vram_mb = match limits.max_texture_size {
        s if s >= 16384 => 4096,
        s if s >= HIGH_MAX_TEXTURE_SIZE => 2048,
        s if s >= MEDIUM_MAX_TEXTURE_SIZE => 1024,
        _ => 512,
    };
    if device.is_handheld() {
        vram_mb /= 2;
    }

    let caps = GpuCapabilities {
        tier,
        estimated_draw_call_budget: draw_call_budget(tier),
        supports_gpu_particles: limits.api_version >= MODERN_API_VERSION
            && tier != PerformanceTier::Low,
        max_texture_size: limits.max_texture_size,
        estimated_vram_mb: vram_mb,
    };

    info!(
        tier = ?caps.tier,
        max_texture_size = caps.max_texture_size,
        vram_mb = caps.estimated_vram_mb,
        "GPU capability probe complete"
    );
    caps
}
