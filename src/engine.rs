//! The configuration surface the controller drives on the rendering engine.
//!
//! The controller never renders anything. It only pushes a resolution scale,
//! a settings bundle and shadow parameters through these traits, and reads
//! back a few counters for advisory warnings.

use crate::gpu_probe::GpuLimits;
use crate::quality::QualitySettings;
use crate::shadows::ShadowParams;

/// Identifier of a mesh in a shadow caster's render list.
pub type MeshId = u64;

/// Live counters read from the engine. Advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    pub draw_calls: u32,
    pub active_meshes: u32,
    pub active_particle_systems: u32,
}

/// A shadow generator owned by the engine and configured by the controller.
pub trait ShadowCaster {
    /// Resize the shadow map (edge length in texels).
    fn set_map_size(&mut self, size: u32);

    /// Apply filter, kernel and bias.
    fn set_params(&mut self, params: &ShadowParams);

    /// Remove and return the meshes currently rendered into the map.
    fn take_render_list(&mut self) -> Vec<MeshId>;

    /// Replace the meshes rendered into the map.
    fn set_render_list(&mut self, meshes: Vec<MeshId>);

    /// Release GPU resources. Called exactly once.
    fn dispose(&mut self);
}

/// Handle onto the rendering engine and its active scene.
pub trait RenderEngine {
    /// Engine-side light reference.
    type Light;
    /// Shadow generator type produced by this engine.
    type Caster: ShadowCaster;

    /// Multiplicative render-target scale relative to the display.
    fn set_resolution_scale(&mut self, scale: f32);

    /// Apply a full settings bundle (particles, post-processing, LOD,
    /// textures, anti-aliasing, frame cap).
    fn apply_settings(&mut self, settings: &QualitySettings);

    /// Scene-wide shadow switch.
    fn set_shadows_enabled(&mut self, enabled: bool);

    fn render_stats(&self) -> RenderStats;

    /// Duration of the last rendered frame in milliseconds.
    fn frame_time_ms(&self) -> f64;

    /// Static graphics-context limits, `None` when they cannot be queried.
    fn gpu_limits(&self) -> Option<GpuLimits>;

    fn create_shadow_caster(&mut self, map_size: u32, light: &Self::Light) -> Self::Caster;
}
