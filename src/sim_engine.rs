//! Simulated rendering engine for the reference host.
//!
//! Frame cost responds to the applied settings and the resolution scale,
//! while the scene load drifts slowly over time so both control loops get
//! something to react to.

use adaptive_quality::shadows::ShadowParams;
use adaptive_quality::{GpuLimits, MeshId, QualitySettings, RenderEngine, RenderStats, ShadowCaster};
use std::time::Instant;
use tracing::debug;

/// Period of the scene load cycle.
const LOAD_PERIOD_SECS: f64 = 90.0;

#[derive(Debug, Clone, Copy)]
pub struct SceneProfile {
    /// Cost of one frame at full resolution on the high preset.
    pub base_frame_ms: f64,
    /// Peak extra load as a fraction of the base cost.
    pub load_swing: f64,
    pub meshes: u32,
    pub particle_systems: u32,
}

impl Default for SceneProfile {
    fn default() -> Self {
        Self {
            base_frame_ms: 14.0,
            load_swing: 1.5,
            meshes: 300,
            particle_systems: 12,
        }
    }
}

pub struct SimCaster {
    light: String,
    map_size: u32,
    params: Option<ShadowParams>,
    meshes: Vec<MeshId>,
}

impl ShadowCaster for SimCaster {
    fn set_map_size(&mut self, size: u32) {
        debug!(light = %self.light, size, "Shadow map resized");
        self.map_size = size;
    }

    fn set_params(&mut self, params: &ShadowParams) {
        self.params = Some(*params);
    }

    fn take_render_list(&mut self) -> Vec<MeshId> {
        std::mem::take(&mut self.meshes)
    }

    fn set_render_list(&mut self, meshes: Vec<MeshId>) {
        self.meshes = meshes;
    }

    fn dispose(&mut self) {
        debug!(
            light = %self.light,
            map_size = self.map_size,
            filter = ?self.params.map(|p| p.filter),
            "Shadow caster released"
        );
        self.meshes.clear();
    }
}

pub struct SimEngine {
    scene: SceneProfile,
    started: Instant,
    resolution_scale: f32,
    settings: Option<QualitySettings>,
    shadows_enabled: bool,
}

impl SimEngine {
    pub fn new(scene: SceneProfile) -> Self {
        Self {
            scene,
            started: Instant::now(),
            resolution_scale: 1.0,
            settings: None,
            shadows_enabled: true,
        }
    }

    /// Relative cost of a settings bundle, 1.0 on the high preset.
    fn settings_cost(&self) -> f64 {
        let Some(s) = self.settings.as_ref() else {
            return 1.0;
        };
        let shadows = if self.shadows_enabled && s.shadows_enabled {
            0.1 + 0.15 * (s.shadow_map_size as f64 / 2048.0)
        } else {
            0.0
        };
        let post = if s.post_processing { 0.1 } else { 0.0 };
        0.35 + shadows
            + post
            + 0.15 * s.particle_multiplier as f64
            + 0.1 * s.lod_distance_multiplier as f64
            + 0.02 * s.anti_alias_samples as f64
    }

    fn load_factor(&self) -> f64 {
        let t = self.started.elapsed().as_secs_f64();
        let phase = (t / LOAD_PERIOD_SECS * std::f64::consts::TAU).sin();
        1.0 + self.scene.load_swing * phase.max(0.0)
    }
}

impl RenderEngine for SimEngine {
    type Light = String;
    type Caster = SimCaster;

    fn set_resolution_scale(&mut self, scale: f32) {
        self.resolution_scale = scale;
    }

    fn apply_settings(&mut self, settings: &QualitySettings) {
        self.settings = Some(*settings);
    }

    fn set_shadows_enabled(&mut self, enabled: bool) {
        self.shadows_enabled = enabled;
    }

    fn render_stats(&self) -> RenderStats {
        let (lod, max_particles) = self
            .settings
            .map(|s| (s.lod_distance_multiplier as f64, s.max_particle_systems))
            .unwrap_or((1.0, u32::MAX));
        let meshes = (self.scene.meshes as f64 * lod.min(1.0)) as u32;
        RenderStats {
            draw_calls: (meshes as f64 * (1.0 + 0.5 * lod)) as u32,
            active_meshes: meshes,
            active_particle_systems: self.scene.particle_systems.min(max_particles),
        }
    }

    fn frame_time_ms(&self) -> f64 {
        let pixels = self.resolution_scale as f64 * self.resolution_scale as f64;
        self.scene.base_frame_ms * self.load_factor() * self.settings_cost() * (0.4 + 0.6 * pixels)
    }

    fn gpu_limits(&self) -> Option<GpuLimits> {
        Some(GpuLimits {
            max_texture_size: 16384,
            max_vertex_attribs: 16,
            api_version: 2,
        })
    }

    fn create_shadow_caster(&mut self, map_size: u32, light: &String) -> SimCaster {
        SimCaster {
            light: light.clone(),
            map_size,
            params: None,
            meshes: (0..self.scene.meshes as MeshId).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptive_quality::QualityLevel;

    #[test]
    fn test_lower_quality_is_cheaper() {
        let mut engine = SimEngine::new(SceneProfile {
            load_swing: 0.0,
            ..Default::default()
        });
        engine.apply_settings(&QualityLevel::Ultra.settings());
        let ultra = engine.frame_time_ms();

        engine.apply_settings(&QualityLevel::Potato.settings());
        engine.set_shadows_enabled(false);
        let potato = engine.frame_time_ms();
        assert!(potato < ultra);

        engine.set_resolution_scale(0.5);
        assert!(engine.frame_time_ms() < potato);
    }

    #[test]
    fn test_stats_follow_settings() {
        let mut engine = SimEngine::new(SceneProfile::default());
        engine.apply_settings(&QualityLevel::Potato.settings());
        let stats = engine.render_stats();
        assert_eq!(stats.active_particle_systems, 2);
        assert!(stats.active_meshes < 300);
    }

    #[test]
    fn test_caster_render_list() {
        let mut engine = SimEngine::new(SceneProfile::default());
        let mut caster = engine.create_shadow_caster(1024, &"sun".to_string());
        assert_eq!(caster.map_size, 1024);
        let meshes = caster.take_render_list();
        assert_eq!(meshes.len(), 300);
        assert!(caster.take_render_list().is_empty());
        caster.set_render_list(meshes);
        caster.set_params(&ShadowParams::for_level(QualityLevel::High));
        assert!(caster.params.is_some());
    }
}
