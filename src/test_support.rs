//! Recording fakes for the engine traits.

use crate::engine::{MeshId, RenderEngine, RenderStats, ShadowCaster};
use crate::gpu_probe::GpuLimits;
use crate::quality::QualitySettings;
use crate::shadows::ShadowParams;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct CasterState {
    pub map_size: Option<u32>,
    pub params: Option<ShadowParams>,
    pub render_list: Vec<MeshId>,
    pub disposed: bool,
    pub dispose_count: u32,
}

pub type CasterLog = Rc<RefCell<CasterState>>;

pub struct FakeCaster {
    log: CasterLog,
}

impl FakeCaster {
    pub fn new(meshes: Vec<MeshId>) -> (Self, CasterLog) {
        let log = Rc::new(RefCell::new(CasterState {
            render_list: meshes,
            ..Default::default()
        }));
        (Self { log: Rc::clone(&log) }, log)
    }
}

impl ShadowCaster for FakeCaster {
    fn set_map_size(&mut self, size: u32) {
        self.log.borrow_mut().map_size = Some(size);
    }

    fn set_params(&mut self, params: &ShadowParams) {
        self.log.borrow_mut().params = Some(*params);
    }

    fn take_render_list(&mut self) -> Vec<MeshId> {
        std::mem::take(&mut self.log.borrow_mut().render_list)
    }

    fn set_render_list(&mut self, meshes: Vec<MeshId>) {
        self.log.borrow_mut().render_list = meshes;
    }

    fn dispose(&mut self) {
        let mut log = self.log.borrow_mut();
        log.disposed = true;
        log.dispose_count += 1;
    }
}

#[derive(Debug, Default)]
pub struct EngineState {
    pub frame_time_ms: f64,
    pub stats: RenderStats,
    pub gpu_limits: Option<GpuLimits>,
    pub resolution_scales: Vec<f32>,
    pub applied: Vec<QualitySettings>,
    pub shadows_enabled: Vec<bool>,
    /// `(map_size, light)` for every caster created.
    pub created_casters: Vec<(u32, String)>,
    pub casters: Vec<CasterLog>,
}

pub type EngineLog = Rc<RefCell<EngineState>>;

pub struct FakeEngine {
    log: EngineLog,
}

impl FakeEngine {
    pub fn new(gpu_limits: Option<GpuLimits>) -> (Self, EngineLog) {
        let log = Rc::new(RefCell::new(EngineState {
            frame_time_ms: 16.0,
            gpu_limits,
            ..Default::default()
        }));
        (Self { log: Rc::clone(&log) }, log)
    }
}

impl RenderEngine for FakeEngine {
    type Light = String;
    type Caster = FakeCaster;

    fn set_resolution_scale(&mut self, scale: f32) {
        self.log.borrow_mut().resolution_scales.push(scale);
    }

    fn apply_settings(&mut self, settings: &QualitySettings) {
        self.log.borrow_mut().applied.push(*settings);
    }

    fn set_shadows_enabled(&mut self, enabled: bool) {
        self.log.borrow_mut().shadows_enabled.push(enabled);
    }

    fn render_stats(&self) -> RenderStats {
        self.log.borrow().stats
    }

    fn frame_time_ms(&self) -> f64 {
        self.log.borrow().frame_time_ms
    }

    fn gpu_limits(&self) -> Option<GpuLimits> {
        self.log.borrow().gpu_limits
    }

    fn create_shadow_caster(&mut self, map_size: u32, light: &String) -> FakeCaster {
        let (caster, caster_log) = FakeCaster::new(vec![1, 2, 3]);
        let mut log = self.log.borrow_mut();
        log.created_casters.push((map_size, light.clone()));
        log.casters.push(caster_log);
        caster
    }
}
