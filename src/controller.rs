//! The host-facing quality controller.
//!
//! One [`QualityController`] owns the engine handle and every piece of
//! control state. The host calls [`QualityController::update`] once per
//! rendered frame; within that call the battery inbox is drained first, then
//! the frame sample is recorded, then the fast resolution loop runs, then the
//! slow tier loop, then the advisory budget check.

use crate::battery::{BatteryInbox, BatterySender, BatteryState, BatteryTransition};
use crate::budget::{BudgetMonitor, BudgetSample};
use crate::config::{ControllerConfig, PartialConfig};
use crate::engine::RenderEngine;
use crate::error::ConfigError;
use crate::frame_metrics::{FrameHistory, DEFAULT_FPS};
use crate::game_settings::{GameSettings, QualitySelection};
use crate::gpu_probe::{self, DeviceProfile, GpuCapabilities};
use crate::metrics::{AdjustmentCounters, AdjustmentReport, PerformanceMetrics};
use crate::quality::{QualityLevel, QualitySettings, SettingsOverrides};
use crate::resolution::{ResolutionScaler, ScaleChange, ScalerLimits};
use crate::shadows::ShadowBinder;
use crate::tier_adjuster::{TierAdjuster, TierDecision, TierInputs};
use std::time::Instant;
use tracing::{debug, info};

/// Why the level moved. Only used for logging.
#[derive(Debug, Clone, Copy)]
enum ChangeReason {
    Automatic,
    LowBattery,
    Requested,
    UserLocked,
}

impl ChangeReason {
    fn as_str(self) -> &'static str {
        match self {
            ChangeReason::Automatic => "automatic",
            ChangeReason::LowBattery => "low_battery",
            ChangeReason::Requested => "requested",
            ChangeReason::UserLocked => "user",
        }
    }
}

/// Adaptive quality controller bound to one rendering engine.
pub struct QualityController<E: RenderEngine> {
    /// `None` once disposed.
    engine: Option<E>,
    device: DeviceProfile,
    capabilities: GpuCapabilities,
    /// `base_config` with `settings_layer` merged on top.
    config: ControllerConfig,
    /// Config from `initialize` and `configure`.
    base_config: ControllerConfig,
    /// Resolution cap and target FPS from the last settings sync.
    settings_layer: PartialConfig,
    level: QualityLevel,
    overrides: SettingsOverrides,
    locked: bool,
    history: FrameHistory,
    scaler: ResolutionScaler,
    adjuster: TierAdjuster,
    battery: BatteryInbox,
    shadows: ShadowBinder<E::Caster>,
    budget: BudgetMonitor,
    counters: AdjustmentCounters,
}

impl<E: RenderEngine> QualityController<E> {
    /// Validate `config`, probe the GPU once and apply the starting level.
    pub fn initialize(engine: E, device: DeviceProfile, config: ControllerConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let limits = engine.gpu_limits();
        let capabilities = gpu_probe::probe(limits.as_ref(), &device);
        let level = capabilities.initial_level(&device);

        let mut controller = Self {
            engine: Some(engine),
            device,
            capabilities,
            history: FrameHistory::with_capacity(config.frame_history_length),
            scaler: ResolutionScaler::new(config.max_resolution_scale),
            adjuster: TierAdjuster::new(
                config.degrade_delay(),
                config.upgrade_delay(),
                config.adjustment_cooldown(),
            ),
            base_config: config.clone(),
            settings_layer: PartialConfig::default(),
            config,
            level,
            overrides: SettingsOverrides::default(),
            locked: false,
            battery: BatteryInbox::new(),
            shadows: ShadowBinder::new(),
            budget: BudgetMonitor::new(),
            counters: AdjustmentCounters::new(),
        };
        controller.apply_current();

        info!(
            level = %level,
            tier = ?capabilities.tier,
            device = ?controller.device.class,
            "Quality controller initialized"
        );
        Ok(controller)
    }

    /// Per-frame entry point. Reads the last frame time from the engine.
    pub fn update(&mut self) {
        let Some(frame_ms) = self.engine.as_ref().map(|e| e.frame_time_ms()) else {
            return;
        };
        self.update_at(frame_ms, Instant::now());
    }

    /// Per-frame entry point with an explicit frame time and clock.
    pub fn update_at(&mut self, frame_ms: f64, now: Instant) {
        if self.engine.is_none() {
            return;
        }

        if let Some(BatteryTransition::EnteredLowBattery) = self.battery.drain() {
            self.battery_demotion(now);
        }

        self.history.record(frame_ms);
        let fps = self.history.fps();

        if self.config.dynamic_resolution {
            self.run_fast_loop(fps);
        }

        if self.config.auto_quality_adjustment && !self.locked {
            self.run_slow_loop(fps, now);
        }

        self.check_budgets(now);
    }

    fn run_fast_loop(&mut self, fps: f64) {
        let settings = self.effective_settings();
        let ceiling = self.resolution_ceiling(&settings);
        let limits = ScalerLimits {
            low_fps_threshold: self.config.low_fps_threshold,
            high_fps_threshold: self.config.high_fps_threshold,
            step: self.config.scaling_aggressiveness,
            floor: self.config.min_resolution_scale.min(ceiling),
            ceiling,
            cooldown_frames: self.config.scaling_cooldown_frames,
        };

        if let Some(change) = self.scaler.evaluate(fps, &limits) {
            self.push_resolution(change.scale());
            self.counters
                .record_resolution_step(matches!(change, ScaleChange::Down(_)));
        }
    }

    fn run_slow_loop(&mut self, fps: f64, now: Instant) {
        let settings = self.effective_settings();
        let ceiling = self.resolution_ceiling(&settings);

        let inputs = TierInputs {
            now,
            fps,
            target_fps: self.config.min_target_fps as f64,
            sample_count: self.history.len(),
            level: self.level,
            ceiling: self.promotion_ceiling(),
            resolution_deficit: self.scaler.deficit(ceiling),
        };

        match self.adjuster.evaluate(&inputs) {
            Some(TierDecision::Demote(level)) | Some(TierDecision::Promote(level)) => {
                self.commit_level(level, now, ChangeReason::Automatic);
            }
            Some(TierDecision::ShrinkResolution) => {
                let floor = self.config.min_resolution_scale.min(ceiling);
                match self.scaler.shrink(self.config.scaling_aggressiveness, floor) {
                    Some(scale) => {
                        info!(scale, fps, "Lowest quality level active, shrinking resolution instead");
                        self.push_resolution(scale);
                        self.counters.record_resolution_step(true);
                    }
                    None => {
                        info!(fps, floor, "Lowest quality level and resolution floor reached, nothing left to degrade");
                    }
                }
            }
            Some(TierDecision::RestoreResolution) => {
                debug!(scale = ceiling, "Restoring resolution before promotion");
                self.scaler.restore(ceiling);
                self.push_resolution(ceiling);
                self.counters.record_resolution_step(false);
            }
            None => {}
        }
    }

    fn battery_demotion(&mut self, now: Instant) {
        match self.level.step_down() {
            Some(lower) => {
                self.counters.record_battery_demotion();
                self.commit_level(lower, now, ChangeReason::LowBattery);
            }
            None => debug!("Low battery at lowest quality level, nothing to demote"),
        }
    }

    fn check_budgets(&mut self, now: Instant) {
        let Some(engine) = self.engine.as_ref() else {
            return;
        };
        let settings = self.effective_settings();
        let sample = BudgetSample {
            stats: engine.render_stats(),
            settings: &settings,
            p95_frame_ms: self.history.percentile(0.95),
            frame_budget_ms: self.config.frame_budget_ms(),
        };
        self.budget.check(now, &sample);
    }

    /// Highest level automatic promotion may reach. While the battery is low
    /// the current level is the ceiling.
    fn promotion_ceiling(&self) -> QualityLevel {
        let baseline = self.device.class.default_level();
        if self.battery.state().low_battery_mode() {
            baseline.min(self.level)
        } else {
            baseline
        }
    }

    fn resolution_ceiling(&self, settings: &QualitySettings) -> f32 {
        self.config.max_resolution_scale.min(settings.resolution_scale)
    }

    fn effective_settings(&self) -> QualitySettings {
        self.level.settings().with_overrides(&self.overrides)
    }

    fn push_resolution(&mut self, scale: f32) {
        if let Some(engine) = self.engine.as_mut() {
            engine.set_resolution_scale(scale);
        }
    }

    /// Switch to `level` and re-apply the full bundle.
    fn commit_level(&mut self, level: QualityLevel, now: Instant, reason: ChangeReason) {
        let previous = self.level;
        self.level = level;
        self.counters.record_tier_change(previous, level, now);
        self.adjuster.mark_adjusted(now);
        self.apply_current();

        if previous != level {
            info!(from = %previous, to = %level, reason = reason.as_str(), "Quality level changed");
        }
    }

    /// Push the current level's effective settings everywhere: engine bundle,
    /// shadow switch, resolution scale and every shadow caster.
    fn apply_current(&mut self) {
        let settings = self.effective_settings();
        let ceiling = self.resolution_ceiling(&settings);
        self.scaler.restore(ceiling);

        if let Some(engine) = self.engine.as_mut() {
            engine.apply_settings(&settings);
            engine.set_shadows_enabled(settings.shadows_enabled);
            engine.set_resolution_scale(ceiling);
        }
        self.shadows.apply(self.level, &settings);
    }

    /// Current metrics snapshot.
    pub fn metrics(&self) -> PerformanceMetrics {
        let stats = self
            .engine
            .as_ref()
            .map(|e| e.render_stats())
            .unwrap_or_default();

        PerformanceMetrics {
            fps: self.history.fps(),
            frame_time: self.history.mean_frame_time().unwrap_or(1000.0 / DEFAULT_FPS),
            p50_frame_time: self.history.percentile(0.5),
            p95_frame_time: self.history.percentile(0.95),
            draw_calls: stats.draw_calls,
            active_meshes: stats.active_meshes,
            active_particles: stats.active_particle_systems,
            quality_level: self.level,
            dynamic_scaling_active: self.scaler.is_active(),
            current_resolution_scale: self.scaler.scale(),
            quality_locked: self.locked,
            low_battery_mode: self.battery.state().low_battery_mode(),
        }
    }

    pub fn quality(&self) -> QualityLevel {
        self.level
    }

    /// Switch to `level` immediately, bypassing the dwell timers.
    ///
    /// A user-initiated choice also locks the level against automatic
    /// adjustment until [`unlock_quality`](Self::unlock_quality).
    pub fn set_quality(&mut self, level: QualityLevel, user_initiated: bool) {
        if self.engine.is_none() {
            return;
        }
        let reason = if user_initiated {
            if !self.locked {
                info!(level = %level, "Quality locked by user");
            }
            self.locked = true;
            ChangeReason::UserLocked
        } else {
            ChangeReason::Requested
        };

        if level != self.level {
            self.commit_level(level, Instant::now(), reason);
        }
    }

    /// Hand control back to the automatic tier adjuster.
    pub fn unlock_quality(&mut self) {
        if self.engine.is_none() || !self.locked {
            return;
        }
        self.locked = false;
        self.adjuster.reset();
        info!(level = %self.level, "Quality unlocked");
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Merge and validate a partial configuration. On error the current
    /// configuration is left untouched.
    pub fn configure(&mut self, partial: PartialConfig) -> Result<(), ConfigError> {
        if self.engine.is_none() {
            return Ok(());
        }
        let base = self.base_config.merged(&partial);
        self.install_config(base, self.settings_layer.clone())?;
        info!(?partial, "Configuration updated");
        Ok(())
    }

    /// Validate `base` and `base` + `layer`, then make them current.
    fn install_config(&mut self, base: ControllerConfig, layer: PartialConfig) -> Result<(), ConfigError> {
        base.validate()?;
        let next = base.merged(&layer);
        next.validate()?;

        self.base_config = base;
        self.settings_layer = layer;
        let previous = std::mem::replace(&mut self.config, next);

        if previous.frame_history_length != self.config.frame_history_length {
            self.history.set_capacity(self.config.frame_history_length);
        }
        if previous.degrade_delay() != self.config.degrade_delay()
            || previous.upgrade_delay() != self.config.upgrade_delay()
            || previous.adjustment_cooldown() != self.config.adjustment_cooldown()
        {
            self.adjuster.set_delays(
                self.config.degrade_delay(),
                self.config.upgrade_delay(),
                self.config.adjustment_cooldown(),
            );
        }
        if previous.auto_quality_adjustment && !self.config.auto_quality_adjustment {
            self.adjuster.reset();
        }

        let settings = self.effective_settings();
        let ceiling = self.resolution_ceiling(&settings);
        if !self.config.dynamic_resolution {
            if (self.scaler.scale() - ceiling).abs() > f32::EPSILON {
                self.scaler.restore(ceiling);
                self.push_resolution(ceiling);
            }
        } else if let Some(scale) = self
            .scaler
            .clamp_to(self.config.min_resolution_scale, ceiling)
        {
            self.push_resolution(scale);
        }
        Ok(())
    }

    /// Active configuration, including any settings-sync layer.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Configuration without the settings-sync layer. This is what a host
    /// should persist.
    pub fn base_config(&self) -> &ControllerConfig {
        &self.base_config
    }

    /// Apply a settings-screen record.
    ///
    /// A named level is applied and locked; "auto" unlocks. Shadow, particle
    /// and post-processing choices stay layered over every level until the
    /// next sync, as do the resolution cap and FPS cap: each sync replaces
    /// the previous one's layer rather than stacking on it.
    pub fn sync_with_game_settings(&mut self, settings: &GameSettings) -> Result<(), ConfigError> {
        if self.engine.is_none() {
            return Ok(());
        }
        let plan = settings.plan(self.base_config.min_resolution_scale, self.base_config.min_target_fps)?;
        let base = ControllerConfig {
            debug_overlay: plan.show_fps,
            ..self.base_config.clone()
        };
        self.install_config(base, plan.layer)?;
        self.overrides = plan.overrides;

        match plan.selection {
            QualitySelection::Auto => {
                self.unlock_quality();
                self.apply_current();
            }
            QualitySelection::Fixed(level) => {
                self.locked = true;
                self.commit_level(level, Instant::now(), ChangeReason::UserLocked);
            }
        }
        info!(quality = %settings.graphics_quality, "Synced with game settings");
        Ok(())
    }

    /// Create a shadow caster for `light` and keep it in step with the
    /// quality level. Replaces any caster registered under the same name.
    pub fn register_shadow_generator(&mut self, name: &str, light: &E::Light) {
        let settings = self.effective_settings();
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let map_size = ShadowBinder::<E::Caster>::creation_size(&settings);
        let caster = engine.create_shadow_caster(map_size, light);
        self.shadows.bind(name, caster, map_size, self.level, &settings);
    }

    pub fn unregister_shadow_generator(&mut self, name: &str) -> bool {
        self.shadows.unbind(name)
    }

    pub fn shadow_generator_count(&self) -> usize {
        self.shadows.len()
    }

    /// Sender the host uses to push battery readings from any thread.
    pub fn battery_sender(&self) -> BatterySender {
        self.battery.sender()
    }

    pub fn battery_state(&self) -> BatteryState {
        self.battery.state()
    }

    pub fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }

    pub fn device(&self) -> &DeviceProfile {
        &self.device
    }

    pub fn adjustments(&self) -> AdjustmentReport {
        self.counters.report(Instant::now())
    }

    /// Overlay text when the debug overlay is enabled.
    pub fn overlay_text(&self) -> Option<String> {
        (self.config.debug_overlay && self.engine.is_some()).then(|| self.metrics().overlay_line())
    }

    /// Scale a base particle count by the active level's multiplier.
    pub fn get_adjusted_particle_count(&self, base: u32) -> u32 {
        self.effective_settings().adjusted_particle_count(base)
    }

    pub fn is_disposed(&self) -> bool {
        self.engine.is_none()
    }

    /// Tear down every shadow caster, clear the timers and the history, and
    /// give the engine back. Later calls return `None`.
    pub fn dispose(&mut self) -> Option<E> {
        let engine = self.engine.take()?;
        self.shadows.dispose_all();
        self.history.clear();
        self.adjuster.reset();
        self.battery.close();
        self.budget.reset();
        self.locked = false;
        info!("Quality controller disposed");
        Some(engine)
    }
}

impl<E: RenderEngine> Drop for QualityController<E> {
    fn drop(&mut self) {
        self.shadows.dispose_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RenderStats;
    use crate::game_settings::SettingTier;
    use crate::gpu_probe::{DeviceClass, GpuLimits};
    use crate::test_support::{EngineLog, FakeEngine};
    use proptest::prelude::*;
    use std::time::Duration;

    struct Clock {
        now: Instant,
    }

    impl Clock {
        fn new() -> Self {
            Self { now: Instant::now() }
        }

        /// Feed `frame_ms` frames for `seconds` of simulated time.
        fn run(&mut self, controller: &mut QualityController<FakeEngine>, frame_ms: f64, seconds: f64) {
            let frames = (seconds * 1000.0 / frame_ms).ceil() as usize;
            for _ in 0..frames {
                self.now += Duration::from_secs_f64(frame_ms / 1000.0);
                controller.update_at(frame_ms, self.now);
            }
        }
    }

    fn controller_with(config: ControllerConfig) -> (QualityController<FakeEngine>, EngineLog) {
        let (engine, log) = FakeEngine::new(None);
        let controller = QualityController::initialize(engine, DeviceProfile::desktop(), config).unwrap();
        (controller, log)
    }

    fn strong_gpu() -> GpuLimits {
        GpuLimits {
            max_texture_size: 16384,
            max_vertex_attribs: 16,
            api_version: 2,
        }
    }

    #[test]
    fn test_initialize_applies_starting_level() {
        let (controller, log) = controller_with(ControllerConfig::default());
        assert_eq!(controller.quality(), QualityLevel::Medium);
        assert_eq!(controller.capabilities().tier, crate::gpu_probe::PerformanceTier::Medium);

        let log = log.borrow();
        assert_eq!(log.applied.len(), 1);
        assert_eq!(log.applied[0], QualityLevel::Medium.settings());
        assert_eq!(log.shadows_enabled, vec![true]);
        assert_eq!(log.resolution_scales, vec![0.85]);
    }

    #[test]
    fn test_initialize_rejects_invalid_config() {
        let (engine, _log) = FakeEngine::new(None);
        let config = ControllerConfig {
            frame_history_length: 0,
            ..Default::default()
        };
        assert!(matches!(
            QualityController::initialize(engine, DeviceProfile::desktop(), config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_initial_level_clamped_by_device_class() {
        let (engine, _log) = FakeEngine::new(Some(strong_gpu()));
        let desktop = QualityController::initialize(engine, DeviceProfile::desktop(), ControllerConfig::default()).unwrap();
        assert_eq!(desktop.quality(), QualityLevel::High);

        let (engine, _log) = FakeEngine::new(Some(strong_gpu()));
        let phone = QualityController::initialize(engine, DeviceProfile::phone(), ControllerConfig::default()).unwrap();
        assert_eq!(phone.quality(), QualityLevel::Low);
    }

    #[test]
    fn test_scenario_sustained_low_fps_demotes_once() {
        let (mut controller, log) = controller_with(ControllerConfig {
            min_target_fps: 60,
            ..Default::default()
        });
        let mut clock = Clock::new();

        // Not yet: the low timer starts once 30 samples exist.
        clock.run(&mut controller, 33.0, 2.5);
        assert_eq!(controller.quality(), QualityLevel::Medium);

        clock.run(&mut controller, 33.0, 5.0);
        assert_eq!(controller.quality(), QualityLevel::Low);
        assert_eq!(controller.adjustments().demotions, 1);
        assert_eq!(log.borrow().applied.last(), Some(&QualityLevel::Low.settings()));
    }

    #[test]
    fn test_scenario_sustained_high_fps_promotes_to_device_ceiling() {
        let (mut controller, log) = controller_with(ControllerConfig::default());
        let mut clock = Clock::new();

        clock.run(&mut controller, 8.0, 9.0);
        assert_eq!(controller.quality(), QualityLevel::Medium);

        clock.run(&mut controller, 8.0, 30.0);
        assert_eq!(controller.quality(), QualityLevel::High);
        assert_eq!(controller.adjustments().promotions, 1);
        assert_eq!(log.borrow().applied.len(), 2);
        assert_eq!(controller.metrics().current_resolution_scale, 1.0);
    }

    #[test]
    fn test_phone_never_promotes_past_its_baseline() {
        let (engine, _log) = FakeEngine::new(None);
        let mut controller =
            QualityController::initialize(engine, DeviceProfile::phone(), ControllerConfig::default()).unwrap();
        assert_eq!(controller.quality(), QualityLevel::Low);

        Clock::new().run(&mut controller, 8.0, 40.0);
        assert_eq!(controller.quality(), QualityLevel::Low);
        assert_eq!(controller.adjustments().promotions, 0);
    }

    #[test]
    fn test_single_spike_does_not_change_tier() {
        let (mut controller, _log) = controller_with(ControllerConfig {
            min_target_fps: 60,
            ..Default::default()
        });
        let mut clock = Clock::new();

        // ~52 FPS sits between 0.8x and 0.9x of the target.
        clock.run(&mut controller, 19.0, 2.0);
        clock.now += Duration::from_millis(400);
        controller.update_at(400.0, clock.now);
        clock.run(&mut controller, 19.0, 10.0);

        assert_eq!(controller.quality(), QualityLevel::Medium);
        assert_eq!(controller.adjustments().demotions, 0);
    }

    #[test]
    fn test_user_lock_blocks_automatic_demotion() {
        let (mut controller, _log) = controller_with(ControllerConfig {
            min_target_fps: 60,
            ..Default::default()
        });
        controller.set_quality(QualityLevel::High, true);
        assert!(controller.is_locked());
        assert_eq!(controller.quality(), QualityLevel::High);

        let mut clock = Clock::new();
        clock.run(&mut controller, 33.0, 20.0);
        assert_eq!(controller.quality(), QualityLevel::High);

        controller.unlock_quality();
        assert!(!controller.is_locked());
        clock.run(&mut controller, 33.0, 10.0);
        assert!(controller.quality() < QualityLevel::High);
    }

    #[test]
    fn test_lock_keeps_dynamic_resolution_running() {
        let (mut controller, log) = controller_with(ControllerConfig::default());
        controller.set_quality(QualityLevel::High, true);

        Clock::new().run(&mut controller, 50.0, 5.0);
        assert_eq!(controller.quality(), QualityLevel::High);
        assert!(controller.metrics().dynamic_scaling_active);
        assert!(controller.metrics().current_resolution_scale < 1.0);
        assert!(log.borrow().resolution_scales.iter().any(|s| *s < 1.0));
    }

    #[test]
    fn test_floor_demotion_is_bounded() {
        let (mut controller, log) = controller_with(ControllerConfig {
            min_resolution_scale: 0.3,
            ..Default::default()
        });
        controller.set_quality(QualityLevel::Potato, false);
        let mut clock = Clock::new();
        clock.run(&mut controller, 100.0, 60.0);

        assert_eq!(controller.quality(), QualityLevel::Potato);
        let metrics = controller.metrics();
        assert!((metrics.current_resolution_scale - 0.3).abs() < 1e-6);
        assert!(log.borrow().resolution_scales.iter().all(|s| *s >= 0.3 - 1e-6));

        // Still nothing further to take away.
        clock.run(&mut controller, 100.0, 30.0);
        assert_eq!(controller.quality(), QualityLevel::Potato);
        assert!((controller.metrics().current_resolution_scale - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_scenario_low_battery_demotes_once() {
        let (engine, _log) = FakeEngine::new(Some(strong_gpu()));
        let mut controller =
            QualityController::initialize(engine, DeviceProfile::desktop(), ControllerConfig::default()).unwrap();
        controller.set_quality(QualityLevel::High, true);
        let sender = controller.battery_sender();
        let mut clock = Clock::new();

        sender.send_percent(Some(15), false);
        clock.run(&mut controller, 16.0, 0.1);
        assert_eq!(controller.quality(), QualityLevel::Medium);
        assert!(controller.metrics().low_battery_mode);
        // A demotion does not unlock.
        assert!(controller.is_locked());

        sender.send_percent(Some(10), false);
        clock.run(&mut controller, 16.0, 1.0);
        assert_eq!(controller.quality(), QualityLevel::Medium);

        // Leaving and re-entering low battery demotes again.
        sender.send_percent(Some(10), true);
        clock.run(&mut controller, 16.0, 0.1);
        sender.send_percent(Some(10), false);
        clock.run(&mut controller, 16.0, 0.1);
        assert_eq!(controller.quality(), QualityLevel::Low);
        assert_eq!(controller.adjustments().battery_demotions, 2);
    }

    #[test]
    fn test_low_battery_blocks_promotion() {
        let (mut controller, _log) = controller_with(ControllerConfig::default());
        controller.battery_sender().send_percent(Some(5), false);
        let mut clock = Clock::new();
        clock.run(&mut controller, 8.0, 40.0);
        assert_eq!(controller.quality(), QualityLevel::Low);
        assert_eq!(controller.adjustments().promotions, 0);
    }

    #[test]
    fn test_resolution_stays_within_bounds_under_lock() {
        let (mut controller, log) = controller_with(ControllerConfig {
            min_resolution_scale: 0.6,
            max_resolution_scale: 0.9,
            scaling_cooldown_frames: 0,
            ..Default::default()
        });
        controller.set_quality(QualityLevel::Ultra, true);
        let mut clock = Clock::new();
        for _ in 0..5 {
            clock.run(&mut controller, 100.0, 3.0);
            clock.run(&mut controller, 5.0, 3.0);
        }
        let log = log.borrow();
        assert!(log.resolution_scales.iter().any(|s| (*s - 0.6).abs() < 1e-6));
        assert!(log.resolution_scales.iter().all(|s| *s >= 0.6 - 1e-6 && *s <= 0.9 + 1e-6));
    }

    #[test]
    fn test_configure_merges_and_validates() {
        let (mut controller, _log) = controller_with(ControllerConfig::default());

        let bad = PartialConfig {
            low_fps_threshold: Some(80.0),
            ..Default::default()
        };
        assert!(controller.configure(bad).is_err());
        assert_eq!(*controller.config(), ControllerConfig::default());

        controller
            .configure(PartialConfig {
                frame_history_length: Some(40),
                debug_overlay: Some(true),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(controller.config().frame_history_length, 40);
        Clock::new().run(&mut controller, 16.0, 1.0);
        assert!(controller.overlay_text().is_some());
    }

    #[test]
    fn test_history_shorter_than_sample_gate_is_rejected() {
        let (engine, _log) = FakeEngine::new(None);
        let short = ControllerConfig {
            min_target_fps: 60,
            frame_history_length: 20,
            ..Default::default()
        };
        assert!(matches!(
            QualityController::initialize(engine, DeviceProfile::desktop(), short),
            Err(ConfigError::ValidationError(_))
        ));

        let (mut controller, _log) = controller_with(ControllerConfig {
            min_target_fps: 60,
            ..Default::default()
        });
        let short = PartialConfig {
            frame_history_length: Some(20),
            ..Default::default()
        };
        assert!(controller.configure(short).is_err());
        assert_eq!(controller.config().frame_history_length, 60);

        // The tier loop still demotes on sustained low FPS.
        Clock::new().run(&mut controller, 33.0, 7.0);
        assert_eq!(controller.quality(), QualityLevel::Low);
    }

    #[test]
    fn test_short_history_allowed_without_auto_adjustment() {
        let (mut controller, _log) = controller_with(ControllerConfig::default());
        controller
            .configure(PartialConfig {
                auto_quality_adjustment: Some(false),
                frame_history_length: Some(20),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(controller.config().frame_history_length, 20);

        let enable = PartialConfig {
            auto_quality_adjustment: Some(true),
            ..Default::default()
        };
        assert!(controller.configure(enable).is_err());
        assert!(!controller.config().auto_quality_adjustment);
    }

    #[test]
    fn test_configure_clamps_resolution_to_new_ceiling() {
        let (mut controller, log) = controller_with(ControllerConfig::default());
        controller
            .configure(PartialConfig {
                max_resolution_scale: Some(0.7),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(controller.metrics().current_resolution_scale, 0.7);
        assert_eq!(log.borrow().resolution_scales.last(), Some(&0.7));
    }

    #[test]
    fn test_sync_with_game_settings() {
        let (mut controller, log) = controller_with(ControllerConfig::default());
        let settings = GameSettings {
            graphics_quality: "high".to_string(),
            shadow_quality: SettingTier::High,
            particle_density: SettingTier::Low,
            show_fps: true,
            ..Default::default()
        };
        controller.sync_with_game_settings(&settings).unwrap();

        assert_eq!(controller.quality(), QualityLevel::High);
        assert!(controller.is_locked());
        assert!(controller.config().debug_overlay);
        assert_eq!(controller.get_adjusted_particle_count(100), 30);

        // Overrides survive a battery demotion.
        controller.battery_sender().send_percent(Some(5), false);
        Clock::new().run(&mut controller, 16.0, 0.1);
        assert_eq!(controller.quality(), QualityLevel::Medium);
        let applied = *log.borrow().applied.last().unwrap();
        assert_eq!(applied.shadow_map_size, 2048);
        assert_eq!(applied.particle_multiplier, 0.3);

        let auto = GameSettings::default();
        controller.sync_with_game_settings(&auto).unwrap();
        assert!(!controller.is_locked());
    }

    #[test]
    fn test_sync_caps_are_replaced_by_the_next_sync() {
        let (mut controller, _log) = controller_with(ControllerConfig::default());
        let capped = GameSettings {
            fps_cap: Some(20),
            resolution_scale: Some(0.6),
            ..Default::default()
        };
        controller.sync_with_game_settings(&capped).unwrap();
        assert_eq!(controller.config().min_target_fps, 20);
        assert_eq!(controller.config().max_resolution_scale, 0.6);
        assert_eq!(controller.metrics().current_resolution_scale, 0.6);
        assert_eq!(controller.base_config().min_target_fps, 30);
        assert_eq!(controller.base_config().max_resolution_scale, 1.0);

        // Syncing the same record twice is stable.
        controller.sync_with_game_settings(&capped).unwrap();
        assert_eq!(controller.config().min_target_fps, 20);

        controller.sync_with_game_settings(&GameSettings::default()).unwrap();
        assert_eq!(controller.config().min_target_fps, 30);
        assert_eq!(controller.config().max_resolution_scale, 1.0);
        assert_eq!(controller.metrics().current_resolution_scale, 0.85);
        assert_eq!(*controller.config(), ControllerConfig::default());
    }

    #[test]
    fn test_configure_keeps_settings_layer() {
        let (mut controller, _log) = controller_with(ControllerConfig::default());
        controller
            .sync_with_game_settings(&GameSettings {
                fps_cap: Some(20),
                ..Default::default()
            })
            .unwrap();
        controller
            .configure(PartialConfig {
                min_target_fps: Some(45),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(controller.config().min_target_fps, 20);
        assert_eq!(controller.base_config().min_target_fps, 45);

        controller.sync_with_game_settings(&GameSettings::default()).unwrap();
        assert_eq!(controller.config().min_target_fps, 45);
    }

    #[test]
    fn test_sync_rejects_unknown_quality() {
        let (mut controller, _log) = controller_with(ControllerConfig::default());
        let settings = GameSettings {
            graphics_quality: "extreme".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            controller.sync_with_game_settings(&settings),
            Err(ConfigError::Quality(_))
        ));
        assert_eq!(controller.quality(), QualityLevel::Medium);
    }

    #[test]
    fn test_shadow_generators_follow_level() {
        let (mut controller, log) = controller_with(ControllerConfig::default());
        controller.register_shadow_generator("sun", &"sun-light".to_string());
        assert_eq!(controller.shadow_generator_count(), 1);
        assert_eq!(log.borrow().created_casters, vec![(1024, "sun-light".to_string())]);

        controller.set_quality(QualityLevel::Potato, true);
        let caster = log.borrow().casters[0].clone();
        assert!(caster.borrow().render_list.is_empty());
        assert_eq!(log.borrow().shadows_enabled.last(), Some(&false));

        controller.set_quality(QualityLevel::Ultra, true);
        assert_eq!(caster.borrow().render_list, vec![1, 2, 3]);
        assert_eq!(caster.borrow().map_size, Some(4096));

        assert!(controller.unregister_shadow_generator("sun"));
        assert!(caster.borrow().disposed);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let (mut controller, log) = controller_with(ControllerConfig::default());
        controller.register_shadow_generator("sun", &"sun-light".to_string());
        Clock::new().run(&mut controller, 16.0, 1.0);

        assert!(controller.dispose().is_some());
        assert!(controller.dispose().is_none());
        assert!(controller.is_disposed());
        let caster = log.borrow().casters[0].clone();
        assert_eq!(caster.borrow().dispose_count, 1);

        // Everything after dispose is a no-op.
        let applied = log.borrow().applied.len();
        controller.update();
        controller.update_at(16.0, Instant::now());
        controller.set_quality(QualityLevel::Ultra, true);
        controller.register_shadow_generator("moon", &"moon-light".to_string());
        assert_eq!(log.borrow().applied.len(), applied);
        assert_eq!(controller.quality(), QualityLevel::Medium);
        assert!(controller.metrics().fps == DEFAULT_FPS);
        assert!(controller.overlay_text().is_none());

        let sender = controller.battery_sender();
        assert!(!sender.send_percent(Some(5), false));
        drop(controller);
        assert_eq!(caster.borrow().dispose_count, 1);
    }

    #[test]
    fn test_metrics_reflect_engine_stats() {
        let (mut controller, log) = controller_with(ControllerConfig::default());
        log.borrow_mut().stats = RenderStats {
            draw_calls: 250,
            active_meshes: 80,
            active_particle_systems: 4,
        };
        log.borrow_mut().frame_time_ms = 20.0;
        for _ in 0..10 {
            controller.update();
        }
        let metrics = controller.metrics();
        assert_eq!(metrics.draw_calls, 250);
        assert_eq!(metrics.active_meshes, 80);
        assert_eq!(metrics.active_particles, 4);
        assert!((metrics.fps - 50.0).abs() < 1e-9);
        assert!(metrics.p50_frame_time <= metrics.p95_frame_time);
        assert_eq!(metrics.quality_level, QualityLevel::Medium);
    }

    fn level_strategy() -> impl Strategy<Value = QualityLevel> {
        prop::sample::select(QualityLevel::ALL.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_resolution_scale_within_bounds(
            level in level_strategy(),
            min_scale in 0.3f32..0.9f32,
            max_scale in 0.9f32..=1.0f32,
            frames in prop::collection::vec(1.0f64..120.0f64, 1..400),
        ) {
            let (mut controller, log) = controller_with(ControllerConfig {
                min_resolution_scale: min_scale,
                max_resolution_scale: max_scale,
                scaling_cooldown_frames: 2,
                ..Default::default()
            });
            controller.set_quality(level, true);
            let ceiling = max_scale.min(level.settings().resolution_scale);
            let floor = min_scale.min(ceiling);

            let mut now = Instant::now();
            for frame in frames {
                now += Duration::from_secs_f64(frame / 1000.0);
                controller.update_at(frame, now);
                let scale = controller.metrics().current_resolution_scale;
                prop_assert!(scale <= ceiling + 1e-6 && scale >= floor - 1e-6, "scale {} outside [{}, {}]", scale, floor, ceiling);
            }
            let log = log.borrow();
            let last = *log.resolution_scales.last().unwrap();
            prop_assert!(last <= ceiling + 1e-6 && last >= floor - 1e-6);
        }

        #[test]
        fn prop_device_class_caps_initial_level(
            class in prop::sample::select(vec![DeviceClass::Phone, DeviceClass::Tablet, DeviceClass::Desktop]),
        ) {
            let device = DeviceProfile { class, ..DeviceProfile::desktop() };
            let (engine, _log) = FakeEngine::new(Some(strong_gpu()));
            let controller = QualityController::initialize(engine, device, ControllerConfig::default()).unwrap();
            prop_assert!(controller.quality() <= class.default_level());
        }
    }
}
