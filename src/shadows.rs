//! Shadow quality binding.
//!
//! Shadow parameters are a pure function of the quality level; the binder
//! keeps every registered caster in step with the active level. When a level
//! turns shadows off, casters are kept alive and only their render lists
//! are parked, so turning shadows back on is cheap.

use crate::engine::{MeshId, ShadowCaster};
use crate::quality::{QualityLevel, QualitySettings};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Map size used when a caster is created while shadows are off.
pub const FALLBACK_MAP_SIZE: u32 = 512;

/// Shadow filtering algorithm, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowFilter {
    Hard,
    Poisson,
    Pcf,
    ContactHardening,
}

/// Per-level shadow tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowParams {
    pub filter: ShadowFilter,
    /// Blur kernel width in texels.
    pub kernel: u32,
    pub bias: f32,
}

impl ShadowParams {
    pub fn for_level(level: QualityLevel) -> Self {
        match level {
            QualityLevel::Potato => ShadowParams {
                filter: ShadowFilter::Hard,
                kernel: 1,
                bias: 0.01,
            },
            QualityLevel::Low => ShadowParams {
                filter: ShadowFilter::Poisson,
                kernel: 1,
                bias: 0.005,
            },
            QualityLevel::Medium => ShadowParams {
                filter: ShadowFilter::Pcf,
                kernel: 8,
                bias: 0.003,
            },
            QualityLevel::High => ShadowParams {
                filter: ShadowFilter::Pcf,
                kernel: 16,
                bias: 0.002,
            },
            QualityLevel::Ultra => ShadowParams {
                filter: ShadowFilter::ContactHardening,
                kernel: 32,
                bias: 0.001,
            },
        }
    }
}

struct Bound<C> {
    caster: C,
    map_size: u32,
    /// Render list parked while shadows are off.
    parked: Option<Vec<MeshId>>,
}

/// Registry of shadow casters keyed by name.
pub struct ShadowBinder<C: ShadowCaster> {
    casters: HashMap<String, Bound<C>>,
}

impl<C: ShadowCaster> ShadowBinder<C> {
    pub fn new() -> Self {
        Self {
            casters: HashMap::new(),
        }
    }

    /// Map size a new caster should be created with.
    pub fn creation_size(settings: &QualitySettings) -> u32 {
        if settings.shadows_enabled && settings.shadow_map_size > 0 {
            settings.shadow_map_size
        } else {
            FALLBACK_MAP_SIZE
        }
    }

    /// Take ownership of a freshly created caster and configure it for the
    /// current level. A caster already registered under `name` is disposed.
    pub fn bind(&mut self, name: &str, caster: C, map_size: u32, level: QualityLevel, settings: &QualitySettings) {
        if let Some(mut old) = self.casters.remove(name) {
            debug!(name, "Replacing shadow caster");
            old.caster.dispose();
        }

        let mut bound = Bound {
            caster,
            map_size,
            parked: None,
        };
        Self::configure(&mut bound, level, settings);
        self.casters.insert(name.to_string(), bound);
        info!(name, level = %level, "Shadow caster registered");
    }

    /// Dispose and forget the caster registered under `name`.
    pub fn unbind(&mut self, name: &str) -> bool {
        match self.casters.remove(name) {
            Some(mut bound) => {
                bound.caster.dispose();
                info!(name, "Shadow caster unregistered");
                true
            }
            None => false,
        }
    }

    /// Re-apply the level's parameters to every caster.
    pub fn apply(&mut self, level: QualityLevel, settings: &QualitySettings) {
        for bound in self.casters.values_mut() {
            Self::configure(bound, level, settings);
        }
    }

    fn configure(bound: &mut Bound<C>, level: QualityLevel, settings: &QualitySettings) {
        if settings.shadows_enabled && settings.shadow_map_size > 0 {
            if bound.map_size != settings.shadow_map_size {
                bound.caster.set_map_size(settings.shadow_map_size);
                bound.map_size = settings.shadow_map_size;
            }
            bound.caster.set_params(&ShadowParams::for_level(level));
            if let Some(meshes) = bound.parked.take() {
                bound.caster.set_render_list(meshes);
            }
        } else if bound.parked.is_none() {
            bound.parked = Some(bound.caster.take_render_list());
        }
    }

    pub fn len(&self) -> usize {
        self.casters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.casters.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.casters.contains_key(name)
    }

    /// Dispose every caster. Safe to call repeatedly.
    pub fn dispose_all(&mut self) {
        for (name, mut bound) in self.casters.drain() {
            debug!(name = %name, "Disposing shadow caster");
            bound.caster.dispose();
        }
    }
}

impl<C: ShadowCaster> Default for ShadowBinder<C> {
    fn default() -> Self {
        Self::new()
    }
}
