//! Battery readings from sysfs.
//!
//! Scans `/sys/class/power_supply/BAT*` for `capacity` (percent) and
//! `status`. Machines without a battery simply report nothing, which leaves
//! the controller's battery behavior inactive.

use adaptive_quality::BatteryEvent;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryReading {
    pub percent: Option<u8>,
    pub is_charging: bool,
}

impl BatteryReading {
    pub fn to_event(self) -> BatteryEvent {
        BatteryEvent {
            level: self.percent.map(|p| p.min(100) as f32 / 100.0),
            is_charging: self.is_charging,
        }
    }
}

/// Battery located under a power-supply root.
#[derive(Debug, Clone)]
pub struct PowerSupply {
    battery_dir: PathBuf,
}

impl PowerSupply {
    /// Find the first `BAT*` entry under the system root.
    pub fn detect() -> Option<Self> {
        Self::detect_in(Path::new(POWER_SUPPLY_ROOT))
    }

    pub fn detect_in(root: &Path) -> Option<Self> {
        let mut batteries: Vec<PathBuf> = fs::read_dir(root)
            .ok()?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("BAT"))
            .map(|entry| entry.path())
            .collect();
        batteries.sort();

        let battery_dir = batteries.into_iter().next()?;
        debug!(path = %battery_dir.display(), "Battery found");
        Some(Self { battery_dir })
    }

    pub fn path(&self) -> &Path {
        &self.battery_dir
    }

    /// Read the current state. `None` when the battery vanished.
    pub fn read(&self) -> Option<BatteryReading> {
        let status = fs::read_to_string(self.battery_dir.join("status")).ok();
        let capacity = fs::read_to_string(self.battery_dir.join("capacity")).ok();
        if status.is_none() && capacity.is_none() {
            debug!(path = %self.battery_dir.display(), "Battery no longer readable");
            return None;
        }

        Some(BatteryReading {
            percent: capacity.and_then(|c| c.trim().parse::<u8>().ok()),
            is_charging: status.as_deref().is_some_and(is_charging_status),
        })
    }
}

/// "Full" counts as charging: the device is on external power.
fn is_charging_status(status: &str) -> bool {
    matches!(status.trim(), "Charging" | "Full")
}
