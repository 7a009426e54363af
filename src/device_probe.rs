//! Host device profile: core count and memory from `sysconf`.

use adaptive_quality::{DeviceClass, DeviceProfile};
use tracing::{info, warn};

/// Environment override for the device class.
pub const DEVICE_CLASS_ENV: &str = "ADAPTIVE_QUALITY_DEVICE";

#[cfg(unix)]
fn cpu_cores() -> Option<u32> {
    // SAFETY: sysconf has no preconditions.
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    (n > 0).then(|| n as u32)
}

#[cfg(unix)]
fn memory_gb() -> Option<f32> {
    // SAFETY: sysconf has no preconditions.
    let (pages, page_size) = unsafe { (libc::sysconf(libc::_SC_PHYS_PAGES), libc::sysconf(libc::_SC_PAGESIZE)) };
    if pages <= 0 || page_size <= 0 {
        return None;
    }
    Some((pages as f64 * page_size as f64 / (1024.0 * 1024.0 * 1024.0)) as f32)
}

#[cfg(not(unix))]
fn cpu_cores() -> Option<u32> {
    std::thread::available_parallelism().ok().map(|n| n.get() as u32)
}

#[cfg(not(unix))]
fn memory_gb() -> Option<f32> {
    None
}

fn class_from_env(value: Option<String>) -> DeviceClass {
    match value {
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("{}, using desktop", e);
            DeviceClass::Desktop
        }),
        None => DeviceClass::Desktop,
    }
}

/// Build the profile for this machine.
pub fn detect() -> DeviceProfile {
    let class = class_from_env(std::env::var(DEVICE_CLASS_ENV).ok());
    let profile = DeviceProfile {
        class,
        pixel_ratio: 1.0,
        touch: class != DeviceClass::Desktop,
        cpu_cores: cpu_cores(),
        memory_gb: memory_gb(),
    };
    info!(
        class = ?profile.class,
        cores = ?profile.cpu_cores,
        memory_gb = ?profile.memory_gb,
        "Device profile detected"
    );
    profile
}
