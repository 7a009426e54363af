//! Reference host for the adaptive quality controller.
//!
//! Drives a [`QualityController`] from a simulated ~60Hz render loop, feeds
//! it battery readings from sysfs and exposes it on a Unix control socket.

mod config_store;
mod device_probe;
mod ipc_server;
mod logging;
mod power_supply;
mod sim_engine;

use adaptive_quality::error::HostError;
use adaptive_quality::{BatterySender, QualityController};
use config_store::ConfigManager;
use ipc_server::{ControlHandle, ControlRequest};
use power_supply::PowerSupply;
use sim_engine::{SceneProfile, SimEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Render loop tick (~60Hz).
const FRAME_INTERVAL_MS: u64 = 16;

/// Battery poll interval.
const BATTERY_POLL_SECS: u64 = 30;

/// How often the debug overlay line is logged when enabled.
const OVERLAY_INTERVAL_FRAMES: u64 = 60;

const SHUTDOWN_TIMEOUT_SECS: u64 = 2;

/// Explicit config file; it must exist when set.
const CONFIG_PATH_ENV: &str = "ADAPTIVE_QUALITY_CONFIG";

#[tokio::main]
async fn main() -> Result<(), HostError> {
    let _log_guard = logging::init_logging().map_err(|e| {
        eprintln!("Failed to initialize logging: {}", e);
        HostError::Logging(e.to_string())
    })?;

    info!("Adaptive quality host starting...");

    let result = run_host().await;
    match &result {
        Ok(()) => info!("Adaptive quality host shut down gracefully"),
        Err(e) => error!("Adaptive quality host error: {}", e),
    }
    result
}

async fn run_host() -> Result<(), HostError> {
    let config_manager = match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) => ConfigManager::load(std::path::Path::new(&path))?,
        None => ConfigManager::load_or_default(&ConfigManager::default_path())?,
    };
    let config_manager = Arc::new(config_manager);
    info!("Configuration loaded from {:?}", config_manager.path());

    let device = device_probe::detect();
    let engine = SimEngine::new(SceneProfile::default());
    let mut controller = QualityController::initialize(engine, device, config_manager.get())?;
    controller.register_shadow_generator("sun", &"sun".to_string());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = setup_signal_handlers(shutdown_tx).await {
            error!("Signal handler error: {}", e);
        }
    });

    let battery_handle = tokio::spawn(run_battery_poller(controller.battery_sender(), shutdown_rx.clone()));

    let (control, requests) = ControlHandle::channel();
    let ipc_handle = tokio::spawn(run_ipc_server(control, shutdown_rx.clone()));

    info!("Adaptive quality host initialized and running");
    run_render_loop(&mut controller, &config_manager, requests, shutdown_rx).await;

    info!("Shutdown signal received, stopping tasks...");
    controller.dispose();

    let _ = tokio::time::timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), async {
        let _ = tokio::join!(battery_handle, ipc_handle);
    })
    .await;

    info!("All tasks stopped");
    Ok(())
}

/// Tick the controller once per frame and serve control requests between
/// frames.
async fn run_render_loop(
    controller: &mut QualityController<SimEngine>,
    config_manager: &ConfigManager,
    mut requests: mpsc::Receiver<ControlRequest>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(FRAME_INTERVAL_MS));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut frame: u64 = 0;

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            Some(request) = requests.recv() => {
                let response = ipc_server::handle_command(controller, Some(config_manager), request.command);
                if request.reply.send(response).is_err() {
                    debug!("IPC client went away before the reply");
                }
            }
            _ = ticker.tick() => {
                controller.update();
                frame += 1;
                if frame % OVERLAY_INTERVAL_FRAMES == 0 {
                    if let Some(text) = controller.overlay_text() {
                        info!(overlay = %text, "Overlay");
                    }
                }
            }
        }
    }
}

async fn run_battery_poller(sender: BatterySender, mut shutdown_rx: watch::Receiver<bool>) {
    let Some(supply) = PowerSupply::detect() else {
        info!("No battery found, battery-aware behavior inactive");
        return;
    };
    info!(path = %supply.path().display(), "Polling battery");

    let mut ticker = tokio::time::interval(Duration::from_secs(BATTERY_POLL_SECS));
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                match supply.read() {
                    Some(reading) => {
                        if !sender.send(reading.to_event()) {
                            break;
                        }
                    }
                    None => warn!("Battery reading unavailable"),
                }
            }
        }
    }
}

async fn run_ipc_server(control: ControlHandle, mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("IPC server shutting down");
                    break;
                }
            }
            result = run_ipc_server_inner(control.clone()) => {
                match result {
                    Ok(()) => break,
                    Err(e) => {
                        error!("IPC server error: {}, restarting in 5 seconds", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }
    }
}

#[cfg(unix)]
async fn run_ipc_server_inner(control: ControlHandle) -> Result<(), adaptive_quality::error::IpcError> {
    let server = ipc_server::IpcServer::new_default().await?;
    info!("IPC server listening on {:?}", server.socket_path());
    server.run(control).await
}

#[cfg(not(unix))]
async fn run_ipc_server_inner(_control: ControlHandle) -> Result<(), adaptive_quality::error::IpcError> {
    warn!("IPC server not available on this platform");
    loop {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
}

#[cfg(unix)]
async fn setup_signal_handlers(shutdown_tx: watch::Sender<bool>) -> Result<(), HostError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| HostError::Runtime(e.to_string()))?;
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| HostError::Runtime(e.to_string()))?;

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }

    let _ = shutdown_tx.send(true);
    Ok(())
}

#[cfg(not(unix))]
async fn setup_signal_handlers(shutdown_tx: watch::Sender<bool>) -> Result<(), HostError> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| HostError::Runtime(e.to_string()))?;
    info!("Received Ctrl+C");
    let _ = shutdown_tx.send(true);
    Ok(())
}
