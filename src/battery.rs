//! Battery state and the inbox that carries battery events to the render
//! thread.
//!
//! Battery callbacks arrive on the host's schedule, not the frame cadence.
//! They are queued on an unbounded channel and drained at the top of
//! `update()`, so the controller only ever observes whole events.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

/// Charge fraction under which a discharging device is in low-battery mode.
pub const LOW_BATTERY_THRESHOLD: f32 = 0.2;

/// A battery reading pushed by the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryEvent {
    /// Charge in [0, 1], `None` when the platform does not report it.
    pub level: Option<f32>,
    pub is_charging: bool,
}

/// Last known battery state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BatteryState {
    pub level: Option<f32>,
    pub is_charging: bool,
}

impl BatteryState {
    /// Discharging with less than 20% left.
    pub fn low_battery_mode(&self) -> bool {
        !self.is_charging && self.level.is_some_and(|l| l < LOW_BATTERY_THRESHOLD)
    }
}

/// Transition observed while draining the inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryTransition {
    EnteredLowBattery,
    LeftLowBattery,
}

/// Cloneable, thread-safe handle the host uses to push battery events.
#[derive(Debug, Clone)]
pub struct BatterySender {
    tx: UnboundedSender<BatteryEvent>,
}

impl BatterySender {
    /// Queue an event. Returns `false` once the controller is gone.
    pub fn send(&self, event: BatteryEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Convenience for hosts reporting a percentage.
    pub fn send_percent(&self, percent: Option<u8>, is_charging: bool) -> bool {
        self.send(BatteryEvent {
            level: percent.map(|p| (p.min(100) as f32) / 100.0),
            is_charging,
        })
    }
}

/// Receiving side, owned by the controller.
#[derive(Debug)]
pub struct BatteryInbox {
    rx: UnboundedReceiver<BatteryEvent>,
    tx: UnboundedSender<BatteryEvent>,
    state: BatteryState,
}

impl BatteryInbox {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            tx,
            state: BatteryState::default(),
        }
    }

    pub fn sender(&self) -> BatterySender {
        BatterySender {
            tx: self.tx.clone(),
        }
    }

    pub fn state(&self) -> BatteryState {
        self.state
    }

    /// Apply every queued event and report the net low-battery transition.
    ///
    /// Several events queued between two frames collapse into one: entering
    /// and leaving low-battery within the same drain is no transition.
    pub fn drain(&mut self) -> Option<BatteryTransition> {
        let was_low = self.state.low_battery_mode();
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    debug!(level = ?event.level, charging = event.is_charging, "Battery event");
                    self.state = BatteryState {
                        level: event.level.map(|l| l.clamp(0.0, 1.0)),
                        is_charging: event.is_charging,
                    };
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        match (was_low, self.state.low_battery_mode()) {
            (false, true) => {
                info!(level = ?self.state.level, "Entered low-battery mode");
                Some(BatteryTransition::EnteredLowBattery)
            }
            (true, false) => {
                info!(level = ?self.state.level, charging = self.state.is_charging, "Left low-battery mode");
                Some(BatteryTransition::LeftLowBattery)
            }
            _ => None,
        }
    }

    /// Stop accepting events, discard pending ones and forget the state.
    /// Every sender reports failure from here on.
    pub fn close(&mut self) {
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
        self.state = BatteryState::default();
    }
}

impl Default for BatteryInbox {
    fn default() -> Self {
        Self::new()
    }
}
