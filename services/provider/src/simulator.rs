//! Hardware event simulator.
//!
//! A long-lived task that periodically mutates one randomly-chosen element
//! of one of the five event families. The mutation is sent to the owning
//! engine, which updates its state and emits the notification; the
//! simulator never touches service state directly.

use crate::engine::door::DoorMsg;
use crate::engine::light::{LightMsg, LightSet};
use crate::engine::seat::SeatMsg;
use crate::engine::window::WindowMsg;
use body_protocol::payload::{
    HeadlightState, IndicatorState, Position, PositionLightState, SeatAxis,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

const CORNERS: [Position; 4] = [
    Position::FrontLeft,
    Position::FrontRight,
    Position::RearLeft,
    Position::RearRight,
];

const HEADLIGHTS: [HeadlightState; 3] = [
    HeadlightState::Off,
    HeadlightState::LowBeam,
    HeadlightState::HighBeam,
];

const INDICATORS: [IndicatorState; 4] = [
    IndicatorState::Off,
    IndicatorState::Left,
    IndicatorState::Right,
    IndicatorState::Hazard,
];

#[derive(Debug, Clone, Copy)]
pub struct SimulatorConfig {
    pub event_interval: Duration,
    pub auto_events_enabled: bool,
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> SimulatorConfig {
        SimulatorConfig {
            event_interval: Duration::from_secs(15),
            auto_events_enabled: true,
            seed: 0,
        }
    }
}

/// Mailboxes of the four service engines.
pub struct SimHandles {
    pub door: mpsc::Sender<DoorMsg>,
    pub window: mpsc::Sender<WindowMsg>,
    pub light: mpsc::Sender<LightMsg>,
    pub seat: mpsc::Sender<SeatMsg>,
}

pub struct Simulator {
    cfg: SimulatorConfig,
    handles: SimHandles,
    rng: StdRng,
}

impl Simulator {
    pub fn new(handles: SimHandles, cfg: SimulatorConfig) -> Simulator {
        Simulator {
            rng: StdRng::seed_from_u64(cfg.seed),
            cfg,
            handles,
        }
    }

    pub async fn run(mut self) {
        info!(
            interval_secs = self.cfg.event_interval.as_secs(),
            enabled = self.cfg.auto_events_enabled,
            "hardware simulator started"
        );
        loop {
            tokio::time::sleep(self.cfg.event_interval).await;
            if !self.cfg.auto_events_enabled {
                continue;
            }
            self.tick().await;
        }
    }

    /// One simulated hardware transition, uniformly chosen among the five
    /// event families.
    pub async fn tick(&mut self) {
        match self.rng.gen_range(0..5) {
            0 => {
                let door = self.corner();
                debug!(door = door as u8, "simulating lock toggle");
                let _ = self.handles.door.send(DoorMsg::SimToggleLock { door }).await;
            }
            1 => {
                let door = self.corner();
                debug!(door = door as u8, "simulating ajar toggle");
                let _ = self.handles.door.send(DoorMsg::SimToggleAjar { door }).await;
            }
            2 => {
                let window = self.corner();
                let position = self.rng.gen_range(0..=100);
                debug!(window = window as u8, position, "simulating window move");
                let _ = self
                    .handles
                    .window
                    .send(WindowMsg::SimSetPosition { window, position })
                    .await;
            }
            3 => {
                let set = match self.rng.gen_range(0..3) {
                    0 => LightSet::Headlight(HEADLIGHTS[self.rng.gen_range(0..HEADLIGHTS.len())]),
                    1 => LightSet::Indicator(INDICATORS[self.rng.gen_range(0..INDICATORS.len())]),
                    _ => LightSet::PositionLight(if self.rng.gen_bool(0.5) {
                        PositionLightState::On
                    } else {
                        PositionLightState::Off
                    }),
                };
                debug!(?set, "simulating light change");
                let _ = self.handles.light.send(LightMsg::SimSet(set)).await;
            }
            _ => {
                let (axis, position) = if self.rng.gen_bool(0.5) {
                    (SeatAxis::ForeAft, self.rng.gen_range(-100..=100))
                } else {
                    (SeatAxis::Recline, self.rng.gen_range(0..=90))
                };
                debug!(axis = axis.as_str(), position, "simulating seat move");
                let _ = self
                    .handles
                    .seat
                    .send(SeatMsg::SimSetAxis { axis, position })
                    .await;
            }
        }
    }

    fn corner(&mut self) -> Position {
        CORNERS[self.rng.gen_range(0..CORNERS.len())]
    }
}
