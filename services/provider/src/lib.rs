//! Body hardware provider node.
//!
//! Offers the four SOME/IP body services, each backed by a state-owning
//! engine task, and runs the hardware simulator alongside them.

pub mod engine;
pub mod simulator;

use crate::engine::door::DoorEngine;
use crate::engine::light::LightEngine;
use crate::engine::seat::SeatEngine;
use crate::engine::window::WindowEngine;
use crate::engine::{EngineConfig, EngineEvent};
use crate::simulator::{SimHandles, Simulator, SimulatorConfig};
use body_protocol::catalog;
use someip_runtime::provider::{Notifier, ProviderRuntime, ServiceRegistration};
use someip_runtime::RuntimeConfig;
use std::io;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub runtime: RuntimeConfig,
    pub engine: EngineConfig,
    pub simulator: SimulatorConfig,
}

impl ProviderSettings {
    pub fn new(runtime: RuntimeConfig) -> ProviderSettings {
        ProviderSettings {
            runtime,
            engine: EngineConfig::default(),
            simulator: SimulatorConfig::default(),
        }
    }
}

/// A running provider node: transport runtime, four engines, simulator.
pub struct ProviderApp {
    runtime: ProviderRuntime,
    tasks: Vec<JoinHandle<()>>,
}

impl ProviderApp {
    pub async fn start(settings: ProviderSettings) -> io::Result<ProviderApp> {
        let (window_req_tx, window_req_rx) = mpsc::channel(64);
        let (door_req_tx, door_req_rx) = mpsc::channel(64);
        let (light_req_tx, light_req_rx) = mpsc::channel(64);
        let (seat_req_tx, seat_req_rx) = mpsc::channel(64);

        let runtime = ProviderRuntime::start(
            &settings.runtime,
            vec![
                ServiceRegistration {
                    spec: catalog::WINDOW,
                    requests: window_req_tx,
                },
                ServiceRegistration {
                    spec: catalog::DOOR,
                    requests: door_req_tx,
                },
                ServiceRegistration {
                    spec: catalog::LIGHT,
                    requests: light_req_tx,
                },
                ServiceRegistration {
                    spec: catalog::SEAT,
                    requests: seat_req_tx,
                },
            ],
        )
        .await?;

        let (window_events_tx, window_events_rx) = mpsc::channel(64);
        let (door_events_tx, door_events_rx) = mpsc::channel(64);
        let (light_events_tx, light_events_rx) = mpsc::channel(64);
        let (seat_events_tx, seat_events_rx) = mpsc::channel(64);

        let (window_engine, window_ctl) = WindowEngine::new(window_events_tx, settings.engine);
        let (door_engine, door_ctl) = DoorEngine::new(door_events_tx, settings.engine);
        let (light_engine, light_ctl) = LightEngine::new(light_events_tx, settings.engine);
        let (seat_engine, seat_ctl) = SeatEngine::new(seat_events_tx, settings.engine);

        let simulator = Simulator::new(
            SimHandles {
                door: door_ctl,
                window: window_ctl,
                light: light_ctl,
                seat: seat_ctl,
            },
            settings.simulator,
        );

        let tasks = vec![
            tokio::spawn(window_engine.run(window_req_rx)),
            tokio::spawn(door_engine.run(door_req_rx)),
            tokio::spawn(light_engine.run(light_req_rx)),
            tokio::spawn(seat_engine.run(seat_req_rx)),
            tokio::spawn(pump_events(
                window_events_rx,
                runtime.notifier(&catalog::WINDOW),
            )),
            tokio::spawn(pump_events(door_events_rx, runtime.notifier(&catalog::DOOR))),
            tokio::spawn(pump_events(
                light_events_rx,
                runtime.notifier(&catalog::LIGHT),
            )),
            tokio::spawn(pump_events(seat_events_rx, runtime.notifier(&catalog::SEAT))),
            tokio::spawn(simulator.run()),
        ];

        info!("provider node started");
        Ok(ProviderApp { runtime, tasks })
    }

    /// SD endpoint actually bound, for peers that need to announce to us.
    pub fn sd_addr(&self) -> SocketAddr {
        self.runtime.sd_addr()
    }

    pub fn service_addr(&self, service_id: u16) -> Option<SocketAddr> {
        self.runtime.service_addr(service_id)
    }

    pub fn subscriber_count(&self, service_id: u16) -> usize {
        self.runtime.subscriber_count(service_id)
    }

    /// Withdraw offers, cancel settling tasks, and exit cleanly.
    pub async fn stop(self) {
        for task in &self.tasks {
            task.abort();
        }
        self.runtime.stop().await;
        info!("provider node stopped");
    }
}

/// Forward engine events into the transport notifier.
async fn pump_events(mut events: mpsc::Receiver<EngineEvent>, notifier: Notifier) {
    while let Some(event) = events.recv().await {
        notifier.notify(event.event_id, event.payload).await;
    }
}
