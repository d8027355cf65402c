//! REST/SSE gateway node.
//!
//! Hosts the four SOME/IP service clients and re-exposes their operations
//! over HTTP. Notifications stream out to SSE subscribers; when the
//! provider is away the API keeps answering with mocked state.

pub mod clients;
pub mod events;
pub mod http;
pub mod sse;

use crate::clients::BodyClients;
use crate::http::GatewayState;
use crate::sse::Broadcaster;
use axum::Router;
use body_protocol::catalog;
use someip_runtime::{ClientRuntime, RuntimeConfig};
use std::io;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

pub struct Gateway {
    pub state: Arc<GatewayState>,
    runtime: Arc<ClientRuntime>,
    tasks: Vec<JoinHandle<()>>,
}

impl Gateway {
    /// Start discovery for all four services, the notification→SSE bridge,
    /// and the heartbeat loop. The HTTP listener is the caller's concern.
    pub async fn start(cfg: &RuntimeConfig) -> io::Result<Gateway> {
        let (runtime, mut events_rx) =
            ClientRuntime::start(cfg, &catalog::ALL_SERVICES).await?;
        let runtime = Arc::new(runtime);

        let broadcaster = Broadcaster::new();
        let state = Arc::new(GatewayState {
            clients: BodyClients::new(Arc::clone(&runtime)),
            broadcaster: broadcaster.clone(),
        });

        let bridge_broadcaster = broadcaster.clone();
        let bridge = tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                if let Some((kind, data)) = events::event_to_sse(&event) {
                    bridge_broadcaster.publish(kind, data);
                }
            }
        });
        let heartbeat = tokio::spawn(broadcaster.run_heartbeat());

        info!("gateway started");
        Ok(Gateway {
            state,
            runtime,
            tasks: vec![bridge, heartbeat],
        })
    }

    pub fn router(&self) -> Router {
        http::build_router(Arc::clone(&self.state))
    }

    /// Local SD/notification port, for wiring a provider's announcements
    /// in tests and single-host setups.
    pub fn sd_port(&self) -> u16 {
        self.runtime.sd_port()
    }

    pub fn stop(self) {
        for task in &self.tasks {
            task.abort();
        }
        self.runtime.stop();
        info!("gateway stopped");
    }
}
