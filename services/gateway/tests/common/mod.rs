//! Shared harness for the gateway end-to-end suites: a real provider node
//! and a real gateway wired over ephemeral loopback ports.
#![allow(dead_code)]

use body_protocol::catalog;
use futures_util::StreamExt;
use gateway::Gateway;
use provider::engine::EngineConfig;
use provider::simulator::SimulatorConfig;
use provider::{ProviderApp, ProviderSettings};
use someip_runtime::RuntimeConfig;
use std::net::SocketAddr;
use std::time::Duration;

pub fn node_config(app: &str) -> RuntimeConfig {
    let mut cfg = RuntimeConfig::for_application(app);
    cfg.sd_port = Some(0);
    for spec in catalog::ALL_SERVICES {
        cfg.service_ports.insert(spec.name.to_owned(), 0);
    }
    cfg
}

pub struct Stack {
    pub provider: Option<ProviderApp>,
    pub gateway: Gateway,
    pub base_url: String,
}

/// Gateway + HTTP listener, optionally with a provider behind it. The
/// simulator is quiesced so assertions only see requested transitions.
pub async fn start_stack(with_provider: bool) -> Stack {
    let gw = Gateway::start(&node_config("e2e_gateway")).await.unwrap();

    let provider = if with_provider {
        let mut pcfg = node_config("e2e_provider");
        pcfg.sd_peer = Some(SocketAddr::from(([127, 0, 0, 1], gw.sd_port())));
        let mut settings = ProviderSettings::new(pcfg);
        settings.engine = EngineConfig {
            success_rate: 100,
            seed: 7,
        };
        settings.simulator = SimulatorConfig {
            event_interval: Duration::from_secs(3600),
            auto_events_enabled: false,
            seed: 7,
        };
        Some(ProviderApp::start(settings).await.unwrap())
    } else {
        None
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = gw.router();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let stack = Stack {
        provider,
        gateway: gw,
        base_url: format!("http://{addr}"),
    };

    if with_provider {
        wait_until_live(&stack).await;
    }
    stack
}

pub async fn wait_until_live(stack: &Stack) {
    let client = reqwest::Client::new();
    let deadline = tokio::time::Instant::now() + catalog::timing::DISCOVERY;
    loop {
        let health: serde_json::Value = client
            .get(format!("{}/api/health", stack.base_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let services = &health["data"]["services"];
        if ["door_service", "window_service", "light_service", "seat_service"]
            .iter()
            .all(|k| services[*k] == true)
        {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "services never went live: {health}"
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Incremental reader for one SSE connection.
pub struct SseReader {
    stream: std::pin::Pin<
        Box<dyn futures_util::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>,
    >,
    buffer: String,
}

impl SseReader {
    pub async fn connect(base_url: &str) -> SseReader {
        let response = reqwest::get(format!("{base_url}/api/events")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert!(
            response
                .headers()
                .get("content-type")
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );
        let mut reader = SseReader {
            stream: Box::pin(response.bytes_stream()),
            buffer: String::new(),
        };
        let (event, _) = reader.next_frame().await;
        assert_eq!(event, "welcome");
        reader
    }

    /// Next full frame as (event name, decoded `data:` JSON).
    pub async fn next_frame(&mut self) -> (String, serde_json::Value) {
        loop {
            if let Some(frame) = self.take_frame() {
                return frame;
            }
            let chunk = tokio::time::timeout(Duration::from_secs(10), self.stream.next())
                .await
                .expect("timed out waiting for SSE frame")
                .expect("SSE stream ended")
                .expect("SSE stream failed");
            self.buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    }

    /// Wait for a frame of the given type, skipping heartbeats and
    /// unrelated events.
    pub async fn expect_event(&mut self, wanted: &str) -> serde_json::Value {
        for _ in 0..32 {
            let (event, data) = self.next_frame().await;
            if event == wanted {
                return data;
            }
        }
        panic!("never saw SSE event {wanted}");
    }

    fn take_frame(&mut self) -> Option<(String, serde_json::Value)> {
        let end = self.buffer.find("\n\n")?;
        let frame: String = self.buffer.drain(..end + 2).collect();
        let mut event = String::new();
        let mut data = String::new();
        for line in frame.lines() {
            if let Some(rest) = line.strip_prefix("event:") {
                event = rest.trim().to_owned();
            } else if let Some(rest) = line.strip_prefix("data:") {
                data = rest.trim().to_owned();
            }
        }
        let value = serde_json::from_str(&data).unwrap_or(serde_json::Value::Null);
        Some((event, value))
    }
}
