//! Provider-side transport runtime.
//!
//! Owns the SD announcer, the per-service TCP method listeners, and the
//! subscriber registry. Service engines stay out of the transport: each
//! registers an `mpsc` channel of [`InboundRequest`]s and replies through a
//! oneshot, so a slow handler never blocks the connection read loop.

use crate::config::RuntimeConfig;
use body_protocol::catalog::{self, ServiceSpec};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use someip_core::sd::{self, SdEntry, SdEntryType};
use someip_core::{Message, MessageType, ReturnCode, SomeipCodec};
use std::collections::{HashMap, HashSet};
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// A decoded-enough method call handed to a service engine. The payload is
/// still raw bytes; the engine owns payload decoding so it can answer
/// malformed input with the right wire error.
#[derive(Debug)]
pub struct InboundRequest {
    pub method_id: u16,
    pub payload: Vec<u8>,
    pub reply: oneshot::Sender<RequestOutcome>,
}

#[derive(Debug)]
pub enum RequestOutcome {
    /// Encoded response payload, sent with `E_OK`.
    Reply(Vec<u8>),
    /// Protocol-level fault, sent as an `ERROR` message.
    Fault(ReturnCode),
}

/// One service offered by this provider.
pub struct ServiceRegistration {
    pub spec: ServiceSpec,
    pub requests: mpsc::Sender<InboundRequest>,
}

struct ProviderService {
    spec: ServiceSpec,
    advertised_port: u16,
    requests: mpsc::Sender<InboundRequest>,
}

struct ProviderShared {
    udp: UdpSocket,
    sd_peer: SocketAddr,
    services: Vec<ProviderService>,
    /// (service_id, event_group) -> notification endpoints.
    subscribers: Mutex<HashMap<(u16, u16), HashSet<SocketAddr>>>,
}

impl ProviderShared {
    fn service(&self, service_id: u16) -> Option<&ProviderService> {
        self.services.iter().find(|s| s.spec.service_id == service_id)
    }

    fn offer_entries(&self, ttl_secs: u32) -> Vec<SdEntry> {
        self.services
            .iter()
            .map(|s| {
                SdEntry::offer(
                    s.spec.service_id,
                    s.spec.instance_id,
                    s.spec.major_version,
                    ttl_secs,
                    s.advertised_port,
                )
            })
            .collect()
    }

    async fn send_offers(&self, ttl_secs: u32) {
        let msg = sd::sd_message(&self.offer_entries(ttl_secs));
        if let Err(e) = self.udp.send_to(&msg.encode(), self.sd_peer).await {
            debug!(error = %e, peer = %self.sd_peer, "offer announcement failed");
        }
    }
}

pub struct ProviderRuntime {
    shared: Arc<ProviderShared>,
    sd_addr: SocketAddr,
    service_addrs: HashMap<u16, SocketAddr>,
    tasks: Vec<JoinHandle<()>>,
}

impl ProviderRuntime {
    /// Bind all endpoints and start announcing.
    pub async fn start(
        cfg: &RuntimeConfig,
        registrations: Vec<ServiceRegistration>,
    ) -> io::Result<ProviderRuntime> {
        let udp = UdpSocket::bind(cfg.sd_bind_or(catalog::SD_PORT)).await?;
        let sd_addr = udp.local_addr()?;
        let sd_peer = cfg.sd_peer_or(SocketAddr::new(cfg.unicast, catalog::SD_PORT + 1));

        let mut services = Vec::with_capacity(registrations.len());
        let mut listeners = Vec::with_capacity(registrations.len());
        let mut service_addrs = HashMap::new();
        for reg in registrations {
            let listener =
                TcpListener::bind(SocketAddr::new(cfg.unicast, cfg.port_for(&reg.spec))).await?;
            let addr = listener.local_addr()?;
            info!(service = reg.spec.name, %addr, "method endpoint bound");
            service_addrs.insert(reg.spec.service_id, addr);
            services.push(ProviderService {
                spec: reg.spec,
                advertised_port: addr.port(),
                requests: reg.requests,
            });
            listeners.push((reg.spec.service_id, listener));
        }

        let shared = Arc::new(ProviderShared {
            udp,
            sd_peer,
            services,
            subscribers: Mutex::new(HashMap::new()),
        });

        let mut tasks = Vec::new();
        tasks.push(tokio::spawn(announce_loop(Arc::clone(&shared))));
        tasks.push(tokio::spawn(sd_loop(Arc::clone(&shared))));
        for (service_id, listener) in listeners {
            tasks.push(tokio::spawn(accept_loop(
                Arc::clone(&shared),
                service_id,
                listener,
            )));
        }

        info!(%sd_addr, peer = %sd_peer, "provider runtime started");
        Ok(ProviderRuntime {
            shared,
            sd_addr,
            service_addrs,
            tasks,
        })
    }

    pub fn sd_addr(&self) -> SocketAddr {
        self.sd_addr
    }

    pub fn service_addr(&self, service_id: u16) -> Option<SocketAddr> {
        self.service_addrs.get(&service_id).copied()
    }

    /// Handle for emitting notifications for one service.
    pub fn notifier(&self, spec: &ServiceSpec) -> Notifier {
        Notifier {
            shared: Arc::clone(&self.shared),
            service_id: spec.service_id,
            event_group: spec.event_group,
        }
    }

    pub fn subscriber_count(&self, service_id: u16) -> usize {
        let subs = self.shared.subscribers.lock().expect("subscriber table");
        subs.iter()
            .filter(|((sid, _), _)| *sid == service_id)
            .map(|(_, set)| set.len())
            .sum()
    }

    /// Withdraw all offers and tear the transport down.
    pub async fn stop(self) {
        self.shared.send_offers(0).await;
        for task in &self.tasks {
            task.abort();
        }
        info!("provider runtime stopped");
    }

    /// Tear down without withdrawing offers, as a crashed node would.
    /// Clients only notice once the offer TTL lapses.
    pub fn abort(self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Cyclic offer announcements: one initial jittered announcement, then a
/// fixed 2000 ms cadence.
async fn announce_loop(shared: Arc<ProviderShared>) {
    let jitter = rand::thread_rng().gen_range(10..=100);
    tokio::time::sleep(Duration::from_millis(jitter)).await;
    loop {
        shared.send_offers(catalog::timing::OFFER_TTL_SECS).await;
        tokio::time::sleep(catalog::timing::OFFER_INTERVAL).await;
    }
}

/// Inbound SD traffic: subscribes from clients.
async fn sd_loop(shared: Arc<ProviderShared>) {
    let mut buf = vec![0u8; 2048];
    loop {
        let (len, src) = match shared.udp.recv_from(&mut buf).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "SD socket receive failed");
                continue;
            }
        };
        let msg = match Message::decode(&buf[..len]) {
            Ok(m) if m.service_id == sd::SD_SERVICE_ID => m,
            Ok(m) => {
                debug!(service = m.service_id, "non-SD datagram ignored");
                continue;
            }
            Err(e) => {
                debug!(error = %e, %src, "undecodable SD datagram dropped");
                continue;
            }
        };
        let entries = match sd::decode_entries(&msg.payload) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(error = %e, %src, "malformed SD entries dropped");
                continue;
            }
        };
        for entry in entries {
            if entry.entry_type != SdEntryType::Subscribe {
                continue;
            }
            let Some(service) = shared.service(entry.service_id) else {
                debug!(service = entry.service_id, "subscribe for unknown service");
                continue;
            };
            let endpoint = SocketAddr::new(src.ip(), entry.port);
            let newly_added = {
                let mut subs = shared.subscribers.lock().expect("subscriber table");
                subs.entry((entry.service_id, entry.aux))
                    .or_default()
                    .insert(endpoint)
            };
            if newly_added {
                info!(
                    service = service.spec.name,
                    group = entry.aux,
                    %endpoint,
                    "event subscriber registered"
                );
            }
            let ack = sd::sd_message(&[SdEntry::ack(&entry)]);
            if let Err(e) = shared.udp.send_to(&ack.encode(), src).await {
                debug!(error = %e, %src, "subscribe ack failed");
            }
        }
    }
}

async fn accept_loop(shared: Arc<ProviderShared>, service_id: u16, listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(service = service_id, %peer, "method connection accepted");
                tokio::spawn(serve_connection(Arc::clone(&shared), service_id, stream));
            }
            Err(e) => {
                warn!(service = service_id, error = %e, "accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

async fn serve_connection(shared: Arc<ProviderShared>, service_id: u16, stream: TcpStream) {
    let framed = Framed::new(stream, SomeipCodec);
    let (mut sink, mut inbound) = framed.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(64);

    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = inbound.next().await {
        let mut msg = match frame {
            Ok(msg) => msg,
            Err(e) => {
                warn!(service = service_id, error = %e, "method stream failed");
                break;
            }
        };
        if msg.message_type != MessageType::Request {
            let _ = out_tx
                .send(Message::error_to(&msg, ReturnCode::WrongMessageType))
                .await;
            continue;
        }
        let Some(service) = shared.service(msg.service_id).filter(|_| msg.service_id == service_id)
        else {
            let _ = out_tx
                .send(Message::error_to(&msg, ReturnCode::UnknownMethod))
                .await;
            continue;
        };

        let payload = std::mem::take(&mut msg.payload);
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = InboundRequest {
            method_id: msg.method_id,
            payload,
            reply: reply_tx,
        };
        if service.requests.send(request).await.is_err() {
            let _ = out_tx
                .send(Message::error_to(&msg, ReturnCode::NotReady))
                .await;
            continue;
        }
        let out = out_tx.clone();
        tokio::spawn(async move {
            let response = match reply_rx.await {
                Ok(RequestOutcome::Reply(payload)) => Message::response_to(&msg, payload),
                Ok(RequestOutcome::Fault(code)) => Message::error_to(&msg, code),
                Err(_) => Message::error_to(&msg, ReturnCode::NotOk),
            };
            let _ = out.send(response).await;
        });
    }

    writer.abort();
}

/// Emits event notifications to every subscriber of the service's group.
#[derive(Clone)]
pub struct Notifier {
    shared: Arc<ProviderShared>,
    service_id: u16,
    event_group: u16,
}

impl Notifier {
    pub async fn notify(&self, event_id: u16, payload: Vec<u8>) {
        let endpoints: Vec<SocketAddr> = {
            let subs = self.shared.subscribers.lock().expect("subscriber table");
            subs.get(&(self.service_id, self.event_group))
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default()
        };
        if endpoints.is_empty() {
            return;
        }
        let bytes = Message::notification(self.service_id, event_id, payload).encode();
        for endpoint in endpoints {
            if let Err(e) = self.shared.udp.send_to(&bytes, endpoint).await {
                debug!(service = self.service_id, %endpoint, error = %e, "notify failed");
            }
        }
    }
}
