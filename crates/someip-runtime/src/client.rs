//! Client-side transport runtime.
//!
//! Tracks provider availability per service, owns the TCP method
//! connections, correlates responses by session id, and forwards event
//! notifications to the application.
//!
//! Availability state machine, per service:
//!
//! ```text
//!   Unknown --offer--> Discovered --subscribeAck--> Live
//!      ^                   ^                          |
//!      |        TTL lapse  |                          |
//!      +---- stop offer / transport error ------------+
//! ```
//!
//! Method calls are allowed only in `Live`. `Discovered` rejects with
//! `ServiceNotReady`, `Unknown` with `ServiceUnavailable`; neither sends
//! a byte.

use crate::config::RuntimeConfig;
use crate::error::ClientError;
use crate::session::SessionCounter;
use body_protocol::catalog::{self, ServiceSpec};
use futures_util::{SinkExt, StreamExt};
use someip_core::sd::{self, SdEntry, SdEntryType};
use someip_core::{Message, MessageType, SomeipCodec};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Unknown,
    Discovered,
    Live,
}

/// A decoded event notification delivered to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventNotification {
    pub service_id: u16,
    pub event_id: u16,
    pub payload: Vec<u8>,
}

type PendingSender = oneshot::Sender<Result<Message, ClientError>>;

struct ServiceState {
    spec: ServiceSpec,
    availability: watch::Sender<Availability>,
    session: SessionCounter,
    inflight: Mutex<HashMap<u16, PendingSender>>,
    conn: Mutex<Option<mpsc::Sender<Message>>>,
    endpoint: Mutex<Option<SocketAddr>>,
    sd_origin: Mutex<Option<SocketAddr>>,
    last_offer: Mutex<Option<Instant>>,
    connecting: AtomicBool,
}

impl ServiceState {
    fn new(spec: ServiceSpec) -> ServiceState {
        ServiceState {
            spec,
            availability: watch::Sender::new(Availability::Unknown),
            session: SessionCounter::new(),
            inflight: Mutex::new(HashMap::new()),
            conn: Mutex::new(None),
            endpoint: Mutex::new(None),
            sd_origin: Mutex::new(None),
            last_offer: Mutex::new(None),
            connecting: AtomicBool::new(false),
        }
    }

    fn availability_now(&self) -> Availability {
        *self.availability.borrow()
    }

    /// Drop the transport, fail every pending call, and fall back to
    /// `Unknown`. Used for stop-offers, TTL lapses, and socket errors alike.
    fn mark_down(&self) {
        *self.conn.lock().expect("conn slot") = None;
        *self.last_offer.lock().expect("offer stamp") = None;
        let pending: Vec<PendingSender> = {
            let mut inflight = self.inflight.lock().expect("in-flight table");
            inflight.drain().map(|(_, tx)| tx).collect()
        };
        for tx in pending {
            let _ = tx.send(Err(ClientError::TransportDown));
        }
        if self.availability_now() != Availability::Unknown {
            info!(service = self.spec.name, "service unavailable");
        }
        self.availability.send_replace(Availability::Unknown);
    }
}

struct ClientShared {
    client_id: u16,
    udp: UdpSocket,
    udp_port: u16,
    services: HashMap<u16, Arc<ServiceState>>,
    events_tx: mpsc::Sender<EventNotification>,
}

pub struct ClientRuntime {
    shared: Arc<ClientShared>,
    tasks: Vec<JoinHandle<()>>,
}

impl ClientRuntime {
    /// Bind the SD/notification socket and start discovery for `specs`.
    pub async fn start(
        cfg: &RuntimeConfig,
        specs: &[ServiceSpec],
    ) -> io::Result<(ClientRuntime, mpsc::Receiver<EventNotification>)> {
        let udp = UdpSocket::bind(cfg.sd_bind_or(catalog::SD_PORT + 1)).await?;
        let udp_port = udp.local_addr()?.port();
        let (events_tx, events_rx) = mpsc::channel(256);

        let services = specs
            .iter()
            .map(|spec| (spec.service_id, Arc::new(ServiceState::new(*spec))))
            .collect();

        let shared = Arc::new(ClientShared {
            client_id: cfg.client_id,
            udp,
            udp_port,
            services,
            events_tx,
        });

        let tasks = vec![
            tokio::spawn(udp_loop(Arc::clone(&shared))),
            tokio::spawn(ttl_loop(Arc::clone(&shared))),
        ];

        info!(
            application = cfg.application_name,
            port = udp_port,
            "client runtime started"
        );
        Ok((ClientRuntime { shared, tasks }, events_rx))
    }

    /// Local SD/notification address, advertised to the provider in
    /// subscribe entries.
    pub fn sd_port(&self) -> u16 {
        self.shared.udp_port
    }

    pub fn availability(&self, service_id: u16) -> Option<watch::Receiver<Availability>> {
        self.shared
            .services
            .get(&service_id)
            .map(|s| s.availability.subscribe())
    }

    pub fn availability_now(&self, service_id: u16) -> Availability {
        self.shared
            .services
            .get(&service_id)
            .map_or(Availability::Unknown, |s| s.availability_now())
    }

    /// Issue one method call and await its response, mock-free: state
    /// policy and the 5000 ms deadline are enforced here.
    pub async fn call(
        &self,
        service_id: u16,
        method_id: u16,
        payload: Vec<u8>,
    ) -> Result<Message, ClientError> {
        let state = self
            .shared
            .services
            .get(&service_id)
            .ok_or(ClientError::ServiceUnavailable)?;
        match state.availability_now() {
            Availability::Unknown => return Err(ClientError::ServiceUnavailable),
            Availability::Discovered => return Err(ClientError::ServiceNotReady),
            Availability::Live => {}
        }
        let conn = state
            .conn
            .lock()
            .expect("conn slot")
            .clone()
            .ok_or(ClientError::TransportDown)?;

        let (tx, rx) = oneshot::channel();
        let session_id = {
            let mut inflight = state.inflight.lock().expect("in-flight table");
            // Skip ids still in flight so live records never collide.
            let mut session = state.session.next();
            while inflight.contains_key(&session) {
                session = state.session.next();
            }
            inflight.insert(session, tx);
            session
        };
        let mut guard = InflightGuard {
            state,
            session_id,
            armed: true,
        };

        let request = Message::request(
            service_id,
            method_id,
            self.shared.client_id,
            session_id,
            payload,
        );
        if conn.send(request).await.is_err() {
            // Guard cleans the table on return.
            return Err(ClientError::TransportDown);
        }

        match tokio::time::timeout(catalog::timing::METHOD_CALL, rx).await {
            Ok(Ok(result)) => {
                guard.armed = false;
                result
            }
            Ok(Err(_)) => {
                guard.armed = false;
                Err(ClientError::TransportDown)
            }
            Err(_) => {
                debug!(
                    service = state.spec.name,
                    session = session_id,
                    "method call deadline elapsed"
                );
                Err(ClientError::Timeout)
            }
        }
    }

    pub fn stop(&self) {
        for task in &self.tasks {
            task.abort();
        }
        for state in self.shared.services.values() {
            state.mark_down();
        }
        info!("client runtime stopped");
    }
}

/// Removes the in-flight record when a call is cancelled or times out, so a
/// late response is silently dropped.
struct InflightGuard<'a> {
    state: &'a ServiceState,
    session_id: u16,
    armed: bool,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state
                .inflight
                .lock()
                .expect("in-flight table")
                .remove(&self.session_id);
        }
    }
}

async fn udp_loop(shared: Arc<ClientShared>) {
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
            Ok(msg) => msg,
            Err(e) => {
                debug!(error = %e, %src, "undecodable datagram dropped");
                continue;
            }
        };
        if msg.service_id == sd::SD_SERVICE_ID {
            handle_sd(&shared, &msg, src);
        } else if msg.message_type == MessageType::Notification {
            handle_notification(&shared, msg);
        }
    }
}

fn handle_sd(shared: &Arc<ClientShared>, msg: &Message, src: SocketAddr) {
    let entries = match sd::decode_entries(&msg.payload) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(error = %e, %src, "malformed SD entries dropped");
            return;
        }
    };
    for entry in entries {
        let Some(state) = shared.services.get(&entry.service_id) else {
            continue;
        };
        match entry.entry_type {
            SdEntryType::OfferService if entry.ttl_secs == 0 => {
                info!(service = state.spec.name, "offer withdrawn");
                state.mark_down();
            }
            SdEntryType::OfferService => on_offer(shared, state, &entry, src),
            SdEntryType::SubscribeAck => {
                // Only a discovered service can go live; a stray ack after
                // the TTL lapsed must not resurrect a dead entry.
                if state.availability_now() == Availability::Discovered {
                    info!(service = state.spec.name, "service live");
                    state.availability.send_replace(Availability::Live);
                }
            }
            SdEntryType::Subscribe => {
                debug!(service = state.spec.name, "unexpected subscribe entry");
            }
        }
    }
}

fn on_offer(
    shared: &Arc<ClientShared>,
    state: &Arc<ServiceState>,
    entry: &SdEntry,
    src: SocketAddr,
) {
    *state.last_offer.lock().expect("offer stamp") = Some(Instant::now());
    *state.endpoint.lock().expect("endpoint slot") = Some(SocketAddr::new(src.ip(), entry.port));
    *state.sd_origin.lock().expect("SD origin slot") = Some(src);

    if state.availability_now() == Availability::Unknown {
        info!(service = state.spec.name, %src, "service discovered");
        state.availability.send_replace(Availability::Discovered);
    }

    let connected = state.conn.lock().expect("conn slot").is_some();
    if !connected && !state.connecting.swap(true, Ordering::SeqCst) {
        tokio::spawn(connect_task(Arc::clone(shared), Arc::clone(state)));
    }
}

fn handle_notification(shared: &Arc<ClientShared>, msg: Message) {
    let Some(state) = shared.services.get(&msg.service_id) else {
        debug!(service = msg.service_id, "notification for unknown service");
        return;
    };
    // Accepted until the TTL sweeper actually flips the state to Unknown.
    if state.availability_now() == Availability::Unknown {
        debug!(service = state.spec.name, "notification while unknown dropped");
        return;
    }
    let event = EventNotification {
        service_id: msg.service_id,
        event_id: msg.method_id,
        payload: msg.payload,
    };
    if shared.events_tx.try_send(event).is_err() {
        warn!(service = state.spec.name, "event queue full, notification dropped");
    }
}

/// Open the TCP method connection and (re)issue the stored event-group
/// subscription. Runs at most once at a time per service.
async fn connect_task(shared: Arc<ClientShared>, state: Arc<ServiceState>) {
    let result = establish(&shared, &state).await;
    state.connecting.store(false, Ordering::SeqCst);
    if let Err(e) = result {
        warn!(service = state.spec.name, error = %e, "method connection failed");
    }
}

async fn establish(shared: &Arc<ClientShared>, state: &Arc<ServiceState>) -> io::Result<()> {
    let Some(endpoint) = *state.endpoint.lock().expect("endpoint slot") else {
        return Ok(());
    };
    let stream =
        tokio::time::timeout(catalog::timing::TCP_CONNECT, TcpStream::connect(endpoint))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;

    let framed = Framed::new(stream, SomeipCodec);
    let (mut sink, inbound) = framed.split();
    let (tx, mut rx) = mpsc::channel::<Message>(64);
    *state.conn.lock().expect("conn slot") = Some(tx);

    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });
    tokio::spawn(read_responses(Arc::clone(state), inbound));

    // Subscription rearms on every (re)connect, which covers provider
    // restarts: the fresh offer leads straight back here.
    let subscribe = sd::sd_message(&[SdEntry::subscribe(
        state.spec.service_id,
        state.spec.instance_id,
        state.spec.major_version,
        state.spec.event_group,
        shared.udp_port,
    )]);
    let origin = *state.sd_origin.lock().expect("SD origin slot");
    if let Some(origin) = origin {
        shared.udp.send_to(&subscribe.encode(), origin).await?;
    }
    Ok(())
}

async fn read_responses(
    state: Arc<ServiceState>,
    mut inbound: futures_util::stream::SplitStream<Framed<TcpStream, SomeipCodec>>,
) {
    let mut availability = state.availability.subscribe();
    loop {
        let frame = tokio::select! {
            frame = inbound.next() => frame,
            changed = availability.changed() => {
                // The TTL sweeper or a stop-offer pulled the service down;
                // release the socket so the provider side unwinds too.
                if changed.is_err() || *availability.borrow() == Availability::Unknown {
                    break;
                }
                continue;
            }
        };
        let Some(frame) = frame else { break };
        let msg = match frame {
            Ok(msg) => msg,
            Err(e) => {
                warn!(service = state.spec.name, error = %e, "response stream failed");
                break;
            }
        };
        match msg.message_type {
            MessageType::Response | MessageType::Error => {
                let pending = state
                    .inflight
                    .lock()
                    .expect("in-flight table")
                    .remove(&msg.session_id);
                match pending {
                    Some(tx) => {
                        let _ = tx.send(Ok(msg));
                    }
                    None => {
                        debug!(
                            service = state.spec.name,
                            session = msg.session_id,
                            "late response dropped"
                        );
                    }
                }
            }
            other => {
                debug!(service = state.spec.name, ?other, "unexpected message on method channel");
            }
        }
    }
    state.mark_down();
}

/// Flip services to `Unknown` when their offers stop arriving.
async fn ttl_loop(shared: Arc<ClientShared>) {
    let mut tick = tokio::time::interval(Duration::from_millis(500));
    loop {
        tick.tick().await;
        for state in shared.services.values() {
            let lapsed = state
                .last_offer
                .lock()
                .expect("offer stamp")
                .is_some_and(|t| t.elapsed() > catalog::timing::OFFER_TTL);
            if lapsed {
                info!(service = state.spec.name, "offer TTL lapsed");
                state.mark_down();
            }
        }
    }
}
