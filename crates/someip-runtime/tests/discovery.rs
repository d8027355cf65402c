//! Discovery and availability over loopback sockets.
//!
//! A real client runtime and a real provider runtime exchange offers,
//! subscribes, and acks on ephemeral ports.

use body_protocol::catalog;
use body_protocol::payload::{LockState, OnLockStateChanged, Position, WirePayload};
use someip_runtime::provider::{InboundRequest, ProviderRuntime, RequestOutcome, ServiceRegistration};
use someip_runtime::{Availability, ClientRuntime, EventNotification, RuntimeConfig};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::mpsc;

fn node_config(app: &str) -> RuntimeConfig {
    let mut cfg = RuntimeConfig::for_application(app);
    cfg.sd_port = Some(0);
    for spec in catalog::ALL_SERVICES {
        cfg.service_ports.insert(spec.name.to_owned(), 0);
    }
    cfg
}

/// Echo provider for the door service: replies with the request payload.
fn echo_registration() -> (ServiceRegistration, tokio::task::JoinHandle<()>) {
    let (req_tx, mut req_rx) = mpsc::channel::<InboundRequest>(16);
    let handler = tokio::spawn(async move {
        while let Some(req) = req_rx.recv().await {
            let _ = req.reply.send(RequestOutcome::Reply(req.payload));
        }
    });
    (
        ServiceRegistration {
            spec: catalog::DOOR,
            requests: req_tx,
        },
        handler,
    )
}

async fn wait_for(client: &ClientRuntime, service_id: u16, target: Availability) {
    let mut rx = client.availability(service_id).expect("service registered");
    tokio::time::timeout(catalog::timing::DISCOVERY, async {
        loop {
            if *rx.borrow() == target {
                return;
            }
            rx.changed().await.expect("availability channel");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("service 0x{service_id:04x} never reached {target:?}"));
}

async fn start_pair() -> (
    ClientRuntime,
    mpsc::Receiver<EventNotification>,
    ProviderRuntime,
    tokio::task::JoinHandle<()>,
) {
    let (client, events) =
        ClientRuntime::start(&node_config("test_client"), &catalog::ALL_SERVICES)
            .await
            .unwrap();

    let mut pcfg = node_config("test_provider");
    pcfg.sd_peer = Some(SocketAddr::from(([127, 0, 0, 1], client.sd_port())));
    let (registration, handler) = echo_registration();
    let provider = ProviderRuntime::start(&pcfg, vec![registration]).await.unwrap();

    (client, events, provider, handler)
}

#[tokio::test]
async fn offer_then_ack_reaches_live() {
    let (client, _events, provider, _handler) = start_pair().await;

    wait_for(&client, catalog::DOOR.service_id, Availability::Live).await;
    // Services nobody offers stay unknown.
    assert_eq!(
        client.availability_now(catalog::SEAT.service_id),
        Availability::Unknown
    );
    // Exactly one subscription despite repeated offers.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(provider.subscriber_count(catalog::DOOR.service_id), 1);

    provider.stop().await;
    client.stop();
}

#[tokio::test]
async fn stop_offer_flips_back_to_unknown() {
    let (client, _events, provider, _handler) = start_pair().await;
    wait_for(&client, catalog::DOOR.service_id, Availability::Live).await;

    provider.stop().await;
    wait_for(&client, catalog::DOOR.service_id, Availability::Unknown).await;
    client.stop();
}

#[tokio::test]
async fn offer_ttl_lapse_flips_back_to_unknown() {
    let (client, _events, provider, handler) = start_pair().await;
    wait_for(&client, catalog::DOOR.service_id, Availability::Live).await;

    // Silence the announcer without a stop-offer; only the TTL remains.
    provider.abort();
    handler.abort();
    tokio::time::sleep(catalog::timing::OFFER_TTL + Duration::from_millis(800)).await;
    assert_eq!(
        client.availability_now(catalog::DOOR.service_id),
        Availability::Unknown
    );
    client.stop();
}

#[tokio::test]
async fn notifications_are_accepted_until_the_ttl_lapses() {
    let (client, mut events, provider, handler) = start_pair().await;
    wait_for(&client, catalog::DOOR.service_id, Availability::Live).await;

    // Offers go silent, but the TTL has not lapsed yet.
    let notifier = provider.notifier(&catalog::DOOR);
    provider.abort();
    handler.abort();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let payload = OnLockStateChanged {
        door_id: Position::RearLeft,
        lock_state: LockState::Locked,
    }
    .encode();
    notifier
        .notify(catalog::door::ON_LOCK_STATE_CHANGED, payload.clone())
        .await;

    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("notification not delivered")
        .unwrap();
    assert_eq!(event.service_id, catalog::DOOR.service_id);
    assert_eq!(event.event_id, catalog::door::ON_LOCK_STATE_CHANGED);
    assert_eq!(event.payload, payload);

    // After the TTL the service is unknown and notifications stop flowing.
    tokio::time::sleep(catalog::timing::OFFER_TTL + Duration::from_millis(800)).await;
    assert_eq!(
        client.availability_now(catalog::DOOR.service_id),
        Availability::Unknown
    );
    notifier
        .notify(catalog::door::ON_LOCK_STATE_CHANGED, payload)
        .await;
    assert!(
        tokio::time::timeout(Duration::from_millis(500), events.recv())
            .await
            .is_err()
    );
    client.stop();
}

#[tokio::test]
async fn calls_are_rejected_before_discovery() {
    let (client, _events) =
        ClientRuntime::start(&node_config("lonely_client"), &catalog::ALL_SERVICES)
            .await
            .unwrap();
    let err = client
        .call(catalog::DOOR.service_id, 0x0001, vec![0, 0])
        .await
        .unwrap_err();
    assert_eq!(err, someip_runtime::ClientError::ServiceUnavailable);
    client.stop();
}
