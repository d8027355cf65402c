//! SSE broadcast fan-out.
//!
//! Subscribers sit in a table behind a mutex; each holds a buffered,
//! non-blocking sink. Publishing walks the table once: a failed `try_send`
//! reaps the subscriber on the spot, as does 10 minutes without a
//! successful write. Frames carry `{"type", "data", "timestamp"}` and the
//! heartbeat task publishes every 30 seconds.

use axum::response::sse::Event;
use body_protocol::api::SseEventType;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const IDLE_LIMIT: Duration = Duration::from_secs(600);

/// Per-subscriber buffer; a UI that cannot drain this many frames is dead
/// enough to reap.
const SUBSCRIBER_BUFFER: usize = 64;

struct Subscriber {
    id: u64,
    sink: mpsc::Sender<Event>,
    last_activity: Instant,
}

struct Inner {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    started: Instant,
}

#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<Inner>,
}

impl Default for Broadcaster {
    fn default() -> Broadcaster {
        Broadcaster::new()
    }
}

impl Broadcaster {
    pub fn new() -> Broadcaster {
        Broadcaster {
            inner: Arc::new(Inner {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                started: Instant::now(),
            }),
        }
    }

    /// Register a new subscriber. The `welcome` frame is already queued on
    /// the returned receiver.
    pub fn subscribe(&self) -> (u64, mpsc::Receiver<Event>) {
        let (sink, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        let welcome = frame(
            SseEventType::Welcome,
            serde_json::json!({"message": "Connected to Body Controller Events"}),
        );
        // Capacity is fresh, this cannot fail.
        let _ = sink.try_send(welcome);

        let mut subscribers = self.inner.subscribers.lock().expect("subscriber table");
        subscribers.push(Subscriber {
            id,
            sink,
            last_activity: Instant::now(),
        });
        info!(connection = id, total = subscribers.len(), "SSE subscriber connected");
        (id, rx)
    }

    /// Broadcast one frame to every live subscriber, reaping the dead.
    pub fn publish(&self, event_type: SseEventType, data: serde_json::Value) {
        let event = frame(event_type, data);
        let now = Instant::now();
        let mut subscribers = self.inner.subscribers.lock().expect("subscriber table");
        subscribers.retain_mut(|sub| {
            if now.duration_since(sub.last_activity) > IDLE_LIMIT {
                info!(connection = sub.id, "SSE subscriber idle, reaping");
                return false;
            }
            match sub.sink.try_send(event.clone()) {
                Ok(()) => {
                    sub.last_activity = now;
                    true
                }
                Err(e) => {
                    info!(connection = sub.id, error = %e, "SSE write failed, reaping");
                    false
                }
            }
        });
        debug!(
            event = event_type.as_str(),
            subscribers = subscribers.len(),
            "SSE frame published"
        );
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().expect("subscriber table").len()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.started.elapsed().as_secs()
    }

    /// Heartbeat loop: epoch + uptime every 30 s. Doubles as the idle
    /// reaper, since publishing visits every subscriber.
    pub async fn run_heartbeat(self) {
        loop {
            tokio::time::sleep(HEARTBEAT_INTERVAL).await;
            self.publish(
                SseEventType::Heartbeat,
                serde_json::json!({"uptime": self.uptime_secs()}),
            );
        }
    }
}

fn frame(event_type: SseEventType, data: serde_json::Value) -> Event {
    let body = serde_json::json!({
        "type": event_type.as_str(),
        "data": data,
        "timestamp": chrono::Utc::now().timestamp(),
    });
    Event::default().event(event_type.as_str()).data(body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn welcome_frame_arrives_first() {
        let broadcaster = Broadcaster::new();
        let (_, mut rx) = broadcaster.subscribe();
        let event = rx.recv().await.unwrap();
        let rendered = format!("{event:?}");
        assert!(rendered.contains("welcome"));
    }

    #[tokio::test]
    async fn frames_reach_every_subscriber_in_order() {
        let broadcaster = Broadcaster::new();
        let (_, mut a) = broadcaster.subscribe();
        let (_, mut b) = broadcaster.subscribe();
        a.recv().await.unwrap();
        b.recv().await.unwrap();

        broadcaster.publish(SseEventType::DoorLockChanged, serde_json::json!({"doorID": 0}));
        broadcaster.publish(SseEventType::Heartbeat, serde_json::json!({"uptime": 1}));

        for rx in [&mut a, &mut b] {
            let first = format!("{:?}", rx.recv().await.unwrap());
            let second = format!("{:?}", rx.recv().await.unwrap());
            assert!(first.contains("door_lock_changed"));
            assert!(second.contains("heartbeat"));
        }
    }

    #[tokio::test]
    async fn dropped_subscriber_is_reaped_on_publish() {
        let broadcaster = Broadcaster::new();
        let (_, rx_a) = broadcaster.subscribe();
        let (_, _rx_b) = broadcaster.subscribe();
        let (_, _rx_c) = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 3);

        drop(rx_a);
        broadcaster.publish(SseEventType::Heartbeat, serde_json::json!({"uptime": 0}));
        assert_eq!(broadcaster.subscriber_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_cadence_is_thirty_seconds() {
        let broadcaster = Broadcaster::new();
        tokio::spawn(broadcaster.clone().run_heartbeat());
        let (_, mut rx) = broadcaster.subscribe();
        let welcome = rx.recv().await.unwrap();
        assert!(format!("{welcome:?}").contains("welcome"));

        let start = Instant::now();
        let first = rx.recv().await.unwrap();
        assert!(format!("{first:?}").contains("heartbeat"));
        let first_at = start.elapsed();
        assert!(first_at >= Duration::from_secs(29) && first_at <= Duration::from_secs(31));

        let second = rx.recv().await.unwrap();
        assert!(format!("{second:?}").contains("heartbeat"));
        let gap = start.elapsed() - first_at;
        assert!(gap >= Duration::from_secs(29) && gap <= Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_subscriber_is_reaped_even_with_a_live_channel() {
        let broadcaster = Broadcaster::new();
        let (_, _rx) = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 1);

        tokio::time::advance(IDLE_LIMIT + Duration::from_secs(1)).await;
        broadcaster.publish(SseEventType::Heartbeat, serde_json::json!({"uptime": 0}));
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn full_buffer_counts_as_a_failed_write() {
        let broadcaster = Broadcaster::new();
        let (_, _rx) = broadcaster.subscribe();
        // Never drained: the welcome frame plus these fill the buffer exactly.
        for _ in 0..SUBSCRIBER_BUFFER - 1 {
            broadcaster.publish(SseEventType::Heartbeat, serde_json::json!({"uptime": 0}));
        }
        assert_eq!(broadcaster.subscriber_count(), 1);
        broadcaster.publish(SseEventType::Heartbeat, serde_json::json!({"uptime": 0}));
        assert_eq!(broadcaster.subscriber_count(), 0);
    }
}
