//! Bridge from SOME/IP notifications to SSE events.

use body_protocol::api::{
    DoorLockEvent, DoorStateEvent, LightStateEvent, MemorySaveConfirmEvent, SeatPositionEvent,
    SseEventType, WindowPositionEvent,
};
use body_protocol::catalog::{self, door, light, seat, window};
use body_protocol::payload::*;
use someip_runtime::EventNotification;
use tracing::warn;

/// Decode one notification into its SSE representation. A payload that does
/// not decode is logged and dropped; the stream never sees partial data.
pub fn event_to_sse(event: &EventNotification) -> Option<(SseEventType, serde_json::Value)> {
    let result = match (event.service_id, event.event_id) {
        (id, door::ON_LOCK_STATE_CHANGED) if id == catalog::DOOR.service_id => {
            OnLockStateChanged::decode(&event.payload).map(|e| {
                (
                    SseEventType::DoorLockChanged,
                    serde_json::json!(DoorLockEvent {
                        door_id: e.door_id as u8,
                        locked: e.lock_state == LockState::Locked,
                    }),
                )
            })
        }
        (id, door::ON_DOOR_STATE_CHANGED) if id == catalog::DOOR.service_id => {
            OnDoorStateChanged::decode(&event.payload).map(|e| {
                (
                    SseEventType::DoorStateChanged,
                    serde_json::json!(DoorStateEvent {
                        door_id: e.door_id as u8,
                        door_state: match e.door_state {
                            DoorState::Open => "open",
                            DoorState::Closed => "closed",
                        },
                    }),
                )
            })
        }
        (id, window::ON_WINDOW_POSITION_CHANGED) if id == catalog::WINDOW.service_id => {
            OnWindowPositionChanged::decode(&event.payload).map(|e| {
                (
                    SseEventType::WindowPositionChanged,
                    serde_json::json!(WindowPositionEvent {
                        window_id: e.window_id as u8,
                        position: e.position,
                    }),
                )
            })
        }
        (id, light::ON_LIGHT_STATE_CHANGED) if id == catalog::LIGHT.service_id => {
            OnLightStateChanged::decode(&event.payload).map(|e| {
                (
                    SseEventType::LightStateChanged,
                    serde_json::json!(LightStateEvent {
                        light_type: e.light_type.as_str(),
                        state: e.state != 0,
                        value: e.state,
                    }),
                )
            })
        }
        (id, seat::ON_SEAT_POSITION_CHANGED) if id == catalog::SEAT.service_id => {
            OnSeatPositionChanged::decode(&event.payload).map(|e| {
                (
                    SseEventType::SeatPositionChanged,
                    serde_json::json!(SeatPositionEvent {
                        axis: e.axis.as_str(),
                        position: e.position,
                    }),
                )
            })
        }
        (id, seat::ON_MEMORY_SAVE_CONFIRM) if id == catalog::SEAT.service_id => {
            OnMemorySaveConfirm::decode(&event.payload).map(|e| {
                (
                    SseEventType::SeatMemorySaveConfirm,
                    serde_json::json!(MemorySaveConfirmEvent {
                        preset_id: e.preset_id,
                        result: e.result as u8,
                    }),
                )
            })
        }
        (service, event_id) => {
            warn!(service, event = event_id, "notification for unknown event");
            return None;
        }
    };

    match result {
        Ok(mapped) => Some(mapped),
        Err(e) => {
            warn!(
                service = event.service_id,
                event = event.event_id,
                error = %e,
                "undecodable notification dropped"
            );
            None
        }
    }
}
