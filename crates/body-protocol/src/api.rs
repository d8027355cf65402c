//! JSON types for the gateway's REST and SSE surface.
//!
//! Request bodies use camelCase keys (`doorID`, `windowID`, `presetID`); the
//! two legacy seat-memory endpoints historically used `preset_id`, so every
//! id field also accepts its snake_case alias on input.

use crate::payload;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DoorLockRequest {
    #[serde(rename = "doorID", alias = "door_id")]
    pub door_id: u8,
    pub command: u8,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WindowPositionRequest {
    #[serde(rename = "windowID", alias = "window_id")]
    pub window_id: u8,
    pub position: u8,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WindowControlRequest {
    #[serde(rename = "windowID", alias = "window_id")]
    pub window_id: u8,
    pub command: u8,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LightCommandRequest {
    pub command: u8,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SeatAdjustRequest {
    pub axis: u8,
    pub direction: u8,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SeatPresetRequest {
    #[serde(rename = "presetID", alias = "preset_id")]
    pub preset_id: u8,
}

// ---------------------------------------------------------------------------
// Response data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct DoorLockData {
    #[serde(rename = "doorID")]
    pub door_id: u8,
    pub result: u8,
}

impl From<payload::SetLockStateResp> for DoorLockData {
    fn from(resp: payload::SetLockStateResp) -> Self {
        DoorLockData {
            door_id: resp.door_id as u8,
            result: resp.result as u8,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct DoorStatusData {
    #[serde(rename = "doorID")]
    pub door_id: u8,
    #[serde(rename = "lockState")]
    pub locked: bool,
}

impl From<payload::GetLockStateResp> for DoorStatusData {
    fn from(resp: payload::GetLockStateResp) -> Self {
        DoorStatusData {
            door_id: resp.door_id as u8,
            locked: resp.lock_state == payload::LockState::Locked,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct WindowResultData {
    #[serde(rename = "windowID")]
    pub window_id: u8,
    pub result: u8,
}

impl From<payload::SetWindowPositionResp> for WindowResultData {
    fn from(resp: payload::SetWindowPositionResp) -> Self {
        WindowResultData {
            window_id: resp.window_id as u8,
            result: resp.result as u8,
        }
    }
}

impl From<payload::ControlWindowResp> for WindowResultData {
    fn from(resp: payload::ControlWindowResp) -> Self {
        WindowResultData {
            window_id: resp.window_id as u8,
            result: resp.result as u8,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct WindowPositionData {
    #[serde(rename = "windowID")]
    pub window_id: u8,
    pub position: u8,
}

impl From<payload::GetWindowPositionResp> for WindowPositionData {
    fn from(resp: payload::GetWindowPositionResp) -> Self {
        WindowPositionData {
            window_id: resp.window_id as u8,
            position: resp.position,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct LightResultData {
    #[serde(rename = "newState")]
    pub new_state: u8,
    pub result: u8,
}

impl From<payload::SetHeadlightStateResp> for LightResultData {
    fn from(resp: payload::SetHeadlightStateResp) -> Self {
        LightResultData {
            new_state: resp.new_state as u8,
            result: resp.result as u8,
        }
    }
}

impl From<payload::SetIndicatorStateResp> for LightResultData {
    fn from(resp: payload::SetIndicatorStateResp) -> Self {
        LightResultData {
            new_state: resp.new_state as u8,
            result: resp.result as u8,
        }
    }
}

impl From<payload::SetPositionLightStateResp> for LightResultData {
    fn from(resp: payload::SetPositionLightStateResp) -> Self {
        LightResultData {
            new_state: resp.new_state as u8,
            result: resp.result as u8,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SeatAdjustData {
    pub axis: u8,
    pub result: u8,
}

impl From<payload::AdjustSeatResp> for SeatAdjustData {
    fn from(resp: payload::AdjustSeatResp) -> Self {
        SeatAdjustData {
            axis: resp.axis as u8,
            result: resp.result as u8,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SeatPresetData {
    #[serde(rename = "presetID")]
    pub preset_id: u8,
    pub result: u8,
}

impl From<payload::SaveMemoryPositionResp> for SeatPresetData {
    fn from(resp: payload::SaveMemoryPositionResp) -> Self {
        SeatPresetData {
            preset_id: resp.preset_id,
            result: resp.result as u8,
        }
    }
}

impl From<payload::RecallMemoryPositionResp> for SeatPresetData {
    fn from(resp: payload::RecallMemoryPositionResp) -> Self {
        SeatPresetData {
            preset_id: resp.preset_id,
            result: resp.result as u8,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub door_service: bool,
    pub window_service: bool,
    pub light_service: bool,
    pub seat_service: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthData {
    pub status: &'static str,
    pub uptime: u64,
    pub services: ServiceHealth,
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: T,
    pub timestamp: i64,
}

impl<T> ApiEnvelope<T> {
    pub fn new(data: T, timestamp: i64) -> ApiEnvelope<T> {
        ApiEnvelope {
            success: true,
            data,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorEnvelope {
    pub success: bool,
    pub error: String,
    pub message: String,
    pub timestamp: i64,
}

impl ApiErrorEnvelope {
    pub fn new(error: impl Into<String>, message: impl Into<String>, timestamp: i64) -> Self {
        ApiErrorEnvelope {
            success: false,
            error: error.into(),
            message: message.into(),
            timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// SSE events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseEventType {
    Welcome,
    Heartbeat,
    DoorLockChanged,
    DoorStateChanged,
    WindowPositionChanged,
    LightStateChanged,
    SeatPositionChanged,
    SeatMemorySaveConfirm,
}

impl SseEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            SseEventType::Welcome => "welcome",
            SseEventType::Heartbeat => "heartbeat",
            SseEventType::DoorLockChanged => "door_lock_changed",
            SseEventType::DoorStateChanged => "door_state_changed",
            SseEventType::WindowPositionChanged => "window_position_changed",
            SseEventType::LightStateChanged => "light_state_changed",
            SseEventType::SeatPositionChanged => "seat_position_changed",
            SseEventType::SeatMemorySaveConfirm => "seat_memory_save_confirm",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct DoorLockEvent {
    #[serde(rename = "doorID")]
    pub door_id: u8,
    #[serde(rename = "lockState")]
    pub locked: bool,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct DoorStateEvent {
    #[serde(rename = "doorID")]
    pub door_id: u8,
    #[serde(rename = "doorState")]
    pub door_state: &'static str,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct WindowPositionEvent {
    #[serde(rename = "windowID")]
    pub window_id: u8,
    pub position: u8,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct LightStateEvent {
    #[serde(rename = "lightType")]
    pub light_type: &'static str,
    /// On/off view of the selected light; `value` keeps the exact level.
    pub state: bool,
    pub value: u8,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SeatPositionEvent {
    pub axis: &'static str,
    pub position: i8,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MemorySaveConfirmEvent {
    #[serde(rename = "presetID")]
    pub preset_id: u8,
    pub result: u8,
}
