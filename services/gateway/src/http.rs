//! REST surface.
//!
//! Routes:
//!   POST /api/door/lock              {doorID, command}
//!   GET  /api/door/{id}/status
//!   POST /api/window/position        {windowID, position}
//!   POST /api/window/control         {windowID, command}
//!   GET  /api/window/{id}/position
//!   POST /api/light/headlight        {command}
//!   POST /api/light/indicator        {command}
//!   POST /api/light/position         {command}
//!   POST /api/seat/adjust            {axis, direction}
//!   POST /api/seat/memory/save      {presetID | preset_id}
//!   POST /api/seat/memory/recall    {presetID | preset_id}
//!   GET  /api/health
//!   GET  /api/info
//!   GET  /api/events                 (SSE)
//!
//! Success is `{"success":true,"data":...,"timestamp":...}`. Invalid input is
//! 400 without a byte hitting the wire; a method-call deadline is 408; a
//! dead transport is 503. A provider that simply is not LIVE triggers the
//! mock fallback: a synthesized success plus the matching SSE event, so UI
//! clients stay interactive before the hardware node appears.

use crate::clients::BodyClients;
use crate::sse::Broadcaster;
use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use body_protocol::api::*;
use body_protocol::payload::*;
use futures_util::stream::Stream;
use serde::Serialize;
use serde::de::DeserializeOwned;
use someip_runtime::ClientError;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct GatewayState {
    pub clients: BodyClients,
    pub broadcaster: Broadcaster,
}

type AppState = Arc<GatewayState>;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/api/door/lock", post(door_lock))
        .route("/api/door/{id}/status", get(door_status))
        .route("/api/window/position", post(window_position))
        .route("/api/window/control", post(window_control))
        .route("/api/window/{id}/position", get(window_position_status))
        .route("/api/light/headlight", post(light_headlight))
        .route("/api/light/indicator", post(light_indicator))
        .route("/api/light/position", post(light_position))
        .route("/api/seat/adjust", post(seat_adjust))
        .route("/api/seat/memory/save", post(seat_memory_save))
        .route("/api/seat/memory/recall", post(seat_memory_recall))
        .route("/api/health", get(health))
        .route("/api/info", get(info_endpoint))
        .route("/api/events", get(sse_events))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Envelope helpers
// ---------------------------------------------------------------------------

fn epoch_now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn ok_envelope<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiEnvelope::new(data, epoch_now()))).into_response()
}

fn api_error(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ApiErrorEnvelope::new(code, message, epoch_now())),
    )
        .into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
    api_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message)
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|e| bad_request(format!("invalid request body: {e}")))
}

fn corner(id: u8) -> Result<Position, Response> {
    Position::try_from(id).map_err(|_| bad_request(format!("id {id} out of range 0..=3")))
}

fn preset(id: u8) -> Result<u8, Response> {
    if (1..=3).contains(&id) {
        Ok(id)
    } else {
        Err(bad_request(format!("preset id {id} out of range 1..=3")))
    }
}

/// Not-LIVE states trigger the mock fallback; timeouts and real failures
/// are real answers and must surface as-is.
fn is_offline(e: ClientError) -> bool {
    matches!(
        e,
        ClientError::ServiceUnavailable | ClientError::ServiceNotReady
    )
}

fn client_error_response(e: ClientError) -> Response {
    match e {
        ClientError::Timeout => api_error(
            StatusCode::REQUEST_TIMEOUT,
            "REQUEST_TIMEOUT",
            "no response within 5000 ms",
        ),
        ClientError::TransportDown => api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "transport to the provider is down",
        ),
        ClientError::Remote(someip_core::ReturnCode::MalformedMessage) => {
            bad_request("provider rejected the request as malformed")
        }
        other => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            other.to_string(),
        ),
    }
}

// ---------------------------------------------------------------------------
// Door
// ---------------------------------------------------------------------------

async fn door_lock(State(state): State<AppState>, body: Bytes) -> Response {
    let req: DoorLockRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let door_id = match corner(req.door_id) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let command = match LockCommand::try_from(req.command) {
        Ok(c) => c,
        Err(_) => return bad_request(format!("unknown lock command {}", req.command)),
    };

    match state
        .clients
        .set_lock_state(SetLockStateReq { door_id, command })
        .await
    {
        Ok(resp) => ok_envelope(DoorLockData::from(resp)),
        Err(e) if is_offline(e) => {
            info!(door = door_id as u8, "door service offline, mocking lock");
            state.broadcaster.publish(
                SseEventType::DoorLockChanged,
                serde_json::json!(DoorLockEvent {
                    door_id: door_id as u8,
                    locked: command == LockCommand::Lock,
                }),
            );
            ok_envelope(DoorLockData {
                door_id: door_id as u8,
                result: OpResult::Success as u8,
            })
        }
        Err(e) => client_error_response(e),
    }
}

async fn door_status(State(state): State<AppState>, Path(id): Path<u8>) -> Response {
    let door_id = match corner(id) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match state.clients.get_lock_state(GetLockStateReq { door_id }).await {
        Ok(resp) => ok_envelope(DoorStatusData::from(resp)),
        Err(e) if is_offline(e) => ok_envelope(DoorStatusData {
            door_id: door_id as u8,
            locked: true,
        }),
        Err(e) => client_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

async fn window_position(State(state): State<AppState>, body: Bytes) -> Response {
    let req: WindowPositionRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let window_id = match corner(req.window_id) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    if req.position > 100 {
        return bad_request(format!("position {} out of range 0..=100", req.position));
    }

    match state
        .clients
        .set_window_position(SetWindowPositionReq {
            window_id,
            position: req.position,
        })
        .await
    {
        Ok(resp) => ok_envelope(WindowResultData::from(resp)),
        Err(e) if is_offline(e) => {
            info!(window = window_id as u8, "window service offline, mocking move");
            state.broadcaster.publish(
                SseEventType::WindowPositionChanged,
                serde_json::json!(WindowPositionEvent {
                    window_id: window_id as u8,
                    position: req.position,
                }),
            );
            ok_envelope(WindowResultData {
                window_id: window_id as u8,
                result: OpResult::Success as u8,
            })
        }
        Err(e) => client_error_response(e),
    }
}

async fn window_control(State(state): State<AppState>, body: Bytes) -> Response {
    let req: WindowControlRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let window_id = match corner(req.window_id) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let command = match WindowCommand::try_from(req.command) {
        Ok(c) => c,
        Err(_) => return bad_request(format!("unknown window command {}", req.command)),
    };

    match state
        .clients
        .control_window(ControlWindowReq { window_id, command })
        .await
    {
        Ok(resp) => ok_envelope(WindowResultData::from(resp)),
        Err(e) if is_offline(e) => {
            let mocked_position = match command {
                WindowCommand::MoveUp => 0,
                WindowCommand::MoveDown => 100,
                WindowCommand::Stop => 50,
            };
            state.broadcaster.publish(
                SseEventType::WindowPositionChanged,
                serde_json::json!(WindowPositionEvent {
                    window_id: window_id as u8,
                    position: mocked_position,
                }),
            );
            ok_envelope(WindowResultData {
                window_id: window_id as u8,
                result: OpResult::Success as u8,
            })
        }
        Err(e) => client_error_response(e),
    }
}

async fn window_position_status(State(state): State<AppState>, Path(id): Path<u8>) -> Response {
    let window_id = match corner(id) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match state
        .clients
        .get_window_position(GetWindowPositionReq { window_id })
        .await
    {
        Ok(resp) => ok_envelope(WindowPositionData::from(resp)),
        Err(e) if is_offline(e) => ok_envelope(WindowPositionData {
            window_id: window_id as u8,
            position: 50,
        }),
        Err(e) => client_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// Light
// ---------------------------------------------------------------------------

async fn light_headlight(State(state): State<AppState>, body: Bytes) -> Response {
    let req: LightCommandRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let command = match HeadlightState::try_from(req.command) {
        Ok(c) => c,
        Err(_) => return bad_request(format!("unknown headlight command {}", req.command)),
    };
    match state
        .clients
        .set_headlight_state(SetHeadlightStateReq { command })
        .await
    {
        Ok(resp) => ok_envelope(LightResultData::from(resp)),
        Err(e) if is_offline(e) => {
            mock_light(&state, LightType::Headlight, command as u8)
        }
        Err(e) => client_error_response(e),
    }
}

async fn light_indicator(State(state): State<AppState>, body: Bytes) -> Response {
    let req: LightCommandRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let command = match IndicatorState::try_from(req.command) {
        Ok(c) => c,
        Err(_) => return bad_request(format!("unknown indicator command {}", req.command)),
    };
    match state
        .clients
        .set_indicator_state(SetIndicatorStateReq { command })
        .await
    {
        Ok(resp) => ok_envelope(LightResultData::from(resp)),
        Err(e) if is_offline(e) => {
            mock_light(&state, LightType::Indicator, command as u8)
        }
        Err(e) => client_error_response(e),
    }
}

async fn light_position(State(state): State<AppState>, body: Bytes) -> Response {
    let req: LightCommandRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let command = match PositionLightState::try_from(req.command) {
        Ok(c) => c,
        Err(_) => return bad_request(format!("unknown position light command {}", req.command)),
    };
    match state
        .clients
        .set_position_light_state(SetPositionLightStateReq { command })
        .await
    {
        Ok(resp) => ok_envelope(LightResultData::from(resp)),
        Err(e) if is_offline(e) => {
            mock_light(&state, LightType::PositionLight, command as u8)
        }
        Err(e) => client_error_response(e),
    }
}

fn mock_light(state: &AppState, light_type: LightType, value: u8) -> Response {
    info!(light = light_type.as_str(), "light service offline, mocking command");
    state.broadcaster.publish(
        SseEventType::LightStateChanged,
        serde_json::json!(LightStateEvent {
            light_type: light_type.as_str(),
            state: value != 0,
            value,
        }),
    );
    ok_envelope(LightResultData {
        new_state: value,
        result: OpResult::Success as u8,
    })
}

// ---------------------------------------------------------------------------
// Seat
// ---------------------------------------------------------------------------

async fn seat_adjust(State(state): State<AppState>, body: Bytes) -> Response {
    let req: SeatAdjustRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let axis = match SeatAxis::try_from(req.axis) {
        Ok(a) => a,
        Err(_) => return bad_request(format!("unknown seat axis {}", req.axis)),
    };
    let direction = match SeatDirection::try_from(req.direction) {
        Ok(d) => d,
        Err(_) => return bad_request(format!("unknown seat direction {}", req.direction)),
    };
    match state.clients.adjust_seat(AdjustSeatReq { axis, direction }).await {
        Ok(resp) => ok_envelope(SeatAdjustData::from(resp)),
        Err(e) if is_offline(e) => {
            let default_position = match axis {
                SeatAxis::ForeAft => 0,
                SeatAxis::Recline => 45,
            };
            state.broadcaster.publish(
                SseEventType::SeatPositionChanged,
                serde_json::json!(SeatPositionEvent {
                    axis: axis.as_str(),
                    position: default_position,
                }),
            );
            ok_envelope(SeatAdjustData {
                axis: axis as u8,
                result: OpResult::Success as u8,
            })
        }
        Err(e) => client_error_response(e),
    }
}

async fn seat_memory_save(State(state): State<AppState>, body: Bytes) -> Response {
    let req: SeatPresetRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let preset_id = match preset(req.preset_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state
        .clients
        .save_memory_position(SaveMemoryPositionReq { preset_id })
        .await
    {
        Ok(resp) => ok_envelope(SeatPresetData::from(resp)),
        Err(e) if is_offline(e) => {
            state.broadcaster.publish(
                SseEventType::SeatMemorySaveConfirm,
                serde_json::json!(MemorySaveConfirmEvent {
                    preset_id,
                    result: OpResult::Success as u8,
                }),
            );
            ok_envelope(SeatPresetData {
                preset_id,
                result: OpResult::Success as u8,
            })
        }
        Err(e) => client_error_response(e),
    }
}

async fn seat_memory_recall(State(state): State<AppState>, body: Bytes) -> Response {
    let req: SeatPresetRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let preset_id = match preset(req.preset_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state
        .clients
        .recall_memory_position(RecallMemoryPositionReq { preset_id })
        .await
    {
        Ok(resp) => ok_envelope(SeatPresetData::from(resp)),
        Err(e) if is_offline(e) => {
            state.broadcaster.publish(
                SseEventType::SeatPositionChanged,
                serde_json::json!(SeatPositionEvent {
                    axis: SeatAxis::ForeAft.as_str(),
                    position: 0,
                }),
            );
            ok_envelope(SeatPresetData {
                preset_id,
                result: OpResult::Success as u8,
            })
        }
        Err(e) => client_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// Health / info / events
// ---------------------------------------------------------------------------

async fn health(State(state): State<AppState>) -> Response {
    ok_envelope(HealthData {
        status: "healthy",
        uptime: state.broadcaster.uptime_secs(),
        services: state.clients.health(),
    })
}

async fn info_endpoint(State(_state): State<AppState>) -> Response {
    ok_envelope(serde_json::json!({
        "name": "Body Controller Web API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "REST API for vehicle body control system",
        "services": {
            "door": "Door lock/unlock control",
            "window": "Window position and movement control",
            "light": "Headlight, indicator, and position light control",
            "seat": "Seat adjustment and memory position control",
        },
        "endpoints": {
            "door": "/api/door/*",
            "window": "/api/window/*",
            "light": "/api/light/*",
            "seat": "/api/seat/*",
            "events": "/api/events",
        },
    }))
}

async fn sse_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (_, rx) = state.broadcaster.subscribe();
    Sse::new(ReceiverStream::new(rx).map(Ok::<_, Infallible>))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use someip_core::ReturnCode;

    async fn error_body(response: Response) -> ApiErrorEnvelope {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn timeout_maps_to_408_with_the_contract_code() {
        let response = client_error_response(ClientError::Timeout);
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        let body = error_body(response).await;
        assert_eq!(body.error, "REQUEST_TIMEOUT");
        assert!(!body.success);
    }

    #[tokio::test]
    async fn transport_down_maps_to_503() {
        let response = client_error_response(ClientError::TransportDown);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = error_body(response).await;
        assert_eq!(body.error, "SERVICE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn remote_malformed_maps_to_400() {
        let response =
            client_error_response(ClientError::Remote(ReturnCode::MalformedMessage));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn only_not_live_states_trigger_the_mock() {
        assert!(is_offline(ClientError::ServiceUnavailable));
        assert!(is_offline(ClientError::ServiceNotReady));
        assert!(!is_offline(ClientError::Timeout));
        assert!(!is_offline(ClientError::TransportDown));
        assert!(!is_offline(ClientError::Remote(ReturnCode::NotOk)));
    }

    #[test]
    fn edge_validators_reject_out_of_range_ids() {
        assert!(corner(3).is_ok());
        assert!(corner(4).is_err());
        assert!(preset(1).is_ok());
        assert!(preset(3).is_ok());
        assert!(preset(0).is_err());
        assert!(preset(4).is_err());
    }
}
