//! Typed service clients over the client runtime.
//!
//! One thin front per operation: encode the request, await the correlated
//! response, decode the typed payload. Policy (availability, deadlines,
//! session ids) lives in the runtime; error-code interpretation lives here.

use body_protocol::api::ServiceHealth;
use body_protocol::catalog::{self, ServiceSpec};
use body_protocol::payload::*;
use someip_core::{MessageType, ReturnCode};
use someip_runtime::{Availability, ClientError, ClientRuntime};
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct BodyClients {
    rt: Arc<ClientRuntime>,
}

impl BodyClients {
    pub fn new(rt: Arc<ClientRuntime>) -> BodyClients {
        BodyClients { rt }
    }

    async fn call<Req, Resp>(
        &self,
        spec: &ServiceSpec,
        method_id: u16,
        req: &Req,
    ) -> Result<Resp, ClientError>
    where
        Req: WirePayload,
        Resp: WirePayload,
    {
        let msg = self.rt.call(spec.service_id, method_id, req.encode()).await?;
        match (msg.message_type, msg.return_code) {
            (MessageType::Response, ReturnCode::Ok) => {
                Resp::decode(&msg.payload).map_err(|e| {
                    warn!(service = spec.name, error = %e, "undecodable response payload");
                    ClientError::Malformed
                })
            }
            (_, code) => Err(ClientError::Remote(code)),
        }
    }

    pub fn availability(&self, spec: &ServiceSpec) -> Availability {
        self.rt.availability_now(spec.service_id)
    }

    pub fn health(&self) -> ServiceHealth {
        let live = |spec: &ServiceSpec| self.availability(spec) == Availability::Live;
        ServiceHealth {
            door_service: live(&catalog::DOOR),
            window_service: live(&catalog::WINDOW),
            light_service: live(&catalog::LIGHT),
            seat_service: live(&catalog::SEAT),
        }
    }

    // Door

    pub async fn set_lock_state(
        &self,
        req: SetLockStateReq,
    ) -> Result<SetLockStateResp, ClientError> {
        self.call(&catalog::DOOR, catalog::door::SET_LOCK_STATE, &req).await
    }

    pub async fn get_lock_state(
        &self,
        req: GetLockStateReq,
    ) -> Result<GetLockStateResp, ClientError> {
        self.call(&catalog::DOOR, catalog::door::GET_LOCK_STATE, &req).await
    }

    // Window

    pub async fn set_window_position(
        &self,
        req: SetWindowPositionReq,
    ) -> Result<SetWindowPositionResp, ClientError> {
        self.call(&catalog::WINDOW, catalog::window::SET_WINDOW_POSITION, &req)
            .await
    }

    pub async fn control_window(
        &self,
        req: ControlWindowReq,
    ) -> Result<ControlWindowResp, ClientError> {
        self.call(&catalog::WINDOW, catalog::window::CONTROL_WINDOW, &req)
            .await
    }

    pub async fn get_window_position(
        &self,
        req: GetWindowPositionReq,
    ) -> Result<GetWindowPositionResp, ClientError> {
        self.call(&catalog::WINDOW, catalog::window::GET_WINDOW_POSITION, &req)
            .await
    }

    // Light

    pub async fn set_headlight_state(
        &self,
        req: SetHeadlightStateReq,
    ) -> Result<SetHeadlightStateResp, ClientError> {
        self.call(&catalog::LIGHT, catalog::light::SET_HEADLIGHT_STATE, &req)
            .await
    }

    pub async fn set_indicator_state(
        &self,
        req: SetIndicatorStateReq,
    ) -> Result<SetIndicatorStateResp, ClientError> {
        self.call(&catalog::LIGHT, catalog::light::SET_INDICATOR_STATE, &req)
            .await
    }

    pub async fn set_position_light_state(
        &self,
        req: SetPositionLightStateReq,
    ) -> Result<SetPositionLightStateResp, ClientError> {
        self.call(&catalog::LIGHT, catalog::light::SET_POSITION_LIGHT_STATE, &req)
            .await
    }

    // Seat

    pub async fn adjust_seat(&self, req: AdjustSeatReq) -> Result<AdjustSeatResp, ClientError> {
        self.call(&catalog::SEAT, catalog::seat::ADJUST_SEAT, &req).await
    }

    /// Preset ids outside 1..=3 are rejected before a byte is sent.
    pub async fn save_memory_position(
        &self,
        req: SaveMemoryPositionReq,
    ) -> Result<SaveMemoryPositionResp, ClientError> {
        self.call(&catalog::SEAT, catalog::seat::SAVE_MEMORY_POSITION, &req)
            .await
    }

    pub async fn recall_memory_position(
        &self,
        req: RecallMemoryPositionReq,
    ) -> Result<RecallMemoryPositionResp, ClientError> {
        self.call(&catalog::SEAT, catalog::seat::RECALL_MEMORY_POSITION, &req)
            .await
    }
}
