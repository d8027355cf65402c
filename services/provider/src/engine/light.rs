//! Exterior light engine: three independent sub-states behind one service.

use super::{EngineConfig, EngineEvent, LIGHT_SETTLE, roll, schedule};
use body_protocol::catalog::light;
use body_protocol::payload::{
    HeadlightState, IndicatorState, LightType, OnLightStateChanged, OpResult, PositionLightState,
    SetHeadlightStateReq, SetHeadlightStateResp, SetIndicatorStateReq, SetIndicatorStateResp,
    SetPositionLightStateReq, SetPositionLightStateResp, WirePayload,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use someip_core::ReturnCode;
use someip_runtime::provider::{InboundRequest, RequestOutcome};
use tokio::sync::mpsc;
use tracing::debug;

/// One concrete light value; `INDICATOR = HAZARD` is a single state here,
/// not a left+right pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightSet {
    Headlight(HeadlightState),
    Indicator(IndicatorState),
    PositionLight(PositionLightState),
}

impl LightSet {
    fn light_type(self) -> LightType {
        match self {
            LightSet::Headlight(_) => LightType::Headlight,
            LightSet::Indicator(_) => LightType::Indicator,
            LightSet::PositionLight(_) => LightType::PositionLight,
        }
    }

    fn raw(self) -> u8 {
        match self {
            LightSet::Headlight(s) => s as u8,
            LightSet::Indicator(s) => s as u8,
            LightSet::PositionLight(s) => s as u8,
        }
    }
}

#[derive(Debug)]
pub enum LightMsg {
    /// Settling timer fired: the lamp reached the commanded value.
    Settle(LightSet),
    /// Simulator picks a new value for one light group.
    SimSet(LightSet),
}

pub struct LightEngine {
    headlight: HeadlightState,
    indicator: IndicatorState,
    position_light: PositionLightState,
    rng: StdRng,
    success_rate: u8,
    events: mpsc::Sender<EngineEvent>,
    mailbox: mpsc::Sender<LightMsg>,
    internal: mpsc::Receiver<LightMsg>,
}

impl LightEngine {
    pub fn new(
        events: mpsc::Sender<EngineEvent>,
        cfg: EngineConfig,
    ) -> (LightEngine, mpsc::Sender<LightMsg>) {
        let (mailbox, internal) = mpsc::channel(64);
        let engine = LightEngine {
            headlight: HeadlightState::Off,
            indicator: IndicatorState::Off,
            position_light: PositionLightState::Off,
            rng: StdRng::seed_from_u64(cfg.seed),
            success_rate: cfg.success_rate,
            events,
            mailbox: mailbox.clone(),
            internal,
        };
        (engine, mailbox)
    }

    pub async fn run(mut self, mut requests: mpsc::Receiver<InboundRequest>) {
        loop {
            tokio::select! {
                req = requests.recv() => match req {
                    Some(req) => self.handle_request(req),
                    None => break,
                },
                msg = self.internal.recv() => match msg {
                    Some(msg) => self.handle_internal(msg).await,
                    None => break,
                },
            }
        }
        debug!("light engine stopped");
    }

    fn handle_request(&mut self, req: InboundRequest) {
        let outcome = match req.method_id {
            light::SET_HEADLIGHT_STATE => match SetHeadlightStateReq::decode(&req.payload) {
                Ok(r) => {
                    let result = self.apply(LightSet::Headlight(r.command));
                    RequestOutcome::Reply(
                        SetHeadlightStateResp {
                            new_state: r.command,
                            result,
                        }
                        .encode(),
                    )
                }
                Err(e) => {
                    debug!(error = %e, "malformed SetHeadlightState request");
                    RequestOutcome::Fault(ReturnCode::MalformedMessage)
                }
            },
            light::SET_INDICATOR_STATE => match SetIndicatorStateReq::decode(&req.payload) {
                Ok(r) => {
                    let result = self.apply(LightSet::Indicator(r.command));
                    RequestOutcome::Reply(
                        SetIndicatorStateResp {
                            new_state: r.command,
                            result,
                        }
                        .encode(),
                    )
                }
                Err(e) => {
                    debug!(error = %e, "malformed SetIndicatorState request");
                    RequestOutcome::Fault(ReturnCode::MalformedMessage)
                }
            },
            light::SET_POSITION_LIGHT_STATE => {
                match SetPositionLightStateReq::decode(&req.payload) {
                    Ok(r) => {
                        let result = self.apply(LightSet::PositionLight(r.command));
                        RequestOutcome::Reply(
                            SetPositionLightStateResp {
                                new_state: r.command,
                                result,
                            }
                            .encode(),
                        )
                    }
                    Err(e) => {
                        debug!(error = %e, "malformed SetPositionLightState request");
                        RequestOutcome::Fault(ReturnCode::MalformedMessage)
                    }
                }
            }
            other => {
                debug!(method = other, "unknown light method");
                RequestOutcome::Fault(ReturnCode::UnknownMethod)
            }
        };
        let _ = req.reply.send(outcome);
    }

    fn apply(&mut self, set: LightSet) -> OpResult {
        let result = roll(&mut self.rng, self.success_rate);
        if result == OpResult::Success {
            schedule(self.mailbox.clone(), LIGHT_SETTLE, LightMsg::Settle(set));
        }
        result
    }

    async fn handle_internal(&mut self, msg: LightMsg) {
        let set = match msg {
            LightMsg::Settle(set) | LightMsg::SimSet(set) => set,
        };
        match set {
            LightSet::Headlight(s) => self.headlight = s,
            LightSet::Indicator(s) => self.indicator = s,
            LightSet::PositionLight(s) => self.position_light = s,
        }
        let event = OnLightStateChanged {
            light_type: set.light_type(),
            state: set.raw(),
        };
        let _ = self
            .events
            .send(EngineEvent {
                event_id: light::ON_LIGHT_STATE_CHANGED,
                payload: event.encode(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    fn spawn_engine() -> (
        mpsc::Sender<InboundRequest>,
        mpsc::Receiver<EngineEvent>,
    ) {
        let (events_tx, events_rx) = mpsc::channel(16);
        let (engine, _ctl) = LightEngine::new(
            events_tx,
            EngineConfig {
                success_rate: 100,
                seed: 5,
            },
        );
        let (req_tx, req_rx) = mpsc::channel(16);
        tokio::spawn(engine.run(req_rx));
        (req_tx, events_rx)
    }

    async fn request(
        requests: &mpsc::Sender<InboundRequest>,
        method_id: u16,
        payload: Vec<u8>,
    ) -> RequestOutcome {
        let (reply, rx) = oneshot::channel();
        requests
            .send(InboundRequest {
                method_id,
                payload,
                reply,
            })
            .await
            .unwrap();
        rx.await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn headlight_high_beam_emits_typed_event() {
        let (req_tx, mut events_rx) = spawn_engine();

        let outcome = request(
            &req_tx,
            light::SET_HEADLIGHT_STATE,
            SetHeadlightStateReq {
                command: HeadlightState::HighBeam,
            }
            .encode(),
        )
        .await;
        let RequestOutcome::Reply(payload) = outcome else {
            panic!("expected reply");
        };
        let resp = SetHeadlightStateResp::decode(&payload).unwrap();
        assert_eq!(resp.new_state, HeadlightState::HighBeam);
        assert_eq!(resp.result, OpResult::Success);

        let event = events_rx.recv().await.unwrap();
        let changed = OnLightStateChanged::decode(&event.payload).unwrap();
        assert_eq!(changed.light_type, LightType::Headlight);
        assert_eq!(changed.state, HeadlightState::HighBeam as u8);
    }

    #[tokio::test(start_paused = true)]
    async fn hazard_is_one_event_not_two() {
        let (req_tx, mut events_rx) = spawn_engine();

        let _ = request(
            &req_tx,
            light::SET_INDICATOR_STATE,
            SetIndicatorStateReq {
                command: IndicatorState::Hazard,
            }
            .encode(),
        )
        .await;

        let event = events_rx.recv().await.unwrap();
        let changed = OnLightStateChanged::decode(&event.payload).unwrap();
        assert_eq!(changed.light_type, LightType::Indicator);
        assert_eq!(changed.state, IndicatorState::Hazard as u8);

        tokio::time::sleep(LIGHT_SETTLE * 3).await;
        assert!(events_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_domain_command_is_malformed() {
        let (req_tx, _events_rx) = spawn_engine();
        let outcome = request(&req_tx, light::SET_HEADLIGHT_STATE, vec![0x07]).await;
        assert!(matches!(
            outcome,
            RequestOutcome::Fault(ReturnCode::MalformedMessage)
        ));
    }
}
