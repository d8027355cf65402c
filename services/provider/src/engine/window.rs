//! Window service engine.
//!
//! Position is a percent where 0 is fully closed and 100 fully open. The
//! stored value moves to its target when the settling timer fires, so a
//! query immediately after a command still reports the pre-move position.

use super::{EngineConfig, EngineEvent, WINDOW_MOVE_SETTLE, roll, schedule};
use body_protocol::catalog::window;
use body_protocol::payload::{
    ControlWindowReq, ControlWindowResp, GetWindowPositionReq, GetWindowPositionResp,
    OnWindowPositionChanged, OpResult, Position, SetWindowPositionReq, SetWindowPositionResp,
    WindowCommand, WirePayload,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use someip_core::ReturnCode;
use someip_runtime::provider::{InboundRequest, RequestOutcome};
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug)]
pub enum WindowMsg {
    /// Settling timer fired: the pane reached `position`.
    Settle { window: Position, position: u8 },
    /// Simulator repositions one window.
    SimSetPosition { window: Position, position: u8 },
}

pub struct WindowEngine {
    positions: [u8; 4],
    rng: StdRng,
    success_rate: u8,
    events: mpsc::Sender<EngineEvent>,
    mailbox: mpsc::Sender<WindowMsg>,
    internal: mpsc::Receiver<WindowMsg>,
}

impl WindowEngine {
    pub fn new(
        events: mpsc::Sender<EngineEvent>,
        cfg: EngineConfig,
    ) -> (WindowEngine, mpsc::Sender<WindowMsg>) {
        let (mailbox, internal) = mpsc::channel(64);
        let engine = WindowEngine {
            positions: [50; 4],
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
        debug!("window engine stopped");
    }

    fn handle_request(&mut self, req: InboundRequest) {
        let outcome = match req.method_id {
            window::SET_WINDOW_POSITION => match SetWindowPositionReq::decode(&req.payload) {
                Ok(r) => RequestOutcome::Reply(self.set_position(r).encode()),
                Err(e) => {
                    debug!(error = %e, "malformed SetWindowPosition request");
                    RequestOutcome::Fault(ReturnCode::MalformedMessage)
                }
            },
            window::CONTROL_WINDOW => match ControlWindowReq::decode(&req.payload) {
                Ok(r) => RequestOutcome::Reply(self.control(r).encode()),
                Err(e) => {
                    debug!(error = %e, "malformed ControlWindow request");
                    RequestOutcome::Fault(ReturnCode::MalformedMessage)
                }
            },
            window::GET_WINDOW_POSITION => match GetWindowPositionReq::decode(&req.payload) {
                Ok(r) => RequestOutcome::Reply(self.get_position(r).encode()),
                Err(e) => {
                    debug!(error = %e, "malformed GetWindowPosition request");
                    RequestOutcome::Fault(ReturnCode::MalformedMessage)
                }
            },
            other => {
                debug!(method = other, "unknown window method");
                RequestOutcome::Fault(ReturnCode::UnknownMethod)
            }
        };
        let _ = req.reply.send(outcome);
    }

    fn set_position(&mut self, req: SetWindowPositionReq) -> SetWindowPositionResp {
        if req.position > 100 {
            info!(
                window = req.window_id as u8,
                position = req.position,
                "target percent out of range"
            );
            return SetWindowPositionResp {
                window_id: req.window_id,
                result: OpResult::Fail,
            };
        }
        let result = roll(&mut self.rng, self.success_rate);
        if result == OpResult::Success {
            self.schedule_move(req.window_id, req.position);
        }
        SetWindowPositionResp {
            window_id: req.window_id,
            result,
        }
    }

    fn control(&mut self, req: ControlWindowReq) -> ControlWindowResp {
        let target = match req.command {
            WindowCommand::MoveUp => 0,
            WindowCommand::MoveDown => 100,
            WindowCommand::Stop => self.positions[req.window_id as usize],
        };
        let result = roll(&mut self.rng, self.success_rate);
        if result == OpResult::Success {
            self.schedule_move(req.window_id, target);
        }
        ControlWindowResp {
            window_id: req.window_id,
            result,
        }
    }

    fn get_position(&self, req: GetWindowPositionReq) -> GetWindowPositionResp {
        GetWindowPositionResp {
            window_id: req.window_id,
            position: self.positions[req.window_id as usize],
        }
    }

    fn schedule_move(&self, window: Position, position: u8) {
        schedule(
            self.mailbox.clone(),
            WINDOW_MOVE_SETTLE,
            WindowMsg::Settle { window, position },
        );
    }

    async fn handle_internal(&mut self, msg: WindowMsg) {
        let (window, position) = match msg {
            WindowMsg::Settle { window, position }
            | WindowMsg::SimSetPosition { window, position } => (window, position),
        };
        self.positions[window as usize] = position.min(100);
        let event = OnWindowPositionChanged {
            window_id: window,
            position: self.positions[window as usize],
        };
        let _ = self
            .events
            .send(EngineEvent {
                event_id: window::ON_WINDOW_POSITION_CHANGED,
                payload: event.encode(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    fn spawn_engine(
        success_rate: u8,
    ) -> (
        mpsc::Sender<InboundRequest>,
        mpsc::Sender<WindowMsg>,
        mpsc::Receiver<EngineEvent>,
    ) {
        let (events_tx, events_rx) = mpsc::channel(16);
        let (engine, ctl) = WindowEngine::new(
            events_tx,
            EngineConfig {
                success_rate,
                seed: 3,
            },
        );
        let (req_tx, req_rx) = mpsc::channel(16);
        tokio::spawn(engine.run(req_rx));
        (req_tx, ctl, events_rx)
    }

    async fn request(
        requests: &mpsc::Sender<InboundRequest>,
        method_id: u16,
        payload: Vec<u8>,
    ) -> Vec<u8> {
        let (reply, rx) = oneshot::channel();
        requests
            .send(InboundRequest {
                method_id,
                payload,
                reply,
            })
            .await
            .unwrap();
        match rx.await.unwrap() {
            RequestOutcome::Reply(payload) => payload,
            RequestOutcome::Fault(code) => panic!("unexpected fault: {code:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn set_position_settles_and_is_queryable() {
        let (req_tx, _ctl, mut events_rx) = spawn_engine(100);

        let resp = SetWindowPositionResp::decode(
            &request(
                &req_tx,
                window::SET_WINDOW_POSITION,
                SetWindowPositionReq {
                    window_id: Position::FrontRight,
                    position: 25,
                }
                .encode(),
            )
            .await,
        )
        .unwrap();
        assert_eq!(resp.result, OpResult::Success);

        let event = events_rx.recv().await.unwrap();
        assert_eq!(event.event_id, window::ON_WINDOW_POSITION_CHANGED);
        assert_eq!(
            OnWindowPositionChanged::decode(&event.payload).unwrap().position,
            25
        );

        let query = GetWindowPositionResp::decode(
            &request(
                &req_tx,
                window::GET_WINDOW_POSITION,
                GetWindowPositionReq {
                    window_id: Position::FrontRight,
                }
                .encode(),
            )
            .await,
        )
        .unwrap();
        assert_eq!(query.position, 25);
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_percent_fails_without_state_change() {
        let (req_tx, _ctl, mut events_rx) = spawn_engine(100);

        let resp = SetWindowPositionResp::decode(
            &request(
                &req_tx,
                window::SET_WINDOW_POSITION,
                SetWindowPositionReq {
                    window_id: Position::FrontLeft,
                    position: 101,
                }
                .encode(),
            )
            .await,
        )
        .unwrap();
        assert_eq!(resp.result, OpResult::Fail);

        tokio::time::sleep(WINDOW_MOVE_SETTLE * 3).await;
        assert!(events_rx.try_recv().is_err());

        let query = GetWindowPositionResp::decode(
            &request(
                &req_tx,
                window::GET_WINDOW_POSITION,
                GetWindowPositionReq {
                    window_id: Position::FrontLeft,
                }
                .encode(),
            )
            .await,
        )
        .unwrap();
        assert_eq!(query.position, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn move_up_closes_and_stop_holds() {
        let (req_tx, _ctl, mut events_rx) = spawn_engine(100);

        let resp = ControlWindowResp::decode(
            &request(
                &req_tx,
                window::CONTROL_WINDOW,
                ControlWindowReq {
                    window_id: Position::FrontRight,
                    command: WindowCommand::MoveUp,
                }
                .encode(),
            )
            .await,
        )
        .unwrap();
        assert_eq!(resp.result, OpResult::Success);
        let event = events_rx.recv().await.unwrap();
        assert_eq!(
            OnWindowPositionChanged::decode(&event.payload).unwrap().position,
            0
        );

        let _ = request(
            &req_tx,
            window::CONTROL_WINDOW,
            ControlWindowReq {
                window_id: Position::FrontRight,
                command: WindowCommand::Stop,
            }
            .encode(),
        )
        .await;
        let held = events_rx.recv().await.unwrap();
        assert_eq!(
            OnWindowPositionChanged::decode(&held.payload).unwrap().position,
            0
        );
    }
}
