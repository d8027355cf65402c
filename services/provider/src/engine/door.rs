//! Door service engine: per-door lock control and ajar reporting.

use super::{DOOR_LOCK_SETTLE, EngineConfig, EngineEvent, roll, schedule};
use body_protocol::catalog::door;
use body_protocol::payload::{
    DoorState, GetLockStateReq, GetLockStateResp, LockCommand, LockState, OnDoorStateChanged,
    OnLockStateChanged, OpResult, Position, SetLockStateReq, SetLockStateResp, WirePayload,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use someip_core::ReturnCode;
use someip_runtime::provider::{InboundRequest, RequestOutcome};
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug)]
pub enum DoorMsg {
    /// Settling timer fired: the lock actuator has reached `state`.
    SettleLock { door: Position, state: LockState },
    /// Simulator toggles the lock of one door.
    SimToggleLock { door: Position },
    /// Simulator toggles the ajar state of one door.
    SimToggleAjar { door: Position },
}

pub struct DoorEngine {
    locks: [LockState; 4],
    doors: [DoorState; 4],
    rng: StdRng,
    success_rate: u8,
    events: mpsc::Sender<EngineEvent>,
    mailbox: mpsc::Sender<DoorMsg>,
    internal: mpsc::Receiver<DoorMsg>,
}

impl DoorEngine {
    pub fn new(
        events: mpsc::Sender<EngineEvent>,
        cfg: EngineConfig,
    ) -> (DoorEngine, mpsc::Sender<DoorMsg>) {
        let (mailbox, internal) = mpsc::channel(64);
        let engine = DoorEngine {
            locks: [LockState::Unlocked; 4],
            doors: [DoorState::Closed; 4],
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
        debug!("door engine stopped");
    }

    fn handle_request(&mut self, req: InboundRequest) {
        let outcome = match req.method_id {
            door::SET_LOCK_STATE => match SetLockStateReq::decode(&req.payload) {
                Ok(r) => RequestOutcome::Reply(self.set_lock_state(r).encode()),
                Err(e) => {
                    debug!(error = %e, "malformed SetLockState request");
                    RequestOutcome::Fault(ReturnCode::MalformedMessage)
                }
            },
            door::GET_LOCK_STATE => match GetLockStateReq::decode(&req.payload) {
                Ok(r) => RequestOutcome::Reply(self.get_lock_state(r).encode()),
                Err(e) => {
                    debug!(error = %e, "malformed GetLockState request");
                    RequestOutcome::Fault(ReturnCode::MalformedMessage)
                }
            },
            other => {
                debug!(method = other, "unknown door method");
                RequestOutcome::Fault(ReturnCode::UnknownMethod)
            }
        };
        let _ = req.reply.send(outcome);
    }

    fn set_lock_state(&mut self, req: SetLockStateReq) -> SetLockStateResp {
        let result = roll(&mut self.rng, self.success_rate);
        if result == OpResult::Success {
            let state = match req.command {
                LockCommand::Lock => LockState::Locked,
                LockCommand::Unlock => LockState::Unlocked,
            };
            schedule(
                self.mailbox.clone(),
                DOOR_LOCK_SETTLE,
                DoorMsg::SettleLock {
                    door: req.door_id,
                    state,
                },
            );
        } else {
            info!(door = req.door_id as u8, "lock actuation failed");
        }
        SetLockStateResp {
            door_id: req.door_id,
            result,
        }
    }

    fn get_lock_state(&self, req: GetLockStateReq) -> GetLockStateResp {
        GetLockStateResp {
            door_id: req.door_id,
            lock_state: self.locks[req.door_id as usize],
        }
    }

    async fn handle_internal(&mut self, msg: DoorMsg) {
        match msg {
            DoorMsg::SettleLock { door, state } => {
                self.locks[door as usize] = state;
                self.emit_lock(door, state).await;
            }
            DoorMsg::SimToggleLock { door } => {
                let state = match self.locks[door as usize] {
                    LockState::Locked => LockState::Unlocked,
                    LockState::Unlocked => LockState::Locked,
                };
                self.locks[door as usize] = state;
                self.emit_lock(door, state).await;
            }
            DoorMsg::SimToggleAjar { door } => {
                let state = match self.doors[door as usize] {
                    DoorState::Open => DoorState::Closed,
                    DoorState::Closed => DoorState::Open,
                };
                self.doors[door as usize] = state;
                let event = OnDoorStateChanged {
                    door_id: door,
                    door_state: state,
                };
                self.emit(door::ON_DOOR_STATE_CHANGED, event.encode()).await;
            }
        }
    }

    async fn emit_lock(&self, door: Position, state: LockState) {
        let event = OnLockStateChanged {
            door_id: door,
            lock_state: state,
        };
        self.emit(door::ON_LOCK_STATE_CHANGED, event.encode()).await;
    }

    async fn emit(&self, event_id: u16, payload: Vec<u8>) {
        let _ = self.events.send(EngineEvent { event_id, payload }).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use someip_runtime::provider::InboundRequest;
    use tokio::sync::oneshot;

    fn always_succeeds() -> EngineConfig {
        EngineConfig {
            success_rate: 100,
            seed: 1,
        }
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

    fn reply_of(outcome: RequestOutcome) -> Vec<u8> {
        match outcome {
            RequestOutcome::Reply(payload) => payload,
            RequestOutcome::Fault(code) => panic!("unexpected fault: {code:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn lock_settles_then_query_reports_locked() {
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let (engine, _ctl) = DoorEngine::new(events_tx, always_succeeds());
        let (req_tx, req_rx) = mpsc::channel(16);
        tokio::spawn(engine.run(req_rx));

        let resp = SetLockStateResp::decode(&reply_of(
            request(
                &req_tx,
                door::SET_LOCK_STATE,
                SetLockStateReq {
                    door_id: Position::FrontLeft,
                    command: LockCommand::Lock,
                }
                .encode(),
            )
            .await,
        ))
        .unwrap();
        assert_eq!(resp.result, OpResult::Success);

        // The settling event arrives after the 100 ms actuator delay.
        let event = events_rx.recv().await.unwrap();
        assert_eq!(event.event_id, door::ON_LOCK_STATE_CHANGED);
        let changed = OnLockStateChanged::decode(&event.payload).unwrap();
        assert_eq!(changed.lock_state, LockState::Locked);

        let status = GetLockStateResp::decode(&reply_of(
            request(
                &req_tx,
                door::GET_LOCK_STATE,
                GetLockStateReq {
                    door_id: Position::FrontLeft,
                }
                .encode(),
            )
            .await,
        ))
        .unwrap();
        assert_eq!(status.lock_state, LockState::Locked);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_roll_returns_fail_without_event() {
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let (engine, _ctl) = DoorEngine::new(
            events_tx,
            EngineConfig {
                success_rate: 0,
                seed: 1,
            },
        );
        let (req_tx, req_rx) = mpsc::channel(16);
        tokio::spawn(engine.run(req_rx));

        let resp = SetLockStateResp::decode(&reply_of(
            request(
                &req_tx,
                door::SET_LOCK_STATE,
                SetLockStateReq {
                    door_id: Position::RearRight,
                    command: LockCommand::Lock,
                }
                .encode(),
            )
            .await,
        ))
        .unwrap();
        assert_eq!(resp.result, OpResult::Fail);

        tokio::time::sleep(DOOR_LOCK_SETTLE * 3).await;
        assert!(events_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_payload_is_a_wire_fault() {
        let (events_tx, _events_rx) = mpsc::channel(16);
        let (engine, _ctl) = DoorEngine::new(events_tx, always_succeeds());
        let (req_tx, req_rx) = mpsc::channel(16);
        tokio::spawn(engine.run(req_rx));

        let outcome = request(&req_tx, door::SET_LOCK_STATE, vec![0x00]).await;
        assert!(matches!(
            outcome,
            RequestOutcome::Fault(ReturnCode::MalformedMessage)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_method_is_rejected() {
        let (events_tx, _events_rx) = mpsc::channel(16);
        let (engine, _ctl) = DoorEngine::new(events_tx, always_succeeds());
        let (req_tx, req_rx) = mpsc::channel(16);
        tokio::spawn(engine.run(req_rx));

        let outcome = request(&req_tx, 0x00FF, vec![]).await;
        assert!(matches!(
            outcome,
            RequestOutcome::Fault(ReturnCode::UnknownMethod)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn simulator_toggles_flip_state() {
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let (engine, ctl) = DoorEngine::new(events_tx, always_succeeds());
        let (_req_tx, req_rx) = mpsc::channel(16);
        tokio::spawn(engine.run(req_rx));

        ctl.send(DoorMsg::SimToggleAjar {
            door: Position::FrontRight,
        })
        .await
        .unwrap();
        let open = events_rx.recv().await.unwrap();
        assert_eq!(open.event_id, door::ON_DOOR_STATE_CHANGED);
        assert_eq!(
            OnDoorStateChanged::decode(&open.payload).unwrap().door_state,
            DoorState::Open
        );

        ctl.send(DoorMsg::SimToggleAjar {
            door: Position::FrontRight,
        })
        .await
        .unwrap();
        let closed = events_rx.recv().await.unwrap();
        assert_eq!(
            OnDoorStateChanged::decode(&closed.payload).unwrap().door_state,
            DoorState::Closed
        );
    }
}
