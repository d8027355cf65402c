//! Seat engine: two motion axes plus three memory presets.
//!
//! Movement is modelled as a motion state that advances one increment per
//! settling tick (±10 fore/aft, ±5 recline) until stopped, clamped at the
//! domain bounds, or converged on a recall target. Presets live only in
//! memory; a restart resets them.

use super::{EngineConfig, EngineEvent, MEMORY_CONFIRM_SETTLE, SEAT_STEP_SETTLE, roll, schedule};
use body_protocol::catalog::seat;
use body_protocol::payload::{
    AdjustSeatReq, AdjustSeatResp, OnMemorySaveConfirm, OnSeatPositionChanged, OpResult,
    RecallMemoryPositionReq, RecallMemoryPositionResp, SaveMemoryPositionReq,
    SaveMemoryPositionResp, SeatAxis, SeatDirection, WirePayload,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use someip_core::ReturnCode;
use someip_runtime::provider::{InboundRequest, RequestOutcome};
use tokio::sync::mpsc;
use tracing::{debug, info};

pub const FORE_AFT_MIN: i8 = -100;
pub const FORE_AFT_MAX: i8 = 100;
pub const RECLINE_MIN: i8 = 0;
pub const RECLINE_MAX: i8 = 90;
pub const FORE_AFT_STEP: i8 = 10;
pub const RECLINE_STEP: i8 = 5;

#[derive(Debug)]
pub enum SeatMsg {
    /// Settling tick: advance the active motion by one increment.
    MotionTick,
    /// Settling timer for a memory save acknowledgement.
    ConfirmSave { preset_id: u8 },
    /// Simulator sets one axis to an absolute position.
    SimSetAxis { axis: SeatAxis, position: i8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Motion {
    Idle,
    Adjusting { axis: SeatAxis, positive: bool },
    Recalling { fore_aft: i8, recline: i8 },
}

pub struct SeatEngine {
    fore_aft: i8,
    recline: i8,
    presets: [(i8, i8); 3],
    motion: Motion,
    tick_pending: bool,
    rng: StdRng,
    success_rate: u8,
    events: mpsc::Sender<EngineEvent>,
    mailbox: mpsc::Sender<SeatMsg>,
    internal: mpsc::Receiver<SeatMsg>,
}

impl SeatEngine {
    pub fn new(
        events: mpsc::Sender<EngineEvent>,
        cfg: EngineConfig,
    ) -> (SeatEngine, mpsc::Sender<SeatMsg>) {
        let (mailbox, internal) = mpsc::channel(64);
        let engine = SeatEngine {
            fore_aft: 0,
            recline: 45,
            presets: [(0, 45); 3],
            motion: Motion::Idle,
            tick_pending: false,
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
        debug!("seat engine stopped");
    }

    fn handle_request(&mut self, req: InboundRequest) {
        let outcome = match req.method_id {
            seat::ADJUST_SEAT => match AdjustSeatReq::decode(&req.payload) {
                Ok(r) => RequestOutcome::Reply(self.adjust(r).encode()),
                Err(e) => {
                    debug!(error = %e, "malformed AdjustSeat request");
                    RequestOutcome::Fault(ReturnCode::MalformedMessage)
                }
            },
            seat::SAVE_MEMORY_POSITION => match SaveMemoryPositionReq::decode(&req.payload) {
                Ok(r) => RequestOutcome::Reply(self.save_preset(r).encode()),
                Err(e) => {
                    debug!(error = %e, "malformed SaveMemoryPosition request");
                    RequestOutcome::Fault(ReturnCode::MalformedMessage)
                }
            },
            seat::RECALL_MEMORY_POSITION => match RecallMemoryPositionReq::decode(&req.payload) {
                Ok(r) => RequestOutcome::Reply(self.recall_preset(r).encode()),
                Err(e) => {
                    debug!(error = %e, "malformed RecallMemoryPosition request");
                    RequestOutcome::Fault(ReturnCode::MalformedMessage)
                }
            },
            other => {
                debug!(method = other, "unknown seat method");
                RequestOutcome::Fault(ReturnCode::UnknownMethod)
            }
        };
        let _ = req.reply.send(outcome);
    }

    fn adjust(&mut self, req: AdjustSeatReq) -> AdjustSeatResp {
        if req.direction == SeatDirection::Stop {
            self.motion = Motion::Idle;
            return AdjustSeatResp {
                axis: req.axis,
                result: OpResult::Success,
            };
        }
        let result = roll(&mut self.rng, self.success_rate);
        if result == OpResult::Success {
            self.motion = Motion::Adjusting {
                axis: req.axis,
                positive: req.direction == SeatDirection::Positive,
            };
            self.schedule_tick();
        }
        AdjustSeatResp {
            axis: req.axis,
            result,
        }
    }

    fn save_preset(&mut self, req: SaveMemoryPositionReq) -> SaveMemoryPositionResp {
        if !(1..=3).contains(&req.preset_id) {
            info!(preset = req.preset_id, "save rejected, preset out of range");
            return SaveMemoryPositionResp {
                preset_id: req.preset_id,
                result: OpResult::Fail,
            };
        }
        let result = roll(&mut self.rng, self.success_rate);
        if result == OpResult::Success {
            self.presets[usize::from(req.preset_id) - 1] = (self.fore_aft, self.recline);
            schedule(
                self.mailbox.clone(),
                MEMORY_CONFIRM_SETTLE,
                SeatMsg::ConfirmSave {
                    preset_id: req.preset_id,
                },
            );
        }
        SaveMemoryPositionResp {
            preset_id: req.preset_id,
            result,
        }
    }

    fn recall_preset(&mut self, req: RecallMemoryPositionReq) -> RecallMemoryPositionResp {
        if !(1..=3).contains(&req.preset_id) {
            info!(preset = req.preset_id, "recall rejected, preset out of range");
            return RecallMemoryPositionResp {
                preset_id: req.preset_id,
                result: OpResult::Fail,
            };
        }
        let result = roll(&mut self.rng, self.success_rate);
        if result == OpResult::Success {
            let (fore_aft, recline) = self.presets[usize::from(req.preset_id) - 1];
            self.motion = Motion::Recalling { fore_aft, recline };
            self.schedule_tick();
        }
        RecallMemoryPositionResp {
            preset_id: req.preset_id,
            result,
        }
    }

    fn schedule_tick(&mut self) {
        if !self.tick_pending {
            self.tick_pending = true;
            schedule(self.mailbox.clone(), SEAT_STEP_SETTLE, SeatMsg::MotionTick);
        }
    }

    async fn handle_internal(&mut self, msg: SeatMsg) {
        match msg {
            SeatMsg::MotionTick => {
                self.tick_pending = false;
                self.motion_tick().await;
            }
            SeatMsg::ConfirmSave { preset_id } => {
                let event = OnMemorySaveConfirm {
                    preset_id,
                    result: OpResult::Success,
                };
                self.emit(seat::ON_MEMORY_SAVE_CONFIRM, event.encode()).await;
            }
            SeatMsg::SimSetAxis { axis, position } => {
                let clamped = clamp_axis(axis, position);
                self.set_axis(axis, clamped);
                self.notify_axis(axis).await;
            }
        }
    }

    async fn motion_tick(&mut self) {
        match self.motion {
            Motion::Idle => {}
            Motion::Adjusting { axis, positive } => {
                let step = step_for(axis);
                let delta = if positive { step } else { -step };
                let current = self.axis_value(axis);
                let next = clamp_axis(axis, current.saturating_add(delta));
                if next != current {
                    self.set_axis(axis, next);
                    self.notify_axis(axis).await;
                }
                if next == current || at_bound(axis, next) {
                    self.motion = Motion::Idle;
                } else {
                    self.schedule_tick();
                }
            }
            Motion::Recalling { fore_aft, recline } => {
                let mut converged = true;
                for (axis, target) in [(SeatAxis::ForeAft, fore_aft), (SeatAxis::Recline, recline)]
                {
                    let current = self.axis_value(axis);
                    if current == target {
                        continue;
                    }
                    let step = step_for(axis);
                    let next = if target > current {
                        (current.saturating_add(step)).min(target)
                    } else {
                        (current.saturating_sub(step)).max(target)
                    };
                    self.set_axis(axis, next);
                    self.notify_axis(axis).await;
                    if next != target {
                        converged = false;
                    }
                }
                if converged {
                    self.motion = Motion::Idle;
                } else {
                    self.schedule_tick();
                }
            }
        }
    }

    fn axis_value(&self, axis: SeatAxis) -> i8 {
        match axis {
            SeatAxis::ForeAft => self.fore_aft,
            SeatAxis::Recline => self.recline,
        }
    }

    fn set_axis(&mut self, axis: SeatAxis, value: i8) {
        match axis {
            SeatAxis::ForeAft => self.fore_aft = value,
            SeatAxis::Recline => self.recline = value,
        }
    }

    async fn notify_axis(&self, axis: SeatAxis) {
        let event = OnSeatPositionChanged {
            axis,
            position: self.axis_value(axis),
        };
        self.emit(seat::ON_SEAT_POSITION_CHANGED, event.encode()).await;
    }

    async fn emit(&self, event_id: u16, payload: Vec<u8>) {
        let _ = self.events.send(EngineEvent { event_id, payload }).await;
    }
}

fn step_for(axis: SeatAxis) -> i8 {
    match axis {
        SeatAxis::ForeAft => FORE_AFT_STEP,
        SeatAxis::Recline => RECLINE_STEP,
    }
}

fn clamp_axis(axis: SeatAxis, value: i8) -> i8 {
    match axis {
        SeatAxis::ForeAft => value.clamp(FORE_AFT_MIN, FORE_AFT_MAX),
        SeatAxis::Recline => value.clamp(RECLINE_MIN, RECLINE_MAX),
    }
}

fn at_bound(axis: SeatAxis, value: i8) -> bool {
    match axis {
        SeatAxis::ForeAft => value == FORE_AFT_MIN || value == FORE_AFT_MAX,
        SeatAxis::Recline => value == RECLINE_MIN || value == RECLINE_MAX,
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
        let (events_tx, events_rx) = mpsc::channel(128);
        let (engine, _ctl) = SeatEngine::new(
            events_tx,
            EngineConfig {
                success_rate: 100,
                seed: 11,
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

    async fn adjust(
        requests: &mpsc::Sender<InboundRequest>,
        axis: SeatAxis,
        direction: SeatDirection,
    ) -> AdjustSeatResp {
        AdjustSeatResp::decode(
            &request(
                requests,
                seat::ADJUST_SEAT,
                AdjustSeatReq { axis, direction }.encode(),
            )
            .await,
        )
        .unwrap()
    }

    async fn next_position(events_rx: &mut mpsc::Receiver<EngineEvent>) -> OnSeatPositionChanged {
        loop {
            let event = events_rx.recv().await.unwrap();
            if event.event_id == seat::ON_SEAT_POSITION_CHANGED {
                return OnSeatPositionChanged::decode(&event.payload).unwrap();
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn adjust_steps_until_stop() {
        let (req_tx, mut events_rx) = spawn_engine();

        let resp = adjust(&req_tx, SeatAxis::ForeAft, SeatDirection::Positive).await;
        assert_eq!(resp.result, OpResult::Success);

        // Movement advances one increment per settling tick.
        assert_eq!(next_position(&mut events_rx).await.position, 10);
        assert_eq!(next_position(&mut events_rx).await.position, 20);

        let stop = adjust(&req_tx, SeatAxis::ForeAft, SeatDirection::Stop).await;
        assert_eq!(stop.result, OpResult::Success);
        tokio::time::sleep(SEAT_STEP_SETTLE * 3).await;
        // At most the already-scheduled tick lands after the stop.
        let mut extra = 0;
        while events_rx.try_recv().is_ok() {
            extra += 1;
        }
        assert!(extra <= 1, "movement continued after stop: {extra} events");
    }

    #[tokio::test(start_paused = true)]
    async fn recline_clamps_at_domain_edge() {
        let (req_tx, mut events_rx) = spawn_engine();

        let resp = adjust(&req_tx, SeatAxis::Recline, SeatDirection::Positive).await;
        assert_eq!(resp.result, OpResult::Success);

        // 45 -> 90 in 5-degree steps, then the motion parks itself.
        let mut last = 0;
        for _ in 0..9 {
            last = next_position(&mut events_rx).await.position;
        }
        assert_eq!(last, RECLINE_MAX);
        tokio::time::sleep(SEAT_STEP_SETTLE * 3).await;
        assert!(events_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn save_then_recall_converges_to_the_saved_tuple() {
        let (req_tx, mut events_rx) = spawn_engine();

        // Drive fore/aft to +30.
        adjust(&req_tx, SeatAxis::ForeAft, SeatDirection::Positive).await;
        for expected in [10, 20, 30] {
            assert_eq!(next_position(&mut events_rx).await.position, expected);
        }
        adjust(&req_tx, SeatAxis::ForeAft, SeatDirection::Stop).await;

        let save = SaveMemoryPositionResp::decode(
            &request(
                &req_tx,
                seat::SAVE_MEMORY_POSITION,
                SaveMemoryPositionReq { preset_id: 2 }.encode(),
            )
            .await,
        )
        .unwrap();
        assert_eq!(save.result, OpResult::Success);
        let confirm = loop {
            let event = events_rx.recv().await.unwrap();
            if event.event_id == seat::ON_MEMORY_SAVE_CONFIRM {
                break OnMemorySaveConfirm::decode(&event.payload).unwrap();
            }
        };
        assert_eq!(confirm.preset_id, 2);
        assert_eq!(confirm.result, OpResult::Success);

        // Wander off.
        adjust(&req_tx, SeatAxis::ForeAft, SeatDirection::Negative).await;
        while next_position(&mut events_rx).await.position != 0 {}
        adjust(&req_tx, SeatAxis::ForeAft, SeatDirection::Stop).await;

        // Recall converges both axes to the stored tuple.
        let recall = RecallMemoryPositionResp::decode(
            &request(
                &req_tx,
                seat::RECALL_MEMORY_POSITION,
                RecallMemoryPositionReq { preset_id: 2 }.encode(),
            )
            .await,
        )
        .unwrap();
        assert_eq!(recall.result, OpResult::Success);

        let mut fore_aft = 0;
        let mut recline = 45;
        for _ in 0..8 {
            let event = next_position(&mut events_rx).await;
            match event.axis {
                SeatAxis::ForeAft => fore_aft = event.position,
                SeatAxis::Recline => recline = event.position,
            }
            if fore_aft == 30 && recline == 45 {
                break;
            }
        }
        assert_eq!((fore_aft, recline), (30, 45));
    }

    #[tokio::test(start_paused = true)]
    async fn preset_zero_and_four_are_rejected() {
        let (req_tx, mut events_rx) = spawn_engine();

        for preset_id in [0u8, 4] {
            let resp = RecallMemoryPositionResp::decode(
                &request(
                    &req_tx,
                    seat::RECALL_MEMORY_POSITION,
                    RecallMemoryPositionReq { preset_id }.encode(),
                )
                .await,
            )
            .unwrap();
            assert_eq!(resp.result, OpResult::Fail);

            let save = SaveMemoryPositionResp::decode(
                &request(
                    &req_tx,
                    seat::SAVE_MEMORY_POSITION,
                    SaveMemoryPositionReq { preset_id }.encode(),
                )
                .await,
            )
            .unwrap();
            assert_eq!(save.result, OpResult::Fail);
        }

        tokio::time::sleep(SEAT_STEP_SETTLE * 2).await;
        assert!(events_rx.try_recv().is_err());
    }
}
