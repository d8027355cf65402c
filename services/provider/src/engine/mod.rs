//! Service engines.
//!
//! Each engine is a task that exclusively owns its service's state map and
//! consumes two streams: method requests forwarded by the transport runtime
//! and internal messages (settling timers, simulator triggers). External
//! code never touches the state directly.

pub mod door;
pub mod light;
pub mod seat;
pub mod window;

use body_protocol::payload::OpResult;
use rand::Rng;
use rand::rngs::StdRng;
use std::time::Duration;
use tokio::sync::mpsc;

/// Hardware settling delays between an accepted command and the observable
/// state change.
pub const DOOR_LOCK_SETTLE: Duration = Duration::from_millis(100);
pub const WINDOW_MOVE_SETTLE: Duration = Duration::from_millis(200);
pub const LIGHT_SETTLE: Duration = Duration::from_millis(100);
pub const SEAT_STEP_SETTLE: Duration = Duration::from_millis(500);
pub const MEMORY_CONFIRM_SETTLE: Duration = Duration::from_millis(100);

/// An event emitted by an engine, already payload-encoded. The provider
/// wiring pumps these into the transport notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEvent {
    pub event_id: u16,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Percentage of simulated operations that succeed.
    pub success_rate: u8,
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            success_rate: 95,
            seed: 0,
        }
    }
}

/// One pseudo-random success/failure roll for a simulated operation.
pub(crate) fn roll(rng: &mut StdRng, success_rate: u8) -> OpResult {
    if rng.gen_range(0..100) < u32::from(success_rate) {
        OpResult::Success
    } else {
        OpResult::Fail
    }
}

/// Deliver `msg` to the engine's own mailbox after `delay`. Models hardware
/// settling time; the response has already been sent by then.
pub(crate) fn schedule<M: Send + 'static>(tx: mpsc::Sender<M>, delay: Duration, msg: M) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(msg).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn roll_extremes_are_deterministic() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            assert_eq!(roll(&mut rng, 100), OpResult::Success);
            assert_eq!(roll(&mut rng, 0), OpResult::Fail);
        }
    }

    #[test]
    fn roll_is_reproducible_for_a_seed() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        let results_a: Vec<OpResult> = (0..32).map(|_| roll(&mut a, 95)).collect();
        let results_b: Vec<OpResult> = (0..32).map(|_| roll(&mut b, 95)).collect();
        assert_eq!(results_a, results_b);
    }
}
