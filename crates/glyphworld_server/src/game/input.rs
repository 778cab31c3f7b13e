//! # Player Input Queue
//!
//! Sessions push inputs from any thread; the pre-tick phase drains them.
//! Inputs carry their submission time so the simulation can apply them
//! in submission order even when several sessions raced to enqueue.

use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::debug;

/// Inputs held between ticks, across all sessions. Beyond this, new
/// inputs are refused until the next drain.
pub const INPUT_QUEUE_CAPACITY: usize = 1024;

/// What the player asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKind {
    /// Step by a delta.
    Move {
        /// X delta.
        dx: i32,
        /// Y delta.
        dy: i32,
    },
}

/// One queued input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputEvent {
    /// Player the input belongs to.
    pub player_id: String,
    /// When the session submitted it.
    pub submitted_at: Instant,
    /// The input.
    pub kind: InputKind,
}

impl InputEvent {
    /// A move input stamped now.
    #[must_use]
    pub fn movement(player_id: impl Into<String>, dx: i32, dy: i32) -> Self {
        Self {
            player_id: player_id.into(),
            submitted_at: Instant::now(),
            kind: InputKind::Move { dx, dy },
        }
    }
}

/// Cloneable handle for submitting inputs.
#[derive(Clone, Debug)]
pub struct InputSender {
    tx: Sender<InputEvent>,
}

impl InputSender {
    pub(crate) const fn new(tx: Sender<InputEvent>) -> Self {
        Self { tx }
    }

    /// Queues an input without waiting.
    ///
    /// Returns false if the queue is full or the world is gone.
    pub fn send(&self, event: InputEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                debug!(player = %event.player_id, "Input queue full, input dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Queues a move for `player_id`.
    pub fn send_move(&self, player_id: &str, dx: i32, dy: i32) -> bool {
        self.send(InputEvent::movement(player_id, dx, dy))
    }
}

/// Takes everything queued and orders it by submission time.
///
/// The sort is stable, so inputs with equal stamps keep queue order.
pub(crate) fn drain_sorted(rx: &Receiver<InputEvent>) -> Vec<InputEvent> {
    let mut events: Vec<InputEvent> = rx.try_iter().collect();
    events.sort_by_key(|e| e.submitted_at);
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_drain_orders_by_submission() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let t0 = Instant::now();
        let at = |ms: u64, id: &str| InputEvent {
            player_id: id.to_owned(),
            submitted_at: t0 + Duration::from_millis(ms),
            kind: InputKind::Move { dx: 1, dy: 0 },
        };

        tx.send(at(30, "c")).expect("send");
        tx.send(at(10, "a")).expect("send");
        tx.send(at(20, "b")).expect("send");
        tx.send(at(10, "a2")).expect("send");

        let ids: Vec<String> = drain_sorted(&rx).into_iter().map(|e| e.player_id).collect();
        assert_eq!(ids, vec!["a", "a2", "b", "c"]);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_full_queue_refuses_inputs() {
        let (tx, rx) = crossbeam_channel::bounded(3);
        let sender = InputSender::new(tx);

        let accepted = (0..10).filter(|_| sender.send_move("flood", 1, 0)).count();
        assert_eq!(accepted, 3);
        assert_eq!(rx.len(), 3);

        assert_eq!(drain_sorted(&rx).len(), 3);
        assert!(sender.send_move("flood", 1, 0));
    }

    #[test]
    fn test_closed_queue_refuses_inputs() {
        let (tx, rx) = crossbeam_channel::bounded(3);
        let sender = InputSender::new(tx);
        drop(rx);
        assert!(!sender.send_move("p1", 1, 0));
    }
}
