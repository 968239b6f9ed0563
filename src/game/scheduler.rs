//! Per-session tick scheduler
//!
//! An explicit queue of actions keyed by fire time, drained by the single
//! session task. No wall clock lives here: the driver passes `now` in,
//! which makes the whole simulation testable with virtual time.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::ws::protocol::EntityId;

/// Everything the session can be asked to do at a point in time.
/// One-shots close over an identity, not a live reference; handlers must
/// tolerate the entity having been removed by another path in the meantime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Periodic full simulation step
    WorldTick,
    /// Periodic formation gate opening, rescheduled at the current speed
    FormationTick,
    /// Cannon shoot-delay expired
    UnlockCannon,
    /// Deferred removal of a dead enemy after its death animation
    RemoveEnemy(EntityId),
    /// Destroyed UFO returns to its home offset
    HideUfo,
    /// Player respawns at full health
    RebirthPlayer,
    /// Terminal: announce game over and stop the session
    EndGame(String),
}

#[derive(Debug, PartialEq, Eq)]
struct Entry {
    due_at: u64,
    seq: u64,
    action: Action,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.due_at, self.seq).cmp(&(other.due_at, other.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Time-ordered action queue. Ties fire in scheduling order.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Reverse<Entry>>,
    seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an action at an absolute session time (ms)
    pub fn schedule_at(&mut self, due_at: u64, action: Action) {
        self.seq += 1;
        self.queue.push(Reverse(Entry {
            due_at,
            seq: self.seq,
            action,
        }));
    }

    /// Schedule an action `delay` ms after `now`
    pub fn schedule_after(&mut self, now: u64, delay: u64, action: Action) {
        self.schedule_at(now + delay, action);
    }

    /// Earliest pending deadline, if any
    pub fn next_due(&self) -> Option<u64> {
        self.queue.peek().map(|Reverse(entry)| entry.due_at)
    }

    /// Pop the next action due at or before `now`, with its fire time
    pub fn pop_due(&mut self, now: u64) -> Option<(u64, Action)> {
        if self.next_due()? <= now {
            self.queue.pop().map(|Reverse(entry)| (entry.due_at, entry.action))
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
