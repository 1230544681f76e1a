//! Deterministic timer queue for delayed propagation, scene transitions and generation ticks.
//!
//! Timers are keyed by `(due time, insertion sequence)`, so expirations at the
//! same instant fire in the order they were scheduled.

use node_rules::{ConnectionId, NodeId, NodeState};
use std::collections::BTreeMap;
use std::time::Duration;

/// Handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Work deferred to a later tick.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduledTask {
    /// Re-run `from` entering `state` along one connection.
    PropagateState {
        connection: ConnectionId,
        from: NodeId,
        state: NodeState,
    },
    SceneTransition {
        scene: NodeId,
    },
    /// Recurring generation queue step.
    GenerationTick,
}

impl ScheduledTask {
    /// Whether the task refers to `node`, directly or as a propagation source.
    pub fn targets_node(&self, node: &str) -> bool {
        match self {
            ScheduledTask::PropagateState { from, .. } => from.as_str() == node,
            ScheduledTask::SceneTransition { scene } => scene.as_str() == node,
            ScheduledTask::GenerationTick => false,
        }
    }

    pub fn targets_connection(&self, id: &str) -> bool {
        matches!(self, ScheduledTask::PropagateState { connection, .. } if connection.as_str() == id)
    }
}

/// Monotonic clock plus ordered pending timers.
#[derive(Debug, Default)]
pub struct Scheduler {
    now: Duration,
    next_seq: u64,
    timers: BTreeMap<(Duration, u64), ScheduledTask>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    /// Schedule `task` to run `delay` from now.
    ///
    /// Returns `None` if the due time would overflow the clock.
    pub fn schedule(&mut self, delay: Duration, task: ScheduledTask) -> Option<TimerId> {
        let due = self.now.checked_add(delay)?;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.insert((due, seq), task);
        Some(TimerId(seq))
    }

    /// Pop the earliest timer due at or before `until`, moving the clock to its due time.
    pub fn pop_due(&mut self, until: Duration) -> Option<ScheduledTask> {
        let (&(due, seq), _) = self.timers.iter().next()?;
        if due > until {
            return None;
        }
        let task = self.timers.remove(&(due, seq))?;
        self.now = self.now.max(due);
        Some(task)
    }

    /// Move the clock forward. The clock never runs backwards.
    pub fn advance_to(&mut self, time: Duration) {
        self.now = self.now.max(time);
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        let key = self.timers.keys().find(|(_, seq)| *seq == id.0).copied();
        key.and_then(|key| self.timers.remove(&key)).is_some()
    }

    /// Cancel every timer matching `predicate`. Returns how many were cancelled.
    pub fn cancel_where<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&ScheduledTask) -> bool,
    {
        let before = self.timers.len();
        self.timers.retain(|_, task| !predicate(task));
        before - self.timers.len()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    /// Every pending timer, generation ticks included.
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &ScheduledTask> {
        self.timers.values()
    }

    /// Time until the next timer fires, if any.
    pub fn time_until_next(&self) -> Option<Duration> {
        self.timers
            .keys()
            .next()
            .map(|(due, _)| due.saturating_sub(self.now))
    }
}

/// Convert configured seconds into a duration, rejecting values the clock cannot hold.
pub(crate) fn seconds(value: f32) -> Option<Duration> {
    Duration::try_from_secs_f32(value).ok()
}
