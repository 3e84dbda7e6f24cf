/// Cancellable timer queue driven by explicit session time.
///
/// Every delayed or periodic action in the game is a plain command value
/// sitting in one of these queues. Nothing here owns a thread or a clock:
/// the owner calls `pop_due(now)` in a loop on every frame and applies each
/// command it gets back. Applying a command may schedule or cancel other
/// timers; those changes are visible to the very next `pop_due` call.
///
/// Ordering:
///   - timers fire in due-time order
///   - timers with the same due time fire in the order they were scheduled
///   - a periodic timer keeps its place in the ordering for each repeat
///
/// Time inside a firing command is the timer's due time, not the wall time
/// of the frame. A command that schedules a follow-up 600 ms later is
/// therefore exact even if the frame arrived late.
///
/// Each timer carries a scope tag. `cancel_scope` drops everything a screen
/// owns when that screen goes away.

/// Milliseconds since the session started.
pub type Millis = u64;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TimerId(u64);

#[derive(Clone, Debug)]
struct Timer<S, C> {
    id: TimerId,
    due: Millis,
    seq: u64,
    period: Option<Millis>,
    scope: S,
    command: C,
}

#[derive(Debug)]
pub struct Scheduler<S, C> {
    now: Millis,
    next_id: u64,
    next_seq: u64,
    timers: Vec<Timer<S, C>>,
}

impl<S: Copy + PartialEq, C: Clone> Scheduler<S, C> {
    pub fn new() -> Self {
        Scheduler {
            now: 0,
            next_id: 0,
            next_seq: 0,
            timers: Vec::new(),
        }
    }

    /// Current scheduler time (due time of the command being applied, or the
    /// last `now` passed to `pop_due`).
    pub fn now(&self) -> Millis {
        self.now
    }

    /// One-shot timer firing `delay` ms from now.
    pub fn after(&mut self, delay: Millis, scope: S, command: C) -> TimerId {
        self.insert(delay, None, scope, command)
    }

    /// Periodic timer firing every `period` ms, first time one period from now.
    /// A zero period is bumped to 1 ms so the queue always makes progress.
    pub fn every(&mut self, period: Millis, scope: S, command: C) -> TimerId {
        let period = period.max(1);
        self.insert(period, Some(period), scope, command)
    }

    /// Schedule an ordered script of `(offset, command)` steps.
    /// All offsets are measured from now, not from the previous step.
    pub fn script(&mut self, scope: S, steps: &[(Millis, C)]) -> Vec<TimerId> {
        steps
            .iter()
            .map(|(offset, cmd)| self.after(*offset, scope, cmd.clone()))
            .collect()
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        self.timers.len() != before
    }

    /// Drop every timer tagged with `scope`. Returns how many were dropped.
    pub fn cancel_scope(&mut self, scope: S) -> usize {
        let before = self.timers.len();
        self.timers.retain(|t| t.scope != scope);
        before - self.timers.len()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.timers.iter().any(|t| t.id == id)
    }

    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    pub fn pending_in(&self, scope: S) -> usize {
        self.timers.iter().filter(|t| t.scope == scope).count()
    }

    /// Pop the earliest timer due at or before `now`.
    ///
    /// Periodic timers are re-armed one period later before their command is
    /// returned, so cancelling them from inside the command works.
    /// When nothing is due the scheduler clock moves to `now` and `None` is
    /// returned.
    pub fn pop_due(&mut self, now: Millis) -> Option<C> {
        let idx = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= now)
            .min_by_key(|(_, t)| (t.due, t.seq))
            .map(|(i, _)| i);

        let idx = match idx {
            Some(i) => i,
            None => {
                self.now = self.now.max(now);
                return None;
            }
        };

        let due = self.timers[idx].due;
        self.now = self.now.max(due);

        let command = match self.timers[idx].period {
            Some(period) => {
                let timer = &mut self.timers[idx];
                timer.due += period;
                timer.command.clone()
            }
            None => self.timers.swap_remove(idx).command,
        };
        Some(command)
    }

    // ── Internal ──

    fn insert(&mut self, delay: Millis, period: Option<Millis>, scope: S, command: C) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.push(Timer {
            id,
            due: self.now + delay,
            seq,
            period,
            scope,
            command,
        });
        id
    }
}

impl<S: Copy + PartialEq, C: Clone> Default for Scheduler<S, C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(s: &mut Scheduler<u8, &'static str>, now: Millis) -> Vec<&'static str> {
        std::iter::from_fn(|| s.pop_due(now)).collect()
    }

    #[test]
    fn fires_in_due_order() {
        let mut s = Scheduler::new();
        s.after(300, 0, "c");
        s.after(100, 0, "a");
        s.after(200, 0, "b");
        assert_eq!(drain(&mut s, 99), Vec::<&str>::new());
        assert_eq!(drain(&mut s, 1000), vec!["a", "b", "c"]);
        assert_eq!(s.pending(), 0);
    }

    #[test]
    fn same_due_time_keeps_schedule_order() {
        let mut s = Scheduler::new();
        s.after(50, 0, "first");
        s.after(50, 0, "second");
        s.after(50, 0, "third");
        assert_eq!(drain(&mut s, 50), vec!["first", "second", "third"]);
    }

    #[test]
    fn periodic_repeats_until_cancelled() {
        let mut s = Scheduler::new();
        let id = s.every(100, 0, "tick");
        assert_eq!(drain(&mut s, 350), vec!["tick", "tick", "tick"]);
        assert!(s.cancel(id));
        assert_eq!(drain(&mut s, 1000), Vec::<&str>::new());
    }

    #[test]
    fn script_offsets_are_from_schedule_time() {
        let mut s = Scheduler::new();
        assert_eq!(s.pop_due(1000), None);
        s.script(1, &[(2000, "error"), (3500, "cannot"), (7000, "final")]);
        assert_eq!(drain(&mut s, 2999), Vec::<&str>::new());
        assert_eq!(drain(&mut s, 3000), vec!["error"]);
        assert_eq!(drain(&mut s, 4500), vec!["cannot"]);
        assert_eq!(drain(&mut s, 8000), vec!["final"]);
    }

    #[test]
    fn cancel_scope_leaves_other_scopes() {
        let mut s = Scheduler::new();
        s.after(10, 1, "old");
        s.every(10, 1, "old-tick");
        s.after(10, 2, "new");
        assert_eq!(s.cancel_scope(1), 2);
        assert_eq!(s.pending_in(1), 0);
        assert_eq!(drain(&mut s, 100), vec!["new"]);
    }

    #[test]
    fn follow_up_is_timed_from_firing_time() {
        let mut s: Scheduler<u8, &'static str> = Scheduler::new();
        s.after(100, 0, "first");
        // Frame arrives late: the first timer is applied at its own due time.
        assert_eq!(s.pop_due(450), Some("first"));
        assert_eq!(s.now(), 100);
        s.after(600, 0, "follow-up");
        assert_eq!(s.pop_due(450), None);
        assert_eq!(s.pop_due(699), None);
        assert_eq!(s.pop_due(700), Some("follow-up"));
    }

    #[test]
    fn cancel_from_inside_a_burst() {
        let mut s = Scheduler::new();
        let flicker = s.every(100, 0, "flicker");
        s.after(250, 0, "stop");
        let mut seen = vec![];
        while let Some(cmd) = s.pop_due(1000) {
            seen.push(cmd);
            if cmd == "stop" {
                s.cancel(flicker);
            }
        }
        assert_eq!(seen, vec!["flicker", "flicker", "stop"]);
        assert!(!s.is_pending(flicker));
    }

    #[test]
    fn zero_period_still_advances() {
        let mut s = Scheduler::new();
        s.every(0, 0, "spin");
        assert_eq!(drain(&mut s, 3).len(), 3);
    }
}
