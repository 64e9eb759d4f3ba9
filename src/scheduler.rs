//! Virtual-time task scheduler.
//!
//! Tasks are keyed by a caller-chosen `K` and fire on a clock that only moves
//! when told to, so tests step through minutes of dashboard activity
//! instantly. The binary maps the clock onto the wall clock by sleeping until
//! [`Scheduler::next_due`].

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Shortest accepted repeat interval.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Cancels the task it was returned for. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
struct Task<K> {
    key: K,
    interval: Option<Duration>,
    token: CancellationToken,
}

#[derive(Debug)]
pub struct Scheduler<K> {
    now: Duration,
    seq: u64,
    queue: BinaryHeap<Reverse<(Duration, u64)>>,
    tasks: HashMap<u64, Task<K>>,
}

impl<K> Default for Scheduler<K> {
    fn default() -> Self {
        Self {
            now: Duration::ZERO,
            seq: 0,
            queue: BinaryHeap::new(),
            tasks: HashMap::new(),
        }
    }
}

impl<K: Clone> Scheduler<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time since start.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Repeat `key` every `interval`, first firing one interval from now.
    pub fn every(&mut self, key: K, interval: Duration) -> CancellationToken {
        let interval = interval.max(MIN_INTERVAL);
        self.insert(key, self.now + interval, Some(interval))
    }

    /// Fire `key` once after `delay`.
    pub fn after(&mut self, key: K, delay: Duration) -> CancellationToken {
        self.insert(key, self.now + delay, None)
    }

    /// Move the clock forward.
    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    /// Move the clock to `instant` if it lies ahead.
    pub fn advance_to(&mut self, instant: Duration) {
        self.now = self.now.max(instant);
    }

    /// Due time of the earliest live task.
    pub fn next_due(&mut self) -> Option<Duration> {
        self.discard_cancelled();
        self.queue.peek().map(|Reverse((due, _))| *due)
    }

    /// Pop the next task due at or before now.
    ///
    /// Firings come out in due order, ties in insertion order. Periodic tasks
    /// are re-queued one interval after their due time.
    pub fn pop_due(&mut self) -> Option<K> {
        self.discard_cancelled();
        let Reverse((due, id)) = *self.queue.peek()?;
        if due > self.now {
            return None;
        }
        self.queue.pop();
        let task = self.tasks.remove(&id)?;
        let key = task.key.clone();
        if let Some(interval) = task.interval {
            let next = self.next_id();
            self.queue.push(Reverse((due + interval, next)));
            self.tasks.insert(next, task);
        }
        Some(key)
    }

    /// Number of live tasks.
    pub fn len(&self) -> usize {
        self.tasks
            .values()
            .filter(|task| !task.token.is_cancelled())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&mut self, key: K, due: Duration, interval: Option<Duration>) -> CancellationToken {
        let token = CancellationToken::default();
        let id = self.next_id();
        self.queue.push(Reverse((due, id)));
        self.tasks.insert(
            id,
            Task {
                key,
                interval,
                token: token.clone(),
            },
        );
        token
    }

    fn next_id(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn discard_cancelled(&mut self) {
        while let Some(Reverse((_, id))) = self.queue.peek().copied() {
            let live = self
                .tasks
                .get(&id)
                .is_some_and(|task| !task.token.is_cancelled());
            if live {
                break;
            }
            self.queue.pop();
            self.tasks.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn drain(scheduler: &mut Scheduler<&'static str>) -> Vec<&'static str> {
        std::iter::from_fn(|| scheduler.pop_due()).collect()
    }

    #[test]
    fn fires_in_due_order_with_ties_in_insertion_order() {
        let mut scheduler = Scheduler::new();
        scheduler.after("late", ms(300));
        scheduler.after("first", ms(100));
        scheduler.after("second", ms(100));
        scheduler.advance(ms(500));
        assert_eq!(drain(&mut scheduler), ["first", "second", "late"]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn nothing_fires_before_its_due_time() {
        let mut scheduler = Scheduler::new();
        scheduler.after("once", ms(1_000));
        scheduler.advance(ms(999));
        assert_eq!(scheduler.pop_due(), None);
        assert_eq!(scheduler.next_due(), Some(ms(1_000)));
        scheduler.advance(ms(1));
        assert_eq!(scheduler.pop_due(), Some("once"));
    }

    #[test]
    fn periodic_tasks_catch_up_in_order() {
        let mut scheduler = Scheduler::new();
        scheduler.every("tick", ms(800));
        scheduler.every("poll", ms(2_000));
        scheduler.advance(ms(4_000));
        assert_eq!(
            drain(&mut scheduler),
            ["tick", "tick", "poll", "tick", "tick", "poll", "tick"]
        );
        assert_eq!(scheduler.next_due(), Some(ms(4_800)));
    }

    #[test]
    fn cancellation_drops_future_firings() {
        let mut scheduler = Scheduler::new();
        let token = scheduler.every("poll", ms(100));
        scheduler.after("other", ms(250));
        scheduler.advance(ms(100));
        assert_eq!(scheduler.pop_due(), Some("poll"));
        token.clone().cancel();
        assert!(token.is_cancelled());
        scheduler.advance(ms(1_000));
        assert_eq!(drain(&mut scheduler), ["other"]);
        assert_eq!(scheduler.next_due(), None);
        assert_eq!(scheduler.len(), 0);
    }

    #[test]
    fn zero_interval_is_raised_to_floor() {
        let mut scheduler = Scheduler::new();
        scheduler.every("spin", Duration::ZERO);
        assert_eq!(scheduler.next_due(), Some(MIN_INTERVAL));
    }

    #[test]
    fn advance_to_never_moves_backwards() {
        let mut scheduler: Scheduler<&str> = Scheduler::new();
        scheduler.advance(ms(50));
        scheduler.advance_to(ms(10));
        assert_eq!(scheduler.now(), ms(50));
    }
}
