//! Timer manager driven by frame delta time

use std::time::Duration;

use crate::tick::{TickCallback, TickControl, TickHandle, TickSource};

/// Default cap on how many times one timer may fire within a single `advance`
const DEFAULT_MAX_CATCH_UP: u32 = 4;

struct Timer {
    handle: TickHandle,
    /// Interval in seconds
    interval: f64,
    repeating: bool,
    /// Accumulated time since the last firing
    elapsed: f64,
    /// Set once a one-shot timer fired or the callback returned `Stop`
    done: bool,
    callback: TickCallback,
}

/// A `TickSource` that fires callbacks as elapsed time accumulates.
///
/// Each timer keeps its own accumulator, like a fixed-timestep clock. A long
/// frame fires a repeating timer at most `max_catch_up` times and drops the
/// remaining backlog.
pub struct TimerManager {
    timers: Vec<Timer>,
    next_id: u64,
    max_catch_up: u32,
}

impl Default for TimerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerManager {
    pub fn new() -> Self {
        Self {
            timers: Vec::new(),
            next_id: 1,
            max_catch_up: DEFAULT_MAX_CATCH_UP,
        }
    }

    /// Create a manager with a custom catch-up cap (minimum 1)
    pub fn with_max_catch_up(max_catch_up: u32) -> Self {
        Self {
            max_catch_up: max_catch_up.max(1),
            ..Self::new()
        }
    }

    /// Advance all timers by `dt` seconds, firing every due callback.
    /// Returns the number of callback invocations.
    pub fn advance(&mut self, dt: f64) -> usize {
        let mut fired = 0;
        let dt = dt.max(0.0);

        for timer in &mut self.timers {
            timer.elapsed += dt;

            // A zero interval fires exactly once per advance
            let due = if timer.interval <= 0.0 {
                1
            } else {
                let due = (timer.elapsed / timer.interval) as u32;
                timer.elapsed -= due.min(self.max_catch_up) as f64 * timer.interval;
                if due > self.max_catch_up {
                    log::trace!(
                        "Timer {:?} dropped {} late firings",
                        timer.handle,
                        due - self.max_catch_up
                    );
                    timer.elapsed = 0.0;
                }
                due.min(self.max_catch_up)
            };

            for _ in 0..due {
                fired += 1;
                let control = (timer.callback)();
                if control == TickControl::Stop || !timer.repeating {
                    timer.done = true;
                    break;
                }
            }
        }

        self.timers.retain(|t| !t.done);
        fired
    }

    /// Number of registered timers
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Whether no timers are registered
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl TickSource for TimerManager {
    fn schedule(
        &mut self,
        interval: Duration,
        repeating: bool,
        callback: TickCallback,
    ) -> TickHandle {
        let handle = TickHandle(self.next_id);
        self.next_id += 1;

        self.timers.push(Timer {
            handle,
            interval: interval.as_secs_f64(),
            repeating,
            elapsed: 0.0,
            done: false,
            callback,
        });

        log::trace!("Scheduled timer {:?} every {:?}", handle, interval);
        handle
    }

    fn cancel(&mut self, handle: TickHandle) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.handle != handle);
        self.timers.len() != before
    }

    fn is_scheduled(&self, handle: TickHandle) -> bool {
        self.timers.iter().any(|t| t.handle == handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counter_callback(count: &Rc<Cell<u32>>, control: TickControl) -> TickCallback {
        let count = count.clone();
        Box::new(move || {
            count.set(count.get() + 1);
            control
        })
    }

    #[test]
    fn repeating_timer_fires_each_interval() {
        let mut timers = TimerManager::new();
        let count = Rc::new(Cell::new(0));
        let handle = timers.schedule(
            Duration::from_millis(10),
            true,
            counter_callback(&count, TickControl::Continue),
        );

        timers.advance(0.005);
        assert_eq!(count.get(), 0);
        timers.advance(0.005);
        assert_eq!(count.get(), 1);
        timers.advance(0.010);
        assert_eq!(count.get(), 2);
        assert!(timers.is_scheduled(handle));
    }

    #[test]
    fn one_shot_timer_removes_itself() {
        let mut timers = TimerManager::new();
        let count = Rc::new(Cell::new(0));
        let handle = timers.schedule(
            Duration::from_millis(10),
            false,
            counter_callback(&count, TickControl::Continue),
        );

        timers.advance(0.1);
        assert_eq!(count.get(), 1);
        assert!(!timers.is_scheduled(handle));
        assert!(timers.is_empty());
    }

    #[test]
    fn stop_unregisters_callback() {
        let mut timers = TimerManager::new();
        let count = Rc::new(Cell::new(0));
        timers.schedule(
            Duration::from_millis(1),
            true,
            counter_callback(&count, TickControl::Stop),
        );

        timers.advance(0.1);
        timers.advance(0.1);
        assert_eq!(count.get(), 1);
        assert_eq!(timers.len(), 0);
    }

    #[test]
    fn catch_up_is_bounded() {
        let mut timers = TimerManager::with_max_catch_up(3);
        let count = Rc::new(Cell::new(0));
        timers.schedule(
            Duration::from_millis(10),
            true,
            counter_callback(&count, TickControl::Continue),
        );

        let fired = timers.advance(1.0);
        assert_eq!(fired, 3);
        assert_eq!(count.get(), 3);

        // Backlog was dropped, so a short frame does not fire again
        timers.advance(0.001);
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn cancel_removes_only_target() {
        let mut timers = TimerManager::new();
        let a = Rc::new(Cell::new(0));
        let b = Rc::new(Cell::new(0));
        let ha = timers.schedule(
            Duration::from_millis(10),
            true,
            counter_callback(&a, TickControl::Continue),
        );
        let hb = timers.schedule(
            Duration::from_millis(10),
            true,
            counter_callback(&b, TickControl::Continue),
        );

        assert!(timers.cancel(ha));
        assert!(!timers.cancel(ha));
        timers.advance(0.01);
        assert_eq!(a.get(), 0);
        assert_eq!(b.get(), 1);
        assert!(timers.is_scheduled(hb));
    }

    #[test]
    fn zero_interval_fires_once_per_advance() {
        let mut timers = TimerManager::new();
        let count = Rc::new(Cell::new(0));
        timers.schedule(
            Duration::ZERO,
            true,
            counter_callback(&count, TickControl::Continue),
        );

        timers.advance(0.0);
        timers.advance(0.0);
        assert_eq!(count.get(), 2);
    }
}
