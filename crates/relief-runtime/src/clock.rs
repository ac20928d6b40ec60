//! Frame clock measuring wall time between frames

use std::time::Instant;

/// Longest frame delta reported, in seconds
const MAX_FRAME_DELTA: f64 = 0.25;

/// Tracks elapsed time between frames for driving a `TimerManager`
pub struct FrameClock {
    /// Total elapsed time in seconds
    pub total_time: f64,
    /// Time since last frame in seconds
    pub delta_time: f64,
    /// Number of ticks so far
    pub frame_count: u64,
    last_instant: Instant,
    first_tick: bool,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self {
            total_time: 0.0,
            delta_time: 0.0,
            frame_count: 0,
            last_instant: Instant::now(),
            first_tick: true,
        }
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock. Call once per frame; returns the new delta.
    pub fn tick(&mut self) -> f64 {
        let now = Instant::now();
        self.frame_count += 1;

        if self.first_tick {
            self.first_tick = false;
            self.last_instant = now;
            self.delta_time = 0.0;
            return 0.0;
        }

        let elapsed = now.duration_since(self.last_instant).as_secs_f64();
        self.last_instant = now;

        // Clamp so a stalled frame does not flood timers
        self.delta_time = elapsed.min(MAX_FRAME_DELTA);
        self.total_time += self.delta_time;
        self.delta_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_defaults() {
        let clock = FrameClock::new();
        assert_eq!(clock.total_time, 0.0);
        assert_eq!(clock.delta_time, 0.0);
        assert_eq!(clock.frame_count, 0);
    }

    #[test]
    fn test_first_tick_zero_delta() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.tick(), 0.0);
        assert_eq!(clock.frame_count, 1);
    }

    #[test]
    fn test_delta_is_clamped() {
        let mut clock = FrameClock::new();
        clock.tick();
        clock.last_instant = Instant::now() - std::time::Duration::from_secs(2);
        let dt = clock.tick();
        assert!((dt - MAX_FRAME_DELTA).abs() < 1e-9);
        assert!((clock.total_time - MAX_FRAME_DELTA).abs() < 1e-9);
    }
}
