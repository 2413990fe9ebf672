//! High-resolution timing for frame pacing and input throttling.

use std::time::{Duration, Instant};

/// Monotonic stopwatch over [`Instant`].
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
}

impl Timer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
        }
    }

    /// Time since construction (or the last [`reset`](Self::reset)).
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// [`elapsed`](Self::elapsed) as fractional seconds.
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Time since the previous `tick`, i.e. the frame's delta time.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        delta
    }

    /// [`tick`](Self::tick) as fractional seconds.
    pub fn delta_secs(&mut self) -> f32 {
        self.tick().as_secs_f32()
    }

    /// Restarts the stopwatch from now.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last_tick = now;
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimum-interval predicate over a monotonic clock.
///
/// A `RateGate` answers "has at least `interval` elapsed since the last time
/// this gate fired?" and, when it has, records the firing. The same primitive
/// drives frame capping (render this tick at all?) and per-key repeat
/// throttling while a key is held.
#[derive(Debug, Clone, Copy)]
pub struct RateGate {
    interval: Duration,
    last_fired: Option<Instant>,
}

impl RateGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fired: None,
        }
    }

    /// Convenience constructor taking the interval in milliseconds.
    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// Returns true and arms the gate if the interval has elapsed since the
    /// last firing. The first call always fires.
    pub fn try_fire(&mut self) -> bool {
        self.try_fire_at(Instant::now())
    }

    /// Same as [`try_fire`](Self::try_fire) with an explicit clock reading.
    pub fn try_fire_at(&mut self, now: Instant) -> bool {
        match self.last_fired {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_fired = Some(now);
                true
            }
        }
    }

    /// Clear the gate so the next check fires unconditionally.
    pub fn reset(&mut self) {
        self.last_fired = None;
    }

    /// The configured minimum interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_elapsed_is_monotonic() {
        let timer = Timer::new();
        let a = timer.elapsed();
        let b = timer.elapsed();
        assert!(b >= a);
    }

    #[test]
    fn test_timer_tick_resets_delta() {
        let mut timer = Timer::new();
        std::thread::sleep(Duration::from_millis(5));
        let first = timer.tick();
        let second = timer.tick();
        assert!(first >= Duration::from_millis(5));
        assert!(second < first);
    }

    #[test]
    fn test_rate_gate_first_fire_is_free() {
        let mut gate = RateGate::from_millis(1000);
        assert!(gate.try_fire());
    }

    #[test]
    fn test_rate_gate_blocks_within_interval() {
        let mut gate = RateGate::from_millis(1000);
        let t0 = Instant::now();
        assert!(gate.try_fire_at(t0));
        assert!(!gate.try_fire_at(t0 + Duration::from_millis(500)));
        assert!(gate.try_fire_at(t0 + Duration::from_millis(1000)));
    }

    #[test]
    fn test_rate_gate_reset_rearms() {
        let t0 = Instant::now();
        let mut gate = RateGate::from_millis(1000);
        assert!(gate.try_fire_at(t0));
        gate.reset();
        assert!(gate.try_fire_at(t0 + Duration::from_millis(1)));
    }
}
