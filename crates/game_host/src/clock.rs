//! Tick-driven session timers.
//!
//! Time only moves when the tick loop says so: each tick the caller passes
//! the measured elapsed time of that tick to [`SessionClock::advance`], and
//! every running timer accumulates it. A host that stops ticking stops the
//! clock too, so a starved or paused process is never penalized for time it
//! could not observe.

use std::time::Duration;

/// The named timers a session tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Timer {
    /// Time spent waiting for the first player after activation.
    WaitForPlayers,
    /// Time spent with the game running.
    SessionDuration,
}

impl Timer {
    const COUNT: usize = 2;

    fn index(self) -> usize {
        match self {
            Timer::WaitForPlayers => 0,
            Timer::SessionDuration => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Counter {
    elapsed: Duration,
    running: bool,
}

/// Accumulating timers advanced once per server tick.
#[derive(Clone, Debug, Default)]
pub struct SessionClock {
    counters: [Counter; Timer::COUNT],
}

impl SessionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one tick's measured `delta` to every running timer.
    pub fn advance(&mut self, delta: Duration) {
        for counter in self.counters.iter_mut().filter(|c| c.running) {
            counter.elapsed = counter.elapsed.saturating_add(delta);
        }
    }

    /// Let `timer` accumulate on subsequent advances.
    pub fn start(&mut self, timer: Timer) {
        self.counters[timer.index()].running = true;
    }

    /// Freeze `timer` at its current value.
    pub fn stop(&mut self, timer: Timer) {
        self.counters[timer.index()].running = false;
    }

    /// Zero `timer` without changing whether it is running.
    pub fn reset(&mut self, timer: Timer) {
        self.counters[timer.index()].elapsed = Duration::ZERO;
    }

    pub fn elapsed(&self, timer: Timer) -> Duration {
        self.counters[timer.index()].elapsed
    }

    pub fn is_running(&self, timer: Timer) -> bool {
        self.counters[timer.index()].running
    }

    /// Whether `timer` is strictly past `threshold`.
    ///
    /// Exactly reaching the threshold does not count as expired.
    pub fn has_exceeded(&self, timer: Timer, threshold: Duration) -> bool {
        self.elapsed(timer) > threshold
    }
}
