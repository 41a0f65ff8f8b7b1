//! Simulation time model.
//!
//! Time is a monotonically increasing `Tick` counter.  Each tick stands for a
//! fixed `tick_length` of wall-clock time; whether a tick actually *takes* that
//! long depends on the [`ClockMode`]:
//!
//! - `Simulated`: ticks are processed as fast as the machine allows.
//! - `RealTime`: each tick is paced to `tick_length` of wall time so that
//!   solvers running on other threads see the simulation advance at the same
//!   rate as the real world.

use std::fmt;
use std::time::Duration;

// ── Tick ─────────────────────────────────────────────────────────────────────

/// An absolute simulation tick counter.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    /// Return the tick `n` steps after `self`.
    #[inline]
    pub fn offset(self, n: u64) -> Tick {
        Tick(self.0 + n)
    }
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    #[inline]
    fn add(self, rhs: u64) -> Tick {
        Tick(self.0 + rhs)
    }
}

impl std::ops::Sub for Tick {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: Tick) -> u64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ── ClockMode ─────────────────────────────────────────────────────────────────

/// How the simulation clock relates to wall-clock time.
///
/// Owned by the clock; the coordination layer only *requests* transitions.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClockMode {
    /// Fast-forward: no wall-clock pacing.
    #[default]
    Simulated,
    /// Each tick lasts `tick_length` of wall time.
    RealTime,
}

impl fmt::Display for ClockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockMode::Simulated => f.write_str("simulated"),
            ClockMode::RealTime  => f.write_str("real-time"),
        }
    }
}

// ── SimClock ──────────────────────────────────────────────────────────────────

/// Tracks the current tick and converts tick counts to durations.
#[derive(Clone, Debug)]
pub struct SimClock {
    /// Wall-clock length of one tick.
    pub tick_length: Duration,
    /// The current tick, advanced by `SimClock::advance()` each step.
    pub current_tick: Tick,
}

impl SimClock {
    pub fn new(tick_length: Duration) -> Self {
        Self { tick_length, current_tick: Tick::ZERO }
    }

    /// Advance the clock by one tick.
    #[inline]
    pub fn advance(&mut self) {
        self.current_tick = Tick(self.current_tick.0 + 1);
    }

    /// Simulated time elapsed since tick 0.
    pub fn elapsed(&self) -> Duration {
        self.tick_length.saturating_mul(self.current_tick.0.min(u32::MAX as u64) as u32)
    }

    /// Half of one tick: the settle window granted to fast solvers after a
    /// submission.
    #[inline]
    pub fn half_tick(&self) -> Duration {
        self.tick_length / 2
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} ms elapsed)", self.current_tick, self.elapsed().as_millis())
    }
}
