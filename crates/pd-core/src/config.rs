//! Run configuration.
//!
//! Typically loaded from a TOML/JSON file by the application crate (enable the
//! `serde` feature) and passed to the coordination manager and the simulation
//! runner.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use crate::{PdError, PdResult};

// ── PoolSize ──────────────────────────────────────────────────────────────────

/// Size of the shared solver worker pool.
///
/// Parses from `"auto"` or a positive integer.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "String", try_from = "String"))]
pub enum PoolSize {
    /// 2 threads in single-consumer mode, one per available core in
    /// multi-consumer mode.
    #[default]
    Auto,
    Fixed(NonZeroUsize),
}

impl FromStr for PoolSize {
    type Err = PdError;

    fn from_str(s: &str) -> PdResult<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(PoolSize::Auto);
        }
        s.parse::<NonZeroUsize>()
            .map(PoolSize::Fixed)
            .map_err(|_| PdError::Parse(format!("pool size must be \"auto\" or a positive integer, got {s:?}")))
    }
}

impl fmt::Display for PoolSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolSize::Auto     => f.write_str("auto"),
            PoolSize::Fixed(n) => write!(f, "{n}"),
        }
    }
}

impl From<PoolSize> for String {
    fn from(size: PoolSize) -> String {
        size.to_string()
    }
}

impl TryFrom<String> for PoolSize {
    type Error = PdError;
    fn try_from(s: String) -> PdResult<Self> {
        s.parse()
    }
}

// ── ConsumerMode ──────────────────────────────────────────────────────────────

/// How many solver consumers (bridges) a run may have.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConsumerMode {
    /// Exactly one bridge, typically a central planner for the whole fleet.
    #[default]
    Single,
    /// Any number of bridges, e.g. one per vehicle.
    Multi,
}

// ── RealtimeConfig ────────────────────────────────────────────────────────────

/// Configuration of the real-time solver coordination layer.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RealtimeConfig {
    pub mode: ConsumerMode,

    /// Worker threads in the shared solver pool.
    pub pool_size: PoolSize,

    /// Pin every solver thread to one shared core instead of one core each.
    pub grouped_threads: bool,

    /// After a submission, give the solver up to half a tick to finish within
    /// the same step.
    pub sleep_on_change: bool,

    /// How long shutdown waits for pool threads before giving up on them.
    pub shutdown_grace_ms: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self::single()
    }
}

impl RealtimeConfig {
    /// One consumer; two ungrouped solver threads, each pinned to its own
    /// least-used core.
    pub fn single() -> Self {
        Self {
            mode:              ConsumerMode::Single,
            pool_size:         PoolSize::Auto,
            grouped_threads:   false,
            sleep_on_change:   false,
            shutdown_grace_ms: 5_000,
        }
    }

    /// Many consumers sharing a pool sized to the machine.
    pub fn multi() -> Self {
        Self { mode: ConsumerMode::Multi, ..Self::single() }
    }

    pub fn with_pool_size(mut self, size: PoolSize) -> Self {
        self.pool_size = size;
        self
    }

    pub fn with_grouped_threads(mut self, grouped: bool) -> Self {
        self.grouped_threads = grouped;
        self
    }

    pub fn with_sleep_on_change(mut self, sleep: bool) -> Self {
        self.sleep_on_change = sleep;
        self
    }

    /// Resolve `pool_size` against the consumer mode and the host.
    pub fn resolved_pool_size(&self) -> usize {
        match (self.pool_size, self.mode) {
            (PoolSize::Fixed(n), _)               => n.get(),
            (PoolSize::Auto, ConsumerMode::Single) => 2,
            (PoolSize::Auto, ConsumerMode::Multi)  => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(2),
        }
    }

    #[inline]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn validate(&self) -> PdResult<()> {
        if self.shutdown_grace_ms == 0 {
            return Err(PdError::Config("shutdown_grace_ms must be at least 1".into()));
        }
        Ok(())
    }
}

// ── SimConfig ─────────────────────────────────────────────────────────────────

/// Configuration of the stepping harness.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimConfig {
    /// Wall-clock milliseconds per tick in real-time mode.
    pub tick_length_ms: u64,

    /// Total ticks to simulate.
    pub total_ticks: u64,

    /// Master seed for any randomness the application adds.
    pub seed: u64,
}

impl SimConfig {
    #[inline]
    pub fn tick_length(&self) -> Duration {
        Duration::from_millis(self.tick_length_ms)
    }

    /// The tick at which the simulation ends (exclusive upper bound).
    #[inline]
    pub fn end_tick(&self) -> crate::Tick {
        crate::Tick(self.total_ticks)
    }

    /// Construct a `SimClock` pre-configured for this run.
    pub fn make_clock(&self) -> crate::SimClock {
        crate::SimClock::new(self.tick_length())
    }

    pub fn validate(&self) -> PdResult<()> {
        if self.tick_length_ms == 0 {
            return Err(PdError::Config("tick_length_ms must be at least 1".into()));
        }
        Ok(())
    }
}
