//! Simulation observer trait for progress reporting.

use pd_core::{ClockMode, Tick};

/// Callbacks invoked by [`Sim::run`][crate::Sim::run] at key points of the
/// stepping loop.
///
/// All methods have default no-op implementations.
pub trait SimObserver {
    /// Called when `run` or `run_ticks` begins, with the clock mode the run
    /// starts in.
    fn on_run_start(&mut self, _tick: Tick, _mode: ClockMode) {}

    /// Called at the very start of each step, before arrivals.
    fn on_tick_start(&mut self, _tick: Tick) {}

    /// Called at the end of each step.  `arrivals` is the number of parcels
    /// announced this tick.
    fn on_tick_end(&mut self, _tick: Tick, _arrivals: usize) {}

    /// The clock switched to `mode` during the step at `tick`.
    fn on_clock_mode(&mut self, _tick: Tick, _mode: ClockMode) {}

    /// Called once after the final step.
    fn on_sim_end(&mut self, _final_tick: Tick) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}

/// Records every clock-mode transition.
///
/// Step counts follow the mode reported by
/// [`on_run_start`][SimObserver::on_run_start], so runs built with
/// `SimBuilder::initial_mode` are bucketed correctly from the first step.
#[derive(Default, Debug)]
pub struct ModeLog {
    pub transitions: Vec<(Tick, ClockMode)>,
    /// Steps spent in each mode, `[simulated, real-time]`.
    pub steps: [u64; 2],
    mode: ClockMode,
}

impl ModeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticks at which the clock switched to `mode`.
    pub fn switches_to(&self, mode: ClockMode) -> Vec<Tick> {
        self.transitions.iter().filter(|(_, m)| *m == mode).map(|(t, _)| *t).collect()
    }
}

impl SimObserver for ModeLog {
    fn on_run_start(&mut self, _tick: Tick, mode: ClockMode) {
        self.mode = mode;
    }

    fn on_tick_end(&mut self, _tick: Tick, _arrivals: usize) {
        match self.mode {
            ClockMode::Simulated => self.steps[0] += 1,
            ClockMode::RealTime  => self.steps[1] += 1,
        }
    }

    fn on_clock_mode(&mut self, tick: Tick, mode: ClockMode) {
        self.transitions.push((tick, mode));
        self.mode = mode;
    }
}
