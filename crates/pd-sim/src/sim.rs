//! The `Sim` struct and its stepping loop.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use pd_core::{ClockMode, ParcelId, SimClock, SimConfig, Tick};
use pd_realtime::{CoordinationManager, RealtimeClock};
use tracing::{debug, info, warn};

use crate::{ArrivalQueue, Fleet, SimObserver, SimResult, StepClock, TickContext, TickListener};

/// The stepping loop around a coordination manager.
///
/// One step at tick `t`:
///
/// 1. **Arrivals**: parcels announced at `t` join the fleet; any arrival
///    notifies the manager (→ real time).
/// 2. **Tick**: every listener's `tick` runs; consumers submit work here.
/// 3. **Settle** (only with `sleep_on_change`, in real time, after a
///    submission): wait until the solvers go quiet or half a tick has
///    passed since the step started.
/// 4. **After tick**: every listener's `after_tick`; consumers apply
///    schedules here.
/// 5. **Coordination**: `manager.after_step()` re-raises worker failures and
///    runs the quiescence debounce.
/// 6. **Pacing**: in real time the step is stretched to one tick length of
///    wall time.
///
/// Create via [`SimBuilder`][crate::SimBuilder].
pub struct Sim {
    pub config: SimConfig,

    /// Current tick and tick length.
    pub clock: SimClock,

    pub fleet: Fleet,

    /// Parcels not announced yet.
    pub arrivals: ArrivalQueue,

    pub(crate) step_clock:      Arc<StepClock>,
    pub(crate) manager:         Arc<CoordinationManager>,
    pub(crate) listeners:       Vec<Box<dyn TickListener>>,
    pub(crate) sleep_on_change: bool,
}

impl Sim {
    // ── Public API ────────────────────────────────────────────────────────

    pub fn manager(&self) -> &Arc<CoordinationManager> {
        &self.manager
    }

    pub fn mode(&self) -> ClockMode {
        self.step_clock.mode()
    }

    #[inline]
    pub fn current_tick(&self) -> Tick {
        self.clock.current_tick
    }

    pub fn add_listener(&mut self, listener: impl TickListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Run from the current tick to `config.end_tick()`, then shut the
    /// coordination layer down.
    ///
    /// A failure on a solver thread ends the run with that failure once the
    /// pool has been shut down.
    pub fn run<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<()> {
        info!(ticks = self.config.total_ticks, vehicles = self.fleet.vehicle_count(), "simulation started");
        observer.on_run_start(self.clock.current_tick, self.mode());
        while self.clock.current_tick < self.config.end_tick() {
            if let Err(e) = self.step(observer) {
                self.abort();
                return Err(e);
            }
        }
        observer.on_sim_end(self.clock.current_tick);
        self.finish()
    }

    /// Run exactly `n` steps from the current position (ignores `end_tick`).
    ///
    /// The coordination layer stays up; call [`finish`][Self::finish] when
    /// done.
    pub fn run_ticks<O: SimObserver>(&mut self, n: u64, observer: &mut O) -> SimResult<()> {
        observer.on_run_start(self.clock.current_tick, self.mode());
        for _ in 0..n {
            if let Err(e) = self.step(observer) {
                self.abort();
                return Err(e);
            }
        }
        Ok(())
    }

    /// Stop the clock, shut the coordination layer down and re-raise any
    /// failure still queued.
    pub fn finish(&mut self) -> SimResult<()> {
        self.step_clock.stop();
        self.manager.finish()?;
        info!(
            tick = %self.clock.current_tick,
            delivered = self.fleet.delivered().len(),
            open = self.fleet.open_count(),
            "simulation finished"
        );
        Ok(())
    }

    fn abort(&mut self) {
        warn!(tick = %self.clock.current_tick, "simulation aborted");
        self.step_clock.stop();
        self.manager.shutdown();
    }

    // ── Step processing ───────────────────────────────────────────────────

    /// Process one step and advance the clock.
    pub fn step<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<()> {
        let now = self.clock.current_tick;
        let started = Instant::now();
        let mode_before = self.step_clock.mode();
        observer.on_tick_start(now);
        self.fleet.set_tick(now);

        // ── Arrivals ──────────────────────────────────────────────────────
        let arrived: Vec<ParcelId> = match self.arrivals.drain_tick(now) {
            None        => Vec::new(),
            Some(specs) => specs
                .into_iter()
                .map(|spec| {
                    let id = spec.id;
                    self.fleet.announce(spec);
                    id
                })
                .collect(),
        };
        if !arrived.is_empty() {
            debug!(tick = %now, count = arrived.len(), "parcels announced");
            self.manager.notify_new_work();
        }

        // ── Listeners ─────────────────────────────────────────────────────
        let mut ctx = TickContext::new(now, &mut self.fleet, &self.manager, &arrived);
        for listener in &mut self.listeners {
            listener.tick(&mut ctx)?;
        }
        if ctx.submitted() && self.sleep_on_change && self.step_clock.mode() == ClockMode::RealTime {
            let settled = self.manager.wait_quiescent(started + self.clock.half_tick());
            debug!(tick = %now, settled, "settle window over");
        }
        for listener in &mut self.listeners {
            listener.after_tick(&mut ctx)?;
        }

        // ── Coordination ──────────────────────────────────────────────────
        self.manager.after_step()?;

        let mode = self.step_clock.mode();
        if mode != mode_before {
            info!(tick = %now, %mode, "clock mode changed");
            observer.on_clock_mode(now, mode);
        }
        observer.on_tick_end(now, arrived.len());

        // ── Pacing ────────────────────────────────────────────────────────
        if mode == ClockMode::RealTime {
            let deadline = started + self.clock.tick_length;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            }
        }
        self.clock.advance();
        Ok(())
    }
}
