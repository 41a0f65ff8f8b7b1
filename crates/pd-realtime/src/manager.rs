//! The simulation-wide coordination manager.
//!
//! # Clock-mode control
//!
//! | Event                          | Action                                          |
//! |--------------------------------|-------------------------------------------------|
//! | `notify_new_work`              | request REAL_TIME, reset the idle count         |
//! | START                          | mark the step busy; REAL_TIME if set was empty  |
//! | DONE, computing set now empty  | cancel stragglers, wake `wait_quiescent`        |
//! | `after_step`, quiet            | idle count + 1; at 2 request SIMULATED once     |
//!
//! A step is quiet when nothing is computing at its end and no computation
//! started during it.  The second consecutive quiet step switches the clock
//! back to simulated time, provided it is in real time and still advancing.
//!
//! # Failures
//!
//! Failures reported from pool threads are queued.  `after_step` (and
//! `finish`) shut everything down and return the first one as
//! [`RealtimeError::Solver`].  Cancellations never enter the queue.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use pd_core::{BridgeId, ClockMode, ConsumerMode, RealtimeConfig, SnapshotId};
use pd_pool::{Affinity, PanicHook, PoolSpec, SolverPool};
use pd_solver::{RealtimeSolver, SolverError};
use tracing::{debug, error, info, warn};

use crate::{BridgeListener, RealtimeClock, RealtimeError, RealtimeResult, SolverBridge};

// ── Failure queue ─────────────────────────────────────────────────────────────

/// Failures waiting to be re-raised on the simulation thread.
#[derive(Default)]
struct FailureQueue {
    queue: Mutex<VecDeque<SolverError>>,
}

impl FailureQueue {
    fn push(&self, error: SolverError) {
        self.queue.lock().push_back(error);
    }

    fn pop(&self) -> Option<SolverError> {
        self.queue.lock().pop_front()
    }

    fn len(&self) -> usize {
        self.queue.lock().len()
    }
}

/// Debounce state, advanced once per step by `after_step`.
#[derive(Default)]
struct StepState {
    idle_steps:          u32,
    simulated_requested: bool,
    /// A computation started since the last `after_step`.
    started:             bool,
}

impl StepState {
    fn reset(&mut self) {
        self.idle_steps = 0;
        self.simulated_requested = false;
    }
}

/// Quiet steps in a row after which the clock may go back to simulated time.
const QUIET_STEPS: u32 = 2;

// ── CoordinationManager ───────────────────────────────────────────────────────

/// Tracks every bridge of a run, decides the clock mode and owns the shared
/// solver pool.
pub struct CoordinationManager {
    config:    RealtimeConfig,
    clock:     Arc<dyn RealtimeClock>,
    pool:      SolverPool,
    bridges:   Mutex<Vec<Weak<SolverBridge>>>,
    computing: Mutex<BTreeSet<BridgeId>>,
    quiet:     Condvar,
    failures:  Arc<FailureQueue>,
    steps:     Mutex<StepState>,
    shut_down: AtomicBool,
    next_bridge:   AtomicU32,
    next_snapshot: AtomicU64,
}

impl CoordinationManager {
    /// Validate `config` and build the shared pool.
    pub fn new(
        config:   RealtimeConfig,
        clock:    Arc<dyn RealtimeClock>,
        affinity: Arc<dyn Affinity>,
    ) -> RealtimeResult<Arc<Self>> {
        config.validate()?;

        let failures = Arc::new(FailureQueue::default());
        let hook: PanicHook = {
            let failures = Arc::clone(&failures);
            Arc::new(move |msg: String| {
                error!(panic = %msg, "solver thread panicked");
                failures.push(SolverError::Panicked(msg));
            })
        };
        let spec = PoolSpec::new(config.resolved_pool_size(), config.grouped_threads);
        let pool = SolverPool::build(spec, affinity, Some(hook))?;
        info!(
            mode = ?config.mode,
            threads = spec.size,
            grouped = spec.grouped,
            "coordination manager started"
        );

        Ok(Arc::new(Self {
            config,
            clock,
            pool,
            bridges: Mutex::new(Vec::new()),
            computing: Mutex::new(BTreeSet::new()),
            quiet: Condvar::new(),
            failures,
            steps: Mutex::new(StepState::default()),
            shut_down: AtomicBool::new(false),
            next_bridge: AtomicU32::new(0),
            next_snapshot: AtomicU64::new(1),
        }))
    }

    #[inline]
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// The shared solver pool.
    pub fn pool(&self) -> SolverPool {
        self.pool.clone()
    }

    pub fn clock(&self) -> &Arc<dyn RealtimeClock> {
        &self.clock
    }

    // ── Registration ──────────────────────────────────────────────────────

    pub(crate) fn next_bridge_id(&self) -> BridgeId {
        BridgeId(self.next_bridge.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn next_snapshot_id(&self) -> SnapshotId {
        SnapshotId(self.next_snapshot.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn register(&self, bridge: &Arc<SolverBridge>) -> RealtimeResult<()> {
        if self.is_shut_down() {
            return Err(RealtimeError::ShutDown);
        }
        let mut bridges = self.bridges.lock();
        bridges.retain(|b| b.strong_count() > 0);
        if self.config.mode == ConsumerMode::Single && !bridges.is_empty() {
            return Err(RealtimeError::Config(
                "single consumer mode allows only one solver bridge".into(),
            ));
        }
        bridges.push(Arc::downgrade(bridge));
        Ok(())
    }

    /// Live bridges.
    pub fn bridges(&self) -> Vec<Arc<SolverBridge>> {
        self.bridges.lock().iter().filter_map(Weak::upgrade).collect()
    }

    // ── Clock-mode control ────────────────────────────────────────────────

    /// New work arrived in the domain (e.g. a parcel was announced).
    pub fn notify_new_work(&self) {
        self.steps.lock().reset();
        if self.clock.mode() != ClockMode::RealTime {
            debug!("new work; requesting real time");
        }
        self.clock.request_real_time();
    }

    /// `true` while any bridge is between START and DONE.
    pub fn is_computing(&self) -> bool {
        !self.computing.lock().is_empty()
    }

    pub fn computing_count(&self) -> usize {
        self.computing.lock().len()
    }

    /// End-of-step hook; call once per simulation step on the simulation
    /// thread.
    ///
    /// Re-raises the first queued failure after shutting down.  Otherwise
    /// advances the quiescence debounce and requests simulated time at the
    /// end of the second quiet step.
    pub fn after_step(&self) -> RealtimeResult<()> {
        self.raise_failure()?;
        if self.is_shut_down() {
            return Ok(());
        }

        let idle = self.computing.lock().is_empty();
        let mut steps = self.steps.lock();
        let started = std::mem::take(&mut steps.started);
        if !idle || started {
            steps.reset();
            return Ok(());
        }
        steps.idle_steps = steps.idle_steps.saturating_add(1);
        if steps.idle_steps >= QUIET_STEPS
            && !steps.simulated_requested
            && self.clock.mode() == ClockMode::RealTime
            && self.clock.is_advancing()
        {
            steps.simulated_requested = true;
            drop(steps);
            info!("solvers quiescent; switching to simulated time");
            self.clock.request_simulated();
        }
        Ok(())
    }

    /// Block until nothing is computing or `deadline` passes.  `true` if
    /// quiescent on return.
    ///
    /// This is a bounded wait, not a poll: the calling thread sleeps for up
    /// to `deadline`.  The stepping loop only calls it in real time with a
    /// deadline inside the current tick, where pacing would sleep out the
    /// rest of the tick anyway, so the step never runs longer than it would
    /// without the wait.
    pub fn wait_quiescent(&self, deadline: Instant) -> bool {
        let mut computing = self.computing.lock();
        while !computing.is_empty() {
            if self.quiet.wait_until(&mut computing, deadline).timed_out() {
                return computing.is_empty();
            }
        }
        true
    }

    /// Cancel computations of bridges outside the computing set.
    ///
    /// Bridges whose solver is busy (held by a submission in progress) are
    /// skipped rather than waited for.
    fn cancel_stragglers(&self, except: BridgeId) {
        for bridge in self.bridges() {
            if bridge.id() == except {
                continue;
            }
            let Some(mut solver) = bridge.solver.try_lock() else {
                continue;
            };
            if solver.is_computing() && !self.computing.lock().contains(&bridge.id()) {
                debug!(bridge = %bridge.id(), "cancelling straggling computation");
                solver.cancel();
            }
        }
    }

    // ── Failures ──────────────────────────────────────────────────────────

    /// Queue a failure raised on a pool thread.  Cancellations are dropped.
    pub fn report_failure(&self, bridge: BridgeId, failure: SolverError) {
        if failure.is_cancellation() {
            debug!(bridge = %bridge, "ignoring cancellation reported as failure");
            return;
        }
        error!(bridge = %bridge, error = %failure, "solver failure");
        self.failures.push(failure);
    }

    /// Queued failures not yet re-raised.
    pub fn pending_failures(&self) -> usize {
        self.failures.len()
    }

    fn raise_failure(&self) -> RealtimeResult<()> {
        match self.failures.pop() {
            Some(failure) => {
                self.shutdown();
                Err(RealtimeError::Solver(failure))
            }
            None => Ok(()),
        }
    }

    // ── Shutdown ──────────────────────────────────────────────────────────

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Cancel every bridge and shut the pool down, waiting up to the
    /// configured grace period.  Idempotent.
    ///
    /// Returns `false` if pool threads were still running when the grace
    /// period ran out.
    pub fn shutdown(&self) -> bool {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return self.pool.live_workers() == 0;
        }
        let bridges = self.bridges();
        info!(bridges = bridges.len(), "shutting down solver coordination");
        for bridge in &bridges {
            bridge.cancel();
        }
        let terminated = self.pool.shutdown(self.config.shutdown_grace());
        if !terminated {
            warn!("continuing without waiting for solver threads");
        }
        self.quiet.notify_all();
        terminated
    }

    /// Shut down and re-raise the first failure that was still queued.
    pub fn finish(&self) -> RealtimeResult<()> {
        self.shutdown();
        self.raise_failure()
    }
}

impl BridgeListener for CoordinationManager {
    fn on_start_computing(&self, bridge: BridgeId) {
        let was_empty = {
            let mut computing = self.computing.lock();
            let was_empty = computing.is_empty();
            computing.insert(bridge);
            was_empty
        };
        {
            let mut steps = self.steps.lock();
            steps.reset();
            steps.started = true;
        }
        if was_empty {
            self.clock.request_real_time();
        }
    }

    fn on_done_computing(&self, bridge: BridgeId) {
        let now_empty = {
            let mut computing = self.computing.lock();
            computing.remove(&bridge);
            computing.is_empty()
        };
        if !now_empty {
            return;
        }
        self.cancel_stragglers(bridge);
        if self.computing.lock().is_empty() {
            self.quiet.notify_all();
        }
    }
}

impl std::fmt::Debug for CoordinationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinationManager")
            .field("mode", &self.config.mode)
            .field("computing", &*self.computing.lock())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
