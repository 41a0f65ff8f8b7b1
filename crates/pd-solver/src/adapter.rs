//! Runs a blocking [`Solver`] as a cancellable, restartable asynchronous
//! computation on the shared pool.
//!
//! # Lifecycle of one submission
//!
//! ```text
//! problem_changed(s) ── cancel previous ──► spawn job(s) on pool
//!                                                │
//!          ┌─────────────────────────────────────┤
//!          ▼                                     ▼
//!   cancel() while running               job resolves while current
//!   token tripped, done_for_now(s)       Ok  → update_schedule, done_for_now
//!   job result later discarded           Cancelled → done_for_now
//!                                        other → report_failure, done_for_now
//! ```
//!
//! Exactly one `done_for_now` is issued per submission: either by `cancel` or
//! by the job, whichever takes the in-flight slot first.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use pd_core::{Snapshot, SnapshotId};
use pd_pool::panic_message;
use tracing::{debug, warn};

use crate::{CancelToken, RealtimeSolver, Scheduler, Solver, SolverError};

/// The computation currently owned by an adapter.
struct InFlight {
    snapshot: SnapshotId,
    token:    CancelToken,
}

type Slot = Arc<Mutex<Option<InFlight>>>;

/// Asynchronous wrapper around a blocking [`Solver`].
pub struct BatchAdapter {
    solver:    Arc<dyn Solver>,
    scheduler: Option<Arc<dyn Scheduler>>,
    in_flight: Slot,
}

impl BatchAdapter {
    pub fn new<S: Solver>(solver: S) -> Self {
        Self {
            solver:    Arc::new(solver),
            scheduler: None,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn init(&mut self, scheduler: Arc<dyn Scheduler>) {
        if self.scheduler.is_some() {
            warn!("batch adapter initialised twice; keeping the first scheduler");
            return;
        }
        self.scheduler = Some(scheduler);
    }

    /// Cancel whatever is running and start solving `snapshot`.
    pub fn problem_changed(&mut self, snapshot: Arc<Snapshot>) {
        let Some(scheduler) = self.scheduler.clone() else {
            warn!(snapshot = %snapshot.id, "problem submitted before init; ignored");
            return;
        };
        self.cancel();

        let id = snapshot.id;
        let token = CancelToken::new();
        *self.in_flight.lock() = Some(InFlight { snapshot: id, token: token.clone() });

        let job = Computation {
            solver:    Arc::clone(&self.solver),
            scheduler: Arc::clone(&scheduler),
            in_flight: Arc::clone(&self.in_flight),
            snapshot,
            token,
        };
        if let Err(e) = scheduler.pool().spawn(move || job.run()) {
            self.in_flight.lock().take();
            scheduler.report_failure(SolverError::AdapterStart(e));
            scheduler.done_for_now(id);
        }
    }

    /// Trip the running computation's token and report it done.  No-op when
    /// idle.
    pub fn cancel(&mut self) {
        let Some(flight) = self.in_flight.lock().take() else {
            return;
        };
        flight.token.cancel();
        debug!(snapshot = %flight.snapshot, "computation cancelled");
        if let Some(scheduler) = &self.scheduler {
            scheduler.done_for_now(flight.snapshot);
        }
    }

    pub fn is_computing(&self) -> bool {
        self.in_flight.lock().is_some()
    }
}

impl RealtimeSolver for BatchAdapter {
    fn init(&mut self, scheduler: Arc<dyn Scheduler>) {
        BatchAdapter::init(self, scheduler);
    }

    fn problem_changed(&mut self, snapshot: Arc<Snapshot>) {
        BatchAdapter::problem_changed(self, snapshot);
    }

    fn cancel(&mut self) {
        BatchAdapter::cancel(self);
    }

    fn is_computing(&self) -> bool {
        BatchAdapter::is_computing(self)
    }
}

impl Drop for BatchAdapter {
    fn drop(&mut self) {
        if let Some(flight) = self.in_flight.lock().take() {
            flight.token.cancel();
        }
    }
}

// ── Computation ───────────────────────────────────────────────────────────────

/// Everything a pool thread needs to run one submission.
struct Computation {
    solver:    Arc<dyn Solver>,
    scheduler: Arc<dyn Scheduler>,
    in_flight: Slot,
    snapshot:  Arc<Snapshot>,
    token:     CancelToken,
}

impl Computation {
    fn run(self) {
        let id = self.snapshot.id;
        let outcome = if self.token.is_cancelled() {
            Err(SolverError::Cancelled)
        } else {
            catch_unwind(AssertUnwindSafe(|| self.solver.solve(&self.snapshot, &self.token)))
                .unwrap_or_else(|payload| Err(SolverError::Panicked(panic_message(payload.as_ref()))))
        };

        if !self.resolve() {
            debug!(snapshot = %id, "discarding result of superseded computation");
            return;
        }

        match outcome {
            Ok(schedule) if schedule.len() != self.snapshot.vehicles.len() => {
                self.scheduler.report_failure(SolverError::VehicleCountMismatch {
                    expected: self.snapshot.vehicles.len(),
                    got:      schedule.len(),
                });
            }
            Ok(schedule) => self.scheduler.update_schedule(&self.snapshot, schedule),
            Err(e) if e.is_cancellation() => debug!(snapshot = %id, "solver stopped on cancellation"),
            Err(e) => self.scheduler.report_failure(e),
        }
        self.scheduler.done_for_now(id);
    }

    /// Take the in-flight slot if this computation still owns it.
    fn resolve(&self) -> bool {
        let mut slot = self.in_flight.lock();
        let owned = slot
            .as_ref()
            .is_some_and(|f| f.snapshot == self.snapshot.id && !self.token.is_cancelled());
        if owned {
            *slot = None;
        }
        owned
    }
}
