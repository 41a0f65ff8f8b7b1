//! The per-consumer solver bridge.
//!
//! A [`SolverBridge`] owns one solver and exposes two halves:
//!
//! - to the consumer: [`solve`][SolverBridge::solve],
//!   [`current_schedule`][SolverBridge::current_schedule], the updated flag,
//!   [`cancel`][SolverBridge::cancel] and listener registration;
//! - to the solver: the [`Scheduler`] implementation it was initialised with.
//!
//! Every submission is stamped with a fresh [`SnapshotId`].  The solver side
//! reports against that id, and reports for anything but the submission in
//! flight are dropped.  This is what makes submissions on one bridge totally
//! ordered even though results arrive on arbitrary pool threads.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use pd_core::{BridgeId, Schedule, Snapshot, SnapshotId, SnapshotSource, SolveArgs};
use pd_pool::SolverPool;
use pd_solver::{RealtimeSolver, Scheduler, SolverError, SolverHandle};
use tracing::{debug, trace};

use crate::{BridgeListener, CoordinationManager, RealtimeError, RealtimeResult};

// ── Shared state ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct BridgeState {
    /// The most recently submitted snapshot.
    latest: Option<Arc<Snapshot>>,
    /// Submission between START and DONE, if any.
    computing: Option<SnapshotId>,
    /// Last published schedule and the snapshot it was computed against.
    schedule: Option<(Schedule, Arc<Snapshot>)>,
    updated: bool,
}

/// The part of a bridge the solver holds on to.
struct BridgeShared {
    id:        BridgeId,
    manager:   Arc<CoordinationManager>,
    state:     Mutex<BridgeState>,
    listeners: RwLock<Vec<Arc<dyn BridgeListener>>>,
}

impl BridgeShared {
    /// Clear `computing` if it is `snapshot`.  `true` if it was.
    fn release(&self, snapshot: SnapshotId) -> bool {
        let mut state = self.state.lock();
        if state.computing == Some(snapshot) {
            state.computing = None;
            true
        } else {
            false
        }
    }

    /// Call `f` on every listener without holding the listener lock.
    fn dispatch(&self, f: impl Fn(&dyn BridgeListener)) {
        let listeners = self.listeners.read().clone();
        for listener in &listeners {
            f(listener.as_ref());
        }
    }
}

impl Scheduler for BridgeShared {
    fn update_schedule(&self, snapshot: &Arc<Snapshot>, schedule: Schedule) {
        {
            let mut state = self.state.lock();
            if state.computing != Some(snapshot.id) {
                debug!(bridge = %self.id, snapshot = %snapshot.id, "ignoring schedule for stale snapshot");
                return;
            }
            state.schedule = Some((schedule.clone(), Arc::clone(snapshot)));
            state.updated = true;
        }
        trace!(bridge = %self.id, snapshot = %snapshot.id, "new schedule");
        self.dispatch(|l| l.on_new_schedule(self.id, &schedule, snapshot));
    }

    fn done_for_now(&self, snapshot: SnapshotId) {
        if self.release(snapshot) {
            self.dispatch(|l| l.on_done_computing(self.id));
        } else {
            trace!(bridge = %self.id, snapshot = %snapshot, "ignoring done for stale snapshot");
        }
    }

    fn report_failure(&self, error: SolverError) {
        self.manager.report_failure(self.id, error);
    }

    fn pool(&self) -> SolverPool {
        self.manager.pool()
    }
}

// ── SolverBridge ──────────────────────────────────────────────────────────────

/// One consumer's connection to one solver.
///
/// Created with [`SolverBridge::new`], which registers the bridge with the
/// manager and initialises the solver.
pub struct SolverBridge {
    shared: Arc<BridgeShared>,
    pub(crate) solver: Mutex<SolverHandle>,
}

impl SolverBridge {
    pub fn new(manager: &Arc<CoordinationManager>, solver: SolverHandle) -> RealtimeResult<Arc<Self>> {
        let id = manager.next_bridge_id();
        let listeners: Vec<Arc<dyn BridgeListener>> = vec![Arc::clone(manager) as Arc<dyn BridgeListener>];
        let shared = Arc::new(BridgeShared {
            id,
            manager:   Arc::clone(manager),
            state:     Mutex::new(BridgeState::default()),
            listeners: RwLock::new(listeners),
        });
        let kind = solver.kind();
        let bridge = Arc::new(Self { shared: Arc::clone(&shared), solver: Mutex::new(solver) });

        manager.register(&bridge)?;
        bridge.solver.lock().init(shared);
        debug!(bridge = %id, solver = kind, "bridge created");
        Ok(bridge)
    }

    #[inline]
    pub fn id(&self) -> BridgeId {
        self.shared.id
    }

    /// Build a snapshot from `source` and hand it to the solver, cancelling
    /// any computation still running for an earlier one.
    ///
    /// Returns the id stamped on the submitted snapshot.
    pub fn solve(&self, source: &dyn SnapshotSource, args: SolveArgs) -> RealtimeResult<SnapshotId> {
        let manager = &self.shared.manager;
        if manager.is_shut_down() {
            return Err(RealtimeError::ShutDown);
        }
        let snapshot = source.snapshot(&args)?.stamped(manager.next_snapshot_id());
        let snapshot = Arc::new(snapshot);
        let id = snapshot.id;

        let mut solver = self.solver.lock();
        self.retire(&mut solver);
        {
            let mut state = self.shared.state.lock();
            state.latest = Some(Arc::clone(&snapshot));
            state.computing = Some(id);
        }
        debug!(bridge = %self.id(), snapshot = %id, tick = %snapshot.tick, "submitting problem");
        self.shared.dispatch(|l| l.on_start_computing(self.shared.id));
        solver.problem_changed(snapshot);
        Ok(id)
    }

    /// The most recently submitted snapshot.
    pub fn current_state(&self) -> Option<Arc<Snapshot>> {
        self.shared.state.lock().latest.clone()
    }

    /// `true` if a schedule was published since the last
    /// [`current_schedule`][Self::current_schedule].
    pub fn is_schedule_updated(&self) -> bool {
        self.shared.state.lock().updated
    }

    /// The last published schedule.  Clears the updated flag.
    pub fn current_schedule(&self) -> RealtimeResult<Schedule> {
        let mut state = self.shared.state.lock();
        let schedule = state.schedule.as_ref().map(|(s, _)| s.clone()).ok_or(RealtimeError::NoSchedule)?;
        state.updated = false;
        Ok(schedule)
    }

    /// The snapshot the last published schedule was computed against.
    pub fn schedule_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.shared.state.lock().schedule.as_ref().map(|(_, s)| Arc::clone(s))
    }

    /// Cancel the computation in flight.  The last schedule stays available.
    pub fn cancel(&self) {
        let mut solver = self.solver.lock();
        self.retire(&mut solver);
    }

    pub fn is_computing(&self) -> bool {
        self.shared.state.lock().computing.is_some()
    }

    pub fn add_listener(&self, listener: Arc<dyn BridgeListener>) {
        self.shared.listeners.write().push(listener);
    }

    /// Cancel the submission in flight and make sure its DONE has fired.
    fn retire(&self, solver: &mut SolverHandle) {
        let Some(previous) = self.shared.state.lock().computing else {
            return;
        };
        solver.cancel();
        if self.shared.release(previous) {
            debug!(bridge = %self.id(), snapshot = %previous, "solver kept cancelled computation open; closing it");
            self.shared.dispatch(|l| l.on_done_computing(self.shared.id));
        }
    }
}

impl Drop for SolverBridge {
    /// A dropped bridge must not stay in the manager's computing set.
    fn drop(&mut self) {
        let mut solver = self.solver.lock();
        self.retire(&mut solver);
    }
}

impl std::fmt::Debug for SolverBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverBridge")
            .field("id", &self.shared.id)
            .field("computing", &self.shared.state.lock().computing)
            .finish()
    }
}
