//! Solver traits, the extension point for optimization code.

use std::sync::Arc;

use pd_core::{Schedule, Snapshot};

use crate::{BatchAdapter, CancelToken, Scheduler, SolverResult};

/// A blocking, single-shot solver.
///
/// Called on a pool thread with an immutable snapshot.  Long-running
/// implementations should call [`CancelToken::check`] regularly and return
/// early with its error once the computation has been superseded.
///
/// Closures of the right shape implement this trait:
///
/// ```rust,ignore
/// let solver = |snap: &Snapshot, _cancel: &CancelToken| {
///     Ok(Schedule::idle(snap.vehicles.len()))
/// };
/// let handle = SolverHandle::batch(solver);
/// ```
pub trait Solver: Send + Sync + 'static {
    fn solve(&self, snapshot: &Snapshot, cancel: &CancelToken) -> SolverResult<Schedule>;
}

impl<F> Solver for F
where
    F: Fn(&Snapshot, &CancelToken) -> SolverResult<Schedule> + Send + Sync + 'static,
{
    fn solve(&self, snapshot: &Snapshot, cancel: &CancelToken) -> SolverResult<Schedule> {
        self(snapshot, cancel)
    }
}

/// A solver that runs the asynchronous protocol itself.
///
/// # Contract
///
/// - [`init`][Self::init] is called exactly once, before anything else.
/// - [`problem_changed`][Self::problem_changed] supersedes any computation in
///   flight.  Results are published through the scheduler, followed by one
///   `done_for_now` for the snapshot.
/// - [`cancel`][Self::cancel] is safe when idle.
pub trait RealtimeSolver: Send {
    fn init(&mut self, scheduler: Arc<dyn Scheduler>);

    fn problem_changed(&mut self, snapshot: Arc<Snapshot>);

    fn cancel(&mut self);

    fn is_computing(&self) -> bool;
}

/// The solver a bridge drives: either natively asynchronous or a blocking
/// solver run through a [`BatchAdapter`].
pub enum SolverHandle {
    Native(Box<dyn RealtimeSolver>),
    Adapted(BatchAdapter),
}

impl SolverHandle {
    pub fn native<S: RealtimeSolver + 'static>(solver: S) -> Self {
        SolverHandle::Native(Box::new(solver))
    }

    pub fn batch<S: Solver>(solver: S) -> Self {
        SolverHandle::Adapted(BatchAdapter::new(solver))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SolverHandle::Native(_)  => "native",
            SolverHandle::Adapted(_) => "batch",
        }
    }
}

impl RealtimeSolver for SolverHandle {
    fn init(&mut self, scheduler: Arc<dyn Scheduler>) {
        match self {
            SolverHandle::Native(s)  => s.init(scheduler),
            SolverHandle::Adapted(a) => a.init(scheduler),
        }
    }

    fn problem_changed(&mut self, snapshot: Arc<Snapshot>) {
        match self {
            SolverHandle::Native(s)  => s.problem_changed(snapshot),
            SolverHandle::Adapted(a) => a.problem_changed(snapshot),
        }
    }

    fn cancel(&mut self) {
        match self {
            SolverHandle::Native(s)  => s.cancel(),
            SolverHandle::Adapted(a) => a.cancel(),
        }
    }

    fn is_computing(&self) -> bool {
        match self {
            SolverHandle::Native(s)  => s.is_computing(),
            SolverHandle::Adapted(a) => a.is_computing(),
        }
    }
}
