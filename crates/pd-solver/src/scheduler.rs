//! The solver-facing half of a solver bridge.

use std::sync::Arc;

use pd_core::{Schedule, Snapshot, SnapshotId};
use pd_pool::SolverPool;

use crate::SolverError;

/// Callback surface through which a solver publishes results.
///
/// Implemented by the bridge in `pd-realtime`.  Every method may be called
/// from any pool thread; none of them blocks on the simulation.
pub trait Scheduler: Send + Sync {
    /// Publish `schedule`, computed against `snapshot`.  Results for a
    /// snapshot other than the latest submitted one are ignored.
    fn update_schedule(&self, snapshot: &Arc<Snapshot>, schedule: Schedule);

    /// The computation for `snapshot` has resolved; nothing more will be
    /// published for it.
    fn done_for_now(&self, snapshot: SnapshotId);

    /// Hand a failure to the coordination layer.  Never panics or returns it
    /// to the caller, which is usually a pool thread.
    fn report_failure(&self, error: SolverError);

    /// The shared pool computations must run on.
    fn pool(&self) -> SolverPool;
}
