//! Bridge lifecycle observers.

use std::sync::Arc;

use pd_core::{BridgeId, Schedule, Snapshot};

/// Receives the lifecycle events of a [`SolverBridge`][crate::SolverBridge].
///
/// Every submission produces exactly one `on_start_computing` and, later,
/// exactly one `on_done_computing`.  `on_new_schedule` fires between the two
/// when the computation publishes.
///
/// Events may be delivered on pool threads.  Implementations must not call
/// back into the bridge that emitted the event while handling it.
pub trait BridgeListener: Send + Sync {
    fn on_start_computing(&self, _bridge: BridgeId) {}

    /// `snapshot` is the problem `schedule` was computed against.
    fn on_new_schedule(&self, _bridge: BridgeId, _schedule: &Schedule, _snapshot: &Arc<Snapshot>) {}

    fn on_done_computing(&self, _bridge: BridgeId) {}
}
