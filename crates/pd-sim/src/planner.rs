//! `CentralPlanner`: one bridge planning for the whole fleet.

use std::sync::Arc;

use pd_core::SolveArgs;
use pd_realtime::{CoordinationManager, SolverBridge};
use pd_reconcile::reconcile;
use pd_solver::SolverHandle;
use tracing::{debug, info};

use crate::{SimResult, TickContext, TickListener};

/// Re-solves whenever parcels arrive and applies each new schedule, after
/// reconciling it against the fleet as it is at that moment.
pub struct CentralPlanner {
    bridge:      Arc<SolverBridge>,
    submissions: u64,
    applied:     u64,
}

impl CentralPlanner {
    pub fn new(manager: &Arc<CoordinationManager>, solver: SolverHandle) -> SimResult<Self> {
        let bridge = SolverBridge::new(manager, solver)?;
        Ok(Self { bridge, submissions: 0, applied: 0 })
    }

    pub fn bridge(&self) -> &Arc<SolverBridge> {
        &self.bridge
    }

    /// Problems handed to the solver so far.
    pub fn submissions(&self) -> u64 {
        self.submissions
    }

    /// Schedules applied to the fleet so far.
    pub fn applied(&self) -> u64 {
        self.applied
    }
}

impl TickListener for CentralPlanner {
    fn tick(&mut self, ctx: &mut TickContext<'_>) -> SimResult<()> {
        if ctx.arrived.is_empty() {
            return Ok(());
        }
        let snapshot = self.bridge.solve(&*ctx.fleet, SolveArgs::new())?;
        self.submissions += 1;
        ctx.mark_submitted();
        debug!(tick = %ctx.tick, %snapshot, arrived = ctx.arrived.len(), "planner re-solving");
        Ok(())
    }

    fn after_tick(&mut self, ctx: &mut TickContext<'_>) -> SimResult<()> {
        if !self.bridge.is_schedule_updated() {
            return Ok(());
        }
        let schedule = self.bridge.current_schedule()?;
        let current = ctx.fleet.snapshot_without_routes()?;
        let fixed = reconcile(&schedule, &current)?;
        ctx.fleet.apply_routes(&fixed)?;
        self.applied += 1;
        info!(tick = %ctx.tick, routes = fixed.len(), "applied new schedule");
        Ok(())
    }
}
