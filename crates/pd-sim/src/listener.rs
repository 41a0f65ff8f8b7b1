//! Per-step consumer hooks.

use std::sync::Arc;

use pd_core::{ParcelId, Tick};
use pd_realtime::CoordinationManager;

use crate::{Fleet, SimResult};

/// What a [`TickListener`] sees during one step.
pub struct TickContext<'a> {
    pub tick:    Tick,
    pub fleet:   &'a mut Fleet,
    pub manager: &'a Arc<CoordinationManager>,
    /// Parcels announced at this tick.
    pub arrived: &'a [ParcelId],
    submitted:   bool,
}

impl<'a> TickContext<'a> {
    pub(crate) fn new(
        tick:    Tick,
        fleet:   &'a mut Fleet,
        manager: &'a Arc<CoordinationManager>,
        arrived: &'a [ParcelId],
    ) -> Self {
        Self { tick, fleet, manager, arrived, submitted: false }
    }

    /// Record that work was handed to a solver this step.  With
    /// `sleep_on_change` the step then waits (up to half a tick) for the
    /// solvers to settle before `after_tick`.
    pub fn mark_submitted(&mut self) {
        self.submitted = true;
    }

    pub fn submitted(&self) -> bool {
        self.submitted
    }
}

/// A consumer driven by the stepping loop: a central planner, a vehicle
/// controller, a route follower.
///
/// Each step calls `tick` on every listener in registration order, then
/// `after_tick` on every listener.  Both run on the simulation thread and
/// must not block on a solver.
pub trait TickListener: Send {
    fn tick(&mut self, _ctx: &mut TickContext<'_>) -> SimResult<()> {
        Ok(())
    }

    fn after_tick(&mut self, _ctx: &mut TickContext<'_>) -> SimResult<()> {
        Ok(())
    }
}
