//! Fluent builder for constructing a [`Sim`].

use std::sync::Arc;

use pd_core::{ClockMode, RealtimeConfig, SimConfig};
use pd_pool::{Affinity, SystemAffinity};
use pd_realtime::{CoordinationManager, RealtimeClock};
use tracing::warn;

use crate::{ArrivalQueue, Fleet, Sim, SimError, SimResult, StepClock};

/// Fluent builder for [`Sim`].
///
/// # Optional inputs (have defaults)
///
/// | Method              | Default                     |
/// |---------------------|-----------------------------|
/// | `.arrivals(q)`      | no parcels ever arrive      |
/// | `.affinity(a)`      | `SystemAffinity::detect()`  |
/// | `.initial_mode(m)`  | `ClockMode::Simulated`      |
///
/// # Example
///
/// ```rust,ignore
/// let mut sim = SimBuilder::new(config, RealtimeConfig::single(), Fleet::new(4))
///     .arrivals(parcels.into_iter().collect())
///     .build()?;
/// let planner = CentralPlanner::new(sim.manager(), SolverHandle::batch(solver))?;
/// sim.add_listener(planner);
/// sim.run(&mut NoopObserver)?;
/// ```
pub struct SimBuilder {
    config:   SimConfig,
    realtime: RealtimeConfig,
    fleet:    Fleet,
    arrivals: ArrivalQueue,
    affinity: Option<Arc<dyn Affinity>>,
    mode:     ClockMode,
}

impl SimBuilder {
    pub fn new(config: SimConfig, realtime: RealtimeConfig, fleet: Fleet) -> Self {
        Self {
            config,
            realtime,
            fleet,
            arrivals: ArrivalQueue::new(),
            affinity: None,
            mode:     ClockMode::Simulated,
        }
    }

    pub fn arrivals(mut self, arrivals: ArrivalQueue) -> Self {
        self.arrivals = arrivals;
        self
    }

    /// Core pinning for solver threads.
    pub fn affinity(mut self, affinity: Arc<dyn Affinity>) -> Self {
        self.affinity = Some(affinity);
        self
    }

    pub fn initial_mode(mut self, mode: ClockMode) -> Self {
        self.mode = mode;
        self
    }

    /// Validate both configurations, start the coordination manager and its
    /// pool, and return a ready-to-run [`Sim`].
    pub fn build(self) -> SimResult<Sim> {
        self.config.validate()?;
        if self.fleet.vehicle_count() == 0 {
            return Err(SimError::Config("fleet has no vehicles".into()));
        }
        if let Some(first) = self.arrivals.next_tick() {
            if first >= self.config.end_tick() {
                warn!(%first, "no parcel arrives before the simulation ends");
            }
        }

        let affinity = self.affinity.unwrap_or_else(|| Arc::new(SystemAffinity::detect()));
        let step_clock = Arc::new(StepClock::new(self.mode));
        let sleep_on_change = self.realtime.sleep_on_change;
        let manager = CoordinationManager::new(
            self.realtime,
            Arc::clone(&step_clock) as Arc<dyn RealtimeClock>,
            affinity,
        )?;

        Ok(Sim {
            clock:     self.config.make_clock(),
            config:    self.config,
            fleet:     self.fleet,
            arrivals:  self.arrivals,
            step_clock,
            manager,
            listeners: Vec::new(),
            sleep_on_change,
        })
    }
}
