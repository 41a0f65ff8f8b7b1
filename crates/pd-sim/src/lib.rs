//! `pd-sim` — a minimal stepping harness around the real-time coordination
//! layer.
//!
//! The harness supplies the two collaborators the coordination layer only
//! talks to through interfaces: a clock whose mode the manager switches
//! ([`StepClock`]) and domain state solvers take snapshots of ([`Fleet`]).
//!
//! # Stepping loop
//!
//! ```text
//! for tick in 0..config.total_ticks:
//!   ① Arrivals    — ArrivalQueue → Fleet; manager.notify_new_work()
//!   ② Tick        — TickListener::tick        (consumers call bridge.solve)
//!   ③ Settle      — optional wait_quiescent, ≤ half a tick
//!   ④ After tick  — TickListener::after_tick  (consumers apply schedules)
//!   ⑤ Coordinate  — manager.after_step()?      (failures, debounce)
//!   ⑥ Pace        — sleep out the tick in real-time mode
//! ```
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use pd_core::{RealtimeConfig, SimConfig};
//! use pd_sim::{CentralPlanner, Fleet, ModeLog, SimBuilder};
//! use pd_solver::SolverHandle;
//!
//! let mut sim = SimBuilder::new(config, RealtimeConfig::single(), Fleet::new(3))
//!     .arrivals(arrivals)
//!     .build()?;
//! let planner = CentralPlanner::new(sim.manager(), SolverHandle::batch(my_solver))?;
//! sim.add_listener(planner);
//! sim.run(&mut ModeLog::new())?;
//! ```

pub mod arrivals;
pub mod builder;
pub mod clock;
pub mod error;
pub mod fleet;
pub mod listener;
pub mod observer;
pub mod planner;
pub mod sim;


pub use arrivals::ArrivalQueue;
pub use builder::SimBuilder;
pub use clock::StepClock;
pub use error::{SimError, SimResult};
pub use fleet::{Fleet, VehicleState};
pub use listener::{TickContext, TickListener};
pub use observer::{ModeLog, NoopObserver, SimObserver};
pub use planner::CentralPlanner;
pub use sim::Sim;
