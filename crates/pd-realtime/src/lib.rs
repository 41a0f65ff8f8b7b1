//! `pd-realtime` — runs solvers against a live simulation.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                       |
//! |--------------|----------------------------------------------------------------|
//! | [`bridge`]   | `SolverBridge` — consumer-facing and solver-facing façade      |
//! | [`manager`]  | `CoordinationManager` — computing set, clock mode, failures    |
//! | [`clock`]    | `RealtimeClock` — what the manager needs from the sim clock    |
//! | [`listener`] | `BridgeListener` — START / NEW_SCHEDULE / DONE observers       |
//! | [`error`]    | `RealtimeError`, `RealtimeResult<T>`                           |
//!
//! # Per-step protocol
//!
//! ```text
//! parcel arrives ──► manager.notify_new_work()          → REAL_TIME
//! consumer       ──► bridge.solve(source, args)         → START  (set grows)
//! pool thread    ──► update_schedule / done_for_now     → NEW_SCHEDULE, DONE
//! end of step    ──► manager.after_step()?              → failures re-raised,
//!                                                         SIMULATED after two
//!                                                         quiet steps
//! ```
//!
//! The manager is created once per run and handed to every bridge by `Arc`.
//! Nothing in this crate blocks the simulation thread on a solver except
//! [`CoordinationManager::wait_quiescent`], which is bounded by its deadline.

pub mod bridge;
pub mod clock;
pub mod error;
pub mod listener;
pub mod manager;

#[cfg(test)]
mod tests;

pub use bridge::SolverBridge;
pub use clock::RealtimeClock;
pub use error::{RealtimeError, RealtimeResult};
pub use listener::BridgeListener;
pub use manager::CoordinationManager;
