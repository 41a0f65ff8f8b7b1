//! `pd-solver` — how solvers plug into the real-time coordination layer.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                      |
//! |---------------|---------------------------------------------------------------|
//! | [`solver`]    | `Solver` (blocking), `RealtimeSolver` (async), `SolverHandle` |
//! | [`scheduler`] | `Scheduler` — the callback surface a solver publishes through |
//! | [`adapter`]   | `BatchAdapter` — runs a `Solver` asynchronously on the pool   |
//! | [`cancel`]    | `CancelToken` — cooperative cancellation                      |
//! | [`error`]     | `SolverError`, `SolverResult<T>`                              |
//!
//! # Two kinds of solver
//!
//! A [`Solver`] is a plain blocking function from snapshot to schedule.  It
//! only has to poll its [`CancelToken`] now and then.  A [`RealtimeSolver`]
//! drives the asynchronous protocol itself.  [`SolverHandle`] holds either; a
//! blocking solver is wrapped in a [`BatchAdapter`] at construction.

pub mod adapter;
pub mod cancel;
pub mod error;
pub mod scheduler;
pub mod solver;


pub use adapter::BatchAdapter;
pub use cancel::CancelToken;
pub use error::{SolverError, SolverResult};
pub use scheduler::Scheduler;
pub use solver::{RealtimeSolver, Solver, SolverHandle};
