//! `pd-pool` — the shared worker pool solver computations run on.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                   |
//! |--------------|------------------------------------------------------------|
//! | [`affinity`] | `Affinity` trait, `SystemAffinity`, `NoAffinity`, `CoreLedger` |
//! | [`group`]    | `CoreGroup` — one core shared by a whole pool              |
//! | [`pool`]     | `SolverPool`, `PoolSpec`                                   |
//! | [`error`]    | `PoolError`, `PoolResult<T>`                               |
//!
//! # Pinning model
//!
//! Pinning is a performance hint only.  Every failure to reserve or pin a
//! core degrades to an unpinned worker and a log line, never an error.
//!
//! - **Grouped**: all workers share one core.  The core is reserved lazily by
//!   a holder thread when the first worker starts and released when the last
//!   worker exits.
//! - **Ungrouped**: each worker reserves the least-used core for itself.

pub mod affinity;
pub mod error;
pub mod group;
pub mod pool;


pub use affinity::{Affinity, CoreLedger, CoreSlot, NoAffinity, SystemAffinity};
pub use error::{PoolError, PoolResult};
pub use pool::{PanicHook, PoolSpec, SolverPool, panic_message};
