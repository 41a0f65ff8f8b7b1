//! `pd-core` — foundational types for the `rt_pdp` real-time pickup-and-delivery
//! framework.
//!
//! This crate is a dependency of every other `pd-*` crate.  It has no `pd-*`
//! dependencies and only `thiserror` (plus optional `serde`) externally.
//!
//! # What lives here
//!
//! | Module        | Contents                                                   |
//! |---------------|------------------------------------------------------------|
//! | [`ids`]       | `ParcelId`, `VehicleId`, `BridgeId`, `SnapshotId`          |
//! | [`problem`]   | `Snapshot`, `VehicleSnapshot`, `Schedule`, `SolveArgs`     |
//! | [`time`]      | `Tick`, `SimClock`, `ClockMode`                            |
//! | [`config`]    | `RealtimeConfig`, `PoolSize`, `ConsumerMode`, `SimConfig`  |
//! | [`error`]     | `PdError`, `PdResult`                                      |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |

pub mod config;
pub mod error;
pub mod ids;
pub mod problem;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::{ConsumerMode, PoolSize, RealtimeConfig, SimConfig};
pub use error::{PdError, PdResult};
pub use ids::{BridgeId, ParcelId, SnapshotId, VehicleId};
pub use problem::{
    ParcelSpec, Route, RouteSeed, Schedule, Snapshot, SnapshotSource, SolveArgs, VehicleSnapshot,
};
pub use time::{ClockMode, SimClock, Tick};
