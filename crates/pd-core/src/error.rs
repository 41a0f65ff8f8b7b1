//! Framework error type.
//!
//! Sub-crates define their own error enums and wrap `PdError` as one variant
//! where a core failure can surface through them.

use thiserror::Error;

use crate::{ParcelId, VehicleId};

/// The top-level error type for `pd-core` and a common base for sub-crates.
#[derive(Debug, Error)]
pub enum PdError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("parcel {0} not found")]
    ParcelNotFound(ParcelId),

    #[error("vehicle {0} not found")]
    VehicleNotFound(VehicleId),

    #[error("schedule has {got} routes but the problem has {expected} vehicles")]
    VehicleCountMismatch { expected: usize, got: usize },
}

/// Shorthand result type for all `pd-*` crates.
pub type PdResult<T> = Result<T, PdError>;
