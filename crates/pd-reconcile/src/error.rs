use pd_core::VehicleId;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("schedule has {routes} routes but the snapshot has {vehicles} vehicles")]
    LengthMismatch { routes: usize, vehicles: usize },

    /// The snapshot must describe cargo only, not routes.
    #[error("snapshot carries a route for {0}")]
    RoutePresent(VehicleId),
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
