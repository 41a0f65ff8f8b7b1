use pd_pool::PoolError;
use thiserror::Error;

/// Everything that can end a computation other than a published schedule.
#[derive(Debug, Error)]
pub enum SolverError {
    /// The computation observed its cancel token.  Expected, never surfaced.
    #[error("computation cancelled")]
    Cancelled,

    #[error("solver returned {got} routes for {expected} vehicles")]
    VehicleCountMismatch { expected: usize, got: usize },

    #[error("solver failed: {0}")]
    Failed(String),

    #[error("solver panicked: {0}")]
    Panicked(String),

    /// The computation could not be handed to the pool.
    #[error("solver could not be started: {0}")]
    AdapterStart(#[source] PoolError),
}

impl SolverError {
    /// `true` for the cooperative-cancellation outcome.
    #[inline]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, SolverError::Cancelled)
    }
}

pub type SolverResult<T> = Result<T, SolverError>;
