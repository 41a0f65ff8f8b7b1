use pd_core::PdError;
use pd_pool::PoolError;
use pd_solver::SolverError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("no schedule has been set")]
    NoSchedule,

    #[error("coordination manager has been shut down")]
    ShutDown,

    #[error("configuration error: {0}")]
    Config(String),

    /// A failure raised on a pool thread, re-raised on the simulation thread.
    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Core(#[from] PdError),
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;
