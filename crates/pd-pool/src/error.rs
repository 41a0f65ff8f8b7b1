use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to build solver pool: {0}")]
    Build(String),

    #[error("solver pool size must be at least 1")]
    InvalidSize,

    #[error("solver pool has been shut down")]
    ShutDown,
}

pub type PoolResult<T> = Result<T, PoolError>;
