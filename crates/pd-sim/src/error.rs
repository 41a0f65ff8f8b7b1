use pd_core::PdError;
use pd_realtime::RealtimeError;
use pd_reconcile::ReconcileError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Realtime(#[from] RealtimeError),

    #[error("could not reconcile schedule: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Core(#[from] PdError),
}

pub type SimResult<T> = Result<T, SimError>;
