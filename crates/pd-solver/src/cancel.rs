//! Cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{SolverError, SolverResult};

/// Shared flag a running computation polls to learn it has been superseded.
///
/// Clones observe the same flag.  Cancelling is one-way.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err(SolverError::Cancelled)` once cancelled, for use with `?` inside
    /// solver loops.
    #[inline]
    pub fn check(&self) -> SolverResult<()> {
        if self.is_cancelled() {
            Err(SolverError::Cancelled)
        } else {
            Ok(())
        }
    }
}
