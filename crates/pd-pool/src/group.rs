//! One core shared by every worker of a grouped pool.
//!
//! The first worker to join starts a holder thread which reserves the core
//! and then parks until released.  Workers pin themselves to whatever the
//! holder reserved.  When the last worker leaves, the holder is released,
//! gives the reservation back and exits; a later join starts a fresh holder.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, bounded};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{Affinity, CoreSlot};

struct Holder {
    /// Dropping the last sender wakes the holder thread.
    release: Sender<()>,
    handle:  JoinHandle<()>,
}

#[derive(Default)]
struct GroupState {
    members: usize,
    slot:    Option<CoreSlot>,
    holder:  Option<Holder>,
}

/// Reference-counted core reservation shared by a group of worker threads.
pub struct CoreGroup {
    affinity: Arc<dyn Affinity>,
    state:    Mutex<GroupState>,
}

impl CoreGroup {
    pub fn new(affinity: Arc<dyn Affinity>) -> Self {
        Self { affinity, state: Mutex::new(GroupState::default()) }
    }

    /// Register a worker and return the group's core, if one could be
    /// reserved.  Starts the holder thread on the first join.
    pub fn join(&self) -> Option<CoreSlot> {
        let mut state = self.state.lock();
        state.members += 1;
        if state.holder.is_none() {
            match self.start_holder() {
                Ok((holder, slot)) => {
                    debug!(core = ?slot, "solver core holder started");
                    state.holder = Some(holder);
                    state.slot = slot;
                }
                Err(e) => warn!(error = %e, "failed to start solver core holder"),
            }
        }
        state.slot
    }

    /// Unregister a worker.  The last one out releases the core.
    pub fn leave(&self) {
        let mut state = self.state.lock();
        state.members = state.members.saturating_sub(1);
        if state.members > 0 {
            return;
        }
        state.slot = None;
        if let Some(holder) = state.holder.take() {
            drop(holder.release);
            if holder.handle.join().is_err() {
                warn!("solver core holder panicked");
            }
            debug!("solver core holder stopped");
        }
    }

    /// `true` while a holder thread keeps the reservation.
    pub fn holder_active(&self) -> bool {
        self.state.lock().holder.is_some()
    }

    fn start_holder(&self) -> std::io::Result<(Holder, Option<CoreSlot>)> {
        let (ready_tx, ready_rx) = bounded::<Option<CoreSlot>>(1);
        let (release_tx, release_rx) = bounded::<()>(0);
        let affinity = Arc::clone(&self.affinity);

        let handle = thread::Builder::new()
            .name("solver-core-holder".into())
            .spawn(move || {
                let slot = affinity.reserve();
                let _ = ready_tx.send(slot);
                // Returns once every sender is gone.
                let _ = release_rx.recv();
                if let Some(slot) = slot {
                    affinity.release(slot);
                }
            })?;

        let slot = ready_rx.recv().ok().flatten();
        Ok((Holder { release: release_tx, handle }, slot))
    }
}
