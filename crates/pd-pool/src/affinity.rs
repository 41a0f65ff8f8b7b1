//! Core reservation and thread pinning behind a small trait.

use parking_lot::Mutex;
use tracing::debug;

/// Index of a core in an [`Affinity`] implementation's core list.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct CoreSlot(pub usize);

/// Source of CPU cores for solver threads.
///
/// `reserve`/`release` track how many threads use each core so reservations
/// spread across the machine; `pin_current` performs the actual pinning of
/// the calling thread.
pub trait Affinity: Send + Sync + 'static {
    /// Reserve the least-used core, or `None` if no cores are known.
    fn reserve(&self) -> Option<CoreSlot>;

    /// Return a reservation obtained from [`reserve`][Self::reserve].
    fn release(&self, slot: CoreSlot);

    /// Pin the calling thread to `slot`.  `false` if the platform refused.
    fn pin_current(&self, slot: CoreSlot) -> bool;
}

// ── CoreLedger ────────────────────────────────────────────────────────────────

/// Per-core reservation counts.
///
/// `reserve` hands out the core with the fewest reservations (lowest index on
/// ties), so with at least as many cores as threads every thread gets its own.
pub struct CoreLedger {
    counts: Mutex<Vec<usize>>,
}

impl CoreLedger {
    pub fn new(cores: usize) -> Self {
        Self { counts: Mutex::new(vec![0; cores]) }
    }

    pub fn reserve(&self) -> Option<CoreSlot> {
        let mut counts = self.counts.lock();
        let (idx, count) = counts
            .iter_mut()
            .enumerate()
            .min_by_key(|(i, c)| (**c, *i))?;
        *count += 1;
        Some(CoreSlot(idx))
    }

    pub fn release(&self, slot: CoreSlot) {
        if let Some(count) = self.counts.lock().get_mut(slot.0) {
            *count = count.saturating_sub(1);
        }
    }

    /// Current reservations of `slot`.
    pub fn reservations(&self, slot: CoreSlot) -> usize {
        self.counts.lock().get(slot.0).copied().unwrap_or(0)
    }

    /// Sum of all reservations.
    pub fn total(&self) -> usize {
        self.counts.lock().iter().sum()
    }

    pub fn cores(&self) -> usize {
        self.counts.lock().len()
    }
}

// ── SystemAffinity ────────────────────────────────────────────────────────────

/// Pins threads with the host's affinity API via `core_affinity`.
pub struct SystemAffinity {
    cores:  Vec<core_affinity::CoreId>,
    ledger: CoreLedger,
}

impl SystemAffinity {
    /// Discover the host's cores.  An empty list (unsupported platform) makes
    /// every reservation fail softly.
    pub fn detect() -> Self {
        let cores = core_affinity::get_core_ids().unwrap_or_default();
        if cores.is_empty() {
            debug!("no CPU affinity support detected; solver threads will run unpinned");
        }
        let ledger = CoreLedger::new(cores.len());
        Self { cores, ledger }
    }

    pub fn core_count(&self) -> usize {
        self.cores.len()
    }
}

impl Affinity for SystemAffinity {
    fn reserve(&self) -> Option<CoreSlot> {
        self.ledger.reserve()
    }

    fn release(&self, slot: CoreSlot) {
        self.ledger.release(slot);
    }

    fn pin_current(&self, slot: CoreSlot) -> bool {
        self.cores
            .get(slot.0)
            .is_some_and(|core| core_affinity::set_for_current(*core))
    }
}

// ── NoAffinity ────────────────────────────────────────────────────────────────

/// Never pins.  For platforms or runs where pinning is unwanted.
pub struct NoAffinity;

impl Affinity for NoAffinity {
    fn reserve(&self) -> Option<CoreSlot> {
        None
    }

    fn release(&self, _slot: CoreSlot) {}

    fn pin_current(&self, _slot: CoreSlot) -> bool {
        false
    }
}
