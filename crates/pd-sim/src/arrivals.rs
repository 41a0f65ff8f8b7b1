//! `ArrivalQueue`: parcels waiting for their announce tick.

use std::collections::BTreeMap;

use pd_core::{ParcelSpec, Tick};

/// Maps announce ticks to the parcels announced at that tick.
#[derive(Default, Debug)]
pub struct ArrivalQueue {
    inner: BTreeMap<Tick, Vec<ParcelSpec>>,
    /// Cached total parcel count for O(1) `len()`.
    total: usize,
}

impl ArrivalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `spec` for its `announced` tick.
    pub fn push(&mut self, spec: ParcelSpec) {
        self.inner.entry(spec.announced).or_default().push(spec);
        self.total += 1;
    }

    /// Remove and return every parcel announced at exactly `tick`.
    ///
    /// Returns `None` for the (common) ticks without arrivals.
    pub fn drain_tick(&mut self, tick: Tick) -> Option<Vec<ParcelSpec>> {
        let specs = self.inner.remove(&tick)?;
        self.total -= specs.len();
        Some(specs)
    }

    /// The earliest tick with a queued parcel.
    pub fn next_tick(&self) -> Option<Tick> {
        self.inner.keys().next().copied()
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of distinct future ticks with at least one arrival.
    pub fn tick_count(&self) -> usize {
        self.inner.len()
    }
}

impl FromIterator<ParcelSpec> for ArrivalQueue {
    fn from_iter<I: IntoIterator<Item = ParcelSpec>>(iter: I) -> Self {
        let mut queue = Self::new();
        for spec in iter {
            queue.push(spec);
        }
        queue
    }
}
