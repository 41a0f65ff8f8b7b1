//! `pd-reconcile` — makes a schedule computed against an older snapshot
//! consistent with the fleet as it is now.
//!
//! While a solver computes, vehicles keep moving: parcels get picked up,
//! delivered, or become a vehicle's committed destination.  [`reconcile`]
//! repairs the routes of a schedule against a fresh snapshot (built without
//! routes) so it can be applied without another solve.
//!
//! # Rules
//!
//! For vehicle *v* with contents *C* and destination *d*:
//!
//! | Parcel                      | Occurrences in *v*'s route | Elsewhere |
//! |-----------------------------|----------------------------|-----------|
//! | `p ∈ C`, `p ≠ d`            | exactly 1                  | none      |
//! | `p = d`                     | exactly 2, one at index 0  | none      |
//! | delivered                   | none                       | none      |
//! | any other available parcel  | as computed                | as computed |
//!
//! A missing destination occurrence is inserted at the front, any other
//! missing occurrence is appended.  Surplus occurrences are removed from the
//! back.  Applying [`reconcile`] to its own output changes nothing.

mod error;
mod reconcile;

#[cfg(test)]
mod tests;

pub use error::{ReconcileError, ReconcileResult};
pub use reconcile::{expected_occurrences, reconcile};
