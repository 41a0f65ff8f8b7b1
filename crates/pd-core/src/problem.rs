//! The routing problem as seen by a solver, and the schedule it produces.
//!
//! A [`Snapshot`] is built fresh for every solve request and handed to the
//! solver behind an `Arc`; nothing mutates it afterwards.  A [`Schedule`] is
//! the solver's answer: one route per vehicle, in vehicle order.
//!
//! # Route encoding
//!
//! A route lists every pending *visit*.  A parcel that still has to be picked
//! up appears twice (pickup, then delivery); a parcel already in the vehicle
//! appears once (delivery).  A parcel whose pickup service has started counts
//! as carried but is still the vehicle's committed destination, so it appears
//! at position 0 and once more for its delivery.

use std::collections::{BTreeMap, BTreeSet};

use crate::{PdError, PdResult, ParcelId, SnapshotId, Tick, VehicleId};

/// Ordered parcel visits of one vehicle.
pub type Route = Vec<ParcelId>;

// ── Parcels ──────────────────────────────────────────────────────────────────

/// Static description of a transportation request.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParcelSpec {
    pub id: ParcelId,
    /// Tick at which the parcel became known to the system.
    pub announced: Tick,
    /// Ticks a vehicle spends at the pickup location.
    pub pickup_ticks: u64,
    /// Ticks a vehicle spends at the delivery location.
    pub delivery_ticks: u64,
}

impl ParcelSpec {
    pub fn new(id: ParcelId, announced: Tick) -> Self {
        Self { id, announced, pickup_ticks: 0, delivery_ticks: 0 }
    }

    pub fn with_service(mut self, pickup_ticks: u64, delivery_ticks: u64) -> Self {
        self.pickup_ticks = pickup_ticks;
        self.delivery_ticks = delivery_ticks;
        self
    }
}

// ── Vehicles ─────────────────────────────────────────────────────────────────

/// One vehicle's state inside a [`Snapshot`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleSnapshot {
    pub id: VehicleId,

    /// The route the vehicle is currently following, if the snapshot was
    /// built with one.  `None` means "no route information", which is what
    /// the reconciler requires; `Some(vec![])` is an explicit idle route.
    pub route: Option<Route>,

    /// Parcels in the vehicle, including one whose pickup has started.
    pub contents: BTreeSet<ParcelId>,

    /// Parcel the vehicle is committed to servicing.  Cannot be reassigned.
    pub destination: Option<ParcelId>,

    /// Ticks left on the service operation in progress (0 when not servicing).
    pub remaining_service: u64,
}

impl VehicleSnapshot {
    pub fn new(id: VehicleId) -> Self {
        Self { id, ..Self::default() }
    }

    #[inline]
    pub fn carries(&self, parcel: ParcelId) -> bool {
        self.contents.contains(&parcel)
    }
}

// ── Snapshot ─────────────────────────────────────────────────────────────────

/// Immutable point-in-time view of the routing problem.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot {
    /// Stamped by the bridge at submission; `SnapshotId(0)` before that.
    pub id: SnapshotId,

    /// Simulation tick the snapshot was taken at.
    pub tick: Tick,

    /// Spec of every undelivered parcel (available or carried).
    pub parcels: BTreeMap<ParcelId, ParcelSpec>,

    /// Undelivered parcels that no vehicle carries yet.
    pub available: BTreeSet<ParcelId>,

    /// Per-vehicle state, indexed by `VehicleId`.
    pub vehicles: Vec<VehicleSnapshot>,
}

impl Snapshot {
    pub fn new(
        tick:      Tick,
        parcels:   BTreeMap<ParcelId, ParcelSpec>,
        available: BTreeSet<ParcelId>,
        vehicles:  Vec<VehicleSnapshot>,
    ) -> Self {
        Self { id: SnapshotId(0), tick, parcels, available, vehicles }
    }

    /// Return the same snapshot carrying `id`.
    pub fn stamped(mut self, id: SnapshotId) -> Self {
        self.id = id;
        self
    }

    /// `true` if any vehicle carries route information.
    pub fn has_routes(&self) -> bool {
        self.vehicles.iter().any(|v| v.route.is_some())
    }

    /// `true` while `parcel` still has to be delivered.
    pub fn is_open(&self, parcel: ParcelId) -> bool {
        self.available.contains(&parcel) || self.carrier(parcel).is_some()
    }

    /// The vehicle carrying `parcel`, if any.
    pub fn carrier(&self, parcel: ParcelId) -> Option<VehicleId> {
        self.vehicles.iter().find(|v| v.carries(parcel)).map(|v| v.id)
    }
}

// ── Schedule ─────────────────────────────────────────────────────────────────

/// One route per vehicle, in vehicle order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Schedule {
    routes: Vec<Route>,
}

impl Schedule {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// A schedule of `vehicles` empty routes.
    pub fn idle(vehicles: usize) -> Self {
        Self { routes: vec![Vec::new(); vehicles] }
    }

    #[inline]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn route(&self, vehicle: VehicleId) -> Option<&Route> {
        self.routes.get(vehicle.index())
    }

    /// Number of routes (== number of vehicles it was computed for).
    #[inline]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Check that this schedule has one route per vehicle of `snapshot`.
    pub fn check_fits(&self, snapshot: &Snapshot) -> PdResult<()> {
        if self.routes.len() != snapshot.vehicles.len() {
            return Err(PdError::VehicleCountMismatch {
                expected: snapshot.vehicles.len(),
                got:      self.routes.len(),
            });
        }
        Ok(())
    }
}

// ── Solve arguments ──────────────────────────────────────────────────────────

/// Which routes a snapshot carries for its vehicles.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RouteSeed {
    /// The routes the vehicles are currently following.
    #[default]
    Current,
    /// No route information (`VehicleSnapshot::route == None`).
    None,
    /// Caller-supplied routes, one per vehicle.
    Explicit(Vec<Route>),
}

/// Options for building a snapshot for a solve request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SolveArgs {
    pub routes: RouteSeed,
    /// Restrict the snapshot's available parcels to this set.
    pub parcels: Option<BTreeSet<ParcelId>>,
}

impl SolveArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_routes(mut self) -> Self {
        self.routes = RouteSeed::None;
        self
    }

    pub fn with_routes(mut self, routes: Vec<Route>) -> Self {
        self.routes = RouteSeed::Explicit(routes);
        self
    }

    pub fn restrict_to(mut self, parcels: BTreeSet<ParcelId>) -> Self {
        self.parcels = Some(parcels);
        self
    }
}

/// Anything that can describe the current problem: typically the simulation's
/// fleet state.
pub trait SnapshotSource {
    /// Build an unstamped snapshot of the current state honoring `args`.
    fn snapshot(&self, args: &SolveArgs) -> PdResult<Snapshot>;
}
