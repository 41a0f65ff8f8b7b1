//! Fleet and parcel state the harness keeps between steps.
//!
//! `Fleet` is deliberately thin: it stores cargo, destinations and routes and
//! answers snapshot requests.  How vehicles move along their routes is up to
//! the [`TickListener`][crate::TickListener]s driving it.

use std::collections::{BTreeMap, BTreeSet};

use pd_core::{
    ParcelId, ParcelSpec, PdError, PdResult, Route, RouteSeed, Schedule, Snapshot, SnapshotSource,
    SolveArgs, Tick, VehicleId, VehicleSnapshot,
};

/// Mutable per-vehicle state.
#[derive(Clone, Debug, Default)]
pub struct VehicleState {
    pub route:             Route,
    pub contents:          BTreeSet<ParcelId>,
    pub destination:       Option<ParcelId>,
    pub remaining_service: u64,
}

#[derive(Clone, Debug, Default)]
pub struct Fleet {
    tick:      Tick,
    parcels:   BTreeMap<ParcelId, ParcelSpec>,
    available: BTreeSet<ParcelId>,
    vehicles:  Vec<VehicleState>,
    delivered: Vec<ParcelId>,
}

impl Fleet {
    /// A fleet of `vehicles` empty, idle vehicles.
    pub fn new(vehicles: usize) -> Self {
        Self { vehicles: vec![VehicleState::default(); vehicles], ..Self::default() }
    }

    #[inline]
    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub(crate) fn set_tick(&mut self, tick: Tick) {
        self.tick = tick;
    }

    #[inline]
    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn vehicle(&self, id: VehicleId) -> PdResult<&VehicleState> {
        self.vehicles.get(id.index()).ok_or(PdError::VehicleNotFound(id))
    }

    pub fn vehicle_mut(&mut self, id: VehicleId) -> PdResult<&mut VehicleState> {
        self.vehicles.get_mut(id.index()).ok_or(PdError::VehicleNotFound(id))
    }

    pub fn vehicles(&self) -> impl Iterator<Item = (VehicleId, &VehicleState)> {
        self.vehicles.iter().enumerate().map(|(i, v)| (VehicleId(i as u32), v))
    }

    pub fn parcel(&self, id: ParcelId) -> Option<&ParcelSpec> {
        self.parcels.get(&id)
    }

    pub fn available(&self) -> &BTreeSet<ParcelId> {
        &self.available
    }

    /// Delivered parcels, in delivery order.
    pub fn delivered(&self) -> &[ParcelId] {
        &self.delivered
    }

    /// Parcels announced but not yet delivered.
    pub fn open_count(&self) -> usize {
        self.parcels.len()
    }

    /// Snapshot of the current state with no route information, as
    /// [`pd_reconcile::reconcile`] expects.
    pub fn snapshot_without_routes(&self) -> PdResult<Snapshot> {
        self.snapshot(&SolveArgs::new().no_routes())
    }

    // ── Mutators ──────────────────────────────────────────────────────────

    /// Make a newly announced parcel available for pickup.
    pub fn announce(&mut self, spec: ParcelSpec) {
        self.available.insert(spec.id);
        self.parcels.insert(spec.id, spec);
    }

    /// Move an available parcel into `vehicle`'s cargo.
    pub fn load(&mut self, vehicle: VehicleId, parcel: ParcelId) -> PdResult<()> {
        if !self.available.contains(&parcel) {
            return Err(PdError::ParcelNotFound(parcel));
        }
        self.vehicle_mut(vehicle)?.contents.insert(parcel);
        self.available.remove(&parcel);
        Ok(())
    }

    /// Remove a carried parcel from `vehicle` and mark it delivered.
    pub fn unload(&mut self, vehicle: VehicleId, parcel: ParcelId) -> PdResult<()> {
        let v = self.vehicle_mut(vehicle)?;
        if !v.contents.remove(&parcel) {
            return Err(PdError::ParcelNotFound(parcel));
        }
        if v.destination == Some(parcel) {
            v.destination = None;
        }
        self.parcels.remove(&parcel);
        self.delivered.push(parcel);
        Ok(())
    }

    /// Replace every vehicle's route with the matching route of `schedule`.
    pub fn apply_routes(&mut self, schedule: &Schedule) -> PdResult<()> {
        if schedule.len() != self.vehicles.len() {
            return Err(PdError::VehicleCountMismatch {
                expected: self.vehicles.len(),
                got:      schedule.len(),
            });
        }
        for (vehicle, route) in self.vehicles.iter_mut().zip(schedule.routes()) {
            vehicle.route.clone_from(route);
        }
        Ok(())
    }
}

impl SnapshotSource for Fleet {
    fn snapshot(&self, args: &SolveArgs) -> PdResult<Snapshot> {
        if let RouteSeed::Explicit(routes) = &args.routes {
            if routes.len() != self.vehicles.len() {
                return Err(PdError::VehicleCountMismatch {
                    expected: self.vehicles.len(),
                    got:      routes.len(),
                });
            }
        }

        let available = match &args.parcels {
            Some(only) => self.available.intersection(only).copied().collect(),
            None       => self.available.clone(),
        };
        let vehicles = self
            .vehicles
            .iter()
            .enumerate()
            .map(|(i, v)| VehicleSnapshot {
                id:                VehicleId(i as u32),
                route:             match &args.routes {
                    RouteSeed::Current          => Some(v.route.clone()),
                    RouteSeed::None             => None,
                    RouteSeed::Explicit(routes) => Some(routes[i].clone()),
                },
                contents:          v.contents.clone(),
                destination:       v.destination,
                remaining_service: v.remaining_service,
            })
            .collect();

        Ok(Snapshot::new(self.tick, self.parcels.clone(), available, vehicles))
    }
}
