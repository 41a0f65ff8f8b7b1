use pd_core::{ParcelId, Route, Schedule, Snapshot, VehicleSnapshot};
use rustc_hash::FxHashMap;

use crate::{ReconcileError, ReconcileResult};

/// Occurrences of each parcel `vehicle`'s route must contain, in ascending
/// parcel order.
///
/// Carried parcels need one visit (delivery).  The committed destination
/// needs two: the visit in progress and the delivery after it.
pub fn expected_occurrences(vehicle: &VehicleSnapshot) -> Vec<(ParcelId, usize)> {
    let mut expected: Vec<(ParcelId, usize)> = vehicle.contents.iter().map(|&p| (p, 1)).collect();
    if let Some(dest) = vehicle.destination {
        match expected.binary_search_by_key(&dest, |&(p, _)| p) {
            Ok(i)  => expected[i].1 = 2,
            Err(i) => expected.insert(i, (dest, 2)),
        }
    }
    expected
}

/// Repair `schedule` so it agrees with the cargo and destinations in
/// `snapshot`.
///
/// # Errors
///
/// - [`ReconcileError::LengthMismatch`] if route and vehicle counts differ.
/// - [`ReconcileError::RoutePresent`] if any vehicle in `snapshot` carries a
///   route; build it with `SolveArgs::no_routes()`.
pub fn reconcile(schedule: &Schedule, snapshot: &Snapshot) -> ReconcileResult<Schedule> {
    if schedule.len() != snapshot.vehicles.len() {
        return Err(ReconcileError::LengthMismatch {
            routes:   schedule.len(),
            vehicles: snapshot.vehicles.len(),
        });
    }
    if let Some(v) = snapshot.vehicles.iter().find(|v| v.route.is_some()) {
        return Err(ReconcileError::RoutePresent(v.id));
    }

    let expected: Vec<Vec<(ParcelId, usize)>> =
        snapshot.vehicles.iter().map(expected_occurrences).collect();

    // Parcel → index of the vehicle that must serve it.
    let mut owner: FxHashMap<ParcelId, usize> = FxHashMap::default();
    for (i, parcels) in expected.iter().enumerate() {
        for &(p, _) in parcels {
            owner.entry(p).or_insert(i);
        }
    }

    let mut routes = schedule.routes().to_vec();
    for (i, route) in routes.iter_mut().enumerate() {
        route.retain(|p| match owner.get(p) {
            Some(&o) => o == i,
            None     => snapshot.available.contains(p),
        });

        for &(p, want) in &expected[i] {
            fix_count(route, p, want, snapshot.vehicles[i].destination == Some(p));
        }
        if let Some(dest) = snapshot.vehicles[i].destination {
            move_to_front(route, dest);
        }
    }
    Ok(Schedule::new(routes))
}

fn fix_count(route: &mut Route, parcel: ParcelId, want: usize, is_destination: bool) {
    let have = route.iter().filter(|&&p| p == parcel).count();
    if have < want {
        for _ in have..want {
            if is_destination {
                route.insert(0, parcel);
            } else {
                route.push(parcel);
            }
        }
    } else {
        let mut surplus = have - want;
        let mut i = route.len();
        while surplus > 0 && i > 0 {
            i -= 1;
            if route[i] == parcel {
                route.remove(i);
                surplus -= 1;
            }
        }
    }
}

fn move_to_front(route: &mut Route, parcel: ParcelId) {
    if let Some(pos) = route.iter().position(|&p| p == parcel).filter(|&pos| pos > 0) {
        route.remove(pos);
        route.insert(0, parcel);
    }
}
