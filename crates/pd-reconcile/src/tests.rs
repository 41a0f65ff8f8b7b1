//! Unit tests for pd-reconcile.

use std::collections::{BTreeMap, BTreeSet};

use pd_core::{ParcelId, ParcelSpec, Route, Schedule, Snapshot, Tick, VehicleId, VehicleSnapshot};

use crate::{ReconcileError, expected_occurrences, reconcile};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn p(n: u32) -> ParcelId {
    ParcelId(n)
}

fn vehicle(id: u32, contents: &[u32], destination: Option<u32>) -> VehicleSnapshot {
    let mut v = VehicleSnapshot::new(VehicleId(id));
    v.contents = contents.iter().copied().map(ParcelId).collect();
    v.destination = destination.map(ParcelId);
    v
}

fn snapshot(available: &[u32], vehicles: Vec<VehicleSnapshot>) -> Snapshot {
    let available: BTreeSet<ParcelId> = available.iter().copied().map(ParcelId).collect();
    let parcels: BTreeMap<ParcelId, ParcelSpec> = available
        .iter()
        .copied()
        .chain(vehicles.iter().flat_map(|v| v.contents.iter().copied()))
        .map(|id| (id, ParcelSpec::new(id, Tick::ZERO)))
        .collect();
    Snapshot::new(Tick(10), parcels, available, vehicles)
}

fn schedule(routes: &[&[u32]]) -> Schedule {
    Schedule::new(routes.iter().map(|r| r.iter().copied().map(ParcelId).collect()).collect())
}

fn count(route: &Route, parcel: ParcelId) -> usize {
    route.iter().filter(|&&q| q == parcel).count()
}

// ── Preconditions ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod preconditions {
    use super::*;

    #[test]
    fn route_count_must_match() {
        let snap = snapshot(&[], vec![vehicle(0, &[], None), vehicle(1, &[], None)]);
        assert_eq!(
            reconcile(&schedule(&[&[]]), &snap),
            Err(ReconcileError::LengthMismatch { routes: 1, vehicles: 2 }),
        );
    }

    #[test]
    fn snapshot_must_not_carry_routes() {
        let mut v = vehicle(0, &[], None);
        v.route = Some(vec![p(1)]);
        let snap = snapshot(&[1], vec![v]);
        assert_eq!(reconcile(&schedule(&[&[1, 1]]), &snap), Err(ReconcileError::RoutePresent(VehicleId(0))));
    }

    #[test]
    fn empty_fleet_is_fine() {
        let snap = snapshot(&[], vec![]);
        assert!(reconcile(&Schedule::default(), &snap).unwrap().is_empty());
    }
}

// ── Repairs ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod repairs {
    use super::*;

    #[test]
    fn carried_destination_moves_to_its_carrier() {
        // Vehicle 0 carries parcel 1 and is committed to it; the stale
        // schedule gave it to vehicle 1.
        let snap = snapshot(&[2, 3], vec![vehicle(0, &[1], Some(1)), vehicle(1, &[], None)]);
        let fixed = reconcile(&schedule(&[&[3, 3], &[2, 1, 2, 1]]), &snap).unwrap();

        assert_eq!(fixed.routes()[0][0], p(1));
        assert_eq!(count(&fixed.routes()[0], p(1)), 2);
        assert_eq!(count(&fixed.routes()[1], p(1)), 0);
        assert_eq!(fixed.routes()[1], vec![p(2), p(2)]);
    }

    #[test]
    fn delivered_parcels_are_stripped() {
        // Parcel 4 is neither available nor carried: delivered.
        let snap = snapshot(&[5], vec![vehicle(0, &[], None), vehicle(1, &[], None)]);
        let fixed = reconcile(&schedule(&[&[4, 5, 5, 4], &[4]]), &snap).unwrap();
        assert_eq!(fixed, schedule(&[&[5, 5], &[]]));
    }

    #[test]
    fn missing_delivery_is_appended() {
        let snap = snapshot(&[7], vec![vehicle(0, &[6], None)]);
        let fixed = reconcile(&schedule(&[&[7, 7]]), &snap).unwrap();
        assert_eq!(fixed, schedule(&[&[7, 7, 6]]));
    }

    #[test]
    fn surplus_occurrences_are_removed_from_the_back() {
        // Parcel 6 was still waiting for pickup when the schedule was made.
        let snap = snapshot(&[7], vec![vehicle(0, &[6], None)]);
        let fixed = reconcile(&schedule(&[&[6, 7, 6, 7]]), &snap).unwrap();
        assert_eq!(fixed, schedule(&[&[6, 7, 7]]));
    }

    #[test]
    fn uncarried_destination_gets_pickup_and_delivery() {
        let snap = snapshot(&[8, 9], vec![vehicle(0, &[], Some(8)), vehicle(1, &[], None)]);
        let fixed = reconcile(&schedule(&[&[9, 9], &[8, 8]]), &snap).unwrap();
        assert_eq!(fixed, schedule(&[&[8, 8, 9, 9], &[]]));
    }

    #[test]
    fn displaced_destination_moves_to_front() {
        let snap = snapshot(&[2], vec![vehicle(0, &[1, 3], Some(3))]);
        let fixed = reconcile(&schedule(&[&[1, 2, 3, 2, 3]]), &snap).unwrap();
        assert_eq!(fixed, schedule(&[&[3, 1, 2, 2, 3]]));
    }

    #[test]
    fn consistent_schedule_is_untouched() {
        let snap = snapshot(&[2, 4, 5], vec![vehicle(0, &[1], Some(2)), vehicle(1, &[3], None)]);
        let s = schedule(&[&[2, 1, 4, 2, 4], &[5, 3, 5]]);
        assert_eq!(reconcile(&s, &snap).unwrap(), s);
    }

    #[test]
    fn expected_occurrences_are_sorted() {
        let v = vehicle(0, &[9, 2], Some(5));
        assert_eq!(expected_occurrences(&v), vec![(p(2), 1), (p(5), 2), (p(9), 1)]);
        let v = vehicle(0, &[9, 2], Some(9));
        assert_eq!(expected_occurrences(&v), vec![(p(2), 1), (p(9), 2)]);
    }
}

// ── Randomized properties ─────────────────────────────────────────────────────

#[cfg(test)]
mod properties {
    use rand::rngs::SmallRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    use super::*;

    const PARCELS: u32 = 24;
    const VEHICLES: u32 = 4;

    /// A well-formed snapshot: each parcel is delivered, available or carried
    /// by exactly one vehicle, and destinations are never shared.
    fn random_snapshot(rng: &mut SmallRng) -> Snapshot {
        let mut available = Vec::new();
        let mut contents: Vec<Vec<u32>> = vec![Vec::new(); VEHICLES as usize];
        for parcel in 0..PARCELS {
            match rng.gen_range(0..3) {
                0 => {}
                1 => available.push(parcel),
                _ => contents[rng.gen_range(0..VEHICLES as usize)].push(parcel),
            }
        }

        let mut free = available.clone();
        free.shuffle(rng);
        let vehicles = (0..VEHICLES)
            .map(|v| {
                let carried = &contents[v as usize];
                let destination = match rng.gen_range(0..3) {
                    0 if !carried.is_empty() => Some(carried[rng.gen_range(0..carried.len())]),
                    1 => free.pop(),
                    _ => None,
                };
                vehicle(v, carried, destination)
            })
            .collect();
        snapshot(&available, vehicles)
    }

    /// Arbitrary routes over all parcel ids, including delivered ones.
    fn random_schedule(rng: &mut SmallRng) -> Schedule {
        let routes = (0..VEHICLES)
            .map(|_| {
                let len = rng.gen_range(0..12);
                (0..len).map(|_| ParcelId(rng.gen_range(0..PARCELS))).collect()
            })
            .collect();
        Schedule::new(routes)
    }

    #[test]
    fn reconcile_is_idempotent() {
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        for _ in 0..500 {
            let snap = random_snapshot(&mut rng);
            let once = reconcile(&random_schedule(&mut rng), &snap).unwrap();
            let twice = reconcile(&once, &snap).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn expected_parcels_are_owned_exclusively() {
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..500 {
            let snap = random_snapshot(&mut rng);
            let fixed = reconcile(&random_schedule(&mut rng), &snap).unwrap();

            for (i, v) in snap.vehicles.iter().enumerate() {
                for (parcel, want) in expected_occurrences(v) {
                    assert_eq!(count(&fixed.routes()[i], parcel), want);
                    for (j, other) in fixed.routes().iter().enumerate() {
                        if j != i {
                            assert_eq!(count(other, parcel), 0, "{parcel} leaked to vehicle {j}");
                        }
                    }
                }
                if let Some(dest) = v.destination {
                    assert_eq!(fixed.routes()[i].first(), Some(&dest));
                }
            }
        }
    }

    #[test]
    fn only_open_parcels_survive() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..200 {
            let snap = random_snapshot(&mut rng);
            let fixed = reconcile(&random_schedule(&mut rng), &snap).unwrap();
            for route in fixed.routes() {
                assert!(route.iter().all(|&q| snap.is_open(q)));
            }
        }
    }
}
