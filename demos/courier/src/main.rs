//! courier — a small dispatching run on top of the real-time harness.
//!
//! Parcels trickle in at random ticks.  A greedy solver (deliberately slow,
//! so the clock has something to wait for) hands every open parcel to a
//! vehicle; a route follower walks the vehicles along their routes.
//!
//! ```text
//! cargo run --release -p courier
//! RUST_LOG=pd_realtime=debug COURIER_POOL=4 cargo run -p courier
//! ```

use std::collections::BTreeSet;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use pd_core::{
    ClockMode, ParcelId, ParcelSpec, PoolSize, RealtimeConfig, Route, Schedule, SimConfig, Snapshot,
    Tick, VehicleId,
};
use pd_sim::{ArrivalQueue, CentralPlanner, Fleet, ModeLog, SimBuilder, SimObserver, SimResult, TickContext, TickListener};
use pd_solver::{CancelToken, SolverHandle, SolverResult};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

// ── Constants ─────────────────────────────────────────────────────────────────

const SEED:             u64 = 42;
const VEHICLES:         usize = 3;
const PARCELS:          u32 = 24;
const TOTAL_TICKS:      u64 = 240;
const TICK_MS:          u64 = 25;
/// Parcels are announced uniformly over this many ticks.
const ARRIVAL_WINDOW:   u64 = 160;
/// Ticks to drive between two stops.
const TRAVEL_TICKS:     u64 = 4;
/// Simulated "thinking" per parcel in the greedy solver.
const THINK_PER_PARCEL: Duration = Duration::from_millis(3);

// ── Solver ────────────────────────────────────────────────────────────────────

/// Keeps every vehicle's committed work, then deals the remaining available
/// parcels round-robin to the least loaded vehicles.
fn greedy(snap: &Snapshot, cancel: &CancelToken) -> SolverResult<Schedule> {
    let mut routes: Vec<Route> = snap
        .vehicles
        .iter()
        .map(|v| v.route.clone().unwrap_or_default())
        .collect();

    let planned: BTreeSet<ParcelId> = routes.iter().flatten().copied().collect();
    for &parcel in snap.available.iter().filter(|p| !planned.contains(*p)) {
        cancel.check()?;
        thread::sleep(THINK_PER_PARCEL);

        let Some(route) = routes.iter_mut().min_by_key(|r| r.len()) else {
            break;
        };
        route.push(parcel);
        route.push(parcel);
    }
    Ok(Schedule::new(routes))
}

// ── Route follower ────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug)]
enum Stop {
    Pickup(ParcelId),
    Delivery(ParcelId),
}

/// Moves each vehicle along its route: drive, then serve the stop at the
/// head of the route.  The stop stays at the head until its service ends.
struct Follower {
    driving: Vec<u64>,
    serving: Vec<Option<Stop>>,
}

impl Follower {
    fn new(vehicles: usize) -> Self {
        Self { driving: vec![0; vehicles], serving: vec![None; vehicles] }
    }

    fn step_vehicle(&mut self, ctx: &mut TickContext<'_>, id: VehicleId) -> SimResult<()> {
        let i = id.index();
        let fleet = &mut *ctx.fleet;

        if let Some(stop) = self.serving[i] {
            let v = fleet.vehicle_mut(id)?;
            v.remaining_service = v.remaining_service.saturating_sub(1);
            if v.remaining_service > 0 {
                return Ok(());
            }
            let parcel = match stop {
                Stop::Pickup(p) | Stop::Delivery(p) => p,
            };
            if let Some(at) = v.route.iter().position(|&q| q == parcel) {
                v.route.remove(at);
            }
            v.destination = None;
            if let Stop::Delivery(p) = stop {
                fleet.unload(id, p)?;
                tracing::debug!(tick = %ctx.tick, vehicle = %id, parcel = %p, "delivered");
            }
            self.serving[i] = None;
            return Ok(());
        }

        let Some(&next) = fleet.vehicle(id)?.route.first() else {
            return Ok(());
        };
        if self.driving[i] == 0 {
            self.driving[i] = TRAVEL_TICKS;
            return Ok(());
        }
        self.driving[i] -= 1;
        if self.driving[i] > 0 {
            return Ok(());
        }

        let Some(spec) = fleet.parcel(next).cloned() else {
            // Delivered meanwhile; the next schedule drops it too.
            fleet.vehicle_mut(id)?.route.remove(0);
            return Ok(());
        };
        let stop = if fleet.vehicle(id)?.contents.contains(&next) {
            Stop::Delivery(next)
        } else if fleet.available().contains(&next) {
            fleet.load(id, next)?;
            Stop::Pickup(next)
        } else {
            // Another vehicle got there first.
            fleet.vehicle_mut(id)?.route.remove(0);
            return Ok(());
        };
        let v = fleet.vehicle_mut(id)?;
        v.destination = Some(next);
        v.remaining_service = match stop {
            Stop::Pickup(_)   => spec.pickup_ticks.max(1),
            Stop::Delivery(_) => spec.delivery_ticks.max(1),
        };
        self.serving[i] = Some(stop);
        Ok(())
    }
}

impl TickListener for Follower {
    fn tick(&mut self, ctx: &mut TickContext<'_>) -> SimResult<()> {
        for i in 0..ctx.fleet.vehicle_count() {
            self.step_vehicle(ctx, VehicleId(i as u32))?;
        }
        Ok(())
    }
}

// ── Progress ──────────────────────────────────────────────────────────────────

struct Progress {
    modes:   ModeLog,
    arrived: usize,
}

impl SimObserver for Progress {
    fn on_run_start(&mut self, tick: Tick, mode: ClockMode) {
        self.modes.on_run_start(tick, mode);
    }

    fn on_tick_end(&mut self, tick: Tick, arrivals: usize) {
        self.modes.on_tick_end(tick, arrivals);
        self.arrived += arrivals;
        if tick.0 % 40 == 0 {
            println!("  tick {:>4}  announced {:>3}", tick.0, self.arrived);
        }
    }

    fn on_clock_mode(&mut self, tick: Tick, mode: ClockMode) {
        self.modes.on_clock_mode(tick, mode);
        println!("  tick {:>4}  clock -> {mode}", tick.0);
    }
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let pool_size: PoolSize = match std::env::var("COURIER_POOL") {
        Ok(s)  => s.parse().context("parsing COURIER_POOL")?,
        Err(_) => PoolSize::Auto,
    };

    println!("=== courier ===");
    println!("vehicles={VEHICLES}  parcels={PARCELS}  ticks={TOTAL_TICKS}  tick={TICK_MS}ms  pool={pool_size}");

    // ── Arrivals ──────────────────────────────────────────────────────────
    let mut rng = SmallRng::seed_from_u64(SEED);
    let arrivals: ArrivalQueue = (0..PARCELS)
        .map(|n| {
            ParcelSpec::new(ParcelId(n), Tick(rng.gen_range(0..ARRIVAL_WINDOW)))
                .with_service(rng.gen_range(1..=3), rng.gen_range(1..=3))
        })
        .collect();

    // ── Build ─────────────────────────────────────────────────────────────
    let config = SimConfig { tick_length_ms: TICK_MS, total_ticks: TOTAL_TICKS, seed: SEED };
    let realtime = RealtimeConfig::single().with_pool_size(pool_size);
    let mut sim = SimBuilder::new(config, realtime, Fleet::new(VEHICLES))
        .arrivals(arrivals)
        .build()
        .context("building simulation")?;

    sim.add_listener(Follower::new(VEHICLES));
    let planner = CentralPlanner::new(sim.manager(), SolverHandle::batch(greedy))?;
    sim.add_listener(planner);

    // ── Run ───────────────────────────────────────────────────────────────
    let mut progress = Progress { modes: ModeLog::new(), arrived: 0 };
    let started = Instant::now();
    sim.run(&mut progress).context("running simulation")?;

    println!();
    println!("delivered    {:>6} / {PARCELS}", sim.fleet.delivered().len());
    println!("still open   {:>6}", sim.fleet.open_count());
    println!("simulated    {:>6} steps", progress.modes.steps[0]);
    println!("real time    {:>6} steps", progress.modes.steps[1]);
    println!("mode changes {:>6}", progress.modes.transitions.len());
    println!("wall time    {:>6.2?}", started.elapsed());
    Ok(())
}
