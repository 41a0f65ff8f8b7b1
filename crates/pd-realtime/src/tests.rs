//! Unit tests for pd-realtime.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use pd_core::{
    BridgeId, ClockMode, PdResult, PoolSize, RealtimeConfig, Schedule, Snapshot, SnapshotId,
    SnapshotSource, SolveArgs, Tick, VehicleId, VehicleSnapshot,
};
use pd_pool::NoAffinity;
use pd_solver::{CancelToken, RealtimeSolver, Scheduler, SolverError, SolverHandle, SolverResult};

use crate::{BridgeListener, CoordinationManager, RealtimeClock, RealtimeError, SolverBridge};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Clock that applies every request immediately and records it.
struct FakeClock {
    mode:      Mutex<ClockMode>,
    advancing: AtomicBool,
    requests:  Mutex<Vec<ClockMode>>,
}

impl FakeClock {
    fn new(mode: ClockMode) -> Arc<Self> {
        Arc::new(Self {
            mode:      Mutex::new(mode),
            advancing: AtomicBool::new(true),
            requests:  Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ClockMode> {
        self.requests.lock().clone()
    }

    fn simulated_requests(&self) -> usize {
        self.requests().iter().filter(|m| **m == ClockMode::Simulated).count()
    }
}

impl RealtimeClock for FakeClock {
    fn mode(&self) -> ClockMode {
        *self.mode.lock()
    }

    fn request_real_time(&self) {
        *self.mode.lock() = ClockMode::RealTime;
        self.requests.lock().push(ClockMode::RealTime);
    }

    fn request_simulated(&self) {
        *self.mode.lock() = ClockMode::Simulated;
        self.requests.lock().push(ClockMode::Simulated);
    }

    fn is_advancing(&self) -> bool {
        self.advancing.load(Ordering::Acquire)
    }
}

/// Snapshot source with a fixed number of idle vehicles.
struct Vehicles(u32);

impl SnapshotSource for Vehicles {
    fn snapshot(&self, _args: &SolveArgs) -> PdResult<Snapshot> {
        let vehicles = (0..self.0).map(|v| VehicleSnapshot::new(VehicleId(v))).collect();
        Ok(Snapshot::new(Tick(0), Default::default(), Default::default(), vehicles))
    }
}

#[derive(Debug, PartialEq)]
enum Event {
    Start(BridgeId),
    New(BridgeId, SnapshotId),
    Done(BridgeId),
}

struct EventLog(Sender<Event>);

impl BridgeListener for EventLog {
    fn on_start_computing(&self, bridge: BridgeId) {
        self.0.send(Event::Start(bridge)).unwrap();
    }

    fn on_new_schedule(&self, bridge: BridgeId, _schedule: &Schedule, snapshot: &Arc<Snapshot>) {
        self.0.send(Event::New(bridge, snapshot.id)).unwrap();
    }

    fn on_done_computing(&self, bridge: BridgeId) {
        self.0.send(Event::Done(bridge)).unwrap();
    }
}

fn config(multi: bool) -> RealtimeConfig {
    let base = if multi { RealtimeConfig::multi() } else { RealtimeConfig::single() };
    base.with_pool_size(PoolSize::Fixed(NonZeroUsize::new(2).unwrap()))
}

fn manager(clock: &Arc<FakeClock>, multi: bool) -> Arc<CoordinationManager> {
    CoordinationManager::new(config(multi), Arc::clone(clock) as Arc<dyn RealtimeClock>, Arc::new(NoAffinity))
        .unwrap()
}

fn logged(bridge: &SolverBridge) -> Receiver<Event> {
    let (tx, rx) = unbounded();
    bridge.add_listener(Arc::new(EventLog(tx)));
    rx
}

fn idle_solver(snap: &Snapshot, _cancel: &CancelToken) -> SolverResult<Schedule> {
    Ok(Schedule::idle(snap.vehicles.len()))
}

/// Blocks until `released` is set or its token is cancelled.
fn gated(released: &Arc<AtomicBool>) -> SolverHandle {
    let released = Arc::clone(released);
    SolverHandle::batch(move |snap: &Snapshot, cancel: &CancelToken| -> SolverResult<Schedule> {
        loop {
            cancel.check()?;
            if released.load(Ordering::Acquire) {
                return Ok(Schedule::idle(snap.vehicles.len()));
            }
            thread::sleep(Duration::from_millis(1));
        }
    })
}

const WAIT: Duration = Duration::from_secs(2);

// ── Bridge ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod bridge {
    use super::*;

    #[test]
    fn no_schedule_before_first_publish() {
        let clock = FakeClock::new(ClockMode::Simulated);
        let mgr = manager(&clock, false);
        let bridge = SolverBridge::new(&mgr, SolverHandle::batch(idle_solver)).unwrap();

        assert!(matches!(bridge.current_schedule(), Err(RealtimeError::NoSchedule)));
        assert!(!bridge.is_schedule_updated());
        assert!(bridge.current_state().is_none());
        mgr.shutdown();
    }

    #[test]
    fn updated_flag_is_consumed_once() {
        let clock = FakeClock::new(ClockMode::Simulated);
        let mgr = manager(&clock, false);
        let bridge = SolverBridge::new(&mgr, SolverHandle::batch(idle_solver)).unwrap();
        let events = logged(&bridge);

        let id = bridge.solve(&Vehicles(2), SolveArgs::new()).unwrap();
        assert_eq!(events.recv_timeout(WAIT).unwrap(), Event::Start(bridge.id()));
        assert_eq!(events.recv_timeout(WAIT).unwrap(), Event::New(bridge.id(), id));
        assert_eq!(events.recv_timeout(WAIT).unwrap(), Event::Done(bridge.id()));

        assert!(bridge.is_schedule_updated());
        assert_eq!(bridge.current_schedule().unwrap().len(), 2);
        assert!(!bridge.is_schedule_updated());
        assert!(bridge.current_schedule().is_ok());
        assert!(!bridge.is_schedule_updated());
        assert_eq!(bridge.schedule_snapshot().unwrap().id, id);
        mgr.shutdown();
    }

    #[test]
    fn back_to_back_solves_publish_once() {
        let clock = FakeClock::new(ClockMode::Simulated);
        let mgr = manager(&clock, false);
        let released = Arc::new(AtomicBool::new(false));
        let bridge = SolverBridge::new(&mgr, gated(&released)).unwrap();
        let events = logged(&bridge);
        let b = bridge.id();

        let first = bridge.solve(&Vehicles(1), SolveArgs::new()).unwrap();
        let second = bridge.solve(&Vehicles(1), SolveArgs::new()).unwrap();
        assert!(second > first);
        assert_eq!(events.recv_timeout(WAIT).unwrap(), Event::Start(b));
        assert_eq!(events.recv_timeout(WAIT).unwrap(), Event::Done(b));
        assert_eq!(events.recv_timeout(WAIT).unwrap(), Event::Start(b));

        released.store(true, Ordering::Release);
        assert_eq!(events.recv_timeout(WAIT).unwrap(), Event::New(b, second));
        assert_eq!(events.recv_timeout(WAIT).unwrap(), Event::Done(b));
        assert!(events.recv_timeout(Duration::from_millis(50)).is_err());

        // The cancelled computation is not a failure.
        assert!(mgr.after_step().is_ok());
        assert_eq!(mgr.pending_failures(), 0);
        mgr.shutdown();
    }

    #[test]
    fn cancel_keeps_last_schedule() {
        let clock = FakeClock::new(ClockMode::Simulated);
        let mgr = manager(&clock, false);
        let released = Arc::new(AtomicBool::new(true));
        let bridge = SolverBridge::new(&mgr, gated(&released)).unwrap();
        let events = logged(&bridge);

        let first = bridge.solve(&Vehicles(3), SolveArgs::new()).unwrap();
        assert_eq!(events.recv_timeout(WAIT).unwrap(), Event::Start(bridge.id()));
        assert_eq!(events.recv_timeout(WAIT).unwrap(), Event::New(bridge.id(), first));
        assert_eq!(events.recv_timeout(WAIT).unwrap(), Event::Done(bridge.id()));

        released.store(false, Ordering::Release);
        bridge.solve(&Vehicles(3), SolveArgs::new()).unwrap();
        assert!(bridge.is_computing());
        bridge.cancel();
        assert!(!bridge.is_computing());
        assert_eq!(events.recv_timeout(WAIT).unwrap(), Event::Start(bridge.id()));
        assert_eq!(events.recv_timeout(WAIT).unwrap(), Event::Done(bridge.id()));

        assert_eq!(bridge.schedule_snapshot().unwrap().id, first);
        assert_eq!(bridge.current_schedule().unwrap().len(), 3);
        bridge.cancel();
        assert!(events.recv_timeout(Duration::from_millis(50)).is_err());
        mgr.shutdown();
    }

    #[test]
    fn solve_after_shutdown_is_refused() {
        let clock = FakeClock::new(ClockMode::Simulated);
        let mgr = manager(&clock, false);
        let bridge = SolverBridge::new(&mgr, SolverHandle::batch(idle_solver)).unwrap();
        mgr.shutdown();
        assert!(matches!(bridge.solve(&Vehicles(1), SolveArgs::new()), Err(RealtimeError::ShutDown)));
    }

    /// Native solver that never reports its cancelled computations.
    struct Forgetful {
        computing: bool,
    }

    impl RealtimeSolver for Forgetful {
        fn init(&mut self, _scheduler: Arc<dyn Scheduler>) {}

        fn problem_changed(&mut self, _snapshot: Arc<Snapshot>) {
            self.computing = true;
        }

        fn cancel(&mut self) {
            self.computing = false;
        }

        fn is_computing(&self) -> bool {
            self.computing
        }
    }

    #[test]
    fn done_is_fired_for_solvers_that_forget_it() {
        let clock = FakeClock::new(ClockMode::Simulated);
        let mgr = manager(&clock, false);
        let bridge = SolverBridge::new(&mgr, SolverHandle::native(Forgetful { computing: false })).unwrap();
        let events = logged(&bridge);

        bridge.solve(&Vehicles(1), SolveArgs::new()).unwrap();
        assert!(mgr.is_computing());
        bridge.solve(&Vehicles(1), SolveArgs::new()).unwrap();
        bridge.cancel();

        let seen: Vec<Event> = events.try_iter().collect();
        let b = bridge.id();
        assert_eq!(seen, vec![Event::Start(b), Event::Done(b), Event::Start(b), Event::Done(b)]);
        assert!(!mgr.is_computing());
        mgr.shutdown();
    }
}

// ── Manager ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod manager {
    use super::*;

    #[test]
    fn new_work_requests_real_time() {
        let clock = FakeClock::new(ClockMode::Simulated);
        let mgr = manager(&clock, false);
        mgr.notify_new_work();
        assert_eq!(clock.requests(), vec![ClockMode::RealTime]);
        mgr.shutdown();
    }

    #[test]
    fn first_start_requests_real_time() {
        let clock = FakeClock::new(ClockMode::Simulated);
        let mgr = manager(&clock, true);
        let released = Arc::new(AtomicBool::new(false));
        let a = SolverBridge::new(&mgr, gated(&released)).unwrap();
        let b = SolverBridge::new(&mgr, gated(&released)).unwrap();

        a.solve(&Vehicles(1), SolveArgs::new()).unwrap();
        b.solve(&Vehicles(1), SolveArgs::new()).unwrap();
        assert_eq!(clock.requests(), vec![ClockMode::RealTime]);
        assert_eq!(mgr.computing_count(), 2);

        released.store(true, Ordering::Release);
        assert!(mgr.wait_quiescent(Instant::now() + WAIT));
        mgr.shutdown();
    }

    #[test]
    fn simulated_requested_at_end_of_second_quiet_step() {
        let clock = FakeClock::new(ClockMode::RealTime);
        let mgr = manager(&clock, false);

        mgr.after_step().unwrap();
        assert_eq!(clock.simulated_requests(), 0, "one quiet step is not enough");
        mgr.after_step().unwrap();
        assert_eq!(clock.simulated_requests(), 1);
        mgr.after_step().unwrap();
        mgr.after_step().unwrap();
        assert_eq!(clock.simulated_requests(), 1);
        mgr.shutdown();
    }

    #[test]
    fn new_work_restarts_the_debounce() {
        let clock = FakeClock::new(ClockMode::RealTime);
        let mgr = manager(&clock, false);

        mgr.after_step().unwrap();
        mgr.notify_new_work();
        mgr.after_step().unwrap();
        assert_eq!(clock.simulated_requests(), 0);
        mgr.after_step().unwrap();
        assert_eq!(clock.simulated_requests(), 1);
        mgr.shutdown();
    }

    #[test]
    fn computing_steps_hold_real_time() {
        let clock = FakeClock::new(ClockMode::Simulated);
        let mgr = manager(&clock, false);
        let released = Arc::new(AtomicBool::new(false));
        let bridge = SolverBridge::new(&mgr, gated(&released)).unwrap();

        bridge.solve(&Vehicles(1), SolveArgs::new()).unwrap();
        for _ in 0..3 {
            mgr.after_step().unwrap();
        }
        assert_eq!(clock.simulated_requests(), 0);

        released.store(true, Ordering::Release);
        assert!(mgr.wait_quiescent(Instant::now() + WAIT));
        mgr.after_step().unwrap();
        assert_eq!(clock.simulated_requests(), 0);
        mgr.after_step().unwrap();
        assert_eq!(clock.simulated_requests(), 1);
        mgr.shutdown();
    }

    #[test]
    fn step_with_a_finished_computation_is_not_quiet() {
        let clock = FakeClock::new(ClockMode::Simulated);
        let mgr = manager(&clock, false);
        let bridge = SolverBridge::new(&mgr, SolverHandle::batch(idle_solver)).unwrap();

        bridge.solve(&Vehicles(1), SolveArgs::new()).unwrap();
        assert!(mgr.wait_quiescent(Instant::now() + WAIT));
        mgr.after_step().unwrap();
        mgr.after_step().unwrap();
        assert_eq!(clock.simulated_requests(), 0, "only one quiet step so far");
        mgr.after_step().unwrap();
        assert_eq!(clock.simulated_requests(), 1);
        mgr.shutdown();
    }

    #[test]
    fn stopped_clock_is_left_alone() {
        let clock = FakeClock::new(ClockMode::RealTime);
        clock.advancing.store(false, Ordering::Release);
        let mgr = manager(&clock, false);
        for _ in 0..4 {
            mgr.after_step().unwrap();
        }
        assert_eq!(clock.simulated_requests(), 0);
        mgr.shutdown();
    }

    #[test]
    fn worker_failure_is_reraised_and_pool_shut_down() {
        let clock = FakeClock::new(ClockMode::Simulated);
        let mgr = manager(&clock, false);
        let failing = |_: &Snapshot, _: &CancelToken| -> SolverResult<Schedule> {
            Err(SolverError::Failed("no feasible route".into()))
        };
        let bridge = SolverBridge::new(&mgr, SolverHandle::batch(failing)).unwrap();

        bridge.solve(&Vehicles(1), SolveArgs::new()).unwrap();
        assert!(mgr.wait_quiescent(Instant::now() + WAIT));

        match mgr.after_step() {
            Err(RealtimeError::Solver(SolverError::Failed(msg))) => assert_eq!(msg, "no feasible route"),
            other => panic!("expected the solver failure, got {other:?}"),
        }
        assert!(mgr.is_shut_down());
        assert!(mgr.pool().is_shut_down());
        assert!(mgr.after_step().is_ok(), "a failure is raised once");
    }

    #[test]
    fn panicking_solver_is_reraised() {
        let clock = FakeClock::new(ClockMode::Simulated);
        let mgr = manager(&clock, false);
        let panicking = |_: &Snapshot, _: &CancelToken| -> SolverResult<Schedule> { panic!("bad index") };
        let bridge = SolverBridge::new(&mgr, SolverHandle::batch(panicking)).unwrap();

        bridge.solve(&Vehicles(1), SolveArgs::new()).unwrap();
        assert!(mgr.wait_quiescent(Instant::now() + WAIT));
        assert!(matches!(
            mgr.after_step(),
            Err(RealtimeError::Solver(SolverError::Panicked(msg))) if msg == "bad index"
        ));
    }

    #[test]
    fn cancellations_are_not_failures() {
        let clock = FakeClock::new(ClockMode::Simulated);
        let mgr = manager(&clock, false);
        mgr.report_failure(BridgeId(0), SolverError::Cancelled);
        assert_eq!(mgr.pending_failures(), 0);
        assert!(mgr.after_step().is_ok());
        assert!(!mgr.is_shut_down());
        mgr.shutdown();
    }

    #[test]
    fn finish_reraises_queued_failure() {
        let clock = FakeClock::new(ClockMode::Simulated);
        let mgr = manager(&clock, false);
        mgr.report_failure(BridgeId(0), SolverError::Failed("late".into()));
        assert!(matches!(mgr.finish(), Err(RealtimeError::Solver(_))));
        assert!(mgr.is_shut_down());
        assert!(mgr.finish().is_ok());
    }

    #[test]
    fn single_mode_allows_one_bridge() {
        let clock = FakeClock::new(ClockMode::Simulated);
        let mgr = manager(&clock, false);
        let first = SolverBridge::new(&mgr, SolverHandle::batch(idle_solver)).unwrap();
        assert!(matches!(
            SolverBridge::new(&mgr, SolverHandle::batch(idle_solver)),
            Err(RealtimeError::Config(_))
        ));
        drop(first);
        assert!(SolverBridge::new(&mgr, SolverHandle::batch(idle_solver)).is_ok());
        mgr.shutdown();
    }

    #[test]
    fn multi_mode_allows_many_bridges() {
        let clock = FakeClock::new(ClockMode::Simulated);
        let mgr = manager(&clock, true);
        let bridges: Vec<_> = (0..4)
            .map(|_| SolverBridge::new(&mgr, SolverHandle::batch(idle_solver)).unwrap())
            .collect();
        assert_eq!(mgr.bridges().len(), 4);
        let ids: std::collections::BTreeSet<_> = bridges.iter().map(|b| b.id()).collect();
        assert_eq!(ids.len(), 4);
        mgr.shutdown();
    }

    #[test]
    fn wait_quiescent_respects_deadline() {
        let clock = FakeClock::new(ClockMode::Simulated);
        let mgr = manager(&clock, false);
        assert!(mgr.wait_quiescent(Instant::now()), "idle manager is quiescent");

        let released = Arc::new(AtomicBool::new(false));
        let bridge = SolverBridge::new(&mgr, gated(&released)).unwrap();
        bridge.solve(&Vehicles(1), SolveArgs::new()).unwrap();
        let started = Instant::now();
        assert!(!mgr.wait_quiescent(started + Duration::from_millis(20)));
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(20));
        assert!(waited < WAIT, "returned at the deadline, not when the solver finished");

        released.store(true, Ordering::Release);
        assert!(mgr.wait_quiescent(Instant::now() + WAIT));
        mgr.shutdown();
    }

    #[test]
    fn shutdown_cancels_computing_bridges() {
        let clock = FakeClock::new(ClockMode::Simulated);
        let mgr = manager(&clock, false);
        let released = Arc::new(AtomicBool::new(false));
        let bridge = SolverBridge::new(&mgr, gated(&released)).unwrap();
        let events = logged(&bridge);

        bridge.solve(&Vehicles(1), SolveArgs::new()).unwrap();
        assert!(mgr.shutdown());
        assert!(!bridge.is_computing());
        assert!(!mgr.is_computing());
        assert_eq!(events.try_iter().last(), Some(Event::Done(bridge.id())));
        assert!(mgr.shutdown(), "second shutdown is a no-op");
    }

    #[test]
    fn dropping_a_computing_bridge_leaves_the_set() {
        let clock = FakeClock::new(ClockMode::Simulated);
        let mgr = manager(&clock, true);
        let released = Arc::new(AtomicBool::new(false));
        let bridge = SolverBridge::new(&mgr, gated(&released)).unwrap();
        let events = logged(&bridge);
        let id = bridge.id();

        bridge.solve(&Vehicles(1), SolveArgs::new()).unwrap();
        assert_eq!(mgr.computing_count(), 1);
        drop(bridge);
        released.store(true, Ordering::Release);

        assert!(mgr.bridges().is_empty());
        assert!(mgr.wait_quiescent(Instant::now() + WAIT));
        assert_eq!(mgr.computing_count(), 0);
        assert_eq!(events.try_iter().collect::<Vec<_>>(), vec![Event::Start(id), Event::Done(id)]);

        // The step the computation started in is busy; two quiet ones follow.
        for _ in 0..3 {
            mgr.after_step().unwrap();
        }
        assert_eq!(clock.simulated_requests(), 1);
        mgr.shutdown();
    }

    /// Native solver that reports done at once but keeps running until
    /// cancelled.
    struct Straggler {
        scheduler: Option<Arc<dyn Scheduler>>,
        computing: bool,
        cancelled: Sender<()>,
    }

    impl RealtimeSolver for Straggler {
        fn init(&mut self, scheduler: Arc<dyn Scheduler>) {
            self.scheduler = Some(scheduler);
        }

        fn problem_changed(&mut self, snapshot: Arc<Snapshot>) {
            self.computing = true;
            if let Some(s) = &self.scheduler {
                s.done_for_now(snapshot.id);
            }
        }

        fn cancel(&mut self) {
            if self.computing {
                self.computing = false;
                self.cancelled.send(()).unwrap();
            }
        }

        fn is_computing(&self) -> bool {
            self.computing
        }
    }

    #[test]
    fn stragglers_are_cancelled_when_set_empties() {
        let clock = FakeClock::new(ClockMode::Simulated);
        let mgr = manager(&clock, true);
        let (tx, cancelled) = unbounded();
        let straggling = SolverBridge::new(
            &mgr,
            SolverHandle::native(Straggler { scheduler: None, computing: false, cancelled: tx }),
        )
        .unwrap();
        let quick = SolverBridge::new(&mgr, SolverHandle::batch(idle_solver)).unwrap();

        straggling.solve(&Vehicles(1), SolveArgs::new()).unwrap();
        assert!(!mgr.is_computing());
        assert!(cancelled.try_recv().is_err());

        quick.solve(&Vehicles(1), SolveArgs::new()).unwrap();
        cancelled.recv_timeout(WAIT).unwrap();
        assert!(mgr.wait_quiescent(Instant::now() + WAIT));
        mgr.shutdown();
    }
}
