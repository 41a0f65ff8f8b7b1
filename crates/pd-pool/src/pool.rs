//! The shared solver worker pool.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::group::CoreGroup;
use crate::{Affinity, CoreSlot, PoolError, PoolResult};

/// Called with the panic message of a job that unwound out of the pool.
pub type PanicHook = Arc<dyn Fn(String) + Send + Sync>;

/// Shape of a pool to build.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PoolSpec {
    /// Number of worker threads.
    pub size: usize,
    /// Share one core across all workers instead of one core each.
    pub grouped: bool,
}

impl PoolSpec {
    pub fn new(size: usize, grouped: bool) -> Self {
        Self { size, grouped }
    }
}

// ── Live worker accounting ────────────────────────────────────────────────────

/// Counts workers that have not exited yet.  Starts at the pool size and is
/// decremented by each worker's exit handler.
struct LiveWorkers {
    count:  Mutex<usize>,
    exited: Condvar,
}

impl LiveWorkers {
    fn new(count: usize) -> Self {
        Self { count: Mutex::new(count), exited: Condvar::new() }
    }

    fn leave(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.exited.notify_all();
        }
    }

    fn get(&self) -> usize {
        *self.count.lock()
    }

    /// Wait until every worker has exited or `deadline` passes.
    fn wait_all_exited(&self, deadline: Instant) -> bool {
        let mut count = self.count.lock();
        while *count > 0 {
            if self.exited.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }
}

// ── SolverPool ────────────────────────────────────────────────────────────────

struct PoolInner {
    pool:  Mutex<Option<rayon::ThreadPool>>,
    live:  Arc<LiveWorkers>,
    group: Option<Arc<CoreGroup>>,
    spec:  PoolSpec,
}

/// Fixed-size worker pool shared by every solver bridge of a run.
///
/// Cheap to clone; all clones refer to the same threads.  Safe for concurrent
/// submission from any thread.
#[derive(Clone)]
pub struct SolverPool {
    inner: Arc<PoolInner>,
}

impl SolverPool {
    /// Spawn `spec.size` workers, pinned according to `spec.grouped`.
    ///
    /// `panic_hook` receives the message of any job that panics; without it
    /// rayon's default (abort) applies.
    pub fn build(
        spec:       PoolSpec,
        affinity:   Arc<dyn Affinity>,
        panic_hook: Option<PanicHook>,
    ) -> PoolResult<Self> {
        if spec.size == 0 {
            return Err(PoolError::InvalidSize);
        }

        let live = Arc::new(LiveWorkers::new(spec.size));
        let mut builder = rayon::ThreadPoolBuilder::new()
            .num_threads(spec.size)
            .thread_name(|i| format!("solver-{i}"));

        let group = if spec.grouped {
            let group = Arc::new(CoreGroup::new(Arc::clone(&affinity)));

            let (g, aff) = (Arc::clone(&group), Arc::clone(&affinity));
            builder = builder.start_handler(move |worker| match g.join() {
                Some(slot) => pin_worker(aff.as_ref(), slot, worker),
                None => debug!(worker, "no core for solver group; running unpinned"),
            });

            let (g, live) = (Arc::clone(&group), Arc::clone(&live));
            builder = builder.exit_handler(move |_| {
                g.leave();
                live.leave();
            });
            Some(group)
        } else {
            let slots: Arc<Mutex<HashMap<usize, CoreSlot>>> = Arc::default();

            let (s, aff) = (Arc::clone(&slots), Arc::clone(&affinity));
            builder = builder.start_handler(move |worker| match aff.reserve() {
                Some(slot) => {
                    pin_worker(aff.as_ref(), slot, worker);
                    s.lock().insert(worker, slot);
                }
                None => debug!(worker, "no core available; solver thread runs unpinned"),
            });

            let (s, aff, live) = (slots, Arc::clone(&affinity), Arc::clone(&live));
            builder = builder.exit_handler(move |worker| {
                if let Some(slot) = s.lock().remove(&worker) {
                    aff.release(slot);
                }
                live.leave();
            });
            None
        };

        if let Some(hook) = panic_hook {
            builder = builder.panic_handler(move |payload| hook(panic_message(payload.as_ref())));
        }

        let pool = builder
            .build()
            .map_err(|e| PoolError::Build(e.to_string()))?;

        info!(size = spec.size, grouped = spec.grouped, "solver pool started");
        Ok(Self {
            inner: Arc::new(PoolInner {
                pool: Mutex::new(Some(pool)),
                live,
                group,
                spec,
            }),
        })
    }

    /// Queue `job` on the pool.  Fails once the pool is shut down.
    pub fn spawn<F>(&self, job: F) -> PoolResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        match self.inner.pool.lock().as_ref() {
            Some(pool) => {
                pool.spawn(job);
                Ok(())
            }
            None => Err(PoolError::ShutDown),
        }
    }

    /// Stop accepting work and wait up to `grace` for every worker (and the
    /// core holder of a grouped pool) to exit.
    ///
    /// Workers finish the job they are running first, so jobs should observe
    /// their cancel token.  Returns `false` on timeout; the remaining threads
    /// are left to finish on their own.
    pub fn shutdown(&self, grace: Duration) -> bool {
        let Some(pool) = self.inner.pool.lock().take() else {
            return self.inner.live.get() == 0;
        };
        drop(pool);

        let terminated = self.inner.live.wait_all_exited(Instant::now() + grace);
        if terminated {
            info!("solver pool terminated");
        } else {
            warn!(
                live = self.inner.live.get(),
                grace_ms = grace.as_millis() as u64,
                "solver pool did not terminate within grace period"
            );
        }
        terminated
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.pool.lock().is_none()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.inner.spec.size
    }

    #[inline]
    pub fn is_grouped(&self) -> bool {
        self.inner.spec.grouped
    }

    /// Workers that have not exited yet.
    pub fn live_workers(&self) -> usize {
        self.inner.live.get()
    }

    /// `true` while a grouped pool's core holder thread is running.
    pub fn core_holder_active(&self) -> bool {
        self.inner.group.as_ref().is_some_and(|g| g.holder_active())
    }
}

fn pin_worker(affinity: &dyn Affinity, slot: CoreSlot, worker: usize) {
    if affinity.pin_current(slot) {
        debug!(core = slot.0, worker, "pinned solver thread");
    } else {
        warn!(core = slot.0, worker, "failed to pin solver thread; running unpinned");
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
