//! The stepping loop's clock-mode switch.

use parking_lot::Mutex;
use pd_core::ClockMode;
use pd_realtime::RealtimeClock;
use tracing::debug;

struct ClockState {
    mode:      ClockMode,
    advancing: bool,
}

/// Mode switch shared between the stepping loop and the coordination
/// manager.  Requests take effect immediately; the loop reads the mode when
/// deciding whether to pace a step to wall time.
pub struct StepClock {
    state: Mutex<ClockState>,
}

impl StepClock {
    pub fn new(mode: ClockMode) -> Self {
        Self { state: Mutex::new(ClockState { mode, advancing: true }) }
    }

    /// Mark the clock as stopped.  The manager stops requesting transitions.
    pub fn stop(&self) {
        self.state.lock().advancing = false;
    }

    fn set(&self, mode: ClockMode) {
        let mut state = self.state.lock();
        if state.mode != mode {
            debug!(from = %state.mode, to = %mode, "clock mode switched");
            state.mode = mode;
        }
    }
}

impl Default for StepClock {
    fn default() -> Self {
        Self::new(ClockMode::Simulated)
    }
}

impl RealtimeClock for StepClock {
    fn mode(&self) -> ClockMode {
        self.state.lock().mode
    }

    fn request_real_time(&self) {
        self.set(ClockMode::RealTime);
    }

    fn request_simulated(&self) {
        self.set(ClockMode::Simulated);
    }

    fn is_advancing(&self) -> bool {
        self.state.lock().advancing
    }
}
