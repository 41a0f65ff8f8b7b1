use pd_core::ClockMode;

/// The clock collaborator, as seen by the coordination manager.
///
/// Requests may take effect immediately or at the next step; the manager only
/// asks for transitions and never assumes the mode changed.
pub trait RealtimeClock: Send + Sync {
    fn mode(&self) -> ClockMode;

    fn request_real_time(&self);

    fn request_simulated(&self);

    /// `false` once the clock has stopped or is paused.
    fn is_advancing(&self) -> bool;
}
