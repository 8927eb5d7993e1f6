//! Events driving the transfer state machine

/// Asynchronous triggers delivered by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchedulerEvent {
    /// The one-shot timer armed by the scheduler fired
    TimerExpired,
    /// The background pixel transfer finished
    TransferComplete,
}

/// Outcomes the scheduler feeds into [`TransferState::transition`]
///
/// [`TransferState::transition`]: super::TransferState::transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferEvent {
    /// A non-empty diff was handed over
    Launch,
    /// Frame slot reached, waiting for the beam
    FrameReached,
    /// Beam is where the transfer may begin
    BeamReached,
    /// A span was handed to the bus
    SpanIssued,
    /// Next span is below the beam; wait
    BeamBehind,
    /// Diff exhausted
    DiffDone,
}
