//! Transfer state machine
//!
//! The scheduler is always in exactly one of these states. Side effects
//! (bus writes, timers) live in the scheduler; this module only says which
//! moves are legal.

use super::events::{SchedulerEvent, TransferEvent};

/// Alignment step before the first span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StartPhase {
    /// Waiting for the frame slot given by the vsync spacing
    FrameAlign,
    /// Waiting for the beam to clear the first row
    BeamAlign,
}

/// Transfer scheduler states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferState {
    /// No transfer
    #[default]
    Idle,
    /// Transfer armed, bus work not begun
    Starting(StartPhase),
    /// A span is on the bus
    Transferring,
    /// Timer armed until the beam passes the next span's row
    Waiting,
}

impl TransferState {
    /// Check if a transfer is active
    pub fn is_busy(&self) -> bool {
        !matches!(self, TransferState::Idle)
    }

    /// Check if an asynchronous trigger is meaningful in this state
    ///
    /// Anything else is stale (a timer raced a cancel) and is ignored.
    pub fn accepts(&self, event: SchedulerEvent) -> bool {
        matches!(
            (self, event),
            (TransferState::Starting(_), SchedulerEvent::TimerExpired)
                | (TransferState::Waiting, SchedulerEvent::TimerExpired)
                | (TransferState::Transferring, SchedulerEvent::TransferComplete)
        )
    }

    /// Process an outcome and return the next state
    pub fn transition(self, event: TransferEvent) -> Self {
        use StartPhase::*;
        use TransferEvent::*;
        use TransferState::*;

        match (self, event) {
            (Idle, Launch) => Starting(FrameAlign),

            (Starting(FrameAlign), FrameReached) => Starting(BeamAlign),
            (Starting(_), BeamReached) => Transferring,

            (Transferring, SpanIssued) | (Waiting, SpanIssued) => Transferring,
            (Transferring, BeamBehind) | (Waiting, BeamBehind) => Waiting,

            (Transferring, DiffDone) | (Waiting, DiffDone) | (Starting(_), DiffDone) => Idle,

            // Default: stay in current state
            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_paced_sequence() {
        let mut s = TransferState::Idle;
        for (event, expected) in [
            (TransferEvent::Launch, TransferState::Starting(StartPhase::FrameAlign)),
            (TransferEvent::FrameReached, TransferState::Starting(StartPhase::BeamAlign)),
            (TransferEvent::BeamReached, TransferState::Transferring),
            (TransferEvent::SpanIssued, TransferState::Transferring),
            (TransferEvent::BeamBehind, TransferState::Waiting),
            (TransferEvent::SpanIssued, TransferState::Transferring),
            (TransferEvent::DiffDone, TransferState::Idle),
        ] {
            s = s.transition(event);
            assert_eq!(s, expected);
        }
    }

    #[test]
    fn test_unpaced_skips_beam_alignment() {
        let s = TransferState::Idle
            .transition(TransferEvent::Launch)
            .transition(TransferEvent::BeamReached);
        assert_eq!(s, TransferState::Transferring);
    }

    #[test]
    fn test_illegal_moves_are_ignored() {
        assert_eq!(
            TransferState::Idle.transition(TransferEvent::SpanIssued),
            TransferState::Idle
        );
        assert_eq!(
            TransferState::Transferring.transition(TransferEvent::Launch),
            TransferState::Transferring
        );
    }

    #[test]
    fn test_accepts() {
        assert!(!TransferState::Idle.accepts(SchedulerEvent::TimerExpired));
        assert!(!TransferState::Idle.accepts(SchedulerEvent::TransferComplete));
        assert!(TransferState::Waiting.accepts(SchedulerEvent::TimerExpired));
        assert!(!TransferState::Waiting.accepts(SchedulerEvent::TransferComplete));
        assert!(TransferState::Transferring.accepts(SchedulerEvent::TransferComplete));
        assert!(TransferState::Starting(StartPhase::BeamAlign).accepts(SchedulerEvent::TimerExpired));
    }
}
