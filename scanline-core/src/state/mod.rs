//! Transfer state machine
//!
//! Explicit, finite and deterministic: every move of the transfer
//! scheduler goes through [`TransferState::transition`].

pub mod events;
pub mod machine;

pub use events::{SchedulerEvent, TransferEvent};
pub use machine::{StartPhase, TransferState};
