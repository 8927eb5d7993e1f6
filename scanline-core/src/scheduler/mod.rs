//! Transfer scheduler
//!
//! Consumes diffs span by span, pacing each span against the predicted
//! beam position, and hands completion work back to the display.

pub mod gate;
pub mod transfer;

pub use gate::InputGate;
pub use transfer::{Continuation, Progress, TransferPorts, TransferScheduler};
