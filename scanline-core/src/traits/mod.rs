//! Collaborator traits
//!
//! These traits define the interface between the scheduling logic and the
//! panel, the bus engine and the runtime that delivers timer and
//! completion events.

pub mod bus;
pub mod panel;
pub mod runtime;

pub use bus::{cmd, CompletionSink, PanelBus};
pub use panel::{PanelControl, PanelError};
pub use runtime::{EventSource, Timebase};
