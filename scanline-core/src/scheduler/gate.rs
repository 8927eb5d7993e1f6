//! Deferred input sampling
//!
//! Touch controllers often share the bus with the panel. Sampling is only
//! granted while no transfer is running.

/// Single request flag between the input side and the transfer scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputGate {
    requested: bool,
    granted: bool,
}

impl InputGate {
    pub const fn new() -> Self {
        Self {
            requested: false,
            granted: false,
        }
    }

    /// Ask for a sampling window; granted immediately when `busy` is false
    pub fn request(&mut self, busy: bool) -> bool {
        if busy {
            self.requested = true;
            false
        } else {
            self.requested = false;
            self.granted = true;
            true
        }
    }

    /// Called once the scheduler is idle again
    pub fn release(&mut self) {
        if self.requested {
            self.requested = false;
            self.granted = true;
        }
    }

    /// Consume a grant
    pub fn take_grant(&mut self) -> bool {
        core::mem::take(&mut self.granted)
    }
}
