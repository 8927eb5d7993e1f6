//! Runtime services: time, the one-shot timer and event delivery

use crate::registry::Slot;
use crate::state::SchedulerEvent;

/// Monotonic microsecond clock with a single one-shot timer
pub trait Timebase {
    /// Microseconds since an arbitrary epoch
    fn now_us(&mut self) -> u64;

    /// Arm the timer; a `TimerExpired` event follows at `deadline_us`.
    /// Re-arming replaces the previous deadline.
    fn arm_timer(&mut self, deadline_us: u64);

    /// Disarm the timer
    fn cancel_timer(&mut self);

    /// Busy-wait
    fn delay_us(&mut self, us: u32) {
        let until = self.now_us() + us as u64;
        while self.now_us() < until {
            core::hint::spin_loop();
        }
    }
}

/// Queue of scheduler events, one per registered driver
pub trait EventSource {
    /// Next event for `slot`, if any
    fn poll_event(&mut self, slot: Slot) -> Option<SchedulerEvent>;
}
