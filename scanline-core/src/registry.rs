//! Event registration table
//!
//! The runtime owns one [`Registry`]. Each driver instance registers once
//! and keeps the returned [`Slot`]; interrupt and timer handlers post events
//! to that slot, and the driver's event loop polls them back out.

use heapless::Deque;

use crate::state::SchedulerEvent;
use crate::traits::EventSource;

/// Pending events per slot
pub const EVENT_QUEUE_DEPTH: usize = 4;

/// Stable index of a registered driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Slot(u8);

impl Slot {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Registration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    /// Every slot is taken
    Full,
    /// Slot was never registered or has been released
    UnknownSlot,
    /// Event queue of the slot is full
    QueueFull,
}

struct Entry {
    used: bool,
    queue: Deque<SchedulerEvent, EVENT_QUEUE_DEPTH>,
}

impl Entry {
    const fn new() -> Self {
        Self {
            used: false,
            queue: Deque::new(),
        }
    }
}

/// Fixed table of up to `N` drivers
pub struct Registry<const N: usize> {
    entries: [Entry; N],
}

impl<const N: usize> Default for Registry<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Registry<N> {
    pub const fn new() -> Self {
        Self {
            entries: [const { Entry::new() }; N],
        }
    }

    /// Claim the first free slot
    pub fn register(&mut self) -> Result<Slot, RegistryError> {
        let (idx, entry) = self
            .entries
            .iter_mut()
            .enumerate()
            .find(|(_, e)| !e.used)
            .ok_or(RegistryError::Full)?;
        entry.used = true;
        entry.queue.clear();
        Ok(Slot(idx as u8))
    }

    /// Free a slot, dropping its queued events
    pub fn release(&mut self, slot: Slot) {
        if let Some(entry) = self.entries.get_mut(slot.index()) {
            entry.used = false;
            entry.queue.clear();
        }
    }

    /// Queue an event for `slot`
    pub fn post(&mut self, slot: Slot, event: SchedulerEvent) -> Result<(), RegistryError> {
        let entry = self
            .entries
            .get_mut(slot.index())
            .filter(|e| e.used)
            .ok_or(RegistryError::UnknownSlot)?;
        entry
            .queue
            .push_back(event)
            .map_err(|_| RegistryError::QueueFull)
    }

    /// Number of events waiting for `slot`
    pub fn pending(&self, slot: Slot) -> usize {
        self.entries
            .get(slot.index())
            .map(|e| e.queue.len())
            .unwrap_or(0)
    }
}

impl<const N: usize> EventSource for Registry<N> {
    fn poll_event(&mut self, slot: Slot) -> Option<SchedulerEvent> {
        self.entries
            .get_mut(slot.index())
            .filter(|e| e.used)
            .and_then(|e| e.queue.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_until_full() {
        let mut reg: Registry<2> = Registry::new();
        let a = reg.register().unwrap();
        let b = reg.register().unwrap();
        assert_ne!(a, b);
        assert_eq!(reg.register(), Err(RegistryError::Full));

        reg.release(a);
        assert_eq!(reg.register(), Ok(a));
    }

    #[test]
    fn test_events_are_per_slot_and_fifo() {
        let mut reg: Registry<2> = Registry::new();
        let a = reg.register().unwrap();
        let b = reg.register().unwrap();

        reg.post(a, SchedulerEvent::TimerExpired).unwrap();
        reg.post(a, SchedulerEvent::TransferComplete).unwrap();
        reg.post(b, SchedulerEvent::TransferComplete).unwrap();

        assert_eq!(reg.pending(a), 2);
        assert_eq!(reg.poll_event(a), Some(SchedulerEvent::TimerExpired));
        assert_eq!(reg.poll_event(b), Some(SchedulerEvent::TransferComplete));
        assert_eq!(reg.poll_event(a), Some(SchedulerEvent::TransferComplete));
        assert_eq!(reg.poll_event(a), None);
    }

    #[test]
    fn test_post_errors() {
        let mut reg: Registry<1> = Registry::new();
        let a = reg.register().unwrap();
        for _ in 0..EVENT_QUEUE_DEPTH {
            reg.post(a, SchedulerEvent::TimerExpired).unwrap();
        }
        assert_eq!(
            reg.post(a, SchedulerEvent::TimerExpired),
            Err(RegistryError::QueueFull)
        );

        reg.release(a);
        assert_eq!(
            reg.post(a, SchedulerEvent::TimerExpired),
            Err(RegistryError::UnknownSlot)
        );
        assert_eq!(reg.poll_event(a), None);
    }
}
