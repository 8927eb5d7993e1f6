//! Runtime context for the display engine
//!
//! Owns the registration table shared by the completion path and the
//! display, and provides the microsecond clock and one-shot timer on top of
//! embassy-time. The timer is polled: an expired deadline is reported by
//! `poll_event` as `TimerExpired`, and [`wait_event`] sleeps until either
//! the deadline or the next posted event.

use core::cell::RefCell;

use embassy_futures::select::select;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{block_for, Duration, Instant, Timer};

use scanline_core::registry::{Registry, RegistryError, Slot};
use scanline_core::state::SchedulerEvent;
use scanline_core::traits::{EventSource, Timebase};

use crate::channels::EVENT_POSTED;

/// Displays this firmware can drive
pub const MAX_DISPLAYS: usize = 1;

static REGISTRY: Mutex<CriticalSectionRawMutex, RefCell<Registry<MAX_DISPLAYS>>> =
    Mutex::new(RefCell::new(Registry::new()));

/// Armed deadline per slot (µs since boot)
static DEADLINES: Mutex<CriticalSectionRawMutex, RefCell<[Option<u64>; MAX_DISPLAYS]>> =
    Mutex::new(RefCell::new([None; MAX_DISPLAYS]));

pub fn register() -> Result<Slot, RegistryError> {
    REGISTRY.lock(|r| r.borrow_mut().register())
}

/// Give up a slot whose display never came up
pub fn release(slot: Slot) {
    REGISTRY.lock(|r| r.borrow_mut().release(slot));
    set_deadline(slot, None);
}

/// Queue an event for `slot` and wake whoever waits on it
pub fn post(slot: Slot, event: SchedulerEvent) {
    if let Err(e) = REGISTRY.lock(|r| r.borrow_mut().post(slot, event)) {
        defmt::warn!("event {} for slot {} lost: {}", event, slot.index(), e);
    }
    EVENT_POSTED.signal(());
}

fn deadline(slot: Slot) -> Option<u64> {
    DEADLINES.lock(|d| d.borrow().get(slot.index()).copied().flatten())
}

fn set_deadline(slot: Slot, deadline: Option<u64>) {
    DEADLINES.lock(|d| {
        if let Some(entry) = d.borrow_mut().get_mut(slot.index()) {
            *entry = deadline;
        }
    });
}

/// Sleep until the slot's deadline passes or an event is posted
pub async fn wait_event(slot: Slot) {
    if REGISTRY.lock(|r| r.borrow().pending(slot)) > 0 {
        return;
    }
    match deadline(slot) {
        Some(at) => {
            select(Timer::at(Instant::from_micros(at)), EVENT_POSTED.wait()).await;
        }
        None => EVENT_POSTED.wait().await,
    }
}

/// Timebase and event source of one display
pub struct EmbassyRuntime {
    slot: Slot,
}

impl EmbassyRuntime {
    pub fn new(slot: Slot) -> Self {
        Self { slot }
    }
}

impl Timebase for EmbassyRuntime {
    fn now_us(&mut self) -> u64 {
        Instant::now().as_micros()
    }

    fn arm_timer(&mut self, deadline_us: u64) {
        set_deadline(self.slot, Some(deadline_us));
    }

    fn cancel_timer(&mut self) {
        set_deadline(self.slot, None);
    }

    fn delay_us(&mut self, us: u32) {
        block_for(Duration::from_micros(us as u64));
    }
}

impl EventSource for EmbassyRuntime {
    fn poll_event(&mut self, slot: Slot) -> Option<SchedulerEvent> {
        if let Some(event) = REGISTRY.lock(|r| r.borrow_mut().poll_event(slot)) {
            return Some(event);
        }
        match deadline(slot) {
            Some(at) if Instant::now().as_micros() >= at => {
                set_deadline(slot, None);
                Some(SchedulerEvent::TimerExpired)
            }
            _ => None,
        }
    }
}
