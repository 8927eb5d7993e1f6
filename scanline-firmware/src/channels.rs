//! Inter-task communication channels
//!
//! Defines the static signals used between Embassy tasks.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use portable_atomic::AtomicU32;

use scanline_core::config::CalibrationRecord;

/// Sprite position for the next frame, in user coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpriteFrame {
    pub x: u16,
    pub y: u16,
    pub color: u16,
}

/// Something was posted into the registration table
pub static EVENT_POSTED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Latest sprite position (newest wins)
pub static SPRITE: Signal<CriticalSectionRawMutex, SpriteFrame> = Signal::new();

/// Calibration to persist to flash
pub static CALIBRATION_SAVE: Signal<CriticalSectionRawMutex, CalibrationRecord> = Signal::new();

/// Sprite positions the render task skipped because a newer one arrived
pub static FRAMES_SKIPPED: AtomicU32 = AtomicU32::new(0);
