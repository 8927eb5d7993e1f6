//! Scanline prediction
//!
//! Between two real scanline queries the beam position is extrapolated from
//! the calibrated period:
//!
//! ```text
//! scanline(t) = (synced + (t - synced_at) * SCANLINES / period) mod SCANLINES
//! ```

use super::calibration::RefreshCalibration;
use crate::framebuffer::SCANLINES;

/// Default mode-0 period before calibration (µs)
pub const DEFAULT_PERIOD_US: u32 = 16_667;

/// Estimates where the panel's refresh beam is
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VsyncClock {
    calibration: RefreshCalibration,
    mode: u8,
    period_us: u32,
    synced_scanline: u32,
    synced_at_us: u64,
    synced: bool,
    late_start_percent: u8,
    override_pending: bool,
    resync_interval_us: u32,
}

impl Default for VsyncClock {
    fn default() -> Self {
        Self::new(DEFAULT_PERIOD_US)
    }
}

impl VsyncClock {
    pub fn new(mode0_period_us: u32) -> Self {
        let calibration = RefreshCalibration::from_mode0_period(mode0_period_us);
        Self {
            calibration,
            mode: 0,
            period_us: calibration.mode0_period_us,
            synced_scanline: 0,
            synced_at_us: 0,
            synced: false,
            late_start_percent: 30,
            override_pending: true,
            resync_interval_us: 500_000,
        }
    }

    pub fn calibration(&self) -> &RefreshCalibration {
        &self.calibration
    }

    /// Rebuild the mode table from a new mode-0 measurement
    pub fn set_calibration(&mut self, calibration: RefreshCalibration) {
        self.calibration = calibration;
    }

    pub fn mode(&self) -> u8 {
        self.mode
    }

    /// Record the active mode and its measured period
    pub fn set_mode(&mut self, mode: u8, period_us: u32) {
        self.mode = mode;
        self.set_period_us(period_us);
    }

    pub fn period_us(&self) -> u32 {
        self.period_us
    }

    pub fn set_period_us(&mut self, period_us: u32) {
        self.period_us = period_us.max(1);
    }

    pub fn set_resync_interval_us(&mut self, us: u32) {
        self.resync_interval_us = us;
    }

    pub fn late_start_percent(&self) -> u8 {
        self.late_start_percent
    }

    /// Late-start ratio in percent, clamped to 100
    pub fn set_late_start_percent(&mut self, percent: u8) {
        self.late_start_percent = percent.min(100);
    }

    /// Record a real scanline reading taken at `now_us`
    pub fn sync(&mut self, scanline: u32, now_us: u64) {
        self.synced_scanline = scanline % SCANLINES;
        self.synced_at_us = now_us;
        self.synced = true;
    }

    /// Check if the last real reading is too old to extrapolate from
    pub fn needs_resync(&self, now_us: u64) -> bool {
        !self.synced || now_us.saturating_sub(self.synced_at_us) > self.resync_interval_us as u64
    }

    /// Force a real reading and a full-wait start on the next frame
    pub fn force_resync(&mut self) {
        self.synced = false;
        self.override_pending = true;
    }

    /// Consume the one-shot late-start override
    pub fn take_override(&mut self) -> bool {
        core::mem::take(&mut self.override_pending)
    }

    /// Predicted scanline at `now_us`
    pub fn scanline_at(&self, now_us: u64) -> u32 {
        let elapsed = now_us.saturating_sub(self.synced_at_us);
        let advanced = (elapsed * SCANLINES as u64 / self.period_us as u64) % SCANLINES as u64;
        (self.synced_scanline + advanced as u32) % SCANLINES
    }

    /// Scanlines the beam covers in `us`
    pub fn scanlines_during(&self, us: u64) -> u32 {
        (us * SCANLINES as u64 / self.period_us as u64).min(u32::MAX as u64) as u32
    }

    /// Time for the beam to cover `n` scanlines (µs)
    pub fn time_for_scanlines(&self, n: u32) -> u32 {
        (n as u64 * self.period_us as u64 / SCANLINES as u64) as u32
    }

    /// Time until the beam reaches `scanline` (µs), wrapping past the bottom
    pub fn micros_to_reach(&self, scanline: u32, now_us: u64) -> u32 {
        let current = self.scanline_at(now_us);
        let target = if scanline < current {
            scanline + SCANLINES
        } else {
            scanline
        };
        self.time_for_scanlines(target - current)
    }

    /// Time until the beam leaves `lo..=hi` (µs), 0 if outside
    pub fn micros_to_exit_range(&self, lo: u32, hi: u32, now_us: u64) -> u32 {
        let current = self.scanline_at(now_us);
        if current < lo || current > hi {
            return 0;
        }
        self.time_for_scanlines(hi + 1 - current)
    }

    /// Scanline up to which a transfer whose first row is `first_row` may
    /// still start without waiting for the next frame
    pub fn late_start_scanline(&self, first_row: u32) -> u32 {
        let first_row = first_row.min(SCANLINES - 1);
        first_row + (SCANLINES - 1 - first_row) * self.late_start_percent as u32 / 100
    }
}
