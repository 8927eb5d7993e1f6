//! Driver configuration types

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::diff::ToleranceMask;
use crate::framebuffer::Rotation;

/// Largest supported vsync spacing
pub const MAX_VSYNC_SPACING: u8 = 5;

/// Highest refresh mode index
pub const MAX_REFRESH_MODE: u8 = 31;

/// Shortest timer the scheduler will arm while waiting for the beam
pub const MIN_WAIT_US: u32 = 20;

/// How frames submitted by the application are buffered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BufferingMode {
    /// No owned buffer: frames are pushed synchronously
    NoBuffering,
    /// One owned buffer, asynchronous diff transfers
    DoubleBuffering,
    /// Two owned buffers, frames staged while a transfer runs
    #[default]
    TripleBuffering,
}

impl BufferingMode {
    /// Highest mode a number of owned framebuffers allows
    pub const fn for_buffers(count: usize) -> Self {
        match count {
            0 => BufferingMode::NoBuffering,
            1 => BufferingMode::DoubleBuffering,
            _ => BufferingMode::TripleBuffering,
        }
    }
}

/// Refresh periods between two pushed frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VsyncSpacing {
    /// No pacing; a frame submitted while busy is dropped
    DropWhenBusy,
    /// No pacing, every frame is shown
    Unpaced,
    /// One frame every N refresh periods, synchronized with the beam
    Every(u8),
}

impl Default for VsyncSpacing {
    fn default() -> Self {
        VsyncSpacing::Every(2)
    }
}

impl VsyncSpacing {
    /// Negative values drop frames, 0 disables pacing, larger values are
    /// clamped to [`MAX_VSYNC_SPACING`]
    pub const fn from_i8(value: i8) -> Self {
        if value < 0 {
            VsyncSpacing::DropWhenBusy
        } else if value == 0 {
            VsyncSpacing::Unpaced
        } else if value as u8 > MAX_VSYNC_SPACING {
            VsyncSpacing::Every(MAX_VSYNC_SPACING)
        } else {
            VsyncSpacing::Every(value as u8)
        }
    }

    /// Bring `Every(n)` into `1..=MAX_VSYNC_SPACING`
    pub const fn clamped(self) -> Self {
        match self {
            VsyncSpacing::Every(0) => VsyncSpacing::Unpaced,
            VsyncSpacing::Every(n) if n > MAX_VSYNC_SPACING => VsyncSpacing::Every(MAX_VSYNC_SPACING),
            other => other,
        }
    }

    /// Refresh periods per frame when paced
    pub const fn periods(self) -> Option<u32> {
        match self {
            VsyncSpacing::Every(n) => Some(n as u32),
            _ => None,
        }
    }

    pub const fn is_paced(self) -> bool {
        matches!(self, VsyncSpacing::Every(_))
    }

    pub const fn drops_when_busy(self) -> bool {
        matches!(self, VsyncSpacing::DropWhenBusy)
    }
}

/// Runtime configuration of the display driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisplayConfig {
    /// Requested buffering (limited by the buffers actually provided)
    pub buffering: BufferingMode,
    /// Frame pacing
    pub vsync_spacing: VsyncSpacing,
    /// Runs closer than this many unchanged pixels are merged
    pub diff_gap: u16,
    /// Significant pixel bits (0 = strict)
    pub compare_mask: ToleranceMask,
    /// Panel refresh mode (0 = fastest)
    pub refresh_mode: u8,
    /// Late-start ratio in percent (0 = always wait for the top)
    pub late_start_percent: u8,
    /// Screen orientation
    pub rotation: Rotation,
    /// SPI write clock (Hz)
    pub spi_clock_hz: u32,
    /// SPI read clock (Hz)
    pub spi_read_clock_hz: u32,
    /// Maximum age of the scanline sync before a real query (µs)
    pub resync_interval_us: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            buffering: BufferingMode::TripleBuffering,
            vsync_spacing: VsyncSpacing::default(),
            diff_gap: 6,
            compare_mask: ToleranceMask::STRICT,
            refresh_mode: 0,
            late_start_percent: 30,
            rotation: Rotation::Portrait,
            spi_clock_hz: 30_000_000,
            spi_read_clock_hz: 4_000_000,
            resync_interval_us: 500_000,
        }
    }
}

impl DisplayConfig {
    /// Clamp every field into its valid range
    pub fn sanitized(mut self) -> Self {
        self.refresh_mode = self.refresh_mode.min(MAX_REFRESH_MODE);
        self.late_start_percent = self.late_start_percent.min(100);
        self.vsync_spacing = self.vsync_spacing.clamped();
        self.spi_clock_hz = self.spi_clock_hz.max(1_000_000);
        self.spi_read_clock_hz = self.spi_read_clock_hz.max(100_000);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vsync_spacing_from_i8() {
        assert_eq!(VsyncSpacing::from_i8(-7), VsyncSpacing::DropWhenBusy);
        assert_eq!(VsyncSpacing::from_i8(0), VsyncSpacing::Unpaced);
        assert_eq!(VsyncSpacing::from_i8(3), VsyncSpacing::Every(3));
        assert_eq!(VsyncSpacing::from_i8(42), VsyncSpacing::Every(MAX_VSYNC_SPACING));
        assert_eq!(VsyncSpacing::Every(2).periods(), Some(2));
        assert_eq!(VsyncSpacing::Unpaced.periods(), None);
    }

    #[test]
    fn test_buffering_for_buffers() {
        assert_eq!(BufferingMode::for_buffers(0), BufferingMode::NoBuffering);
        assert_eq!(BufferingMode::for_buffers(1), BufferingMode::DoubleBuffering);
        assert_eq!(BufferingMode::for_buffers(2), BufferingMode::TripleBuffering);
        assert!(BufferingMode::DoubleBuffering < BufferingMode::TripleBuffering);
    }

    #[test]
    fn test_sanitized_clamps() {
        let cfg = DisplayConfig {
            refresh_mode: 99,
            late_start_percent: 250,
            vsync_spacing: VsyncSpacing::Every(12),
            ..Default::default()
        }
        .sanitized();
        assert_eq!(cfg.refresh_mode, MAX_REFRESH_MODE);
        assert_eq!(cfg.late_start_percent, 100);
        assert_eq!(cfg.vsync_spacing, VsyncSpacing::Every(MAX_VSYNC_SPACING));
    }
}
