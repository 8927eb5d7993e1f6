//! Diff spans, read results and the comparison mask

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::framebuffer::PANEL_WIDTH;

/// Contiguous run of changed pixels on one native row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiffSpan {
    /// Native row (also the scanline the beam must reach)
    pub row: u16,
    /// First native column
    pub col: u16,
    /// Number of pixels (at least 1)
    pub len: u16,
}

impl DiffSpan {
    pub const fn new(row: u16, col: u16, len: u16) -> Self {
        Self { row, col, len }
    }

    /// One past the last column
    pub const fn end(&self) -> u16 {
        self.col + self.len
    }

    /// Row holding the pixel just past the span
    ///
    /// A span reaching the right edge ends on the following row.
    pub const fn end_row(&self) -> u16 {
        ((self.row as usize * PANEL_WIDTH + self.end() as usize) / PANEL_WIDTH) as u16
    }
}

/// Result of pulling the next span from a diff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadResult {
    /// Next span to write; the cursor has moved past it
    Span(DiffSpan),
    /// The beam has not reached the next span's row yet
    MustWait { until_scanline: u16 },
    /// No spans left
    Done,
}

/// Bits that take part in pixel comparison
///
/// Bits cleared in the mask are ignored, so `0xF7DE` ignores the lowest bit
/// of each RGB565 channel. A mask of zero means strict comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ToleranceMask(pub u16);

impl ToleranceMask {
    /// Every bit counts
    pub const STRICT: Self = Self(0);

    /// Ignore the least significant bit of each channel
    pub const LOW_BITS: Self = Self(0b11110_111110_11110);

    #[inline]
    const fn effective(self) -> u16 {
        if self.0 == 0 {
            0xFFFF
        } else {
            self.0
        }
    }

    /// True if the two pixels differ in any significant bit
    #[inline]
    pub const fn differs(self, a: u16, b: u16) -> bool {
        (a ^ b) & self.effective() != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_mask() {
        assert!(ToleranceMask::STRICT.differs(0x0000, 0x0001));
        assert!(!ToleranceMask::STRICT.differs(0x1234, 0x1234));
    }

    #[test]
    fn test_low_bits_ignored() {
        let m = ToleranceMask::LOW_BITS;
        assert!(!m.differs(0b00000_000000_00000, 0b00001_000001_00001));
        assert!(m.differs(0b00000_000000_00000, 0b00010_000000_00000));
    }

    #[test]
    fn test_span_end() {
        assert_eq!(DiffSpan::new(3, 10, 5).end(), 15);
    }

    #[test]
    fn test_span_end_row() {
        let w = PANEL_WIDTH as u16;
        assert_eq!(DiffSpan::new(3, 10, 5).end_row(), 3);
        assert_eq!(DiffSpan::new(3, 0, w - 1).end_row(), 3);
        assert_eq!(DiffSpan::new(3, 0, w).end_row(), 4);
        assert_eq!(DiffSpan::new(3, w - 2, 2).end_row(), 4);
    }
}
