//! Refresh period and refresh-mode table
//!
//! The panel's frame-rate register divides its internal oscillator by
//! `(16 + m) / 16` for mode `m`, with an extra divide by two for `m >= 16`.
//! Only the mode-0 period is measured; the other modes are derived from it.
//! The formula is specific to this controller revision.

/// Number of refresh modes
pub const REFRESH_MODES: usize = 32;

/// Frame-rate control register
pub const FRMCTR1: u8 = 0xB1;

/// Measured scan period and the mode -> rate table derived from it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RefreshCalibration {
    /// Scan period in mode 0 (µs)
    pub mode0_period_us: u32,
    /// Refresh rate of each mode (mHz), strictly decreasing
    pub mode_millihz: [u32; REFRESH_MODES],
}

impl RefreshCalibration {
    /// Build the table from a measured mode-0 period
    pub fn from_mode0_period(mode0_period_us: u32) -> Self {
        let period = mode0_period_us.max(1);
        let mut mode_millihz = [0u32; REFRESH_MODES];
        for (mode, slot) in mode_millihz.iter_mut().enumerate() {
            *slot = formula_millihz(period, mode as u8);
        }
        Self {
            mode0_period_us: period,
            mode_millihz,
        }
    }

    /// Refresh rate of a mode (clamped to 0..=31), in mHz
    pub fn millihz_for_mode(&self, mode: u8) -> u32 {
        self.mode_millihz[(mode as usize).min(REFRESH_MODES - 1)]
    }

    /// Expected scan period of a mode, in µs
    pub fn period_for_mode(&self, mode: u8) -> u32 {
        let mhz = self.millihz_for_mode(mode).max(1) as u64;
        ((1_000_000_000u64 + mhz / 2) / mhz) as u32
    }

    /// Mode whose rate is closest to `millihz`
    ///
    /// Binary search over the decreasing table, then pick whichever of the
    /// two bracketing modes is closer. Ties go to the slower mode.
    pub fn mode_for_millihz(&self, millihz: u32) -> u8 {
        let table = &self.mode_millihz;
        if millihz >= table[0] {
            return 0;
        }
        if millihz <= table[REFRESH_MODES - 1] {
            return (REFRESH_MODES - 1) as u8;
        }
        // invariant: table[a] > millihz > table[b]
        let (mut a, mut b) = (0usize, REFRESH_MODES - 1);
        while b - a > 1 {
            let c = (a + b) / 2;
            if table[c] == millihz {
                return c as u8;
            }
            if table[c] < millihz {
                b = c;
            } else {
                a = c;
            }
        }
        if table[a] - millihz < millihz - table[b] {
            a as u8
        } else {
            b as u8
        }
    }

    /// Frame-rate register data selecting `mode`
    pub const fn frmctr1_data(mode: u8) -> [u8; 2] {
        let mode = if mode > 31 { 31 } else { mode };
        if mode >= 16 {
            [0x01, 0x10 + (mode - 16)]
        } else {
            [0x00, 0x10 + mode]
        }
    }
}

fn formula_millihz(mode0_period_us: u32, mode: u8) -> u32 {
    let base = 1_000_000_000u64 * 16;
    let (m, div) = if mode >= 16 {
        (mode as u64 - 16, 2)
    } else {
        (mode as u64, 1)
    };
    let den = mode0_period_us as u64 * (16 + m) * div;
    ((base + den / 2) / den) as u32
}
