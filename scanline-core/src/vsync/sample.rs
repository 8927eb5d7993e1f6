//! Refresh period measurement
//!
//! Counts whole frames on the panel's scanline register. A frame boundary
//! is seen as the reported scanline going backwards.

use crate::traits::{PanelControl, PanelError, Timebase};

/// Frames averaged per measurement
pub const SAMPLE_FRAMES: u32 = 10;

/// Pause before looking for the next wrap, so one boundary is never
/// counted twice
pub const MIN_FRAME_GAP_US: u32 = 5_000;

/// Longest time a single frame may take before the panel is considered
/// unresponsive (slowest mode is well under this)
pub const WRAP_TIMEOUT_US: u64 = 150_000;

/// Busy-wait until the beam wraps from the bottom back to the top
fn wait_for_wrap<P, T>(panel: &mut P, time: &mut T) -> Result<u64, PanelError>
where
    P: PanelControl,
    T: Timebase,
{
    let started = time.now_us();
    let mut previous = panel.read_scanline()?;
    loop {
        let current = panel.read_scanline()?;
        let now = time.now_us();
        if current < previous {
            return Ok(now);
        }
        if now - started > WRAP_TIMEOUT_US {
            return Err(PanelError::Timeout);
        }
        previous = current;
    }
}

/// Measure the current scan period (µs)
pub fn measure_period<P, T>(panel: &mut P, time: &mut T) -> Result<u32, PanelError>
where
    P: PanelControl,
    T: Timebase,
{
    let start = wait_for_wrap(panel, time)?;
    let mut end = start;
    for _ in 0..SAMPLE_FRAMES {
        time.delay_us(MIN_FRAME_GAP_US);
        end = wait_for_wrap(panel, time)?;
    }
    let period = ((end - start) / SAMPLE_FRAMES as u64) as u32;

    #[cfg(feature = "defmt")]
    defmt::debug!("measured scan period: {} us", period);

    Ok(period.max(1))
}
