//! Frame statistics
//!
//! Integer accumulators only; formatting is left to the application.

/// Running min / max / mean of an integer quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatsVar {
    count: u32,
    sum: i64,
    min: i32,
    max: i32,
}

impl Default for StatsVar {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsVar {
    pub const fn new() -> Self {
        Self {
            count: 0,
            sum: 0,
            min: i32::MAX,
            max: i32::MIN,
        }
    }

    pub fn push(&mut self, value: i32) {
        self.count += 1;
        self.sum += value as i64;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn min(&self) -> Option<i32> {
        (self.count > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<i32> {
        (self.count > 0).then_some(self.max)
    }

    /// Rounded mean
    pub fn avg(&self) -> Option<i32> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as i64;
        let half = if self.sum >= 0 { n / 2 } else { -n / 2 };
        Some(((self.sum + half) / n) as i32)
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// What one frame cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameRecord {
    /// Pixels sent
    pub pixels: u32,
    /// Spans sent
    pub transactions: u32,
    /// Time from the first span to the end of the last one (µs)
    pub upload_us: u32,
    /// Smallest beam margin in scanlines, when paced
    pub margin: Option<i32>,
    /// Refresh periods since the previous frame, when paced
    pub vsync_spacing: Option<i32>,
    /// The diff overflowed and fell back to whole rows
    pub overflowed: bool,
}

/// Statistics since the last reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameStats {
    /// Frames completed
    pub frames: u32,
    /// Frames whose margin went negative
    pub teared: u32,
    /// Frames whose diff overflowed
    pub overflows: u32,
    pub pixels: StatsVar,
    pub transactions: StatsVar,
    pub upload_us: StatsVar,
    pub margin: StatsVar,
    pub vsync_spacing: StatsVar,
    /// Time of the last reset (µs)
    pub since_us: u64,
    /// Time of the last completed frame (µs)
    pub last_frame_us: u64,
}

impl FrameStats {
    pub fn new(now_us: u64) -> Self {
        Self {
            since_us: now_us,
            last_frame_us: now_us,
            ..Default::default()
        }
    }

    pub fn reset(&mut self, now_us: u64) {
        *self = Self::new(now_us);
    }

    /// Account for a completed frame
    pub fn end_frame(&mut self, record: FrameRecord, now_us: u64) {
        self.frames += 1;
        self.last_frame_us = now_us;
        self.pixels.push(record.pixels as i32);
        self.transactions.push(record.transactions as i32);
        self.upload_us.push(record.upload_us as i32);
        if let Some(margin) = record.margin {
            self.margin.push(margin);
            if margin < 0 {
                self.teared += 1;
            }
        }
        if let Some(spacing) = record.vsync_spacing {
            self.vsync_spacing.push(spacing);
        }
        if record.overflowed {
            self.overflows += 1;
        }
    }

    /// Frames per second since the reset, in mHz
    pub fn framerate_millihz(&self) -> u32 {
        let elapsed = self.last_frame_us.saturating_sub(self.since_us);
        if elapsed == 0 {
            return 0;
        }
        (self.frames as u64 * 1_000_000_000 / elapsed) as u32
    }

    /// Share of teared frames, in per mille
    pub fn teared_permille(&self) -> u32 {
        if self.frames == 0 {
            return 0;
        }
        self.teared * 1000 / self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_var() {
        let mut v = StatsVar::new();
        assert_eq!(v.avg(), None);
        for x in [3, -1, 10] {
            v.push(x);
        }
        assert_eq!(v.count(), 3);
        assert_eq!(v.min(), Some(-1));
        assert_eq!(v.max(), Some(10));
        assert_eq!(v.avg(), Some(4));
        v.reset();
        assert_eq!(v.max(), None);
    }

    #[test]
    fn test_teared_frames_counted() {
        let mut stats = FrameStats::new(0);
        stats.end_frame(
            FrameRecord {
                margin: Some(12),
                ..Default::default()
            },
            10_000,
        );
        stats.end_frame(
            FrameRecord {
                margin: Some(-3),
                ..Default::default()
            },
            20_000,
        );
        stats.end_frame(FrameRecord::default(), 30_000);
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.teared, 1);
        assert_eq!(stats.margin.count(), 2);
        assert_eq!(stats.teared_permille(), 333);
        // 3 frames in 30 ms
        assert_eq!(stats.framerate_millihz(), 100_000);
    }
}
