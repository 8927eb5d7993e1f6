//! Display facade
//!
//! [`Display`] ties the pieces together: it owns the framebuffers and diff
//! buffers handed in by the application, asks the buffering policy what to
//! do with each submitted frame, and feeds runtime events to the transfer
//! scheduler.
//!
//! Configuration changes always wait for the active transfer to finish;
//! transfers are never cancelled half way.

mod direct;
mod region;
mod submit;

use crate::buffering::BufferingMode;
use crate::config::{CalibrationRecord, DisplayConfig, VsyncSpacing, MAX_REFRESH_MODE};
use crate::diff::{DiffBuffer, DiffParams, DiffSet, DiffSpan, ToleranceMask};
use crate::framebuffer::{BufferError, FrameBuffer, FrameBufferSet, Rotation};
use crate::registry::Slot;
use crate::scheduler::{InputGate, Progress, TransferPorts, TransferScheduler};
use crate::stats::FrameStats;
use crate::traits::{EventSource, PanelBus, PanelControl, PanelError, Timebase};
use crate::vsync::{measure_period, RefreshCalibration, VsyncClock};

/// One panel, its buffers and its transfer engine
pub struct Display<'a, B, P, R> {
    bus: B,
    panel: P,
    runtime: R,
    slot: Slot,
    config: DisplayConfig,
    buffers: FrameBufferSet<'a>,
    diffs: DiffSet<'a>,
    scheduler: TransferScheduler,
    vsync: VsyncClock,
    stats: FrameStats,
    gate: InputGate,
    /// Primary diff holds region changes not yet on the panel
    backlog: bool,
    /// Next full submit skips diffing
    force_full: bool,
}

impl<'a, B, P, R> Display<'a, B, P, R>
where
    B: PanelBus,
    P: PanelControl,
    R: Timebase + EventSource,
{
    /// Create a display; `slot` is this instance's entry in the runtime's
    /// registration table
    pub fn new(bus: B, panel: P, mut runtime: R, slot: Slot, config: DisplayConfig) -> Self {
        let config = config.sanitized();
        let mut vsync = VsyncClock::default();
        vsync.set_late_start_percent(config.late_start_percent);
        vsync.set_resync_interval_us(config.resync_interval_us);
        let now = runtime.now_us();
        Self {
            bus,
            panel,
            runtime,
            slot,
            config,
            buffers: FrameBufferSet::new(),
            diffs: DiffSet::new(),
            scheduler: TransferScheduler::new(config.vsync_spacing, config.spi_clock_hz),
            vsync,
            stats: FrameStats::new(now),
            gate: InputGate::new(),
            backlog: false,
            force_full: false,
        }
    }

    /// Bring up the panel and calibrate the refresh clock
    ///
    /// A valid `stored` record skips the mode-0 measurement. Returns the
    /// record to persist.
    pub fn init(&mut self, stored: Option<CalibrationRecord>) -> Result<CalibrationRecord, PanelError> {
        self.panel.init()?;
        self.panel.set_rotation(self.config.rotation)?;

        let mode0_period = match stored.filter(|r| r.is_valid() && r.verify_crc()) {
            Some(record) => record.mode0_period_us,
            None => {
                self.write_refresh_mode(0)?;
                measure_period(&mut self.panel, &mut self.runtime)?
            }
        };
        self.vsync
            .set_calibration(RefreshCalibration::from_mode0_period(mode0_period));
        self.vsync.set_mode(0, mode0_period);
        self.set_refresh_mode(self.config.refresh_mode)?;

        #[cfg(feature = "defmt")]
        defmt::info!(
            "display ready: mode {} at {} mHz",
            self.vsync.mode(),
            self.vsync.calibration().millihz_for_mode(self.vsync.mode())
        );

        Ok(self.calibration_record())
    }

    /// Calibration to persist across boots
    pub fn calibration_record(&self) -> CalibrationRecord {
        CalibrationRecord::new(self.vsync.calibration().mode0_period_us, self.vsync.mode())
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        let now = self.runtime.now_us();
        self.stats.reset(now);
    }

    pub fn vsync(&self) -> &VsyncClock {
        &self.vsync
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn is_busy(&self) -> bool {
        self.scheduler.is_busy()
    }

    /// Requested buffering limited by the framebuffers actually owned
    pub fn buffering(&self) -> BufferingMode {
        self.config
            .buffering
            .min(BufferingMode::for_buffers(self.buffers.count()))
    }

    /// Process one pending runtime event; false if there was none
    pub fn pump(&mut self) -> bool {
        let Some(event) = self.runtime.poll_event(self.slot) else {
            return false;
        };
        let progress = {
            let (scheduler, mut ports) = self.split();
            scheduler.resume(&mut ports, event)
        };
        self.settle(progress);
        true
    }

    /// Spin until no transfer is active (including promoted frames)
    pub fn wait_complete(&mut self) {
        while self.scheduler.is_busy() {
            if !self.pump() {
                core::hint::spin_loop();
            }
        }
    }

    /// Ask to sample input; true if the bus is free right now
    pub fn request_input_sample(&mut self) -> bool {
        self.gate.request(self.scheduler.is_busy())
    }

    /// Consume a sampling grant issued when the last transfer ended
    pub fn take_input_grant(&mut self) -> bool {
        self.gate.take_grant()
    }

    /// Hand over the owned framebuffers (each at least one full frame)
    pub fn set_framebuffers(
        &mut self,
        first: Option<&'a mut [u16]>,
        second: Option<&'a mut [u16]>,
    ) -> Result<(), BufferError> {
        self.wait_complete();
        let first = first.map(FrameBuffer::new).transpose()?;
        let second = second.map(FrameBuffer::new).transpose()?;
        self.buffers.assign(first, second);
        self.reconfigure();
        Ok(())
    }

    /// Hand over span storage for real diffs
    pub fn set_diff_buffers(&mut self, first: Option<&'a mut [DiffSpan]>, second: Option<&'a mut [DiffSpan]>) {
        self.wait_complete();
        self.diffs
            .assign(first.map(DiffBuffer::new), second.map(DiffBuffer::new));
        self.reconfigure();
    }

    pub fn set_buffering(&mut self, mode: BufferingMode) {
        if mode != self.config.buffering {
            self.wait_complete();
            self.config.buffering = mode;
            self.reconfigure();
        }
    }

    pub fn set_rotation(&mut self, rotation: Rotation) -> Result<(), PanelError> {
        self.wait_complete();
        self.config.rotation = rotation;
        self.panel.set_rotation(rotation)?;
        self.reconfigure();
        self.set_refresh_mode(self.vsync.mode())
    }

    pub fn set_vsync_spacing(&mut self, spacing: VsyncSpacing) {
        self.wait_complete();
        self.config.vsync_spacing = spacing.clamped();
        self.scheduler.set_spacing(self.config.vsync_spacing);
        self.scheduler.reset_timing();
        self.vsync.force_resync();
    }

    pub fn set_diff_gap(&mut self, gap: u16) {
        self.config.diff_gap = gap;
    }

    pub fn set_compare_mask(&mut self, mask: ToleranceMask) {
        self.config.compare_mask = mask;
    }

    /// Late-start ratio in percent (clamped to 100)
    pub fn set_late_start_ratio(&mut self, percent: u8) {
        self.vsync.set_late_start_percent(percent);
        self.config.late_start_percent = self.vsync.late_start_percent();
    }

    /// Program a refresh mode and measure its actual period
    pub fn set_refresh_mode(&mut self, mode: u8) -> Result<(), PanelError> {
        self.wait_complete();
        let mode = mode.min(MAX_REFRESH_MODE);
        self.write_refresh_mode(mode)?;
        // the predicted period stands if the measurement fails
        let predicted = self.vsync.calibration().period_for_mode(mode);
        self.vsync.set_mode(mode, predicted);
        self.config.refresh_mode = mode;
        self.vsync.force_resync();
        let period = measure_period(&mut self.panel, &mut self.runtime)?;
        self.vsync.set_mode(mode, period);
        self.scheduler.reset_timing();
        self.reset_stats();
        Ok(())
    }

    /// Select the mode closest to `millihz`; returns the mode chosen
    pub fn set_refresh_rate(&mut self, millihz: u32) -> Result<u8, PanelError> {
        let mode = self.vsync.calibration().mode_for_millihz(millihz);
        self.set_refresh_mode(mode)?;
        Ok(mode)
    }

    /// Force a real scanline query and a full wait before the next frame
    pub fn resync(&mut self) {
        self.vsync.force_resync();
    }

    pub fn sleep(&mut self, enable: bool) -> Result<(), PanelError> {
        self.wait_complete();
        self.panel.sleep(enable)?;
        self.vsync.force_resync();
        Ok(())
    }

    /// Make the next full submit a complete redraw
    pub fn request_full_redraw(&mut self) {
        self.force_full = true;
    }

    fn write_refresh_mode(&mut self, mode: u8) -> Result<(), PanelError> {
        self.panel.write_register(
            crate::vsync::FRMCTR1,
            &RefreshCalibration::frmctr1_data(mode),
        )
    }

    /// Drop everything tied to the previous configuration
    fn reconfigure(&mut self) {
        self.wait_complete();
        self.buffers.invalidate();
        self.diffs.invalidate();
        self.backlog = false;
        self.vsync.force_resync();
        self.scheduler.reset_timing();
        self.reset_stats();
    }

    fn diff_params(&self, copy: bool) -> DiffParams {
        DiffParams {
            gap: self.config.diff_gap,
            mask: self.config.compare_mask,
            copy,
        }
    }

    fn split(&mut self) -> (&mut TransferScheduler, TransferPorts<'_, 'a, B, P, R>) {
        (
            &mut self.scheduler,
            TransferPorts {
                bus: &mut self.bus,
                panel: &mut self.panel,
                runtime: &mut self.runtime,
                vsync: &mut self.vsync,
                buffers: &self.buffers,
                diffs: &mut self.diffs,
                stats: &mut self.stats,
            },
        )
    }

    /// Run continuations until the scheduler is busy again or idle for good
    fn settle(&mut self, mut progress: Progress) {
        while let Progress::Finished(continuation) = progress {
            progress = match continuation {
                Some(crate::scheduler::Continuation::PromoteSecondary) => self.promote(),
                None => break,
            };
        }
        if !self.scheduler.is_busy() {
            self.gate.release();
        }
    }
}
