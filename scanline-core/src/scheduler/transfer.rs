//! Vsync-paced span transfer
//!
//! The scheduler never blocks. It is entered once per launch and once per
//! [`SchedulerEvent`], does a bounded amount of bus work and returns. The
//! only synchronous panel access is the occasional scanline query used to
//! resynchronize the [`VsyncClock`].

use crate::config::{VsyncSpacing, MAX_VSYNC_SPACING, MIN_WAIT_US};
use crate::diff::{DiffSet, DiffSlot, DiffSpan, ReadResult};
use crate::framebuffer::{BufferId, FrameBuffer, FrameBufferSet, PANEL_HEIGHT, PANEL_WIDTH, SCANLINES};
use crate::state::{SchedulerEvent, StartPhase, TransferEvent, TransferState};
use crate::stats::{FrameRecord, FrameStats};
use crate::traits::{cmd, PanelBus, PanelControl, Timebase};
use crate::vsync::VsyncClock;

/// Work deferred until the active transfer ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Continuation {
    /// Promote the staged secondary frame and launch it
    PromoteSecondary,
}

/// Outcome of a launch or an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Progress {
    /// Not meaningful in the current state; nothing happened
    Ignored,
    /// Transfer still running
    Pending,
    /// Transfer over (or there was nothing to send), with its continuation
    Finished(Option<Continuation>),
}

/// Everything the scheduler touches, borrowed for one call
pub struct TransferPorts<'p, 'a, B, P, R> {
    pub bus: &'p mut B,
    pub panel: &'p mut P,
    pub runtime: &'p mut R,
    pub vsync: &'p mut VsyncClock,
    pub buffers: &'p FrameBufferSet<'a>,
    pub diffs: &'p mut DiffSet<'a>,
    pub stats: &'p mut FrameStats,
}

/// The single active transfer
#[derive(Debug, Clone, Copy)]
struct TransferContext {
    source: BufferId,
    diff: DiffSlot,
    paced: bool,
    first_row: u32,
    /// Column/page start of the last address window
    window: Option<(u16, u16)>,
    /// Row the span on the bus ends in
    in_flight: Option<u16>,
    /// The diff ran out of storage and ends in whole rows
    overflowed: bool,
    scan_start: u32,
    started_at_us: u64,
    first_span_us: Option<u64>,
    margin: i32,
    pixels: u32,
    transactions: u32,
    continuation: Option<Continuation>,
}

impl TransferContext {
    /// Unwrapped beam position since the transfer started
    fn beam_at(&self, vsync: &VsyncClock, now_us: u64) -> u32 {
        self.scan_start
            .saturating_add(vsync.scanlines_during(now_us.saturating_sub(self.started_at_us)))
    }

    fn write_span<B: PanelBus>(
        &mut self,
        bus: &mut B,
        source: &FrameBuffer<'_>,
        span: DiffSpan,
        now_us: u64,
    ) {
        let (col_changed, row_changed) = match self.window {
            Some((col, row)) => (col != span.col, row != span.row),
            None => (true, true),
        };
        if col_changed {
            bus.write_command(cmd::CASET);
            bus.write_data16(span.col);
            bus.write_data16(PANEL_WIDTH as u16 - 1);
        }
        if row_changed {
            bus.write_command(cmd::PASET);
            bus.write_data16(span.row);
            bus.write_data16(PANEL_HEIGHT as u16 - 1);
        }
        bus.write_command(cmd::RAMWR);

        self.window = Some((span.col, span.row));
        self.in_flight = Some(span.end_row());
        self.first_span_us.get_or_insert(now_us);
        self.pixels += span.len as u32;
        self.transactions += 1;

        bus.start_pixels(source.span(span.col as usize, span.row as usize, span.len as usize));
    }
}

/// Drives one diff at a time onto the bus
#[derive(Debug)]
pub struct TransferScheduler {
    state: TransferState,
    active: Option<TransferContext>,
    spacing: VsyncSpacing,
    clock_hz: u32,
    /// Predicted start of the refresh that shows the last paced frame
    frame_start_us: Option<u64>,
    /// Refresh periods between the last two paced frames
    last_delta: Option<i32>,
}

impl TransferScheduler {
    pub const fn new(spacing: VsyncSpacing, clock_hz: u32) -> Self {
        Self {
            state: TransferState::Idle,
            active: None,
            spacing,
            clock_hz,
            frame_start_us: None,
            last_delta: None,
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    pub fn set_spacing(&mut self, spacing: VsyncSpacing) {
        self.spacing = spacing;
    }

    /// Forget frame timing; the next paced frame starts from scratch
    pub fn reset_timing(&mut self) {
        self.frame_start_us = None;
        self.last_delta = None;
    }

    /// Attach work to run when the active transfer ends
    ///
    /// Returns false when idle.
    pub fn set_continuation(&mut self, continuation: Continuation) -> bool {
        match self.active.as_mut() {
            Some(ctx) => {
                ctx.continuation = Some(continuation);
                true
            }
            None => false,
        }
    }

    /// Start sending `diff` from the `source` framebuffer
    pub fn launch<B, P, R>(
        &mut self,
        ports: &mut TransferPorts<'_, '_, B, P, R>,
        source: BufferId,
        diff: DiffSlot,
        continuation: Option<Continuation>,
    ) -> Progress
    where
        B: PanelBus,
        P: PanelControl,
        R: Timebase,
    {
        if self.state.is_busy() {
            return Progress::Ignored;
        }
        let paced = self.spacing.is_paced();
        let Some(first) = ports.diffs.get(diff).and_then(|d| d.peek()) else {
            if paced {
                self.empty_frame(ports);
            }
            return Progress::Finished(continuation);
        };

        let overflowed = ports.diffs.get(diff).is_some_and(|d| d.overflowed());
        let now = ports.runtime.now_us();
        self.active = Some(TransferContext {
            source,
            diff,
            paced,
            first_row: first.row as u32,
            window: None,
            in_flight: None,
            overflowed,
            scan_start: 0,
            started_at_us: now,
            first_span_us: None,
            margin: SCANLINES as i32,
            pixels: 0,
            transactions: 0,
            continuation,
        });
        self.state = self.state.transition(TransferEvent::Launch);

        let deadline = match (paced, self.frame_start_us, self.spacing.periods()) {
            (true, Some(frame_start), Some(n)) => {
                let period = ports.vsync.period_us() as u64;
                (frame_start + n.saturating_sub(1) as u64 * period).max(now)
            }
            _ => now,
        };
        ports.runtime.arm_timer(deadline);
        Progress::Pending
    }

    /// Feed an event from the runtime
    pub fn resume<B, P, R>(
        &mut self,
        ports: &mut TransferPorts<'_, '_, B, P, R>,
        event: SchedulerEvent,
    ) -> Progress
    where
        B: PanelBus,
        P: PanelControl,
        R: Timebase,
    {
        if !self.state.accepts(event) {
            return Progress::Ignored;
        }
        let now = ports.runtime.now_us();
        match self.state {
            TransferState::Starting(StartPhase::FrameAlign) => self.frame_reached(ports),
            TransferState::Starting(StartPhase::BeamAlign) => self.beam_align(ports, now),
            TransferState::Transferring => {
                self.span_done(ports.vsync, now);
                self.pump(ports)
            }
            TransferState::Waiting => self.pump(ports),
            TransferState::Idle => Progress::Ignored,
        }
    }

    fn frame_reached<B, P, R>(&mut self, ports: &mut TransferPorts<'_, '_, B, P, R>) -> Progress
    where
        B: PanelBus,
        P: PanelControl,
        R: Timebase,
    {
        let Some(ctx) = self.active.as_ref() else {
            return Progress::Ignored;
        };
        if !ctx.paced {
            return self.start_transfer(ports);
        }
        let first_row = ctx.first_row;

        let now = resync(ports);
        let vsync = &mut *ports.vsync;
        let to_top = vsync.micros_to_reach(0, now);
        let to_late = vsync.micros_to_reach(vsync.late_start_scanline(first_row), now);
        let forced = vsync.take_override();
        let wait = if !forced && to_late < to_top { 0 } else { to_top };

        self.state = self.state.transition(TransferEvent::FrameReached);
        ports.runtime.arm_timer(now + wait as u64);
        Progress::Pending
    }

    fn beam_align<B, P, R>(&mut self, ports: &mut TransferPorts<'_, '_, B, P, R>, now: u64) -> Progress
    where
        B: PanelBus,
        P: PanelControl,
        R: Timebase,
    {
        let Some(ctx) = self.active.as_mut() else {
            return Progress::Ignored;
        };
        let wait = ports.vsync.micros_to_exit_range(0, ctx.first_row, now);
        if wait > 0 {
            ports.runtime.arm_timer(now + wait.max(MIN_WAIT_US) as u64);
            return Progress::Pending;
        }

        ctx.scan_start = ports.vsync.scanline_at(now);
        ctx.started_at_us = now;

        let period = ports.vsync.period_us() as u64;
        let next_frame = now + ports.vsync.micros_to_reach(0, now) as u64;
        self.last_delta = self
            .frame_start_us
            .map(|previous| periods_between(previous, next_frame, period));
        self.frame_start_us = Some(next_frame);

        self.start_transfer(ports)
    }

    fn start_transfer<B, P, R>(&mut self, ports: &mut TransferPorts<'_, '_, B, P, R>) -> Progress
    where
        B: PanelBus,
        P: PanelControl,
        R: Timebase,
    {
        self.state = self.state.transition(TransferEvent::BeamReached);
        ports.bus.begin_transaction(self.clock_hz);
        self.pump(ports)
    }

    /// Track the margin of the span that just left the bus
    fn span_done(&mut self, vsync: &VsyncClock, now: u64) {
        let Some(ctx) = self.active.as_mut() else {
            return;
        };
        if let Some(row) = ctx.in_flight.take() {
            if ctx.paced {
                let beam = ctx.beam_at(vsync, now) as i64;
                let margin = (row as i64 + SCANLINES as i64 - beam).clamp(i32::MIN as i64, i32::MAX as i64);
                ctx.margin = ctx.margin.min(margin as i32);
            }
        }
    }

    /// Issue the next span, wait for the beam, or finish
    fn pump<B, P, R>(&mut self, ports: &mut TransferPorts<'_, '_, B, P, R>) -> Progress
    where
        B: PanelBus,
        P: PanelControl,
        R: Timebase,
    {
        let now = ports.runtime.now_us();
        let Some(ctx) = self.active.as_mut() else {
            return Progress::Ignored;
        };
        let beam = if ctx.paced {
            ctx.beam_at(ports.vsync, now)
        } else {
            u32::MAX
        };
        let result = match ports.diffs.get_mut(ctx.diff) {
            Some(diff) => diff.read(beam),
            None => ReadResult::Done,
        };

        match result {
            ReadResult::Span(span) => {
                let Some(source) = ports.buffers.get(ctx.source) else {
                    return self.finish(ports, now);
                };
                ctx.write_span(ports.bus, source, span, now);
                self.state = self.state.transition(TransferEvent::SpanIssued);
                Progress::Pending
            }
            ReadResult::MustWait { until_scanline } => {
                let behind = (until_scanline as u32 + 1).saturating_sub(beam);
                let wait = ports.vsync.time_for_scanlines(behind).max(MIN_WAIT_US);
                ports.runtime.arm_timer(now + wait as u64);
                self.state = self.state.transition(TransferEvent::BeamBehind);
                Progress::Pending
            }
            ReadResult::Done => self.finish(ports, now),
        }
    }

    fn finish<B, P, R>(&mut self, ports: &mut TransferPorts<'_, '_, B, P, R>, now: u64) -> Progress
    where
        B: PanelBus,
        P: PanelControl,
        R: Timebase,
    {
        self.state = self.state.transition(TransferEvent::DiffDone);
        let Some(ctx) = self.active.take() else {
            return Progress::Finished(None);
        };
        ports.bus.end_transaction();
        ports.runtime.cancel_timer();

        let record = FrameRecord {
            pixels: ctx.pixels,
            transactions: ctx.transactions,
            upload_us: ctx
                .first_span_us
                .map(|t| now.saturating_sub(t) as u32)
                .unwrap_or(0),
            margin: ctx.paced.then_some(ctx.margin),
            vsync_spacing: if ctx.paced { self.last_delta } else { None },
            overflowed: ctx.overflowed,
        };
        #[cfg(feature = "defmt")]
        if ctx.paced && ctx.margin < 0 {
            defmt::debug!("frame teared: margin {} scanlines", ctx.margin);
        }
        ports.stats.end_frame(record, now);

        Progress::Finished(ctx.continuation)
    }

    /// Frame timing for a paced frame with nothing to send
    ///
    /// The frame still "happens" at the next refresh it is due for, so the
    /// spacing of the following frames stays correct.
    fn empty_frame<B, P, R>(&mut self, ports: &mut TransferPorts<'_, '_, B, P, R>)
    where
        B: PanelBus,
        P: PanelControl,
        R: Timebase,
    {
        let now = resync(ports);
        let vsync = &mut *ports.vsync;
        let period = vsync.period_us() as u64;
        let spacing = self.spacing.periods().unwrap_or(1) as u64;
        let next_top = now + vsync.micros_to_reach(0, now) as u64;
        let forced = vsync.take_override();

        let frame_start = empty_frame_start(self.frame_start_us, next_top, period, spacing, forced);
        self.last_delta = self
            .frame_start_us
            .map(|previous| periods_between(previous, frame_start, period));
        self.frame_start_us = Some(frame_start);

        ports.stats.end_frame(
            FrameRecord {
                vsync_spacing: self.last_delta,
                ..Default::default()
            },
            now,
        );
    }
}

/// Query the real scanline if the prediction is stale; returns the time
/// after the query
fn resync<B, P, R>(ports: &mut TransferPorts<'_, '_, B, P, R>) -> u64
where
    P: PanelControl,
    R: Timebase,
{
    let now = ports.runtime.now_us();
    if !ports.vsync.needs_resync(now) {
        return now;
    }
    match ports.panel.read_scanline() {
        Ok(scanline) => {
            let at = ports.runtime.now_us();
            ports.vsync.sync(scanline as u32, at);
            at
        }
        Err(_e) => {
            #[cfg(feature = "defmt")]
            defmt::warn!("scanline query failed: {}", _e);
            ports.runtime.now_us()
        }
    }
}

/// When a paced frame with nothing to send is considered shown
///
/// `next_top` is the next refresh start, `previous` the start of the last
/// paced frame. A next refresh within a third of a period of the due one is
/// taken to be the due one.
fn empty_frame_start(previous: Option<u64>, next_top: u64, period: u64, spacing: u64, forced: bool) -> u64 {
    let Some(previous) = previous else {
        return next_top;
    };
    let due = previous + spacing * period;
    let next_top = if next_top.abs_diff(due) < period / 3 {
        due
    } else {
        next_top
    };
    let far = (MAX_VSYNC_SPACING as u64 + 1) * period;
    let start = if forced || next_top > due || due - next_top > far {
        next_top
    } else {
        due
    };
    if start < previous {
        due
    } else {
        start
    }
}

/// Whole refresh periods from `from` to `to`, rounded
fn periods_between(from: u64, to: u64, period: u64) -> i32 {
    let period = period.max(1);
    ((to.saturating_sub(from) + period / 2) / period) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{DiffBuffer, DiffParams, ToleranceMask};
    use crate::framebuffer::{FrameView, Rotation, PANEL_PIXELS};
    use crate::sim::{Sim, SimBus, SimPanel, SimRuntime};
    use crate::traits::EventSource;

    const PERIOD: u32 = SCANLINES * 40;

    struct Rig<'a> {
        sim: Sim,
        bus: SimBus,
        panel: SimPanel,
        runtime: SimRuntime,
        vsync: VsyncClock,
        buffers: FrameBufferSet<'a>,
        diffs: DiffSet<'a>,
        stats: FrameStats,
        scheduler: TransferScheduler,
    }

    impl<'a> Rig<'a> {
        fn new(spacing: VsyncSpacing, fb: &'a mut [u16], spans: &'a mut [DiffSpan]) -> Self {
            let sim = Sim::new(PERIOD);
            let mut buffers = FrameBufferSet::new();
            buffers.assign(Some(FrameBuffer::new(fb).unwrap()), None);
            let mut diffs = DiffSet::new();
            diffs.assign(Some(DiffBuffer::new(spans)), None);
            let mut vsync = VsyncClock::new(PERIOD);
            vsync.set_late_start_percent(0);
            Self {
                bus: sim.bus(),
                panel: sim.panel(),
                runtime: sim.runtime(),
                sim,
                vsync,
                buffers,
                diffs,
                stats: FrameStats::new(0),
                scheduler: TransferScheduler::new(spacing, 1_000_000),
            }
        }

        fn ports(&mut self) -> (&mut TransferScheduler, TransferPorts<'_, 'a, SimBus, SimPanel, SimRuntime>) {
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

        /// Diff a frame into the primary diff, copying it into the buffer
        fn load(&mut self, frame: &[u16]) -> DiffSlot {
            let view = FrameView::full(frame, Rotation::Portrait).unwrap();
            let slot = self.diffs.primary().unwrap();
            let (fb, _) = self.buffers.split_mut();
            self.diffs.get_mut(slot).unwrap().compute(
                fb.unwrap(),
                &view,
                Rotation::Portrait,
                DiffParams {
                    gap: 4,
                    mask: ToleranceMask::STRICT,
                    copy: true,
                },
            );
            slot
        }

        fn run(&mut self, slot: DiffSlot) -> Progress {
            let source = self.buffers.primary_id().unwrap();
            let (sched, mut ports) = self.ports();
            let mut progress = sched.launch(&mut ports, source, slot, None);
            let slot_id = crate::registry::Registry::<1>::new().register().unwrap();
            while progress == Progress::Pending || progress == Progress::Ignored {
                let event = ports.runtime.poll_event(slot_id).expect("transfer stalled");
                progress = sched.resume(&mut ports, event);
            }
            progress
        }

        /// Let time pass until the beam is halfway through `line`
        fn beam_to(&mut self, line: u32) {
            let period = PERIOD as u64;
            let target = line as u64 * 40 + 20;
            let delay = (target + period - self.sim.now() % period) % period;
            self.runtime.delay_us(delay as u32);
        }

        /// Launch `frame`, report how long the scheduler holds it before
        /// aligning to the beam, then let it run to the end
        fn start_delay(&mut self, frame: &[u16]) -> u64 {
            let sim = self.sim.clone();
            let slot = self.load(frame);
            let source = self.buffers.primary_id().unwrap();
            let slot_id = crate::registry::Registry::<1>::new().register().unwrap();
            let (sched, mut ports) = self.ports();
            assert_eq!(sched.launch(&mut ports, source, slot, None), Progress::Pending);

            let event = ports.runtime.poll_event(slot_id).unwrap();
            assert_eq!(event, SchedulerEvent::TimerExpired);
            assert_eq!(sched.resume(&mut ports, event), Progress::Pending);
            assert_eq!(sched.state(), TransferState::Starting(StartPhase::BeamAlign));
            let delay = sim.timer().unwrap() - sim.now();

            loop {
                let event = ports.runtime.poll_event(slot_id).expect("transfer stalled");
                if let Progress::Finished(_) = sched.resume(&mut ports, event) {
                    break;
                }
            }
            delay
        }
    }

    fn frame_with_rows(rows: &[usize], color: u16) -> Vec<u16> {
        let mut frame = vec![0u16; PANEL_PIXELS];
        for &y in rows {
            frame[y * PANEL_WIDTH + 10..y * PANEL_WIDTH + 20].fill(color);
        }
        frame
    }

    #[test]
    fn test_unpaced_sends_every_span_back_to_back() {
        let mut fb = vec![0u16; PANEL_PIXELS];
        let mut spans = [DiffSpan::default(); 64];
        let mut rig = Rig::new(VsyncSpacing::Unpaced, &mut fb, &mut spans);
        let slot = rig.load(&frame_with_rows(&[3, 200, 479], 9));

        assert_eq!(rig.run(slot), Progress::Finished(None));
        assert_eq!(rig.scheduler.state(), TransferState::Idle);
        assert_eq!(rig.stats.frames, 1);
        assert_eq!(rig.stats.pixels.max(), Some(30));
        assert_eq!(rig.stats.margin.count(), 0);
        assert_eq!(rig.sim.gram()[200 * PANEL_WIDTH + 15], 9);
        assert_eq!(rig.sim.transactions(), (1, 1));
    }

    #[test]
    fn test_address_commands_elided_when_unchanged() {
        let mut fb = vec![0u16; PANEL_PIXELS];
        let mut spans = [DiffSpan::default(); 64];
        let mut rig = Rig::new(VsyncSpacing::Unpaced, &mut fb, &mut spans);
        // same columns on three rows: one CASET, three PASETs
        let slot = rig.load(&frame_with_rows(&[5, 6, 7], 1));
        rig.run(slot);
        let log = rig.sim.commands();
        let count = |c| log.iter().filter(|&&x| x == c).count();
        assert_eq!(count(cmd::CASET), 1);
        assert_eq!(count(cmd::PASET), 3);
        assert_eq!(count(cmd::RAMWR), 3);
    }

    #[test]
    fn test_paced_spans_never_overtake_the_beam() {
        let mut fb = vec![0u16; PANEL_PIXELS];
        let mut spans = [DiffSpan::default(); 64];
        let mut rig = Rig::new(VsyncSpacing::Every(1), &mut fb, &mut spans);
        let slot = rig.load(&frame_with_rows(&[10, 240, 470], 3));
        rig.run(slot);

        for (row, at) in rig.sim.span_starts() {
            assert!(
                rig.sim.absolute_scanline(at) % SCANLINES as u64 >= row as u64,
                "row {} issued ahead of the beam",
                row
            );
        }
        assert_eq!(rig.stats.teared, 0);
        assert!(rig.stats.margin.min().unwrap() > 0);
    }

    #[test]
    fn test_empty_paced_frame_advances_frame_timing() {
        let mut fb = vec![0u16; PANEL_PIXELS];
        let mut spans = [DiffSpan::default(); 64];
        let mut rig = Rig::new(VsyncSpacing::Every(2), &mut fb, &mut spans);
        let slot = rig.load(&frame_with_rows(&[100], 3));
        rig.run(slot);

        // same frame again: nothing to send
        let slot = rig.load(&frame_with_rows(&[100], 3));
        assert_eq!(rig.run(slot), Progress::Finished(None));
        assert_eq!(rig.stats.frames, 2);
        assert_eq!(rig.stats.vsync_spacing.count(), 1);
        assert_eq!(rig.stats.vsync_spacing.max(), Some(2));
    }

    #[test]
    fn test_late_start_ratio_and_one_shot_override() {
        let mut fb = vec![0u16; PANEL_PIXELS];
        let mut spans = [DiffSpan::default(); 64];
        let mut rig = Rig::new(VsyncSpacing::Every(1), &mut fb, &mut spans);
        rig.vsync.set_late_start_percent(100);
        // first row 100, beam at 200: 280 scanlines to the top
        let to_top = 280 * 40;

        // a fresh clock waits for the top once, whatever the ratio
        rig.beam_to(200);
        let delay = rig.start_delay(&frame_with_rows(&[100], 1));
        assert!(delay.abs_diff(to_top) <= 40, "delay {}", delay);

        rig.scheduler.reset_timing();
        rig.beam_to(200);
        assert_eq!(rig.start_delay(&frame_with_rows(&[100], 2)), 0);

        rig.vsync.set_late_start_percent(0);
        rig.scheduler.reset_timing();
        rig.beam_to(200);
        let delay = rig.start_delay(&frame_with_rows(&[100], 3));
        assert!(delay.abs_diff(to_top) <= 40, "delay {}", delay);

        // a forced resync brings the full wait back for one frame
        rig.vsync.set_late_start_percent(100);
        rig.vsync.force_resync();
        rig.scheduler.reset_timing();
        rig.beam_to(200);
        let delay = rig.start_delay(&frame_with_rows(&[100], 4));
        assert!(delay.abs_diff(to_top) <= 40, "delay {}", delay);

        rig.scheduler.reset_timing();
        rig.beam_to(200);
        assert_eq!(rig.start_delay(&frame_with_rows(&[100], 5)), 0);
        assert_eq!(rig.stats.frames, 5);
    }

    #[test]
    fn test_overflowed_diff_counted() {
        let mut fb = vec![0u16; PANEL_PIXELS];
        let mut spans = [DiffSpan::default(); 4];
        let mut rig = Rig::new(VsyncSpacing::Unpaced, &mut fb, &mut spans);
        let frame = frame_with_rows(&[1, 2, 3, 4, 5, 6], 7);
        let slot = rig.load(&frame);
        assert!(rig.diffs.get(slot).unwrap().overflowed());

        assert_eq!(rig.run(slot), Progress::Finished(None));
        assert_eq!(rig.sim.gram(), frame);
        assert_eq!(rig.stats.overflows, 1);

        let mut next = frame.clone();
        next[PANEL_WIDTH + 10] = 8;
        let slot = rig.load(&next);
        rig.run(slot);
        assert_eq!(rig.stats.frames, 2);
        assert_eq!(rig.stats.overflows, 1);
    }

    #[test]
    fn test_empty_frame_start() {
        let period = 1_000;
        assert_eq!(empty_frame_start(None, 2_200, period, 2, false), 2_200);
        // due at 2000: a refresh within a third of a period is the due one
        assert_eq!(empty_frame_start(Some(0), 2_200, period, 2, false), 2_000);
        assert_eq!(empty_frame_start(Some(0), 1_800, period, 2, true), 2_000);
        // further away it is taken as is when late or forced
        assert_eq!(empty_frame_start(Some(0), 2_400, period, 2, false), 2_400);
        assert_eq!(empty_frame_start(Some(0), 1_000, period, 2, true), 1_000);
        // early and not forced: the frame still lands on the due refresh
        assert_eq!(empty_frame_start(Some(0), 1_000, period, 2, false), 2_000);
    }

    #[test]
    fn test_stale_events_are_ignored() {
        let mut fb = vec![0u16; PANEL_PIXELS];
        let mut spans = [DiffSpan::default(); 4];
        let mut rig = Rig::new(VsyncSpacing::Unpaced, &mut fb, &mut spans);
        let (sched, mut ports) = rig.ports();
        assert_eq!(
            sched.resume(&mut ports, SchedulerEvent::TransferComplete),
            Progress::Ignored
        );
        assert_eq!(
            sched.resume(&mut ports, SchedulerEvent::TimerExpired),
            Progress::Ignored
        );
    }

    #[test]
    fn test_continuation_returned_once() {
        let mut fb = vec![0u16; PANEL_PIXELS];
        let mut spans = [DiffSpan::default(); 8];
        let mut rig = Rig::new(VsyncSpacing::Unpaced, &mut fb, &mut spans);
        let slot = rig.load(&frame_with_rows(&[1], 5));
        let source = rig.buffers.primary_id().unwrap();
        let (sched, mut ports) = rig.ports();
        assert_eq!(sched.launch(&mut ports, source, slot, None), Progress::Pending);
        assert!(sched.set_continuation(Continuation::PromoteSecondary));

        let slot_id = crate::registry::Registry::<1>::new().register().unwrap();
        let mut finished = 0;
        while let Some(event) = ports.runtime.poll_event(slot_id) {
            if let Progress::Finished(c) = sched.resume(&mut ports, event) {
                assert_eq!(c, Some(Continuation::PromoteSecondary));
                finished += 1;
            }
        }
        assert_eq!(finished, 1);
        assert!(!sched.set_continuation(Continuation::PromoteSecondary));
    }
}
