//! Full-frame submission and promotion of staged frames

use super::Display;
use crate::buffering::{plan_submit, DiffKind, SubmitContext, SubmitPlan};
use crate::diff::DiffSlot;
use crate::framebuffer::{BufferError, BufferId, FrameView, Region, Staged};
use crate::scheduler::{Continuation, Progress};
use crate::traits::{EventSource, PanelBus, PanelControl, Timebase};

impl<'a, B, P, R> Display<'a, B, P, R>
where
    B: PanelBus,
    P: PanelControl,
    R: Timebase + EventSource,
{
    /// Submit a full frame in user orientation
    ///
    /// Depending on the buffering mode this pushes it synchronously, starts
    /// an asynchronous transfer, stages it behind the active one, blocks
    /// until the active one is done, or drops it.
    pub fn submit(&mut self, frame: &[u16]) -> Result<(), BufferError> {
        let view = FrameView::full(frame, self.config.rotation)?;
        let plan = plan_submit(SubmitContext {
            mode: self.buffering(),
            spacing: self.config.vsync_spacing,
            busy: self.scheduler.is_busy(),
            diffs: self.diffs.count(),
            mirror_valid: self.buffers.primary_is_mirror(),
            force_full: self.force_full,
        });

        if plan == SubmitPlan::Drop {
            #[cfg(feature = "defmt")]
            defmt::trace!("frame dropped, transfer busy");
            return Ok(());
        }
        self.force_full = false;
        self.backlog = false;

        match plan {
            SubmitPlan::PushNow => self.push_view(&view),
            SubmitPlan::Launch { diff } => self.launch_primary(&view, diff),
            SubmitPlan::WaitThenLaunch { diff } => {
                self.wait_complete();
                self.launch_primary(&view, diff);
            }
            SubmitPlan::DiffWhileBusy => self.diff_while_busy(&view),
            SubmitPlan::Stage { diff } => self.stage(&view, diff),
            SubmitPlan::Drop => {}
        }
        Ok(())
    }

    /// Copy `view` into the idle primary buffer and send it
    fn launch_primary(&mut self, view: &FrameView<'_>, kind: DiffKind) {
        let rotation = self.config.rotation;
        let params = self.diff_params(true);
        let real = match kind {
            DiffKind::Real => self.diffs.primary(),
            DiffKind::Dummy => None,
        };
        let slot = match real {
            Some(slot) => {
                if let (Some(fb), _) = self.buffers.split_mut() {
                    if let Some(diff) = self.diffs.get_mut(slot) {
                        diff.compute(fb, view, rotation, params);
                    }
                }
                slot
            }
            None => {
                let slot = self.diffs.dummy_primary();
                if let Some(diff) = self.diffs.get_mut(slot) {
                    diff.compute_dummy(self.buffers.primary_mut(), view, rotation, true);
                }
                slot
            }
        };
        self.buffers.mirror_primary();
        if let Some(source) = self.buffers.primary_id() {
            self.launch(source, slot, None);
        }
    }

    /// Diff against the untouched primary while the active transfer runs
    fn diff_while_busy(&mut self, view: &FrameView<'_>) {
        let rotation = self.config.rotation;
        let params = self.diff_params(false);
        let Some(slot) = self.diffs.secondary() else {
            self.wait_complete();
            self.launch_primary(view, DiffKind::Real);
            return;
        };
        if let (Some(fb), _) = self.buffers.split_mut() {
            if let Some(diff) = self.diffs.get_mut(slot) {
                diff.compute(fb, view, rotation, params);
            }
        }

        self.wait_complete();
        self.diffs.swap();
        if let Some(fb) = self.buffers.primary_mut() {
            fb.copy_from_view(view, rotation);
        }
        self.buffers.mirror_primary();
        if let (Some(source), Some(slot)) = (self.buffers.primary_id(), self.diffs.primary()) {
            self.launch(source, slot, None);
        }
    }

    /// Park `view` in the secondary buffer until the active transfer ends
    ///
    /// A frame already staged is overwritten.
    fn stage(&mut self, view: &FrameView<'_>, kind: DiffKind) {
        let rotation = self.config.rotation;
        let params = self.diff_params(false);
        let secondary_diff = self.diffs.secondary();

        if self.buffers.secondary_id().is_none() {
            self.wait_complete();
            self.launch_primary(view, DiffKind::Dummy);
            return;
        }
        let (Some(primary), Some(secondary)) = self.buffers.split_mut() else {
            return;
        };
        secondary.copy_from_view(view, rotation);
        let staged = match (kind, secondary_diff.and_then(|s| self.diffs.get_mut(s))) {
            (DiffKind::Real, Some(diff)) => {
                diff.compute(primary, view, rotation, params);
                Staged::Diffed
            }
            _ => Staged::Full,
        };

        #[cfg(feature = "defmt")]
        if self.buffers.staged().is_some() {
            defmt::trace!("staged frame replaced");
        }
        self.buffers.stage(staged);
        self.scheduler.set_continuation(Continuation::PromoteSecondary);
    }

    /// Make the staged secondary buffer primary and send it
    pub(super) fn promote(&mut self) -> Progress {
        let Some(staged) = self.buffers.take_staged() else {
            return Progress::Finished(None);
        };
        self.buffers.swap();

        let slot = match staged {
            Staged::Diffed => {
                self.diffs.swap();
                self.diffs.primary()
            }
            Staged::Full => {
                let rotation = self.config.rotation;
                let slot = self.diffs.dummy_secondary();
                if let Some(diff) = self.diffs.get_mut(slot) {
                    diff.set_rows(rotation.native_box(Region::full(rotation)));
                }
                self.diffs.swap_dummy();
                Some(self.diffs.dummy_primary())
            }
        };
        self.buffers.mirror_primary();

        match (self.buffers.primary_id(), slot) {
            (Some(source), Some(slot)) => {
                let (scheduler, mut ports) = self.split();
                scheduler.launch(&mut ports, source, slot, None)
            }
            _ => Progress::Finished(None),
        }
    }

    /// Start a transfer and run any continuation it finishes with
    pub(super) fn launch(&mut self, source: BufferId, slot: DiffSlot, continuation: Option<Continuation>) {
        let progress = {
            let (scheduler, mut ports) = self.split();
            scheduler.launch(&mut ports, source, slot, continuation)
        };
        self.settle(progress);
    }
}
