//! Partial updates

use super::Display;
use crate::buffering::{plan_region, RegionContext, RegionFollowUp, RegionPlan};
use crate::framebuffer::{BufferError, FrameView, MirrorState, Region};
use crate::traits::{EventSource, PanelBus, PanelControl, Timebase};

impl<'a, B, P, R> Display<'a, B, P, R>
where
    B: PanelBus,
    P: PanelControl,
    R: Timebase + EventSource,
{
    /// Submit only a rectangle of the frame
    ///
    /// `pixels` holds the rectangle alone, rows `stride` pixels apart.
    /// Without `redraw` the change is only recorded; it reaches the panel
    /// with the next redraw. Regions are clipped to the screen; an
    /// off-screen region is ignored.
    pub fn submit_region(
        &mut self,
        pixels: &[u16],
        region: Region,
        stride: usize,
        redraw: bool,
    ) -> Result<(), BufferError> {
        let rotation = self.config.rotation;
        let view = match FrameView::window(pixels, region, stride, rotation) {
            Ok(view) => view,
            Err(BufferError::EmptyRegion) => return Ok(()),
            Err(e) => return Err(e),
        };
        if self.buffers.staged().is_some() {
            self.wait_complete();
        }

        let plan = plan_region(RegionContext {
            mode: self.buffering(),
            diffs: self.diffs.count(),
            mirror_valid: self.buffers.primary_is_mirror(),
            backlog: self.backlog,
            redraw,
        });
        match plan {
            RegionPlan::PushNow => self.push_view(&view),
            RegionPlan::Copy { then } => {
                self.wait_complete();
                if let Some(fb) = self.buffers.primary_mut() {
                    fb.copy_from_view(&view, rotation);
                }
                match then {
                    RegionFollowUp::PushRect => self.push_view(&view),
                    RegionFollowUp::LaunchFull => self.launch_full_redraw(),
                    RegionFollowUp::Defer => self.buffers.set_mirror(MirrorState::Unknown),
                }
            }
            RegionPlan::Merge { launch } => self.merge_region(&view, launch),
        }
        Ok(())
    }

    /// Send the whole primary buffer
    pub(super) fn launch_full_redraw(&mut self) {
        let rotation = self.config.rotation;
        let slot = self.diffs.dummy_primary();
        if let Some(diff) = self.diffs.get_mut(slot) {
            diff.set_rows(rotation.native_box(Region::full(rotation)));
        }
        self.backlog = false;
        self.buffers.mirror_primary();
        if let Some(source) = self.buffers.primary_id() {
            self.launch(source, slot, None);
        }
    }

    /// Diff the region (plus any backlog) into the secondary diff
    fn merge_region(&mut self, view: &FrameView<'_>, launch: bool) {
        let rotation = self.config.rotation;
        let busy = self.scheduler.is_busy();
        let params = self.diff_params(!busy);
        let with_backlog = self.backlog && !busy;

        if let ((Some(fb), _), (Some(pending), Some(fresh))) =
            (self.buffers.split_mut(), self.diffs.real_pair_mut())
        {
            if with_backlog {
                fresh.compute_merged(fb, pending, view, rotation, params);
            } else {
                fresh.compute(fb, view, rotation, params);
            }
        }
        if busy {
            self.wait_complete();
            if let Some(fb) = self.buffers.primary_mut() {
                fb.copy_from_view(view, rotation);
            }
        }
        self.diffs.swap();

        if launch {
            self.backlog = false;
            self.buffers.mirror_primary();
            if let (Some(source), Some(slot)) = (self.buffers.primary_id(), self.diffs.primary()) {
                self.launch(source, slot, None);
            }
        } else {
            self.backlog = true;
            self.buffers.set_mirror(MirrorState::Unknown);
        }
    }
}
