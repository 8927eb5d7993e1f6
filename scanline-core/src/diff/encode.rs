//! Run-length diff encoding between a reference framebuffer and a new frame

use heapless::Vec;

use super::buffer::DiffBuffer;
use super::span::{DiffSpan, ToleranceMask};
use crate::framebuffer::{FrameBuffer, FrameView, Rotation, PANEL_HEIGHT, PANEL_WIDTH};

/// Most runs a single row can hold (changed/unchanged alternating)
const MAX_RUNS_PER_ROW: usize = PANEL_WIDTH / 2;

/// Encoding parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiffParams {
    /// Runs separated by fewer unchanged pixels than this are merged
    pub gap: u16,
    /// Significant bits for comparison
    pub mask: ToleranceMask,
    /// Overwrite the reference with the new frame during the scan
    pub copy: bool,
}

/// Coalesces runs arriving in ascending column order
struct RunMerger {
    gap: u16,
    run: Option<(u16, u16)>,
}

impl RunMerger {
    const fn new(gap: u16) -> Self {
        Self { gap, run: None }
    }

    #[inline]
    fn add(&mut self, start: u16, end: u16, mut emit: impl FnMut(u16, u16)) {
        self.run = match self.run {
            Some((s, e)) if start <= e || start - e < self.gap => Some((s, e.max(end))),
            Some((s, e)) => {
                emit(s, e);
                Some((start, end))
            }
            None => Some((start, end)),
        };
    }

    #[inline]
    fn flush(&mut self, mut emit: impl FnMut(u16, u16)) {
        if let Some((s, e)) = self.run.take() {
            emit(s, e);
        }
    }
}

/// Compare one native row against the target, feeding changed runs to `emit`
fn scan_row(
    row: &mut [u16],
    y: usize,
    x_range: (usize, usize),
    target: &FrameView<'_>,
    rotation: Rotation,
    params: DiffParams,
    mut emit: impl FnMut(u16, u16),
) {
    let mut runs = RunMerger::new(params.gap);
    for x in x_range.0..=x_range.1 {
        let (ux, uy) = rotation.native_to_user(x, y);
        let new = target.at(ux, uy);
        if params.mask.differs(row[x], new) {
            runs.add(x as u16, x as u16 + 1, &mut emit);
        }
        if params.copy {
            row[x] = new;
        }
    }
    runs.flush(&mut emit);
}

impl<'a> DiffBuffer<'a> {
    /// Diff `target` against `reference` over the target's region
    ///
    /// The scan follows native raster order so spans come out sorted by row.
    /// With `params.copy` the reference is updated in the same pass.
    pub fn compute(
        &mut self,
        reference: &mut FrameBuffer<'_>,
        target: &FrameView<'_>,
        rotation: Rotation,
        params: DiffParams,
    ) {
        self.begin_spans();
        let nb = rotation.native_box(target.region());
        let x_range = (nb.x_min as usize, nb.x_max as usize);
        for y in nb.y_min as usize..=nb.y_max as usize {
            let row = &mut reference.pixels_mut()[y * PANEL_WIDTH..(y + 1) * PANEL_WIDTH];
            scan_row(row, y, x_range, target, rotation, params, |s, e| {
                self.push(DiffSpan::new(y as u16, s, e - s))
            });
        }
        self.finish_spans();
    }

    /// Like [`compute`](Self::compute), but the result also contains every
    /// span of `pending`, a diff that was never sent to the panel
    pub fn compute_merged(
        &mut self,
        reference: &mut FrameBuffer<'_>,
        pending: &DiffBuffer<'_>,
        target: &FrameView<'_>,
        rotation: Rotation,
        params: DiffParams,
    ) {
        self.begin_spans();
        let nb = rotation.native_box(target.region());
        let x_range = (nb.x_min as usize, nb.x_max as usize);
        let mut old = pending.iter().peekable();

        for y in 0..PANEL_HEIGHT {
            let mut fresh: Vec<(u16, u16), MAX_RUNS_PER_ROW> = Vec::new();
            if y >= nb.y_min as usize && y <= nb.y_max as usize {
                let row = &mut reference.pixels_mut()[y * PANEL_WIDTH..(y + 1) * PANEL_WIDTH];
                scan_row(row, y, x_range, target, rotation, params, |s, e| {
                    // runs never outnumber half the row width
                    let _ = fresh.push((s, e));
                });
            }

            let mut merger = RunMerger::new(params.gap);
            let mut fresh = fresh.iter().copied().peekable();
            loop {
                let prev = old
                    .peek()
                    .filter(|s| s.row as usize == y)
                    .map(|s| (s.col, s.end()));
                let (start, end) = match (prev, fresh.peek().copied()) {
                    (Some(p), Some(f)) if p.0 <= f.0 => {
                        old.next();
                        p
                    }
                    (_, Some(f)) => {
                        fresh.next();
                        f
                    }
                    (Some(p), None) => {
                        old.next();
                        p
                    }
                    (None, None) => break,
                };
                merger.add(start, end, |s, e| self.push(DiffSpan::new(y as u16, s, e - s)));
            }
            merger.flush(|s, e| self.push(DiffSpan::new(y as u16, s, e - s)));
        }
        self.finish_spans();
    }

    /// Full redraw of the target region without comparing anything
    ///
    /// With `copy`, the region is still copied into the reference.
    pub fn compute_dummy(
        &mut self,
        reference: Option<&mut FrameBuffer<'_>>,
        target: &FrameView<'_>,
        rotation: Rotation,
        copy: bool,
    ) {
        if copy {
            if let Some(reference) = reference {
                reference.copy_from_view(target, rotation);
            }
        }
        self.set_rows(rotation.native_box(target.region()));
    }
}
