//! Synchronous pushes that bypass the diff engine

use super::Display;
use crate::framebuffer::{FrameView, Region, PANEL_HEIGHT, PANEL_WIDTH};
use crate::stats::FrameRecord;
use crate::traits::{EventSource, PanelBus, PanelControl, Timebase};

impl<'a, B, P, R> Display<'a, B, P, R>
where
    B: PanelBus,
    P: PanelControl,
    R: Timebase + EventSource,
{
    /// Fill the panel with one color
    pub fn clear(&mut self, color: u16) {
        self.wait_complete();
        let row = [color; PANEL_WIDTH];
        let started = self.runtime.now_us();

        self.bus.begin_transaction(self.config.spi_clock_hz);
        self.bus
            .set_window(0, PANEL_WIDTH as u16 - 1, 0, PANEL_HEIGHT as u16 - 1);
        for _ in 0..PANEL_HEIGHT {
            self.bus.write_pixels(&row);
        }
        self.bus.end_transaction();
        // a long blocking write leaves the beam estimate stale
        self.vsync.force_resync();

        self.backlog = false;
        if let Some(fb) = self.buffers.primary_mut() {
            fb.fill(color);
        }
        self.buffers.mirror_primary();

        let now = self.runtime.now_us();
        self.stats.end_frame(
            FrameRecord {
                pixels: (PANEL_WIDTH * PANEL_HEIGHT) as u32,
                transactions: PANEL_HEIGHT as u32,
                upload_us: now.saturating_sub(started) as u32,
                ..Default::default()
            },
            now,
        );
    }

    /// Write a view row by row, returning once every pixel is on the wire
    ///
    /// When paced, each native row waits for the beam to pass it first.
    pub(super) fn push_view(&mut self, view: &FrameView<'_>) {
        let rotation = self.config.rotation;
        let nb: Region = rotation.native_box(view.region());
        let paced = self.config.vsync_spacing.is_paced();
        let width = nb.width();
        let mut row = [0u16; PANEL_WIDTH];

        if paced && self.vsync.needs_resync(self.runtime.now_us()) {
            if let Ok(scanline) = self.panel.read_scanline() {
                let at = self.runtime.now_us();
                self.vsync.sync(scanline as u32, at);
            }
        }
        let started = self.runtime.now_us();
        let scan_start = self.vsync.scanline_at(started);

        self.bus.begin_transaction(self.config.spi_clock_hz);
        self.bus.set_window(nb.x_min, nb.x_max, nb.y_min, nb.y_max);
        for y in nb.y_min as usize..=nb.y_max as usize {
            if paced {
                let elapsed = self.runtime.now_us().saturating_sub(started);
                let beam = scan_start + self.vsync.scanlines_during(elapsed);
                if y as u32 > beam {
                    let wait = self.vsync.time_for_scanlines(y as u32 + 1 - beam);
                    self.runtime.delay_us(wait);
                }
            }
            for (i, x) in (nb.x_min as usize..=nb.x_max as usize).enumerate() {
                let (ux, uy) = rotation.native_to_user(x, y);
                row[i] = view.at(ux, uy);
            }
            self.bus.write_pixels(&row[..width]);
        }
        self.bus.end_transaction();

        let now = self.runtime.now_us();
        self.stats.end_frame(
            FrameRecord {
                pixels: (width * nb.height()) as u32,
                transactions: nb.height() as u32,
                upload_us: now.saturating_sub(started) as u32,
                ..Default::default()
            },
            now,
        );
    }
}
