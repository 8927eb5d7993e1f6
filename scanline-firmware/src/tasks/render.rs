//! Render task
//!
//! Owns the display. Each new sprite position is drawn as one small tile
//! covering both the old and the new sprite rectangle, and pushed as a
//! region update that chases the beam.

use defmt::*;
use embassy_time::{Duration, Instant};
use portable_atomic::Ordering;

use scanline_core::framebuffer::Region;

use super::animate::SPRITE_SIZE;
use crate::channels::{SpriteFrame, FRAMES_SKIPPED, SPRITE};
use crate::runtime;
use crate::PanelDisplay;

/// Screen background
pub const BACKGROUND: u16 = 0x0000;

/// Largest tile edge; the sprite moves less than `TILE - SPRITE_SIZE` per frame
const TILE: usize = 64;

/// Interval between two stats reports
const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Bounding box of the sprite at `frame`
fn sprite_rect(frame: SpriteFrame) -> Region {
    let size = SPRITE_SIZE - 1;
    Region::new(frame.x, frame.x + size, frame.y, frame.y + size)
}

/// Smallest region covering both
fn union(a: Region, b: Region) -> Region {
    Region::new(
        a.x_min.min(b.x_min),
        a.x_max.max(b.x_max),
        a.y_min.min(b.y_min),
        a.y_max.max(b.y_max),
    )
}

/// Paint `region` into `tile`: sprite color inside `sprite`, background elsewhere
fn paint(tile: &mut [u16], region: Region, sprite: Region, color: u16) {
    let w = region.width();
    for (row, line) in tile.chunks_mut(w).take(region.height()).enumerate() {
        let y = region.y_min + row as u16;
        for (col, px) in line.iter_mut().enumerate() {
            let x = region.x_min + col as u16;
            *px = if sprite.contains(x, y) { color } else { BACKGROUND };
        }
    }
}

/// Process runtime events until the display is idle
async fn settle(display: &mut PanelDisplay) {
    let slot = display.slot();
    while display.is_busy() {
        if !display.pump() {
            runtime::wait_event(slot).await;
        }
    }
}

fn report(display: &mut PanelDisplay) {
    let stats = display.stats();
    info!(
        "{} frames, {} mHz, {} teared, margin min {}, skipped {}",
        stats.frames,
        stats.framerate_millihz(),
        stats.teared,
        stats.margin.min(),
        FRAMES_SKIPPED.swap(0, Ordering::Relaxed)
    );
    display.reset_stats();
}

#[embassy_executor::task]
pub async fn render_task(mut display: PanelDisplay) {
    info!("Render task started");

    display.clear(BACKGROUND);
    settle(&mut display).await;

    let rotation = display.config().rotation;
    let mut tile = [BACKGROUND; TILE * TILE];
    let mut previous: Option<Region> = None;
    let mut last_report = Instant::now();

    loop {
        let frame = SPRITE.wait().await;
        let sprite = sprite_rect(frame);
        let dirty = previous.map_or(sprite, |old| union(old, sprite));

        let Some(region) = dirty.clamp(rotation) else {
            continue;
        };
        if region.width() > TILE || region.height() > TILE {
            warn!("sprite jumped too far: {}", region);
            previous = None;
            continue;
        }

        let w = region.width();
        let len = w * region.height();
        paint(&mut tile[..len], region, sprite, frame.color);
        if let Err(e) = display.submit_region(&tile[..len], region, w, true) {
            warn!("region update failed: {}", e);
        }
        settle(&mut display).await;
        previous = Some(sprite);

        if last_report.elapsed() >= STATS_INTERVAL {
            report(&mut display);
            last_report = Instant::now();
        }
    }
}
