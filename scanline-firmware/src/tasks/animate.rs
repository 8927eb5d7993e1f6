//! Sprite animation
//!
//! Bounces a square around the screen and publishes its position once per
//! display frame. The render task always draws the newest position.

use defmt::*;
use embassy_time::{Duration, Ticker};

use portable_atomic::Ordering;

use crate::channels::{SpriteFrame, FRAMES_SKIPPED, SPRITE};

/// Sprite edge length in pixels
pub const SPRITE_SIZE: u16 = 48;

/// Largest move per frame on either axis
pub const MAX_STEP: i16 = 6;

#[derive(Debug, Clone, Copy)]
pub struct AnimateConfig {
    /// Screen size in user orientation
    pub width: u16,
    pub height: u16,
    /// Time between two frames (µs)
    pub frame_us: u32,
}

/// Position and velocity of the sprite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bounce {
    x: i16,
    y: i16,
    dx: i16,
    dy: i16,
}

impl Bounce {
    /// Advance one frame, reflecting off the edges of a `w` x `h` screen
    fn step(&mut self, w: i16, h: i16) {
        let max_x = w - SPRITE_SIZE as i16;
        let max_y = h - SPRITE_SIZE as i16;
        self.x += self.dx;
        self.y += self.dy;
        if self.x <= 0 || self.x >= max_x {
            self.dx = -self.dx;
            self.x = self.x.clamp(0, max_x);
        }
        if self.y <= 0 || self.y >= max_y {
            self.dy = -self.dy;
            self.y = self.y.clamp(0, max_y);
        }
    }
}

/// RGB565 color wheel position
fn hue(step: u32) -> u16 {
    let phase = (step % 192) as u16;
    let ramp = (phase % 64) >> 1;
    match phase / 64 {
        0 => (31 - ramp) << 11 | (ramp * 2) << 5,
        1 => (31 - ramp) * 2 << 5 | ramp,
        _ => ramp << 11 | (31 - ramp),
    }
}

#[embassy_executor::task]
pub async fn animate_task(config: AnimateConfig) {
    info!(
        "Animate task started: {}x{}, {} us per frame",
        config.width, config.height, config.frame_us
    );

    let mut ticker = Ticker::every(Duration::from_micros(config.frame_us.max(1) as u64));
    let mut sprite = Bounce {
        x: 0,
        y: 0,
        dx: 4,
        dy: MAX_STEP - 1,
    };
    let mut step = 0u32;

    loop {
        ticker.next().await;
        sprite.step(config.width as i16, config.height as i16);
        step = step.wrapping_add(1);
        if SPRITE.signaled() {
            FRAMES_SKIPPED.fetch_add(1, Ordering::Relaxed);
        }
        SPRITE.signal(SpriteFrame {
            x: sprite.x as u16,
            y: sprite.y as u16,
            color: hue(step),
        });
    }
}
