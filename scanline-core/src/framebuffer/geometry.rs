//! Panel geometry, orientation and regions
//!
//! Owned framebuffers are always stored in native panel orientation so that
//! diff rows line up with the panel's scanlines. Rotation only changes how
//! the application's buffers are read.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Native panel width in pixels
pub const PANEL_WIDTH: usize = 320;

/// Native panel height in pixels
pub const PANEL_HEIGHT: usize = 480;

/// Pixels in a full native frame
pub const PANEL_PIXELS: usize = PANEL_WIDTH * PANEL_HEIGHT;

/// Lines scanned by the panel refresh sequencer per frame
pub const SCANLINES: u32 = PANEL_HEIGHT as u32;

/// Screen orientation as seen by the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Rotation {
    /// 320x480, native order
    #[default]
    Portrait,
    /// 480x320, rotated a quarter turn
    Landscape,
    /// 320x480, upside down
    PortraitFlipped,
    /// 480x320, rotated three quarter turns
    LandscapeFlipped,
}

impl Rotation {
    /// Build from a mode index. Out-of-range values clamp to 3.
    pub const fn from_index(index: u8) -> Self {
        match index {
            0 => Rotation::Portrait,
            1 => Rotation::Landscape,
            2 => Rotation::PortraitFlipped,
            _ => Rotation::LandscapeFlipped,
        }
    }

    /// Mode index (0-3)
    pub const fn index(self) -> u8 {
        match self {
            Rotation::Portrait => 0,
            Rotation::Landscape => 1,
            Rotation::PortraitFlipped => 2,
            Rotation::LandscapeFlipped => 3,
        }
    }

    /// Width and height of the application's view
    pub const fn user_size(self) -> (usize, usize) {
        match self {
            Rotation::Portrait | Rotation::PortraitFlipped => (PANEL_WIDTH, PANEL_HEIGHT),
            Rotation::Landscape | Rotation::LandscapeFlipped => (PANEL_HEIGHT, PANEL_WIDTH),
        }
    }

    /// Map a native pixel to application coordinates
    #[inline]
    pub const fn native_to_user(self, x: usize, y: usize) -> (usize, usize) {
        match self {
            Rotation::Portrait => (x, y),
            Rotation::Landscape => (y, PANEL_WIDTH - 1 - x),
            Rotation::PortraitFlipped => (PANEL_WIDTH - 1 - x, PANEL_HEIGHT - 1 - y),
            Rotation::LandscapeFlipped => (PANEL_HEIGHT - 1 - y, x),
        }
    }

    /// Map an application pixel to native coordinates
    #[inline]
    pub const fn user_to_native(self, ux: usize, uy: usize) -> (usize, usize) {
        match self {
            Rotation::Portrait => (ux, uy),
            Rotation::Landscape => (PANEL_WIDTH - 1 - uy, ux),
            Rotation::PortraitFlipped => (PANEL_WIDTH - 1 - ux, PANEL_HEIGHT - 1 - uy),
            Rotation::LandscapeFlipped => (uy, PANEL_HEIGHT - 1 - ux),
        }
    }

    /// Native bounding box of a user region
    pub fn native_box(self, region: Region) -> Region {
        let (ax, ay) = self.user_to_native(region.x_min as usize, region.y_min as usize);
        let (bx, by) = self.user_to_native(region.x_max as usize, region.y_max as usize);
        Region {
            x_min: ax.min(bx) as u16,
            x_max: ax.max(bx) as u16,
            y_min: ay.min(by) as u16,
            y_max: ay.max(by) as u16,
        }
    }
}

/// Inclusive rectangle in application coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Region {
    pub x_min: u16,
    pub x_max: u16,
    pub y_min: u16,
    pub y_max: u16,
}

impl Region {
    pub const fn new(x_min: u16, x_max: u16, y_min: u16, y_max: u16) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    /// The whole screen for a given orientation
    pub const fn full(rotation: Rotation) -> Self {
        let (w, h) = rotation.user_size();
        Self::new(0, (w - 1) as u16, 0, (h - 1) as u16)
    }

    /// Clip to the screen for `rotation`
    ///
    /// Returns `None` when nothing is left (inverted bounds or fully
    /// off-screen).
    pub fn clamp(self, rotation: Rotation) -> Option<Self> {
        let (w, h) = rotation.user_size();
        if self.x_min > self.x_max || self.y_min > self.y_max {
            return None;
        }
        if self.x_min as usize >= w || self.y_min as usize >= h {
            return None;
        }
        Some(Self {
            x_min: self.x_min,
            x_max: self.x_max.min((w - 1) as u16),
            y_min: self.y_min,
            y_max: self.y_max.min((h - 1) as u16),
        })
    }

    pub const fn width(&self) -> usize {
        (self.x_max - self.x_min) as usize + 1
    }

    pub const fn height(&self) -> usize {
        (self.y_max - self.y_min) as usize + 1
    }

    pub const fn contains(&self, x: u16, y: u16) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }
}
