//! Pixel buffers
//!
//! [`FrameBuffer`] wraps an owned native-orientation buffer handed in by the
//! application. [`FrameView`] is a read-only window onto the application's
//! own drawing buffer, in user orientation.

use super::geometry::{Region, Rotation, PANEL_PIXELS, PANEL_WIDTH};

/// Errors when handing buffers to the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferError {
    /// Buffer shorter than the pixels it must hold
    TooSmall { needed: usize, got: usize },
    /// Region does not fit on screen
    EmptyRegion,
}

/// Owned framebuffer in native panel layout (row-major, 320 wide)
pub struct FrameBuffer<'a> {
    pixels: &'a mut [u16],
}

impl<'a> FrameBuffer<'a> {
    /// Wrap a buffer of at least [`PANEL_PIXELS`] pixels
    pub fn new(pixels: &'a mut [u16]) -> Result<Self, BufferError> {
        if pixels.len() < PANEL_PIXELS {
            return Err(BufferError::TooSmall {
                needed: PANEL_PIXELS,
                got: pixels.len(),
            });
        }
        Ok(Self {
            pixels: &mut pixels[..PANEL_PIXELS],
        })
    }

    #[inline]
    pub fn pixels(&self) -> &[u16] {
        self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u16] {
        self.pixels
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u16 {
        self.pixels[y * PANEL_WIDTH + x]
    }

    /// Pixels of a horizontal run starting at native (col, row)
    #[inline]
    pub fn span(&self, col: usize, row: usize, len: usize) -> &[u16] {
        let start = row * PANEL_WIDTH + col;
        &self.pixels[start..start + len]
    }

    pub fn fill(&mut self, color: u16) {
        self.pixels.fill(color);
    }

    /// Copy a user-orientation view into this buffer
    pub fn copy_from_view(&mut self, view: &FrameView<'_>, rotation: Rotation) {
        let nb = rotation.native_box(view.region());
        for y in nb.y_min as usize..=nb.y_max as usize {
            let row = &mut self.pixels[y * PANEL_WIDTH..(y + 1) * PANEL_WIDTH];
            for x in nb.x_min as usize..=nb.x_max as usize {
                let (ux, uy) = rotation.native_to_user(x, y);
                row[x] = view.at(ux, uy);
            }
        }
    }
}

/// Read-only window onto an application buffer, in user coordinates
///
/// `pixels[0]` is the top-left pixel of `region` and consecutive rows are
/// `stride` pixels apart.
#[derive(Clone, Copy)]
pub struct FrameView<'f> {
    pixels: &'f [u16],
    region: Region,
    stride: usize,
}

impl<'f> FrameView<'f> {
    /// A full-screen buffer for `rotation`
    pub fn full(pixels: &'f [u16], rotation: Rotation) -> Result<Self, BufferError> {
        let region = Region::full(rotation);
        Self::window(pixels, region, region.width(), rotation)
    }

    /// A sub-buffer holding only `region`
    ///
    /// The region is clipped to the screen first; a sub-buffer for an
    /// off-screen region is rejected.
    pub fn window(
        pixels: &'f [u16],
        region: Region,
        stride: usize,
        rotation: Rotation,
    ) -> Result<Self, BufferError> {
        let clipped = region.clamp(rotation).ok_or(BufferError::EmptyRegion)?;
        let stride = stride.max(clipped.width());
        let needed = (clipped.height() - 1) * stride + clipped.width();
        if pixels.len() < needed {
            return Err(BufferError::TooSmall {
                needed,
                got: pixels.len(),
            });
        }
        Ok(Self {
            pixels,
            region: clipped,
            stride,
        })
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Pixel at user coordinates (must lie inside the region)
    #[inline]
    pub fn at(&self, ux: usize, uy: usize) -> u16 {
        let dx = ux - self.region.x_min as usize;
        let dy = uy - self.region.y_min as usize;
        self.pixels[dy * self.stride + dx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::geometry::PANEL_HEIGHT;

    #[test]
    fn test_framebuffer_too_small() {
        let mut small = [0u16; 16];
        assert_eq!(
            FrameBuffer::new(&mut small).err(),
            Some(BufferError::TooSmall {
                needed: PANEL_PIXELS,
                got: 16
            })
        );
    }

    #[test]
    fn test_copy_rotated_view() {
        let mut storage = vec![0u16; PANEL_PIXELS];
        let mut fb = FrameBuffer::new(&mut storage).unwrap();

        let src: Vec<u16> = (0..PANEL_PIXELS as u32).map(|i| i as u16).collect();
        let view = FrameView::full(&src, Rotation::Landscape).unwrap();
        fb.copy_from_view(&view, Rotation::Landscape);

        // user (0,0) lands on native (319,0)
        assert_eq!(fb.get(PANEL_WIDTH - 1, 0), src[0]);
        // user (479,319) lands on native (0,479)
        assert_eq!(fb.get(0, PANEL_HEIGHT - 1), src[PANEL_PIXELS - 1]);
    }

    #[test]
    fn test_region_view_stride() {
        let src = [1u16, 2, 3, 0, 4, 5, 6, 0];
        let view = FrameView::window(&src, Region::new(10, 12, 20, 21), 4, Rotation::Portrait)
            .unwrap();
        assert_eq!(view.at(10, 20), 1);
        assert_eq!(view.at(12, 20), 3);
        assert_eq!(view.at(11, 21), 5);
    }

    #[test]
    fn test_region_view_rejects_short_buffer() {
        let src = [0u16; 5];
        assert!(matches!(
            FrameView::window(&src, Region::new(0, 2, 0, 1), 3, Rotation::Portrait),
            Err(BufferError::TooSmall { needed: 6, got: 5 })
        ));
        assert_eq!(
            FrameView::window(&src, Region::new(3, 2, 0, 1), 3, Rotation::Portrait).err(),
            Some(BufferError::EmptyRegion)
        );
    }
}
