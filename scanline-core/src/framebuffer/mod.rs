//! Pixel buffers, geometry and framebuffer ownership

pub mod buffer;
pub mod geometry;
pub mod set;

pub use buffer::{BufferError, FrameBuffer, FrameView};
pub use geometry::{Region, Rotation, PANEL_HEIGHT, PANEL_PIXELS, PANEL_WIDTH, SCANLINES};
pub use set::{BufferId, FrameBufferSet, MirrorState, Staged};
