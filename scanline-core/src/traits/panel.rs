//! Panel control: setup, calibration and diagnostics

use crate::framebuffer::Rotation;

/// Errors reported by the panel outside the pixel path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PanelError {
    /// Bus transfer failed
    Bus,
    /// Control pin could not be driven
    Pin,
    /// Status registers did not match after every retry
    Init {
        power_mode: u8,
        pixel_format: u8,
        image_format: u8,
        self_diag: u8,
    },
    /// Panel stopped answering scanline queries
    Timeout,
}

/// Synchronous panel operations, never used while pixels are in flight
pub trait PanelControl {
    /// Reset and configure the panel, verifying its status registers
    fn init(&mut self) -> Result<(), PanelError>;

    /// Enter or leave sleep mode
    fn sleep(&mut self, enable: bool) -> Result<(), PanelError>;

    /// Re-assert the native memory access order
    ///
    /// Rotation is done in software, so the panel itself always scans in
    /// native order whatever `rotation` the application uses.
    fn set_rotation(&mut self, rotation: Rotation) -> Result<(), PanelError>;

    /// Write a register
    fn write_register(&mut self, command: u8, data: &[u8]) -> Result<(), PanelError>;

    /// Read byte `index` of a register
    fn read_register(&mut self, command: u8, index: u8) -> Result<u8, PanelError>;

    /// Current scanline, in `0..SCANLINES`
    fn read_scanline(&mut self) -> Result<u16, PanelError>;
}
