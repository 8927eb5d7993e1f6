//! Pixel half of the panel

use core::cell::RefCell;

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use scanline_core::traits::{CompletionSink, PanelBus, PanelError};

use super::interface::{Interface, SpiClock};

/// Where the pixel payload of a span goes
///
/// Called with the address window already set and the panel selected.
/// Completion must be reported once the last byte is on the wire, either
/// before returning or later from another context.
pub trait PixelSink<SPI, DC, CS> {
    fn start(&mut self, iface: &mut Interface<SPI, DC, CS>, pixels: &[u16]) -> Result<(), PanelError>;
}

/// Writes the payload with blocking SPI and completes right away
///
/// Completion is reported even when the write fails.
pub struct Blocking<C>(pub C);

impl<SPI, DC, CS, C> PixelSink<SPI, DC, CS> for Blocking<C>
where
    SPI: SpiBus<u8> + SpiClock,
    DC: OutputPin,
    CS: OutputPin,
    C: CompletionSink,
{
    fn start(&mut self, iface: &mut Interface<SPI, DC, CS>, pixels: &[u16]) -> Result<(), PanelError> {
        let result = iface.pixels(pixels);
        self.0.transfer_complete();
        result
    }
}

/// Writes address windows and hands pixel payloads to a [`PixelSink`]
pub struct PixelBus<'d, SPI, DC, CS, S> {
    iface: &'d RefCell<Interface<SPI, DC, CS>>,
    sink: S,
    errors: u32,
}

impl<'d, SPI, DC, CS, S> PixelBus<'d, SPI, DC, CS, S>
where
    SPI: SpiBus<u8> + SpiClock,
    DC: OutputPin,
    CS: OutputPin,
    S: PixelSink<SPI, DC, CS>,
{
    pub fn new(iface: &'d RefCell<Interface<SPI, DC, CS>>, sink: S) -> Self {
        Self {
            iface,
            sink,
            errors: 0,
        }
    }

    /// Bus errors swallowed on the pixel path since creation
    pub fn errors(&self) -> u32 {
        self.errors
    }

    fn with(&mut self, f: impl FnOnce(&mut Interface<SPI, DC, CS>, &mut S) -> Result<(), PanelError>) {
        let result = match self.iface.try_borrow_mut() {
            Ok(mut iface) => f(&mut iface, &mut self.sink),
            Err(_) => Err(PanelError::Bus),
        };
        if let Err(_e) = result {
            self.errors = self.errors.wrapping_add(1);
            #[cfg(feature = "defmt")]
            defmt::warn!("pixel bus error: {}", _e);
        }
    }
}

impl<'d, SPI, DC, CS, S> PanelBus for PixelBus<'d, SPI, DC, CS, S>
where
    SPI: SpiBus<u8> + SpiClock,
    DC: OutputPin,
    CS: OutputPin,
    S: PixelSink<SPI, DC, CS>,
{
    fn begin_transaction(&mut self, clock_hz: u32) {
        self.with(|iface, _| iface.begin(clock_hz));
    }

    fn end_transaction(&mut self) {
        self.with(|iface, _| iface.end());
    }

    fn write_command(&mut self, command: u8) {
        self.with(|iface, _| iface.command(command));
    }

    fn write_data16(&mut self, word: u16) {
        self.with(|iface, _| iface.data16(word));
    }

    fn write_pixels(&mut self, pixels: &[u16]) {
        self.with(|iface, _| iface.pixels(pixels));
    }

    fn start_pixels(&mut self, pixels: &[u16]) {
        self.with(|iface, sink| sink.start(iface, pixels));
    }
}
