//! 4-wire SPI link: data/command pin plus a chip select held low for a
//! whole transaction

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use scanline_core::traits::PanelError;

/// Pixels widened per SPI write
const CHUNK_PIXELS: usize = 32;

/// Bus clock control, which `SpiBus` itself does not expose
pub trait SpiClock {
    fn set_clock_hz(&mut self, hz: u32);
}

/// Widen an RGB565 pixel to the panel's 3-byte 18-bit format
pub fn widen(pixel: u16) -> [u8; 3] {
    let r = ((pixel >> 11) & 0x1F) as u32;
    let g = ((pixel >> 5) & 0x3F) as u32;
    let b = (pixel & 0x1F) as u32;
    [(r * 255 / 31) as u8, (g * 255 / 63) as u8, (b * 255 / 31) as u8]
}

/// Widen `pixels` into `out`, returning the bytes written
///
/// Stops at whichever runs out first.
pub fn widen_into(pixels: &[u16], out: &mut [u8]) -> usize {
    let mut written = 0;
    for (dst, &p) in out.chunks_exact_mut(3).zip(pixels) {
        dst.copy_from_slice(&widen(p));
        written += 3;
    }
    written
}

/// Raw SPI link to the panel, shared by the control and pixel halves
pub struct Interface<SPI, DC, CS> {
    spi: SPI,
    dc: DC,
    cs: CS,
    clock_hz: u32,
}

impl<SPI, DC, CS> Interface<SPI, DC, CS>
where
    SPI: SpiBus<u8> + SpiClock,
    DC: OutputPin,
    CS: OutputPin,
{
    pub fn new(spi: SPI, dc: DC, cs: CS) -> Self {
        Self {
            spi,
            dc,
            cs,
            clock_hz: 0,
        }
    }

    /// Select the panel at `clock_hz`
    pub fn begin(&mut self, clock_hz: u32) -> Result<(), PanelError> {
        if clock_hz != self.clock_hz {
            self.spi.set_clock_hz(clock_hz);
            self.clock_hz = clock_hz;
        }
        self.dc.set_high().map_err(|_| PanelError::Pin)?;
        self.cs.set_low().map_err(|_| PanelError::Pin)
    }

    /// Wait for the last byte and deselect the panel
    pub fn end(&mut self) -> Result<(), PanelError> {
        self.spi.flush().map_err(|_| PanelError::Bus)?;
        self.cs.set_high().map_err(|_| PanelError::Pin)
    }

    /// Send a command byte; DC rests high afterwards
    pub fn command(&mut self, command: u8) -> Result<(), PanelError> {
        self.spi.flush().map_err(|_| PanelError::Bus)?;
        self.dc.set_low().map_err(|_| PanelError::Pin)?;
        self.spi.write(&[command]).map_err(|_| PanelError::Bus)?;
        self.spi.flush().map_err(|_| PanelError::Bus)?;
        self.dc.set_high().map_err(|_| PanelError::Pin)
    }

    pub fn data(&mut self, bytes: &[u8]) -> Result<(), PanelError> {
        self.spi.write(bytes).map_err(|_| PanelError::Bus)
    }

    pub fn data16(&mut self, word: u16) -> Result<(), PanelError> {
        self.data(&word.to_be_bytes())
    }

    pub fn pixels(&mut self, pixels: &[u16]) -> Result<(), PanelError> {
        let mut buf = [0u8; CHUNK_PIXELS * 3];
        for chunk in pixels.chunks(CHUNK_PIXELS) {
            let len = widen_into(chunk, &mut buf);
            self.data(&buf[..len])?;
        }
        Ok(())
    }

    /// The SPI bus itself, for writes that bypass this link
    pub fn spi_mut(&mut self) -> &mut SPI {
        &mut self.spi
    }

    /// Clock in `buf.len()` bytes with DC high
    pub fn read(&mut self, buf: &mut [u8]) -> Result<(), PanelError> {
        self.spi.read(buf).map_err(|_| PanelError::Bus)?;
        self.spi.flush().map_err(|_| PanelError::Bus)
    }
}
