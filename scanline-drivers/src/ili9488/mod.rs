//! ILI9488 480x320 TFT over 4-wire SPI
//!
//! The panel is driven through two halves sharing one [`Interface`]:
//!
//! - [`Ili9488`]: setup, register access and scanline queries
//!   ([`PanelControl`])
//! - [`PixelBus`]: address windows and pixel data ([`PanelBus`])
//!
//! The engine never uses the control half while pixels are in flight, so
//! the shared `RefCell` is only ever borrowed by one half at a time.
//!
//! # Pixel format
//!
//! Over SPI the controller only accepts the 18-bit format, so every RGB565
//! pixel is widened to three bytes on the way out.

mod bus;
mod interface;
#[cfg(test)]
mod mock;

use core::cell::RefCell;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use scanline_core::framebuffer::{Rotation, SCANLINES};
use scanline_core::traits::{cmd, PanelControl, PanelError};

pub use bus::{Blocking, PixelBus, PixelSink};
pub use interface::{widen, widen_into, Interface, SpiClock};

/// ILI9488 command codes beyond the pixel path
pub mod reg {
    pub const SWRESET: u8 = 0x01;
    /// Read display power mode
    pub const RDMODE: u8 = 0x0A;
    /// Read pixel format
    pub const RDPIXFMT: u8 = 0x0C;
    /// Read image format
    pub const RDIMGFMT: u8 = 0x0D;
    /// Read self-diagnostic result
    pub const RDSELFDIAG: u8 = 0x0F;
    /// Register index select for reads
    pub const INDEX_SELECT: u8 = 0xD9;
}

/// Power mode after a successful start-up
pub const POWER_MODE_OK: u8 = 0x9C;
/// Pixel format readback for the 18-bit interface
pub const PIXEL_FORMAT_OK: u8 = 0x05;
pub const IMAGE_FORMAT_OK: u8 = 0x00;
pub const SELF_DIAG_OK: u8 = 0xC0;

/// Memory access control: native orientation, BGR order
pub const MADCTL_NATIVE: u8 = 0x48;

/// Start-up attempts before giving up
pub const INIT_ATTEMPTS: u8 = 4;

/// Command and data of the initialization table
const INIT_TABLE: &[(u8, &[u8])] = &[
    // positive gamma
    (
        0xE0,
        &[0x00, 0x03, 0x09, 0x08, 0x16, 0x0A, 0x3F, 0x78, 0x4C, 0x09, 0x0A, 0x08, 0x16, 0x1A, 0x0F],
    ),
    // negative gamma
    (
        0xE1,
        &[0x00, 0x16, 0x19, 0x03, 0x0F, 0x05, 0x32, 0x45, 0x46, 0x04, 0x0E, 0x0D, 0x35, 0x37, 0x0F],
    ),
    (0xC0, &[0x17, 0x15]),
    (0xC1, &[0x41]),
    (0xC5, &[0x00, 0x12, 0x80]),
    (cmd::MADCTL, &[MADCTL_NATIVE]),
    // 18 bits per pixel
    (0x3A, &[0x66]),
    (0xB0, &[0x80]),
    (0xB1, &[0xA0]),
    (0xB4, &[0x02]),
    (0xB6, &[0x02, 0x02]),
    (0xE9, &[0x00]),
    (0xF7, &[0xA9, 0x51, 0x2C, 0x82]),
];

/// Bus clocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ili9488Config {
    /// Write clock (Hz); setup runs at a quarter of it
    pub write_clock_hz: u32,
    /// Read clock (Hz)
    pub read_clock_hz: u32,
}

impl Default for Ili9488Config {
    fn default() -> Self {
        Self {
            write_clock_hz: 30_000_000,
            read_clock_hz: 4_000_000,
        }
    }
}

/// Status registers read back after start-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PanelStatus {
    pub power_mode: u8,
    pub pixel_format: u8,
    pub image_format: u8,
    pub self_diag: u8,
}

impl PanelStatus {
    pub fn is_ok(&self) -> bool {
        self.power_mode == POWER_MODE_OK
            && self.pixel_format == PIXEL_FORMAT_OK
            && self.image_format == IMAGE_FORMAT_OK
            && self.self_diag == SELF_DIAG_OK
    }

    /// All zero: MISO is not connected or the read clock is too fast
    pub fn is_silent(&self) -> bool {
        self.power_mode == 0 && self.pixel_format == 0 && self.image_format == 0 && self.self_diag == 0
    }

    fn into_error(self) -> PanelError {
        PanelError::Init {
            power_mode: self.power_mode,
            pixel_format: self.pixel_format,
            image_format: self.image_format,
            self_diag: self.self_diag,
        }
    }
}

/// Map the raw scanline register onto `0..SCANLINES`
///
/// The register counts in steps of three lines, offset by four.
pub fn scanline_from_raw(raw: u8) -> u16 {
    (3 * raw as u32).saturating_sub(4).min(SCANLINES - 1) as u16
}

/// Control half of the panel
pub struct Ili9488<'d, SPI, DC, CS, RST, D> {
    iface: &'d RefCell<Interface<SPI, DC, CS>>,
    rst: Option<RST>,
    delay: D,
    config: Ili9488Config,
    read_clock_hz: u32,
}

impl<'d, SPI, DC, CS, RST, D> Ili9488<'d, SPI, DC, CS, RST, D>
where
    SPI: SpiBus<u8> + SpiClock,
    DC: OutputPin,
    CS: OutputPin,
    RST: OutputPin,
    D: DelayNs,
{
    /// Without a reset pin the panel is reset by command
    pub fn new(
        iface: &'d RefCell<Interface<SPI, DC, CS>>,
        rst: Option<RST>,
        delay: D,
        config: Ili9488Config,
    ) -> Self {
        Self {
            iface,
            rst,
            delay,
            config,
            read_clock_hz: config.read_clock_hz,
        }
    }

    /// Read clock in use, lowered by failed start-ups
    pub fn read_clock_hz(&self) -> u32 {
        self.read_clock_hz
    }

    fn setup_clock(&self) -> u32 {
        self.config.write_clock_hz / 4
    }

    /// Run `f` inside one chip-select transaction at `clock_hz`
    fn transaction<T>(
        &mut self,
        clock_hz: u32,
        f: impl FnOnce(&mut Interface<SPI, DC, CS>) -> Result<T, PanelError>,
    ) -> Result<T, PanelError> {
        let mut iface = self.iface.try_borrow_mut().map_err(|_| PanelError::Bus)?;
        iface.begin(clock_hz)?;
        let result = f(&mut iface);
        let end = iface.end();
        let value = result?;
        end.map(|_| value)
    }

    fn reset(&mut self) -> Result<(), PanelError> {
        match self.rst.as_mut() {
            Some(rst) => {
                rst.set_high().map_err(|_| PanelError::Pin)?;
                self.delay.delay_ms(10);
                rst.set_low().map_err(|_| PanelError::Pin)?;
                self.delay.delay_ms(20);
                rst.set_high().map_err(|_| PanelError::Pin)?;
            }
            None => {
                self.transaction(self.setup_clock(), |iface| {
                    for _ in 0..5 {
                        iface.command(cmd::NOP)?;
                    }
                    iface.command(reg::SWRESET)
                })?;
            }
        }
        self.delay.delay_ms(150);
        Ok(())
    }

    fn configure(&mut self) -> Result<(), PanelError> {
        self.transaction(self.setup_clock(), |iface| {
            for &(command, data) in INIT_TABLE {
                iface.command(command)?;
                iface.data(data)?;
            }
            iface.command(cmd::SLPOUT)
        })?;
        self.delay.delay_ms(150);
        self.transaction(self.setup_clock(), |iface| iface.command(cmd::DISPON))
    }

    /// Read the four start-up status registers
    pub fn status(&mut self) -> Result<PanelStatus, PanelError> {
        Ok(PanelStatus {
            power_mode: self.read_register(reg::RDMODE, 0)?,
            pixel_format: self.read_register(reg::RDPIXFMT, 0)?,
            image_format: self.read_register(reg::RDIMGFMT, 0)?,
            self_diag: self.read_register(reg::RDSELFDIAG, 0)?,
        })
    }
}

impl<'d, SPI, DC, CS, RST, D> PanelControl for Ili9488<'d, SPI, DC, CS, RST, D>
where
    SPI: SpiBus<u8> + SpiClock,
    DC: OutputPin,
    CS: OutputPin,
    RST: OutputPin,
    D: DelayNs,
{
    fn init(&mut self) -> Result<(), PanelError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.reset()?;
            self.configure()?;
            let status = self.status()?;
            if status.is_ok() {
                #[cfg(feature = "defmt")]
                defmt::info!("ILI9488 ready after {} attempt(s)", attempt);
                return Ok(());
            }

            #[cfg(feature = "defmt")]
            {
                if status.is_silent() {
                    defmt::warn!("ILI9488 status unreadable; check MISO");
                } else {
                    defmt::warn!("ILI9488 bad status: {}", status);
                }
            }
            if attempt >= INIT_ATTEMPTS {
                return Err(status.into_error());
            }
            self.read_clock_hz = (self.read_clock_hz / 2).max(1);
        }
    }

    fn sleep(&mut self, enable: bool) -> Result<(), PanelError> {
        if enable {
            self.transaction(self.setup_clock(), |iface| {
                iface.command(cmd::DISPOFF)?;
                iface.command(cmd::SLPIN)
            })?;
            self.delay.delay_ms(200);
        } else {
            self.transaction(self.setup_clock(), |iface| {
                iface.command(cmd::DISPON)?;
                iface.command(cmd::SLPOUT)
            })?;
            self.delay.delay_ms(20);
        }
        Ok(())
    }

    fn set_rotation(&mut self, _rotation: Rotation) -> Result<(), PanelError> {
        self.write_register(cmd::MADCTL, &[MADCTL_NATIVE])
    }

    fn write_register(&mut self, command: u8, data: &[u8]) -> Result<(), PanelError> {
        self.transaction(self.setup_clock(), |iface| {
            iface.command(command)?;
            iface.data(data)
        })
    }

    fn read_register(&mut self, command: u8, index: u8) -> Result<u8, PanelError> {
        let clock = self.read_clock_hz;
        self.transaction(clock, |iface| {
            iface.command(reg::INDEX_SELECT)?;
            iface.data(&[0x10 + index])?;
            iface.command(command)?;
            let mut byte = [0u8];
            iface.read(&mut byte)?;
            Ok(byte[0])
        })
    }

    fn read_scanline(&mut self) -> Result<u16, PanelError> {
        let clock = self.read_clock_hz;
        let mut iface = self.iface.try_borrow_mut().map_err(|_| PanelError::Bus)?;
        iface.begin(clock)?;
        let mut raw = [0u8; 2];
        let result = iface.command(cmd::GSCAN).and_then(|_| {
            self.delay.delay_us(5);
            iface.read(&mut raw)
        });
        let end = iface.end();
        result?;
        end?;
        Ok(scanline_from_raw(raw[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{Mock, Op};
    use super::*;

    fn healthy(mock: &Mock) {
        mock.set_register(reg::RDMODE, POWER_MODE_OK);
        mock.set_register(reg::RDPIXFMT, PIXEL_FORMAT_OK);
        mock.set_register(reg::RDIMGFMT, IMAGE_FORMAT_OK);
        mock.set_register(reg::RDSELFDIAG, SELF_DIAG_OK);
    }

    #[test]
    fn test_scanline_mapping() {
        assert_eq!(scanline_from_raw(0), 0);
        assert_eq!(scanline_from_raw(2), 2);
        assert_eq!(scanline_from_raw(100), 296);
        assert_eq!(scanline_from_raw(160), 476);
        assert_eq!(scanline_from_raw(200), SCANLINES as u16 - 1);
    }

    #[test]
    fn test_init_sequence() {
        let mock = Mock::new();
        healthy(&mock);
        let iface = RefCell::new(mock.interface());
        let mut panel = Ili9488::new(&iface, Some(mock.reset_pin()), mock.delay(), Ili9488Config::default());

        assert_eq!(panel.init(), Ok(()));

        let commands = mock.commands();
        let table: Vec<u8> = INIT_TABLE.iter().map(|&(c, _)| c).collect();
        let start = commands.iter().position(|&c| c == 0xE0).unwrap();
        assert_eq!(&commands[start..start + table.len()], &table[..]);
        assert_eq!(commands[start + table.len()], cmd::SLPOUT);
        assert_eq!(commands[start + table.len() + 1], cmd::DISPON);
        assert_eq!(mock.data_after(0x3A), vec![0x66]);
        assert_eq!(mock.data_after(0xF7), vec![0xA9, 0x51, 0x2C, 0x82]);

        // setup at a quarter of the write clock
        assert_eq!(mock.clocks()[0], 30_000_000 / 4);
        assert!(mock.ops().contains(&Op::Reset(false)));
    }

    #[test]
    fn test_init_retries_with_slower_reads() {
        let mock = Mock::new();
        mock.set_register(reg::RDMODE, POWER_MODE_OK);
        mock.set_register(reg::RDSELFDIAG, 0x40);
        let iface = RefCell::new(mock.interface());
        let mut panel = Ili9488::new(&iface, Some(mock.reset_pin()), mock.delay(), Ili9488Config::default());

        assert_eq!(
            panel.init(),
            Err(PanelError::Init {
                power_mode: POWER_MODE_OK,
                pixel_format: 0,
                image_format: 0,
                self_diag: 0x40,
            })
        );
        assert_eq!(panel.read_clock_hz(), 4_000_000 / 8);
        let clocks = mock.clocks();
        for hz in [4_000_000, 2_000_000, 1_000_000, 500_000] {
            assert!(clocks.contains(&hz), "read clock {} never used", hz);
        }
        assert!(!clocks.contains(&250_000));
    }

    #[test]
    fn test_soft_reset_without_pin() {
        let mock = Mock::new();
        healthy(&mock);
        let iface = RefCell::new(mock.interface());
        let mut panel: Ili9488<'_, _, _, _, super::mock::MockPin, _> =
            Ili9488::new(&iface, None, mock.delay(), Ili9488Config::default());

        panel.init().unwrap();
        let commands = mock.commands();
        assert_eq!(&commands[..6], &[cmd::NOP, cmd::NOP, cmd::NOP, cmd::NOP, cmd::NOP, reg::SWRESET]);
    }

    #[test]
    fn test_register_read_selects_index() {
        let mock = Mock::new();
        mock.set_register(0xD3, 0x94);
        let iface = RefCell::new(mock.interface());
        let mut panel = Ili9488::new(&iface, Some(mock.reset_pin()), mock.delay(), Ili9488Config::default());

        assert_eq!(panel.read_register(0xD3, 2), Ok(0x94));
        assert_eq!(mock.commands(), vec![reg::INDEX_SELECT, 0xD3]);
        assert_eq!(mock.data_after(reg::INDEX_SELECT), vec![0x12]);
        assert_eq!(mock.clocks(), vec![4_000_000]);
    }

    #[test]
    fn test_read_scanline() {
        let mock = Mock::new();
        mock.set_scanline_raw(100);
        let iface = RefCell::new(mock.interface());
        let mut panel = Ili9488::new(&iface, Some(mock.reset_pin()), mock.delay(), Ili9488Config::default());

        assert_eq!(panel.read_scanline(), Ok(296));
        assert_eq!(mock.commands(), vec![cmd::GSCAN]);
        let ops = mock.ops();
        assert_eq!(&ops[..2], &[Op::Clock(4_000_000), Op::Cs(false)]);
        assert_eq!(ops.last(), Some(&Op::Cs(true)));
    }

    #[test]
    fn test_sleep_commands() {
        let mock = Mock::new();
        let iface = RefCell::new(mock.interface());
        let mut panel = Ili9488::new(&iface, Some(mock.reset_pin()), mock.delay(), Ili9488Config::default());

        panel.sleep(true).unwrap();
        panel.sleep(false).unwrap();
        assert_eq!(
            mock.commands(),
            vec![cmd::DISPOFF, cmd::SLPIN, cmd::DISPON, cmd::SLPOUT]
        );
        assert_eq!(mock.delayed_ms(), 220);
    }

    #[test]
    fn test_refresh_register_write() {
        let mock = Mock::new();
        let iface = RefCell::new(mock.interface());
        let mut panel = Ili9488::new(&iface, Some(mock.reset_pin()), mock.delay(), Ili9488Config::default());

        panel.write_register(0xB1, &[0x01, 0x13]).unwrap();
        panel.set_rotation(Rotation::Landscape).unwrap();
        assert_eq!(mock.data_after(0xB1), vec![0x01, 0x13]);
        assert_eq!(mock.data_after(cmd::MADCTL), vec![MADCTL_NATIVE]);
    }
}
