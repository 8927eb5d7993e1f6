//! Scanline - tear-free panel demo firmware
//!
//! Drives an ILI9488 SPI panel from an RP2040 and bounces a sprite across
//! it. Every update is paced against the panel's refresh beam so the
//! sprite never tears.

#![no_std]
#![no_main]

use core::cell::RefCell;

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::spi::{Config as SpiConfig, Spi};
use embassy_time::Delay;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use scanline_core::config::{parse_display_config, DisplayConfig};
use scanline_core::Display;
use scanline_drivers::ili9488::{Ili9488, Ili9488Config, Interface, PixelBus};

use crate::channels::CALIBRATION_SAVE;
use crate::runtime::EmbassyRuntime;
use crate::spi::{DmaPixels, PanelSpi};
use crate::storage::CalibrationStore;

/// Embedded default configuration (compiled into firmware)
/// Edit display.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../display.toml");

mod channels;
mod runtime;
mod spi;
mod storage;
mod tasks;

type PanelIface = Interface<PanelSpi, Output<'static>, Output<'static>>;
type PanelBus = PixelBus<'static, PanelSpi, Output<'static>, Output<'static>, DmaPixels>;
type PanelCtl = Ili9488<'static, PanelSpi, Output<'static>, Output<'static>, Output<'static>, Delay>;

/// The display as owned by the render task
pub type PanelDisplay = Display<'static, PanelBus, PanelCtl, EmbassyRuntime>;

// Shared by the pixel bus and the panel control half
static INTERFACE: StaticCell<RefCell<PanelIface>> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Scanline firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let config = load_config();

    // Stored calibration skips the refresh measurement
    let mut store = CalibrationStore::new(p.FLASH, p.DMA_CH0);
    let stored = match store.load().await {
        Ok(record) => {
            info!("Loaded calibration: mode-0 period {} us", record.mode0_period_us);
            Some(record)
        }
        Err(e) => {
            info!("No valid calibration in flash ({}), measuring", e);
            None
        }
    };

    // Pin assignments: SPI0 on GPIO16-19, DC GPIO20, RESET GPIO21
    // DMA: CH0 flash, CH1/CH2 panel SPI
    let mut spi_config = SpiConfig::default();
    spi_config.frequency = config.spi_clock_hz;
    let spi = Spi::new(
        p.SPI0,
        p.PIN_18,
        p.PIN_19,
        p.PIN_16,
        p.DMA_CH1,
        p.DMA_CH2,
        spi_config,
    );
    let cs = Output::new(p.PIN_17, Level::High);
    let dc = Output::new(p.PIN_20, Level::High);
    let rst = Output::new(p.PIN_21, Level::High);

    let iface: &'static RefCell<PanelIface> =
        INTERFACE.init(RefCell::new(Interface::new(PanelSpi::new(spi), dc, cs)));
    info!("SPI initialized at {} Hz", config.spi_clock_hz);

    let slot = match runtime::register() {
        Ok(slot) => slot,
        Err(e) => {
            error!("Display registration failed: {}", e);
            return;
        }
    };

    let bus = PixelBus::new(iface, DmaPixels::new(slot));
    let panel = Ili9488::new(
        iface,
        Some(rst),
        Delay,
        Ili9488Config {
            write_clock_hz: config.spi_clock_hz,
            read_clock_hz: config.spi_read_clock_hz,
        },
    );
    let mut display: PanelDisplay = Display::new(bus, panel, EmbassyRuntime::new(slot), slot, config);

    match display.init(stored) {
        Ok(record) => {
            if stored != Some(record) {
                CALIBRATION_SAVE.signal(record);
            }
        }
        Err(e) => {
            error!("Panel init failed: {}", e);
            runtime::release(slot);
            return;
        }
    }

    let (width, height) = config.rotation.user_size();
    let periods = config.vsync_spacing.periods().unwrap_or(1);
    let animate = tasks::AnimateConfig {
        width: width as u16,
        height: height as u16,
        frame_us: display.vsync().period_us() * periods,
    };

    // Spawn tasks
    spawner.spawn(spi::pixel_dma_task(iface, slot)).unwrap();
    spawner.spawn(tasks::calibration_task(store)).unwrap();
    spawner.spawn(tasks::render_task(display)).unwrap();
    spawner.spawn(tasks::animate_task(animate)).unwrap();

    info!("All tasks spawned, firmware running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}

/// Parse the embedded display.toml, falling back to defaults
fn load_config() -> DisplayConfig {
    match parse_display_config(EMBEDDED_CONFIG) {
        Ok(config) => {
            info!("Parsed embedded configuration successfully");
            config
        }
        Err(e) => {
            error!("Failed to parse embedded config: {}", e);
            warn!("Using default display configuration");
            DisplayConfig::default()
        }
    }
}
