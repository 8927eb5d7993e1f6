//! Panel SPI and the DMA path for pixel payloads
//!
//! Commands, address windows and register reads use the blocking side of
//! the SPI. Span payloads are widened into a staging buffer and handed to
//! [`pixel_dma_task`], which streams them out over DMA and posts
//! `TransferComplete` for the display once the last byte has left.

use core::cell::RefCell;

use embassy_rp::gpio::Output;
use embassy_rp::peripherals::SPI0;
use embassy_rp::spi::{Async, Spi};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use embedded_hal::spi::{ErrorType, SpiBus};
use static_cell::StaticCell;

use scanline_core::framebuffer::PANEL_WIDTH;
use scanline_core::registry::Slot;
use scanline_core::state::SchedulerEvent;
use scanline_core::traits::PanelError;
use scanline_drivers::ili9488::{widen_into, PixelSink, SpiClock};

use crate::runtime;
use crate::PanelIface;

/// One full panel row in wire format
pub const STAGING_SIZE: usize = PANEL_WIDTH * 3;

type Staging = &'static mut [u8; STAGING_SIZE];

/// A staged payload on its way to the DMA task
struct Job {
    buf: Staging,
    len: usize,
}

static STAGING: StaticCell<[u8; STAGING_SIZE]> = StaticCell::new();

/// Payloads waiting for DMA
static JOBS: Channel<CriticalSectionRawMutex, Job, 1> = Channel::new();

/// Staging buffer coming back after its DMA finished
static RETURNED: Channel<CriticalSectionRawMutex, Staging, 1> = Channel::new();

pub struct PanelSpi {
    spi: Spi<'static, SPI0, Async>,
}

impl PanelSpi {
    pub fn new(spi: Spi<'static, SPI0, Async>) -> Self {
        Self { spi }
    }

    /// Stream `bytes` out over the TX DMA channel
    async fn write_dma(&mut self, bytes: &[u8]) -> Result<(), embassy_rp::spi::Error> {
        self.spi.write(bytes).await
    }
}

impl ErrorType for PanelSpi {
    type Error = embassy_rp::spi::Error;
}

impl SpiBus<u8> for PanelSpi {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.spi.blocking_read(words)
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        self.spi.blocking_write(words)
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.spi.blocking_transfer(read, write)
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.spi.blocking_transfer_in_place(words)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        SpiBus::flush(&mut self.spi)
    }
}

impl SpiClock for PanelSpi {
    fn set_clock_hz(&mut self, hz: u32) {
        self.spi.set_frequency(hz);
    }
}

/// Pixel sink that queues span payloads for [`pixel_dma_task`]
///
/// A payload that cannot be queued still completes, so the transfer moves
/// on instead of stalling.
pub struct DmaPixels {
    slot: Slot,
    staging: Option<Staging>,
}

impl DmaPixels {
    /// Claims the staging buffer; call once
    pub fn new(slot: Slot) -> Self {
        Self {
            slot,
            staging: Some(STAGING.init([0; STAGING_SIZE])),
        }
    }

    fn queue(&mut self, pixels: &[u16]) -> Result<(), PanelError> {
        if self.staging.is_none() {
            self.staging = RETURNED.try_receive().ok();
        }
        // still None: the previous payload is on the wire
        let buf = self.staging.take().ok_or(PanelError::Bus)?;
        if pixels.len() * 3 > STAGING_SIZE {
            self.staging = Some(buf);
            return Err(PanelError::Bus);
        }
        let len = widen_into(pixels, &mut buf[..]);
        match JOBS.try_send(Job { buf, len }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                self.staging = Some(job.buf);
                Err(PanelError::Bus)
            }
        }
    }
}

impl PixelSink<PanelSpi, Output<'static>, Output<'static>> for DmaPixels {
    fn start(&mut self, _iface: &mut PanelIface, pixels: &[u16]) -> Result<(), PanelError> {
        let result = self.queue(pixels);
        if result.is_err() {
            runtime::post(self.slot, SchedulerEvent::TransferComplete);
        }
        result
    }
}

/// Streams staged payloads to the panel and reports each completion
#[embassy_executor::task]
pub async fn pixel_dma_task(iface: &'static RefCell<PanelIface>, slot: Slot) {
    loop {
        let job = JOBS.receive().await;
        // the display leaves the link alone until TransferComplete arrives
        let result = match iface.try_borrow_mut() {
            Ok(mut iface) => iface.spi_mut().write_dma(&job.buf[..job.len]).await,
            Err(_) => {
                defmt::error!("panel link busy, payload dropped");
                Ok(())
            }
        };
        if let Err(e) = result {
            defmt::warn!("pixel DMA failed: {}", e);
        }
        if RETURNED.try_send(job.buf).is_err() {
            defmt::error!("staging buffer lost");
        }
        runtime::post(slot, SchedulerEvent::TransferComplete);
    }
}
