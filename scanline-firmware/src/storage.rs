//! Calibration persistence
//!
//! Stores the refresh calibration record in the last 64KB of flash using
//! sequential-storage's wear-leveled key-value map.

use embassy_rp::dma::Channel;
use embassy_rp::flash::{Async, Flash};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;
use sequential_storage::cache::NoCache;
use sequential_storage::map;

use scanline_core::config::{CalibrationError, CalibrationRecord, MAX_RECORD_SIZE};

/// Flash storage configuration
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;
pub const PARTITION_SIZE: usize = 64 * 1024;
pub const PARTITION_START: usize = FLASH_SIZE - PARTITION_SIZE;

const PARTITION: core::ops::Range<u32> = (PARTITION_START as u32)..(FLASH_SIZE as u32);

/// Map key of the calibration record
const CALIBRATION_KEY: u8 = 1;

/// Scratch buffer for sequential-storage
const SCRATCH_SIZE: usize = 128;

/// Storage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Nothing stored yet
    NotFound,
    /// Flash or map operation failed
    Flash,
    /// Stored bytes are not a valid record
    Record(CalibrationError),
}

impl From<CalibrationError> for StorageError {
    fn from(e: CalibrationError) -> Self {
        StorageError::Record(e)
    }
}

pub struct CalibrationStore<'d> {
    flash: Flash<'d, FLASH, Async, FLASH_SIZE>,
}

impl<'d> CalibrationStore<'d> {
    pub fn new(flash: Peri<'d, FLASH>, dma: Peri<'d, impl Channel>) -> Self {
        Self {
            flash: Flash::new(flash, dma),
        }
    }

    /// Load and validate the stored record
    pub async fn load(&mut self) -> Result<CalibrationRecord, StorageError> {
        let mut scratch = [0u8; SCRATCH_SIZE];
        let bytes = map::fetch_item::<u8, &[u8], _>(
            &mut self.flash,
            PARTITION,
            &mut NoCache::new(),
            &mut scratch,
            &CALIBRATION_KEY,
        )
        .await
        .map_err(|_| StorageError::Flash)?
        .ok_or(StorageError::NotFound)?;

        Ok(CalibrationRecord::decode(bytes)?)
    }

    pub async fn save(&mut self, record: &CalibrationRecord) -> Result<(), StorageError> {
        let mut encoded = [0u8; MAX_RECORD_SIZE];
        let bytes: &[u8] = record.encode(&mut encoded)?;
        let mut scratch = [0u8; SCRATCH_SIZE];

        map::store_item(
            &mut self.flash,
            PARTITION,
            &mut NoCache::new(),
            &mut scratch,
            &CALIBRATION_KEY,
            &bytes,
        )
        .await
        .map_err(|_| StorageError::Flash)
    }
}
