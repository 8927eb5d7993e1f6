//! Persisted refresh calibration
//!
//! The mode-0 scan period measured at start-up can be stored in flash so
//! the next boot skips the measurement.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// "VCAL"
pub const CALIBRATION_MAGIC: u32 = 0x5643_414C;

pub const CALIBRATION_VERSION: u8 = 1;

/// Largest encoded record
pub const MAX_RECORD_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationError {
    /// Record does not fit the buffer
    Serialize,
    /// Bytes are not a postcard record
    Deserialize,
    /// Wrong magic or version
    InvalidFormat,
    CrcMismatch,
}

/// Stored mode-0 measurement plus the refresh mode it was taken with
///
/// Encoded with postcard. The trailing CRC covers every field before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationRecord {
    pub magic: u32,
    pub version: u8,
    /// Scan period measured in refresh mode 0 (µs)
    pub mode0_period_us: u32,
    pub refresh_mode: u8,
    pub crc: u32,
}

impl CalibrationRecord {
    pub fn new(mode0_period_us: u32, refresh_mode: u8) -> Self {
        let mut record = Self {
            magic: CALIBRATION_MAGIC,
            version: CALIBRATION_VERSION,
            mode0_period_us,
            refresh_mode,
            crc: 0,
        };
        record.update_crc();
        record
    }

    /// Magic and version belong to this firmware's format
    pub fn is_valid(&self) -> bool {
        (self.magic, self.version) == (CALIBRATION_MAGIC, CALIBRATION_VERSION)
    }

    fn checksum(&self) -> u32 {
        let fields: [&[u8]; 4] = [
            &self.magic.to_le_bytes(),
            &[self.version],
            &self.mode0_period_us.to_le_bytes(),
            &[self.refresh_mode],
        ];
        !fields.iter().fold(u32::MAX, |crc, bytes| crc32_update(crc, bytes))
    }

    pub fn update_crc(&mut self) {
        self.crc = self.checksum();
    }

    pub fn verify_crc(&self) -> bool {
        self.checksum() == self.crc
    }

    /// Serialize into `buf`, returning the used part
    #[cfg(feature = "serde")]
    pub fn encode<'b>(&self, buf: &'b mut [u8]) -> Result<&'b mut [u8], CalibrationError> {
        postcard::to_slice(self, buf).map_err(|_| CalibrationError::Serialize)
    }

    /// Deserialize and validate a stored record
    #[cfg(feature = "serde")]
    pub fn decode(bytes: &[u8]) -> Result<Self, CalibrationError> {
        let record: Self = postcard::from_bytes(bytes).map_err(|_| CalibrationError::Deserialize)?;
        if !record.is_valid() {
            return Err(CalibrationError::InvalidFormat);
        }
        if !record.verify_crc() {
            return Err(CalibrationError::CrcMismatch);
        }
        Ok(record)
    }
}

/// Reflected CRC-32 (0xEDB88320), one bit at a time
fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    data.iter().fold(crc, |acc, &byte| {
        (0..8).fold(acc ^ byte as u32, |c, _| {
            let carry = c & 1;
            (c >> 1) ^ (0xEDB8_8320 & carry.wrapping_neg())
        })
    })
}
