//! Calibration persistence task
//!
//! Owns the flash and saves the refresh calibration whenever the render
//! side publishes a new one, so flash writes never stall a frame.

use defmt::*;

use crate::channels::CALIBRATION_SAVE;
use crate::storage::CalibrationStore;

#[embassy_executor::task]
pub async fn calibration_task(mut store: CalibrationStore<'static>) {
    info!("Calibration task started");

    loop {
        let record = CALIBRATION_SAVE.wait().await;
        info!(
            "Saving calibration: mode-0 period {} us, mode {}",
            record.mode0_period_us, record.refresh_mode
        );

        match store.save(&record).await {
            Ok(()) => info!("Calibration saved"),
            Err(e) => error!("Failed to save calibration: {}", e),
        }
    }
}
