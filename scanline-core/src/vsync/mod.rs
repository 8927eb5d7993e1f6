//! Panel refresh tracking
//!
//! - [`calibration`]: refresh-mode table derived from a measured period
//! - [`clock`]: beam position prediction between real scanline queries
//! - [`sample`]: measuring the period on the panel

pub mod calibration;
pub mod clock;
pub mod sample;

pub use calibration::{RefreshCalibration, FRMCTR1, REFRESH_MODES};
pub use clock::{VsyncClock, DEFAULT_PERIOD_US};
pub use sample::{measure_period, SAMPLE_FRAMES};
