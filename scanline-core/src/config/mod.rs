//! Configuration types
//!
//! Driver settings, their text form (`display.toml`) and the persisted
//! refresh calibration record.

pub mod calibration;
pub mod toml;
pub mod types;

pub use calibration::*;
pub use toml::{parse_display_config, ConfigError};
pub use types::*;
