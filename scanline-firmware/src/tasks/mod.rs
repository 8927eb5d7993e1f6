//! Embassy async tasks
//!
//! Each task runs independently and communicates via signals.

pub mod animate;
pub mod calibration;
pub mod render;

pub use animate::{animate_task, AnimateConfig};
pub use calibration::calibration_task;
pub use render::render_task;
