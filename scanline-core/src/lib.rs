//! Board-agnostic core logic for the scanline display driver
//!
//! This crate contains everything that does not depend on a specific
//! panel, bus or microcontroller:
//!
//! - Differential encoding between pixel buffers (run coalescing, tolerance)
//! - Framebuffer ownership and mirror tracking
//! - Buffering policy (block, stage, drop)
//! - Vsync clock: scanline prediction and refresh-mode calibration
//! - Event-driven transfer scheduler pacing spans against the beam
//! - Collaborator traits for the panel, the bus engine and the runtime
//!
//! Everything is fixed-capacity and allocation-free. Buffers are handed in
//! by the application once at configuration time.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod buffering;
pub mod config;
pub mod diff;
pub mod display;
pub mod framebuffer;
pub mod registry;
pub mod scheduler;
pub mod state;
pub mod stats;
pub mod traits;
pub mod vsync;

#[cfg(test)]
pub(crate) mod sim;

pub use display::Display;
