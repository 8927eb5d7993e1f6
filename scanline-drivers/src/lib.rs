//! Panel driver implementations
//!
//! This crate provides concrete implementations of the collaborator
//! traits defined in scanline-core:
//!
//! - ILI9488 480x320 SPI panel (18-bit interface, scanline readback)

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod ili9488;
