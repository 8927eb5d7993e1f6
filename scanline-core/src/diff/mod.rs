//! Differential encoding
//!
//! Computes which pixels changed between the reference framebuffer and a
//! new frame, as row-ordered runs, and hands them out one span at a time
//! to the transfer scheduler.

pub mod buffer;
pub mod encode;
pub mod set;
pub mod span;

pub use buffer::{DiffBuffer, DiffState, SpanIter};
pub use encode::DiffParams;
pub use set::{DiffSet, DiffSlot};
pub use span::{DiffSpan, ReadResult, ToleranceMask};
