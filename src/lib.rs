// src/lib.rs

#![no_std] // Specify no_std at the crate root

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod common;
pub mod decoder;
#[cfg(feature = "alloc")]
pub mod settings;

// Re-export key types for convenience
pub use common::frame::{Frame, FrameKind, MarkerKind};
pub use common::types::{DecoderConfig, Mode, ParityAndStopbits, ShiftOrder, Transport};
pub use common::ConfigError;
pub use decoder::Decoder;
#[cfg(feature = "alloc")]
pub use settings::AnalyzerSettings;
