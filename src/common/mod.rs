// src/common/mod.rs

// --- Declare all public modules within common ---
pub mod checksum;
pub mod error;
pub mod frame;
pub mod hal_traits;
pub mod timing;
pub mod types;

// --- Re-export key types/traits/functions for easier access ---

// From checksum.rs
pub use checksum::{calculate_crc16, calculate_lrc, Checksum};

// From error.rs
pub use error::ConfigError;

// From frame.rs
pub use frame::{Frame, FrameKind, MarkerKind};

// From hal_traits.rs
pub use hal_traits::{BitStream, LineLevel, ResultSink, WorkerControl};

// From timing.rs
pub use timing::SampleOffsets;

// From types.rs
pub use types::{DecoderConfig, Mode, ParityAndStopbits, ShiftOrder, Transport};
