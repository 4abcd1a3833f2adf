// src/common/error.rs

// No cfg_attr gymnastics needed here, thiserror is always available
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A bit rate of zero cannot describe a serial line.
    #[error("Bit rate must be greater than zero")]
    ZeroBitRate,

    /// Each bit needs at least four samples to place the probe points.
    #[error("Sample rate {sample_rate} Hz is below 4x the bit rate {bit_rate} bits/s")]
    SampleRateTooLow { bit_rate: u32, sample_rate: u32 },

    /// Modbus characters are at most 8 data bits wide.
    #[error("Unsupported character size: {0} data bits")]
    UnsupportedCharacterSize(u32),
}

// Note: anomalies observed while decoding (framing, parity, checksum
// mismatches, unknown function codes) are deliberately not represented
// here. They surface as diagnostic markers and frame flags and decoding
// continues, so the decoder stays useful on partial or corrupted
// captures. The only fatal errors are impossible configurations caught
// before the worker starts.
