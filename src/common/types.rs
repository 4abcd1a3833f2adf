// src/common/types.rs

use super::error::ConfigError;

// --- Decoder mode ---

/// Which encoding and which side(s) of the link the capture contains.
///
/// The discriminants are stable: they are the values persisted by the
/// settings archive, so reordering them would break saved settings.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u32)]
pub enum Mode {
    /// Binary encoding, capture contains client requests only.
    RtuClient = 0,
    /// Binary encoding, capture contains server responses only.
    RtuServer = 1,
    /// ASCII encoding, client requests only.
    AsciiClient = 2,
    /// ASCII encoding, server responses only.
    AsciiServer = 3,
    /// Binary encoding, requests and responses alternating.
    RtuBoth = 4,
    /// ASCII encoding, requests and responses alternating.
    AsciiBoth = 5,
}

impl Mode {
    /// Tries to convert a persisted discriminant back into a Mode.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::RtuClient),
            1 => Some(Self::RtuServer),
            2 => Some(Self::AsciiClient),
            3 => Some(Self::AsciiServer),
            4 => Some(Self::RtuBoth),
            5 => Some(Self::AsciiBoth),
            _ => None,
        }
    }

    /// The wire transport this mode decodes.
    pub fn transport(self) -> Transport {
        match self {
            Self::RtuClient | Self::RtuServer | Self::RtuBoth => Transport::Rtu,
            Self::AsciiClient | Self::AsciiServer | Self::AsciiBoth => Transport::Ascii,
        }
    }

    /// The fixed direction of every message, or `None` when the capture
    /// carries both sides and the decoder alternates.
    pub fn fixed_direction(self) -> Option<Direction> {
        match self {
            Self::RtuClient | Self::AsciiClient => Some(Direction::Request),
            Self::RtuServer | Self::AsciiServer => Some(Direction::Response),
            Self::RtuBoth | Self::AsciiBoth => None,
        }
    }
}

/// Modbus serial-line encoding.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Transport {
    /// Raw binary, framed by line silence, CRC-16/Modbus checksum.
    Rtu,
    /// Hex characters bracketed by `:` and CR LF, LRC-8 checksum.
    Ascii,
}

/// Whether a message travels client-to-server or server-to-client.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Direction {
    Request,
    Response,
}

// --- Character framing ---

/// Parity style and stop-bit count, fused the way serial UIs present it.
///
/// Discriminants are stable persisted values (see `Mode`).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u32)]
pub enum ParityAndStopbits {
    /// No parity bit, two stop bits.
    NoneTwo = 0,
    /// Even parity bit, one stop bit (the Modbus default).
    EvenOne = 1,
    /// Odd parity bit, one stop bit.
    OddOne = 2,
    /// No parity bit, one stop bit.
    NoneOne = 3,
}

impl ParityAndStopbits {
    /// Tries to convert a persisted discriminant back into a value.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::NoneTwo),
            1 => Some(Self::EvenOne),
            2 => Some(Self::OddOne),
            3 => Some(Self::NoneOne),
            _ => None,
        }
    }

    /// True when a parity bit follows the data bits.
    pub fn parity_enabled(self) -> bool {
        matches!(self, Self::EvenOne | Self::OddOne)
    }

    /// Number of stop bits that close each character.
    pub fn stop_bits(self) -> u8 {
        match self {
            Self::NoneTwo => 2,
            Self::EvenOne | Self::OddOne | Self::NoneOne => 1,
        }
    }
}

/// Whether the least or the most significant data bit is on the wire first.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ShiftOrder {
    LsbFirst,
    MsbFirst,
}

// --- Decoder configuration ---

/// Immutable per-run configuration of the decoder core.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DecoderConfig {
    /// Serial bit rate in bits per second.
    pub bit_rate: u32,
    /// Capture sample rate in samples per second.
    pub sample_rate: u32,
    /// Character size in data bits (8 for Modbus).
    pub bits_per_transfer: u32,
    pub shift_order: ShiftOrder,
    pub parity_and_stop: ParityAndStopbits,
    /// True when the line idles low and the start bit is a rising edge.
    pub inverted: bool,
    pub mode: Mode,
    /// Initial value of the request/response alternation in `*Both` modes.
    pub assume_starts_with_response: bool,
}

impl DecoderConfig {
    /// Rejects configurations the decoder cannot run on. Called once at
    /// worker startup; a failure here is the only fatal error class.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bit_rate == 0 {
            return Err(ConfigError::ZeroBitRate);
        }
        if self.sample_rate < self.bit_rate.saturating_mul(4) {
            return Err(ConfigError::SampleRateTooLow {
                bit_rate: self.bit_rate,
                sample_rate: self.sample_rate,
            });
        }
        if self.bits_per_transfer == 0 || self.bits_per_transfer > 8 {
            return Err(ConfigError::UnsupportedCharacterSize(self.bits_per_transfer));
        }
        Ok(())
    }

    /// Mask covering the configured number of data bits.
    pub(crate) fn bit_mask(&self) -> u8 {
        if self.bits_per_transfer >= 8 {
            0xFF
        } else {
            (1u8 << self.bits_per_transfer) - 1
        }
    }
}
