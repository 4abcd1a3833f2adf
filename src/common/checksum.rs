// src/common/checksum.rs

use super::types::Transport;
use crc::{Algorithm, Crc, Digest};

/// CRC algorithm used by Modbus RTU (CRC-16/MODBUS).
/// Polynomial: 0x8005 (normal representation of 0xA001 reversed)
/// Initial Value: 0xFFFF
/// Input Reflected: true
/// Output Reflected: true
/// Final XOR: 0x0000
/// Check Value: 0x4B37 (for "123456789")
/// Residue: 0x0000
pub const MODBUS_CRC16: Algorithm<u16> = Algorithm {
    poly: 0x8005,
    init: 0xFFFF,
    refin: true,
    refout: true,
    xorout: 0x0000,
    check: 0x4B37,
    width: 16,
    residue: 0x0000,
};

// A Crc instance for the Modbus algorithm, shared by all digests.
static CRC_COMPUTER: Crc<u16> = Crc::<u16>::new(&MODBUS_CRC16);

/// Calculates the CRC-16/Modbus over a complete buffer.
///
/// Covers `address || function_code || PDU bytes`; the two CRC bytes on
/// the wire are little-endian (low byte first) and are not themselves
/// part of the calculation.
#[inline]
pub fn calculate_crc16(data: &[u8]) -> u16 {
    CRC_COMPUTER.checksum(data)
}

/// Calculates the LRC-8 used by Modbus ASCII over a complete buffer.
///
/// Sum of the (hex-decoded) message bytes modulo 256, two's-complement
/// negated. Covers the same bytes as the RTU CRC; the `:`/CR/LF framing
/// characters and the LRC byte itself are excluded.
#[inline]
pub fn calculate_lrc(data: &[u8]) -> u8 {
    let mut sum: u8 = 0;
    for &byte in data {
        sum = sum.wrapping_add(byte);
    }
    0u8.wrapping_sub(sum)
}

/// Running checksum over the bytes of one message.
///
/// Bytes feed the accumulator as they are decoded, so no message buffer
/// is kept; `finalize` yields the value to compare against the received
/// trailer.
pub enum Checksum {
    Crc16(Digest<'static, u16>),
    Lrc(u8),
}

impl Checksum {
    /// Fresh accumulator for one message on the given transport.
    pub fn new(transport: Transport) -> Self {
        match transport {
            Transport::Rtu => Self::Crc16(CRC_COMPUTER.digest()),
            Transport::Ascii => Self::Lrc(0),
        }
    }

    /// Feeds one decoded message byte.
    pub fn update(&mut self, byte: u8) {
        match self {
            Self::Crc16(digest) => digest.update(&[byte]),
            Self::Lrc(sum) => *sum = sum.wrapping_add(byte),
        }
    }

    /// Finishes the accumulation. The LRC widens to 16 bits with a zero
    /// high byte so both transports compare through the same value.
    pub fn finalize(self) -> u16 {
        match self {
            Self::Crc16(digest) => digest.finalize(),
            Self::Lrc(sum) => u16::from(0u8.wrapping_sub(sum)),
        }
    }
}
