// src/common/timing.rs

use super::types::DecoderConfig;
use heapless::Vec;

/// Upper bound on the per-character data-bit probe count (8-bit chars).
pub const MAX_DATA_BITS: usize = 8;

/// Rational clock that converts bit periods into integer sample deltas.
///
/// Positions are tracked in half-bit-period units with the fractional
/// remainder carried between calls, so the accumulated placement error
/// over a character stays below one sample at any bit-rate/sample-rate
/// ratio.
#[derive(Debug, Clone)]
pub struct HalfPeriodClock {
    samples_per_half_period: f64,
    error: f64,
}

impl HalfPeriodClock {
    pub fn new(bit_rate: u32, sample_rate: u32) -> Self {
        Self {
            samples_per_half_period: f64::from(sample_rate) / (f64::from(bit_rate) * 2.0),
            error: 0.0,
        }
    }

    /// Advance by `half_periods` half-bit-periods; returns the integer
    /// number of samples to move, carrying the remainder forward.
    pub fn advance(&mut self, half_periods: u32) -> u32 {
        self.error += self.samples_per_half_period * f64::from(half_periods);
        let samples = self.error as u32;
        self.error -= f64::from(samples);
        samples
    }
}

/// Pre-computed sample deltas for decoding one character.
///
/// All deltas are relative to the previous probe point, starting from
/// the falling edge of the start bit:
/// - `data_bits[0]` lands 1.5 bit periods in, at the centre of data
///   bit 0 (skipping the start bit);
/// - each further entry is one bit period, centre to centre;
/// - `parity`, when present, is one bit period past the last data bit;
/// - `stop` is one bit period past the last probed element, landing at
///   the centre of the stop bit. With two stop bits and no parity the
///   same delta is applied twice, one bit period apart.
#[derive(Debug, Clone)]
pub struct SampleOffsets {
    pub data_bits: Vec<u32, MAX_DATA_BITS>,
    pub parity: Option<u32>,
    pub stop: u32,
}

impl SampleOffsets {
    pub fn compute(config: &DecoderConfig) -> Self {
        let mut clock = HalfPeriodClock::new(config.bit_rate, config.sample_rate);
        let mut data_bits = Vec::new();

        // Centre of the first data bit: start bit plus half a period.
        // bits_per_transfer is validated against MAX_DATA_BITS, so the
        // pushes cannot overflow the bounded Vec.
        let _ = data_bits.push(clock.advance(3));
        for _ in 1..config.bits_per_transfer {
            let _ = data_bits.push(clock.advance(2));
        }

        let parity = config
            .parity_and_stop
            .parity_enabled()
            .then(|| clock.advance(2));

        let stop = clock.advance(2);

        Self {
            data_bits,
            parity,
            stop,
        }
    }
}
