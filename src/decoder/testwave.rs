// src/decoder/testwave.rs
//
// Test-only support: renders byte sequences into sample streams and
// records everything the decoder emits, so the byte and message layers
// are exercised end to end through the public traits.

use super::Decoder;
use crate::common::checksum::{calculate_crc16, calculate_lrc};
use crate::common::frame::{Frame, MarkerKind};
use crate::common::hal_traits::{BitStream, LineLevel, ResultSink, WorkerControl};
use crate::common::types::{DecoderConfig, ParityAndStopbits, ShiftOrder};
use std::vec::Vec;

/// Renders serial characters into a sample stream at the configured
/// rates, honouring shift order, parity, stop bits and inversion.
pub(crate) struct WaveBuilder {
    samples: Vec<bool>,
    samples_per_bit: usize,
    config: DecoderConfig,
}

impl WaveBuilder {
    pub fn new(config: &DecoderConfig) -> Self {
        assert_eq!(
            config.sample_rate % config.bit_rate,
            0,
            "test waves use an integer number of samples per bit"
        );
        let mut builder = Self {
            samples: Vec::new(),
            samples_per_bit: (config.sample_rate / config.bit_rate) as usize,
            config: *config,
        };
        builder.idle_bits(4);
        builder
    }

    fn push_level(&mut self, logical_high: bool, bit_periods: usize) {
        // Inversion happens at the sample level, so the decoder sees the
        // same logical waveform either way.
        let sample = logical_high != self.config.inverted;
        for _ in 0..bit_periods * self.samples_per_bit {
            self.samples.push(sample);
        }
    }

    pub fn idle_bits(&mut self, bit_periods: usize) {
        self.push_level(true, bit_periods);
    }

    pub fn byte(&mut self, value: u8) {
        self.byte_with(value, false, [false, false]);
    }

    pub fn bytes(&mut self, values: &[u8]) {
        for &value in values {
            self.byte(value);
        }
    }

    /// Renders one character. `flip_parity` inverts the parity bit;
    /// `stop_low[n]` drives the n-th stop bit to the active level.
    pub fn byte_with(&mut self, value: u8, flip_parity: bool, stop_low: [bool; 2]) {
        let bits = self.config.bits_per_transfer as usize;

        self.push_level(false, 1); // start bit

        for bit_index in 0..bits {
            let bit = match self.config.shift_order {
                ShiftOrder::LsbFirst => (value >> bit_index) & 1 == 1,
                ShiftOrder::MsbFirst => (value >> (bits - 1 - bit_index)) & 1 == 1,
            };
            self.push_level(bit, 1);
        }

        match self.config.parity_and_stop {
            ParityAndStopbits::EvenOne | ParityAndStopbits::OddOne => {
                let ones_odd = value.count_ones() % 2 == 1;
                let parity = match self.config.parity_and_stop {
                    ParityAndStopbits::EvenOne => ones_odd,
                    _ => !ones_odd,
                };
                self.push_level(parity != flip_parity, 1);
                self.push_level(!stop_low[0], 1);
            }
            ParityAndStopbits::NoneOne => {
                self.push_level(!stop_low[0], 1);
            }
            ParityAndStopbits::NoneTwo => {
                self.push_level(!stop_low[0], 1);
                self.push_level(!stop_low[1], 1);
            }
        }

        // An inter-character gap keeps every start bit a clean edge.
        self.idle_bits(1);
    }

    pub fn finish(mut self) -> TestWave {
        // Generous tail so the final stop probes stay inside the wave.
        self.idle_bits(16);
        TestWave {
            samples: self.samples,
            pos: 0,
        }
    }
}

/// A finished waveform acting as the decoder's bit stream.
pub(crate) struct TestWave {
    samples: Vec<bool>,
    pos: usize,
}

impl BitStream for TestWave {
    fn advance_to_next_edge(&mut self) {
        let current = self.samples[self.pos];
        let mut pos = self.pos + 1;
        while pos < self.samples.len() && self.samples[pos] == current {
            pos += 1;
        }
        assert!(pos < self.samples.len(), "advanced past the end of the test wave");
        self.pos = pos;
    }

    fn advance(&mut self, delta_samples: u32) {
        self.pos += delta_samples as usize;
        assert!(
            self.pos < self.samples.len(),
            "advanced past the end of the test wave"
        );
    }

    fn bit_state(&self) -> LineLevel {
        if self.samples[self.pos] {
            LineLevel::High
        } else {
            LineLevel::Low
        }
    }

    fn sample_number(&self) -> u64 {
        self.pos as u64
    }
}

/// Records every frame, commit and marker the decoder pushes.
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub frames: Vec<Frame>,
    pub markers: Vec<(u64, MarkerKind)>,
    pub committed_frames: usize,
}

impl ResultSink for RecordingSink {
    fn add_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    fn commit(&mut self) {
        self.committed_frames = self.frames.len();
    }

    fn add_marker(&mut self, sample: u64, kind: MarkerKind) {
        self.markers.push((sample, kind));
    }
}

/// Lets the worker run for a fixed number of messages, then asks it to
/// exit at the next boundary.
pub(crate) struct StopAfter {
    limit: usize,
    progressed: usize,
    pub last_progress: u64,
}

impl StopAfter {
    pub fn messages(limit: usize) -> Self {
        Self {
            limit,
            progressed: 0,
            last_progress: 0,
        }
    }
}

impl WorkerControl for StopAfter {
    fn report_progress(&mut self, sample: u64) {
        self.progressed += 1;
        self.last_progress = sample;
    }

    fn should_exit(&self) -> bool {
        self.progressed >= self.limit
    }
}

// --- Convenience drivers ---

/// Appends the little-endian CRC-16 to an RTU message body.
pub(crate) fn rtu_wire(body: &[u8]) -> Vec<u8> {
    let crc = calculate_crc16(body);
    let mut wire = body.to_vec();
    wire.push((crc & 0xFF) as u8);
    wire.push((crc >> 8) as u8);
    wire
}

/// Renders an ASCII frame: `:`, hex characters, hex LRC, CR, LF.
pub(crate) fn ascii_wire(body: &[u8]) -> Vec<u8> {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut chars = Vec::new();
    chars.push(b':');
    for &byte in body.iter().chain(core::iter::once(&calculate_lrc(body))) {
        chars.push(HEX[usize::from(byte >> 4)]);
        chars.push(HEX[usize::from(byte & 0x0F)]);
    }
    chars.push(b'\r');
    chars.push(b'\n');
    chars
}

/// Decodes `wire` (one serial character per entry) for `messages`
/// messages and returns the recorded frames and markers.
pub(crate) fn decode_wire(
    config: &DecoderConfig,
    wire: &[u8],
    messages: usize,
) -> (Vec<Frame>, Vec<(u64, MarkerKind)>) {
    let mut builder = WaveBuilder::new(config);
    builder.bytes(wire);
    decode_wave(config, builder.finish(), messages)
}

pub(crate) fn decode_wave(
    config: &DecoderConfig,
    wave: TestWave,
    messages: usize,
) -> (Vec<Frame>, Vec<(u64, MarkerKind)>) {
    let mut decoder = Decoder::new(
        *config,
        wave,
        RecordingSink::default(),
        StopAfter::messages(messages),
    )
    .unwrap();
    decoder.run();
    let (_, sink, control) = decoder.into_parts();
    assert_eq!(
        sink.committed_frames,
        sink.frames.len(),
        "every pushed frame must be committed"
    );
    if let Some(last) = sink.frames.last() {
        assert_eq!(
            control.last_progress, last.end_sample_inclusive,
            "progress reports track the last committed sample"
        );
    }
    (sink.frames, sink.markers)
}
