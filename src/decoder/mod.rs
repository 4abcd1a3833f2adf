// src/decoder/mod.rs

mod byte_reader;
mod message;
#[cfg(test)]
pub(crate) mod testwave;

use crate::common::checksum::Checksum;
use crate::common::error::ConfigError;
use crate::common::hal_traits::{BitStream, LineLevel, ResultSink, WorkerControl};
use crate::common::timing::SampleOffsets;
use crate::common::types::{DecoderConfig, Direction, Transport};

use message::MessageHead;

/// The decoder core: consumes a bit stream, emits annotated frames.
///
/// Owns all per-run state (configuration, sample-offset plan, the
/// request/response alternation flag and the running checksum), so a
/// worker thread drives the whole decode through [`Decoder::run`]
/// without sharing anything mutable with the host.
pub struct Decoder<B, S, C> {
    config: DecoderConfig,
    offsets: SampleOffsets,
    bit_mask: u8,
    transport: Transport,
    /// Line level of a logical one / idle line. Swapped when inverted.
    logical_high: LineLevel,
    logical_low: LineLevel,
    /// In `*Both` modes, selects the role of the next message; toggles
    /// after every completed message.
    processing_response: bool,
    checksum: Checksum,
    reader: B,
    sink: S,
    control: C,
}

impl<B, S, C> Decoder<B, S, C>
where
    B: BitStream,
    S: ResultSink,
    C: WorkerControl,
{
    /// Validates the configuration and prepares the sample-offset plan.
    ///
    /// An impossible configuration (zero bit rate, fewer than four
    /// samples per bit, oversized characters) is rejected here, before
    /// any sample is consumed.
    pub fn new(config: DecoderConfig, reader: B, sink: S, control: C) -> Result<Self, ConfigError> {
        config.validate()?;

        let (logical_high, logical_low) = if config.inverted {
            (LineLevel::Low, LineLevel::High)
        } else {
            (LineLevel::High, LineLevel::Low)
        };

        let transport = config.mode.transport();

        Ok(Self {
            offsets: SampleOffsets::compute(&config),
            bit_mask: config.bit_mask(),
            transport,
            logical_high,
            logical_low,
            processing_response: config.assume_starts_with_response,
            checksum: Checksum::new(transport),
            config,
            reader,
            sink,
            control,
        })
    }

    /// The worker loop: decodes messages until the host signals exit.
    ///
    /// Frames reach the sink in sample-ascending order and every push is
    /// committed immediately. The should-exit flag is polled at message
    /// boundaries only; a partially decoded message is abandoned without
    /// a terminal frame.
    pub fn run(&mut self) {
        self.reader.track_minimum_pulse_width();

        // Sync to an idle line so the first edge we see is a start bit.
        if self.reader.bit_state() == self.logical_low {
            self.reader.advance_to_next_edge();
        }

        loop {
            if self.control.should_exit() {
                return;
            }

            // RTU frames ride on line silence; ASCII frames open with ':'.
            if self.transport == Transport::Ascii {
                loop {
                    if self.next_byte().value == b':' {
                        break;
                    }
                }
            }

            self.checksum = Checksum::new(self.transport);

            let address = self.data_byte();
            let function = self.data_byte();
            let head = MessageHead {
                address: address.value,
                function: function.value,
                start: address.start,
                end: function.end,
            };

            let direction = match self.config.mode.fixed_direction() {
                Some(direction) => direction,
                None if self.processing_response => Direction::Response,
                None => Direction::Request,
            };

            let mut terminal = match direction {
                Direction::Request => self.parse_request(&head),
                Direction::Response => self.parse_response(&head),
            };

            // ASCII closes each frame with CR LF. The values are not
            // validated, but the terminal frame extends through them.
            if self.transport == Transport::Ascii {
                let _cr = self.next_byte();
                let lf = self.next_byte();
                terminal.end_sample_inclusive = lf.end;
            }

            let progress = terminal.end_sample_inclusive;
            self.sink.add_frame(terminal);
            self.sink.commit();

            self.processing_response = !self.processing_response;
            self.control.report_progress(progress);
        }
    }

    /// Read-only view of the sink, e.g. for hosts that own it indirectly.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Releases the reader, sink and control back to the caller.
    pub fn into_parts(self) -> (B, S, C) {
        (self.reader, self.sink, self.control)
    }
}
