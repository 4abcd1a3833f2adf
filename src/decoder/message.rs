// src/decoder/message.rs
//
// Message-layer parsing: one routine per body shape, driven by the
// function-code tables below. The byte layer hands up logical bytes;
// everything here is about delimiting fields, feeding the running
// checksum and packing the decoded fields into frame payloads.

use super::byte_reader::DecodedByte;
use super::Decoder;
use crate::common::checksum::Checksum;
use crate::common::frame::{Frame, FrameKind};
use crate::common::hal_traits::{BitStream, ResultSink, WorkerControl};
use crate::common::types::Transport;

/// Address and function code opening every message, with the samples
/// they were read from. The header frame starts at `start`.
pub(crate) struct MessageHead {
    pub address: u8,
    pub function: u8,
    pub start: u64,
    pub end: u64,
}

/// Body shape of a client request, after address and function code.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum RequestShape {
    /// Two 16-bit fields, then the checksum. One frame.
    Payload4,
    /// Nothing but the checksum. One frame, payload fields zeroed.
    NoPayload,
    /// Read FIFO Queue: one 16-bit pointer address, then the checksum.
    FifoAddress,
    /// Write Multiple Coils: two 16-bit fields, byte count, raw bytes.
    WriteCoils,
    /// Write Multiple Registers: two 16-bit fields, byte count, words.
    WriteRegisters,
    /// Read File Record: byte count, then 7-byte sub-requests.
    ReadFile,
    /// Write File Record: byte count, then sub-requests carrying data.
    WriteFile,
    /// Mask Write Register: three 16-bit fields, OR-mask in `data2`.
    MaskWrite,
    /// Read/Write Multiple Registers: four 16-bit fields, byte count,
    /// write words; the write window lands in `data2`.
    ReadWriteRegisters,
}

fn request_shape(function: u8) -> Option<RequestShape> {
    match function {
        0x01..=0x06 | 0x08 => Some(RequestShape::Payload4),
        0x07 | 0x0B | 0x0C | 0x11 => Some(RequestShape::NoPayload),
        0x0F => Some(RequestShape::WriteCoils),
        0x10 => Some(RequestShape::WriteRegisters),
        0x14 => Some(RequestShape::ReadFile),
        0x15 => Some(RequestShape::WriteFile),
        0x16 => Some(RequestShape::MaskWrite),
        0x17 => Some(RequestShape::ReadWriteRegisters),
        0x18 => Some(RequestShape::FifoAddress),
        _ => None,
    }
}

/// Body shape of a normal (non-exception) server response.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum ResponseShape {
    /// Byte count, then that many single-byte data units.
    ByteData,
    /// Byte count, then `count / 2` 16-bit data units.
    WordData,
    /// Two echoed 16-bit fields, then the checksum. One frame.
    Echo4,
    /// One status byte, then the checksum. One frame.
    Status1,
    /// Get Com Event Log: counts and status words, then event bytes.
    EventLog,
    /// Read File Record: length-prefixed sub-responses of words.
    ReadFile,
    /// Write File Record: echoes the request body.
    WriteFile,
    /// Mask Write Register: echoes the request, OR-mask in `data2`.
    MaskWrite,
    /// Read FIFO Queue: 16-bit byte count and FIFO count, then words.
    Fifo,
}

fn response_shape(function: u8) -> Option<ResponseShape> {
    match function {
        0x01 | 0x02 | 0x11 => Some(ResponseShape::ByteData),
        0x03 | 0x04 | 0x17 => Some(ResponseShape::WordData),
        0x05 | 0x06 | 0x08 | 0x0B | 0x0F | 0x10 => Some(ResponseShape::Echo4),
        0x07 => Some(ResponseShape::Status1),
        0x0C => Some(ResponseShape::EventLog),
        0x14 => Some(ResponseShape::ReadFile),
        0x15 => Some(ResponseShape::WriteFile),
        0x16 => Some(ResponseShape::MaskWrite),
        0x18 => Some(ResponseShape::Fifo),
        _ => None,
    }
}

/// Whether a length-prefixed body counts in raw bytes (coil images,
/// server IDs, event bytes) or 16-bit register words.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum DataUnit {
    Byte,
    Word,
}

/// The received checksum trailer of one message.
struct ChecksumTrailer {
    /// `high << 8 | low`; for ASCII the high byte is always zero.
    field: u16,
    ok: bool,
    start: u64,
    end: u64,
}

/// `address | function | payload | low16`, big-endian within 64 bits.
/// `low16` is the received checksum for single-frame messages and the
/// byte count for multi-frame headers.
fn pack_head(head: &MessageHead, payload: [u8; 4], low16: u16) -> u64 {
    (u64::from(head.address) << 56)
        | (u64::from(head.function) << 48)
        | (u64::from(payload[0]) << 40)
        | (u64::from(payload[1]) << 32)
        | (u64::from(payload[2]) << 24)
        | (u64::from(payload[3]) << 16)
        | u64::from(low16)
}

/// File-record sub-request fields packed for a FILE_SUBREQ frame.
fn pack_subrequest(reference: u8, file: [u8; 2], record: [u8; 2], length: [u8; 2]) -> u64 {
    (u64::from(reference) << 48)
        | (u64::from(file[0]) << 40)
        | (u64::from(file[1]) << 32)
        | (u64::from(record[0]) << 24)
        | (u64::from(record[1]) << 16)
        | (u64::from(length[0]) << 8)
        | u64::from(length[1])
}

impl<B, S, C> Decoder<B, S, C>
where
    B: BitStream,
    S: ResultSink,
    C: WorkerControl,
{
    // --- Byte access with checksum accounting ---

    /// Reads one message byte and feeds it to the running checksum.
    pub(crate) fn data_byte(&mut self) -> DecodedByte {
        let byte = self.next_byte();
        self.checksum.update(byte.value);
        byte
    }

    fn read_payload4(&mut self) -> [u8; 4] {
        [
            self.data_byte().value,
            self.data_byte().value,
            self.data_byte().value,
            self.data_byte().value,
        ]
    }

    /// Reads the checksum trailer (two bytes little-endian for RTU, one
    /// for ASCII) and compares it against the accumulated value. The
    /// trailer bytes themselves never feed the accumulator.
    fn read_checksum_trailer(&mut self) -> ChecksumTrailer {
        let computed =
            core::mem::replace(&mut self.checksum, Checksum::new(self.transport)).finalize();
        match self.transport {
            Transport::Rtu => {
                let low = self.next_byte();
                let high = self.next_byte();
                let received = (u16::from(high.value) << 8) | u16::from(low.value);
                ChecksumTrailer {
                    field: received,
                    ok: received == computed,
                    start: low.start,
                    end: high.end,
                }
            }
            Transport::Ascii => {
                let lrc = self.next_byte();
                let received = u16::from(lrc.value);
                ChecksumTrailer {
                    field: received,
                    ok: received == computed,
                    start: lrc.start,
                    end: lrc.end,
                }
            }
        }
    }

    // --- Frame emission helpers ---

    fn emit(&mut self, frame: Frame) {
        self.sink.add_frame(frame);
        self.sink.commit();
    }

    /// One single-byte data unit as its own DATA frame.
    fn emit_byte_unit(&mut self) {
        let byte = self.data_byte();
        let mut frame = Frame::new(FrameKind::Data, byte.start, byte.end);
        frame.data1 = u64::from(byte.value) << 32;
        self.emit(frame);
    }

    /// One 16-bit data unit (high wire byte first) as a DATA frame.
    fn emit_word_unit(&mut self) {
        let high = self.data_byte();
        let low = self.data_byte();
        let mut frame = Frame::new(FrameKind::Data, high.start, low.end);
        frame.data1 = (u64::from(high.value) << 40) | (u64::from(low.value) << 32);
        self.emit(frame);
    }

    /// Terminal frame of a single-frame message: everything from the
    /// address through the checksum collapses into one record.
    fn single_frame(&mut self, head: &MessageHead, kind: FrameKind, payload: [u8; 4]) -> Frame {
        let trailer = self.read_checksum_trailer();
        let mut frame = Frame::new(kind, head.start, trailer.end);
        frame.data1 = pack_head(head, payload, trailer.field);
        frame.checksum_error = !trailer.ok;
        #[cfg(feature = "log")]
        if frame.checksum_error {
            log::warn!(
                "checksum mismatch on function {:#04x} (received {:#06x})",
                head.function,
                trailer.field
            );
        }
        frame
    }

    /// Terminal END frame of a multi-frame message, spanning the
    /// received checksum bytes. `malformed` forces the error flag even
    /// when the arithmetic happens to agree.
    fn end_frame(&mut self, malformed: bool) -> Frame {
        let trailer = self.read_checksum_trailer();
        let mut frame = Frame::new(FrameKind::End, trailer.start, trailer.end);
        frame.data1 = u64::from(trailer.field);
        frame.checksum_error = !trailer.ok || malformed;
        #[cfg(feature = "log")]
        if frame.checksum_error {
            log::warn!("checksum mismatch at end frame (received {:#06x})", trailer.field);
        }
        frame
    }

    /// Header-only fallback for function codes outside the tables: the
    /// accumulated address and function are emitted and the dispatcher
    /// regains control. No guessing at the remaining byte count.
    fn unknown_header(&mut self, head: &MessageHead, kind: FrameKind) -> Frame {
        #[cfg(feature = "log")]
        log::warn!("unknown function code {:#04x}", head.function);
        let mut frame = Frame::new(kind, head.start, head.end);
        frame.data1 = (u64::from(head.address) << 56) | (u64::from(head.function) << 48);
        frame
    }

    // --- Request side ---

    pub(crate) fn parse_request(&mut self, head: &MessageHead) -> Frame {
        let Some(shape) = request_shape(head.function) else {
            return self.unknown_header(head, FrameKind::Request);
        };

        match shape {
            RequestShape::Payload4 => {
                let payload = self.read_payload4();
                self.single_frame(head, FrameKind::Request, payload)
            }
            RequestShape::NoPayload => self.single_frame(head, FrameKind::Request, [0; 4]),
            RequestShape::FifoAddress => {
                let high = self.data_byte();
                let low = self.data_byte();
                self.single_frame(head, FrameKind::Request, [high.value, low.value, 0, 0])
            }
            RequestShape::WriteCoils => {
                self.write_multiple(head, FrameKind::Request, DataUnit::Byte)
            }
            RequestShape::WriteRegisters => {
                self.write_multiple(head, FrameKind::Request, DataUnit::Word)
            }
            RequestShape::ReadFile => self.read_file_request(head),
            RequestShape::WriteFile => self.write_file(head, FrameKind::Request),
            RequestShape::MaskWrite => self.mask_write(head, FrameKind::Request),
            RequestShape::ReadWriteRegisters => self.read_write_registers_request(head),
        }
    }

    /// Write Multiple Coils / Registers: header, one DATA frame per
    /// unit, END with the checksum.
    fn write_multiple(&mut self, head: &MessageHead, kind: FrameKind, unit: DataUnit) -> Frame {
        let payload = self.read_payload4();
        let count = self.data_byte();

        let mut header = Frame::new(kind, head.start, count.end);
        header.data1 = pack_head(head, payload, u16::from(count.value));
        self.emit(header);

        match unit {
            DataUnit::Byte => {
                for _ in 0..count.value {
                    self.emit_byte_unit();
                }
            }
            DataUnit::Word => {
                for _ in 0..count.value / 2 {
                    self.emit_word_unit();
                }
            }
        }

        self.end_frame(false)
    }

    /// Read File Record request: byte count, then 7-byte sub-requests
    /// `(reference, file number, record number, record length)`.
    fn read_file_request(&mut self, head: &MessageHead) -> Frame {
        let count = self.data_byte();

        let mut header = Frame::new(FrameKind::Request, head.start, count.end);
        header.data1 = pack_head(head, [0; 4], u16::from(count.value));
        self.emit(header);

        let mut consumed: u16 = 0;
        while consumed < u16::from(count.value) {
            let reference = self.data_byte();
            let file = [self.data_byte(), self.data_byte()];
            let record = [self.data_byte(), self.data_byte()];
            let length = [self.data_byte(), self.data_byte()];
            consumed += 7;

            let mut sub = Frame::new(FrameKind::FileSubrequest, reference.start, length[1].end);
            sub.data1 = pack_subrequest(
                reference.value,
                [file[0].value, file[1].value],
                [record[0].value, record[1].value],
                [length[0].value, length[1].value],
            );
            self.emit(sub);
        }

        self.end_frame(false)
    }

    /// Write File Record (request and response share the body): byte
    /// count, then sub-requests each followed by `record_length` words.
    fn write_file(&mut self, head: &MessageHead, kind: FrameKind) -> Frame {
        let count = self.data_byte();

        let mut header = Frame::new(kind, head.start, count.end);
        header.data1 = pack_head(head, [0; 4], u16::from(count.value));
        self.emit(header);

        let mut consumed: u32 = 0;
        while consumed < u32::from(count.value) {
            let reference = self.data_byte();
            let file = [self.data_byte(), self.data_byte()];
            let record = [self.data_byte(), self.data_byte()];
            let length = [self.data_byte(), self.data_byte()];
            consumed += 7;

            let mut sub = Frame::new(FrameKind::FileSubrequest, reference.start, length[1].end);
            sub.data1 = pack_subrequest(
                reference.value,
                [file[0].value, file[1].value],
                [record[0].value, record[1].value],
                [length[0].value, length[1].value],
            );
            self.emit(sub);

            let record_length = u16::from_be_bytes([length[0].value, length[1].value]);
            for _ in 0..record_length {
                self.emit_word_unit();
                consumed += 2;
            }
        }

        self.end_frame(false)
    }

    /// Mask Write Register: reference address and AND-mask travel in
    /// `data1`, the OR-mask in `data2`. Identical in both directions.
    fn mask_write(&mut self, head: &MessageHead, kind: FrameKind) -> Frame {
        let reference = [self.data_byte().value, self.data_byte().value];
        let and_mask = [self.data_byte().value, self.data_byte().value];
        let or_mask = [self.data_byte().value, self.data_byte().value];

        let mut frame = self.single_frame(
            head,
            kind,
            [reference[0], reference[1], and_mask[0], and_mask[1]],
        );
        frame.data2 = (u64::from(or_mask[0]) << 8) | u64::from(or_mask[1]);
        frame
    }

    /// Read/Write Multiple Registers request: the read window rides in
    /// `data1`, the write window in `data2`, then the write words.
    fn read_write_registers_request(&mut self, head: &MessageHead) -> Frame {
        let read_window = self.read_payload4();
        let write_address = [self.data_byte().value, self.data_byte().value];
        let write_quantity = [self.data_byte().value, self.data_byte().value];
        let count = self.data_byte();

        let mut header = Frame::new(FrameKind::Request, head.start, count.end);
        header.data1 = pack_head(head, read_window, u16::from(count.value));
        header.data2 = (u64::from(write_address[0]) << 24)
            | (u64::from(write_address[1]) << 16)
            | (u64::from(write_quantity[0]) << 8)
            | u64::from(write_quantity[1]);
        self.emit(header);

        for _ in 0..count.value / 2 {
            self.emit_word_unit();
        }

        self.end_frame(false)
    }

    // --- Response side ---

    pub(crate) fn parse_response(&mut self, head: &MessageHead) -> Frame {
        // The top bit of the function code marks a server exception.
        if head.function & 0x80 != 0 {
            let code = self.data_byte();
            let trailer = self.read_checksum_trailer();
            let mut frame = Frame::new(FrameKind::Exception, head.start, trailer.end);
            frame.data1 = pack_head(head, [0, code.value, 0, 0], trailer.field);
            frame.checksum_error = !trailer.ok;
            return frame;
        }

        let Some(shape) = response_shape(head.function) else {
            return self.unknown_header(head, FrameKind::Response);
        };

        match shape {
            ResponseShape::ByteData => self.counted_units(head, DataUnit::Byte),
            ResponseShape::WordData => self.counted_units(head, DataUnit::Word),
            ResponseShape::Echo4 => {
                let payload = self.read_payload4();
                self.single_frame(head, FrameKind::Response, payload)
            }
            ResponseShape::Status1 => {
                let status = self.data_byte();
                self.single_frame(head, FrameKind::Response, [0, status.value, 0, 0])
            }
            ResponseShape::EventLog => self.event_log_response(head),
            ResponseShape::ReadFile => self.read_file_response(head),
            ResponseShape::WriteFile => self.write_file(head, FrameKind::Response),
            ResponseShape::MaskWrite => self.mask_write(head, FrameKind::Response),
            ResponseShape::Fifo => self.fifo_response(head),
        }
    }

    /// Length-prefixed data responses (coil images, register words,
    /// server IDs): header, DATA per unit, END.
    fn counted_units(&mut self, head: &MessageHead, unit: DataUnit) -> Frame {
        let count = self.data_byte();

        let mut header = Frame::new(FrameKind::Response, head.start, count.end);
        header.data1 = pack_head(head, [0; 4], u16::from(count.value));
        self.emit(header);

        match unit {
            DataUnit::Byte => {
                for _ in 0..count.value {
                    self.emit_byte_unit();
                }
            }
            DataUnit::Word => {
                for _ in 0..count.value / 2 {
                    self.emit_word_unit();
                }
            }
        }

        self.end_frame(false)
    }

    /// Get Com Event Log: status in `data1`, event and message counts in
    /// `data2`, then `byte_count - 6` single-byte event records.
    fn event_log_response(&mut self, head: &MessageHead) -> Frame {
        let count = self.data_byte();
        let status = [self.data_byte().value, self.data_byte().value];
        let events = [self.data_byte().value, self.data_byte().value];
        let message_high = self.data_byte();
        let message_low = self.data_byte();

        let mut header = Frame::new(FrameKind::Response, head.start, message_low.end);
        header.data1 = pack_head(head, [status[0], status[1], 0, 0], u16::from(count.value));
        // The data2 layout differs by transport in existing decoded
        // output files; both variants are preserved.
        header.data2 = match self.transport {
            Transport::Rtu => {
                (u64::from(events[1]) << 24)
                    | (u64::from(events[0]) << 16)
                    | (u64::from(message_low.value) << 8)
                    | u64::from(message_high.value)
            }
            Transport::Ascii => {
                (u64::from(events[0]) << 24)
                    | (u64::from(events[1]) << 16)
                    | (u64::from(message_high.value) << 8)
                    | u64::from(message_low.value)
            }
        };
        self.emit(header);

        for _ in 0..count.value.saturating_sub(6) {
            self.emit_byte_unit();
        }

        self.end_frame(false)
    }

    /// Read File Record response: each sub-response is a length, a
    /// reference type, then `length - 1` data bytes paired into words.
    /// An odd data length is malformed: the words that fit are emitted
    /// and the END frame is flagged.
    fn read_file_response(&mut self, head: &MessageHead) -> Frame {
        let count = self.data_byte();

        let mut header = Frame::new(FrameKind::Response, head.start, count.end);
        header.data1 = pack_head(head, [0; 4], u16::from(count.value));
        self.emit(header);

        let mut consumed: u32 = 0;
        let mut malformed = false;
        while consumed < u32::from(count.value) {
            let sub_length = self.data_byte();
            let reference = self.data_byte();
            consumed += 2;

            let mut sub = Frame::new(FrameKind::FileSubrequest, sub_length.start, reference.end);
            sub.data1 = pack_subrequest(reference.value, [0, 0], [0, 0], [0, sub_length.value]);
            self.emit(sub);

            let data_bytes = u32::from(sub_length.value).saturating_sub(1);
            if data_bytes % 2 != 0 {
                malformed = true;
            }
            for _ in 0..data_bytes / 2 {
                self.emit_word_unit();
                consumed += 2;
            }
        }

        self.end_frame(malformed)
    }

    /// Read FIFO Queue response: 16-bit byte count, 16-bit FIFO count
    /// (high wire byte first), then that many register words.
    fn fifo_response(&mut self, head: &MessageHead) -> Frame {
        let count = [self.data_byte().value, self.data_byte().value];
        let fifo_high = self.data_byte();
        let fifo_low = self.data_byte();

        let mut header = Frame::new(FrameKind::Response, head.start, fifo_low.end);
        header.data1 = pack_head(
            head,
            [0, 0, fifo_high.value, fifo_low.value],
            u16::from_be_bytes(count),
        );
        self.emit(header);

        for _ in 0..u16::from_be_bytes([fifo_high.value, fifo_low.value]) {
            self.emit_word_unit();
        }

        self.end_frame(false)
    }
}
