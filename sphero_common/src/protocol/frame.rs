//! Frame encoding and streaming decode.
//!
//! # Layout
//!
//! ```text
//! START FLAGS [TARGET] [SOURCE] DEVICE COMMAND SEQ PAYLOAD.. CHECKSUM END
//! ```
//!
//! `CHECKSUM = !sum(FLAGS..=last payload byte) & 0xFF`, computed over the
//! unescaped bytes. Every byte between START and END that collides with a
//! reserved value is sent as `ESCAPE, value & !ESCAPE_MASK`.

use super::command::{CommandMessage, Payload};
use super::consts::{
    END, ESCAPE, ESCAPE_MASK, ESCAPED_END, ESCAPED_ESCAPE, ESCAPED_START, MAX_PAYLOAD_LEN,
    MIN_FRAME_LEN, START, is_reserved,
};
use super::ProtocolError;
use bitflags::bitflags;
use tracing::warn;

bitflags! {
    /// Frame flag byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u8 {
        const IS_RESPONSE = 0x01;
        const REQUESTS_RESPONSE = 0x02;
        const REQUESTS_ONLY_ERROR_RESPONSE = 0x04;
        const RESETS_INACTIVITY_TIMEOUT = 0x08;
        const HAS_TARGET_ID = 0x10;
        const HAS_SOURCE_ID = 0x20;
    }
}

/// `!sum(bytes) & 0xFF`.
#[inline]
pub fn checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

fn push_escaped(out: &mut Vec<u8>, byte: u8) {
    if is_reserved(byte) {
        out.push(ESCAPE);
        out.push(byte & !ESCAPE_MASK);
    } else {
        out.push(byte);
    }
}

impl CommandMessage {
    /// Unescaped bytes from FLAGS through the last payload byte.
    ///
    /// The presence bits of the flag byte always reflect `target_id` and
    /// `source_id`.
    pub fn body(&self) -> Vec<u8> {
        let mut flags = self.flags;
        flags.set(Flags::HAS_TARGET_ID, self.target_id.is_some());
        flags.set(Flags::HAS_SOURCE_ID, self.source_id.is_some());

        let mut body = Vec::with_capacity(6 + self.payload.len());
        body.push(flags.bits());
        body.extend(self.target_id);
        body.extend(self.source_id);
        body.push(self.device_id);
        body.push(self.command_id);
        body.push(self.sequence);
        body.extend_from_slice(&self.payload);
        body
    }

    /// Complete wire frame, escaped and delimited.
    pub fn encode(&self) -> Vec<u8> {
        let body = self.body();
        let sum = checksum(&body);
        let mut out = Vec::with_capacity(body.len() * 2 + 4);
        out.push(START);
        for &byte in body.iter().chain(std::iter::once(&sum)) {
            push_escaped(&mut out, byte);
        }
        out.push(END);
        out
    }

    /// Parse an unescaped, checksum-verified body (FLAGS..=last payload byte).
    pub fn parse_body(body: &[u8]) -> Result<Self, ProtocolError> {
        let short = || ProtocolError::FrameTooShort { len: body.len() + 2 };
        let (&flag_byte, mut rest) = body.split_first().ok_or_else(short)?;
        let flags = Flags::from_bits_retain(flag_byte);

        let mut take = |present: bool| -> Result<Option<u8>, ProtocolError> {
            if !present {
                return Ok(None);
            }
            let (&b, tail) = rest.split_first().ok_or_else(short)?;
            rest = tail;
            Ok(Some(b))
        };
        let target_id = take(flags.contains(Flags::HAS_TARGET_ID))?;
        let source_id = take(flags.contains(Flags::HAS_SOURCE_ID))?;
        let device_id = take(true)?.ok_or_else(short)?;
        let command_id = take(true)?.ok_or_else(short)?;
        let sequence = take(true)?.ok_or_else(short)?;

        let payload = Payload::from_slice(rest).map_err(|_| ProtocolError::PayloadTooLong {
            len: rest.len(),
            max: MAX_PAYLOAD_LEN,
        })?;

        Ok(Self {
            flags,
            target_id,
            source_id,
            device_id,
            command_id,
            sequence,
            payload,
        })
    }
}

/// Counters kept by a [`FrameDecoder`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub frames: u64,
    pub dropped: u64,
    pub escape_anomalies: u64,
}

/// Incremental receiver reassembling frames from notification fragments.
///
/// Bytes outside a START..END span are ignored. A dropped frame never
/// affects the frames that follow it.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    in_frame: bool,
    escaped: bool,
    stats: DecoderStats,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard any partial frame.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.in_frame = false;
        self.escaped = false;
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Feed one fragment, returning every frame completed by it.
    pub fn feed(&mut self, fragment: &[u8]) -> Vec<Result<CommandMessage, ProtocolError>> {
        fragment.iter().filter_map(|&b| self.push(b)).collect()
    }

    /// Feed a single byte; returns `Some` when END closes a frame.
    pub fn push(&mut self, byte: u8) -> Option<Result<CommandMessage, ProtocolError>> {
        match byte {
            START => {
                self.reset();
                self.in_frame = true;
                self.buffer.push(START);
                None
            }
            END => {
                if !self.in_frame {
                    return None;
                }
                let result = self.finish();
                match &result {
                    Ok(_) => self.stats.frames += 1,
                    Err(_) => self.stats.dropped += 1,
                }
                self.reset();
                Some(result)
            }
            _ if !self.in_frame => None,
            ESCAPE => {
                self.escaped = true;
                None
            }
            ESCAPED_ESCAPE | ESCAPED_START | ESCAPED_END if self.escaped => {
                self.buffer.push(byte | ESCAPE_MASK);
                self.escaped = false;
                None
            }
            _ => {
                if self.escaped {
                    // Kept verbatim and the escape stays armed.
                    self.stats.escape_anomalies += 1;
                    warn!(byte, "unexpected byte after escape");
                }
                self.buffer.push(byte);
                None
            }
        }
    }

    fn finish(&self) -> Result<CommandMessage, ProtocolError> {
        let len = self.buffer.len();
        if len < MIN_FRAME_LEN {
            return Err(ProtocolError::FrameTooShort { len: len + 1 });
        }
        let body = &self.buffer[1..len - 1];
        let actual = self.buffer[len - 1];
        let expected = checksum(body);
        if expected != actual {
            return Err(ProtocolError::ChecksumMismatch { expected, actual });
        }
        CommandMessage::parse_body(body)
    }
}
