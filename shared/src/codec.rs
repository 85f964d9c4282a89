//! Line codec for the pin daemon protocol
//!
//! Every command is a single line of plain text:
//! ```text
//! set_output <pin> <pin> ...\n
//! set_fallback_timeout <seconds>\n
//! ```
//!
//! The same line framing is used for inbound control messages.

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use thiserror::Error;

use crate::PinId;

/// Maximum line length accepted by [`LineDecoder`]
pub const MAX_LINE_LENGTH: usize = 4096;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Line too long: {0} bytes (max: {MAX_LINE_LENGTH})")]
    LineTooLong(usize),

    #[error("Line is not valid UTF-8")]
    InvalidUtf8,

    #[error("Unknown daemon command: {0:?}")]
    UnknownCommand(String),

    #[error("Invalid argument {argument:?} for {command}")]
    InvalidArgument { command: &'static str, argument: String },
}

/// A command understood by the pin daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonCommand {
    /// Drive exactly these pins, release all others
    SetOutput(Vec<PinId>),
    /// Revert to a safe state if no command arrives within this many seconds
    SetFallbackTimeout(u32),
}

impl DaemonCommand {
    const SET_OUTPUT: &'static str = "set_output";
    const SET_FALLBACK_TIMEOUT: &'static str = "set_fallback_timeout";

    /// Parse a single line (without terminator)
    pub fn parse(line: &str) -> Result<Self, CodecError> {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some(Self::SET_OUTPUT) => {
                let pins = parts
                    .map(|p| {
                        p.parse::<PinId>().map_err(|_| CodecError::InvalidArgument {
                            command: Self::SET_OUTPUT,
                            argument: p.to_string(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(DaemonCommand::SetOutput(pins))
            }
            Some(Self::SET_FALLBACK_TIMEOUT) => {
                let arg = parts.next().unwrap_or_default();
                let secs = arg.parse::<u32>().map_err(|_| CodecError::InvalidArgument {
                    command: Self::SET_FALLBACK_TIMEOUT,
                    argument: arg.to_string(),
                })?;
                Ok(DaemonCommand::SetFallbackTimeout(secs))
            }
            _ => Err(CodecError::UnknownCommand(line.to_string())),
        }
    }
}

impl fmt::Display for DaemonCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // The keyword is always followed by a space, even with no pins
            DaemonCommand::SetOutput(pins) => {
                write!(f, "{} ", Self::SET_OUTPUT)?;
                for (i, pin) in pins.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", pin)?;
                }
                Ok(())
            }
            DaemonCommand::SetFallbackTimeout(secs) => {
                write!(f, "{} {}", Self::SET_FALLBACK_TIMEOUT, secs)
            }
        }
    }
}

/// Encode a command as a newline-terminated line
pub fn encode(command: &DaemonCommand) -> Bytes {
    let mut buf = BytesMut::new();
    encode_into(command, &mut buf);
    buf.freeze()
}

/// Encode a command directly into a provided buffer
pub fn encode_into(command: &DaemonCommand, buf: &mut BytesMut) {
    let line = command.to_string();
    buf.reserve(line.len() + 1);
    buf.put_slice(line.as_bytes());
    buf.put_u8(b'\n');
}

/// Streaming decoder splitting a byte stream into text lines
#[derive(Debug, Default)]
pub struct LineDecoder {
    /// Partial line data being accumulated
    buffer: BytesMut,
}

impl LineDecoder {
    /// Create a new line decoder
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
        }
    }

    /// Add data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next complete line
    ///
    /// Returns `Ok(None)` when more data is needed. A trailing `\r` is
    /// stripped.
    pub fn decode_next(&mut self) -> Result<Option<String>, CodecError> {
        let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') else {
            if self.buffer.len() > MAX_LINE_LENGTH {
                return Err(CodecError::LineTooLong(self.buffer.len()));
            }
            return Ok(None);
        };

        if pos > MAX_LINE_LENGTH {
            return Err(CodecError::LineTooLong(pos));
        }

        let mut line = self.buffer.split_to(pos + 1);
        line.truncate(pos);
        if line.last() == Some(&b'\r') {
            line.truncate(pos - 1);
        }

        String::from_utf8(line.to_vec())
            .map(Some)
            .map_err(|_| CodecError::InvalidUtf8)
    }

    /// Drain an unterminated final line once the stream has ended
    pub fn finish(&mut self) -> Result<Option<String>, CodecError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        self.buffer.put_u8(b'\n');
        self.decode_next()
    }

    /// Get the current buffer length (for debugging)
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_set_output() {
        let encoded = encode(&DaemonCommand::SetOutput(vec![26, 23, 21]));
        assert_eq!(&encoded[..], b"set_output 26 23 21\n");
    }

    #[test]
    fn test_encode_empty_output_keeps_separator() {
        let encoded = encode(&DaemonCommand::SetOutput(Vec::new()));
        assert_eq!(&encoded[..], b"set_output \n");
    }

    #[test]
    fn test_encode_fallback_timeout() {
        let encoded = encode(&DaemonCommand::SetFallbackTimeout(15));
        assert_eq!(&encoded[..], b"set_fallback_timeout 15\n");
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            DaemonCommand::parse("set_output 24 19"),
            Ok(DaemonCommand::SetOutput(vec![24, 19]))
        );
        assert_eq!(
            DaemonCommand::parse("set_output "),
            Ok(DaemonCommand::SetOutput(Vec::new()))
        );
        assert_eq!(
            DaemonCommand::parse("set_fallback_timeout 15"),
            Ok(DaemonCommand::SetFallbackTimeout(15))
        );
        assert!(matches!(
            DaemonCommand::parse("set_output 26 x"),
            Err(CodecError::InvalidArgument { .. })
        ));
        assert!(matches!(
            DaemonCommand::parse("set_fallback_timeout"),
            Err(CodecError::InvalidArgument { .. })
        ));
        assert!(matches!(
            DaemonCommand::parse("blink 26"),
            Err(CodecError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_line_decoder_partial() {
        let mut decoder = LineDecoder::new();

        decoder.extend(b"both-for");
        assert_eq!(decoder.decode_next(), Ok(None));

        decoder.extend(b"ward\r\nstop\n");
        assert_eq!(decoder.decode_next(), Ok(Some("both-forward".into())));
        assert_eq!(decoder.decode_next(), Ok(Some("stop".into())));
        assert_eq!(decoder.decode_next(), Ok(None));
        assert_eq!(decoder.buffer_len(), 0);
    }

    #[test]
    fn test_line_decoder_finish() {
        let mut decoder = LineDecoder::new();
        decoder.extend(b"turret-left");
        assert_eq!(decoder.decode_next(), Ok(None));
        assert_eq!(decoder.finish(), Ok(Some("turret-left".into())));
        assert_eq!(decoder.finish(), Ok(None));
    }

    #[test]
    fn test_line_too_long() {
        let mut decoder = LineDecoder::new();
        decoder.extend(&vec![b'a'; MAX_LINE_LENGTH + 1]);
        assert!(matches!(decoder.decode_next(), Err(CodecError::LineTooLong(_))));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut decoder = LineDecoder::new();
        decoder.extend(&[0xff, 0xfe, b'\n']);
        assert_eq!(decoder.decode_next(), Err(CodecError::InvalidUtf8));
    }
}
