//! Newline-delimited framing for the TCPR wire format.
//!
//! TCPR is a plain text protocol: every message is a single line terminated
//! by `\n`. [`LineCodec`] implements both directions for use with
//! [`FramedRead`](tokio_util::codec::FramedRead) and
//! [`FramedWrite`](tokio_util::codec::FramedWrite). Decoded lines have
//! their delimiter (and an optional preceding `\r`) removed; encoded
//! messages are validated and get exactly one `\n` appended.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{ProtocolError, Result};

/// Maximum accepted line length in bytes, delimiter included.
///
/// Script output relayed over TCPR can get long, but anything past this is
/// either a runaway script or a peer that is not speaking the protocol.
pub const MAX_LINE_LEN: usize = 16 * 1024;

/// Codec for `\n`-delimited TCPR messages.
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Index into the read buffer where the scan for the next delimiter
    /// should resume, so unframed bytes are not rescanned on every poll.
    next_index: usize,
    max_len: usize,
}

impl LineCodec {
    /// Creates a codec with the default [`MAX_LINE_LEN`] limit.
    pub fn new() -> Self {
        Self::with_max_len(MAX_LINE_LEN)
    }

    /// Creates a codec with a custom line length limit.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
        }
    }

    /// Validates an outbound message and returns it with trailing
    /// delimiters trimmed.
    ///
    /// A message may not be empty and may not contain an empty interior
    /// line, since the server would interpret the latter as a separate
    /// blank command. Trailing `\n`s are forgiven because the framing
    /// layer owns the delimiter.
    fn validate(message: &str) -> Result<&str> {
        let trimmed = message.trim_end_matches('\n');
        if trimmed.is_empty() {
            return Err(ProtocolError::InvalidMessage {
                reason: "empty message",
            });
        }
        if trimmed.split('\n').any(str::is_empty) {
            return Err(ProtocolError::InvalidMessage {
                reason: "contains an empty line",
            });
        }
        Ok(trimmed)
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        if let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') {
            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if line.len() > self.max_len {
                return Err(ProtocolError::MessageTooLong {
                    actual: line.len(),
                    limit: self.max_len,
                });
            }

            let mut text = String::from_utf8(line.to_vec())?;
            text.pop();
            if text.ends_with('\r') {
                text.pop();
            }
            Ok(Some(text))
        } else {
            self.next_index = src.len();
            if src.len() > self.max_len {
                return Err(ProtocolError::MessageTooLong {
                    actual: src.len(),
                    limit: self.max_len,
                });
            }
            Ok(None)
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, message: String, dst: &mut BytesMut) -> Result<()> {
        let line = Self::validate(&message)?;
        dst.reserve(line.len() + 1);
        dst.extend_from_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut LineCodec, src: &mut BytesMut) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(line) = codec.decode(src).unwrap() {
            out.push(line);
        }
        out
    }

    #[test]
    fn decodes_complete_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("hello world\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("hello world"));
        assert!(buf.is_empty());
    }

    #[test]
    fn strips_carriage_return() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("hello\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("hello"));
    }

    #[test]
    fn holds_partial_line_until_delimiter_arrives() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("partial");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b" line\nnext");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("partial line"));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(&buf[..], b"next");
    }

    #[test]
    fn decodes_multiple_buffered_lines() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("one\ntwo\nthree\n");
        assert_eq!(decode_all(&mut codec, &mut buf), ["one", "two", "three"]);
    }

    #[test]
    fn preserves_empty_inbound_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some(""));
    }

    #[test]
    fn rejects_overlong_line() {
        let mut codec = LineCodec::with_max_len(8);
        let mut buf = BytesMut::from("exceeds the limit\n");
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MessageTooLong { actual: 18, limit: 8 }
        ));
    }

    #[test]
    fn rejects_overlong_partial_line() {
        let mut codec = LineCodec::with_max_len(8);
        let mut buf = BytesMut::from("no delimiter yet");
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, ProtocolError::MessageTooLong { .. }));
    }

    #[test]
    fn rejects_invalid_utf8() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&[0xff, 0xfe, b'\n'][..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn encodes_with_single_delimiter() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        codec.encode("hello".to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"hello\n");
    }

    #[test]
    fn trims_trailing_delimiters_before_framing() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        codec.encode("hello\n\n\n".to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"hello\n");
    }

    #[test]
    fn encodes_multi_line_frame() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        codec.encode("first\nsecond".to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"first\nsecond\n");
    }

    #[test]
    fn rejects_empty_message() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        for bad in ["", "\n", "\n\n"] {
            let err = codec.encode(bad.to_string(), &mut buf).unwrap_err();
            assert!(matches!(err, ProtocolError::InvalidMessage { .. }), "input {bad:?}");
            assert!(buf.is_empty(), "input {bad:?} left bytes in the buffer");
        }
    }

    #[test]
    fn rejects_interior_empty_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        let err = codec.encode("first\n\nsecond".to_string(), &mut buf).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidMessage {
                reason: "contains an empty line"
            }
        ));
        assert!(buf.is_empty());
    }
}
