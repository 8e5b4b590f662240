//! Line framing for tokio.
//!
//! Lines are terminated by the two-byte sequence `\r\n`; a lone `\r` or `\n`
//! is ordinary payload. Framing problems that only affect one line are
//! yielded as `Err` items so the stream survives them; only transport
//! failures surface as the decoder's error type.

use bytes::{Buf, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;

/// Default line limit, terminator included.
pub const DEFAULT_MAX_LINE_LEN: usize = 512;

const TERMINATOR: &[u8] = b"\r\n";

/// One framed inbound line, or the reason it had to be dropped.
pub type Frame = Result<String, ProtocolError>;

pub struct LineCodec {
    /// Index of next byte to check for the terminator
    next_index: usize,
    max_len: usize,
    /// Bytes thrown away from an over-long line whose end we have not seen yet
    discarded: Option<usize>,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LINE_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
            discarded: None,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(TERMINATOR.len()).position(|w| w == TERMINATOR)
}

impl Decoder for LineCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<Frame>> {
        // Back up one byte: the `\r` may have arrived at the end of the last read.
        let start = self.next_index.saturating_sub(1);

        if let Some(offset) = find_terminator(&src[start..]) {
            let end = start + offset;
            let line = src.split_to(end + TERMINATOR.len());
            self.next_index = 0;

            if let Some(dropped) = self.discarded.take() {
                return Ok(Some(Err(ProtocolError::LineTooLong {
                    actual: dropped + line.len(),
                    limit: self.max_len,
                })));
            }
            if line.len() > self.max_len {
                return Ok(Some(Err(ProtocolError::LineTooLong {
                    actual: line.len(),
                    limit: self.max_len,
                })));
            }

            let text = String::from_utf8_lossy(&line[..end]).into_owned();
            return Ok(Some(Ok(text)));
        }

        if src.len() >= self.max_len {
            // Cannot fit any more; drop what we have but keep a trailing `\r`.
            let keep = usize::from(src.last() == Some(&b'\r'));
            let dropped = src.len() - keep;
            src.advance(dropped);
            self.discarded = Some(self.discarded.unwrap_or(0) + dropped);
        }
        self.next_index = src.len();
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<Frame>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                // An unterminated tail is not a line.
                src.clear();
                self.next_index = 0;
                self.discarded = None;
                Ok(None)
            }
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> io::Result<()> {
        dst.reserve(line.len() + TERMINATOR.len());
        dst.extend_from_slice(line.as_bytes());
        dst.extend_from_slice(TERMINATOR);
        Ok(())
    }
}
