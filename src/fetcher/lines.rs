//! Line framing for fetcher output
//!
//! The fetcher writes progress as text lines, but a pipe read can end anywhere
//! inside a line and the output is not guaranteed to be valid UTF-8 (titles in
//! legacy encodings, truncated multi-byte sequences). [`LossyLinesCodec`] buffers
//! partial lines across reads and decodes each complete line lossily.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Splits a byte stream on `\n`, strips a trailing `\r`, decodes lossily
#[derive(Debug, Default, Clone)]
pub struct LossyLinesCodec {
    // Bytes before this offset are known to contain no newline
    next_index: usize,
}

impl LossyLinesCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self::default()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let without_cr = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(without_cr).into_owned()
}

impl Decoder for LossyLinesCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, std::io::Error> {
        let newline = buf[self.next_index..].iter().position(|b| *b == b'\n');
        match newline {
            Some(offset) => {
                let line_end = self.next_index + offset;
                self.next_index = 0;
                let line = buf.split_to(line_end + 1);
                Ok(Some(decode_line(&line[..line_end])))
            }
            None => {
                self.next_index = buf.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, std::io::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        // Final line without a terminator
        self.next_index = 0;
        let rest = buf.split_to(buf.len());
        Ok(Some(decode_line(&rest)))
    }
}
