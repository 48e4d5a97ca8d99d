//! Newline-delimited JSON frame reassembly.
//!
//! The remote chat server writes one JSON value per line. TCP delivers those
//! lines in arbitrary chunks, so [`FrameDecoder`] buffers raw bytes and only
//! decodes a line once its `\n` delimiter has arrived. Decoding after the
//! delimiter (never per chunk) is what keeps multi-byte UTF-8 sequences that
//! straddle a chunk boundary intact.

use bytes::BytesMut;
use serde_json::Value;
use tracing::debug;

/// Incremental decoder for one connection's inbound byte stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
    /// Bytes at the front of `buf` already known to contain no delimiter.
    scanned: usize,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and iterate over every frame it completes.
    ///
    /// The iterator is lazy: frames are decoded as it is advanced. Bytes after
    /// the last delimiter stay buffered for the next call. Dropping the
    /// iterator early leaves unread complete lines buffered as well.
    pub fn feed(&mut self, chunk: &[u8]) -> Frames<'_> {
        self.buf.extend_from_slice(chunk);
        Frames { decoder: self }
    }

    /// Number of bytes waiting for a delimiter.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn next_frame(&mut self) -> Option<Value> {
        loop {
            let Some(offset) = self.buf[self.scanned..].iter().position(|&b| b == b'\n') else {
                self.scanned = self.buf.len();
                return None;
            };
            let end = self.scanned + offset;
            let line = self.buf.split_to(end + 1);
            self.scanned = 0;

            let text = match std::str::from_utf8(&line[..end]) {
                Ok(text) => text.trim(),
                Err(e) => {
                    debug!(error = %e, len = end, "Dropping non-UTF-8 frame");
                    continue;
                }
            };
            if text.is_empty() {
                continue;
            }

            match serde_json::from_str(text) {
                Ok(value) => return Some(value),
                Err(e) => {
                    debug!(error = %e, len = end, "Dropping malformed frame");
                }
            }
        }
    }
}

/// Lazy sequence of frames produced by [`FrameDecoder::feed`].
#[derive(Debug)]
pub struct Frames<'a> {
    decoder: &'a mut FrameDecoder,
}

impl Iterator for Frames<'_> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.decoder.next_frame()
    }
}
