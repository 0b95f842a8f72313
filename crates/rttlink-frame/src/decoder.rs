use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::codec::{Frame, FrameConfig, ESC, ESCAPE_XOR, ETX};
use crate::error::{FrameError, Result};

/// Incremental ETX/ESC frame decoder.
///
/// Feed it raw bytes in chunks of any size; it returns every frame completed
/// by that chunk. A chunk that ends mid-frame or right after an escape byte
/// leaves the partial state for the next call, so the split points of the
/// input never change the resulting frames.
#[derive(Debug)]
pub struct FrameDecoder {
    carry: BytesMut,
    escaping: bool,
    flushed: bool,
}

impl FrameDecoder {
    /// Create a decoder with default configuration.
    pub fn new() -> Self {
        Self::with_config(&FrameConfig::default())
    }

    /// Create a decoder with explicit configuration.
    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            carry: BytesMut::with_capacity(config.initial_capacity),
            escaping: false,
            flushed: false,
        }
    }

    /// Decode `bytes`, returning every frame they complete.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Frame> {
        let frames: Vec<Frame> = bytes.iter().filter_map(|&b| self.push(b)).collect();
        trace!(
            input = bytes.len(),
            frames = frames.len(),
            carry = self.carry.len(),
            "fed decoder"
        );
        frames
    }

    /// Consume bytes from `src` up to and including the next delimiter.
    ///
    /// Returns the completed frame, or `None` once `src` is exhausted without
    /// reaching a delimiter (all of it is then carried internally).
    pub fn decode_from(&mut self, src: &mut BytesMut) -> Option<Frame> {
        let mut consumed = 0usize;
        let mut frame = None;
        for &byte in src.iter() {
            consumed += 1;
            if let Some(done) = self.push(byte) {
                frame = Some(done);
                break;
            }
        }
        src.advance(consumed);
        frame
    }

    /// End of stream: emit whatever is buffered as the final frame.
    ///
    /// The first call after input returns the remaining bytes as one frame,
    /// which may be empty. Further calls return `Ok(None)` until more bytes
    /// are fed. A stream that ends right after an escape byte is rejected
    /// with [`FrameError::TruncatedEscape`] and the decoder is reset.
    pub fn flush(&mut self) -> Result<Option<Frame>> {
        if self.flushed {
            return Ok(None);
        }
        self.flushed = true;

        if self.escaping {
            let buffered = self.carry.len();
            self.reset();
            self.flushed = true;
            return Err(FrameError::TruncatedEscape { buffered });
        }

        Ok(Some(Frame::new(self.carry.split().freeze())))
    }

    /// Whether the last byte seen was an unconsumed escape introducer.
    pub fn is_escaping(&self) -> bool {
        self.escaping
    }

    /// Number of unescaped bytes waiting for a delimiter.
    pub fn buffered_len(&self) -> usize {
        self.carry.len()
    }

    /// Drop any partial frame and escape state.
    pub fn reset(&mut self) {
        self.carry.clear();
        self.escaping = false;
        self.flushed = false;
    }

    fn push(&mut self, byte: u8) -> Option<Frame> {
        self.flushed = false;
        if self.escaping {
            self.escaping = false;
            self.carry.extend_from_slice(&[byte ^ ESCAPE_XOR]);
            return None;
        }
        match byte {
            ESC => {
                self.escaping = true;
                None
            }
            ETX => Some(Frame::new(self.carry.split().freeze())),
            _ => {
                self.carry.extend_from_slice(&[byte]);
                None
            }
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
