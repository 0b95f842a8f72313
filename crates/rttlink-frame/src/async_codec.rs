//! `tokio_util::codec` integration.
//!
//! Wrap any `AsyncRead` carrying PPK line protocol bytes in
//! `FramedRead::new(stream, PpkCodec::new())` to get a `Stream` of frames,
//! or an `AsyncWrite` in `FramedWrite` to send escaped frames.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, Frame, FrameConfig};
use crate::decoder::FrameDecoder;
use crate::error::FrameError;

/// Codec for ETX/ESC framed byte streams.
#[derive(Debug, Default)]
pub struct PpkCodec {
    decoder: FrameDecoder,
}

impl PpkCodec {
    /// Create a codec with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with explicit configuration.
    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            decoder: FrameDecoder::with_config(config),
        }
    }
}

impl Decoder for PpkCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        Ok(self.decoder.decode_from(src))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        if let Some(frame) = self.decoder.decode_from(src) {
            return Ok(Some(frame));
        }
        self.decoder.flush()
    }
}

impl Encoder<Bytes> for PpkCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_frame(&item, dst);
        Ok(())
    }
}

impl Encoder<Frame> for PpkCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_frame(&item.payload, dst);
        Ok(())
    }
}
