//! ETX/ESC byte-stuffed framing for RTT byte streams.
//!
//! This is the wire format spoken by the Power Profiler Kit firmware over
//! RTT (the "PPK line protocol"). A frame is every byte up to an `ETX`
//! (`0x03`) delimiter; literal `ETX` and `ESC` (`0x1F`) bytes inside a
//! payload are sent as `ESC, byte ^ 0x20`.
//!
//! - [`FrameDecoder`] turns arbitrarily chunked bytes into frames
//! - [`encode_frame`] produces the wire form of one payload
//! - [`FrameReader`] / [`FrameWriter`] work over blocking `Read` / `Write`
//! - `PpkCodec` (feature `async`) plugs into `tokio_util::codec`

pub mod codec;
pub mod decoder;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use codec::{
    encode_frame, escape_into, escaped_len, needs_escape, Frame, FrameConfig,
    DEFAULT_INITIAL_CAPACITY, ESC, ESCAPE_XOR, ETX, STX,
};
pub use decoder::FrameDecoder;
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use async_codec::PpkCodec;
