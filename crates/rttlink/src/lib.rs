//! RTT channel streams and PPK line framing for debug probes.
//!
//! rttlink turns the multiplexed RTT channels of a debug probe session into
//! async byte streams, and decodes the ETX/ESC framed protocol spoken over
//! them by Power Profiler Kit firmware.
//!
//! # Crate Structure
//!
//! - [`transport`]: the probe driver seam (`RttTransport`) and channel tables
//! - [`frame`]: ETX/ESC frame decoding and encoding
//! - [`stream`]: readable, writable and duplex channel streams (behind the
//!   `stream` feature)

/// Re-export transport types.
pub mod transport {
    pub use rttlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use rttlink_frame::*;
}

/// Re-export stream types (requires `stream` feature).
#[cfg(feature = "stream")]
pub mod stream {
    pub use rttlink_stream::*;
}
