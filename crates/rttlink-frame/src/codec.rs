use bytes::{BufMut, Bytes, BytesMut};

/// Start-of-text marker that opens a PPK command.
pub const STX: u8 = 0x02;

/// Frame delimiter.
pub const ETX: u8 = 0x03;

/// Escape introducer. The following byte is XORed with [`ESCAPE_XOR`].
pub const ESC: u8 = 0x1F;

/// Mask applied to an escaped byte.
pub const ESCAPE_XOR: u8 = 0x20;

/// Default initial capacity of the decoder's carry buffer.
pub const DEFAULT_INITIAL_CAPACITY: usize = 1024;

/// One complete, unescaped frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    /// The unescaped bytes between two delimiters.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the frame carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// The size of this frame on the wire (escaped payload + delimiter).
    pub fn wire_size(&self) -> usize {
        escaped_len(&self.payload) + 1
    }

    /// Interpret a 4-byte frame as a little-endian `f32`.
    ///
    /// The PPK firmware reports average-current measurements this way.
    pub fn as_f32_le(&self) -> Option<f32> {
        let raw: [u8; 4] = self.payload.as_ref().try_into().ok()?;
        Some(f32::from_le_bytes(raw))
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.payload
    }
}

impl From<Bytes> for Frame {
    fn from(payload: Bytes) -> Self {
        Self { payload }
    }
}

/// Whether `byte` has to be escaped on the wire.
pub fn needs_escape(byte: u8) -> bool {
    byte == ETX || byte == ESC
}

/// Number of bytes `payload` occupies once escaped (delimiter excluded).
pub fn escaped_len(payload: &[u8]) -> usize {
    payload.len() + payload.iter().filter(|&&b| needs_escape(b)).count()
}

/// Append the escaped form of `payload` to `dst` without a delimiter.
pub fn escape_into(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(escaped_len(payload));
    for &byte in payload {
        if needs_escape(byte) {
            dst.put_u8(ESC);
            dst.put_u8(byte ^ ESCAPE_XOR);
        } else {
            dst.put_u8(byte);
        }
    }
}

/// Encode one frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────────────────────────────┬──────┐
/// │ Payload, ETX/ESC bytes escaped as  │ ETX  │
/// │ ESC (byte ^ 0x20)                  │ 0x03 │
/// └────────────────────────────────────┴──────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    escape_into(payload, dst);
    dst.put_u8(ETX);
}

/// Configuration for frame decoding.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Initial capacity reserved for the partial-frame carry buffer.
    pub initial_capacity: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}
