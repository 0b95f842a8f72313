/// Errors that can occur during frame decoding.
///
/// Decoding a byte stream is total: every byte sequence maps to frames. The
/// only failures are a stream that ends in the middle of an escape sequence
/// and I/O errors from the underlying byte source.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The stream ended right after an escape byte, so the final escaped
    /// byte is missing.
    #[error("stream ended inside an escape sequence ({buffered} bytes buffered)")]
    TruncatedEscape { buffered: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
