use std::io;

use rttlink_transport::{ChannelDirection, TransportError};

/// Errors that can occur while opening or using an RTT channel stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The session's channel table has no channel with this index and
    /// direction.
    #[error("RTT {direction} channel {index} not found")]
    ChannelNotFound {
        index: u32,
        direction: ChannelDirection,
    },

    /// The transport could not start a session.
    #[error("failed to start RTT session: {0}")]
    StartFailed(#[source] TransportError),

    /// A poll of an up channel failed.
    #[error("read from RTT up channel {channel} failed: {source}")]
    ReadFailed {
        channel: u32,
        #[source]
        source: TransportError,
    },

    /// The read side already failed and will not poll the transport again.
    #[error("read side of RTT up channel {channel} stopped after an earlier error")]
    ReadTerminated { channel: u32 },

    /// A write to a down channel failed.
    #[error("write to RTT down channel {channel} failed: {source}")]
    WriteFailed {
        channel: u32,
        #[source]
        source: TransportError,
    },

    /// The transport reported an error while stopping the session.
    #[error("failed to stop RTT session: {0}")]
    StopFailed(#[source] TransportError),

    /// The write side was shut down.
    #[error("stream closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, StreamError>;

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        let kind = match &err {
            StreamError::ChannelNotFound { .. } => io::ErrorKind::NotFound,
            StreamError::ReadTerminated { .. } | StreamError::Closed => io::ErrorKind::BrokenPipe,
            StreamError::ReadFailed { source, .. }
            | StreamError::WriteFailed { source, .. }
            | StreamError::StartFailed(source)
            | StreamError::StopFailed(source) => match source {
                TransportError::Io(io) => io.kind(),
                TransportError::NotStarted | TransportError::Shutdown => {
                    io::ErrorKind::NotConnected
                }
                _ => io::ErrorKind::Other,
            },
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_keeps_stream_error() {
        let err: io::Error = StreamError::ReadFailed {
            channel: 2,
            source: TransportError::NotStarted,
        }
        .into();

        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        let inner = err
            .get_ref()
            .and_then(|e| e.downcast_ref::<StreamError>())
            .unwrap();
        assert!(matches!(inner, StreamError::ReadFailed { channel: 2, .. }));
    }

    #[test]
    fn channel_not_found_message() {
        let err = StreamError::ChannelNotFound {
            index: 1,
            direction: ChannelDirection::Up,
        };
        assert_eq!(err.to_string(), "RTT up channel 1 not found");
    }
}
