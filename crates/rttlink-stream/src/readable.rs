use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use rttlink_frame::PpkCodec;
use rttlink_transport::{ChannelDirection, RttTransport};
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::codec::FramedRead;
use tracing::debug;

use crate::config::StreamConfig;
use crate::error::Result;
use crate::read::ReadBehavior;
use crate::session::Session;

/// An up channel exposed as an async byte source.
///
/// Reads poll the transport and never yield an empty chunk; the stream has
/// no end of its own and runs until it is closed or dropped.
pub struct RttReadStream<T: RttTransport> {
    session: Arc<Session<T>>,
    reader: ReadBehavior<T>,
    closed: bool,
}

impl<T: RttTransport> RttReadStream<T> {
    /// Start a session on `serial` and bind up channel `up`.
    pub async fn open(
        transport: Arc<T>,
        serial: u32,
        up: u32,
        config: &StreamConfig,
    ) -> Result<Self> {
        let session = Session::open(
            Arc::clone(&transport),
            serial,
            &config.start_options,
            &[(up, ChannelDirection::Up)],
        )
        .await?;
        debug!(serial, channel = up, "opened readable RTT stream");

        Ok(Self {
            reader: ReadBehavior::new(transport, up, config.max_read_size, config.retry_delay),
            session,
            closed: false,
        })
    }

    /// Next non-empty chunk from the channel.
    pub async fn read_chunk(&mut self) -> Result<Bytes> {
        self.reader.read_chunk().await
    }

    /// Decode the byte stream into PPK frames.
    pub fn frames(self) -> FramedRead<Self, PpkCodec> {
        FramedRead::new(self, PpkCodec::new())
    }

    pub fn channel(&self) -> u32 {
        self.reader.channel()
    }

    pub fn session(&self) -> &Arc<Session<T>> {
        &self.session
    }

    /// Whether the reader is waiting out a retry delay after an empty read.
    pub fn is_retry_armed(&self) -> bool {
        self.reader.is_retry_armed()
    }

    /// Cancel any pending retry and stop the session.
    pub async fn close(mut self) -> Result<()> {
        self.closed = true;
        self.reader.shutdown();
        self.session.stop().await
    }
}

impl<T: RttTransport> AsyncRead for RttReadStream<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.get_mut().reader.poll_read(cx, buf).map_err(io::Error::from)
    }
}

impl<T: RttTransport> Drop for RttReadStream<T> {
    fn drop(&mut self) {
        if !self.closed {
            self.reader.shutdown();
            self.session.stop_in_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::StreamExt;
    use rttlink_transport::{ChannelDescriptor, ChannelTable, MemoryTransport};
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::error::StreamError;
    use crate::session::SessionState;

    fn transport() -> Arc<MemoryTransport> {
        Arc::new(MemoryTransport::new(ChannelTable::new(vec![
            ChannelDescriptor::new(0, ChannelDirection::Up, "Terminal", 1024),
            ChannelDescriptor::new(1, ChannelDirection::Up, "PPK", 4096),
            ChannelDescriptor::new(0, ChannelDirection::Down, "Terminal", 16),
        ])))
    }

    #[tokio::test(start_paused = true)]
    async fn async_read_skips_empty_polls() {
        let t = transport();
        let mut stream = RttReadStream::open(Arc::clone(&t), 7, 1, &StreamConfig::default())
            .await
            .unwrap();
        t.queue_empty_polls(1, 5);
        t.push_up(1, &b"data"[..]);

        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).await.unwrap();

        assert_eq!(&buf[..n], b"data");
        assert_eq!(t.read_calls(), 6);
        assert_eq!(t.peak_reads_in_flight(), 1);
        stream.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn close_cancels_armed_retry() {
        let t = transport();
        let config = StreamConfig {
            retry_delay: Duration::from_millis(5),
            ..StreamConfig::default()
        };
        let mut stream = RttReadStream::open(Arc::clone(&t), 7, 0, &config)
            .await
            .unwrap();
        t.queue_empty_polls(0, 10);

        let read = tokio::time::timeout(Duration::from_millis(2), stream.read_chunk()).await;
        assert!(read.is_err());
        assert!(stream.is_retry_armed());
        assert_eq!(t.read_calls(), 1);

        stream.close().await.unwrap();
        for _ in 0..3 {
            tokio::time::advance(Duration::from_millis(10)).await;
        }
        assert_eq!(t.read_calls(), 1);
        assert_eq!(t.stop_calls(), 1);
    }

    #[tokio::test]
    async fn down_only_channel_is_rejected() {
        let t = transport();
        let err = RttReadStream::open(Arc::clone(&t), 7, 2, &StreamConfig::default())
            .await
            .err()
            .unwrap();

        assert!(matches!(
            err,
            StreamError::ChannelNotFound {
                index: 2,
                direction: ChannelDirection::Up
            }
        ));
        assert_eq!(t.stop_calls(), 1);
    }

    #[tokio::test]
    async fn frames_are_decoded_across_chunks() {
        let t = transport();
        let stream = RttReadStream::open(Arc::clone(&t), 7, 0, &StreamConfig::default())
            .await
            .unwrap();
        t.push_up(0, vec![0x41, 0x1F]);
        t.push_up(0, vec![0x23, 0x03, 0x42]);
        t.push_up(0, vec![0x03]);

        let mut frames = stream.frames();
        let first = frames.next().await.unwrap().unwrap();
        let second = frames.next().await.unwrap().unwrap();

        assert_eq!(first.payload.as_ref(), &[0x41, 0x03]);
        assert_eq!(second.payload.as_ref(), &[0x42]);
    }

    #[tokio::test]
    async fn read_error_surfaces_as_io_error() {
        let t = transport();
        let mut stream = RttReadStream::open(Arc::clone(&t), 7, 0, &StreamConfig::default())
            .await
            .unwrap();
        t.fail_next_read("target reset");

        let mut buf = [0u8; 8];
        let err = stream.read(&mut buf).await.unwrap_err();
        let inner = err
            .get_ref()
            .and_then(|e| e.downcast_ref::<StreamError>())
            .unwrap();
        assert!(matches!(inner, StreamError::ReadFailed { channel: 0, .. }));

        // Read errors do not stop the session by themselves.
        assert_eq!(t.stop_calls(), 0);
        stream.close().await.unwrap();
        assert_eq!(t.stop_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_stops_session_in_background() {
        let t = transport();
        let stream = RttReadStream::open(Arc::clone(&t), 7, 0, &StreamConfig::default())
            .await
            .unwrap();
        let session = Arc::clone(stream.session());

        drop(stream);
        while session.state() != SessionState::Stopped {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(t.stop_calls(), 1);
    }

    #[tokio::test]
    async fn close_surfaces_stop_error() {
        let t = transport();
        let stream = RttReadStream::open(Arc::clone(&t), 7, 0, &StreamConfig::default())
            .await
            .unwrap();
        t.fail_next_stop("usb error");

        assert!(matches!(
            stream.close().await,
            Err(StreamError::StopFailed(_))
        ));
        assert_eq!(t.stop_calls(), 1);
    }
}
