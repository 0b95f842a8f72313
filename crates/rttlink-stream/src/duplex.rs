use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use rttlink_frame::PpkCodec;
use rttlink_transport::{ChannelDirection, RttTransport};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_util::codec::Framed;
use tracing::debug;

use crate::config::StreamConfig;
use crate::error::Result;
use crate::read::ReadBehavior;
use crate::session::Session;
use crate::write::WriteBehavior;

/// An up channel and a down channel of one session exposed as a single
/// bidirectional stream.
///
/// The two indices are validated independently and may be equal. Both
/// halves share the session, so closing or dropping the stream stops it
/// once.
pub struct RttDuplexStream<T: RttTransport> {
    session: Arc<Session<T>>,
    reader: ReadBehavior<T>,
    writer: WriteBehavior<T>,
    closed: bool,
}

impl<T: RttTransport> RttDuplexStream<T> {
    /// Start a session on `serial`, reading from `up` and writing to `down`.
    pub async fn open(
        transport: Arc<T>,
        serial: u32,
        up: u32,
        down: u32,
        config: &StreamConfig,
    ) -> Result<Self> {
        let session = Session::open(
            Arc::clone(&transport),
            serial,
            &config.start_options,
            &[(up, ChannelDirection::Up), (down, ChannelDirection::Down)],
        )
        .await?;
        debug!(serial, up, down, "opened duplex RTT stream");

        Ok(Self {
            reader: ReadBehavior::new(
                Arc::clone(&transport),
                up,
                config.max_read_size,
                config.retry_delay,
            ),
            writer: WriteBehavior::new(transport, down),
            session,
            closed: false,
        })
    }

    pub async fn read_chunk(&mut self) -> Result<Bytes> {
        self.reader.read_chunk().await
    }

    pub async fn write_chunk(&mut self, data: impl Into<Bytes>) -> Result<()> {
        self.writer.write_chunk(data.into()).await
    }

    /// Frame both directions with the PPK line protocol.
    pub fn framed(self) -> Framed<Self, PpkCodec> {
        Framed::new(self, PpkCodec::new())
    }

    /// `(up, down)` channel indices.
    pub fn channels(&self) -> (u32, u32) {
        (self.reader.channel(), self.writer.channel())
    }

    pub fn session(&self) -> &Arc<Session<T>> {
        &self.session
    }

    /// Drain the outstanding write, cancel reading and stop the session.
    pub async fn close(mut self) -> Result<()> {
        self.closed = true;
        let drained = poll_fn(|cx| self.writer.poll_ready(cx)).await;
        self.reader.shutdown();
        self.writer.shutdown();
        let stopped = self.session.stop().await;
        drained.and(stopped)
    }
}

impl<T: RttTransport> AsyncRead for RttDuplexStream<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.get_mut().reader.poll_read(cx, buf).map_err(io::Error::from)
    }
}

impl<T: RttTransport> AsyncWrite for RttDuplexStream<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.get_mut().writer.poll_write(cx, buf).map_err(io::Error::from)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().writer.poll_flush(cx).map_err(io::Error::from)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().writer.poll_shutdown(cx).map_err(io::Error::from)
    }
}

impl<T: RttTransport> Drop for RttDuplexStream<T> {
    fn drop(&mut self) {
        if !self.closed {
            self.reader.shutdown();
            self.writer.shutdown();
            self.session.stop_in_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use rttlink_frame::Frame;
    use rttlink_transport::{ChannelTable, MemoryTransport};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::error::StreamError;
    use crate::session::SessionState;

    fn transport() -> Arc<MemoryTransport> {
        Arc::new(MemoryTransport::new(ChannelTable::from_parts(
            [("Terminal".to_string(), 1024), ("PPK".to_string(), 4096)],
            [("Terminal".to_string(), 16), ("PPK".to_string(), 16)],
        )))
    }

    #[tokio::test(start_paused = true)]
    async fn both_halves_share_one_session() {
        let t = transport();
        let mut stream = RttDuplexStream::open(Arc::clone(&t), 9, 1, 1, &StreamConfig::default())
            .await
            .unwrap();
        assert_eq!(stream.channels(), (1, 1));

        stream.write_all(b"\x02\x06\x03").await.unwrap();
        t.queue_empty_polls(1, 2);
        t.push_up(1, &b"ok"[..]);

        let mut buf = [0u8; 8];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ok");

        stream.close().await.unwrap();
        assert_eq!(t.start_calls(), 1);
        assert_eq!(t.stop_calls(), 1);
        assert_eq!(t.written(1), vec![Bytes::from_static(b"\x02\x06\x03")]);
    }

    #[tokio::test]
    async fn either_invalid_index_fails_and_stops() {
        let t = transport();

        let err = RttDuplexStream::open(Arc::clone(&t), 9, 2, 0, &StreamConfig::default())
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

        let err = RttDuplexStream::open(Arc::clone(&t), 9, 0, 5, &StreamConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            StreamError::ChannelNotFound {
                index: 5,
                direction: ChannelDirection::Down
            }
        ));

        assert_eq!(t.start_calls(), 2);
        assert_eq!(t.stop_calls(), 2);
        assert_eq!(t.write_calls() + t.read_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_with_both_halves_active_stops_once() {
        let t = transport();
        let mut stream = RttDuplexStream::open(Arc::clone(&t), 9, 0, 0, &StreamConfig::default())
            .await
            .unwrap();
        let session = Arc::clone(stream.session());

        // Write once, then leave the read side waiting on a retry.
        assert_eq!(stream.write(b"abc").await.unwrap(), 3);
        let read = tokio::time::timeout(Duration::from_millis(20), stream.read_chunk()).await;
        assert!(read.is_err());

        drop(stream);
        while session.state() != SessionState::Stopped {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(t.stop_calls(), 1);
    }

    #[tokio::test]
    async fn framed_round_trip_over_loopback() {
        let t = transport();
        let stream = RttDuplexStream::open(Arc::clone(&t), 9, 0, 0, &StreamConfig::default())
            .await
            .unwrap();
        let mut framed = stream.framed();

        framed
            .send(Frame::new(Bytes::from_static(&[0x1F, 0x03, 0x7A])))
            .await
            .unwrap();
        let wire = t.written(0).concat();
        assert_eq!(wire, vec![0x1F, 0x3F, 0x1F, 0x23, 0x7A, 0x03]);

        t.push_up(0, wire);
        let frame = framed.next().await.unwrap().unwrap();
        assert_eq!(frame.payload.as_ref(), &[0x1F, 0x03, 0x7A]);
    }
}
