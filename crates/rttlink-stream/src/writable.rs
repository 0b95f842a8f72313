use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use rttlink_transport::{ChannelDirection, RttTransport};
use tokio::io::AsyncWrite;
use tracing::debug;

use crate::config::StreamConfig;
use crate::error::Result;
use crate::session::Session;
use crate::write::WriteBehavior;

/// A down channel exposed as an async byte sink.
pub struct RttWriteStream<T: RttTransport> {
    session: Arc<Session<T>>,
    writer: WriteBehavior<T>,
    closed: bool,
}

impl<T: RttTransport> RttWriteStream<T> {
    /// Start a session on `serial` and bind down channel `down`.
    pub async fn open(
        transport: Arc<T>,
        serial: u32,
        down: u32,
        config: &StreamConfig,
    ) -> Result<Self> {
        let session = Session::open(
            Arc::clone(&transport),
            serial,
            &config.start_options,
            &[(down, ChannelDirection::Down)],
        )
        .await?;
        debug!(serial, channel = down, "opened writable RTT stream");

        Ok(Self {
            writer: WriteBehavior::new(transport, down),
            session,
            closed: false,
        })
    }

    /// Send `data` as one transport write and wait for it to complete.
    pub async fn write_chunk(&mut self, data: impl Into<Bytes>) -> Result<()> {
        self.writer.write_chunk(data.into()).await
    }

    pub fn channel(&self) -> u32 {
        self.writer.channel()
    }

    pub fn session(&self) -> &Arc<Session<T>> {
        &self.session
    }

    /// Wait for the outstanding write, then stop the session.
    ///
    /// The session is stopped even if that write failed; the write error
    /// takes precedence over a stop error.
    pub async fn close(mut self) -> Result<()> {
        self.closed = true;
        let drained = poll_fn(|cx| self.writer.poll_ready(cx)).await;
        self.writer.shutdown();
        let stopped = self.session.stop().await;
        drained.and(stopped)
    }
}

impl<T: RttTransport> AsyncWrite for RttWriteStream<T> {
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

impl<T: RttTransport> Drop for RttWriteStream<T> {
    fn drop(&mut self) {
        if !self.closed {
            self.writer.shutdown();
            self.session.stop_in_background();
        }
    }
}
