//! Push side of a channel stream: one transport write per chunk.

use std::future::poll_fn;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures_core::future::BoxFuture;
use rttlink_transport::{self as transport, RttTransport};
use tracing::{debug, trace};

use crate::error::{Result, StreamError};

/// Write behavior bound to one validated down channel.
///
/// Writes are serialized: a new transport write is only issued once the
/// previous one has completed. Failed writes are not retried and do not
/// close the behavior.
pub struct WriteBehavior<T> {
    transport: Arc<T>,
    channel: u32,
    pending: Option<BoxFuture<'static, transport::Result<()>>>,
    /// Length of the chunk `poll_write` is waiting on, if any.
    in_flight_len: Option<usize>,
    closed: bool,
}

impl<T: RttTransport> WriteBehavior<T> {
    pub fn new(transport: Arc<T>, channel: u32) -> Self {
        Self {
            transport,
            channel,
            pending: None,
            in_flight_len: None,
            closed: false,
        }
    }

    /// Drive the outstanding write, if any, to completion.
    pub fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        let Some(pending) = self.pending.as_mut() else {
            return Poll::Ready(Ok(()));
        };
        let result = ready!(pending.as_mut().poll(cx));
        self.pending = None;
        self.in_flight_len = None;
        Poll::Ready(result.map_err(|source| {
            debug!(channel = self.channel, error = %source, "RTT write failed");
            StreamError::WriteFailed {
                channel: self.channel,
                source,
            }
        }))
    }

    fn start_write(&mut self, data: Bytes) {
        trace!(channel = self.channel, len = data.len(), "RTT write");
        let transport = Arc::clone(&self.transport);
        let channel = self.channel;
        self.pending = Some(Box::pin(async move { transport.write(channel, data).await }));
    }

    /// Forward `data` as exactly one transport write and wait for it.
    pub async fn write_chunk(&mut self, data: Bytes) -> Result<()> {
        poll_fn(|cx| self.poll_ready(cx)).await?;
        if self.closed {
            return Err(StreamError::Closed);
        }
        self.start_write(data);
        poll_fn(|cx| self.poll_ready(cx)).await
    }

    /// `AsyncWrite` adapter.
    ///
    /// Returns `Pending` until the chunk's transport write completes, so the
    /// count and any [`StreamError::WriteFailed`] belong to this chunk. A
    /// caller that is re-polled after `Pending` gets the result of the chunk
    /// already in flight; `data` is not sent a second time.
    pub fn poll_write(&mut self, cx: &mut Context<'_>, data: &[u8]) -> Poll<Result<usize>> {
        if let Some(len) = self.in_flight_len {
            ready!(self.poll_ready(cx))?;
            return Poll::Ready(Ok(len));
        }

        ready!(self.poll_ready(cx))?;
        if self.closed {
            return Poll::Ready(Err(StreamError::Closed));
        }
        if data.is_empty() {
            return Poll::Ready(Ok(0));
        }

        self.start_write(Bytes::copy_from_slice(data));
        self.in_flight_len = Some(data.len());
        ready!(self.poll_ready(cx))?;
        Poll::Ready(Ok(data.len()))
    }

    pub fn poll_flush(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.poll_ready(cx)
    }

    /// Finish the outstanding write and refuse further ones.
    ///
    /// This closes the write side only; the session keeps running.
    pub fn poll_shutdown(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        ready!(self.poll_ready(cx))?;
        self.closed = true;
        Poll::Ready(Ok(()))
    }

    /// Drop any outstanding write and refuse further ones.
    pub fn shutdown(&mut self) {
        self.pending = None;
        self.in_flight_len = None;
        self.closed = true;
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}
