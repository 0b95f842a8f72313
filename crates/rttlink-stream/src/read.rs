//! Pull side of a channel stream: bounded polling of one up channel.

use std::cmp;
use std::future::{poll_fn, Future};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_core::future::BoxFuture;
use rttlink_transport::{self as transport, RttTransport};
use tokio::io::ReadBuf;
use tokio::time::{Instant, Sleep};
use tracing::{debug, trace};

use crate::error::{Result, StreamError};

/// The single retry slot of a read behavior.
///
/// Arming an armed timer moves its deadline instead of adding a second one.
#[derive(Debug)]
pub struct RetryTimer {
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl RetryTimer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, sleep: None }
    }

    /// Cancel any pending retry and schedule a new one `delay` from now.
    pub fn arm(&mut self) {
        let deadline = Instant::now() + self.delay;
        match self.sleep.as_mut() {
            Some(sleep) => sleep.as_mut().reset(deadline),
            None => self.sleep = Some(Box::pin(tokio::time::sleep_until(deadline))),
        }
    }

    pub fn cancel(&mut self) {
        self.sleep = None;
    }

    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Resolve once no retry is pending. Clears the timer when it fires.
    pub fn poll_expired(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        if let Some(sleep) = self.sleep.as_mut() {
            ready!(sleep.as_mut().poll(cx));
            self.sleep = None;
        }
        Poll::Ready(())
    }
}

/// Read behavior bound to one validated up channel.
///
/// Holds at most one outstanding transport read and one retry timer. Empty
/// reads never reach the consumer. The first read error is reported and
/// every later pull fails with [`StreamError::ReadTerminated`].
pub struct ReadBehavior<T> {
    transport: Arc<T>,
    channel: u32,
    max_read_size: usize,
    pending: Option<BoxFuture<'static, transport::Result<Bytes>>>,
    retry: RetryTimer,
    buffered: Bytes,
    terminated: bool,
}

impl<T: RttTransport> ReadBehavior<T> {
    pub fn new(
        transport: Arc<T>,
        channel: u32,
        max_read_size: usize,
        retry_delay: Duration,
    ) -> Self {
        Self {
            transport,
            channel,
            max_read_size: max_read_size.max(1),
            pending: None,
            retry: RetryTimer::new(retry_delay),
            buffered: Bytes::new(),
            terminated: false,
        }
    }

    /// Poll for the next non-empty chunk of at most `size_hint` bytes
    /// (capped by the configured maximum read size).
    ///
    /// A pull that arrives while a retry is armed waits on the existing
    /// deadline. The timer is only re-armed, by cancelling and rescheduling
    /// it, when an empty read completes.
    pub fn poll_chunk(&mut self, cx: &mut Context<'_>, size_hint: usize) -> Poll<Result<Bytes>> {
        loop {
            if !self.buffered.is_empty() {
                let len = cmp::min(self.buffered.len(), size_hint.max(1));
                return Poll::Ready(Ok(self.buffered.split_to(len)));
            }
            if self.terminated {
                return Poll::Ready(Err(StreamError::ReadTerminated {
                    channel: self.channel,
                }));
            }

            if self.pending.is_none() {
                ready!(self.retry.poll_expired(cx));
                let transport = Arc::clone(&self.transport);
                let channel = self.channel;
                let len = cmp::min(size_hint.max(1), self.max_read_size);
                self.pending = Some(Box::pin(async move { transport.read(channel, len).await }));
            }

            let Some(pending) = self.pending.as_mut() else {
                continue;
            };
            let result = ready!(pending.as_mut().poll(cx));
            self.pending = None;

            match result {
                Ok(data) if data.is_empty() => {
                    trace!(channel = self.channel, "empty RTT read, retry armed");
                    self.retry.arm();
                }
                Ok(data) => {
                    self.retry.cancel();
                    trace!(channel = self.channel, len = data.len(), "RTT read");
                    return Poll::Ready(Ok(data));
                }
                Err(source) => {
                    self.retry.cancel();
                    self.terminated = true;
                    debug!(channel = self.channel, error = %source, "RTT read failed");
                    return Poll::Ready(Err(StreamError::ReadFailed {
                        channel: self.channel,
                        source,
                    }));
                }
            }
        }
    }

    /// `AsyncRead` adapter: copies the next chunk into `buf`, keeping any
    /// leftover bytes for the following call.
    pub fn poll_read(&mut self, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<Result<()>> {
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }
        let mut chunk = ready!(self.poll_chunk(cx, buf.remaining()))?;
        let len = cmp::min(chunk.len(), buf.remaining());
        buf.put_slice(&chunk.split_to(len));
        if !chunk.is_empty() {
            self.buffered = chunk;
        }
        Poll::Ready(Ok(()))
    }

    /// Wait for the next non-empty chunk.
    pub async fn read_chunk(&mut self) -> Result<Bytes> {
        let size = self.max_read_size;
        poll_fn(|cx| self.poll_chunk(cx, size)).await
    }

    /// Cancel the retry timer and abandon any outstanding read.
    pub fn shutdown(&mut self) {
        self.retry.cancel();
        self.pending = None;
        self.buffered = Bytes::new();
        self.terminated = true;
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }

    pub fn is_retry_armed(&self) -> bool {
        self.retry.is_armed()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

#[cfg(test)]
mod tests {
    use rttlink_transport::{
        ChannelDescriptor, ChannelDirection, ChannelTable, MemoryTransport, StartOptions,
    };

    use super::*;
    use crate::config::DEFAULT_RETRY_DELAY;

    async fn started() -> Arc<MemoryTransport> {
        let t = Arc::new(MemoryTransport::new(ChannelTable::new(vec![
            ChannelDescriptor::new(0, ChannelDirection::Up, "Terminal", 1024),
        ])));
        t.start(1, &StartOptions::default()).await.unwrap();
        t
    }

    #[tokio::test(start_paused = true)]
    async fn empty_polls_are_retried_until_data_arrives() {
        let t = started().await;
        t.push_up(0, &b"hello"[..]);
        t.queue_empty_polls(0, 3);

        let mut reader = ReadBehavior::new(Arc::clone(&t), 0, 64, DEFAULT_RETRY_DELAY);
        let start = Instant::now();
        let chunk = reader.read_chunk().await.unwrap();

        assert_eq!(chunk.as_ref(), b"hello");
        assert_eq!(t.read_calls(), 4);
        assert_eq!(t.peak_reads_in_flight(), 1);
        assert!(start.elapsed() >= DEFAULT_RETRY_DELAY * 3);
        assert!(!reader.is_retry_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn pull_while_retry_armed_reuses_timer() {
        let t = started().await;
        t.queue_empty_polls(0, 1);
        t.push_up(0, &b"x"[..]);

        let mut reader = ReadBehavior::new(Arc::clone(&t), 0, 64, DEFAULT_RETRY_DELAY);

        // Drive the first (empty) read to completion without letting the
        // timer fire.
        let first = poll_fn(|cx| match reader.poll_chunk(cx, 64) {
            Poll::Pending if reader.is_retry_armed() => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
            Poll::Ready(r) => Poll::Ready(Some(r)),
        })
        .await;
        assert!(first.is_none());
        assert_eq!(t.read_calls(), 1);

        // A second pull must not issue a read before the retry fires.
        let second = poll_fn(|cx| Poll::Ready(reader.poll_chunk(cx, 64))).await;
        assert!(second.is_pending());
        assert_eq!(t.read_calls(), 1);

        let data = reader.read_chunk().await.unwrap();
        assert_eq!(data.as_ref(), b"x");
        assert_eq!(t.read_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_armed_retry() {
        let t = started().await;
        t.queue_empty_polls(0, 10);

        let mut reader = ReadBehavior::new(Arc::clone(&t), 0, 64, DEFAULT_RETRY_DELAY);
        let first = poll_fn(|cx| match reader.poll_chunk(cx, 64) {
            Poll::Pending if reader.is_retry_armed() => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
            Poll::Ready(r) => Poll::Ready(Some(r)),
        })
        .await;
        assert!(first.is_none());
        assert_eq!(t.read_calls(), 1);

        reader.shutdown();
        assert!(!reader.is_retry_armed());
        for _ in 0..3 {
            tokio::time::advance(DEFAULT_RETRY_DELAY * 2).await;
        }
        assert_eq!(t.read_calls(), 1);

        assert!(matches!(
            reader.read_chunk().await,
            Err(StreamError::ReadTerminated { channel: 0 })
        ));
        assert_eq!(t.read_calls(), 1);
    }

    #[tokio::test]
    async fn read_error_is_sticky() {
        let t = started().await;
        t.fail_next_read("probe unplugged");
        t.push_up(0, &b"late"[..]);

        let mut reader = ReadBehavior::new(Arc::clone(&t), 0, 64, DEFAULT_RETRY_DELAY);
        assert!(matches!(
            reader.read_chunk().await,
            Err(StreamError::ReadFailed { channel: 0, .. })
        ));
        assert!(matches!(
            reader.read_chunk().await,
            Err(StreamError::ReadTerminated { channel: 0 })
        ));
        assert_eq!(t.read_calls(), 1);
    }

    #[tokio::test]
    async fn poll_read_keeps_leftover_bytes() {
        let t = started().await;
        t.push_up(0, &b"abcdef"[..]);

        let mut reader = ReadBehavior::new(Arc::clone(&t), 0, 64, DEFAULT_RETRY_DELAY);
        let mut storage = [0u8; 4];

        let mut buf = ReadBuf::new(&mut storage);
        poll_fn(|cx| reader.poll_read(cx, &mut buf)).await.unwrap();
        assert_eq!(buf.filled(), b"abcd");

        let mut buf = ReadBuf::new(&mut storage);
        poll_fn(|cx| reader.poll_read(cx, &mut buf)).await.unwrap();
        assert_eq!(buf.filled(), b"ef");
        assert_eq!(t.read_calls(), 1);
    }

    #[tokio::test]
    async fn read_size_is_capped() {
        let t = started().await;
        t.push_up(0, vec![7u8; 100]);

        let mut reader = ReadBehavior::new(Arc::clone(&t), 0, 16, DEFAULT_RETRY_DELAY);
        assert_eq!(reader.read_chunk().await.unwrap().len(), 16);
    }

    #[tokio::test(start_paused = true)]
    async fn arm_twice_keeps_one_timer() {
        let mut timer = RetryTimer::new(Duration::from_millis(5));
        timer.arm();
        tokio::time::advance(Duration::from_millis(3)).await;
        timer.arm();
        tokio::time::advance(Duration::from_millis(3)).await;

        let fired = poll_fn(|cx| Poll::Ready(timer.poll_expired(cx))).await;
        assert!(fired.is_pending());

        tokio::time::advance(Duration::from_millis(2)).await;
        poll_fn(|cx| timer.poll_expired(cx)).await;
        assert!(!timer.is_armed());
    }
}
