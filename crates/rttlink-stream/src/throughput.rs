//! Byte-rate measurement for channel streams.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::Instant;
use tracing::info;

/// Default measurement window.
pub const DEFAULT_METER_INTERVAL: Duration = Duration::from_secs(1);

/// Counts bytes over fixed windows and reports bytes per second.
#[derive(Debug, Clone)]
pub struct ThroughputMeter {
    interval: Duration,
    window_start: Instant,
    bytes: u64,
}

impl ThroughputMeter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            window_start: Instant::now(),
            bytes: 0,
        }
    }

    pub fn record(&mut self, len: usize) {
        self.bytes = self.bytes.saturating_add(len as u64);
    }

    /// If the current window has elapsed at `now`, close it and return its
    /// rate. Windows with no traffic close silently.
    pub fn poll_rate(&mut self, now: Instant) -> Option<f64> {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.interval {
            return None;
        }

        let bytes = std::mem::take(&mut self.bytes);
        self.window_start = now;
        (bytes > 0).then(|| bytes as f64 / self.interval.as_secs_f64())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new(DEFAULT_METER_INTERVAL)
    }
}

/// Pass-through reader that logs its throughput once per meter interval.
#[derive(Debug)]
pub struct MeteredReader<R> {
    inner: R,
    meter: ThroughputMeter,
}

impl<R: AsyncRead + Unpin> MeteredReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_meter(inner, ThroughputMeter::default())
    }

    pub fn with_meter(inner: R, meter: ThroughputMeter) -> Self {
        Self { inner, meter }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for MeteredReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let result = Pin::new(&mut this.inner).poll_read(cx, buf);

        if let Poll::Ready(Ok(())) = result {
            this.meter.record(buf.filled().len() - before);
            if let Some(bytes_per_sec) = this.meter.poll_rate(Instant::now()) {
                info!(bytes_per_sec, "RTT throughput");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn rate_is_reported_per_window() {
        let mut meter = ThroughputMeter::new(Duration::from_secs(2));
        let start = Instant::now();

        meter.record(1000);
        assert_eq!(meter.poll_rate(start + Duration::from_secs(1)), None);

        meter.record(3000);
        assert_eq!(meter.poll_rate(start + Duration::from_secs(2)), Some(2000.0));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_window_reports_nothing_and_resets() {
        let mut meter = ThroughputMeter::default();
        let start = Instant::now();

        assert_eq!(meter.poll_rate(start + Duration::from_secs(1)), None);
        meter.record(10);
        assert_eq!(meter.poll_rate(start + Duration::from_millis(1500)), None);
        assert_eq!(meter.poll_rate(start + Duration::from_secs(2)), Some(10.0));
    }

    #[tokio::test]
    async fn metered_reader_passes_bytes_through() {
        let mut reader = MeteredReader::new(&b"abcdef"[..]);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"abcdef");
    }
}
