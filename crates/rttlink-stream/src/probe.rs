use std::sync::Arc;

use rttlink_transport::{ChannelTable, RttTransport};
use tracing::{debug, warn};

use crate::config::StreamConfig;
use crate::duplex::RttDuplexStream;
use crate::error::{Result, StreamError};
use crate::readable::RttReadStream;
use crate::writable::RttWriteStream;

/// A debug probe, identified by serial number, on which RTT streams can be
/// opened.
///
/// Every `open_*` call starts its own session; the returned stream stops it.
#[derive(Debug)]
pub struct Probe<T> {
    transport: Arc<T>,
    serial: u32,
    config: StreamConfig,
}

impl<T: RttTransport> Probe<T> {
    pub fn new(transport: Arc<T>, serial: u32) -> Self {
        Self::with_config(transport, serial, StreamConfig::default())
    }

    pub fn with_config(transport: Arc<T>, serial: u32, config: StreamConfig) -> Self {
        Self {
            transport,
            serial,
            config,
        }
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// List the target's RTT channels.
    ///
    /// Starts a session only long enough to read the control block, then
    /// stops it again.
    pub async fn channels(&self) -> Result<ChannelTable> {
        let serial = self.serial;
        let started = self.transport.start(serial, &self.config.start_options).await;
        let table = match started {
            Ok(table) => table,
            Err(err) => {
                if let Err(stop_err) = self.transport.stop(serial).await {
                    warn!(
                        serial,
                        error = %stop_err,
                        "failed to stop RTT session after start error"
                    );
                }
                return Err(StreamError::StartFailed(err));
            }
        };

        self.transport
            .stop(serial)
            .await
            .map_err(StreamError::StopFailed)?;
        debug!(serial, channels = table.len(), "read RTT channel table");
        Ok(table)
    }

    /// Open up channel `up` for reading.
    pub async fn open_readable(&self, up: u32) -> Result<RttReadStream<T>> {
        RttReadStream::open(Arc::clone(&self.transport), self.serial, up, &self.config).await
    }

    /// Open down channel `down` for writing.
    pub async fn open_writable(&self, down: u32) -> Result<RttWriteStream<T>> {
        RttWriteStream::open(Arc::clone(&self.transport), self.serial, down, &self.config).await
    }

    /// Open up channel `up` and down channel `down` as one stream.
    pub async fn open_duplex(&self, up: u32, down: u32) -> Result<RttDuplexStream<T>> {
        RttDuplexStream::open(
            Arc::clone(&self.transport),
            self.serial,
            up,
            down,
            &self.config,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rttlink_transport::{ChannelDirection, MemoryTransport, StartOptions};

    use super::*;

    fn probe() -> (Arc<MemoryTransport>, Probe<MemoryTransport>) {
        let t = Arc::new(MemoryTransport::new(ChannelTable::from_parts(
            [("Terminal".to_string(), 1024)],
            [("Terminal".to_string(), 16)],
        )));
        let config = StreamConfig {
            retry_delay: Duration::from_millis(1),
            start_options: StartOptions {
                control_block_address: Some(0x2000_0000),
            },
            ..StreamConfig::default()
        };
        (Arc::clone(&t), Probe::with_config(t, 683_000_001, config))
    }

    #[tokio::test]
    async fn channels_starts_and_stops() {
        let (t, probe) = probe();
        let table = probe.channels().await.unwrap();

        assert_eq!(table.len(), 2);
        assert!(table.find(0, ChannelDirection::Up).is_some());
        assert_eq!(t.start_calls(), 1);
        assert_eq!(t.stop_calls(), 1);
        assert!(!t.is_started());
    }

    #[tokio::test]
    async fn channels_start_failure_still_stops() {
        let (t, probe) = probe();
        t.fail_next_start("no control block");

        assert!(matches!(
            probe.channels().await,
            Err(StreamError::StartFailed(_))
        ));
        assert_eq!(t.stop_calls(), 1);
    }

    #[tokio::test]
    async fn channels_reports_stop_failure() {
        let (t, probe) = probe();
        t.fail_next_stop("probe lost");

        assert!(matches!(
            probe.channels().await,
            Err(StreamError::StopFailed(_))
        ));
    }

    #[tokio::test]
    async fn each_stream_gets_its_own_session() {
        let (t, probe) = probe();

        let reader = probe.open_readable(0).await.unwrap();
        reader.close().await.unwrap();
        let writer = probe.open_writable(0).await.unwrap();
        writer.close().await.unwrap();
        let duplex = probe.open_duplex(0, 0).await.unwrap();
        duplex.close().await.unwrap();

        assert_eq!(t.start_calls(), 3);
        assert_eq!(t.stop_calls(), 3);
    }
}
