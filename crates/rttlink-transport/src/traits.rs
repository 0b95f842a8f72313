use std::future::Future;

use bytes::Bytes;

use crate::channel::ChannelTable;
use crate::error::Result;

/// Options passed to [`RttTransport::start`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// Known address of the RTT control block. When `None` the transport
    /// searches target RAM for it.
    pub control_block_address: Option<u32>,
}

/// A multiplexed RTT channel session on a debug probe.
///
/// This is the seam between rttlink and a native probe driver. Every call is
/// a single asynchronous operation; rttlink never issues two reads (or two
/// writes) on the same stream concurrently, but independent streams may
/// share one transport.
///
/// `read` is a non-blocking poll: an empty result means "nothing buffered on
/// the target right now", never end-of-stream.
pub trait RttTransport: Send + Sync + 'static {
    /// Begin a session on the probe identified by `serial` and return the
    /// channel layout found in the target's control block.
    fn start(
        &self,
        serial: u32,
        options: &StartOptions,
    ) -> impl Future<Output = Result<ChannelTable>> + Send;

    /// Read at most `max_len` bytes from up channel `channel`.
    fn read(&self, channel: u32, max_len: usize) -> impl Future<Output = Result<Bytes>> + Send;

    /// Write `data` to down channel `channel`.
    fn write(&self, channel: u32, data: Bytes) -> impl Future<Output = Result<()>> + Send;

    /// End the session on the probe identified by `serial`.
    fn stop(&self, serial: u32) -> impl Future<Output = Result<()>> + Send;
}
