use std::time::Duration;

use rttlink_transport::StartOptions;

/// Delay before re-polling an up channel that returned no data.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(5);

/// Upper bound on the size of a single transport read.
pub const DEFAULT_MAX_READ_SIZE: usize = 1024;

/// Configuration shared by all channel streams.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Wait after an empty read before polling again.
    pub retry_delay: Duration,
    /// Maximum number of bytes requested per transport read.
    pub max_read_size: usize,
    /// Options passed to the transport when the session starts.
    pub start_options: StartOptions,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
            max_read_size: DEFAULT_MAX_READ_SIZE,
            start_options: StartOptions::default(),
        }
    }
}
