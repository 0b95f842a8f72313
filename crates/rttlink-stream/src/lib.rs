//! Async byte streams over multiplexed RTT channels.
//!
//! Opening a stream starts an RTT session on the probe, checks the requested
//! channels against the session's channel table and binds them. Readable
//! streams poll their up channel, retrying after a short delay when the
//! target has nothing buffered. Writable streams forward each write as one
//! transport write. Duplex streams do both over one session.
//!
//! Closing or dropping a stream stops its session exactly once.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use rttlink_transport::RttTransport;
//! # async fn demo<T: RttTransport>(transport: Arc<T>) -> rttlink_stream::Result<()> {
//! use futures_util::StreamExt;
//! use rttlink_stream::Probe;
//!
//! let probe = Probe::new(transport, 683_000_001);
//! let mut frames = probe.open_readable(0).await?.frames();
//! while let Some(frame) = frames.next().await {
//!     println!("{:?}", frame);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod directory;
pub mod duplex;
pub mod error;
pub mod probe;
pub mod read;
pub mod readable;
pub mod session;
pub mod throughput;
pub mod writable;
pub mod write;

pub use config::{StreamConfig, DEFAULT_MAX_READ_SIZE, DEFAULT_RETRY_DELAY};
pub use directory::validate_channel;
pub use duplex::RttDuplexStream;
pub use error::{Result, StreamError};
pub use probe::Probe;
pub use read::{ReadBehavior, RetryTimer};
pub use readable::RttReadStream;
pub use session::{Session, SessionState};
pub use throughput::{MeteredReader, ThroughputMeter, DEFAULT_METER_INTERVAL};
pub use writable::RttWriteStream;
pub use write::WriteBehavior;
