//! Channel lookup against a session's channel table.

use rttlink_transport::{ChannelDirection, ChannelTable};

use crate::error::{Result, StreamError};

/// Check that `table` has a channel with this `index` and `direction`.
///
/// Returns the index on success so callers can bind it directly.
pub fn validate_channel(
    table: &ChannelTable,
    index: u32,
    direction: ChannelDirection,
) -> Result<u32> {
    table
        .find(index, direction)
        .map(|channel| channel.index)
        .ok_or(StreamError::ChannelNotFound { index, direction })
}
