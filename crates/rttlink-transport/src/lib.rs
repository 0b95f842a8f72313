//! RTT channel transport abstraction.
//!
//! A debug probe exposes SEGGER-style RTT as a set of numbered up
//! (device→host) and down (host→device) channels, multiplexed over one
//! probe session. This crate defines the contract the rest of rttlink is
//! built on:
//! - [`RttTransport`]: start/stop a session, poll-read and write one channel
//! - [`ChannelTable`]: the channel layout reported when a session starts
//!
//! The native probe driver lives outside this workspace; implement
//! [`RttTransport`] for it. [`MemoryTransport`] (feature `memory`) is an
//! in-process stand-in for tests and demos.

pub mod channel;
pub mod error;
pub mod traits;

#[cfg(feature = "memory")]
pub mod memory;

pub use channel::{ChannelDescriptor, ChannelDirection, ChannelTable};
pub use error::{Result, TransportError};
pub use traits::{RttTransport, StartOptions};

#[cfg(feature = "memory")]
pub use memory::MemoryTransport;
