//! RTT session lifecycle.
//!
//! ```text
//! Unstarted ──start──▶ Starting ──table ok, channels valid──▶ Active
//!                         │                                     │
//!                         └──start/validation failed──┐    close/drop
//!                                                     ▼         ▼
//!                                                  Stopped ◀── Stopping
//! ```
//!
//! A session is never restarted; open a new stream to retry.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use rttlink_transport::{ChannelDirection, ChannelTable, RttTransport, StartOptions};
use tracing::{debug, warn};

use crate::directory::validate_channel;
use crate::error::{Result, StreamError};

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unstarted,
    Starting,
    Active,
    Stopping,
    Stopped,
}

/// One started RTT session, shared by every half of the stream bound to it.
///
/// The channel table is read-only. Only [`Session::stop`] ends the session,
/// and it reaches the transport at most once.
pub struct Session<T> {
    transport: Arc<T>,
    serial: u32,
    table: ChannelTable,
    state: Mutex<SessionState>,
}

impl<T: RttTransport> Session<T> {
    /// Start a session and check that every `(index, direction)` in
    /// `channels` exists in its channel table.
    ///
    /// If starting or validation fails the transport is still stopped before
    /// the error is returned, because a failed start may have left the probe
    /// half-initialized. A failure of that cleanup stop is logged and the
    /// original error is returned.
    pub async fn open(
        transport: Arc<T>,
        serial: u32,
        options: &StartOptions,
        channels: &[(u32, ChannelDirection)],
    ) -> Result<Arc<Self>> {
        debug!(serial, state = ?SessionState::Starting, "starting RTT session");

        let table = match transport.start(serial, options).await {
            Ok(table) => table,
            Err(err) => {
                cleanup_stop(transport.as_ref(), serial).await;
                return Err(StreamError::StartFailed(err));
            }
        };

        if let Err(err) = channels.iter().try_for_each(|&(index, direction)| {
            validate_channel(&table, index, direction).map(drop)
        }) {
            cleanup_stop(transport.as_ref(), serial).await;
            return Err(err);
        }

        debug!(
            serial,
            channels = table.len(),
            state = ?SessionState::Active,
            "RTT session active"
        );

        Ok(Arc::new(Self {
            transport,
            serial,
            table,
            state: Mutex::new(SessionState::Active),
        }))
    }

    /// Stop the session.
    ///
    /// Only the first call reaches the transport; later calls return
    /// `Ok(())` immediately.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.lock_state();
            if matches!(*state, SessionState::Stopping | SessionState::Stopped) {
                return Ok(());
            }
            *state = SessionState::Stopping;
        }
        debug!(serial = self.serial, "stopping RTT session");

        let result = self.transport.stop(self.serial).await;
        *self.lock_state() = SessionState::Stopped;
        debug!(serial = self.serial, ok = result.is_ok(), "RTT session stopped");

        result.map_err(StreamError::StopFailed)
    }

    /// Spawn [`Session::stop`] on the current tokio runtime.
    ///
    /// Used when a stream is dropped without being closed.
    pub(crate) fn stop_in_background(self: &Arc<Self>) {
        if matches!(self.state(), SessionState::Stopping | SessionState::Stopped) {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let session = Arc::clone(self);
                handle.spawn(async move {
                    if let Err(err) = session.stop().await {
                        warn!(
                            serial = session.serial,
                            error = %err,
                            "background RTT session stop failed"
                        );
                    }
                });
            }
            Err(_) => {
                warn!(
                    serial = self.serial,
                    "RTT stream dropped outside a tokio runtime; session left running"
                );
            }
        }
    }
}

impl<T> Session<T> {
    /// Serial number of the probe this session runs on.
    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// Channel table reported when the session started.
    pub fn table(&self) -> &ChannelTable {
        &self.table
    }

    /// The transport this session runs on.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.lock_state()
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("serial", &self.serial)
            .field("channels", &self.table.len())
            .field("state", &self.state())
            .finish()
    }
}

async fn cleanup_stop<T: RttTransport>(transport: &T, serial: u32) {
    if let Err(err) = transport.stop(serial).await {
        warn!(serial, error = %err, "failed to stop RTT session after setup error");
    }
    debug!(serial, state = ?SessionState::Stopped, "RTT session setup abandoned");
}
