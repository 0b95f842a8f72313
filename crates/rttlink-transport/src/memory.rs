//! In-process RTT transport.
//!
//! Simulates a probe with a fixed channel table: bytes queued with
//! [`MemoryTransport::push_up`] come out of up-channel reads, and every down
//! write is captured for inspection. Empty polls and one-shot failures can be
//! scripted, and call counts are recorded, which makes it the fake of choice
//! for stream tests.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;
use tracing::{debug, trace};

use crate::channel::ChannelTable;
use crate::error::{Result, TransportError};
use crate::traits::{RttTransport, StartOptions};

#[derive(Debug, Default)]
struct State {
    started: bool,
    up: HashMap<u32, VecDeque<Bytes>>,
    empty_polls: HashMap<u32, usize>,
    written: HashMap<u32, Vec<Bytes>>,
    fail_start: Option<String>,
    fail_read: Option<String>,
    fail_write: Option<String>,
    fail_stop: Option<String>,
}

/// An in-memory [`RttTransport`].
#[derive(Debug)]
pub struct MemoryTransport {
    table: ChannelTable,
    state: Mutex<State>,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    read_calls: AtomicUsize,
    write_calls: AtomicUsize,
    reads_in_flight: AtomicUsize,
    peak_reads_in_flight: AtomicUsize,
}

impl MemoryTransport {
    /// Create a transport whose sessions report `table`.
    pub fn new(table: ChannelTable) -> Self {
        Self {
            table,
            state: Mutex::new(State::default()),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            read_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
            reads_in_flight: AtomicUsize::new(0),
            peak_reads_in_flight: AtomicUsize::new(0),
        }
    }

    /// Queue bytes for delivery on up channel `channel`.
    pub fn push_up(&self, channel: u32, data: impl Into<Bytes>) {
        self.lock()
            .up
            .entry(channel)
            .or_default()
            .push_back(data.into());
    }

    /// Make the next `count` reads on `channel` return no data, even if
    /// bytes are queued.
    pub fn queue_empty_polls(&self, channel: u32, count: usize) {
        *self.lock().empty_polls.entry(channel).or_default() += count;
    }

    /// Fail the next `start` call.
    pub fn fail_next_start(&self, message: impl Into<String>) {
        self.lock().fail_start = Some(message.into());
    }

    /// Fail the next `read` call.
    pub fn fail_next_read(&self, message: impl Into<String>) {
        self.lock().fail_read = Some(message.into());
    }

    /// Fail the next `write` call.
    pub fn fail_next_write(&self, message: impl Into<String>) {
        self.lock().fail_write = Some(message.into());
    }

    /// Fail the next `stop` call.
    pub fn fail_next_stop(&self, message: impl Into<String>) {
        self.lock().fail_stop = Some(message.into());
    }

    /// Chunks written to down channel `channel`, in order.
    pub fn written(&self, channel: u32) -> Vec<Bytes> {
        self.lock()
            .written
            .get(&channel)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether a session is currently active.
    pub fn is_started(&self) -> bool {
        self.lock().started
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Highest number of reads that were in progress at the same time.
    pub fn peak_reads_in_flight(&self) -> usize {
        self.peak_reads_in_flight.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_now(&self, channel: u32, max_len: usize) -> Result<Bytes> {
        let mut state = self.lock();
        if let Some(message) = state.fail_read.take() {
            return Err(TransportError::probe("read", message));
        }
        if !state.started {
            return Err(TransportError::NotStarted);
        }
        if let Some(remaining) = state.empty_polls.get_mut(&channel) {
            if *remaining > 0 {
                *remaining -= 1;
                trace!(channel, "scripted empty poll");
                return Ok(Bytes::new());
            }
        }

        let Some(queue) = state.up.get_mut(&channel) else {
            return Ok(Bytes::new());
        };
        let Some(mut chunk) = queue.pop_front() else {
            return Ok(Bytes::new());
        };
        if chunk.len() > max_len {
            let rest = chunk.split_off(max_len);
            queue.push_front(rest);
        }
        Ok(chunk)
    }
}

impl RttTransport for MemoryTransport {
    fn start(
        &self,
        serial: u32,
        options: &StartOptions,
    ) -> impl Future<Output = Result<ChannelTable>> + Send {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        debug!(serial, control_block = ?options.control_block_address, "memory transport start");

        let result = {
            let mut state = self.lock();
            match state.fail_start.take() {
                Some(message) => Err(TransportError::probe("start", message)),
                None => {
                    state.started = true;
                    Ok(self.table.clone())
                }
            }
        };

        async move {
            tokio::task::yield_now().await;
            result
        }
    }

    fn read(&self, channel: u32, max_len: usize) -> impl Future<Output = Result<Bytes>> + Send {
        self.read_calls.fetch_add(1, Ordering::SeqCst);

        async move {
            let in_flight = self.reads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_reads_in_flight
                .fetch_max(in_flight, Ordering::SeqCst);
            let _guard = InFlight(&self.reads_in_flight);
            tokio::task::yield_now().await;
            self.read_now(channel, max_len)
        }
    }

    fn write(&self, channel: u32, data: Bytes) -> impl Future<Output = Result<()>> + Send {
        self.write_calls.fetch_add(1, Ordering::SeqCst);

        async move {
            tokio::task::yield_now().await;
            let mut state = self.lock();
            if let Some(message) = state.fail_write.take() {
                return Err(TransportError::probe("write", message));
            }
            if !state.started {
                return Err(TransportError::NotStarted);
            }
            state.written.entry(channel).or_default().push(data);
            Ok(())
        }
    }

    fn stop(&self, serial: u32) -> impl Future<Output = Result<()>> + Send {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        debug!(serial, "memory transport stop");

        async move {
            tokio::task::yield_now().await;
            let mut state = self.lock();
            state.started = false;
            match state.fail_stop.take() {
                Some(message) => Err(TransportError::probe("stop", message)),
                None => Ok(()),
            }
        }
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
