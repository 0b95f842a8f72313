use std::fs;
use std::sync::Arc;
use std::time::Duration;

use rttlink_frame::{Frame, FrameDecoder};
use rttlink_stream::{Probe, StreamConfig, ThroughputMeter};
use rttlink_transport::{ChannelDescriptor, ChannelDirection, ChannelTable, MemoryTransport};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cmd::ReplayArgs;
use crate::exit::{frame_error, io_error, stream_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_frames, OutputFormat};

const REPLAY_SERIAL: u32 = 1;
const REPLAY_CHANNEL_NAME: &str = "Replay";

pub fn run(args: ReplayArgs, format: OutputFormat) -> CliResult<i32> {
    if args.chunk_size == 0 {
        return Err(CliError::new(USAGE, "--chunk-size must be at least 1"));
    }
    let capture = fs::read(&args.file)
        .map_err(|err| io_error(&format!("failed reading {}", args.file.display()), err))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))?;
    let frames = runtime.block_on(replay(&args, capture))?;

    print_frames(&frames, format);
    Ok(SUCCESS)
}

/// Feed `capture` through a simulated probe and a readable stream on
/// `args.channel`, decoding frames as the chunks arrive.
async fn replay(args: &ReplayArgs, capture: Vec<u8>) -> CliResult<Vec<Frame>> {
    let size = u32::try_from(args.chunk_size).unwrap_or(u32::MAX);
    let transport = Arc::new(MemoryTransport::new(ChannelTable::new(vec![
        ChannelDescriptor::new(args.channel, ChannelDirection::Up, REPLAY_CHANNEL_NAME, size),
    ])));
    let config = StreamConfig {
        retry_delay: Duration::from_millis(args.retry_ms),
        max_read_size: args.chunk_size,
        ..StreamConfig::default()
    };
    let probe = Probe::with_config(Arc::clone(&transport), REPLAY_SERIAL, config);

    let mut stream = probe
        .open_readable(args.channel)
        .await
        .map_err(|err| stream_error("open failed", err))?;
    transport.queue_empty_polls(args.channel, args.empty_polls);
    for chunk in capture.chunks(args.chunk_size) {
        transport.push_up(args.channel, chunk.to_vec());
    }

    let mut decoder = FrameDecoder::new();
    let mut meter = ThroughputMeter::default();
    let mut frames = Vec::new();
    let mut remaining = capture.len();
    while remaining > 0 {
        let chunk = stream
            .read_chunk()
            .await
            .map_err(|err| stream_error("read failed", err))?;
        remaining = remaining.saturating_sub(chunk.len());
        meter.record(chunk.len());
        if let Some(bytes_per_sec) = meter.poll_rate(Instant::now()) {
            info!(bytes_per_sec, "replay throughput");
        }
        frames.extend(decoder.feed(&chunk));
    }

    if !args.no_flush {
        if let Some(frame) = decoder
            .flush()
            .map_err(|err| frame_error("decode failed", err))?
        {
            frames.push(frame);
        }
    }

    stream
        .close()
        .await
        .map_err(|err| stream_error("close failed", err))?;
    debug!(
        bytes = capture.len(),
        frames = frames.len(),
        reads = transport.read_calls(),
        "replay complete"
    );
    Ok(frames)
}
