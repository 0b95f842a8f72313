use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod replay;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a captured RTT byte dump into frames.
    Decode(DecodeArgs),
    /// Escape payloads into framed wire bytes.
    Encode(EncodeArgs),
    /// Replay a capture through an in-memory probe and a readable RTT stream.
    Replay(ReplayArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Decode(args) => decode::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Replay(args) => replay::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture file. Reads stdin when omitted or `-`.
    pub file: Option<PathBuf>,
    /// Drop bytes after the last delimiter instead of emitting them as a
    /// final frame.
    #[arg(long)]
    pub no_flush: bool,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Payload as text; repeat for several frames.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Vec<String>,
    /// Payload as hex digits; repeat for several frames.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Vec<String>,
    /// Read a single payload from file.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Capture file to replay.
    pub file: PathBuf,
    /// Up channel to read from.
    #[arg(long, short = 'c', default_value = "0")]
    pub channel: u32,
    /// Bytes delivered per simulated poll.
    #[arg(long, default_value = "64")]
    pub chunk_size: usize,
    /// Empty polls before the first chunk arrives.
    #[arg(long, default_value = "0")]
    pub empty_polls: usize,
    /// Retry delay after an empty poll, in milliseconds.
    #[arg(long, default_value = "5")]
    pub retry_ms: u64,
    /// Drop bytes after the last delimiter.
    #[arg(long)]
    pub no_flush: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
