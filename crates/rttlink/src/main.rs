mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "rttlink", version, about = "RTT channel and PPK framing tools")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decode_subcommand() {
        let cli = Cli::try_parse_from(["rttlink", "decode", "capture.bin", "--no-flush"])
            .expect("decode args should parse");

        assert!(matches!(cli.command, Command::Decode(ref args) if args.no_flush));
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from(["rttlink", "encode", "--hex", "0203", "--data", "hello"])
            .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_replay_subcommand() {
        let cli = Cli::try_parse_from([
            "rttlink",
            "replay",
            "capture.bin",
            "--channel",
            "1",
            "--chunk-size",
            "16",
        ])
        .expect("replay args should parse");

        assert!(matches!(
            cli.command,
            Command::Replay(ref args) if args.channel == 1 && args.chunk_size == 16
        ));
    }

    #[test]
    fn repeated_data_gives_several_payloads() {
        let cli = Cli::try_parse_from(["rttlink", "encode", "--data", "a", "--data", "b"])
            .expect("encode args should parse");

        assert!(matches!(cli.command, Command::Encode(ref args) if args.data.len() == 2));
    }
}
