use std::fs;

use rttlink_frame::FrameWriter;
use serde::Serialize;

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_raw, to_hex, OutputFormat};

#[derive(Serialize)]
struct EncodeOutput {
    frames: usize,
    size: usize,
    hex: String,
}

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let payloads = resolve_payloads(&args)?;
    if payloads.is_empty() {
        return Err(CliError::new(
            USAGE,
            "nothing to encode: pass --data, --hex or --file",
        ));
    }

    let wire = encode_all(&payloads)?;
    match format {
        OutputFormat::Raw => print_raw(&wire),
        OutputFormat::Json => {
            let out = EncodeOutput {
                frames: payloads.len(),
                size: wire.len(),
                hex: to_hex(&wire),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => println!("{}", to_hex(&wire)),
    }
    Ok(SUCCESS)
}

fn encode_all(payloads: &[Vec<u8>]) -> CliResult<Vec<u8>> {
    let mut writer = FrameWriter::new(Vec::new());
    for payload in payloads {
        writer
            .send(payload)
            .map_err(|err| frame_error("encode failed", err))?;
    }
    Ok(writer.into_inner())
}

fn resolve_payloads(args: &EncodeArgs) -> CliResult<Vec<Vec<u8>>> {
    if !args.hex.is_empty() {
        return args.hex.iter().map(|s| parse_hex(s)).collect();
    }
    if let Some(path) = &args.file {
        let payload = fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        return Ok(vec![payload]);
    }
    Ok(args.data.iter().map(|s| s.as_bytes().to_vec()).collect())
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: Vec<u8> = input
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':')
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("--hex {input:?} has an odd number of digits"),
        ));
    }

    digits
        .chunks(2)
        .map(|pair| {
            let text = std::str::from_utf8(pair).unwrap_or("");
            u8::from_str_radix(text, 16).map_err(|_| {
                CliError::new(USAGE, format!("--hex {input:?} is not valid hex"))
            })
        })
        .collect()
}
