use std::fs::File;
use std::io::{self, BufReader, Read};

use rttlink_frame::{Frame, FrameReader};
use tracing::debug;

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};
use crate::output::{print_frames, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let input: Box<dyn Read> = match &args.file {
        Some(path) if path.as_os_str() != "-" => {
            let file = File::open(path)
                .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?;
            Box::new(BufReader::new(file))
        }
        _ => Box::new(io::stdin().lock()),
    };

    let frames = decode_all(input, !args.no_flush)?;
    debug!(frames = frames.len(), "decoded capture");
    print_frames(&frames, format);
    Ok(SUCCESS)
}

fn decode_all(input: impl Read, flush: bool) -> CliResult<Vec<Frame>> {
    let mut reader = FrameReader::new(input);
    let mut frames = Vec::new();
    loop {
        let next = if flush {
            reader.read_frame()
        } else {
            reader.read_delimited()
        };
        match next.map_err(|err| frame_error("decode failed", err))? {
            Some(frame) => frames.push(frame),
            None => return Ok(frames),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::DATA_INVALID;

    #[test]
    fn decodes_escaped_capture() {
        let capture: &[u8] = &[0x41, 0x1F, 0x23, 0x03, 0x42, 0x03];
        let frames = decode_all(capture, false).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_ref(), &[0x41, 0x03]);
        assert_eq!(frames[1].as_ref(), &[0x42]);
    }

    #[test]
    fn flush_emits_trailing_bytes() {
        let capture: &[u8] = &[0x01, 0x03, 0x02, 0x02];
        let frames = decode_all(capture, true).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].as_ref(), &[0x02, 0x02]);

        let frames = decode_all(capture, false).unwrap();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn dangling_escape_is_rejected() {
        let capture: &[u8] = &[0x41, 0x1F];
        let err = decode_all(capture, true).unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
    }
}
