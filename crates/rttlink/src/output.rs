use std::fmt::Write as _;
use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rttlink_frame::Frame;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput {
    index: usize,
    size: usize,
    hex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    f32: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

impl FrameOutput {
    fn new(index: usize, frame: &Frame) -> Self {
        Self {
            index,
            size: frame.len(),
            hex: to_hex(frame.as_ref()),
            f32: frame.as_f32_le(),
            text: printable_text(frame.as_ref()),
        }
    }
}

/// Print decoded frames, numbered from zero.
pub fn print_frames(frames: &[Frame], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for (index, frame) in frames.iter().enumerate() {
                let out = FrameOutput::new(index, frame);
                println!(
                    "{}",
                    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "SIZE", "HEX", "VALUE"]);
            for (index, frame) in frames.iter().enumerate() {
                table.add_row(vec![
                    index.to_string(),
                    frame.len().to_string(),
                    to_hex(frame.as_ref()),
                    value_preview(frame),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (index, frame) in frames.iter().enumerate() {
                println!(
                    "frame={} size={} hex={} value={}",
                    index,
                    frame.len(),
                    to_hex(frame.as_ref()),
                    value_preview(frame)
                );
            }
        }
        OutputFormat::Raw => {
            for frame in frames {
                print_raw(frame.as_ref());
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn to_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn value_preview(frame: &Frame) -> String {
    if let Some(value) = frame.as_f32_le() {
        return format!("{value}");
    }
    printable_text(frame.as_ref()).unwrap_or_default()
}

fn printable_text(payload: &[u8]) -> Option<String> {
    if payload.is_empty() {
        return None;
    }
    let text = std::str::from_utf8(payload).ok()?;
    text.chars()
        .all(|c| !c.is_control() || c == '\n' || c == '\t')
        .then(|| text.to_string())
}
