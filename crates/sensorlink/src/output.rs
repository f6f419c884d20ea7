use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use sensorlink_frame::{Record, FRAME_LEN, WORD_SIZE};
use sensorlink_node::SensorData;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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

const WORD_NAMES: [&str; FRAME_LEN / WORD_SIZE] = [
    "magic",
    "seq",
    "temperature",
    "gyro_x",
    "gyro_y",
    "gyro_z",
    "checksum",
];

pub fn print_record(data: &SensorData, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(data).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FRAME", "TS", "TEMPERATURE", "GYRO X", "GYRO Y", "GYRO Z"])
                .add_row(vec![
                    data.frame_no.to_string(),
                    data.timestamp_ms.to_string(),
                    data.temperature.to_string(),
                    data.gyro_x.to_string(),
                    data.gyro_y.to_string(),
                    data.gyro_z.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "frame={} ts={} temperature={} gyro=({}, {}, {})",
                data.frame_no,
                data.timestamp_ms,
                data.temperature,
                data.gyro_x,
                data.gyro_y,
                data.gyro_z
            );
        }
    }
}

#[derive(Serialize)]
struct EncodedOutput<'a> {
    seq: u32,
    temperature: f32,
    gyro: [f32; 3],
    len: usize,
    hex: &'a str,
}

pub fn print_encoded(record: &Record, frame: &[u8; FRAME_LEN], format: OutputFormat) {
    let hex = to_hex(frame);
    match format {
        OutputFormat::Json => {
            let out = EncodedOutput {
                seq: record.seq,
                temperature: record.temperature,
                gyro: [record.gyro_x, record.gyro_y, record.gyro_z],
                len: frame.len(),
                hex: &hex,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["OFFSET", "FIELD", "BYTES"]);
            for (index, word) in frame.chunks_exact(WORD_SIZE).enumerate() {
                table.add_row(vec![
                    (index * WORD_SIZE).to_string(),
                    WORD_NAMES[index].to_string(),
                    to_hex(word),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let words: Vec<String> = frame.chunks_exact(WORD_SIZE).map(to_hex).collect();
            println!("seq={} frame={}", record.seq, words.join(" "));
        }
    }
}

/// Print a named set of counters as one summary object.
pub fn print_counters(kind: &str, counters: &[(&str, u64)], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let mut out = serde_json::Map::new();
            out.insert("summary".to_string(), kind.into());
            for (name, value) in counters {
                out.insert((*name).to_string(), (*value).into());
            }
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![kind.to_uppercase(), "VALUE".to_string()]);
            for (name, value) in counters {
                table.add_row(vec![(*name).to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let fields: Vec<String> = counters
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            println!("{kind}: {}", fields.join(" "));
        }
    }
}

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Accepts whitespace between byte pairs.
pub fn from_hex(text: &str) -> Option<Vec<u8>> {
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks_exact(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(pair, 16).ok()
        })
        .collect()
}
