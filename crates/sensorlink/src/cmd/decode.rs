use sensorlink_frame::{Deframer, FRAME_LEN};
use sensorlink_node::SensorData;
use tracing::warn;

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{from_hex, print_counters, print_record, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    if args.chunk == 0 {
        return Err(CliError::new(USAGE, "chunk size must be greater than zero"));
    }
    if args.ring_capacity < FRAME_LEN {
        return Err(CliError::new(
            USAGE,
            format!("ring capacity must be at least {FRAME_LEN} bytes"),
        ));
    }

    let raw = std::fs::read(&args.file).map_err(|err| io_error("read failed", err))?;
    let bytes = if args.hex {
        from_hex(&String::from_utf8_lossy(&raw))
            .ok_or_else(|| CliError::new(DATA_INVALID, "input is not valid hex"))?
    } else {
        raw
    };

    let mut deframer = Deframer::new(args.ring_capacity);
    let mut offset = 0;
    while offset < bytes.len() {
        let take = args
            .chunk
            .min(deframer.free())
            .min(bytes.len() - offset);
        deframer
            .append(&bytes[offset..offset + take])
            .map_err(|err| frame_error("append failed", err))?;
        offset += take;
        while let Some(record) = deframer.next_record() {
            print_record(&SensorData::capture(record), format);
        }
    }

    let stats = deframer.stats();
    let trailing = deframer.buffered() as u64;
    print_counters(
        "decode",
        &[
            ("bytes_in", bytes.len() as u64),
            ("frames_emitted", stats.frames_emitted),
            ("checksum_failures", stats.checksum_failures),
            ("bytes_discarded", stats.bytes_discarded),
            ("trailing_bytes", trailing),
        ],
        format,
    );

    if args.strict && (stats.bytes_discarded > 0 || trailing > 0) {
        warn!(
            bytes_discarded = stats.bytes_discarded,
            trailing, "capture is not a clean frame stream"
        );
        return Ok(DATA_INVALID);
    }
    Ok(SUCCESS)
}
