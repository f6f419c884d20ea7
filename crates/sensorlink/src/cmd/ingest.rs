use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use sensorlink_frame::{FrameConfig, FRAME_LEN};
use sensorlink_node::{send_command, Command, FnSink, IngestConfig, IngestContext, SensorData};
use sensorlink_transport::{open_device, Access, ChannelStream, UnixDomainSocket};
use tracing::info;

use crate::cmd::{install_ctrlc_handler, parse_duration, IngestArgs};
use crate::exit::{
    command_error, node_error, transport_error, CliError, CliResult, SUCCESS, USAGE,
};
use crate::output::{print_record, OutputFormat};

pub fn run(args: IngestArgs, format: OutputFormat) -> CliResult<i32> {
    if args.ring_capacity < FRAME_LEN {
        return Err(CliError::new(
            USAGE,
            format!("ring capacity must be at least {FRAME_LEN} bytes"),
        ));
    }
    let poll_interval = parse_duration(&args.poll_interval)?;
    let commands = args
        .send
        .iter()
        .map(|text| Command::parse(text).map_err(|err| command_error("invalid --send", err)))
        .collect::<CliResult<Vec<_>>>()?;

    let config = IngestConfig {
        poll_interval,
        frame: FrameConfig {
            ring_capacity: args.ring_capacity,
            read_chunk: args.read_chunk.unwrap_or(args.ring_capacity),
            read_timeout: Some(poll_interval),
            ..FrameConfig::default()
        },
        max_records: args.count,
    };

    let stop = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(stop.clone())?;

    let mut channel = open_channel(&args, !commands.is_empty())?;
    for command in &commands {
        send_command(&mut channel, command).map_err(|err| node_error("send failed", err))?;
        info!(%command, "command sent");
    }

    let mut ctx = IngestContext::with_channel(channel, config)
        .map_err(|err| node_error("configure failed", err))?;
    let mut sink = FnSink(|data: SensorData| -> sensorlink_node::Result<()> {
        print_record(&data, format);
        Ok(())
    });
    ctx.run(&mut sink, &stop)
        .map_err(|err| node_error("ingest failed", err))?;

    Ok(SUCCESS)
}

fn open_channel(args: &IngestArgs, writes_commands: bool) -> CliResult<ChannelStream> {
    if args.uds {
        return UnixDomainSocket::connect(&args.path)
            .map_err(|err| transport_error("connect failed", err));
    }
    let access = if writes_commands {
        Access::ReadWrite
    } else {
        Access::Read
    };
    open_device(&args.path, access).map_err(|err| transport_error("open failed", err))
}
