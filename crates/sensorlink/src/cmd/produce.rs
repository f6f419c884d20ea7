use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use sensorlink_node::{
    CommandReader, CommandSource, Producer, ProducerConfig, ProducerStats, SyntheticSampler,
};
use sensorlink_transport::{open_device, Access, ChannelStream, UnixDomainSocket};
use tracing::info;

use crate::cmd::{install_ctrlc_handler, parse_duration, ProduceArgs};
use crate::exit::{node_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_counters, OutputFormat};

pub fn run(args: ProduceArgs, format: OutputFormat) -> CliResult<i32> {
    let config = ProducerConfig {
        sample_period: parse_duration(&args.period)?,
        idle_poll: parse_duration(&args.idle_poll)?,
        autostart: args.autostart,
        max_frames: args.count,
    };

    let stop = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(stop.clone())?;

    let (channel, commands) = if args.uds {
        accept_consumer(&args.path)?
    } else {
        open_channels(&args.path, args.commands.as_deref())?
    };

    let mut commands = CommandReader::new(commands);
    let stats = drive(channel, &mut commands, config, &stop)?;

    print_counters(
        "produce",
        &[
            ("frames_sent", stats.frames_sent),
            ("frames_dropped", stats.frames_dropped),
            ("empty_ticks", stats.empty_ticks),
            ("commands_applied", stats.commands_applied),
        ],
        format,
    );
    Ok(SUCCESS)
}

fn drive<C: CommandSource>(
    channel: ChannelStream,
    commands: &mut C,
    config: ProducerConfig,
    stop: &AtomicBool,
) -> CliResult<ProducerStats> {
    let mut producer = Producer::new(SyntheticSampler::new(), channel, config);
    match producer.run(stop, commands) {
        Ok(stats) => Ok(stats),
        Err(err) if err.is_disconnect() => {
            info!("consumer went away");
            Ok(producer.stats())
        }
        Err(err) => Err(node_error("producer failed", err)),
    }
}

fn open_channels(
    path: &Path,
    commands: Option<&Path>,
) -> CliResult<(ChannelStream, ChannelStream)> {
    let channel =
        open_device(path, Access::ReadWrite).map_err(|err| transport_error("open failed", err))?;
    let command_side = match commands {
        Some(command_path) => open_device(command_path, Access::Read)
            .map_err(|err| transport_error("open command channel failed", err))?,
        None => channel
            .try_clone()
            .map_err(|err| transport_error("clone failed", err))?,
    };
    Ok((channel, command_side))
}

/// Serve exactly one consumer. Commands arrive on the same socket, read
/// through a non-blocking clone; the setting is shared, so a full socket
/// buffer drops frames instead of stalling the producer.
fn accept_consumer(path: &Path) -> CliResult<(ChannelStream, ChannelStream)> {
    let listener = UnixDomainSocket::bind(path).map_err(|err| transport_error("bind failed", err))?;
    info!(path = %listener.path().display(), "waiting for consumer");
    let channel = listener
        .accept()
        .map_err(|err| transport_error("accept failed", err))?;
    let command_side = channel
        .try_clone()
        .map_err(|err| transport_error("clone failed", err))?;
    command_side
        .set_nonblocking(true)
        .map_err(|err| transport_error("configure failed", err))?;
    Ok((channel, command_side))
}
