use sensorlink_node::{send_command, Command};
use sensorlink_transport::{open_device, Access, UnixDomainSocket};
use tracing::info;

use crate::cmd::ControlArgs;
use crate::exit::{command_error, node_error, transport_error, CliResult, SUCCESS};

pub fn run(args: ControlArgs) -> CliResult<i32> {
    let command = Command::parse(&args.text).map_err(|err| command_error("invalid command", err))?;

    let mut channel = if args.uds {
        UnixDomainSocket::connect(&args.path).map_err(|err| transport_error("connect failed", err))?
    } else {
        open_device(&args.path, Access::Write).map_err(|err| transport_error("open failed", err))?
    };

    send_command(&mut channel, &command).map_err(|err| node_error("send failed", err))?;
    info!(%command, path = %args.path.display(), "command sent");
    Ok(SUCCESS)
}
