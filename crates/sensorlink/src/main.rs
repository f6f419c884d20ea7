mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "sensorlink", version, about = "Sensor frame link CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", env = "SENSORLINK_FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(
        long,
        value_name = "FORMAT",
        default_value = "text",
        env = "SENSORLINK_LOG_FORMAT",
        global = true
    )]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "SENSORLINK_LOG_LEVEL",
        global = true
    )]
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
    fn parses_produce_subcommand() {
        let cli = Cli::try_parse_from([
            "sensorlink",
            "produce",
            "/tmp/sensor.sock",
            "--uds",
            "--period",
            "250ms",
            "--count",
            "10",
            "--autostart",
        ])
        .expect("produce args should parse");

        match cli.command {
            Command::Produce(args) => {
                assert!(args.uds);
                assert!(args.autostart);
                assert_eq!(args.count, Some(10));
                assert_eq!(args.period, "250ms");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_encode_gyro_triplet() {
        let cli = Cli::try_parse_from([
            "sensorlink",
            "encode",
            "--seq",
            "3",
            "--temperature",
            "21.5",
            "--gyro",
            "0.5,-1,2",
        ])
        .expect("encode args should parse");

        match cli.command {
            Command::Encode(args) => assert_eq!(args.gyro, vec![0.5, -1.0, 2.0]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_commands_file_with_uds() {
        let err = Cli::try_parse_from([
            "sensorlink",
            "produce",
            "/tmp/sensor.sock",
            "--uds",
            "--commands",
            "/dev/ttyRPMSG1",
        ])
        .expect_err("conflicting args should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_command_subcommand() {
        let cli = Cli::try_parse_from(["sensorlink", "command", "/dev/ttyRPMSG0", "SAMPERIOD:5"])
            .expect("command args should parse");
        assert!(matches!(cli.command, Command::Control(_)));
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "sensorlink",
            "decode",
            "capture.bin",
            "--format",
            "json",
            "--log-level",
            "error",
        ])
        .expect("global flags should parse after subcommand");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        assert!(matches!(cli.log_level, LogLevel::Error));
    }
}
