use sensorlink_frame::{encode, Record};

use crate::cmd::EncodeArgs;
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_encoded, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let record = record_from_args(&args)?;
    print_encoded(&record, &encode(&record), format);
    Ok(SUCCESS)
}

fn record_from_args(args: &EncodeArgs) -> CliResult<Record> {
    let [x, y, z] = match args.gyro.as_slice() {
        [] => [0.0; 3],
        [x, y, z] => [*x, *y, *z],
        other => {
            return Err(CliError::new(
                USAGE,
                format!("--gyro takes exactly 3 values, got {}", other.len()),
            ))
        }
    };
    Ok(Record::new(args.seq, args.temperature, x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(gyro: Vec<f32>) -> EncodeArgs {
        EncodeArgs {
            seq: 9,
            temperature: -4.5,
            gyro,
        }
    }

    #[test]
    fn gyro_defaults_to_zero() {
        let record = record_from_args(&args(Vec::new())).unwrap();
        assert_eq!(record, Record::new(9, -4.5, 0.0, 0.0, 0.0));
    }

    #[test]
    fn gyro_needs_three_axes() {
        let err = record_from_args(&args(vec![1.0, 2.0])).unwrap_err();
        assert_eq!(err.code, USAGE);
        assert!(record_from_args(&args(vec![1.0, 2.0, 3.0])).is_ok());
    }
}
