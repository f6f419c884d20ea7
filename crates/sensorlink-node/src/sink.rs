use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use sensorlink_frame::Record;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A validated record as handed downstream, stamped on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorData {
    #[serde(rename = "frmNo")]
    pub frame_no: u32,
    /// Unix time in milliseconds when the frame validated on the consumer.
    #[serde(rename = "ts")]
    pub timestamp_ms: u64,
    pub temperature: f32,
    pub gyro_x: f32,
    pub gyro_y: f32,
    pub gyro_z: f32,
}

impl SensorData {
    pub fn from_record(record: Record, timestamp_ms: u64) -> Self {
        Self {
            frame_no: record.seq,
            timestamp_ms,
            temperature: record.temperature,
            gyro_x: record.gyro_x,
            gyro_y: record.gyro_y,
            gyro_z: record.gyro_z,
        }
    }

    /// Stamp `record` with the current wall-clock time.
    pub fn capture(record: Record) -> Self {
        Self::from_record(record, unix_millis())
    }

    pub fn record(&self) -> Record {
        Record::new(
            self.frame_no,
            self.temperature,
            self.gyro_x,
            self.gyro_y,
            self.gyro_z,
        )
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Downstream consumer of validated records.
///
/// Called exactly once per emitted frame, in arrival order.
pub trait RecordSink {
    fn deliver(&mut self, data: SensorData) -> Result<()>;
}

impl RecordSink for Vec<SensorData> {
    fn deliver(&mut self, data: SensorData) -> Result<()> {
        self.push(data);
        Ok(())
    }
}

impl<K: RecordSink + ?Sized> RecordSink for &mut K {
    fn deliver(&mut self, data: SensorData) -> Result<()> {
        (**self).deliver(data)
    }
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F> RecordSink for FnSink<F>
where
    F: FnMut(SensorData) -> Result<()>,
{
    fn deliver(&mut self, data: SensorData) -> Result<()> {
        (self.0)(data)
    }
}

/// Writes one JSON object per line.
pub struct JsonLinesSink<W> {
    writer: W,
    written: u64,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn deliver(&mut self, data: SensorData) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &data)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }
}
