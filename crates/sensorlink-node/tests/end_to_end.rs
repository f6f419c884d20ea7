use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use sensorlink_frame::{FrameConfig, FRAME_LEN};
use sensorlink_node::{
    Command, CommandReader, IngestConfig, IngestContext, JsonLinesSink, Producer, ProducerConfig,
    SensorData, SyntheticSampler,
};
use sensorlink_transport::SharedRegion;

fn fast_producer(max_frames: u64, autostart: bool) -> ProducerConfig {
    ProducerConfig {
        sample_period: Duration::from_millis(2),
        idle_poll: Duration::from_millis(1),
        autostart,
        max_frames: Some(max_frames),
    }
}

fn fast_ingest() -> IngestConfig {
    IngestConfig {
        poll_interval: Duration::from_millis(1),
        ..IngestConfig::default()
    }
}

#[test]
fn producer_to_consumer_over_shared_region() {
    let (writer, reader) = SharedRegion::with_capacity(16 * FRAME_LEN).split();

    let producer = std::thread::spawn(move || {
        let mut producer = Producer::new(SyntheticSampler::new(), writer, fast_producer(25, true));
        let stop = AtomicBool::new(false);
        producer.run(&stop, &mut ()).unwrap()
        // writer drops here, which closes the region for the consumer
    });

    let mut ctx = IngestContext::new(reader, fast_ingest());
    let mut out: Vec<SensorData> = Vec::new();
    let stop = AtomicBool::new(false);
    let stats = ctx.run(&mut out, &stop).unwrap();
    let produced = producer.join().unwrap();

    assert_eq!(produced.frames_sent + produced.frames_dropped, 25);
    assert_eq!(stats.records_delivered, produced.frames_sent);
    assert_eq!(stats.deframe.checksum_failures, 0);
    assert_eq!(stats.deframe.bytes_discarded, 0);

    let seqs: Vec<u32> = out.iter().map(|d| d.frame_no).collect();
    assert!(seqs.windows(2).all(|w| w[0] < w[1]), "order preserved: {seqs:?}");
    assert_eq!(out[0].frame_no, 0);
    assert_eq!(out[0].temperature, 20.0);
}

#[test]
fn small_ring_still_recovers_every_frame() {
    let (writer, reader) = SharedRegion::with_capacity(64 * FRAME_LEN).split();
    let mut producer = Producer::new(SyntheticSampler::new(), writer, fast_producer(40, true));
    for _ in 0..40 {
        producer.tick().unwrap();
    }
    drop(producer);

    let config = IngestConfig {
        frame: FrameConfig {
            ring_capacity: FRAME_LEN + 3,
            read_chunk: 7,
            ..FrameConfig::default()
        },
        ..fast_ingest()
    };
    let mut ctx = IngestContext::new(reader, config);
    let mut out: Vec<SensorData> = Vec::new();
    ctx.run(&mut out, &AtomicBool::new(false)).unwrap();

    let seqs: Vec<u32> = out.iter().map(|d| d.frame_no).collect();
    assert_eq!(seqs, (0..40).collect::<Vec<_>>());
}

#[test]
#[cfg(unix)]
fn commands_and_frames_share_a_socket() {
    use sensorlink_transport::UnixDomainSocket;

    let dir = std::env::temp_dir().join(format!("sensorlink-node-e2e-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let sock_path = dir.join("node.sock");
    let listener = UnixDomainSocket::bind(&sock_path).unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let producer_stop = Arc::clone(&stop);
    let producer = std::thread::spawn(move || {
        let stream = listener.accept().unwrap();
        let command_side = stream.try_clone().unwrap();
        command_side.set_nonblocking(true).unwrap();
        let mut commands = CommandReader::new(command_side);

        let mut producer = Producer::new(SyntheticSampler::new(), stream, fast_producer(5, false));
        producer.run(&producer_stop, &mut commands).unwrap()
    });

    let mut channel = UnixDomainSocket::connect(&sock_path).unwrap();
    sensorlink_node::send_command(&mut channel, &Command::SamplePeriod(1)).unwrap();
    sensorlink_node::send_command(&mut channel, &Command::Start).unwrap();

    let config = IngestConfig {
        max_records: Some(5),
        frame: FrameConfig {
            read_timeout: Some(Duration::from_millis(50)),
            ..FrameConfig::default()
        },
        ..fast_ingest()
    };
    let mut ctx = IngestContext::with_channel(channel, config).unwrap();
    let mut sink = JsonLinesSink::new(Vec::new());
    let stats = ctx.run(&mut sink, &AtomicBool::new(false)).unwrap();
    let produced = producer.join().unwrap();

    assert_eq!(stats.records_delivered, 5);
    assert_eq!(produced.frames_sent, 5);
    assert_eq!(produced.commands_applied, 2);

    let text = String::from_utf8(sink.into_inner()).unwrap();
    let frame_numbers: Vec<u64> = text
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["frmNo"].as_u64().unwrap()
        })
        .collect();
    assert_eq!(frame_numbers, vec![0, 1, 2, 3, 4]);
    let _ = std::fs::remove_dir_all(&dir);
}
