//! End-to-end pipeline scenarios against the simulated HAL

use std::time::Duration;

use helios::error::{Error, ErrorKind};
use helios::hal::sim::{
    synthetic_unit, MemorySink, SimConfig, SimHardware, CAMERA_VIDEO, ENCODER_OUTPUT,
    SIM_FAULT_CODE,
};
use helios::hal::Encoding;
use helios::pipeline::{PipelineDriver, PipelineState};
use helios::{CaptureConfig, Config, EncodeConfig, OutputConfig, PipelineConfig};

fn test_config() -> Config {
    Config {
        capture: CaptureConfig {
            camera: Some(0),
            width: 1440,
            height: 1080,
            fps: 25,
        },
        encode: EncodeConfig { bitrate: 4_000_000 },
        output: OutputConfig {
            path: String::new(),
        },
        pipeline: PipelineConfig { frame_limit: 0 },
    }
}

fn make_driver(hw: &SimHardware, sink: MemorySink) -> PipelineDriver {
    PipelineDriver::new(hw, hw, hw, Box::new(sink), &test_config()).expect("pipeline construction")
}

#[test]
fn records_until_end_of_stream() {
    let hw = SimHardware::new(SimConfig {
        frame_limit: 6,
        frame_interval: Duration::from_millis(1),
        ..SimConfig::default()
    });
    let sink = MemorySink::new();
    let mut driver = make_driver(&hw, sink.clone());

    driver.run().expect("graceful end of stream");
    assert_eq!(driver.state(), PipelineState::Stopped);

    // Output bytes appear in emission order, every frame exactly once.
    let expected: Vec<u8> = (0..6).flat_map(synthetic_unit).collect();
    assert_eq!(sink.concat(), expected);

    // Conservation: every pool buffer is recovered at teardown.
    assert_eq!(driver.drained_buffers(), Some(4));
    assert_eq!(hw.queued_buffers(), 0);
    assert!(!hw.tunnel_enabled());

    drop(driver);
    assert_eq!(hw.live_handles(), 0);
}

#[test]
fn negotiates_aligned_format_with_exact_crop() {
    let hw = SimHardware::new(SimConfig::default());
    let sink = MemorySink::new();
    let _driver = make_driver(&hw, sink);

    // 1440 is already a multiple of 32; 1080 rounds up to 1088.
    let video = hw.negotiated(CAMERA_VIDEO).expect("video port negotiated");
    assert_eq!((video.width, video.height), (1440, 1088));
    assert_eq!((video.crop_width, video.crop_height), (1440, 1080));
    assert_eq!(video.frame_rate, 25);
    assert_eq!(video.encoding, Encoding::Raw);

    let output = hw
        .negotiated(ENCODER_OUTPUT)
        .expect("encoder output negotiated");
    assert_eq!(output.encoding, Encoding::H264);
    assert_eq!(output.bitrate, 4_000_000);
}

#[test]
fn enabling_the_encoder_supplies_the_whole_pool() {
    let hw = SimHardware::new(SimConfig::default());
    let mut driver = make_driver(&hw, MemorySink::new());

    driver.start().expect("startup");
    // Resupply-on-enable: one submit per pool buffer, nothing held back.
    assert_eq!(hw.total_submitted(), 4);
    assert_eq!(hw.queued_buffers(), 4);

    driver.stop();
}

#[test]
fn error_flushes_already_captured_frames_first() {
    let hw = SimHardware::new(SimConfig::default());
    let sink = MemorySink::new();
    let mut driver = make_driver(&hw, sink.clone());

    driver.start().expect("startup");
    assert!(hw.complete_frame(b"alpha"));
    assert!(hw.complete_frame(b"beta"));
    assert!(hw.complete_frame(b"gamma"));
    hw.inject_error(SIM_FAULT_CODE);

    match driver.run() {
        Err(Error::Hardware(code)) => assert_eq!(code, SIM_FAULT_CODE),
        other => panic!("expected hardware error, got {other:?}"),
    }
    assert_eq!(driver.state(), PipelineState::Failed(ErrorKind::Hardware));

    // Exactly the three captured frames, in completion order.
    let chunks = sink.chunks();
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0], b"alpha");
    assert_eq!(chunks[1], b"beta");
    assert_eq!(chunks[2], b"gamma");

    // Flushed buffers were recycled, hardware ones reclaimed: no leaks.
    assert_eq!(driver.drained_buffers(), Some(4));
}

#[test]
fn sink_write_failure_drains_the_pipeline() {
    let hw = SimHardware::new(SimConfig::default());
    let sink = MemorySink::failing_after(1);
    let mut driver = make_driver(&hw, sink.clone());

    driver.start().expect("startup");
    assert!(hw.complete_frame(b"first"));
    assert!(hw.complete_frame(b"second"));

    match driver.run() {
        Err(Error::Io(_)) => {}
        other => panic!("expected io error, got {other:?}"),
    }
    assert_eq!(driver.state(), PipelineState::Failed(ErrorKind::Io));
    assert_eq!(sink.chunks(), vec![b"first".to_vec()]);
}

#[test]
fn failed_capture_start_tears_down_completely() {
    let hw = SimHardware::new(SimConfig {
        fail_capture_start: true,
        ..SimConfig::default()
    });
    let mut driver = make_driver(&hw, MemorySink::new());

    assert!(matches!(driver.run(), Err(Error::Hardware(_))));
    assert_eq!(driver.state(), PipelineState::Failed(ErrorKind::Hardware));
    assert!(!hw.tunnel_enabled());
    assert_eq!(hw.queued_buffers(), 0);

    drop(driver);
    assert_eq!(hw.live_handles(), 0);
}

#[test]
fn failed_encoder_creation_releases_the_camera() {
    let hw = SimHardware::new(SimConfig {
        fail_encoder_creation: true,
        ..SimConfig::default()
    });
    let result = PipelineDriver::new(&hw, &hw, &hw, Box::new(MemorySink::new()), &test_config());

    assert!(matches!(result, Err(Error::CreationFailed { .. })));
    assert_eq!(hw.live_handles(), 0);
}

#[test]
fn rejected_format_aborts_startup() {
    let hw = SimHardware::new(SimConfig {
        reject_formats: true,
        ..SimConfig::default()
    });
    let result = PipelineDriver::new(&hw, &hw, &hw, Box::new(MemorySink::new()), &test_config());

    assert!(matches!(result, Err(Error::FormatRejected { .. })));
    assert_eq!(hw.live_handles(), 0);
}

#[test]
fn unsupported_sensor_is_rejected() {
    let hw = SimHardware::new(SimConfig {
        cameras: vec!["n/a".to_string()],
        ..SimConfig::default()
    });
    let result = PipelineDriver::new(&hw, &hw, &hw, Box::new(MemorySink::new()), &test_config());

    assert!(matches!(result, Err(Error::UnsupportedDevice { .. })));
    assert_eq!(hw.live_handles(), 0);
}

#[test]
fn auto_detection_skips_bad_sensors() {
    let hw = SimHardware::new(SimConfig {
        cameras: vec!["n/a".to_string(), "imx477".to_string()],
        ..SimConfig::default()
    });
    let mut config = test_config();
    config.capture.camera = None;

    let driver = PipelineDriver::new(&hw, &hw, &hw, Box::new(MemorySink::new()), &config)
        .expect("second camera is usable");
    drop(driver);
    assert_eq!(hw.live_handles(), 0);
}

#[test]
fn end_of_stream_flushes_pending_and_stop_is_idempotent() {
    let hw = SimHardware::new(SimConfig::default());
    let sink = MemorySink::new();
    let mut driver = make_driver(&hw, sink.clone());

    driver.start().expect("startup");
    assert!(hw.complete_frame(b"tail"));
    hw.end_stream();

    driver.run().expect("graceful end of stream");
    assert_eq!(driver.state(), PipelineState::Stopped);
    assert_eq!(sink.chunks(), vec![b"tail".to_vec()]);

    let drained = driver.drained_buffers();
    driver.stop();
    driver.stop();
    assert_eq!(driver.drained_buffers(), drained);
    assert_eq!(driver.state(), PipelineState::Stopped);
    assert_eq!(hw.queued_buffers(), 0);
}

#[test]
fn backpressure_is_not_fatal() {
    use helios::encode::EncodeSink;
    use helios::hal::EncodeDriver;

    let hw = SimHardware::new(SimConfig::default());
    let encoder = &hw as &dyn EncodeDriver;
    let capture_format = helios::capture::format::raw_format(1440, 1080, 25);
    let encode = EncodeSink::new(encoder, &capture_format, &EncodeConfig { bitrate: 1_000_000 })
        .expect("encoder construction");

    let events = std::sync::Arc::new(helios::pipeline::EventNotifier::new());
    encode.enable_output(std::sync::Arc::clone(&events)).unwrap();
    encode.enable().expect("enable with resupply");
    assert_eq!(hw.queued_buffers(), 4);

    // The whole pool is in flight: acquiring for another submit is an
    // expected empty, and the completion FIFO is untouched.
    match encode.send_buffer() {
        Err(Error::PoolExhausted) => {}
        other => panic!("expected pool exhaustion, got {other:?}"),
    }
    assert_eq!(hw.queued_buffers(), 4);
    assert_eq!(events.pending(), 0);
}
