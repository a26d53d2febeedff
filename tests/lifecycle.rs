// Integration test: interface lifecycle
//
// State machine transitions, fallback behavior and idempotency guarantees.
// Registries are seeded with fixed driver name lists so the scenarios run
// the same on every machine.

use stagelink::{
    AudioInterface, BindError, DriverRegistry, HardwareKind, InterfaceState, PassthroughProcessor,
    StreamConfig, StreamError,
};

fn offline_interface() -> AudioInterface {
    AudioInterface::with_registry(DriverRegistry::from_names(vec![]))
}

#[test]
fn test_zero_drivers_still_initializes() {
    let mut interface = offline_interface();
    let report = interface.initialize(StreamConfig::default()).unwrap();

    assert!(report.fell_back);
    assert_eq!(interface.state(), InterfaceState::Initialized);
    assert_eq!(interface.kind(), HardwareKind::Generic);
    assert_eq!(interface.input_channel_count(), 8);
    assert_eq!(interface.output_channel_count(), 8);
    assert!(!interface.is_streaming());
}

#[test]
fn test_phantom_drivers_fall_back_and_report_causes() {
    let mut interface = AudioInterface::with_registry(DriverRegistry::from_names(vec![
        "UAD Apollo X16".to_string(),
        "Generic ASIO Driver".to_string(),
    ]));
    let report = interface.initialize(StreamConfig::default()).unwrap();

    // Neither phantom name exists as a real device, so both binds fail and
    // the interface lands on the loopback - with the causes preserved.
    assert!(report.fell_back);
    assert_eq!(report.bind_failures.len(), 2);
    for (_, error) in &report.bind_failures {
        assert!(matches!(error, BindError::DriverUnavailable(_)));
    }
    assert!(interface.is_initialized());
}

#[test]
fn test_start_before_initialize_is_a_contract_error() {
    let mut interface = offline_interface();
    let result = interface.start_streaming(Box::new(PassthroughProcessor));
    assert!(matches!(result, Err(StreamError::NotInitialized)));
    assert_eq!(interface.state(), InterfaceState::Uninitialized);
}

#[test]
fn test_initialize_while_streaming_is_rejected() {
    let mut interface = offline_interface();
    interface.initialize(StreamConfig::default()).unwrap();
    interface
        .start_streaming(Box::new(PassthroughProcessor))
        .unwrap();

    assert!(matches!(
        interface.initialize(StreamConfig::default()),
        Err(StreamError::AlreadyStreaming)
    ));
    assert!(interface.is_streaming());
    interface.shutdown();
}

#[test]
fn test_shutdown_is_idempotent() {
    let mut interface = offline_interface();
    interface.initialize(StreamConfig::default()).unwrap();
    interface
        .start_streaming(Box::new(PassthroughProcessor))
        .unwrap();

    interface.shutdown();
    let state_after_first = interface.state();
    let latency_after_first = interface.current_latency_ms();

    for _ in 0..4 {
        interface.shutdown();
        assert_eq!(interface.state(), state_after_first);
        assert_eq!(interface.current_latency_ms(), latency_after_first);
        assert_eq!(interface.input_channel_count(), 0);
        assert_eq!(interface.kind(), HardwareKind::Generic);
    }
}

#[test]
fn test_shutdown_implicitly_stops_streaming() {
    let mut interface = offline_interface();
    interface.initialize(StreamConfig::default()).unwrap();
    interface
        .start_streaming(Box::new(PassthroughProcessor))
        .unwrap();
    assert!(interface.is_streaming());

    interface.shutdown();
    assert!(!interface.is_streaming());
    assert_eq!(interface.state(), InterfaceState::Uninitialized);
}

#[test]
fn test_reinitialize_renegotiates() {
    let mut interface = offline_interface();
    let first = interface.initialize(StreamConfig::new(96_000, 32)).unwrap();
    assert_eq!(first.effective.buffer_frames, 32);

    let second = interface.initialize(StreamConfig::new(48_000, 512)).unwrap();
    assert_eq!(second.effective.sample_rate, 48_000);
    assert_eq!(second.effective.buffer_frames, 512);
    assert!((interface.current_latency_ms() - 512.0 / 48_000.0 * 1000.0).abs() < 1e-9);
}

#[test]
fn test_off_preset_request_is_negotiated_not_rejected() {
    let mut interface = offline_interface();
    let report = interface.initialize(StreamConfig::new(50_000, 100)).unwrap();

    assert_eq!(report.effective.sample_rate, 48_000);
    assert_eq!(report.effective.buffer_frames, 128);
    assert!(interface.is_initialized());
}

#[test]
fn test_fallback_name_and_supported_sets() {
    let mut interface = offline_interface();
    interface.initialize(StreamConfig::default()).unwrap();

    assert_eq!(interface.name(), "Software Loopback");
    assert_eq!(interface.supported_sample_rates(), &[44_100, 48_000, 96_000, 192_000]);
    assert_eq!(
        interface.supported_buffer_sizes(),
        &[32, 64, 128, 256, 512, 1024]
    );
}
