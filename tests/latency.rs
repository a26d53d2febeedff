// Integration test: latency accounting
//
// getCurrentLatency must always equal buffer_frames/sample_rate plus the
// backend-reported term, for every supported configuration. Driven through
// the software loopback (empty discovery) so results are deterministic on
// machines without audio hardware.

use approx::assert_relative_eq;
use stagelink::{
    AudioInterface, DriverRegistry, StreamConfig, SUPPORTED_BUFFER_SIZES, SUPPORTED_SAMPLE_RATES,
};

fn offline_interface() -> AudioInterface {
    AudioInterface::with_registry(DriverRegistry::from_names(vec![]))
}

#[test]
fn test_ultra_low_preset_latency() {
    // 32 frames @ 96kHz, no native latency: 0.333 ms theoretical
    let mut interface = offline_interface();
    interface.initialize(StreamConfig::new(96_000, 32)).unwrap();

    assert_relative_eq!(
        interface.current_latency_ms(),
        32.0 / 96_000.0 * 1000.0,
        max_relative = 1e-9
    );
    assert!((interface.current_latency_ms() - 0.333).abs() < 0.001);
}

#[test]
fn test_low_preset_latency() {
    // 64 frames @ 48kHz: 1.333 ms
    let mut interface = offline_interface();
    interface.initialize(StreamConfig::new(48_000, 64)).unwrap();

    assert_relative_eq!(
        interface.current_latency_ms(),
        64.0 / 48_000.0 * 1000.0,
        max_relative = 1e-9
    );
    assert!((interface.current_latency_ms() - 1.333).abs() < 0.001);
}

#[test]
fn test_latency_formula_across_full_preset_grid() {
    for &sample_rate in &SUPPORTED_SAMPLE_RATES {
        for &buffer_frames in &SUPPORTED_BUFFER_SIZES {
            let mut interface = offline_interface();
            let report = interface
                .initialize(StreamConfig::new(sample_rate, buffer_frames))
                .unwrap();

            // Loopback supports every preset, so the request passes through.
            assert_eq!(report.effective.sample_rate, sample_rate);
            assert_eq!(report.effective.buffer_frames, buffer_frames);

            let expected = buffer_frames as f64 / sample_rate as f64 * 1000.0;
            assert_relative_eq!(
                interface.current_latency_ms(),
                expected,
                max_relative = 1e-9
            );

            // Sub-3ms round trip is reachable at the small buffer sizes.
            if buffer_frames <= 128 && sample_rate >= 48_000 {
                assert!(
                    interface.current_latency_ms() < 3.0,
                    "{buffer_frames} frames @ {sample_rate} Hz not ultra-low: {:.3} ms",
                    interface.current_latency_ms()
                );
            }

            interface.shutdown();
        }
    }
}

#[test]
fn test_uninitialized_latency_is_theoretical_default() {
    let interface = offline_interface();
    // Default config: 32 frames @ 96 kHz, buffer-only term.
    assert_relative_eq!(
        interface.current_latency_ms(),
        32.0 / 96_000.0 * 1000.0,
        max_relative = 1e-9
    );
}

#[test]
fn test_latency_never_negative_or_undefined() {
    let mut interface = offline_interface();
    assert!(interface.current_latency_ms().is_finite());

    interface.initialize(StreamConfig::default()).unwrap();
    assert!(interface.current_latency_ms().is_finite());
    assert!(interface.current_latency_ms() > 0.0);

    interface.shutdown();
    assert!(interface.current_latency_ms().is_finite());
    assert!(interface.current_latency_ms() > 0.0);
}

#[test]
fn test_metrics_latency_matches_query_after_initialize() {
    let mut interface = offline_interface();
    interface.initialize(StreamConfig::new(48_000, 128)).unwrap();

    let snapshot = interface.metrics();
    assert_relative_eq!(
        snapshot.latency_ms,
        interface.current_latency_ms(),
        max_relative = 1e-9
    );
}
