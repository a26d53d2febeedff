// stagelink-probe - console diagnostic for the hardware abstraction.
//
// Enumerates drivers, initializes the interface (falling back to the
// software loopback when nothing binds), runs a short metered passthrough
// session and prints the performance snapshot.

use std::time::Duration;

use stagelink::{AudioInterface, PassthroughProcessor, StreamConfig};

const PROBE_SESSION_MS: u64 = 500;

fn main() {
    env_logger::init();

    println!("=== stagelink probe ===\n");

    let mut interface = AudioInterface::new();

    println!("Scanning for audio drivers...");
    let config = StreamConfig::default();
    let report = match interface.initialize(config) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("ERROR: {e}");
            return;
        }
    };

    for (driver, error) in &report.bind_failures {
        println!("  {driver}: skipped ({error})");
    }
    if report.fell_back {
        println!("  No vendor driver bound - simulation mode\n");
    }

    println!("Bound: {} [{}]", interface.name(), interface.kind());
    println!(
        "Config: {} Hz, {} frames, {} in / {} out",
        report.effective.sample_rate,
        report.effective.buffer_frames,
        report.effective.input_channels,
        report.effective.output_channels,
    );
    println!("Latency: {:.3} ms\n", interface.current_latency_ms());

    println!("Streaming passthrough for {PROBE_SESSION_MS} ms...");
    if let Err(e) = interface.start_streaming(Box::new(PassthroughProcessor)) {
        eprintln!("ERROR: stream start failed: {e}");
        interface.shutdown();
        return;
    }

    std::thread::sleep(Duration::from_millis(PROBE_SESSION_MS));
    interface.stop_streaming();

    let snapshot = interface.metrics();
    println!("\nPerformance snapshot:");
    println!("  latency:   {:.3} ms", snapshot.latency_ms);
    println!("  cpu:       {:.2} %", snapshot.cpu_usage_percent);
    println!("  underruns: {}", snapshot.buffer_underrun_count);

    for notification in interface.drain_notifications() {
        println!("  [{:?}] {}", notification.level, notification.message);
    }

    interface.shutdown();
    println!("\nDone.");
}
