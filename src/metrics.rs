// Performance accounting - written by the real-time thread, read by the
// control thread. Atomics only: no torn reads, no locks on the audio path.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

/// Thread-safe f64 built on atomic bit storage.
#[derive(Clone)]
pub struct AtomicF64 {
    inner: Arc<AtomicU64>,
}

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self {
            inner: Arc::new(AtomicU64::new(value.to_bits())),
        }
    }

    pub fn set(&self, value: f64) {
        self.inner.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.inner.load(Ordering::Relaxed))
    }
}

impl Default for AtomicF64 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Point-in-time metrics handed from the real-time thread to the control
/// thread as a value, never as a shared mutable reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceSnapshot {
    /// Round-trip latency in ms. Theoretical (buffer-derived) for the
    /// software fallback, buffer + driver-reported for vendor drivers.
    pub latency_ms: f64,
    /// Callback time as a percentage of available period time. Can exceed
    /// 100 when the callback is overrunning its deadline.
    pub cpu_usage_percent: f64,
    /// Periods for which valid output could not be produced in time.
    /// Monotonically non-decreasing within a session.
    pub buffer_underrun_count: u64,
}

/// Collector shared between the callback bridge (writer) and the interface
/// (reader). Cloning shares the underlying counters.
///
/// CPU load is sampled 1 out of N callbacks to keep measurement overhead off
/// most periods; accumulated callback time is compared against accumulated
/// available time.
#[derive(Clone)]
pub struct MetricsCollector {
    latency_ms: AtomicF64,
    underruns: Arc<AtomicU64>,

    total_callback_time_ns: Arc<AtomicU64>,
    total_available_time_ns: Arc<AtomicU64>,
    callback_counter: Arc<AtomicU32>,
    measure_every_n: u32,

    // Period length in ns, published at negotiation time.
    period_ns: Arc<AtomicU64>,
}

impl MetricsCollector {
    pub fn new(measure_every_n: u32) -> Self {
        Self {
            latency_ms: AtomicF64::new(0.0),
            underruns: Arc::new(AtomicU64::new(0)),
            total_callback_time_ns: Arc::new(AtomicU64::new(0)),
            total_available_time_ns: Arc::new(AtomicU64::new(0)),
            callback_counter: Arc::new(AtomicU32::new(0)),
            measure_every_n: measure_every_n.max(1),
            period_ns: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish the negotiated period so CPU accounting knows the deadline.
    pub fn configure(&self, sample_rate: u32, buffer_frames: u32) {
        let period_ns =
            (buffer_frames as f64 / sample_rate as f64 * 1_000_000_000.0) as u64;
        self.period_ns.store(period_ns, Ordering::Relaxed);
    }

    pub fn set_latency_ms(&self, latency_ms: f64) {
        self.latency_ms.set(latency_ms);
    }

    /// Called from the real-time thread when a period had to be silenced.
    #[inline]
    pub fn count_underrun(&self) {
        self.underruns.fetch_add(1, Ordering::Relaxed);
    }

    /// Start of a sampled CPU measurement. Returns `None` for the callbacks
    /// that skip measurement.
    #[inline]
    pub fn begin_period(&self) -> Option<Instant> {
        let count = self.callback_counter.fetch_add(1, Ordering::Relaxed);
        if count % self.measure_every_n == 0 {
            Some(Instant::now())
        } else {
            None
        }
    }

    /// End of a sampled CPU measurement.
    #[inline]
    pub fn end_period(&self, started: Option<Instant>) {
        if let Some(start) = started {
            let elapsed_ns = start.elapsed().as_nanos() as u64;
            let available_ns = self.period_ns.load(Ordering::Relaxed);
            if available_ns == 0 {
                return;
            }
            self.total_callback_time_ns
                .fetch_add(elapsed_ns, Ordering::Relaxed);
            self.total_available_time_ns
                .fetch_add(available_ns, Ordering::Relaxed);
        }
    }

    pub fn cpu_usage_percent(&self) -> f64 {
        let callback = self.total_callback_time_ns.load(Ordering::Relaxed);
        let available = self.total_available_time_ns.load(Ordering::Relaxed);
        if available == 0 {
            return 0.0;
        }
        callback as f64 / available as f64 * 100.0
    }

    pub fn underrun_count(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        PerformanceSnapshot {
            latency_ms: self.latency_ms.get(),
            cpu_usage_percent: self.cpu_usage_percent(),
            buffer_underrun_count: self.underrun_count(),
        }
    }

    /// Back to zero. Only called on a fresh initialize, never mid-session.
    pub fn reset(&self) {
        self.latency_ms.set(0.0);
        self.underruns.store(0, Ordering::Relaxed);
        self.total_callback_time_ns.store(0, Ordering::Relaxed);
        self.total_available_time_ns.store(0, Ordering::Relaxed);
        self.callback_counter.store(0, Ordering::Relaxed);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        // Measure 1 out of 10 callbacks, like the audio engine's monitor.
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_atomic_f64_round_trip() {
        let value = AtomicF64::new(1.333);
        assert_eq!(value.get(), 1.333);
        value.set(-0.25);
        assert_eq!(value.get(), -0.25);
    }

    #[test]
    fn test_fresh_collector_snapshot_is_zero() {
        let metrics = MetricsCollector::default();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.latency_ms, 0.0);
        assert_eq!(snapshot.cpu_usage_percent, 0.0);
        assert_eq!(snapshot.buffer_underrun_count, 0);
    }

    #[test]
    fn test_underruns_are_monotonic() {
        let metrics = MetricsCollector::default();
        for expected in 1..=5 {
            metrics.count_underrun();
            assert_eq!(metrics.underrun_count(), expected);
        }
    }

    #[test]
    fn test_measurement_sampling_rate() {
        let metrics = MetricsCollector::new(10);

        let measured = (0..100)
            .filter(|_| metrics.begin_period().is_some())
            .count();

        assert_eq!(measured, 10);
    }

    #[test]
    fn test_cpu_accounting() {
        let metrics = MetricsCollector::new(1);
        metrics.configure(48_000, 512); // ~10.7 ms available per period

        for _ in 0..5 {
            let started = metrics.begin_period();
            thread::sleep(Duration::from_micros(200));
            metrics.end_period(started);
        }

        let cpu = metrics.cpu_usage_percent();
        assert!(cpu > 0.0);
        assert!(cpu < 100.0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let metrics = MetricsCollector::new(1);
        metrics.configure(48_000, 64);
        metrics.set_latency_ms(1.333);
        metrics.count_underrun();
        let started = metrics.begin_period();
        metrics.end_period(started);

        metrics.reset();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.latency_ms, 0.0);
        assert_eq!(snapshot.cpu_usage_percent, 0.0);
        assert_eq!(snapshot.buffer_underrun_count, 0);
    }

    #[test]
    fn test_clones_share_state() {
        let metrics = MetricsCollector::default();
        let writer = metrics.clone();
        writer.count_underrun();
        writer.set_latency_ms(0.333);

        assert_eq!(metrics.underrun_count(), 1);
        assert_eq!(metrics.snapshot().latency_ms, 0.333);
    }
}
