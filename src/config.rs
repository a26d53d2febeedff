// Stream configuration and negotiation presets

/// Sample rates the abstraction advertises to callers.
///
/// Individual backends may support a narrower set; negotiation snaps to the
/// nearest value the backend accepts.
pub const SUPPORTED_SAMPLE_RATES: [u32; 4] = [44_100, 48_000, 96_000, 192_000];

/// Canonical buffer sizes in frames, smallest first.
pub const SUPPORTED_BUFFER_SIZES: [u32; 6] = [32, 64, 128, 256, 512, 1024];

/// Ultra-low-latency monitoring preset: 0.33 ms per period at 96 kHz.
pub const DEFAULT_SAMPLE_RATE: u32 = 96_000;
pub const DEFAULT_BUFFER_FRAMES: u32 = 32;

/// Channel counts used when nothing more specific is known.
pub const DEFAULT_CHANNELS: u16 = 8;

/// Requested stream parameters, supplied by the caller at initialize time.
///
/// Immutable for the lifetime of a bound session. The backend answers with
/// an [`EffectiveConfig`] that may differ from the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Period length in frames.
    pub buffer_frames: u32,
    /// Requested capture channel count.
    pub input_channels: u16,
    /// Requested playback channel count.
    pub output_channels: u16,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_frames: DEFAULT_BUFFER_FRAMES,
            input_channels: DEFAULT_CHANNELS,
            output_channels: DEFAULT_CHANNELS,
        }
    }
}

impl StreamConfig {
    pub fn new(sample_rate: u32, buffer_frames: u32) -> Self {
        Self {
            sample_rate,
            buffer_frames,
            ..Self::default()
        }
    }

    /// Duration of one buffer period in milliseconds.
    pub fn period_ms(&self) -> f64 {
        self.buffer_frames as f64 / self.sample_rate as f64 * 1000.0
    }
}

/// Parameters actually granted by a backend after negotiation.
///
/// `native_latency_frames` is the extra buffering the driver reports beyond
/// the nominal period; zero for the software fallback, where the computed
/// latency is a theoretical minimum rather than a measured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub sample_rate: u32,
    pub buffer_frames: u32,
    pub input_channels: u16,
    pub output_channels: u16,
    pub native_latency_frames: u32,
}

impl EffectiveConfig {
    /// Round-trip latency in milliseconds: one buffer period plus whatever
    /// extra buffering the driver reports.
    pub fn latency_ms(&self) -> f64 {
        latency_ms(
            self.sample_rate,
            self.buffer_frames,
            self.native_latency_frames,
        )
    }

    /// True when the backend granted something other than the request.
    pub fn differs_from(&self, request: &StreamConfig) -> bool {
        self.sample_rate != request.sample_rate || self.buffer_frames != request.buffer_frames
    }
}

/// `buffer_frames / sample_rate` in ms, plus the driver-reported term.
///
/// Never negative; `sample_rate` is validated non-zero at negotiation time.
pub fn latency_ms(sample_rate: u32, buffer_frames: u32, native_latency_frames: u32) -> f64 {
    let rate = sample_rate as f64;
    (buffer_frames as f64 / rate) * 1000.0 + (native_latency_frames as f64 / rate) * 1000.0
}

/// Snap `requested` to the nearest value in `presets`.
///
/// Nearest by absolute distance; an exact tie resolves to the lower preset
/// (lower latency). `presets` must be non-empty and sorted ascending.
pub fn nearest_preset(requested: u32, presets: &[u32]) -> u32 {
    debug_assert!(!presets.is_empty());

    let mut best = presets[0];
    let mut best_distance = requested.abs_diff(best);

    for &candidate in &presets[1..] {
        let distance = requested.abs_diff(candidate);
        if distance < best_distance {
            best = candidate;
            best_distance = distance;
        }
    }

    best
}
