// Processor contract and multi-channel frame buffers

use crate::error::ProcessorError;

/// Pre-allocated multi-channel audio buffer: one `f32` sample sequence per
/// channel, every sequence exactly one period long.
///
/// Allocated once at negotiation time and reused for every period; the
/// real-time path only reads and writes the existing storage.
#[derive(Debug, Clone)]
pub struct FrameSet {
    channels: Vec<Vec<f32>>,
    frames: usize,
}

impl FrameSet {
    pub fn new(channel_count: usize, frames: usize) -> Self {
        Self {
            channels: vec![vec![0.0; frames]; channel_count],
            frames,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        self.channels.iter().map(|c| c.as_slice())
    }

    /// Zero every channel. Allocation-free.
    pub fn silence(&mut self) {
        for channel in &mut self.channels {
            channel.fill(0.0);
        }
    }
}

/// Real-time audio processing callback contract.
///
/// Implementations are supplied by the monitoring/mixing layer and invoked
/// from the backend's real-time thread. `process_audio` must complete within
/// one buffer period of wall time and must not allocate, block, or perform
/// I/O. Buffers are owned by the callback bridge; they must not be retained
/// past the call.
pub trait AudioProcessor: Send {
    /// Called once per successful stream start, synchronously on the control
    /// thread, before the first audio period.
    fn setup_changed(&mut self, sample_rate: u32, buffer_frames: u32);

    /// Process one period. `inputs` and `outputs` hold exactly `frames`
    /// samples per channel. Returning `Err` makes the bridge count an
    /// underrun and play silence for this period; the fault never crosses
    /// the driver boundary.
    fn process_audio(
        &mut self,
        inputs: &FrameSet,
        outputs: &mut FrameSet,
        frames: usize,
    ) -> Result<(), ProcessorError>;
}

/// Copies each input channel straight to the matching output channel.
/// Extra output channels are silenced. Useful for probes and tests.
pub struct PassthroughProcessor;

impl AudioProcessor for PassthroughProcessor {
    fn setup_changed(&mut self, _sample_rate: u32, _buffer_frames: u32) {}

    fn process_audio(
        &mut self,
        inputs: &FrameSet,
        outputs: &mut FrameSet,
        frames: usize,
    ) -> Result<(), ProcessorError> {
        for index in 0..outputs.channel_count() {
            if index < inputs.channel_count() {
                let src = inputs.channel(index);
                outputs.channel_mut(index)[..frames].copy_from_slice(&src[..frames]);
            } else {
                outputs.channel_mut(index)[..frames].fill(0.0);
            }
        }
        Ok(())
    }
}
