// Sample format conversion for device output buffers
//
// All processing is f32 internally; conversion to the device's native format
// (f32, i16, u16) happens while writing into the interleaved output buffer.
// Conversions go through CPAL's `FromSample` trait and are allocation-free,
// suitable for the real-time callback.

use cpal::{FromSample, Sample};

use crate::processor::FrameSet;

/// Write per-channel frames into an interleaved device buffer
/// (e.g. `[ch0, ch1, ch0, ch1, ...]`), converting f32 to the device format.
///
/// Device channels beyond what `frames` provides receive silence; frames
/// beyond the device buffer length are dropped. Never panics on shape
/// mismatch - a short driver buffer is the driver's prerogative.
#[inline]
pub fn write_frames_to_interleaved<T>(frames: &FrameSet, data: &mut [T], device_channels: usize)
where
    T: Sample + FromSample<f32>,
{
    if device_channels == 0 {
        return;
    }

    for (frame_index, device_frame) in data.chunks_mut(device_channels).enumerate() {
        if frame_index >= frames.frames() {
            silence_interleaved(device_frame);
            continue;
        }
        for (channel_index, slot) in device_frame.iter_mut().enumerate() {
            *slot = if channel_index < frames.channel_count() {
                T::from_sample(frames.channel(channel_index)[frame_index])
            } else {
                T::EQUILIBRIUM
            };
        }
    }
}

/// Fill an interleaved device buffer with silence.
#[inline]
pub fn silence_interleaved<T>(data: &mut [T])
where
    T: Sample,
{
    for slot in data.iter_mut() {
        *slot = T::EQUILIBRIUM;
    }
}
