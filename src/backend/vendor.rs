// Vendor driver backend - real hardware through CPAL.
//
// The driver owns the real-time thread; our data callback hands each period
// to the bridge. The bridge Arc moves into the callback closure, so every
// native invocation carries its own context - no process-wide instance
// pointer, and nothing stops several bindings from coexisting.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream};
use log::{error, warn};

use crate::backend::Backend;
use crate::bridge::CallbackBridge;
use crate::config::{
    EffectiveConfig, StreamConfig, SUPPORTED_BUFFER_SIZES, SUPPORTED_SAMPLE_RATES, nearest_preset,
};
use crate::error::{BindError, ConfigError, StreamError};
use crate::hardware::descriptor::{HardwareDescriptor, HardwareKind};
use crate::notify::{Notification, NotificationCategory, NotificationProducer};

pub struct VendorDriverBackend {
    descriptor: Option<HardwareDescriptor>,
    device: Option<Device>,
    negotiated: Option<EffectiveConfig>,
    stream: Option<Stream>,
    faults: Arc<Mutex<NotificationProducer>>,
}

impl VendorDriverBackend {
    /// `faults` receives driver error reports from the stream's error
    /// callback (which runs outside the audio callback, so pushing there is
    /// safe).
    pub fn new(faults: Arc<Mutex<NotificationProducer>>) -> Self {
        Self {
            descriptor: None,
            device: None,
            negotiated: None,
            stream: None,
            faults,
        }
    }

    fn locate_device(identity: &str) -> Option<Device> {
        let host = cpal::default_host();
        if let Ok(devices) = host.output_devices() {
            for device in devices {
                if let Ok(name) = device.name()
                    && name == identity
                {
                    return Some(device);
                }
            }
        }
        None
    }
}

impl Backend for VendorDriverBackend {
    fn kind(&self) -> HardwareKind {
        self.descriptor
            .as_ref()
            .map(|descriptor| descriptor.kind)
            .unwrap_or(HardwareKind::Generic)
    }

    fn name(&self) -> &str {
        self.descriptor
            .as_ref()
            .map(|descriptor| descriptor.identity.as_str())
            .unwrap_or("(unbound)")
    }

    fn bind(&mut self, descriptor: &HardwareDescriptor) -> Result<(), BindError> {
        if self.device.is_some() {
            return Err(BindError::AlreadyBound);
        }

        let device = Self::locate_device(&descriptor.identity)
            .ok_or_else(|| BindError::DriverUnavailable(descriptor.identity.clone()))?;

        // Probe the device once so bind reports access problems instead of
        // deferring them to negotiate/start.
        if let Err(err) = device.default_output_config() {
            return Err(match err {
                cpal::DefaultStreamConfigError::DeviceNotAvailable => {
                    BindError::DriverUnavailable(descriptor.identity.clone())
                }
                other => BindError::PermissionDenied(format!(
                    "{}: {}",
                    descriptor.identity, other
                )),
            });
        }

        self.device = Some(device);
        self.descriptor = Some(descriptor.clone());
        Ok(())
    }

    fn unbind(&mut self) {
        self.stop();
        self.device = None;
        self.descriptor = None;
        self.negotiated = None;
    }

    fn is_bound(&self) -> bool {
        self.device.is_some()
    }

    fn negotiate(&mut self, request: &StreamConfig) -> Result<EffectiveConfig, ConfigError> {
        let device = self.device.as_ref().ok_or(ConfigError::NotBound)?;
        let descriptor = self.descriptor.as_ref().ok_or(ConfigError::NotBound)?;

        let mut sample_rate = nearest_preset(request.sample_rate, &SUPPORTED_SAMPLE_RATES);
        let mut buffer_frames = nearest_preset(request.buffer_frames, &SUPPORTED_BUFFER_SIZES);
        let mut output_channels = descriptor.output_channels;

        let ranges: Vec<_> = device
            .supported_output_configs()
            .map_err(|err| ConfigError::Unreachable(err.to_string()))?
            .collect();

        if !ranges.is_empty() {
            // Restrict the canonical presets to rates some range covers,
            // then snap the request to the nearest survivor.
            let covered: Vec<u32> = SUPPORTED_SAMPLE_RATES
                .iter()
                .copied()
                .filter(|&rate| {
                    ranges.iter().any(|range| {
                        range.min_sample_rate().0 <= rate && rate <= range.max_sample_rate().0
                    })
                })
                .collect();
            if !covered.is_empty() {
                sample_rate = nearest_preset(request.sample_rate, &covered);
            }

            if let Some(range) = ranges.iter().find(|range| {
                range.min_sample_rate().0 <= sample_rate && sample_rate <= range.max_sample_rate().0
            }) {
                if let cpal::SupportedBufferSize::Range { min, max } = *range.buffer_size() {
                    buffer_frames = clamp_buffer_frames(buffer_frames, min, max);
                }
                output_channels = range.channels();
            }
        }

        let effective = EffectiveConfig {
            sample_rate,
            buffer_frames,
            input_channels: descriptor.input_channels,
            output_channels,
            native_latency_frames: descriptor.native_latency_frames,
        };
        self.negotiated = Some(effective);
        Ok(effective)
    }

    fn input_channels(&self) -> u16 {
        self.descriptor
            .as_ref()
            .map(|descriptor| descriptor.input_channels)
            .unwrap_or(0)
    }

    fn output_channels(&self) -> u16 {
        self.negotiated
            .map(|config| config.output_channels)
            .or_else(|| {
                self.descriptor
                    .as_ref()
                    .map(|descriptor| descriptor.output_channels)
            })
            .unwrap_or(0)
    }

    fn native_latency_frames(&self) -> u32 {
        self.descriptor
            .as_ref()
            .map(|descriptor| descriptor.native_latency_frames)
            .unwrap_or(0)
    }

    fn start(&mut self, bridge: Arc<CallbackBridge>) -> Result<(), StreamError> {
        if self.stream.is_some() {
            return Err(StreamError::StartFailed(
                "vendor stream already running".to_string(),
            ));
        }
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| StreamError::StartFailed("backend is not bound".to_string()))?;
        let negotiated = self
            .negotiated
            .ok_or_else(|| StreamError::StartFailed("configuration not negotiated".to_string()))?;

        let sample_format = device
            .default_output_config()
            .map_err(|err| StreamError::StartFailed(err.to_string()))?
            .sample_format();

        let config = cpal::StreamConfig {
            channels: negotiated.output_channels.max(1),
            sample_rate: cpal::SampleRate(negotiated.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(negotiated.buffer_frames),
        };

        // Some hosts run the data callback as soon as the stream exists, so
        // setup_changed must fire before the stream is built.
        bridge.prepare();

        let built = build_stream_for_format(
            device,
            &config,
            sample_format,
            bridge.clone(),
            self.faults.clone(),
        )
        .or_else(|err| {
            // Drivers that refuse a fixed period still stream fine with
            // their preferred one; latency accounting keeps our figure.
            warn!("fixed buffer size rejected ({err}), retrying with driver default");
            let fallback = cpal::StreamConfig {
                buffer_size: cpal::BufferSize::Default,
                ..config
            };
            build_stream_for_format(
                device,
                &fallback,
                sample_format,
                bridge.clone(),
                self.faults.clone(),
            )
        });

        let stream = match built {
            Ok(stream) => stream,
            Err(err) => {
                bridge.deactivate();
                return Err(StreamError::StartFailed(err));
            }
        };

        if let Err(err) = stream.play() {
            bridge.deactivate();
            return Err(StreamError::StartFailed(err.to_string()));
        }

        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
            // Dropping the stream tears down the driver callback; the hard
            // no-more-callbacks guarantee comes from bridge deactivation.
            drop(stream);
        }
    }
}

/// Clamp a period to a driver-reported range. Some drivers report inverted
/// or zero ranges; an unusable range leaves the preset untouched.
fn clamp_buffer_frames(frames: u32, min: u32, max: u32) -> u32 {
    if min > max {
        return frames;
    }
    frames.clamp(min.max(1), max.max(1))
}

fn build_stream_for_format(
    device: &Device,
    config: &cpal::StreamConfig,
    sample_format: SampleFormat,
    bridge: Arc<CallbackBridge>,
    faults: Arc<Mutex<NotificationProducer>>,
) -> Result<Stream, String> {
    match sample_format {
        SampleFormat::F32 => build_stream::<f32>(device, config, bridge, faults),
        SampleFormat::I16 => build_stream::<i16>(device, config, bridge, faults),
        SampleFormat::U16 => build_stream::<u16>(device, config, bridge, faults),
        other => Err(format!(
            "unsupported sample format: {other:?} (supported: F32, I16, U16)"
        )),
    }
}

/// Build an output stream generically over the device's sample format.
/// Processing stays f32 internally; conversion happens while writing the
/// interleaved driver buffer.
fn build_stream<T>(
    device: &Device,
    config: &cpal::StreamConfig,
    bridge: Arc<CallbackBridge>,
    faults: Arc<Mutex<NotificationProducer>>,
) -> Result<Stream, String>
where
    T: SizedSample + FromSample<f32> + Send + 'static,
{
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                bridge.run_period_interleaved(data, channels);
            },
            move |err| {
                // Runs outside the audio callback; I/O is fine here.
                error!("vendor stream error: {err}");
                if let Ok(mut tx) = faults.try_lock() {
                    let _ = ringbuf::traits::Producer::try_push(
                        &mut *tx,
                        Notification::error(
                            NotificationCategory::Stream,
                            format!("vendor stream error: {err}"),
                        ),
                    );
                }
            },
            None,
        )
        .map_err(|err| err.to_string())
}
