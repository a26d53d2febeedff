// Driver registry - read-only enumeration of installed drivers.
//
// Discovery never fails: zero devices is a normal result (the interface
// then falls back to the software loopback backend).

use cpal::traits::{DeviceTrait, HostTrait};
use log::debug;

use crate::hardware::descriptor::HardwareDescriptor;

enum DiscoverySource {
    /// The OS-maintained device list, via the default CPAL host.
    System,
    /// A fixed list of driver names; deterministic source for tests and
    /// headless environments.
    Names(Vec<String>),
}

/// Enumerates and classifies candidate drivers without binding to any.
pub struct DriverRegistry {
    source: DiscoverySource,
}

impl DriverRegistry {
    /// Registry backed by the OS device list.
    pub fn system() -> Self {
        Self {
            source: DiscoverySource::System,
        }
    }

    /// Registry backed by a fixed list of driver names.
    pub fn from_names(names: Vec<String>) -> Self {
        Self {
            source: DiscoverySource::Names(names),
        }
    }

    /// Query the discovery source and classify every advertised driver.
    ///
    /// Results sort by presentation tier (professional vendors first,
    /// generic drivers next, unrecognized names last); discovery order is
    /// preserved within a tier. An empty result is valid, not an error.
    pub fn discover(&self) -> Vec<HardwareDescriptor> {
        let mut descriptors = match &self.source {
            DiscoverySource::System => discover_system(),
            DiscoverySource::Names(names) => names
                .iter()
                .enumerate()
                .map(|(index, name)| HardwareDescriptor::from_name(name.clone(), index))
                .collect(),
        };

        descriptors.sort_by_key(|descriptor| (descriptor.tier(), descriptor.discovery_index));

        for descriptor in &descriptors {
            debug!(
                "discovered driver: {} ({}, {} in / {} out)",
                descriptor.identity,
                descriptor.kind,
                descriptor.input_channels,
                descriptor.output_channels
            );
        }

        descriptors
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::system()
    }
}

fn discover_system() -> Vec<HardwareDescriptor> {
    let host = cpal::default_host();
    let mut descriptors = Vec::new();

    let Ok(devices) = host.output_devices() else {
        // An unanswerable host is the same as an empty one here.
        return descriptors;
    };

    for (index, device) in devices.enumerate() {
        let Ok(name) = device.name() else {
            continue;
        };

        // Prefer the channel count the driver itself reports.
        let descriptor = match device.default_output_config() {
            Ok(config) => HardwareDescriptor::with_reported_channels(
                name,
                index,
                config.channels(),
                config.channels(),
            ),
            Err(_) => HardwareDescriptor::from_name(name, index),
        };

        descriptors.push(descriptor);
    }

    descriptors
}
