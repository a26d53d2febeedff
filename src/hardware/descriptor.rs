// Vendor classification - one table-driven classifier for every call site.
//
// Vendor-specific quirks (default channel counts, driver latency offsets)
// are rows in the table, not subclasses. Patterns are matched first-to-last,
// so more specific fragments must be listed before broader ones.

/// Best-guess vendor family for a discovered driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareKind {
    UadApolloX16,
    UadApolloX8,
    AllenHeathAvantis,
    DigicoSd9,
    YamahaCl5,
    BehringerX32,
    FocusriteScarlett,
    RmeBabyface,
    Generic,
}

impl HardwareKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            HardwareKind::UadApolloX16 => "UAD Apollo X16",
            HardwareKind::UadApolloX8 => "UAD Apollo X8",
            HardwareKind::AllenHeathAvantis => "Allen & Heath Avantis",
            HardwareKind::DigicoSd9 => "DiGiCo SD9",
            HardwareKind::YamahaCl5 => "Yamaha CL5",
            HardwareKind::BehringerX32 => "Behringer X32",
            HardwareKind::FocusriteScarlett => "Focusrite Scarlett",
            HardwareKind::RmeBabyface => "RME Babyface Pro",
            HardwareKind::Generic => "Generic Driver",
        }
    }
}

impl std::fmt::Display for HardwareKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Sort tier for presenting discovery results: known professional vendors
/// first, generic/universal drivers next, everything unrecognized last.
/// Within a tier, discovery order is preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PresentationTier {
    Professional = 0,
    Universal = 1,
    Unclassified = 2,
}

struct VendorEntry {
    /// Case-insensitive name fragment to look for.
    pattern: &'static str,
    kind: HardwareKind,
    default_inputs: u16,
    default_outputs: u16,
    /// Extra buffering the driver reports beyond one period, in frames.
    native_latency_frames: u32,
}

// Most specific fragments first; first match wins.
const VENDOR_TABLE: &[VendorEntry] = &[
    VendorEntry {
        pattern: "apollo",
        kind: HardwareKind::UadApolloX16,
        default_inputs: 16,
        default_outputs: 16,
        native_latency_frames: 32,
    },
    VendorEntry {
        pattern: "avantis",
        kind: HardwareKind::AllenHeathAvantis,
        default_inputs: 64,
        default_outputs: 64,
        native_latency_frames: 48,
    },
    VendorEntry {
        pattern: "digico",
        kind: HardwareKind::DigicoSd9,
        default_inputs: 48,
        default_outputs: 48,
        native_latency_frames: 48,
    },
    VendorEntry {
        pattern: "yamaha",
        kind: HardwareKind::YamahaCl5,
        default_inputs: 64,
        default_outputs: 64,
        native_latency_frames: 64,
    },
    VendorEntry {
        pattern: "x32",
        kind: HardwareKind::BehringerX32,
        default_inputs: 32,
        default_outputs: 32,
        native_latency_frames: 64,
    },
    VendorEntry {
        pattern: "focusrite",
        kind: HardwareKind::FocusriteScarlett,
        default_inputs: 2,
        default_outputs: 2,
        native_latency_frames: 64,
    },
    VendorEntry {
        pattern: "rme",
        kind: HardwareKind::RmeBabyface,
        default_inputs: 4,
        default_outputs: 4,
        native_latency_frames: 32,
    },
];

// Fragments that mark a driver as a deliberate universal/generic entry
// rather than an unrecognized one.
const UNIVERSAL_FRAGMENTS: &[&str] = &["asio", "generic", "universal", "wasapi", "default"];

/// Classify a driver name into a vendor family.
///
/// Case-insensitive substring match, first table row wins. Apollo family
/// splits by channel count: 16 inputs and up is an X16, otherwise an X8.
pub fn classify(name: &str, input_channels: u16) -> HardwareKind {
    let lowered = name.to_lowercase();
    for entry in VENDOR_TABLE {
        if lowered.contains(entry.pattern) {
            if entry.kind == HardwareKind::UadApolloX16 && input_channels < 16 {
                return HardwareKind::UadApolloX8;
            }
            return entry.kind;
        }
    }
    HardwareKind::Generic
}

/// A driver entry produced by discovery. Immutable; a re-discovery builds a
/// fresh set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareDescriptor {
    /// Driver name as advertised by the OS registry.
    pub identity: String,
    pub kind: HardwareKind,
    /// Channel counts as reported at discovery time (vendor-table defaults
    /// when the driver itself does not say).
    pub input_channels: u16,
    pub output_channels: u16,
    /// Driver-reported extra latency in frames, zero when unknown.
    pub native_latency_frames: u32,
    /// Position in the discovery result, used for stable tier sorting.
    pub discovery_index: usize,
}

impl HardwareDescriptor {
    /// Build a descriptor from a driver name, pulling channel defaults and
    /// latency offsets from the vendor table.
    pub fn from_name(identity: impl Into<String>, discovery_index: usize) -> Self {
        let identity = identity.into();
        let lowered = identity.to_lowercase();

        let entry = VENDOR_TABLE
            .iter()
            .find(|entry| lowered.contains(entry.pattern));

        let (inputs, outputs, latency) = match entry {
            Some(entry) => (
                entry.default_inputs,
                entry.default_outputs,
                entry.native_latency_frames,
            ),
            None => (2, 2, 0),
        };

        let kind = classify(&identity, inputs);

        Self {
            identity,
            kind,
            input_channels: inputs,
            output_channels: outputs,
            native_latency_frames: latency,
            discovery_index,
        }
    }

    /// Same as [`from_name`], with channel counts the driver itself reported
    /// overriding the table defaults.
    ///
    /// [`from_name`]: Self::from_name
    pub fn with_reported_channels(
        identity: impl Into<String>,
        discovery_index: usize,
        input_channels: u16,
        output_channels: u16,
    ) -> Self {
        let mut descriptor = Self::from_name(identity, discovery_index);
        descriptor.input_channels = input_channels;
        descriptor.output_channels = output_channels;
        descriptor.kind = classify(&descriptor.identity, input_channels);
        descriptor
    }

    pub fn tier(&self) -> PresentationTier {
        if self.kind != HardwareKind::Generic {
            return PresentationTier::Professional;
        }
        let lowered = self.identity.to_lowercase();
        if UNIVERSAL_FRAGMENTS
            .iter()
            .any(|fragment| lowered.contains(fragment))
        {
            PresentationTier::Universal
        } else {
            PresentationTier::Unclassified
        }
    }
}
