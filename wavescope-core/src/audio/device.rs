//! Input device enumeration and playback-capture heuristics.
//!
//! wavescope usually visualises what the machine is *playing*, so devices that
//! look like loopback / monitor inputs are flagged and can be preferred over
//! microphones.

use serde::{Deserialize, Serialize};

/// Metadata about an audio input device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Human-readable device name reported by the OS.
    pub name: String,
    /// Whether this is the system default input device.
    pub is_default: bool,
    /// Heuristic flag for devices that capture system/output audio.
    pub is_loopback_like: bool,
    /// Default sample rate in Hz, when the device reports one.
    pub default_sample_rate: Option<u32>,
    /// Default channel count, when the device reports one.
    pub channels: Option<u16>,
}

const LOOPBACK_KEYWORDS: &[&str] = &[
    "stereo mix",
    "wave out",
    "what u hear",
    "what you hear",
    "loopback",
    "monitor of",
    "blackhole",
    "soundflower",
    "virtual output",
    "cable output",
];

/// Best-effort check for devices that record the system output mix.
pub fn is_loopback_like_name(name: &str) -> bool {
    let lowered = name.trim().to_ascii_lowercase();
    LOOPBACK_KEYWORDS.iter().any(|k| lowered.contains(k))
}

/// Order devices for selection: loopback-like first when `prefer_loopback`,
/// then the system default, then by name.
pub fn sort_for_selection(devices: &mut [DeviceInfo], prefer_loopback: bool) {
    devices.sort_by_key(|d| {
        (
            prefer_loopback && !d.is_loopback_like,
            !d.is_default,
            d.name.to_ascii_lowercase(),
        )
    });
}

/// List all available audio input devices on the system.
///
/// Returns an empty `Vec` if cpal is not available or no devices exist.
#[cfg(feature = "audio-cpal")]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    match host.input_devices() {
        Ok(devices) => {
            let mut list = devices
                .enumerate()
                .map(|(idx, device)| {
                    let name = device
                        .name()
                        .unwrap_or_else(|_| format!("Input Device {}", idx + 1));
                    let config = device.default_input_config().ok();
                    DeviceInfo {
                        is_default: default_name.as_deref() == Some(name.as_str()),
                        is_loopback_like: is_loopback_like_name(&name),
                        default_sample_rate: config.as_ref().map(|c| c.sample_rate().0),
                        channels: config.as_ref().map(|c| c.channels()),
                        name,
                    }
                })
                .collect::<Vec<_>>();
            sort_for_selection(&mut list, false);
            list
        }
        Err(e) => {
            tracing::warn!("failed to enumerate input devices: {e}");
            vec![]
        }
    }
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    vec![]
}
