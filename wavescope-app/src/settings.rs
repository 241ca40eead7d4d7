//! Persistent application settings (JSON file in the user data directory).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;
use wavescope_core::EngineConfig;

const MIN_WINDOW: usize = 64;
const MAX_WINDOW: usize = 16_384;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub engine: EngineConfig,
    /// Number of spectrum columns drawn.
    pub bar_count: usize,
    /// Rows used by the tallest spectrum bar.
    pub bar_height: usize,
    /// Redraws per second.
    pub refresh_hz: u32,
    pub show_waveform: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            bar_count: 48,
            bar_height: 12,
            refresh_hz: 30,
            show_waveform: true,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.engine.window_size = normalize_window_size(self.engine.window_size);
        self.engine.sample_rate = self.engine.sample_rate.clamp(8_000, 192_000);
        self.engine.chunk_hint = self.engine.chunk_hint.clamp(64, MAX_WINDOW);
        self.engine.read_timeout_ms = self.engine.read_timeout_ms.clamp(5, 1_000);
        self.engine.preferred_device = self
            .engine
            .preferred_device
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self.bar_count = self.bar_count.clamp(8, 256);
        self.bar_height = self.bar_height.clamp(4, 64);
        self.refresh_hz = self.refresh_hz.clamp(1, 120);
    }
}

/// Clamp to the supported range and round up to a power of two.
pub fn normalize_window_size(raw: usize) -> usize {
    raw.clamp(MIN_WINDOW, MAX_WINDOW).next_power_of_two()
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Lattice Labs")
            .join("wavescope")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".config")
            })
            .join("wavescope")
            .join("settings.json")
    }
}

/// Read settings, falling back to defaults when the file is missing or
/// malformed. The result is always normalised.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str::<AppSettings>(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), "ignoring malformed settings: {e}");
            AppSettings::default()
        }),
        Err(_) => AppSettings::default(),
    };
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
