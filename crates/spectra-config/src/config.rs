//! Analyzer configuration file.
//!
//! ```toml
//! [acquisition]
//! backend = "cpal"
//! sample_rate = 48000
//! channels = 2
//!
//! [transform]
//! dft_size = 4096
//!
//! [[masks]]
//! channel = 0
//! attenuation = 80.0
//!
//! [[masks.bands]]
//! f1 = 900.0
//! f2 = 1100.0
//! attenuation = 0.0
//!
//! [snri]
//! f1 = 900.0
//! f2 = 1100.0
//! ```
//!
//! Every key is optional; missing keys take their defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ConfigError;
use crate::validation::validate_config;

/// Where samples come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Live capture through the platform audio API.
    #[default]
    Cpal,
    /// Replay of a 16-bit WAV file.
    Wav,
    /// Generated test tones.
    Synthetic,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpal" => Ok(Backend::Cpal),
            "wav" => Ok(Backend::Wav),
            "synthetic" => Ok(Backend::Synthetic),
            other => Err(format!("unknown backend '{other}' (expected cpal, wav or synthetic)")),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Backend::Cpal => "cpal",
            Backend::Wav => "wav",
            Backend::Synthetic => "synthetic",
        })
    }
}

/// `[acquisition]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Sample source.
    pub backend: Backend,
    /// Capture device name, substring or index; default device when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Requested sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count, even.
    pub channels: u16,
    /// File replayed by the `wav` backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wav_path: Option<PathBuf>,
    /// Restart the WAV file when it ends.
    pub looping: bool,
    /// Tone frequency of the `synthetic` backend, in Hz.
    pub tone_hz: f64,
    /// Tone peak amplitude of the `synthetic` backend, 0..=1.
    pub tone_amplitude: f64,
    /// Pace file and synthetic sources to the sample rate.
    pub realtime: bool,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Cpal,
            device: None,
            sample_rate: 48000,
            channels: 2,
            wav_path: None,
            looping: false,
            tone_hz: 1000.0,
            tone_amplitude: 0.5,
            realtime: true,
        }
    }
}

/// `[transform]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Transform size in points, a power of two.
    pub dft_size: usize,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self { dft_size: 4096 }
    }
}

/// One band override of a mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandConfig {
    /// Lower band edge in Hz.
    pub f1: f64,
    /// Upper band edge in Hz.
    pub f2: f64,
    /// Attenuation in dB; the threshold becomes `-attenuation`.
    pub attenuation: f64,
}

/// One `[[masks]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskConfig {
    /// Channel the mask applies to.
    pub channel: usize,
    /// Base attenuation applied to every bin before the bands.
    #[serde(default)]
    pub attenuation: f64,
    /// Offset added to the whole curve when scanning, in dB.
    #[serde(default)]
    pub vertical_offset: f64,
    /// Band overrides, applied in order.
    #[serde(default)]
    pub bands: Vec<BandConfig>,
}

/// `[snri]` section: the band holding the wanted signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnriConfig {
    /// Lower band edge in Hz.
    pub f1: f64,
    /// Upper band edge in Hz.
    pub f2: f64,
}

/// `[display]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Time between monitor refreshes, in milliseconds.
    pub interval_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { interval_ms: 500 }
    }
}

/// Complete analyzer configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Sample source settings.
    pub acquisition: AcquisitionConfig,
    /// Transform settings.
    pub transform: TransformConfig,
    /// Per-channel spectral masks.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub masks: Vec<MaskConfig>,
    /// SNRI band, if SNRI should be reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snri: Option<SnriConfig>,
    /// Monitor output settings.
    pub display: DisplayConfig,
}

impl AnalyzerConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: AnalyzerConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check the configuration for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_config(self)?;
        Ok(())
    }

    /// Masks configured for `channel`, in file order.
    pub fn masks_for(&self, channel: usize) -> impl Iterator<Item = &MaskConfig> {
        self.masks.iter().filter(move |m| m.channel == channel)
    }
}
