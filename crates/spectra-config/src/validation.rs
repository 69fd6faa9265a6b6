//! Configuration consistency checks.
//!
//! Parsing only guarantees the file is well formed. These checks catch the
//! settings the analyzer would reject at construction, plus mask and band
//! definitions that cannot mean what the author intended.

use thiserror::Error;

use crate::config::{AnalyzerConfig, Backend};

/// Largest accepted transform size.
pub const MAX_DFT_SIZE: usize = 1 << 16;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Channels are processed in pairs.
    #[error("channel count must be even and at least 2, got {0}")]
    OddChannelCount(u16),

    /// Zero sample rate.
    #[error("sample rate must be positive")]
    ZeroSampleRate,

    /// Transform size not a power of two or out of range.
    #[error("transform size must be a power of two in 2..={MAX_DFT_SIZE}, got {0}")]
    InvalidDftSize(usize),

    /// Mask for a channel the analyzer does not have.
    #[error("mask for channel {channel}, but only {channels} channels are configured")]
    MaskChannelOutOfRange {
        /// Channel named by the mask.
        channel: usize,
        /// Configured channel count.
        channels: u16,
    },

    /// Band edges reversed, negative or not finite.
    #[error("invalid band [{f1}, {f2}] Hz: edges must be finite, non-negative and ordered")]
    InvalidBand {
        /// Lower edge.
        f1: f64,
        /// Upper edge.
        f2: f64,
    },

    /// The WAV backend needs a file.
    #[error("the wav backend requires acquisition.wav_path")]
    MissingWavPath,

    /// Synthetic tone amplitude outside 0..=1.
    #[error("tone amplitude must be within 0..=1, got {0}")]
    InvalidToneAmplitude(f64),

    /// Zero display interval.
    #[error("display interval must be positive")]
    ZeroInterval,

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Check a band's edges.
pub fn validate_band(f1: f64, f2: f64) -> ValidationResult<()> {
    if f1.is_finite() && f2.is_finite() && f1 >= 0.0 && f2 >= f1 {
        Ok(())
    } else {
        Err(ValidationError::InvalidBand { f1, f2 })
    }
}

/// Check a transform size.
pub fn validate_dft_size(size: usize) -> ValidationResult<()> {
    if (2..=MAX_DFT_SIZE).contains(&size) && size.is_power_of_two() {
        Ok(())
    } else {
        Err(ValidationError::InvalidDftSize(size))
    }
}

/// Check a whole configuration, collecting every problem found.
pub fn validate_config(config: &AnalyzerConfig) -> ValidationResult<()> {
    let mut errors = Vec::new();
    let acquisition = &config.acquisition;

    if acquisition.channels < 2 || acquisition.channels % 2 != 0 {
        errors.push(ValidationError::OddChannelCount(acquisition.channels));
    }
    if acquisition.sample_rate == 0 {
        errors.push(ValidationError::ZeroSampleRate);
    }
    if let Err(e) = validate_dft_size(config.transform.dft_size) {
        errors.push(e);
    }
    if acquisition.backend == Backend::Wav && acquisition.wav_path.is_none() {
        errors.push(ValidationError::MissingWavPath);
    }
    if !(0.0..=1.0).contains(&acquisition.tone_amplitude) {
        errors.push(ValidationError::InvalidToneAmplitude(acquisition.tone_amplitude));
    }
    if config.display.interval_ms == 0 {
        errors.push(ValidationError::ZeroInterval);
    }

    for mask in &config.masks {
        if mask.channel >= usize::from(acquisition.channels) {
            errors.push(ValidationError::MaskChannelOutOfRange {
                channel: mask.channel,
                channels: acquisition.channels,
            });
        }
        for band in &mask.bands {
            if let Err(e) = validate_band(band.f1, band.f2) {
                errors.push(e);
            }
        }
    }
    if let Some(snri) = &config.snri
        && let Err(e) = validate_band(snri.f1, snri.f2)
    {
        errors.push(e);
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}
