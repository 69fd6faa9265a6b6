//! Acquisition and real-time analysis for the Spectra toolkit.
//!
//! This crate provides:
//!
//! - **Acquisition backends**: the [`Acquisition`] trait plus cpal capture
//!   ([`CpalAcquisition`]), WAV replay ([`WavAcquisition`]) and a synthetic
//!   tone source with fault injection ([`SyntheticAcquisition`])
//! - **Device enumeration**: [`list_input_devices`]
//! - **The analyzer**: [`Analyzer`] owns the channel buffers, the capture
//!   thread and the run-state machine, and answers queries under the
//!   per-channel locks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spectra_io::{Analyzer, AnalyzerSettings, CpalAcquisition};
//!
//! let settings = AnalyzerSettings::default();
//! let mut analyzer = Analyzer::new(settings, Box::new(CpalAcquisition::new()))?;
//! analyzer.init()?;
//! analyzer.start()?;
//! std::thread::sleep(std::time::Duration::from_secs(1));
//! if let Some(bin) = analyzer.find_peak(0) {
//!     println!("peak at {:.1} Hz", analyzer.analog_frequency(bin));
//! }
//! # Ok::<(), spectra_io::Error>(())
//! ```

mod analyzer;
pub mod backend;
mod cpal_backend;
mod devices;
mod synthetic;
mod wav_backend;

pub use analyzer::{Analyzer, AnalyzerSettings, AnalyzerState, ChannelSnapshot};
pub use backend::{Acquisition, ReadError, SampleFormat};
pub use cpal_backend::CpalAcquisition;
pub use devices::{AudioDevice, default_input_device, list_input_devices};
pub use synthetic::{FaultPlan, SyntheticAcquisition};
pub use wav_backend::WavAcquisition;

/// Error types for acquisition and analyzer operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No capture device available on the system.
    #[error("No audio input device available")]
    NoDevice,

    /// The requested capture device was not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Device open, negotiation or stream setup failed.
    #[error("Device error: {0}")]
    Device(String),

    /// The requested sample format is not supported.
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Analyzer settings were rejected.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// WAV file read error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The capture thread hit a fatal fault; the analyzer must be recreated.
    #[error("Analyzer crashed")]
    Crashed,
}

/// Convenience result type for acquisition and analyzer operations.
pub type Result<T> = std::result::Result<T, Error>;
