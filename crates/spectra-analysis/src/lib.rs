//! Spectra Analysis - periodogram tools for multi-channel tone measurement
//!
//! This crate holds the numerical side of the analyzer, free of threads and
//! devices:
//!
//! - [`fft`] - in-place radix-2 complex FFT
//! - [`dual_real`] - two real spectra from one complex FFT
//! - [`periodogram`] - per-channel buffers, pair transform, peak search
//! - [`mask`] - spectral masks and per-block violation summaries
//! - [`snri`] - in-band versus out-of-band power ratio
//! - [`tone`] - continuous-phase test tone synthesis
//! - [`export`] - text PSD tables
//!
//! ## Example
//!
//! ```rust
//! use spectra_analysis::{ChannelData, PairTransform, SpectrumMask, generate_test_tone, snri_db};
//!
//! let n = 4096;
//! let fs = 48000.0;
//! let mut left = ChannelData::new(n);
//! let mut right = ChannelData::new(n);
//! left.time_domain_mut().copy_from_slice(&generate_test_tone(fs, 1000.0, n, 0.5));
//!
//! let mut mask = SpectrumMask::new(48000, n);
//! mask.reset(80.0);
//! mask.set_band_attenuation(900.0, 1100.0, 0.0);
//! left.set_mask(mask);
//!
//! let mut transform = PairTransform::new(n);
//! transform.transform_pair(&mut left, &mut right);
//! left.analyze();
//! right.analyze();
//!
//! let peak_bin = left.peak().index.unwrap();
//! assert!((peak_bin as f64 * fs / n as f64 - 1000.0).abs() < 2.0 * fs / n as f64);
//! assert!(snri_db(left.psd(), fs, 900.0, 1100.0) > 0.0);
//! ```

pub mod dual_real;
pub mod export;
pub mod fft;
pub mod mask;
pub mod periodogram;
pub mod snri;
pub mod tone;

// Re-export main types
pub use dual_real::{UNPACK_NORM, dual_real_spectra, unpack_bin, unpack_power};
pub use export::{PsdTable, export_psd_table, import_psd_table, write_psd_table};
pub use fft::{Direction, fft_in_place, log2_size};
pub use mask::{MaskScanResult, MaskSnapshot, SpectrumMask, Trespass};
pub use periodogram::{ChannelData, PEAK_FLOOR, PairTransform, Peak, find_peak};
pub use snri::{band_energies, snri_db};
pub use tone::{ToneGenerator, Waveform, generate_test_tone, to_i16};
