//! Spectral masks.
//!
//! A mask is a per-bin dB ceiling `m(k)` over the positive-frequency half of a
//! spectrum. Each processed block is scanned against it and summarized as a
//! [`MaskScanResult`]: how many bins trespassed, and where the first and last
//! of them were.

use serde::Serialize;

/// One bin that exceeded its mask threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trespass {
    /// Analog frequency of the bin, in Hz.
    pub frequency: f64,
    /// Measured level of the bin, in dB.
    pub value_db: f64,
}

/// Outcome of scanning one block's PSD against a mask.
///
/// Produced once per block and replaced as a whole, so readers never see a
/// count from one block paired with a trespass from another.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MaskScanResult {
    /// Number of bins whose level exceeded the mask.
    pub error_count: usize,
    /// Lowest-frequency violating bin, if any.
    pub first: Option<Trespass>,
    /// Highest-frequency violating bin, if any.
    pub last: Option<Trespass>,
}

impl MaskScanResult {
    /// Frequency of the first trespass, NaN when the block was clean.
    pub fn first_trespass_frequency(&self) -> f64 {
        self.first.map_or(f64::NAN, |t| t.frequency)
    }

    /// Level of the first trespass, NaN when the block was clean.
    pub fn first_trespass_value(&self) -> f64 {
        self.first.map_or(f64::NAN, |t| t.value_db)
    }

    /// Frequency of the last trespass, NaN when the block was clean.
    pub fn last_trespass_frequency(&self) -> f64 {
        self.last.map_or(f64::NAN, |t| t.frequency)
    }

    /// Level of the last trespass, NaN when the block was clean.
    pub fn last_trespass_value(&self) -> f64 {
        self.last.map_or(f64::NAN, |t| t.value_db)
    }

    /// True when no bin violated the mask.
    pub fn is_clean(&self) -> bool {
        self.error_count == 0
    }
}

/// Frequency-dependent attenuation mask.
///
/// Holds `dft_size / 2` thresholds in dB. [`reset`](Self::reset) and
/// [`set_band_attenuation`](Self::set_band_attenuation) store `-attenuation`,
/// so an attenuation of 60 means the spectrum must stay below -60 dB.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumMask {
    sample_rate: u32,
    dft_size: usize,
    thresholds: Vec<f64>,
    vertical_offset: f64,
}

impl SpectrumMask {
    /// Create a mask for a transform of `dft_size` points at `sample_rate` Hz.
    ///
    /// All thresholds start at 0 dB.
    ///
    /// # Panics
    ///
    /// Panics if `dft_size` is smaller than 2 or `sample_rate` is zero.
    pub fn new(sample_rate: u32, dft_size: usize) -> Self {
        assert!(dft_size >= 2, "mask transform size must be at least 2");
        assert!(sample_rate > 0, "mask sample rate must be positive");
        Self {
            sample_rate,
            dft_size,
            thresholds: vec![0.0; dft_size / 2],
            vertical_offset: 0.0,
        }
    }

    /// Sample rate used for frequency/bin conversion.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Transform size the mask was built for.
    pub fn dft_size(&self) -> usize {
        self.dft_size
    }

    /// Width of one bin in Hz.
    pub fn resolution(&self) -> f64 {
        f64::from(self.sample_rate) / self.dft_size as f64
    }

    /// The threshold curve, one dB value per positive-frequency bin.
    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    /// Threshold in force at analog frequency `frequency`, offset included.
    ///
    /// Returns `None` above the last analyzed bin and for a NaN frequency.
    pub fn threshold_at(&self, frequency: f64) -> Option<f64> {
        let bin = (frequency / self.resolution()).round();
        if bin.is_nan() || bin < 0.0 {
            return None;
        }
        self.thresholds
            .get(bin as usize)
            .map(|t| t + self.vertical_offset)
    }

    /// Shift the whole curve by `offset_db` when scanning.
    pub fn set_vertical_offset(&mut self, offset_db: f64) {
        self.vertical_offset = offset_db;
    }

    /// Current vertical offset in dB.
    pub fn vertical_offset(&self) -> f64 {
        self.vertical_offset
    }

    /// Set every threshold to `-attenuation` dB.
    pub fn reset(&mut self, attenuation: f64) {
        self.thresholds.fill(-attenuation);
    }

    /// Set the thresholds of the band `[f1, f2]` Hz to `-attenuation` dB.
    ///
    /// The band covers bins `floor(f1 / df) ..= ceil(f2 / df)`, clamped to the
    /// analyzed half of the spectrum. An empty band, a non-finite lower edge
    /// or a NaN upper edge leaves the mask unchanged.
    pub fn set_band_attenuation(&mut self, f1: f64, f2: f64, attenuation: f64) {
        if !f1.is_finite() || f2.is_nan() {
            return;
        }
        let resolution = self.resolution();
        let last = self.thresholds.len() - 1;
        let d1 = (f1 / resolution).floor().max(0.0);
        let d2 = (f2 / resolution).ceil();
        if d2 < 0.0 || d1 > last as f64 || d2 < d1 {
            return;
        }
        let d1 = d1 as usize;
        let d2 = (d2 as usize).min(last);
        self.thresholds[d1..=d2].fill(-attenuation);
    }

    /// Scan the positive-frequency half of `psd` against the mask.
    ///
    /// Bins are visited in ascending order; a bin violates when its level
    /// `10 * log10(psd[k])` exceeds its threshold plus the vertical offset.
    /// Zero-power bins are `-inf` dB and never violate.
    pub fn scan(&self, psd: &[f64]) -> MaskScanResult {
        debug_assert!(psd.len() >= self.thresholds.len());
        let resolution = self.resolution();
        let mut result = MaskScanResult::default();

        for (k, (&power, &threshold)) in psd.iter().zip(&self.thresholds).enumerate() {
            let db = 10.0 * power.log10();
            if db > threshold + self.vertical_offset {
                let trespass = Trespass {
                    frequency: k as f64 * resolution,
                    value_db: db,
                };
                result.error_count += 1;
                if result.first.is_none() {
                    result.first = Some(trespass);
                }
                result.last = Some(trespass);
            }
        }
        result
    }
}

/// Copy of a mask's curve together with its latest scan result.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskSnapshot {
    /// Threshold curve in dB, without the vertical offset.
    pub thresholds: Vec<f64>,
    /// Vertical offset applied during scanning.
    pub vertical_offset: f64,
    /// Result of the most recent block scan.
    pub scan: MaskScanResult,
}
