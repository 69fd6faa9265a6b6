//! Per-channel periodogram state and the block processing steps.
//!
//! [`ChannelData`] owns everything the analyzer keeps for one acquisition
//! channel. The functions here operate on plain `&mut ChannelData`; the caller
//! is responsible for holding whatever lock guards it.
//!
//! One block is processed in two phases:
//!
//! 1. [`PairTransform::transform_pair`] - pack channels `(c, c+1)`, run one
//!    forward FFT, unpack into both PSD arrays.
//! 2. [`ChannelData::analyze`] - peak search and mask check, per channel.

use serde::Serialize;

use crate::dual_real::unpack_power;
use crate::fft::{Direction, fft_in_place, log2_size};
use crate::mask::{MaskScanResult, MaskSnapshot, SpectrumMask};

/// Smallest PSD value considered a peak.
pub const PEAK_FLOOR: f64 = 1e-16;

/// Result of a peak search over the positive-frequency bins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Peak {
    /// Bin of the maximum, `None` when nothing rose above [`PEAK_FLOOR`].
    pub index: Option<usize>,
    /// PSD value of the maximum, [`PEAK_FLOOR`] when there is no peak.
    pub value: f64,
}

impl Default for Peak {
    fn default() -> Self {
        Self {
            index: None,
            value: PEAK_FLOOR,
        }
    }
}

/// Find the largest bin in `psd`.
///
/// Scans in ascending order and replaces the running maximum only on a
/// strictly greater value, so ties resolve to the lowest bin.
pub fn find_peak(psd: &[f64]) -> Peak {
    let mut peak = Peak::default();
    for (k, &value) in psd.iter().enumerate() {
        if value > peak.value {
            peak = Peak {
                index: Some(k),
                value,
            };
        }
    }
    peak
}

/// State owned by one acquisition channel.
#[derive(Debug, Clone)]
pub struct ChannelData {
    time_domain: Vec<f64>,
    psd: Vec<f64>,
    peak: Peak,
    mask: Option<SpectrumMask>,
    mask_result: MaskScanResult,
    block: u64,
}

impl ChannelData {
    /// Allocate buffers for a transform of `dft_size` points.
    pub fn new(dft_size: usize) -> Self {
        Self {
            time_domain: vec![0.0; dft_size],
            psd: vec![0.0; dft_size],
            peak: Peak::default(),
            mask: None,
            mask_result: MaskScanResult::default(),
            block: 0,
        }
    }

    /// Transform size.
    pub fn dft_size(&self) -> usize {
        self.psd.len()
    }

    /// Normalized samples of the last block, in `[-1.0, 1.0)`.
    pub fn time_domain(&self) -> &[f64] {
        &self.time_domain
    }

    /// Mutable access to the sample buffer, for the capture path.
    pub fn time_domain_mut(&mut self) -> &mut [f64] {
        &mut self.time_domain
    }

    /// Full PSD array. Only bins `[0, N/2)` are meaningful.
    pub fn psd(&self) -> &[f64] {
        &self.psd
    }

    /// Positive-frequency half of the PSD.
    pub fn positive_psd(&self) -> &[f64] {
        &self.psd[..self.psd.len() / 2]
    }

    /// Sequence number of the block currently stored, 0 before the first.
    pub fn block(&self) -> u64 {
        self.block
    }

    /// Tag the stored data with its block sequence number.
    pub fn set_block(&mut self, block: u64) {
        self.block = block;
    }

    /// Most recent peak search result.
    pub fn peak(&self) -> Peak {
        self.peak
    }

    /// Most recent mask scan result (clean when no mask is attached).
    pub fn mask_result(&self) -> MaskScanResult {
        self.mask_result
    }

    /// Attached mask, if any.
    pub fn mask(&self) -> Option<&SpectrumMask> {
        self.mask.as_ref()
    }

    /// Mutable access to the attached mask.
    pub fn mask_mut(&mut self) -> Option<&mut SpectrumMask> {
        self.mask.as_mut()
    }

    /// Attach `mask`, replacing any previous one. Returns the previous mask.
    ///
    /// # Panics
    ///
    /// Panics if the mask was built for a different transform size.
    pub fn set_mask(&mut self, mask: SpectrumMask) -> Option<SpectrumMask> {
        assert_eq!(
            mask.dft_size(),
            self.dft_size(),
            "mask transform size does not match channel"
        );
        self.mask.replace(mask)
    }

    /// Detach the mask and clear the last scan result.
    pub fn clear_mask(&mut self) -> Option<SpectrumMask> {
        self.mask_result = MaskScanResult::default();
        self.mask.take()
    }

    /// Copy of the mask curve and its latest scan, if a mask is attached.
    pub fn mask_snapshot(&self) -> Option<MaskSnapshot> {
        self.mask.as_ref().map(|mask| MaskSnapshot {
            thresholds: mask.thresholds().to_vec(),
            vertical_offset: mask.vertical_offset(),
            scan: self.mask_result,
        })
    }

    /// Peak absolute sample of the last block.
    pub fn amplitude(&self) -> f64 {
        self.time_domain.iter().fold(0.0, |acc, &x| acc.max(x.abs()))
    }

    /// RMS level of the last block.
    pub fn rms(&self) -> f64 {
        if self.time_domain.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.time_domain.iter().map(|x| x * x).sum();
        (sum / self.time_domain.len() as f64).sqrt()
    }

    /// Run the peak search and mask check on the current PSD.
    ///
    /// The mask result is replaced, never accumulated: it always describes
    /// the block whose PSD is currently stored.
    pub fn analyze(&mut self) {
        self.peak = find_peak(self.positive_psd());
        self.mask_result = match &self.mask {
            Some(mask) => mask.scan(self.positive_psd()),
            None => MaskScanResult::default(),
        };
    }
}

/// Scratch space for transforming channel pairs.
///
/// Owned by the processing thread so the FFT never touches the channel's
/// own time-domain samples.
#[derive(Debug, Clone)]
pub struct PairTransform {
    m: u32,
    re: Vec<f64>,
    im: Vec<f64>,
}

impl PairTransform {
    /// Create scratch buffers for `dft_size` points.
    ///
    /// # Panics
    ///
    /// Panics if `dft_size` is not a power of two.
    pub fn new(dft_size: usize) -> Self {
        let Some(m) = log2_size(dft_size) else {
            panic!("transform size {dft_size} is not a power of two");
        };
        Self {
            m,
            re: vec![0.0; dft_size],
            im: vec![0.0; dft_size],
        }
    }

    /// Transform size.
    pub fn dft_size(&self) -> usize {
        self.re.len()
    }

    /// Compute the PSD of both channels of a pair with a single FFT.
    pub fn transform_pair(&mut self, a: &mut ChannelData, b: &mut ChannelData) {
        debug_assert_eq!(a.dft_size(), self.dft_size());
        debug_assert_eq!(b.dft_size(), self.dft_size());

        self.re.copy_from_slice(&a.time_domain);
        self.im.copy_from_slice(&b.time_domain);
        fft_in_place(Direction::Forward, self.m, &mut self.re, &mut self.im);
        unpack_power(&self.re, &self.im, &mut a.psd, &mut b.psd);
    }
}
