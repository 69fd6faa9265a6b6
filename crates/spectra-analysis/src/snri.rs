//! Signal to noise-plus-interference ratio from a single PSD snapshot.
//!
//! The estimator assumes the whole wanted signal lives inside one analog band
//! and treats every other positive-frequency bin as noise or interference.
//! It is meant for test tones whose frequency is known in advance.

/// Inclusive bin range `[floor(f1*N/fs), ceil(f2*N/fs)]` clamped to `[0, last]`.
///
/// Returns `None` when the band lies entirely outside the bins, when `f1` is
/// not finite or when `f2` is NaN.
pub fn band_bins(sample_rate: f64, dft_size: usize, f1: f64, f2: f64, last: usize) -> Option<(usize, usize)> {
    if !f1.is_finite() || f2.is_nan() {
        return None;
    }
    let scale = dft_size as f64 / sample_rate;
    let lo = (f1 * scale).floor().max(0.0);
    let hi = (f2 * scale).ceil();
    if hi < 0.0 || lo > last as f64 || hi < lo {
        return None;
    }
    Some((lo as usize, (hi as usize).min(last)))
}

/// Signal and noise energies of a PSD for the band `[f1, f2]` Hz.
///
/// Only the positive-frequency half of `psd` is considered. Returns
/// `(in_band, out_of_band)`.
pub fn band_energies(psd: &[f64], sample_rate: f64, f1: f64, f2: f64) -> (f64, f64) {
    let half = &psd[..psd.len() / 2];
    if half.is_empty() {
        return (0.0, 0.0);
    }
    match band_bins(sample_rate, psd.len(), f1, f2, half.len() - 1) {
        Some((lo, hi)) => {
            let signal: f64 = half[lo..=hi].iter().sum();
            let noise: f64 = half[..lo].iter().chain(&half[hi + 1..]).sum();
            (signal, noise)
        }
        None => (0.0, half.iter().sum()),
    }
}

/// SNRI in dB of the band `[f1, f2]` Hz against the rest of the spectrum.
///
/// No out-of-band energy yields `+inf`, no in-band energy `-inf`; both are
/// valid results. A completely silent spectrum yields NaN.
pub fn snri_db(psd: &[f64], sample_rate: f64, f1: f64, f2: f64) -> f64 {
    let (signal, noise) = band_energies(psd, sample_rate, f1, f2);
    10.0 * (signal / noise).log10()
}
