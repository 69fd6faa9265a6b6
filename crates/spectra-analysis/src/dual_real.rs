//! Two real spectra from one complex FFT.
//!
//! Two real signals `a` and `b` are packed as the real and imaginary parts of
//! one complex sequence and transformed once. Because the spectrum of a real
//! signal is conjugate symmetric, each signal's spectrum can be separated
//! from the combined transform `X`:
//!
//! ```text
//! A[k] = (X[k] + conj(X[N-k])) / norm
//! B[k] = (X[k] - conj(X[N-k])) / (i * norm)
//! ```
//!
//! with indices taken modulo `N`.
//!
//! ## Normalization
//!
//! `norm` is the fixed constant [`UNPACK_NORM`] = `2 / (1 + sqrt(2))`, not the
//! exact factor 2. Every unpacked bin therefore carries an extra gain of
//! `2 / UNPACK_NORM = 1 + sqrt(2)` relative to the forward-scaled transform of
//! [`crate::fft`]. The constant is kept as-is so absolute PSD levels (and the
//! dB thresholds of existing masks) stay comparable.

use num_complex::Complex64;

use crate::fft::{Direction, fft_in_place};

/// Normalization divisor applied when unpacking a packed transform.
pub const UNPACK_NORM: f64 = 2.0 / (1.0 + std::f64::consts::SQRT_2);

/// Separate bin `k` of a packed transform into the spectra of both signals.
///
/// `re` and `im` are the real and imaginary parts of the transform of
/// `a + i*b`. Returns `(A[k], B[k])`.
#[inline]
pub fn unpack_bin(re: &[f64], im: &[f64], k: usize) -> (Complex64, Complex64) {
    let n = re.len();
    let mirror = (n - k) % n;
    let a = Complex64::new(
        (re[k] + re[mirror]) / UNPACK_NORM,
        (im[k] - im[mirror]) / UNPACK_NORM,
    );
    let b = Complex64::new(
        (im[k] + im[mirror]) / UNPACK_NORM,
        (re[mirror] - re[k]) / UNPACK_NORM,
    );
    (a, b)
}

/// Unpack a packed transform into the squared-magnitude spectra of both signals.
///
/// Writes all `N` bins of `psd_a` and `psd_b`. No square root is taken.
pub fn unpack_power(re: &[f64], im: &[f64], psd_a: &mut [f64], psd_b: &mut [f64]) {
    debug_assert_eq!(re.len(), im.len());
    debug_assert_eq!(psd_a.len(), re.len());
    debug_assert_eq!(psd_b.len(), re.len());

    for k in 0..re.len() {
        let (a, b) = unpack_bin(re, im, k);
        psd_a[k] = a.norm_sqr();
        psd_b[k] = b.norm_sqr();
    }
}

/// Transform two real signals with one complex FFT and return both spectra.
///
/// Convenience wrapper over [`fft_in_place`] and [`unpack_bin`] that leaves
/// its inputs untouched. Both signals must have the same power-of-two length.
pub fn dual_real_spectra(a: &[f64], b: &[f64]) -> (Vec<Complex64>, Vec<Complex64>) {
    assert_eq!(a.len(), b.len(), "paired signals must have equal length");
    let Some(m) = crate::fft::log2_size(a.len()) else {
        panic!("signal length {} is not a power of two", a.len());
    };

    let mut re = a.to_vec();
    let mut im = b.to_vec();
    fft_in_place(Direction::Forward, m, &mut re, &mut im);

    (0..a.len()).map(|k| unpack_bin(&re, &im, k)).unzip()
}
