//! In-place radix-2 FFT engine.
//!
//! Iterative Cooley-Tukey decimation-in-time transform over two parallel
//! `f64` buffers holding the real and imaginary parts of the signal. Twiddle
//! factors are produced by the half-angle recurrence, one rotation step per
//! stage, and accumulated multiplicatively across the butterflies of a stage.
//!
//! ## Scaling
//!
//! The forward transform divides every output sample by `N`; the inverse
//! applies no scaling. A forward pass followed by an inverse pass is therefore
//! the identity. The dual-real unpacking in [`crate::dual_real`] compensates
//! for this convention with its own fixed constant.

/// Transform direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Time to frequency, output scaled by `1/N`.
    Forward,
    /// Frequency to time, unscaled.
    Inverse,
}

/// Returns `m` such that `size == 2^m`, or `None` if `size` is not a power of two.
pub fn log2_size(size: usize) -> Option<u32> {
    if size.is_power_of_two() {
        Some(size.trailing_zeros())
    } else {
        None
    }
}

/// Compute a complex DFT of `2^m` points in place.
///
/// `re` and `im` hold the real and imaginary parts and are overwritten with
/// the transform. Both must have exactly `2^m` elements.
///
/// # Panics
///
/// Panics if the buffer lengths differ from `2^m`.
pub fn fft_in_place(direction: Direction, m: u32, re: &mut [f64], im: &mut [f64]) {
    let n = 1usize << m;
    assert_eq!(re.len(), n, "real buffer length must be 2^{m}");
    assert_eq!(im.len(), n, "imaginary buffer length must be 2^{m}");

    bit_reverse(re, im);

    let mut c1 = -1.0_f64;
    let mut c2 = 0.0_f64;
    let mut l2 = 1usize;
    for _ in 0..m {
        let l1 = l2;
        l2 <<= 1;
        let mut u1 = 1.0_f64;
        let mut u2 = 0.0_f64;
        for j in 0..l1 {
            let mut i = j;
            while i < n {
                let i1 = i + l1;
                let t1 = u1 * re[i1] - u2 * im[i1];
                let t2 = u1 * im[i1] + u2 * re[i1];
                re[i1] = re[i] - t1;
                im[i1] = im[i] - t2;
                re[i] += t1;
                im[i] += t2;
                i += l2;
            }
            let z = u1 * c1 - u2 * c2;
            u2 = u1 * c2 + u2 * c1;
            u1 = z;
        }
        c2 = ((1.0 - c1) / 2.0).sqrt();
        if direction == Direction::Forward {
            c2 = -c2;
        }
        c1 = ((1.0 + c1) / 2.0).sqrt();
    }

    if direction == Direction::Forward {
        let scale = 1.0 / n as f64;
        for (x, y) in re.iter_mut().zip(im.iter_mut()) {
            *x *= scale;
            *y *= scale;
        }
    }
}

/// Reorder `(re[i], im[i])` pairs into bit-reversed index order.
///
/// Uses the running reversed-counter increment instead of a lookup table.
fn bit_reverse(re: &mut [f64], im: &mut [f64]) {
    let n = re.len();
    if n < 2 {
        return;
    }
    let half = n >> 1;
    let mut j = 0usize;
    for i in 0..n - 1 {
        if i < j {
            re.swap(i, j);
            im.swap(i, j);
        }
        let mut k = half;
        while k <= j {
            j -= k;
            k >>= 1;
        }
        j += k;
    }
}
