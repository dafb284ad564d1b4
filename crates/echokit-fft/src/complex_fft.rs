//! Radix-2 decimation-in-time complex FFT.
//!
//! Operates in place on separate real and imaginary arrays. After the
//! bit-reversal permutation, each of the `log2(n)` stages derives its twiddle
//! factors with the incremental rotation `w += w * (wpr + j*wpi)` instead of
//! evaluating sin/cos per bin, then applies one row of butterflies per group
//! through the SIMD backend.
//!
//! # Conventions
//!
//! - Forward: `X[k] = sum_n x[n] * exp(-2*pi*j*k*n/N)` (unscaled)
//! - Inverse: conjugate, forward, conjugate, scale by `1/N`, so that
//!   `inverse(forward(x)) == x` up to rounding

use echokit_simd::SimdBackend;

/// In-place power-of-two complex FFT.
///
/// Holds one twiddle row of scratch so that transforms never allocate.
#[derive(derive_more::Debug, Clone)]
pub struct ComplexFft {
    n: usize,
    backend: SimdBackend,
    #[debug(skip)]
    twiddle_re: Vec<f32>,
    #[debug(skip)]
    twiddle_im: Vec<f32>,
}

impl ComplexFft {
    /// Create an FFT of size `n` using the detected SIMD backend.
    ///
    /// # Panics
    ///
    /// Panics if `n < 2` or `n` is not a power of 2.
    pub fn new(n: usize) -> Self {
        Self::with_backend(n, echokit_simd::detect_backend())
    }

    /// Create an FFT of size `n` dispatching butterflies on `backend`.
    ///
    /// # Panics
    ///
    /// Panics if `n < 2` or `n` is not a power of 2.
    pub fn with_backend(n: usize, backend: SimdBackend) -> Self {
        assert!(n >= 2, "FFT size must be >= 2, got {n}");
        assert!(n.is_power_of_two(), "FFT size must be a power of 2, got {n}");
        Self {
            n,
            backend,
            twiddle_re: vec![0.0; n / 2],
            twiddle_im: vec![0.0; n / 2],
        }
    }

    /// Transform length.
    pub fn len(&self) -> usize {
        self.n
    }

    /// Always false; the smallest transform has two points.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Forward transform in place.
    ///
    /// # Panics
    ///
    /// Panics if `re` or `im` does not have length `n`.
    pub fn forward(&mut self, re: &mut [f32], im: &mut [f32]) {
        assert_eq!(re.len(), self.n, "real buffer length");
        assert_eq!(im.len(), self.n, "imaginary buffer length");
        bit_reverse(re, im);
        self.butterfly_stages(re, im);
    }

    /// Inverse transform in place, including the `1/n` scaling.
    ///
    /// # Panics
    ///
    /// Panics if `re` or `im` does not have length `n`.
    pub fn inverse(&mut self, re: &mut [f32], im: &mut [f32]) {
        assert_eq!(re.len(), self.n, "real buffer length");
        assert_eq!(im.len(), self.n, "imaginary buffer length");
        for v in im.iter_mut() {
            *v = -*v;
        }
        bit_reverse(re, im);
        self.butterfly_stages(re, im);
        let scale = 1.0 / self.n as f32;
        self.backend.scale(re, scale);
        self.backend.scale(im, -scale);
    }

    fn butterfly_stages(&mut self, re: &mut [f32], im: &mut [f32]) {
        let mut len = 2;
        while len <= self.n {
            let half = len / 2;

            // Twiddle recurrence in f64 to keep the row accurate for long transforms.
            let theta = -2.0 * std::f64::consts::PI / len as f64;
            let wtemp = (0.5 * theta).sin();
            let wpr = -2.0 * wtemp * wtemp;
            let wpi = theta.sin();
            let (mut wr, mut wi) = (1.0_f64, 0.0_f64);
            for k in 0..half {
                self.twiddle_re[k] = wr as f32;
                self.twiddle_im[k] = wi as f32;
                let w = wr;
                wr += w * wpr - wi * wpi;
                wi += wi * wpr + w * wpi;
            }

            let w_re = &self.twiddle_re[..half];
            let w_im = &self.twiddle_im[..half];
            for (group_re, group_im) in re.chunks_exact_mut(len).zip(im.chunks_exact_mut(len)) {
                let (lo_re, hi_re) = group_re.split_at_mut(half);
                let (lo_im, hi_im) = group_im.split_at_mut(half);
                self.backend.butterfly(lo_re, lo_im, hi_re, hi_im, w_re, w_im);
            }

            len <<= 1;
        }
    }
}

/// In-place bit-reversal permutation of both arrays.
fn bit_reverse(re: &mut [f32], im: &mut [f32]) {
    let n = re.len();
    let mut j = 0;
    for i in 0..n - 1 {
        if i < j {
            re.swap(i, j);
            im.swap(i, j);
        }
        let mut m = n >> 1;
        while m >= 1 && j & m != 0 {
            j ^= m;
            m >>= 1;
        }
        j |= m;
    }
}

#[cfg(test)]
mod tests {
    use proptest::collection::vec as pvec;
    use proptest::prelude::*;
    use test_strategy::proptest;

    use super::*;

    fn naive_dft(re: &[f32], im: &[f32]) -> (Vec<f32>, Vec<f32>) {
        let n = re.len();
        let mut out_re = vec![0.0; n];
        let mut out_im = vec![0.0; n];
        for k in 0..n {
            let (mut sr, mut si) = (0.0_f64, 0.0_f64);
            for t in 0..n {
                let angle = -2.0 * std::f64::consts::PI * (k * t) as f64 / n as f64;
                let (s, c) = angle.sin_cos();
                sr += re[t] as f64 * c - im[t] as f64 * s;
                si += re[t] as f64 * s + im[t] as f64 * c;
            }
            out_re[k] = sr as f32;
            out_im[k] = si as f32;
        }
        (out_re, out_im)
    }

    #[test]
    fn impulse_is_flat() {
        let mut fft = ComplexFft::new(64);
        let mut re = vec![0.0_f32; 64];
        let mut im = vec![0.0_f32; 64];
        re[0] = 1.0;

        fft.forward(&mut re, &mut im);

        for k in 0..64 {
            assert!((re[k] - 1.0).abs() < 1e-6, "re[{k}] = {}", re[k]);
            assert!(im[k].abs() < 1e-6, "im[{k}] = {}", im[k]);
        }
    }

    #[test]
    fn matches_naive_dft() {
        for &n in &[2, 4, 8, 16, 32, 128] {
            let re: Vec<f32> = (0..n).map(|i| (i as f32 * 0.37).sin()).collect();
            let im: Vec<f32> = (0..n).map(|i| (i as f32 * 0.11).cos() * 0.5).collect();
            let (expected_re, expected_im) = naive_dft(&re, &im);

            let mut fft = ComplexFft::new(n);
            let (mut out_re, mut out_im) = (re.clone(), im.clone());
            fft.forward(&mut out_re, &mut out_im);

            for k in 0..n {
                assert!(
                    (out_re[k] - expected_re[k]).abs() < 1e-3,
                    "size {n}, bin {k}: re {} vs {}",
                    out_re[k],
                    expected_re[k]
                );
                assert!(
                    (out_im[k] - expected_im[k]).abs() < 1e-3,
                    "size {n}, bin {k}: im {} vs {}",
                    out_im[k],
                    expected_im[k]
                );
            }
        }
    }

    #[test]
    fn single_tone_lands_in_its_bin() {
        let n = 256;
        let bin = 10;
        let mut fft = ComplexFft::new(n);
        let mut re: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * bin as f32 * i as f32 / n as f32).cos())
            .collect();
        let mut im = vec![0.0; n];

        fft.forward(&mut re, &mut im);

        // Real cosine splits evenly between +bin and -bin.
        assert!((re[bin] - n as f32 / 2.0).abs() < 1e-2, "re[bin] = {}", re[bin]);
        assert!((re[n - bin] - n as f32 / 2.0).abs() < 1e-2);
        for k in (0..n).filter(|&k| k != bin && k != n - bin) {
            assert!(re[k].abs() < 1e-2 && im[k].abs() < 1e-2, "leak at bin {k}");
        }
    }

    #[test]
    fn scalar_and_detected_backends_agree() {
        let n = 1024;
        let re: Vec<f32> = (0..n).map(|i| ((i * 7919) % 113) as f32 / 113.0 - 0.5).collect();
        let im: Vec<f32> = (0..n).map(|i| ((i * 104_729) % 97) as f32 / 97.0 - 0.5).collect();

        let mut scalar = ComplexFft::with_backend(n, SimdBackend::Scalar);
        let mut simd = ComplexFft::new(n);
        let (mut a_re, mut a_im) = (re.clone(), im.clone());
        let (mut b_re, mut b_im) = (re, im);
        scalar.forward(&mut a_re, &mut a_im);
        simd.forward(&mut b_re, &mut b_im);

        for k in 0..n {
            assert!((a_re[k] - b_re[k]).abs() < 1e-3, "re mismatch at {k}");
            assert!((a_im[k] - b_im[k]).abs() < 1e-3, "im mismatch at {k}");
        }
    }

    #[test]
    #[should_panic(expected = "power of 2")]
    fn rejects_non_power_of_two() {
        let _ = ComplexFft::new(100);
    }

    #[proptest]
    fn inverse_restores_input(
        #[strategy(1..=12u32)] log2n: u32,
        #[strategy(pvec(-1.0f32..1.0, 1usize << #log2n))] re: Vec<f32>,
        #[strategy(pvec(-1.0f32..1.0, 1usize << #log2n))] im: Vec<f32>,
    ) {
        let n = 1usize << log2n;
        let mut fft = ComplexFft::new(n);
        let (mut out_re, mut out_im) = (re.clone(), im.clone());

        fft.forward(&mut out_re, &mut out_im);
        fft.inverse(&mut out_re, &mut out_im);

        for i in 0..n {
            prop_assert!((out_re[i] - re[i]).abs() < 1e-4, "re[{}]: {} vs {}", i, out_re[i], re[i]);
            prop_assert!((out_im[i] - im[i]).abs() < 1e-4, "im[{}]: {} vs {}", i, out_im[i], im[i]);
        }
    }
}
