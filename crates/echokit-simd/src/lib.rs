//! Vector math primitives for the echokit DSP crates.
//!
//! Provides a portable interface over SSE2 and NEON intrinsics with runtime
//! CPU feature detection and a scalar fallback.
//!
//! # Design
//!
//! The backend is resolved once with [`detect_backend`] and then handed by
//! value to every component that dispatches on it. There is no global
//! capability flag. Operations work in place on caller-owned slices and never
//! allocate, so they are safe to call from a real-time audio callback.

mod fallback;

#[cfg(target_arch = "aarch64")]
mod neon;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod sse2;

/// Available SIMD backends, selected at runtime based on CPU features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdBackend {
    /// Scalar fallback, works on all platforms.
    Scalar,
    /// x86/x86_64 SSE2 (128-bit, 4 floats at a time).
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    Sse2,
    /// ARM aarch64 NEON (128-bit, 4 floats at a time).
    #[cfg(target_arch = "aarch64")]
    Neon,
}

impl Default for SimdBackend {
    fn default() -> Self {
        detect_backend()
    }
}

impl SimdBackend {
    /// Short lowercase name for logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Self::Sse2 => "sse2",
            #[cfg(target_arch = "aarch64")]
            Self::Neon => "neon",
        }
    }

    /// Sum of `a[i] * b[i]`.
    ///
    /// Both slices must be the same length.
    pub fn dot_product(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            Self::Scalar => fallback::dot_product(a, b),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            // SAFETY: `Sse2` is only handed out after the cpufeatures check.
            Self::Sse2 => unsafe { sse2::dot_product(a, b) },
            #[cfg(target_arch = "aarch64")]
            // SAFETY: every aarch64 target has NEON.
            Self::Neon => unsafe { neon::dot_product(a, b) },
        }
    }

    /// Sum of squares of `x`.
    pub fn energy(self, x: &[f32]) -> f32 {
        self.dot_product(x, x)
    }

    /// Scaled accumulate: `y[i] += a * x[i]`.
    pub fn scaled_accumulate(self, y: &mut [f32], x: &[f32], a: f32) {
        debug_assert_eq!(y.len(), x.len());
        match self {
            Self::Scalar => fallback::scaled_accumulate(y, x, a),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            // SAFETY: `Sse2` is only handed out after the cpufeatures check.
            Self::Sse2 => unsafe { sse2::scaled_accumulate(y, x, a) },
            #[cfg(target_arch = "aarch64")]
            // SAFETY: every aarch64 target has NEON.
            Self::Neon => unsafe { neon::scaled_accumulate(y, x, a) },
        }
    }

    /// Multiply every sample by `gain`.
    pub fn scale(self, x: &mut [f32], gain: f32) {
        // Auto-vectorizes on every target.
        fallback::scale(x, gain);
    }

    /// Power spectrum: `out[i] = re[i]^2 + im[i]^2`.
    pub fn power_spectrum(self, re: &[f32], im: &[f32], out: &mut [f32]) {
        debug_assert_eq!(re.len(), out.len());
        debug_assert_eq!(im.len(), out.len());
        match self {
            Self::Scalar => fallback::power_spectrum(re, im, out),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            // SAFETY: `Sse2` is only handed out after the cpufeatures check.
            Self::Sse2 => unsafe { sse2::power_spectrum(re, im, out) },
            #[cfg(target_arch = "aarch64")]
            // SAFETY: every aarch64 target has NEON.
            Self::Neon => unsafe { neon::power_spectrum(re, im, out) },
        }
    }

    /// Complex multiply-accumulate:
    ///   acc_re[i] += x_re[i]*h_re[i] - x_im[i]*h_im[i]
    ///   acc_im[i] += x_re[i]*h_im[i] + x_im[i]*h_re[i]
    ///
    /// All slices must have the same length.
    pub fn complex_multiply_accumulate(
        self,
        x_re: &[f32],
        x_im: &[f32],
        h_re: &[f32],
        h_im: &[f32],
        acc_re: &mut [f32],
        acc_im: &mut [f32],
    ) {
        debug_assert_eq!(x_re.len(), x_im.len());
        debug_assert_eq!(x_re.len(), h_re.len());
        debug_assert_eq!(x_re.len(), h_im.len());
        debug_assert_eq!(x_re.len(), acc_re.len());
        debug_assert_eq!(x_re.len(), acc_im.len());
        match self {
            Self::Scalar => {
                fallback::complex_multiply_accumulate(x_re, x_im, h_re, h_im, acc_re, acc_im);
            }
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            // SAFETY: `Sse2` is only handed out after the cpufeatures check.
            Self::Sse2 => unsafe {
                sse2::complex_multiply_accumulate(x_re, x_im, h_re, h_im, acc_re, acc_im);
            },
            #[cfg(target_arch = "aarch64")]
            // SAFETY: every aarch64 target has NEON.
            Self::Neon => unsafe {
                neon::complex_multiply_accumulate(x_re, x_im, h_re, h_im, acc_re, acc_im);
            },
        }
    }

    /// Cross spectrum `out = a * conj(b)`:
    ///   out_re[i] = a_re[i]*b_re[i] + a_im[i]*b_im[i]
    ///   out_im[i] = a_im[i]*b_re[i] - a_re[i]*b_im[i]
    pub fn complex_multiply_conjugate(
        self,
        a_re: &[f32],
        a_im: &[f32],
        b_re: &[f32],
        b_im: &[f32],
        out_re: &mut [f32],
        out_im: &mut [f32],
    ) {
        debug_assert_eq!(a_re.len(), out_re.len());
        debug_assert_eq!(a_im.len(), out_re.len());
        debug_assert_eq!(b_re.len(), out_re.len());
        debug_assert_eq!(b_im.len(), out_re.len());
        debug_assert_eq!(out_im.len(), out_re.len());
        match self {
            Self::Scalar => {
                fallback::complex_multiply_conjugate(a_re, a_im, b_re, b_im, out_re, out_im);
            }
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            // SAFETY: `Sse2` is only handed out after the cpufeatures check.
            Self::Sse2 => unsafe {
                sse2::complex_multiply_conjugate(a_re, a_im, b_re, b_im, out_re, out_im);
            },
            #[cfg(target_arch = "aarch64")]
            // SAFETY: every aarch64 target has NEON.
            Self::Neon => unsafe {
                neon::complex_multiply_conjugate(a_re, a_im, b_re, b_im, out_re, out_im);
            },
        }
    }

    /// Normalize every bin to unit magnitude: `z / max(|z|, floor)`.
    pub fn phase_normalize(self, re: &mut [f32], im: &mut [f32], floor: f32) {
        debug_assert_eq!(re.len(), im.len());
        fallback::phase_normalize(re, im, floor);
    }

    /// One row of radix-2 decimation-in-time butterflies.
    ///
    /// For each `k`: `t = w[k] * hi[k]`, `hi[k] = lo[k] - t`, `lo[k] += t`.
    pub fn butterfly(
        self,
        lo_re: &mut [f32],
        lo_im: &mut [f32],
        hi_re: &mut [f32],
        hi_im: &mut [f32],
        w_re: &[f32],
        w_im: &[f32],
    ) {
        debug_assert_eq!(lo_re.len(), lo_im.len());
        debug_assert_eq!(lo_re.len(), hi_re.len());
        debug_assert_eq!(lo_re.len(), hi_im.len());
        debug_assert_eq!(lo_re.len(), w_re.len());
        debug_assert_eq!(lo_re.len(), w_im.len());
        match self {
            Self::Scalar => fallback::butterfly(lo_re, lo_im, hi_re, hi_im, w_re, w_im),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            // SAFETY: `Sse2` is only handed out after the cpufeatures check.
            Self::Sse2 => unsafe { sse2::butterfly(lo_re, lo_im, hi_re, hi_im, w_re, w_im) },
            #[cfg(target_arch = "aarch64")]
            // SAFETY: every aarch64 target has NEON.
            Self::Neon => unsafe { neon::butterfly(lo_re, lo_im, hi_re, hi_im, w_re, w_im) },
        }
    }

    /// Convert 16-bit PCM to float in `[-1, 1)`.
    pub fn s16_to_float(self, src: &[i16], dest: &mut [f32]) {
        debug_assert_eq!(src.len(), dest.len());
        fallback::s16_to_float(src, dest);
    }

    /// Convert float samples back to 16-bit PCM, saturating.
    pub fn float_to_s16(self, src: &[f32], dest: &mut [i16]) {
        debug_assert_eq!(src.len(), dest.len());
        fallback::float_to_s16(src, dest);
    }
}

// Cached after the first query.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
cpufeatures::new!(has_sse2, "sse2");

/// Picks the widest backend the running CPU supports.
///
/// SSE2 on x86 when present, NEON on aarch64, scalar everywhere else.
pub fn detect_backend() -> SimdBackend {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        if has_sse2::get() {
            return SimdBackend::Sse2;
        }
    }

    #[cfg(target_arch = "aarch64")]
    {
        return SimdBackend::Neon;
    }

    #[allow(unreachable_code, reason = "fallback for architectures without SIMD")]
    SimdBackend::Scalar
}
