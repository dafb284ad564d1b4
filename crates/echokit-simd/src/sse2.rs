//! SSE2 implementations of SIMD operations (x86/x86_64).

#[cfg(target_arch = "x86")]
use std::arch::x86::*;
#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

/// SSE2 dot product: processes 4 floats at a time.
#[target_feature(enable = "sse2")]
pub(crate) unsafe fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let chunks = len / 4;

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();
    let mut acc = _mm_setzero_ps();

    for i in 0..chunks {
        let offset = i * 4;
        // SAFETY: offset + 4 <= len for every full chunk.
        unsafe {
            let va = _mm_loadu_ps(a_ptr.add(offset));
            let vb = _mm_loadu_ps(b_ptr.add(offset));
            acc = _mm_add_ps(acc, _mm_mul_ps(va, vb));
        }
    }

    // SAFETY: sse2 is enabled for this function.
    let mut result = unsafe { horizontal_sum(acc) };
    for i in chunks * 4..len {
        result += a[i] * b[i];
    }
    result
}

/// `y[i] += a * x[i]`
#[target_feature(enable = "sse2")]
pub(crate) unsafe fn scaled_accumulate(y: &mut [f32], x: &[f32], a: f32) {
    let len = y.len().min(x.len());
    let chunks = len / 4;

    let y_ptr = y.as_mut_ptr();
    let x_ptr = x.as_ptr();
    let va = _mm_set1_ps(a);

    for i in 0..chunks {
        let offset = i * 4;
        // SAFETY: offset + 4 <= len for every full chunk.
        unsafe {
            let vy = _mm_loadu_ps(y_ptr.add(offset));
            let vx = _mm_loadu_ps(x_ptr.add(offset));
            _mm_storeu_ps(y_ptr.add(offset), _mm_add_ps(vy, _mm_mul_ps(va, vx)));
        }
    }

    for i in chunks * 4..len {
        y[i] += a * x[i];
    }
}

#[target_feature(enable = "sse2")]
pub(crate) unsafe fn power_spectrum(re: &[f32], im: &[f32], out: &mut [f32]) {
    let len = out.len();
    let chunks = len / 4;

    let re_ptr = re.as_ptr();
    let im_ptr = im.as_ptr();
    let out_ptr = out.as_mut_ptr();

    for i in 0..chunks {
        let offset = i * 4;
        // SAFETY: offset + 4 <= len for every full chunk; inputs are at least `len` long.
        unsafe {
            let vr = _mm_loadu_ps(re_ptr.add(offset));
            let vi = _mm_loadu_ps(im_ptr.add(offset));
            let p = _mm_add_ps(_mm_mul_ps(vr, vr), _mm_mul_ps(vi, vi));
            _mm_storeu_ps(out_ptr.add(offset), p);
        }
    }

    for i in chunks * 4..len {
        out[i] = re[i] * re[i] + im[i] * im[i];
    }
}

#[target_feature(enable = "sse2")]
pub(crate) unsafe fn complex_multiply_accumulate(
    x_re: &[f32],
    x_im: &[f32],
    h_re: &[f32],
    h_im: &[f32],
    acc_re: &mut [f32],
    acc_im: &mut [f32],
) {
    let len = acc_re.len();
    let chunks = len / 4;

    let xr_ptr = x_re.as_ptr();
    let xi_ptr = x_im.as_ptr();
    let hr_ptr = h_re.as_ptr();
    let hi_ptr = h_im.as_ptr();
    let ar_ptr = acc_re.as_mut_ptr();
    let ai_ptr = acc_im.as_mut_ptr();

    for i in 0..chunks {
        let offset = i * 4;
        // SAFETY: all slices share the length of `acc_re`.
        unsafe {
            let xr = _mm_loadu_ps(xr_ptr.add(offset));
            let xi = _mm_loadu_ps(xi_ptr.add(offset));
            let hr = _mm_loadu_ps(hr_ptr.add(offset));
            let hi = _mm_loadu_ps(hi_ptr.add(offset));

            let re = _mm_sub_ps(_mm_mul_ps(xr, hr), _mm_mul_ps(xi, hi));
            let im = _mm_add_ps(_mm_mul_ps(xr, hi), _mm_mul_ps(xi, hr));

            let ar = _mm_loadu_ps(ar_ptr.add(offset));
            let ai = _mm_loadu_ps(ai_ptr.add(offset));
            _mm_storeu_ps(ar_ptr.add(offset), _mm_add_ps(ar, re));
            _mm_storeu_ps(ai_ptr.add(offset), _mm_add_ps(ai, im));
        }
    }

    for i in chunks * 4..len {
        acc_re[i] += x_re[i] * h_re[i] - x_im[i] * h_im[i];
        acc_im[i] += x_re[i] * h_im[i] + x_im[i] * h_re[i];
    }
}

#[target_feature(enable = "sse2")]
pub(crate) unsafe fn complex_multiply_conjugate(
    a_re: &[f32],
    a_im: &[f32],
    b_re: &[f32],
    b_im: &[f32],
    out_re: &mut [f32],
    out_im: &mut [f32],
) {
    let len = out_re.len();
    let chunks = len / 4;

    let ar_ptr = a_re.as_ptr();
    let ai_ptr = a_im.as_ptr();
    let br_ptr = b_re.as_ptr();
    let bi_ptr = b_im.as_ptr();
    let or_ptr = out_re.as_mut_ptr();
    let oi_ptr = out_im.as_mut_ptr();

    for i in 0..chunks {
        let offset = i * 4;
        // SAFETY: all slices share the length of `out_re`.
        unsafe {
            let ar = _mm_loadu_ps(ar_ptr.add(offset));
            let ai = _mm_loadu_ps(ai_ptr.add(offset));
            let br = _mm_loadu_ps(br_ptr.add(offset));
            let bi = _mm_loadu_ps(bi_ptr.add(offset));

            let re = _mm_add_ps(_mm_mul_ps(ar, br), _mm_mul_ps(ai, bi));
            let im = _mm_sub_ps(_mm_mul_ps(ai, br), _mm_mul_ps(ar, bi));
            _mm_storeu_ps(or_ptr.add(offset), re);
            _mm_storeu_ps(oi_ptr.add(offset), im);
        }
    }

    for i in chunks * 4..len {
        out_re[i] = a_re[i] * b_re[i] + a_im[i] * b_im[i];
        out_im[i] = a_im[i] * b_re[i] - a_re[i] * b_im[i];
    }
}

#[target_feature(enable = "sse2")]
pub(crate) unsafe fn butterfly(
    lo_re: &mut [f32],
    lo_im: &mut [f32],
    hi_re: &mut [f32],
    hi_im: &mut [f32],
    w_re: &[f32],
    w_im: &[f32],
) {
    let len = lo_re.len();
    let chunks = len / 4;

    let lr_ptr = lo_re.as_mut_ptr();
    let li_ptr = lo_im.as_mut_ptr();
    let hr_ptr = hi_re.as_mut_ptr();
    let hi_ptr = hi_im.as_mut_ptr();
    let wr_ptr = w_re.as_ptr();
    let wi_ptr = w_im.as_ptr();

    for i in 0..chunks {
        let offset = i * 4;
        // SAFETY: all slices share the length of `lo_re`.
        unsafe {
            let wr = _mm_loadu_ps(wr_ptr.add(offset));
            let wi = _mm_loadu_ps(wi_ptr.add(offset));
            let hr = _mm_loadu_ps(hr_ptr.add(offset));
            let hi = _mm_loadu_ps(hi_ptr.add(offset));
            let lr = _mm_loadu_ps(lr_ptr.add(offset));
            let li = _mm_loadu_ps(li_ptr.add(offset));

            let tr = _mm_sub_ps(_mm_mul_ps(wr, hr), _mm_mul_ps(wi, hi));
            let ti = _mm_add_ps(_mm_mul_ps(wr, hi), _mm_mul_ps(wi, hr));

            _mm_storeu_ps(hr_ptr.add(offset), _mm_sub_ps(lr, tr));
            _mm_storeu_ps(hi_ptr.add(offset), _mm_sub_ps(li, ti));
            _mm_storeu_ps(lr_ptr.add(offset), _mm_add_ps(lr, tr));
            _mm_storeu_ps(li_ptr.add(offset), _mm_add_ps(li, ti));
        }
    }

    for k in chunks * 4..len {
        let t_re = w_re[k] * hi_re[k] - w_im[k] * hi_im[k];
        let t_im = w_re[k] * hi_im[k] + w_im[k] * hi_re[k];
        hi_re[k] = lo_re[k] - t_re;
        hi_im[k] = lo_im[k] - t_im;
        lo_re[k] += t_re;
        lo_im[k] += t_im;
    }
}

/// Reduce an `__m128` to a scalar sum.
#[inline]
#[target_feature(enable = "sse2")]
unsafe fn horizontal_sum(v: __m128) -> f32 {
    unsafe {
        let hi = _mm_movehl_ps(v, v);
        let sum = _mm_add_ps(v, hi);
        let shuffled = _mm_shuffle_ps::<0b01>(sum, sum);
        _mm_cvtss_f32(_mm_add_ss(sum, shuffled))
    }
}
