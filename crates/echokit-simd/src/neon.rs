//! NEON implementations of SIMD operations (aarch64).

use std::arch::aarch64::*;

/// NEON dot product: processes 4 floats at a time with vmlaq_f32.
///
/// # Safety
/// Caller must ensure NEON is available (always true on aarch64).
#[inline]
pub(crate) unsafe fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let chunks = len / 4;

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    let mut acc = unsafe { vdupq_n_f32(0.0) };

    for i in 0..chunks {
        let offset = i * 4;
        unsafe {
            let va = vld1q_f32(a_ptr.add(offset));
            let vb = vld1q_f32(b_ptr.add(offset));
            acc = vmlaq_f32(acc, va, vb);
        }
    }

    let mut result = unsafe { horizontal_sum(acc) };
    for i in chunks * 4..len {
        result += a[i] * b[i];
    }
    result
}

/// # Safety
/// Caller must ensure NEON is available.
#[inline]
pub(crate) unsafe fn scaled_accumulate(y: &mut [f32], x: &[f32], a: f32) {
    let len = y.len().min(x.len());
    let chunks = len / 4;

    let y_ptr = y.as_mut_ptr();
    let x_ptr = x.as_ptr();

    for i in 0..chunks {
        let offset = i * 4;
        unsafe {
            let vy = vld1q_f32(y_ptr.add(offset));
            let vx = vld1q_f32(x_ptr.add(offset));
            vst1q_f32(y_ptr.add(offset), vmlaq_n_f32(vy, vx, a));
        }
    }

    for i in chunks * 4..len {
        y[i] += a * x[i];
    }
}

/// # Safety
/// Caller must ensure NEON is available.
#[inline]
pub(crate) unsafe fn power_spectrum(re: &[f32], im: &[f32], out: &mut [f32]) {
    let len = out.len();
    let chunks = len / 4;

    let re_ptr = re.as_ptr();
    let im_ptr = im.as_ptr();
    let out_ptr = out.as_mut_ptr();

    for i in 0..chunks {
        let offset = i * 4;
        unsafe {
            let vr = vld1q_f32(re_ptr.add(offset));
            let vi = vld1q_f32(im_ptr.add(offset));
            let p = vmlaq_f32(vmulq_f32(vr, vr), vi, vi);
            vst1q_f32(out_ptr.add(offset), p);
        }
    }

    for i in chunks * 4..len {
        out[i] = re[i] * re[i] + im[i] * im[i];
    }
}

/// NEON complex multiply-accumulate:
///   acc_re[i] += x_re[i]*h_re[i] - x_im[i]*h_im[i]
///   acc_im[i] += x_re[i]*h_im[i] + x_im[i]*h_re[i]
///
/// # Safety
/// Caller must ensure NEON is available.
#[inline]
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
        unsafe {
            let vxr = vld1q_f32(xr_ptr.add(offset));
            let vxi = vld1q_f32(xi_ptr.add(offset));
            let vhr = vld1q_f32(hr_ptr.add(offset));
            let vhi = vld1q_f32(hi_ptr.add(offset));

            let mut var = vld1q_f32(ar_ptr.add(offset));
            var = vmlaq_f32(var, vxr, vhr);
            var = vmlsq_f32(var, vxi, vhi);
            vst1q_f32(ar_ptr.add(offset), var);

            let mut vai = vld1q_f32(ai_ptr.add(offset));
            vai = vmlaq_f32(vai, vxr, vhi);
            vai = vmlaq_f32(vai, vxi, vhr);
            vst1q_f32(ai_ptr.add(offset), vai);
        }
    }

    for i in chunks * 4..len {
        acc_re[i] += x_re[i] * h_re[i] - x_im[i] * h_im[i];
        acc_im[i] += x_re[i] * h_im[i] + x_im[i] * h_re[i];
    }
}

/// NEON `out = a * conj(b)`.
///
/// # Safety
/// Caller must ensure NEON is available.
#[inline]
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
        unsafe {
            let var = vld1q_f32(ar_ptr.add(offset));
            let vai = vld1q_f32(ai_ptr.add(offset));
            let vbr = vld1q_f32(br_ptr.add(offset));
            let vbi = vld1q_f32(bi_ptr.add(offset));

            let re = vmlaq_f32(vmulq_f32(var, vbr), vai, vbi);
            let im = vmlsq_f32(vmulq_f32(vai, vbr), var, vbi);
            vst1q_f32(or_ptr.add(offset), re);
            vst1q_f32(oi_ptr.add(offset), im);
        }
    }

    for i in chunks * 4..len {
        out_re[i] = a_re[i] * b_re[i] + a_im[i] * b_im[i];
        out_im[i] = a_im[i] * b_re[i] - a_re[i] * b_im[i];
    }
}

/// One row of radix-2 butterflies: `t = w*hi; hi = lo - t; lo = lo + t`.
///
/// # Safety
/// Caller must ensure NEON is available.
#[inline]
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
        unsafe {
            let wr = vld1q_f32(wr_ptr.add(offset));
            let wi = vld1q_f32(wi_ptr.add(offset));
            let hr = vld1q_f32(hr_ptr.add(offset));
            let hi = vld1q_f32(hi_ptr.add(offset));
            let lr = vld1q_f32(lr_ptr.add(offset));
            let li = vld1q_f32(li_ptr.add(offset));

            let tr = vmlsq_f32(vmulq_f32(wr, hr), wi, hi);
            let ti = vmlaq_f32(vmulq_f32(wr, hi), wi, hr);

            vst1q_f32(hr_ptr.add(offset), vsubq_f32(lr, tr));
            vst1q_f32(hi_ptr.add(offset), vsubq_f32(li, ti));
            vst1q_f32(lr_ptr.add(offset), vaddq_f32(lr, tr));
            vst1q_f32(li_ptr.add(offset), vaddq_f32(li, ti));
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

/// Reduce a float32x4_t to a scalar sum.
#[inline(always)]
unsafe fn horizontal_sum(v: float32x4_t) -> f32 {
    unsafe {
        let sum_pair = vadd_f32(vget_high_f32(v), vget_low_f32(v));
        let sum = vpadd_f32(sum_pair, sum_pair);
        vget_lane_f32::<0>(sum)
    }
}
