//! Scalar reference implementations.
//!
//! Every vector backend is tested against these.

pub(crate) fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub(crate) fn scaled_accumulate(y: &mut [f32], x: &[f32], a: f32) {
    for (y, &x) in y.iter_mut().zip(x) {
        *y += a * x;
    }
}

pub(crate) fn scale(x: &mut [f32], gain: f32) {
    for v in x.iter_mut() {
        *v *= gain;
    }
}

pub(crate) fn power_spectrum(re: &[f32], im: &[f32], out: &mut [f32]) {
    for i in 0..out.len() {
        out[i] = re[i] * re[i] + im[i] * im[i];
    }
}

pub(crate) fn complex_multiply_accumulate(
    x_re: &[f32],
    x_im: &[f32],
    h_re: &[f32],
    h_im: &[f32],
    acc_re: &mut [f32],
    acc_im: &mut [f32],
) {
    for i in 0..acc_re.len() {
        acc_re[i] += x_re[i] * h_re[i] - x_im[i] * h_im[i];
        acc_im[i] += x_re[i] * h_im[i] + x_im[i] * h_re[i];
    }
}

pub(crate) fn complex_multiply_conjugate(
    a_re: &[f32],
    a_im: &[f32],
    b_re: &[f32],
    b_im: &[f32],
    out_re: &mut [f32],
    out_im: &mut [f32],
) {
    for i in 0..out_re.len() {
        // a * conj(b)
        out_re[i] = a_re[i] * b_re[i] + a_im[i] * b_im[i];
        out_im[i] = a_im[i] * b_re[i] - a_re[i] * b_im[i];
    }
}

pub(crate) fn phase_normalize(re: &mut [f32], im: &mut [f32], floor: f32) {
    for (r, i) in re.iter_mut().zip(im.iter_mut()) {
        let magnitude = (*r * *r + *i * *i).sqrt().max(floor);
        *r /= magnitude;
        *i /= magnitude;
    }
}

pub(crate) fn butterfly(
    lo_re: &mut [f32],
    lo_im: &mut [f32],
    hi_re: &mut [f32],
    hi_im: &mut [f32],
    w_re: &[f32],
    w_im: &[f32],
) {
    for k in 0..lo_re.len() {
        let t_re = w_re[k] * hi_re[k] - w_im[k] * hi_im[k];
        let t_im = w_re[k] * hi_im[k] + w_im[k] * hi_re[k];
        hi_re[k] = lo_re[k] - t_re;
        hi_im[k] = lo_im[k] - t_im;
        lo_re[k] += t_re;
        lo_im[k] += t_im;
    }
}

pub(crate) fn s16_to_float(src: &[i16], dest: &mut [f32]) {
    for (d, &s) in dest.iter_mut().zip(src) {
        *d = f32::from(s) * (1.0 / 32768.0);
    }
}

pub(crate) fn float_to_s16(src: &[f32], dest: &mut [i16]) {
    for (d, &s) in dest.iter_mut().zip(src) {
        *d = (s * 32768.0).clamp(-32768.0, 32767.0) as i16;
    }
}
