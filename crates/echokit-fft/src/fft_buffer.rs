//! Split real/imaginary complex buffer.

/// A complex signal stored as parallel real and imaginary arrays.
///
/// Allocated once at component creation and reused every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FftBuffer {
    pub re: Vec<f32>,
    pub im: Vec<f32>,
}

impl FftBuffer {
    /// Create a zeroed buffer of `n` complex values.
    pub fn new(n: usize) -> Self {
        Self {
            re: vec![0.0; n],
            im: vec![0.0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.re.len()
    }

    pub fn is_empty(&self) -> bool {
        self.re.is_empty()
    }

    /// Zero both arrays.
    pub fn clear(&mut self) {
        self.re.fill(0.0);
        self.im.fill(0.0);
    }

    /// Load a real signal, zero-padding the remainder and clearing the
    /// imaginary part. Samples beyond the buffer length are ignored.
    pub fn load_real(&mut self, samples: &[f32]) {
        let count = samples.len().min(self.re.len());
        self.re[..count].copy_from_slice(&samples[..count]);
        self.re[count..].fill(0.0);
        self.im.fill(0.0);
    }

    /// Mutable access to both halves at once, for in-place transforms.
    pub fn parts_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        (&mut self.re, &mut self.im)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_real_zero_pads() {
        let mut buf = FftBuffer::new(8);
        buf.im.fill(3.0);
        buf.re.fill(9.0);

        buf.load_real(&[1.0, 2.0, 3.0]);

        assert_eq!(buf.re, [1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(buf.im.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn load_real_truncates_long_input() {
        let mut buf = FftBuffer::new(2);
        buf.load_real(&[1.0, 2.0, 3.0]);
        assert_eq!(buf.re, [1.0, 2.0]);
    }

    #[test]
    fn clear_zeroes_everything() {
        let mut buf = FftBuffer::new(4);
        buf.re.fill(1.0);
        buf.im.fill(-1.0);
        buf.clear();
        assert_eq!(buf, FftBuffer::new(4));
    }
}
