use crate::config::ConfigError;

/// Hann window coefficient for sample `n` of an `size`-sample frame.
pub fn hann(n: usize, size: usize) -> f32 {
    0.5 * (1.0 - (2.0 * std::f32::consts::PI * n as f32 / (size - 1) as f32).cos())
}

/// Window coefficients computed once per frame size.
#[derive(Debug, Clone)]
pub struct WindowTable {
    coefficients: Vec<f32>,
}

impl WindowTable {
    pub fn new(frame_size: usize) -> Result<Self, ConfigError> {
        if frame_size < 2 {
            return Err(ConfigError::WindowTooShort(frame_size));
        }
        Ok(Self {
            coefficients: (0..frame_size).map(|n| hann(n, frame_size)).collect(),
        })
    }

    #[cfg(test)]
    pub fn coefficients(&self) -> &[f32] {
        &self.coefficients
    }

    /// Writes `samples[i] * w[i]` into `out`. Both slices must match the table length.
    pub fn apply(&self, samples: &[f32], out: &mut [f64]) {
        assert_eq!(samples.len(), self.coefficients.len());
        assert_eq!(out.len(), self.coefficients.len());
        for ((dst, &s), &w) in out.iter_mut().zip(samples).zip(&self.coefficients) {
            *dst = (w * s) as f64;
        }
    }
}
