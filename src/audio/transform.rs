use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Real-input forward FFT with buffers sized once at startup.
///
/// Only the non-redundant half of the spectrum is exposed: a real input of
/// `N` samples yields `N / 2 + 1` bins.
pub struct SpectralTransform {
    fft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    frame_size: usize,
    #[cfg(test)]
    on_release: Option<Box<dyn FnOnce()>>,
}

impl SpectralTransform {
    pub fn new(frame_size: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(frame_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        log::debug!(
            "Planned FFT: {} samples, {} bins, scratch={}",
            frame_size,
            frame_size / 2 + 1,
            scratch.len()
        );
        Self {
            fft,
            buffer: vec![Complex::new(0.0, 0.0); frame_size],
            scratch,
            frame_size,
            #[cfg(test)]
            on_release: None,
        }
    }

    /// Transforms one windowed frame, overwriting the previous result.
    ///
    /// Panics if `windowed.len()` differs from the planned frame size.
    pub fn execute(&mut self, windowed: &[f64]) -> &[Complex<f64>] {
        assert_eq!(
            windowed.len(),
            self.frame_size,
            "transform planned for {} samples",
            self.frame_size
        );
        for (dst, &x) in self.buffer.iter_mut().zip(windowed) {
            *dst = Complex::new(x, 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);
        &self.buffer[..self.frame_size / 2 + 1]
    }

    /// Runs `hook` when the plan is dropped.
    #[cfg(test)]
    pub fn on_release(&mut self, hook: impl FnOnce() + 'static) {
        self.on_release = Some(Box::new(hook));
    }
}

impl Drop for SpectralTransform {
    fn drop(&mut self) {
        log::debug!("Released FFT plan ({} samples)", self.frame_size);
        #[cfg(test)]
        if let Some(hook) = self.on_release.take() {
            hook();
        }
    }
}
