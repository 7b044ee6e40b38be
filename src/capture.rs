use anyhow::{Context, Result};

use crate::audio::aggregate::{Bar, SpectrumAggregator};
use crate::audio::source::AudioSource;
use crate::audio::transform::SpectralTransform;
use crate::audio::window::WindowTable;
use crate::config::Settings;
use crate::render::frame::{FrameRenderer, Surface};
use crate::signal::Cancellation;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Cancelling,
    Stopped,
}

/// Drives capture → window → transform → aggregate → render, one frame per
/// audio read, until cancelled or a read fails.
pub struct CaptureLoop<A: AudioSource, S: Surface> {
    transform: SpectralTransform,
    window: WindowTable,
    aggregator: SpectrumAggregator,
    renderer: FrameRenderer,
    samples: Vec<f32>,
    windowed: Vec<f64>,
    bars: Vec<Bar>,
    source: A,
    surface: S,
    state: LoopState,
    frames: u64,
}

impl<A: AudioSource, S: Surface> CaptureLoop<A, S> {
    /// Takes ownership of an opened source and surface.
    pub fn new(settings: &Settings, source: A, surface: S) -> Result<Self> {
        settings.validate()?;
        let frame_size = settings.frame_size();
        let window = WindowTable::new(frame_size)?;
        let transform = SpectralTransform::new(frame_size);
        log::info!(
            "Frame: {} samples @ {}Hz, {} fps, upper={:.1}Hz",
            frame_size,
            settings.sample_rate,
            settings.frames_per_second,
            settings.upper_frequency_hz
        );
        Ok(Self {
            window,
            transform,
            aggregator: SpectrumAggregator::new(settings),
            renderer: FrameRenderer::new(settings.bar_glyph),
            samples: vec![0.0; frame_size],
            windowed: vec![0.0; frame_size],
            bars: Vec::new(),
            source,
            surface,
            state: LoopState::Running,
            frames: 0,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Runs until `cancel` is observed at the top of an iteration or a frame
    /// fails. Releases the transform, the audio source and the surface, in
    /// that order, on every exit path. Returns the number of frames drawn.
    pub fn run(mut self, cancel: &Cancellation) -> Result<u64> {
        let result = self.drive(cancel);
        self.state = LoopState::Stopped;
        log::debug!("Capture loop {:?}", self.state());
        let frames = self.frames;
        self.shutdown();
        log::info!("Stopped after {} frames", frames);
        result.map(|()| frames)
    }

    fn drive(&mut self, cancel: &Cancellation) -> Result<()> {
        while self.state == LoopState::Running {
            if cancel.is_cancelled() {
                self.state = LoopState::Cancelling;
                log::info!("Interrupt received, stopping");
                break;
            }
            self.step()?;
        }
        Ok(())
    }

    /// One full frame. The read is the only blocking call.
    fn step(&mut self) -> Result<()> {
        self.source
            .read(&mut self.samples)
            .context("Failed to read audio frame")?;
        self.window.apply(&self.samples, &mut self.windowed);
        let bins = self.transform.execute(&self.windowed);

        let (cols, rows) = self.surface.size().context("Failed to query terminal size")?;
        self.aggregator.aggregate_into(bins, cols, rows, &mut self.bars);
        self.renderer
            .render(&mut self.surface, &self.bars, rows)
            .context("Failed to draw frame")?;
        self.frames += 1;
        Ok(())
    }

    fn shutdown(self) {
        let Self {
            window,
            transform,
            samples,
            windowed,
            bars,
            source,
            surface,
            ..
        } = self;
        drop(transform);
        drop((window, samples, windowed, bars));
        drop(source);
        drop(surface);
    }
}
