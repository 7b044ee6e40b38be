use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SizedSample, Stream, StreamConfig};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device named {0:?}")]
    DeviceNotFound(String),
    #[error("no default input device")]
    NoDefaultDevice,
    #[error("device {device:?} cannot capture at {sample_rate} Hz")]
    UnsupportedRate { device: String, sample_rate: u32 },
    #[error("unsupported sample format: {0:?}")]
    UnsupportedFormat(SampleFormat),
    #[error("failed to enumerate devices: {0}")]
    Devices(#[from] cpal::DevicesError),
    #[error("failed to query device configs: {0}")]
    Configs(#[from] cpal::SupportedStreamConfigsError),
    #[error("failed to build input stream: {0}")]
    Build(#[from] cpal::BuildStreamError),
    #[error("failed to start input stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
    #[error("input stream failed: {0}")]
    Stream(String),
}

/// Blocking pull of mono samples, paced by the device.
pub trait AudioSource {
    /// Fills `buf` completely, blocking until enough samples have arrived.
    fn read(&mut self, buf: &mut [f32]) -> Result<(), CaptureError>;
}

struct QueueState {
    samples: VecDeque<f32>,
    cap: usize,
    dropped: u64,
    error: Option<String>,
}

/// Drop-oldest mono sample queue shared between the device callback and the
/// reading thread.
pub struct SampleQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl SampleQueue {
    pub fn new(cap_samples: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                samples: VecDeque::with_capacity(cap_samples),
                cap: cap_samples.max(1),
                dropped: 0,
                error: None,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // poisoning is ignored, the queue only holds plain samples
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Downmixes interleaved frames to mono and appends them.
    pub fn push_interleaved<T, F>(&self, data: &[T], channels: usize, convert: F)
    where
        T: Copy,
        F: Fn(T) -> f32,
    {
        let channels = channels.max(1);
        let mut state = self.lock();
        for frame in data.chunks_exact(channels) {
            let sum: f32 = frame.iter().map(|&s| convert(s)).sum();
            if state.samples.len() == state.cap {
                state.samples.pop_front();
                state.dropped += 1;
            }
            state.samples.push_back(sum / channels as f32);
        }
        drop(state);
        self.ready.notify_one();
    }

    /// Records a stream failure; pending and future reads return it.
    pub fn fail(&self, message: String) {
        let mut state = self.lock();
        if state.error.is_none() {
            state.error = Some(message);
        }
        drop(state);
        self.ready.notify_all();
    }

    pub fn dropped_samples(&self) -> u64 {
        self.lock().dropped
    }

    /// Blocks until `out.len()` samples are queued, then moves them into `out`.
    /// There is no timeout: a stalled device stalls the reader.
    pub fn read_exact(&self, out: &mut [f32]) -> Result<(), CaptureError> {
        let mut state = self.lock();
        loop {
            if let Some(message) = &state.error {
                return Err(CaptureError::Stream(message.clone()));
            }
            if state.samples.len() >= out.len() {
                break;
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        let wanted = out.len();
        for (dst, src) in out.iter_mut().zip(state.samples.drain(..wanted)) {
            *dst = src;
        }
        Ok(())
    }
}

/// A running cpal input stream feeding a [`SampleQueue`].
pub struct DeviceSource {
    name: String,
    queue: Arc<SampleQueue>,
    _stream: Stream,
}

impl DeviceSource {
    /// Opens `device` (or the host default) for mono capture at `sample_rate`.
    pub fn open(device: Option<&str>, sample_rate: u32) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = match device {
            Some(wanted) => host
                .input_devices()?
                .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
                .ok_or_else(|| CaptureError::DeviceNotFound(wanted.to_string()))?,
            None => host
                .default_input_device()
                .ok_or(CaptureError::NoDefaultDevice)?,
        };
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let (config, format) = pick_config(&device, &name, sample_rate)?;
        let channels = config.channels as usize;
        log::info!(
            "Audio: {} @ {}Hz, {} channel(s), {:?}",
            name,
            sample_rate,
            channels,
            format
        );

        // two seconds of slack before the oldest samples are dropped
        let queue = Arc::new(SampleQueue::new(sample_rate as usize * 2));
        let stream = match format {
            SampleFormat::F32 => build_stream::<f32, _>(&device, &config, &queue, |s| s)?,
            SampleFormat::I16 => {
                build_stream::<i16, _>(&device, &config, &queue, |s| s as f32 / 32768.0)?
            }
            SampleFormat::U16 => build_stream::<u16, _>(&device, &config, &queue, |s| {
                (s as i32 - 32768) as f32 / 32768.0
            })?,
            other => return Err(CaptureError::UnsupportedFormat(other)),
        };
        stream.play()?;

        Ok(Self {
            name,
            queue,
            _stream: stream,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl AudioSource for DeviceSource {
    fn read(&mut self, buf: &mut [f32]) -> Result<(), CaptureError> {
        self.queue.read_exact(buf)
    }
}

impl Drop for DeviceSource {
    fn drop(&mut self) {
        log::info!(
            "Released audio device {} ({} samples dropped)",
            self.name,
            self.queue.dropped_samples()
        );
    }
}

/// Supported input config covering `sample_rate` with the fewest channels.
fn pick_config(
    device: &Device,
    name: &str,
    sample_rate: u32,
) -> Result<(StreamConfig, SampleFormat), CaptureError> {
    let rate = cpal::SampleRate(sample_rate);
    let best = device
        .supported_input_configs()?
        .filter(|c| c.min_sample_rate() <= rate && rate <= c.max_sample_rate())
        .filter(|c| {
            matches!(
                c.sample_format(),
                SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16
            )
        })
        .min_by_key(|c| (c.channels(), c.sample_format() != SampleFormat::F32))
        .ok_or_else(|| CaptureError::UnsupportedRate {
            device: name.to_string(),
            sample_rate,
        })?;
    let format = best.sample_format();
    Ok((best.with_sample_rate(rate).into(), format))
}

fn build_stream<T, F>(
    device: &Device,
    config: &StreamConfig,
    queue: &Arc<SampleQueue>,
    convert: F,
) -> Result<Stream, CaptureError>
where
    T: SizedSample,
    F: Fn(T) -> f32 + Send + 'static,
{
    let channels = config.channels as usize;
    let data_queue = Arc::clone(queue);
    let error_queue = Arc::clone(queue);
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            data_queue.push_interleaved(data, channels, &convert);
        },
        move |err| report_stream_error(&error_queue, err),
        None,
    )?;
    Ok(stream)
}

/// Only a vanished device ends the capture. Backend hiccups such as an
/// overrun are logged and the stream keeps delivering.
fn report_stream_error(queue: &SampleQueue, err: cpal::StreamError) {
    match err {
        cpal::StreamError::DeviceNotAvailable => {
            log::error!("Audio stream error: {}", err);
            queue.fail(err.to_string());
        }
        other => log::warn!("Audio stream error: {}", other),
    }
}

#[derive(Debug)]
pub struct InputDeviceInfo {
    pub name: String,
    pub is_default: bool,
}

pub fn list_input_devices() -> Result<Vec<InputDeviceInfo>, CaptureError> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    let mut infos = Vec::new();
    for device in host.input_devices()? {
        let name = device.name().unwrap_or_else(|_| "Unknown Device".to_string());
        let is_default = default_name.as_deref() == Some(name.as_str());
        infos.push(InputDeviceInfo { name, is_default });
    }
    Ok(infos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn downmixes_to_mono() {
        let queue = SampleQueue::new(16);
        queue.push_interleaved(&[1.0f32, 0.0, 0.5, 0.5, -1.0, -0.5], 2, |s| s);
        let mut out = [0.0f32; 3];
        queue.read_exact(&mut out).unwrap();
        assert_eq!(out, [0.5, 0.5, -0.75]);
    }

    #[test]
    fn converts_integer_samples() {
        let queue = SampleQueue::new(16);
        queue.push_interleaved(&[16384i16, -32768], 1, |s| s as f32 / 32768.0);
        let mut out = [0.0f32; 2];
        queue.read_exact(&mut out).unwrap();
        assert_eq!(out, [0.5, -1.0]);
    }

    #[test]
    fn drops_oldest_when_full() {
        let queue = SampleQueue::new(3);
        queue.push_interleaved(&[1.0f32, 2.0, 3.0, 4.0], 1, |s| s);
        assert_eq!(queue.dropped_samples(), 1);
        let mut out = [0.0f32; 3];
        queue.read_exact(&mut out).unwrap();
        assert_eq!(out, [2.0, 3.0, 4.0]);
    }

    #[test]
    fn read_leaves_remainder_queued() {
        let queue = SampleQueue::new(8);
        queue.push_interleaved(&[1.0f32, 2.0, 3.0, 4.0, 5.0], 1, |s| s);
        let mut out = [0.0f32; 2];
        queue.read_exact(&mut out).unwrap();
        assert_eq!(out, [1.0, 2.0]);
        queue.read_exact(&mut out).unwrap();
        assert_eq!(out, [3.0, 4.0]);
    }

    #[test]
    fn read_blocks_until_frame_complete() {
        let queue = Arc::new(SampleQueue::new(64));
        let producer = Arc::clone(&queue);
        let handle = thread::spawn(move || {
            for chunk in [[0.25f32; 4], [0.5; 4], [0.75; 4]] {
                thread::sleep(Duration::from_millis(10));
                producer.push_interleaved(&chunk, 1, |s| s);
            }
        });
        let mut out = [0.0f32; 10];
        queue.read_exact(&mut out).unwrap();
        assert_eq!(&out[..4], &[0.25; 4]);
        assert_eq!(&out[8..], &[0.75; 2]);
        handle.join().unwrap();
    }

    #[test]
    fn stream_failure_wakes_reader() {
        let queue = Arc::new(SampleQueue::new(64));
        let producer = Arc::clone(&queue);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            producer.fail("device unplugged".into());
        });
        let mut out = [0.0f32; 10];
        let err = queue.read_exact(&mut out).unwrap_err();
        assert!(matches!(err, CaptureError::Stream(ref m) if m == "device unplugged"));
        handle.join().unwrap();
    }

    #[test]
    fn backend_errors_keep_the_stream_alive() {
        let queue = SampleQueue::new(16);
        let err = cpal::StreamError::BackendSpecific {
            err: cpal::BackendSpecificError { description: "buffer overrun".into() },
        };
        report_stream_error(&queue, err);
        queue.push_interleaved(&[0.5f32, 0.25], 1, |s| s);
        let mut out = [0.0f32; 2];
        queue.read_exact(&mut out).unwrap();
        assert_eq!(out, [0.5, 0.25]);
    }

    #[test]
    fn lost_device_fails_the_queue() {
        let queue = SampleQueue::new(16);
        report_stream_error(&queue, cpal::StreamError::DeviceNotAvailable);
        let mut out = [0.0f32; 2];
        let err = queue.read_exact(&mut out).unwrap_err();
        assert!(matches!(err, CaptureError::Stream(_)));
    }
}
