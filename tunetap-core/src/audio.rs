//! # Audio Capture Module
//!
//! The capture side of the tuner is an external collaborator: anything that
//! can record, pause, and hand out the recorded audio as a 16-bit mono
//! container implements [`CaptureSource`]. The analysis worker owns its
//! source exclusively and never reads a segment while capture is running.
//!
//! With the `microphone` feature, [`MicrophoneSource`] records from the
//! default input device through CPAL (Cross-Platform Audio Library).

use anyhow::Result;
use std::time::Duration;

/// A pausable recorder producing container bytes for the PCM decoder.
pub trait CaptureSource {
    /// Begins recording.
    fn start(&mut self) -> Result<()>;

    /// Duration captured since the last start, resume or segment.
    fn recorded(&mut self) -> Result<Duration>;

    /// Suspends recording so the captured audio can be read.
    fn pause(&mut self) -> Result<()>;

    /// Continues recording after a pause.
    fn resume(&mut self) -> Result<()>;

    /// Captured audio as a 44-byte-header, 16-bit little-endian mono container.
    fn segment(&mut self) -> Result<Vec<u8>>;

    /// Releases the device. Must tolerate being called more than once.
    fn stop(&mut self);
}

#[cfg(feature = "microphone")]
pub use microphone::MicrophoneSource;

#[cfg(feature = "microphone")]
mod microphone {
    use super::CaptureSource;
    use crate::pcm;
    use anyhow::{Result, anyhow};
    use cpal::SupportedStreamConfigRange;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Records mono f32 audio from the default input device.
    ///
    /// Samples accumulate while the stream plays; [`CaptureSource::segment`]
    /// drains them into a WAV container. At most `max_seconds` of audio is
    /// retained, oldest samples first out.
    pub struct MicrophoneSource {
        sample_rate: u32,
        max_samples: usize,
        buffer: Arc<Mutex<Vec<f32>>>,
        stream: Option<cpal::Stream>,
    }

    impl MicrophoneSource {
        pub fn new(sample_rate: u32, max_seconds: u32) -> Self {
            Self {
                sample_rate,
                max_samples: (sample_rate * max_seconds.max(1)) as usize,
                buffer: Arc::new(Mutex::new(Vec::new())),
                stream: None,
            }
        }

        fn stream(&self) -> Result<&cpal::Stream> {
            self.stream
                .as_ref()
                .ok_or_else(|| anyhow!("capture has not been started"))
        }

        fn buffered(&self) -> Result<usize> {
            let buffer = self
                .buffer
                .lock()
                .map_err(|_| anyhow!("capture buffer lock poisoned"))?;
            Ok(buffer.len())
        }
    }

    impl CaptureSource for MicrophoneSource {
        fn start(&mut self) -> Result<()> {
            self.stop();
            let host = cpal::default_host();
            let device = host
                .default_input_device()
                .ok_or_else(|| anyhow!("No input device available"))?;

            log::info!(target: "capture", "Using audio input device: {}", device.name()?);

            let configs = device.supported_input_configs()?.collect::<Vec<_>>();
            let supported_config = find_supported_config(configs, self.sample_rate)
                .ok_or_else(|| {
                    anyhow!("No mono f32 input format supports {} Hz", self.sample_rate)
                })?;
            let config: cpal::StreamConfig = supported_config
                .with_sample_rate(cpal::SampleRate(self.sample_rate))
                .into();

            let buffer = Arc::clone(&self.buffer);
            let max_samples = self.max_samples;
            let err_fn = |err| {
                log::warn!(target: "capture", "An error occurred on the audio stream: {}", err)
            };

            let stream = device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // Drop the frame rather than block the audio callback.
                    if let Ok(mut buffer) = buffer.try_lock() {
                        buffer.extend_from_slice(data);
                        let excess = buffer.len().saturating_sub(max_samples);
                        if excess > 0 {
                            buffer.drain(..excess);
                        }
                    }
                },
                err_fn,
                None,
            )?;
            stream.play()?;
            self.stream = Some(stream);
            log::info!(target: "capture", "Recording at {} Hz", self.sample_rate);
            Ok(())
        }

        fn recorded(&mut self) -> Result<Duration> {
            let samples = self.buffered()?;
            Ok(Duration::from_secs_f64(
                samples as f64 / self.sample_rate as f64,
            ))
        }

        fn pause(&mut self) -> Result<()> {
            self.stream()?.pause()?;
            Ok(())
        }

        fn resume(&mut self) -> Result<()> {
            self.stream()?.play()?;
            Ok(())
        }

        fn segment(&mut self) -> Result<Vec<u8>> {
            let samples = {
                let mut buffer = self
                    .buffer
                    .lock()
                    .map_err(|_| anyhow!("capture buffer lock poisoned"))?;
                std::mem::take(&mut *buffer)
            };
            pcm::encode_wav(&samples, self.sample_rate)
        }

        fn stop(&mut self) {
            if let Some(stream) = self.stream.take() {
                if let Err(e) = stream.pause() {
                    log::warn!(target: "capture", "Error pausing stream: {}", e);
                }
                drop(stream);
                log::info!(target: "capture", "Recording stopped");
            }
            if let Ok(mut buffer) = self.buffer.lock() {
                buffer.clear();
            }
        }
    }

    /// Picks a mono f32 input configuration whose rate range covers `target_rate`.
    fn find_supported_config(
        configs: Vec<SupportedStreamConfigRange>,
        target_rate: u32,
    ) -> Option<SupportedStreamConfigRange> {
        configs.into_iter().find(|c| {
            c.channels() == 1
                && c.sample_format() == cpal::SampleFormat::F32
                && c.min_sample_rate().0 <= target_rate
                && c.max_sample_rate().0 >= target_rate
        })
    }
}
