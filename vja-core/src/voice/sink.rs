//! Audio output sinks.
//!
//! `play` hands a decoded chunk to the output and returns without waiting
//! for playback to finish.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use super::types::AudioChunk;
use crate::config::VoiceConfig;
use crate::error::VoiceError;

/// Destination for decoded speech.
pub trait AudioSink: Send + Sync {
    /// Start playing `chunk`. Must not block until playback completes.
    fn play(&self, chunk: AudioChunk) -> Result<(), VoiceError>;

    /// Sink name for logging.
    fn name(&self) -> &str;
}

/// Discards audio. Used when speech output is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn play(&self, chunk: AudioChunk) -> Result<(), VoiceError> {
        debug!(
            samples = chunk.samples.len(),
            duration_secs = chunk.duration_secs(),
            "Audio output disabled; dropping chunk"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

/// Records every chunk it is given.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    chunks: Arc<Mutex<Vec<AudioChunk>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunks played so far, in order.
    pub fn chunks(&self) -> Vec<AudioChunk> {
        self.chunks
            .lock()
            .map(|chunks| chunks.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl AudioSink for MemorySink {
    fn play(&self, chunk: AudioChunk) -> Result<(), VoiceError> {
        let mut chunks = self
            .chunks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        chunks.push(chunk);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Writes each chunk to a 16-bit PCM WAV file.
///
/// A single path is overwritten by every utterance.
#[derive(Debug, Clone)]
pub struct WavFileSink {
    path: PathBuf,
}

impl WavFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AudioSink for WavFileSink {
    fn play(&self, chunk: AudioChunk) -> Result<(), VoiceError> {
        write_wav(&self.path, &chunk)?;
        info!(
            path = %self.path.display(),
            duration_secs = chunk.duration_secs(),
            "Wrote speech to WAV file"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "wav"
    }
}

/// The sink for live speech output under `config`.
///
/// Falls back to [`NullSink`] when output is disabled or the crate was built
/// without the `voice` feature.
pub fn output_sink(config: &VoiceConfig) -> Arc<dyn AudioSink> {
    if !config.enabled {
        return Arc::new(NullSink);
    }

    #[cfg(feature = "voice")]
    {
        Arc::new(CpalSink::new(config.output_device.clone()))
    }

    #[cfg(not(feature = "voice"))]
    {
        debug!("Built without the `voice` feature; speech audio will be discarded");
        Arc::new(NullSink)
    }
}

/// Encode `chunk` as 16-bit PCM WAV at `path`.
pub fn write_wav(path: &Path, chunk: &AudioChunk) -> Result<(), VoiceError> {
    let spec = hound::WavSpec {
        channels: chunk.channels,
        sample_rate: chunk.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let wav_error = |e: hound::Error| VoiceError::UnsupportedFormat {
        format: format!("WAV write error: {}", e),
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(wav_error)?;
    for &sample in &chunk.samples {
        let value = (sample.clamp(-1.0, 1.0) * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32);
        writer.write_sample(value as i16).map_err(wav_error)?;
    }
    writer.finalize().map_err(wav_error)
}

#[cfg(feature = "voice")]
pub use self::cpal_sink::CpalSink;

#[cfg(feature = "voice")]
mod cpal_sink {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex, mpsc};
    use std::time::Duration;

    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{Device, SampleRate, StreamConfig};
    use tracing::{debug, warn};

    use super::AudioSink;
    use crate::error::VoiceError;
    use crate::voice::convert::{downmix, resample};
    use crate::voice::types::AudioChunk;

    /// Plays chunks on a system output device.
    ///
    /// Each chunk gets its own output stream, owned by a dedicated thread that
    /// drops it once the samples have drained. Overlapping chunks play
    /// concurrently.
    #[derive(Debug, Clone, Default)]
    pub struct CpalSink {
        device_name: Option<String>,
    }

    impl CpalSink {
        /// `device_name` of `None` selects the host's default output device.
        pub fn new(device_name: Option<String>) -> Self {
            Self { device_name }
        }
    }

    impl AudioSink for CpalSink {
        fn play(&self, chunk: AudioChunk) -> Result<(), VoiceError> {
            if chunk.is_empty() {
                return Ok(());
            }

            let (ready_tx, ready_rx) = mpsc::sync_channel(1);
            let device_name = self.device_name.clone();

            std::thread::Builder::new()
                .name("vja-playback".into())
                .spawn(move || play_blocking(device_name, chunk, ready_tx))
                .map_err(|e| VoiceError::PlaybackFailed {
                    message: format!("failed to spawn playback thread: {}", e),
                })?;

            // Wait only for the stream to start, not for it to finish.
            ready_rx.recv().unwrap_or_else(|_| {
                Err(VoiceError::PlaybackFailed {
                    message: "playback thread exited before starting".into(),
                })
            })
        }

        fn name(&self) -> &str {
            "cpal"
        }
    }

    fn output_device(name: Option<&str>) -> Result<Device, VoiceError> {
        let host = cpal::default_host();
        match name {
            None => host.default_output_device().ok_or(VoiceError::NoOutputDevice),
            Some(name) => host
                .output_devices()
                .map_err(|e| VoiceError::PlaybackFailed {
                    message: e.to_string(),
                })?
                .find(|device| device.name().is_ok_and(|n| n == name))
                .ok_or(VoiceError::NoOutputDevice),
        }
    }

    /// Runs on the playback thread; owns the stream until drained.
    fn play_blocking(
        device_name: Option<String>,
        chunk: AudioChunk,
        ready: mpsc::SyncSender<Result<(), VoiceError>>,
    ) {
        let started = start_stream(device_name.as_deref(), &chunk);
        let (stream, drained, duration) = match started {
            Ok(parts) => parts,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        let _ = ready.send(Ok(()));

        // Poll until the callback has consumed every sample, bounded by the
        // nominal duration plus a margin for device latency.
        let deadline = std::time::Instant::now() + duration + Duration::from_millis(500);
        while !drained.load(Ordering::Acquire) && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        drop(stream);
        debug!("Playback stream closed");
    }

    fn start_stream(
        device_name: Option<&str>,
        chunk: &AudioChunk,
    ) -> Result<(cpal::Stream, Arc<AtomicBool>, Duration), VoiceError> {
        let device = output_device(device_name)?;
        let default = device
            .default_output_config()
            .map_err(|e| VoiceError::PlaybackFailed {
                message: e.to_string(),
            })?;

        let out_rate = default.sample_rate().0;
        let out_channels = default.channels();
        let frames = fit_to_device(chunk, out_rate, out_channels);
        let duration = Duration::from_secs_f32(
            frames.len() as f32 / (out_rate.max(1) as f32 * out_channels.max(1) as f32),
        );

        let config = StreamConfig {
            channels: out_channels,
            sample_rate: SampleRate(out_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let queue = Arc::new(Mutex::new(VecDeque::from(frames)));
        let drained = Arc::new(AtomicBool::new(false));
        let drained_cb = Arc::clone(&drained);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut queue) = queue.lock() else {
                        data.fill(0.0);
                        return;
                    };
                    for slot in data.iter_mut() {
                        *slot = queue.pop_front().unwrap_or(0.0);
                    }
                    if queue.is_empty() {
                        drained_cb.store(true, Ordering::Release);
                    }
                },
                |e| warn!(error = %e, "Audio output stream error"),
                None,
            )
            .map_err(|e| VoiceError::PlaybackFailed {
                message: e.to_string(),
            })?;

        stream.play().map_err(|e| VoiceError::PlaybackFailed {
            message: e.to_string(),
        })?;

        Ok((stream, drained, duration))
    }

    /// Resample and interleave a mono or multi-channel chunk for the device.
    fn fit_to_device(chunk: &AudioChunk, out_rate: u32, out_channels: u16) -> Vec<f32> {
        let mono = downmix(&chunk.samples, chunk.channels);
        let resampled = resample(&mono, chunk.sample_rate, out_rate);
        resampled
            .iter()
            .flat_map(|&s| std::iter::repeat_n(s, out_channels as usize))
            .collect()
    }
}
