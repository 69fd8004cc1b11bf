//! Microphone input for the speech listener
//!
//! Frames arrive on cpal's callback thread and are folded down to mono
//! 16kHz samples in a shared buffer that the utterance loop drains.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig, SupportedStreamConfigRange};

use crate::{Error, Result};

/// Rate the listener records and transcribes at
pub const SAMPLE_RATE: u32 = 16000;

type SampleBuffer = Arc<Mutex<Vec<f32>>>;

/// Open microphone stream feeding a sample buffer
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    samples: SampleBuffer,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Bind to the default input device at [`SAMPLE_RATE`]
    ///
    /// Mono configurations are preferred; a multi-channel device is accepted
    /// and downmixed as frames arrive.
    ///
    /// # Errors
    ///
    /// Returns error if there is no input device or none of its
    /// configurations can record at [`SAMPLE_RATE`]
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Audio("no microphone found".to_string()))?;

        let ranges: Vec<_> = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(format!("cannot query microphone: {e}")))?
            .collect();
        let config = pick_config(&ranges)
            .ok_or_else(|| Error::Audio(format!("microphone cannot record at {SAMPLE_RATE}Hz")))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            channels = config.channels,
            "microphone opened"
        );

        Ok(Self {
            device,
            config,
            samples: SampleBuffer::default(),
            stream: None,
        })
    }

    /// Whether the host exposes any input device
    #[must_use]
    pub fn input_available() -> bool {
        cpal::default_host().default_input_device().is_some()
    }

    /// Begin recording; a running stream is left as is
    ///
    /// # Errors
    ///
    /// Returns error if the device refuses the stream
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let samples = Arc::clone(&self.samples);
        let channels = usize::from(self.config.channels);
        let on_frames = move |data: &[f32], _: &cpal::InputCallbackInfo| {
            if let Ok(mut samples) = samples.lock() {
                downmix_into(&mut samples, data, channels);
            }
        };
        let on_error = |e: cpal::StreamError| tracing::error!(error = %e, "microphone stream failed");

        let stream = self
            .device
            .build_input_stream(&self.config, on_frames, on_error, None)
            .map_err(|e| Error::Audio(format!("cannot open microphone stream: {e}")))?;
        stream
            .play()
            .map_err(|e| Error::Audio(format!("cannot start microphone stream: {e}")))?;
        self.stream = Some(stream);

        tracing::debug!("recording");
        Ok(())
    }

    /// Close the stream; buffered samples remain available
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("recording stopped");
        }
    }

    /// Drain the samples recorded since the previous call
    #[must_use]
    pub fn take_buffer(&self) -> Vec<f32> {
        match self.samples.lock() {
            Ok(mut samples) => std::mem::take(&mut *samples),
            Err(_) => Vec::new(),
        }
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Stream config at [`SAMPLE_RATE`], fewest channels first
fn pick_config(ranges: &[SupportedStreamConfigRange]) -> Option<StreamConfig> {
    let rate = SampleRate(SAMPLE_RATE);
    ranges
        .iter()
        .filter(|r| r.min_sample_rate() <= rate && rate <= r.max_sample_rate())
        .min_by_key(|r| r.channels())
        .map(|r| r.clone().with_sample_rate(rate).config())
}

/// Append interleaved `frames` to `out` as mono, averaging across channels
fn downmix_into(out: &mut Vec<f32>, frames: &[f32], channels: usize) {
    if channels <= 1 {
        out.extend_from_slice(frames);
        return;
    }

    #[allow(clippy::cast_precision_loss)]
    let scale = 1.0 / channels as f32;
    out.extend(
        frames
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}

/// Quantize a float sample in `[-1.0, 1.0]` to signed 16-bit PCM
#[allow(clippy::cast_possible_truncation)]
fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16
}

/// Encode mono samples as a 16-bit PCM WAV file
///
/// # Errors
///
/// Returns error if the WAV writer fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let wav_err = |e: hound::Error| Error::Audio(format!("wav encoding failed: {e}"));

    let len = u32::try_from(samples.len())
        .map_err(|_| Error::Audio("utterance too long to encode".to_string()))?;

    let mut wav = std::io::Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    let mut writer = hound::WavWriter::new(&mut wav, spec).map_err(wav_err)?;
    let mut pcm = writer.get_i16_writer(len);
    for &sample in samples {
        pcm.write_sample(to_pcm16(sample));
    }
    pcm.flush().map_err(wav_err)?;
    writer.finalize().map_err(wav_err)?;

    Ok(wav.into_inner())
}
