//! Audio playback of synthesized clips

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// A clip opened for playback
///
/// Playing resumes from where the clip was paused; a clip that ran to the
/// end starts over.
pub trait Playback {
    /// Start or resume playback without blocking
    ///
    /// # Errors
    ///
    /// Returns error if the output device cannot be driven
    fn play(&mut self) -> Result<()>;

    /// Pause, keeping the current position
    fn pause(&mut self);

    /// Stop and rewind
    fn stop(&mut self);

    /// Whether audio is currently being played
    fn is_playing(&self) -> bool;
}

/// Opens audio handles for playback
pub trait AudioOutput {
    /// Open the clip behind `handle`
    ///
    /// # Errors
    ///
    /// Returns error if the clip cannot be read or decoded
    fn open(&self, handle: &str) -> Result<Box<dyn Playback>>;
}

/// Plays MP3 clips on the default output device
#[derive(Debug, Default, Clone, Copy)]
pub struct SpeakerOutput;

impl SpeakerOutput {
    /// Create a speaker output
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Whether the host has an output device
    #[must_use]
    pub fn is_supported() -> bool {
        cpal::default_host().default_output_device().is_some()
    }
}

impl AudioOutput for SpeakerOutput {
    fn open(&self, handle: &str) -> Result<Box<dyn Playback>> {
        let data = std::fs::read(handle)?;
        let (samples, sample_rate) = decode_mp3(&data)?;
        tracing::debug!(handle, samples = samples.len(), sample_rate, "opened clip");

        Ok(Box::new(SpeakerPlayback {
            samples: Arc::new(samples),
            sample_rate,
            position: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(AtomicBool::new(false)),
            stream: None,
            paused: false,
        }))
    }
}

/// Clip playing through a cpal output stream
struct SpeakerPlayback {
    samples: Arc<Vec<f32>>,
    sample_rate: u32,
    position: Arc<AtomicUsize>,
    finished: Arc<AtomicBool>,
    stream: Option<Stream>,
    paused: bool,
}

impl SpeakerPlayback {
    fn build_stream(&self) -> Result<Stream> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let config = output_config(&device, self.sample_rate)?;
        let channels = usize::from(config.channels);

        let samples = Arc::clone(&self.samples);
        let position = Arc::clone(&self.position);
        let finished = Arc::clone(&self.finished);

        device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let pos = position.load(Ordering::Relaxed);
                        let sample = if let Some(&s) = samples.get(pos) {
                            position.store(pos + 1, Ordering::Relaxed);
                            s
                        } else {
                            finished.store(true, Ordering::Relaxed);
                            0.0
                        };
                        frame.fill(sample);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))
    }
}

impl Playback for SpeakerPlayback {
    fn play(&mut self) -> Result<()> {
        if self.finished.swap(false, Ordering::Relaxed) {
            self.position.store(0, Ordering::Relaxed);
        }

        if self.stream.is_none() {
            self.stream = Some(self.build_stream()?);
        }
        if let Some(stream) = &self.stream {
            stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        }

        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        let failed = self
            .stream
            .as_ref()
            .is_some_and(|stream| stream.pause().is_err());
        if failed {
            // Some backends cannot pause; dropping the stream keeps the position
            tracing::warn!("failed to pause stream, dropping it");
            self.stream = None;
        }
        self.paused = true;
    }

    fn stop(&mut self) {
        self.stream = None;
        self.paused = false;
        self.position.store(0, Ordering::Relaxed);
        self.finished.store(false, Ordering::Relaxed);
    }

    fn is_playing(&self) -> bool {
        self.stream.is_some() && !self.paused && !self.finished.load(Ordering::Relaxed)
    }
}

/// Pick an output config at `sample_rate`, preferring mono
fn output_config(device: &cpal::Device, sample_rate: u32) -> Result<StreamConfig> {
    let rate = SampleRate(sample_rate);
    let supports = |c: &cpal::SupportedStreamConfigRange, channels: u16| {
        c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
    };

    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| supports(c, 1))
        .or_else(|| device.supported_output_configs().ok()?.find(|c| supports(c, 2)))
        .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

    Ok(supported.with_sample_rate(rate).config())
}

/// Decode MP3 bytes to mono f32 samples and the stream's sample rate
///
/// # Errors
///
/// Returns error if the data is not decodable MP3
pub fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                #[allow(clippy::cast_sign_loss)]
                sample_rate.get_or_insert(frame.sample_rate as u32);

                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    let sample_rate =
        sample_rate.ok_or_else(|| Error::Audio("MP3 contains no audio frames".to_string()))?;
    Ok((samples, sample_rate))
}

/// Output that tracks playback state without producing sound
///
/// Used on hosts without an output device so audio toggles still behave.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentOutput;

impl AudioOutput for SilentOutput {
    fn open(&self, handle: &str) -> Result<Box<dyn Playback>> {
        if !std::path::Path::new(handle).exists() {
            return Err(Error::NotFound(format!("audio clip {handle}")));
        }
        Ok(Box::new(SilentPlayback { playing: false }))
    }
}

struct SilentPlayback {
    playing: bool,
}

impl Playback for SilentPlayback {
    fn play(&mut self) -> Result<()> {
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn stop(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}
