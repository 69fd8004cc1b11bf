//! Single-utterance endpointing
//!
//! Energy-based detection of where a spoken utterance starts and ends in
//! a 16kHz mono stream.

use std::time::Duration;

use super::SAMPLE_RATE;

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech for a complete utterance (0.3 s)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Trailing silence that ends an utterance (0.5 s)
const SILENCE_SAMPLES: usize = 8000;

/// Where the detector is within the utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceState {
    /// No speech heard yet
    Waiting,
    /// Speech in progress, accumulating
    Speaking,
    /// Speech followed by enough silence (or the length cap was hit)
    Complete,
    /// Nothing was said before the no-speech timeout
    NoSpeech,
}

/// Detects a single utterance in streamed samples
pub struct UtteranceDetector {
    state: UtteranceState,
    buffer: Vec<f32>,
    silence: usize,
    waited: usize,
    no_speech_limit: usize,
    max_samples: usize,
}

impl UtteranceDetector {
    /// Create a detector giving up after `no_speech_timeout` of silence and
    /// cutting utterances at `max_length`
    #[must_use]
    pub fn new(no_speech_timeout: Duration, max_length: Duration) -> Self {
        Self {
            state: UtteranceState::Waiting,
            buffer: Vec::new(),
            silence: 0,
            waited: 0,
            no_speech_limit: duration_to_samples(no_speech_timeout),
            max_samples: duration_to_samples(max_length),
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> UtteranceState {
        self.state
    }

    /// Whether the detector has reached a terminal state
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self.state, UtteranceState::Complete | UtteranceState::NoSpeech)
    }

    /// Feed captured samples and return the updated state
    pub fn push(&mut self, samples: &[f32]) -> UtteranceState {
        if samples.is_empty() || self.is_finished() {
            return self.state;
        }

        let energy = calculate_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            UtteranceState::Waiting => {
                if is_speech {
                    self.state = UtteranceState::Speaking;
                    self.buffer.extend_from_slice(samples);
                    self.silence = 0;
                    tracing::trace!(energy, "speech started");
                } else {
                    self.waited += samples.len();
                    if self.waited >= self.no_speech_limit {
                        tracing::debug!("no speech before timeout");
                        self.state = UtteranceState::NoSpeech;
                    }
                }
            }
            UtteranceState::Speaking => {
                self.buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence = 0;
                } else {
                    self.silence += samples.len();
                }

                if self.silence > SILENCE_SAMPLES {
                    if self.buffer.len() - self.silence > MIN_SPEECH_SAMPLES {
                        tracing::debug!(samples = self.buffer.len(), "utterance complete");
                        self.state = UtteranceState::Complete;
                    } else {
                        // A click or cough, not speech: keep waiting
                        tracing::trace!("speech too short, discarding");
                        self.waited += self.buffer.len();
                        self.buffer.clear();
                        self.silence = 0;
                        self.state = if self.waited >= self.no_speech_limit {
                            UtteranceState::NoSpeech
                        } else {
                            UtteranceState::Waiting
                        };
                    }
                } else if self.buffer.len() >= self.max_samples {
                    tracing::debug!(samples = self.buffer.len(), "utterance hit length cap");
                    self.state = UtteranceState::Complete;
                }
            }
            UtteranceState::Complete | UtteranceState::NoSpeech => {}
        }

        self.state
    }

    /// Take the accumulated utterance samples
    pub fn take_utterance(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.buffer)
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn duration_to_samples(duration: Duration) -> usize {
    (duration.as_secs_f64() * f64::from(SAMPLE_RATE)) as usize
}

/// Root-mean-square energy of audio samples
#[allow(clippy::cast_precision_loss)]
fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}
