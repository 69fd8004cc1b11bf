//! Speech recognition capability providers

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{AudioCapture, SAMPLE_RATE, SpeechToText, UtteranceDetector, UtteranceState, samples_to_wav};
use crate::{Error, Result};

/// How often the capture thread drains the microphone buffer
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Cooperative stop request shared between a capture session and its owner
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopSignal {
    /// Create an untriggered signal
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the session to stop
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Whether a stop was requested
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolve once a stop is requested
    pub async fn triggered(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}

/// Platform speech recognition
///
/// One call to `listen` is one single-shot recognition: it returns the
/// recognized utterance, or `None` when nothing usable was heard or the
/// session was stopped.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Capture and recognize one utterance
    ///
    /// # Errors
    ///
    /// Returns error if the recognition engine fails
    async fn listen(&self, stop: StopSignal) -> Result<Option<String>>;
}

/// Recognizer backed by the default microphone and a remote STT service
pub struct MicrophoneRecognizer {
    stt: SpeechToText,
    no_speech_timeout: Duration,
    max_utterance: Duration,
}

impl MicrophoneRecognizer {
    /// Create a microphone recognizer transcribing through `stt`
    #[must_use]
    pub const fn new(stt: SpeechToText, no_speech_timeout: Duration) -> Self {
        Self {
            stt,
            no_speech_timeout,
            max_utterance: Duration::from_secs(30),
        }
    }

    /// Whether the host has an input device to record from
    #[must_use]
    pub fn is_supported() -> bool {
        AudioCapture::input_available()
    }
}

#[async_trait]
impl SpeechRecognizer for MicrophoneRecognizer {
    async fn listen(&self, stop: StopSignal) -> Result<Option<String>> {
        let no_speech = self.no_speech_timeout;
        let max_len = self.max_utterance;
        let thread_stop = stop.clone();

        // cpal streams are not Send; keep the device on a blocking thread
        let samples = tokio::task::spawn_blocking(move || {
            record_utterance(&thread_stop, no_speech, max_len)
        })
        .await
        .map_err(|e| Error::Voice(format!("capture thread failed: {e}")))??;

        let Some(samples) = samples else {
            return Ok(None);
        };
        if stop.is_triggered() {
            return Ok(None);
        }

        let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
        let text = self.stt.transcribe(&wav).await?;
        Ok(Some(text).filter(|t| !t.is_empty()))
    }
}

/// Record from the microphone until one utterance completes
fn record_utterance(
    stop: &StopSignal,
    no_speech_timeout: Duration,
    max_utterance: Duration,
) -> Result<Option<Vec<f32>>> {
    let mut capture = AudioCapture::new()?;
    let mut detector = UtteranceDetector::new(no_speech_timeout, max_utterance);
    capture.start()?;

    loop {
        if stop.is_triggered() {
            tracing::debug!("capture stopped by caller");
            return Ok(None);
        }

        std::thread::sleep(POLL_INTERVAL);
        match detector.push(&capture.take_buffer()) {
            UtteranceState::Complete => return Ok(Some(detector.take_utterance())),
            UtteranceState::NoSpeech => return Ok(None),
            UtteranceState::Waiting | UtteranceState::Speaking => {}
        }
    }
}
