//! Voice processing module
//!
//! Speech capture (microphone, utterance endpointing, STT), speech
//! synthesis (TTS, audio cache, voice catalog) and playback.

mod capture;
mod catalog;
mod listener;
mod playback;
mod recognizer;
mod stt;
mod synthesis;
mod tts;
mod utterance;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use catalog::{Gender, Voice, fetch_voices};
pub use listener::{Recognizer, SpeechListener};
pub use playback::{AudioOutput, Playback, SilentOutput, SpeakerOutput, decode_mp3};
pub use recognizer::{MicrophoneRecognizer, SpeechRecognizer, StopSignal};
pub use stt::{DEFAULT_STT_URL, SpeechToText};
pub use synthesis::{AudioCache, VoiceGenerator};
pub use tts::{DEFAULT_VOICE, SpeechSynthesizer, TextToSpeech, TtsProvider};
pub use utterance::{UtteranceDetector, UtteranceState};
