//! Shared test utilities

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cyrene_voice::agent::{AgentClient, AgentRequest};
use cyrene_voice::store::{MemoryKvStore, TranscriptStore};
use cyrene_voice::voice::{
    AudioCache, AudioOutput, Playback, Recognizer, SpeechListener, SpeechRecognizer,
    SpeechSynthesizer, StopSignal, VoiceGenerator,
};
use cyrene_voice::{Error, Result};

/// In-memory transcript store plus the backend it writes to
pub fn memory_store() -> (Arc<MemoryKvStore>, TranscriptStore) {
    let kv = Arc::new(MemoryKvStore::new());
    let store = TranscriptStore::new(kv.clone());
    (kv, store)
}

/// Mock agent replying from a script and recording every request
pub struct MockAgent {
    replies: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<AgentRequest>>,
    delay: Duration,
}

impl MockAgent {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    /// Queue a successful reply
    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    /// Queue a failed round trip
    pub fn fail(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(Error::Agent(message.to_string())));
        self
    }

    /// Hold each request for `delay` before answering
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentClient for MockAgent {
    async fn send_message(&self, request: &AgentRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Agent("no scripted reply".to_string())))
    }
}

/// Mock synthesizer returning fixed bytes, or failing
pub struct MockSynthesizer {
    audio: Option<Vec<u8>>,
    voices: Mutex<Vec<String>>,
}

impl MockSynthesizer {
    pub fn returning(audio: &[u8]) -> Self {
        Self {
            audio: Some(audio.to_vec()),
            voices: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            audio: None,
            voices: Mutex::new(Vec::new()),
        }
    }

    /// Voices synthesis was requested with
    pub fn voices(&self) -> Vec<String> {
        self.voices.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, _text: &str, voice: &str) -> Result<Vec<u8>> {
        self.voices.lock().unwrap().push(voice.to_string());
        self.audio
            .clone()
            .ok_or_else(|| Error::Tts("synthesis unavailable".to_string()))
    }
}

/// Voice generator over `synthesizer`, caching into a fresh temp dir
pub fn voice_generator(synthesizer: Arc<MockSynthesizer>) -> (VoiceGenerator, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let cache = AudioCache::new(dir.path()).unwrap();
    (VoiceGenerator::new(synthesizer, cache), dir)
}

/// Mock recognizer hearing a fixed utterance
pub struct MockRecognizer {
    utterance: Option<String>,
    delay: Duration,
}

impl MockRecognizer {
    pub fn hearing(text: &str) -> Self {
        Self {
            utterance: Some(text.to_string()),
            delay: Duration::ZERO,
        }
    }

    pub fn silent() -> Self {
        Self {
            utterance: None,
            delay: Duration::ZERO,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl SpeechRecognizer for MockRecognizer {
    async fn listen(&self, stop: StopSignal) -> Result<Option<String>> {
        tokio::select! {
            () = stop.triggered() => Ok(None),
            () = tokio::time::sleep(self.delay) => Ok(self.utterance.clone()),
        }
    }
}

/// Listener over a mock recognizer
pub fn listener(recognizer: MockRecognizer) -> SpeechListener {
    SpeechListener::new(Recognizer::Available(Arc::new(recognizer)))
}

/// Playback event observed by [`MockOutput`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEvent {
    Open(String),
    Play(String),
    Pause(String),
    Stop(String),
}

/// Mock audio output recording every playback call
#[derive(Clone, Default)]
pub struct MockOutput {
    events: Rc<RefCell<Vec<AudioEvent>>>,
}

impl MockOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AudioEvent> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl AudioOutput for MockOutput {
    fn open(&self, handle: &str) -> Result<Box<dyn Playback>> {
        self.events
            .borrow_mut()
            .push(AudioEvent::Open(handle.to_string()));
        Ok(Box::new(MockPlayback {
            handle: handle.to_string(),
            playing: false,
            events: Rc::clone(&self.events),
        }))
    }
}

struct MockPlayback {
    handle: String,
    playing: bool,
    events: Rc<RefCell<Vec<AudioEvent>>>,
}

impl Playback for MockPlayback {
    fn play(&mut self) -> Result<()> {
        self.playing = true;
        self.events
            .borrow_mut()
            .push(AudioEvent::Play(self.handle.clone()));
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
        self.events
            .borrow_mut()
            .push(AudioEvent::Pause(self.handle.clone()));
    }

    fn stop(&mut self) {
        self.playing = false;
        self.events
            .borrow_mut()
            .push(AudioEvent::Stop(self.handle.clone()));
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}
