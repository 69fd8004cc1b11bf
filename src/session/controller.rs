//! Conversation session controller
//!
//! Runs one user turn end to end: optimistic append, agent dispatch,
//! optional speech synthesis and playback, then the assistant reply. Also
//! owns the voice mode state machine and the exclusive audio playback
//! policy.
//!
//! The controller is single-threaded. Its methods take `&self` so a UI
//! loop can have several operations outstanding at once (a typed submit
//! racing a voice turn, say); the in-flight guard serializes turns.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use super::{Message, PlaybackSlot, Transcript, TurnId};
use crate::agent::{AgentClient, AgentRequest};
use crate::store::TranscriptStore;
use crate::voice::{AudioOutput, DEFAULT_VOICE, SilentOutput, SpeechListener, VoiceGenerator};

/// How user input reaches the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Typed turns, replies shown as text
    #[default]
    Text,
    /// Spoken turns, replies spoken aloud
    Voice,
}

/// Transient voice session state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VoiceSessionState {
    /// A capture session is running
    pub is_recording: bool,
    /// Current input mode
    pub mode: InputMode,
    /// Text of the utterance being submitted, cleared when the turn ends
    pub last_transcript: String,
}

impl VoiceSessionState {
    /// Whether voice mode is active
    #[must_use]
    pub fn is_voice_mode_active(&self) -> bool {
        self.mode == InputMode::Voice
    }
}

/// Event reported by a capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    /// An utterance was recognized
    Transcript(String),
    /// The capture session ended
    CaptureEnded,
}

/// Why a submission was not started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Text was empty or whitespace
    EmptyText,
    /// Another turn is in flight
    InFlight,
}

/// Result of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Nothing happened
    Rejected(RejectReason),
    /// The agent round trip failed and the user message was removed
    RolledBack(String),
    /// The reply was appended, with audio when `audio` is true
    Completed { audio: bool },
}

/// Result of toggling a message's audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// The message's audio is now playing
    Playing,
    /// The message's audio is now paused
    Paused,
    /// The message has no playable audio
    Unavailable,
}

/// Builder for [`ConversationSession`]
pub struct SessionBuilder {
    agent: Arc<dyn AgentClient>,
    store: TranscriptStore,
    voice: Option<VoiceGenerator>,
    listener: SpeechListener,
    output: Box<dyn AudioOutput>,
    voice_id: String,
    user_id: String,
}

impl SessionBuilder {
    /// Synthesize replies in voice mode with `generator`
    #[must_use]
    pub fn voice(mut self, generator: VoiceGenerator) -> Self {
        self.voice = Some(generator);
        self
    }

    /// Capture speech with `listener`
    #[must_use]
    pub fn listener(mut self, listener: SpeechListener) -> Self {
        self.listener = listener;
        self
    }

    /// Play audio through `output`
    #[must_use]
    pub fn output(mut self, output: Box<dyn AudioOutput>) -> Self {
        self.output = output;
        self
    }

    /// TTS voice replies are spoken with
    #[must_use]
    pub fn voice_id(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }

    /// Identity voice turns are submitted as
    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Build the session, reloading the persisted transcript
    #[must_use]
    pub fn build(self) -> ConversationSession {
        let history = self.store.load();
        tracing::debug!(messages = history.len(), "restored chat history");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        ConversationSession {
            agent: self.agent,
            store: self.store,
            voice: self.voice,
            listener: RefCell::new(self.listener),
            output: self.output,
            voice_id: self.voice_id,
            user_id: RefCell::new(self.user_id),
            transcript: RefCell::new(Transcript::with_history(history)),
            state: RefCell::new(VoiceSessionState::default()),
            input: RefCell::new(String::new()),
            in_flight: Cell::new(false),
            slot: RefCell::new(PlaybackSlot::new()),
            events_tx,
            events_rx: Mutex::new(events_rx),
        }
    }
}

/// Owns the transcript and coordinates voice turns
pub struct ConversationSession {
    agent: Arc<dyn AgentClient>,
    store: TranscriptStore,
    voice: Option<VoiceGenerator>,
    listener: RefCell<SpeechListener>,
    output: Box<dyn AudioOutput>,
    voice_id: String,
    user_id: RefCell<String>,
    transcript: RefCell<Transcript>,
    state: RefCell<VoiceSessionState>,
    input: RefCell<String>,
    in_flight: Cell<bool>,
    slot: RefCell<PlaybackSlot>,
    events_tx: mpsc::UnboundedSender<VoiceEvent>,
    events_rx: Mutex<mpsc::UnboundedReceiver<VoiceEvent>>,
}

impl ConversationSession {
    /// Start building a session dispatching to `agent` and persisting to `store`
    #[must_use]
    pub fn builder(agent: Arc<dyn AgentClient>, store: TranscriptStore) -> SessionBuilder {
        SessionBuilder {
            agent,
            store,
            voice: None,
            listener: SpeechListener::unavailable(),
            output: Box::new(SilentOutput),
            voice_id: DEFAULT_VOICE.to_string(),
            user_id: String::new(),
        }
    }

    /// Snapshot of the transcript, pending messages included
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.transcript.borrow().messages().to_vec()
    }

    /// Snapshot of the voice session state
    #[must_use]
    pub fn state(&self) -> VoiceSessionState {
        self.state.borrow().clone()
    }

    /// Whether a turn is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.get()
    }

    /// Draft text input
    #[must_use]
    pub fn input(&self) -> String {
        self.input.borrow().clone()
    }

    /// Replace the draft text input
    pub fn set_input(&self, text: impl Into<String>) {
        *self.input.borrow_mut() = text.into();
    }

    /// Identity voice turns are submitted as
    #[must_use]
    pub fn user_id(&self) -> String {
        self.user_id.borrow().clone()
    }

    /// Change the identity voice turns are submitted as
    pub fn set_user_id(&self, user_id: impl Into<String>) {
        *self.user_id.borrow_mut() = user_id.into();
    }

    /// Index of the message whose audio is playing
    #[must_use]
    pub fn playing_index(&self) -> Option<usize> {
        let slot = self.slot.borrow();
        slot.occupant().filter(|&index| slot.is_playing(index))
    }

    /// Run one turn
    ///
    /// Blank text and submissions while another turn is in flight are
    /// rejected. A failed agent round trip removes the optimistic user
    /// message again; a failed synthesis only drops the audio. Dropping
    /// the returned future mid-turn rolls the turn back.
    pub async fn submit(&self, text: &str, user_id: &str, force_voice_mode: bool) -> TurnOutcome {
        if text.trim().is_empty() {
            return TurnOutcome::Rejected(RejectReason::EmptyText);
        }
        if self.in_flight.replace(true) {
            tracing::debug!("turn already in flight, ignoring submit");
            return TurnOutcome::Rejected(RejectReason::InFlight);
        }
        let _flight = FlightGuard {
            in_flight: &self.in_flight,
            state: &self.state,
        };

        self.input.borrow_mut().clear();
        let turn = self.transcript.borrow_mut().begin_turn(Message::user(text));
        let pending = PendingTurn {
            transcript: &self.transcript,
            turn,
            settled: false,
        };

        let voice_mode = force_voice_mode || self.state.borrow().is_voice_mode_active();
        tracing::debug!(forced = force_voice_mode, voice_mode, "dispatching turn");

        let request = AgentRequest {
            text: text.to_string(),
            user_id: user_id.to_string(),
            voice_mode,
        };
        let reply = match self.agent.send_message(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "turn failed, rolling back");
                pending.rollback();
                return TurnOutcome::RolledBack(e.to_string());
            }
        };

        pending.commit();
        self.persist();

        let audio = if voice_mode { self.speak(&reply).await } else { None };
        let has_audio = audio.is_some();
        self.transcript
            .borrow_mut()
            .push(Message::assistant(reply, audio));
        self.persist();

        tracing::info!(voice_mode, audio = has_audio, "turn complete");
        TurnOutcome::Completed { audio: has_audio }
    }

    /// Synthesize and play a reply, returning its audio handle
    async fn speak(&self, text: &str) -> Option<String> {
        let Some(generator) = &self.voice else {
            tracing::debug!("no synthesizer configured, replying with text only");
            return None;
        };

        let handle = generator.generate_voice(text, &self.voice_id).await?;

        // The reply is appended right after this, at the current end
        let index = self.transcript.borrow().len();
        match self.output.open(&handle) {
            Ok(playback) => {
                let mut slot = self.slot.borrow_mut();
                if let Err(e) = slot.acquire(index, playback).play() {
                    tracing::warn!(error = %e, "audio playback failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to open generated audio"),
        }

        Some(handle)
    }

    /// Switch between text and voice mode
    ///
    /// Entering voice mode clears the draft input, commits the mode, and
    /// then starts a capture whose utterance is submitted as a voice turn.
    /// Leaving it stops any capture and clears recording state.
    pub fn toggle_voice_mode(&self) -> InputMode {
        let mode = self.state.borrow().mode;
        match mode {
            InputMode::Text => {
                self.input.borrow_mut().clear();
                self.state.borrow_mut().mode = InputMode::Voice;
                tracing::info!("entered voice mode");
                self.start_capture();
                InputMode::Voice
            }
            InputMode::Voice => {
                self.exit_voice_mode();
                InputMode::Text
            }
        }
    }

    /// Leave voice mode
    pub fn exit_voice_mode(&self) {
        self.listener.borrow_mut().stop_listening();
        let mut state = self.state.borrow_mut();
        state.mode = InputMode::Text;
        state.is_recording = false;
        state.last_transcript.clear();
        tracing::info!("left voice mode");
    }

    /// Start or stop a single capture regardless of mode
    ///
    /// Returns whether a capture is running afterwards.
    pub fn toggle_recording(&self) -> bool {
        if self.state.borrow().is_recording {
            self.listener.borrow_mut().stop_listening();
            self.state.borrow_mut().is_recording = false;
            false
        } else {
            self.start_capture()
        }
    }

    fn start_capture(&self) -> bool {
        let result_tx = self.events_tx.clone();
        let end_tx = self.events_tx.clone();

        let started = self.listener.borrow_mut().start_listening(
            move |text| {
                let _ = result_tx.send(VoiceEvent::Transcript(text));
            },
            move || {
                let _ = end_tx.send(VoiceEvent::CaptureEnded);
            },
        );

        if started {
            self.state.borrow_mut().is_recording = true;
        }
        started
    }

    /// Wait for the next capture event
    pub async fn next_voice_event(&self) -> Option<VoiceEvent> {
        self.events_rx.lock().await.recv().await
    }

    /// Apply a capture event, submitting recognized speech as a voice turn
    pub async fn handle_voice_event(&self, event: VoiceEvent) -> Option<TurnOutcome> {
        match event {
            VoiceEvent::Transcript(text) => {
                self.state.borrow_mut().last_transcript.clone_from(&text);
                let user_id = self.user_id();
                Some(self.submit(&text, &user_id, true).await)
            }
            VoiceEvent::CaptureEnded => {
                // A newer capture may already be running
                let listening = self.listener.borrow().is_listening();
                self.state.borrow_mut().is_recording = listening;
                None
            }
        }
    }

    /// Process capture events until the current capture ends
    ///
    /// Returns the outcome of the voice turn, if speech was recognized.
    pub async fn run_capture(&self) -> Option<TurnOutcome> {
        let mut outcome = None;
        while let Some(event) = self.next_voice_event().await {
            let ended = event == VoiceEvent::CaptureEnded;
            if let Some(result) = self.handle_voice_event(event).await {
                outcome = Some(result);
            }
            if ended {
                break;
            }
        }
        outcome
    }

    /// Play or pause the audio attached to message `index`
    ///
    /// Only one message plays at a time: switching to another message
    /// stops the previous one first.
    pub fn toggle_audio_playback(&self, index: usize) -> PlaybackStatus {
        let handle = self
            .transcript
            .borrow()
            .get(index)
            .and_then(|m| m.audio.clone());
        let Some(handle) = handle else {
            return PlaybackStatus::Unavailable;
        };

        let mut slot = self.slot.borrow_mut();
        if let Some(playback) = slot.get_mut(index) {
            if playback.is_playing() {
                playback.pause();
                return PlaybackStatus::Paused;
            }
            return match playback.play() {
                Ok(()) => PlaybackStatus::Playing,
                Err(e) => {
                    tracing::warn!(index, error = %e, "failed to resume audio");
                    PlaybackStatus::Paused
                }
            };
        }

        let playback = match self.output.open(&handle) {
            Ok(playback) => playback,
            Err(e) => {
                tracing::warn!(index, error = %e, "failed to open message audio");
                return PlaybackStatus::Unavailable;
            }
        };

        match slot.acquire(index, playback).play() {
            Ok(()) => PlaybackStatus::Playing,
            Err(e) => {
                tracing::warn!(index, error = %e, "failed to play message audio");
                slot.release();
                PlaybackStatus::Unavailable
            }
        }
    }

    /// Drop all history, in memory and on disk, and purge cached voice clips
    ///
    /// Refused (returns false) while a turn is in flight.
    pub fn clear_history(&self) -> bool {
        if self.in_flight.get() {
            return false;
        }

        self.slot.borrow_mut().release();
        self.transcript.borrow_mut().clear();
        self.store.clear();
        let clips = self.voice.as_ref().map_or(0, VoiceGenerator::purge_cache);
        tracing::info!(clips, "chat history cleared");
        true
    }

    fn persist(&self) {
        let committed = self.transcript.borrow().committed();
        self.store.save(&committed);
    }
}

/// Clears the in-flight guard and transcription text when a turn ends
struct FlightGuard<'a> {
    in_flight: &'a Cell<bool>,
    state: &'a RefCell<VoiceSessionState>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.set(false);
        self.state.borrow_mut().last_transcript.clear();
    }
}

/// Optimistic user message, rolled back unless committed
struct PendingTurn<'a> {
    transcript: &'a RefCell<Transcript>,
    turn: TurnId,
    settled: bool,
}

impl PendingTurn<'_> {
    fn commit(mut self) {
        self.transcript.borrow_mut().commit(self.turn);
        self.settled = true;
    }

    fn rollback(mut self) {
        self.transcript.borrow_mut().rollback(self.turn);
        self.settled = true;
    }
}

impl Drop for PendingTurn<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.transcript.borrow_mut().rollback(self.turn);
        }
    }
}
