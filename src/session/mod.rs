//! Conversation session: transcript, playback slot and turn controller

mod controller;
mod message;
mod playback_slot;
mod transcript;

pub use controller::{
    ConversationSession, InputMode, PlaybackStatus, RejectReason, SessionBuilder, TurnOutcome,
    VoiceEvent, VoiceSessionState,
};
pub use message::Message;
pub use playback_slot::PlaybackSlot;
pub use transcript::{Transcript, TurnId, TurnState};
