//! Cyrene Voice - Voice session client for remotely hosted conversational agents
//!
//! This library provides the pieces of a voice-first chat client:
//! - Conversation session (transcript, single-flight turns, rollback)
//! - Voice processing (speech capture, STT, TTS, playback)
//! - Remote agent access (message endpoint, agent directory)
//! - Local transcript persistence
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  cyrene CLI (REPL)                   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │               ConversationSession                    │
//! │  Transcript  │  Voice mode  │  Playback slot        │
//! └───┬──────────────┬──────────────┬───────────────────┘
//!     │              │              │
//! ┌───▼─────┐  ┌─────▼──────┐  ┌────▼──────────────────┐
//! │  Agent  │  │  Listener  │  │  Synthesis / Output   │
//! │  (HTTP) │  │  (mic+STT) │  │  (TTS, cpal)          │
//! └─────────┘  └────────────┘  └───────────────────────┘
//! ```

pub mod agent;
pub mod config;
pub mod db;
pub mod error;
pub mod session;
pub mod store;
pub mod voice;

pub use agent::{AgentClient, AgentRequest, CannedAgent, HttpAgentClient};
pub use config::Config;
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
pub use session::{ConversationSession, InputMode, Message, PlaybackStatus, TurnOutcome};
pub use store::{KvStore, TranscriptStore};
