//! Transcript message type

use serde::{Deserialize, Serialize};

/// One entry of the conversation transcript
///
/// Field names serialize in camelCase (`isUser`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Whether the user (rather than the agent) authored this message
    pub is_user: bool,

    /// Message text
    pub text: String,

    /// Playable audio handle attached to an agent reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

impl Message {
    /// Create a user message
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            is_user: true,
            text: text.into(),
            audio: None,
        }
    }

    /// Create an agent reply, optionally carrying synthesized audio
    #[must_use]
    pub fn assistant(text: impl Into<String>, audio: Option<String>) -> Self {
        Self {
            is_user: false,
            text: text.into(),
            audio,
        }
    }
}
