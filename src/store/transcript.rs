//! Durable transcript persistence
//!
//! The whole transcript is stored as one JSON array under a fixed key.
//! Read and write failures never surface to the session: a missing or
//! unreadable transcript loads as empty history.

use std::sync::Arc;

use super::KvStore;
use crate::session::Message;

/// Key holding the serialized transcript
pub const CHAT_HISTORY_KEY: &str = "cyrene_chat_history";

/// Saves and reloads the message transcript
#[derive(Clone)]
pub struct TranscriptStore {
    kv: Arc<dyn KvStore>,
}

impl TranscriptStore {
    /// Create a transcript store over a key/value backend
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Overwrite the stored transcript with `messages`
    pub fn save(&self, messages: &[Message]) {
        let json = match serde_json::to_string(messages) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize chat history");
                return;
            }
        };

        if let Err(e) = self.kv.set(CHAT_HISTORY_KEY, &json) {
            tracing::error!(error = %e, "failed to save chat history");
        } else {
            tracing::trace!(messages = messages.len(), "chat history saved");
        }
    }

    /// Load the stored transcript, empty if absent or corrupt
    #[must_use]
    pub fn load(&self) -> Vec<Message> {
        let saved = match self.kv.get(CHAT_HISTORY_KEY) {
            Ok(Some(saved)) => saved,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::error!(error = %e, "failed to read chat history");
                return Vec::new();
            }
        };

        serde_json::from_str(&saved).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "stored chat history is corrupt, starting empty");
            Vec::new()
        })
    }

    /// Remove the stored transcript
    pub fn clear(&self) {
        if let Err(e) = self.kv.remove(CHAT_HISTORY_KEY) {
            tracing::error!(error = %e, "failed to clear chat history");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKvStore;

    fn store() -> (TranscriptStore, Arc<MemoryKvStore>) {
        let kv = Arc::new(MemoryKvStore::new());
        (TranscriptStore::new(kv.clone()), kv)
    }

    #[test]
    fn save_then_load_preserves_order() {
        let (store, _) = store();
        let messages = vec![
            Message::user("hello"),
            Message::assistant("hi there", None),
            Message::user("play it"),
            Message::assistant("sure", Some("/tmp/cache/a.mp3".to_string())),
        ];

        store.save(&messages);
        assert_eq!(store.load(), messages);
    }

    #[test]
    fn load_absent_is_empty() {
        let (store, _) = store();
        assert!(store.load().is_empty());
    }

    #[test]
    fn load_corrupt_is_empty() {
        let (store, kv) = store();
        kv.set(CHAT_HISTORY_KEY, "{not json").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_overwrites_previous_transcript() {
        let (store, _) = store();
        store.save(&[Message::user("one"), Message::user("two")]);
        store.save(&[Message::user("three")]);
        assert_eq!(store.load(), vec![Message::user("three")]);
    }

    #[test]
    fn clear_removes_entry() {
        let (store, kv) = store();
        store.save(&[Message::user("hello")]);
        store.clear();
        assert!(kv.get(CHAT_HISTORY_KEY).unwrap().is_none());
        assert!(store.load().is_empty());
    }
}
