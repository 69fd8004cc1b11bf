//! Local persistence: key/value backends and the transcript store

mod kv;
mod transcript;

pub use kv::{KvStore, MemoryKvStore, SqliteKvStore};
pub use transcript::{CHAT_HISTORY_KEY, TranscriptStore};

use crate::Result;

/// Key holding the generated local user id
pub const USER_ID_KEY: &str = "cyrene_user_id";

/// Return the stored local user id, generating and saving one on first use
///
/// # Errors
///
/// Returns error if the store cannot be read or written
pub fn load_or_create_user_id(kv: &dyn KvStore) -> Result<String> {
    if let Some(id) = kv.get(USER_ID_KEY)?.filter(|id| !id.is_empty()) {
        return Ok(id);
    }

    let id = uuid::Uuid::new_v4().to_string();
    kv.set(USER_ID_KEY, &id)?;
    tracing::debug!(user_id = %id, "generated local user id");
    Ok(id)
}
