//! Speech synthesis client producing playable audio handles

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::SpeechSynthesizer;
use crate::Result;

/// Directory synthesized audio is written to
///
/// Every stored clip gets a unique file name; the returned path is the
/// handle messages carry and playback opens.
#[derive(Debug, Clone)]
pub struct AudioCache {
    dir: PathBuf,
}

impl AudioCache {
    /// Open (creating if needed) an audio cache rooted at `dir`
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Cache directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write an MP3 clip and return its handle
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub async fn store(&self, audio: &[u8]) -> Result<String> {
        let path = self.dir.join(format!("{}.mp3", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, audio).await?;
        Ok(path.display().to_string())
    }

    /// Delete every stored clip, returning how many were removed
    ///
    /// Files the cache did not write are left alone. Failures are logged and
    /// skipped.
    #[must_use = "the count of removed clips is returned"]
    pub fn purge(&self) -> usize {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, dir = %self.dir.display(), "failed to read audio cache");
                return 0;
            }
        };

        let mut removed = 0;
        for path in entries.filter_map(|entry| entry.ok().map(|e| e.path())) {
            if path.extension().is_none_or(|ext| ext != "mp3") {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "failed to remove cached clip");
                }
            }
        }

        removed
    }
}

/// Turns reply text into a playable audio handle
///
/// Failures are logged and reported as `None`; the caller carries on
/// without audio.
#[derive(Clone)]
pub struct VoiceGenerator {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    cache: AudioCache,
}

impl VoiceGenerator {
    /// Create a generator writing synthesized clips into `cache`
    #[must_use]
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, cache: AudioCache) -> Self {
        Self { synthesizer, cache }
    }

    /// Delete every clip this generator has cached
    #[must_use = "the count of removed clips is returned"]
    pub fn purge_cache(&self) -> usize {
        self.cache.purge()
    }

    /// Synthesize `text` with `voice_id`, returning the stored clip's handle
    pub async fn generate_voice(&self, text: &str, voice_id: &str) -> Option<String> {
        let audio = match self.synthesizer.synthesize(text, voice_id).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(error = %e, voice = voice_id, "voice generation failed");
                return None;
            }
        };

        if audio.is_empty() {
            tracing::warn!(voice = voice_id, "voice generation returned no audio");
            return None;
        }

        match self.cache.store(&audio).await {
            Ok(handle) => {
                tracing::debug!(handle = %handle, bytes = audio.len(), "voice generated");
                Some(handle)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to store generated audio");
                None
            }
        }
    }
}
