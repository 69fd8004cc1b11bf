//! TOML configuration file loading
//!
//! Supports `~/.config/cyrene/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct CyreneConfigFile {
    /// Identity sent with every turn
    #[serde(default)]
    pub user_id: Option<String>,

    /// Data directory override
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Agent backend configuration
    #[serde(default)]
    pub agent: AgentFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,
}

/// Agent backend configuration
#[derive(Debug, Default, Deserialize)]
pub struct AgentFileConfig {
    /// Agent-hosting API base URL (directory lookups)
    pub api_base_url: Option<String>,

    /// Hosting node agents are registered under
    pub node: Option<String>,

    /// Agent to talk to
    pub id: Option<String>,

    /// Explicit message base URL, skipping the directory lookup
    pub message_url: Option<String>,

    /// Answer with canned replies instead of calling the agent
    pub use_mock: Option<bool>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable voice input/output
    pub enabled: Option<bool>,

    /// TTS endpoint (proxy URL or Kokoro base URL)
    pub tts_url: Option<String>,

    /// TTS provider ("kokoro" or "proxy")
    pub tts_provider: Option<String>,

    /// TTS voice identifier (e.g. "af_bella")
    pub voice: Option<String>,

    /// Voice catalog URL
    pub voices_url: Option<String>,

    /// Whisper-compatible STT endpoint
    pub stt_url: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// STT API key
    pub stt_api_key: Option<String>,

    /// Seconds to wait for speech before giving up
    pub no_speech_timeout_secs: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `CyreneConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> CyreneConfigFile {
    config_file_path().map_or_else(CyreneConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file from `path`, falling back to defaults
pub fn load_from(path: &Path) -> CyreneConfigFile {
    if !path.exists() {
        return CyreneConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                CyreneConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            CyreneConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/cyrene/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("cyrene").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let config: CyreneConfigFile = toml::from_str(
            r#"
            user_id = "0xabc"

            [voice]
            voice = "bf_emma"
            "#,
        )
        .unwrap();

        assert_eq!(config.user_id.as_deref(), Some("0xabc"));
        assert_eq!(config.voice.voice.as_deref(), Some("bf_emma"));
        assert!(config.agent.id.is_none());
    }

    #[test]
    fn unparseable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        let config = load_from(&path);
        assert!(config.user_id.is_none());
    }

    #[test]
    fn missing_file_is_default() {
        let config = load_from(Path::new("/nonexistent/cyrene/config.toml"));
        assert!(config.voice.enabled.is_none());
    }
}
