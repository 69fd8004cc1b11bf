//! Configuration management for the Cyrene voice client
//!
//! Environment variables win over the TOML file, which wins over defaults.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::agent::DEFAULT_NODE;
use crate::voice::{DEFAULT_STT_URL, DEFAULT_VOICE, TtsProvider};
use crate::{Error, Result};

/// Default Kokoro server
pub const DEFAULT_KOKORO_URL: &str = "https://kokoro.cyreneai.com";

/// Default voice catalog
pub const DEFAULT_VOICES_URL: &str = "https://kokoro.cyreneai.com/v1/audio/voices";

/// Cyrene client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Identity sent with every turn; generated and stored when unset
    pub user_id: Option<String>,

    /// Path to data directory (transcript database)
    pub data_dir: PathBuf,

    /// Path to cache directory (synthesized audio)
    pub cache_dir: PathBuf,

    /// Agent backend configuration
    pub agent: AgentConfig,

    /// Voice configuration
    pub voice: VoiceConfig,
}

/// Agent backend configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Agent-hosting API base URL (from `CYRENE_API_BASE_URL`)
    pub api_base_url: Option<String>,

    /// Hosting node agents are registered under
    pub node: String,

    /// Agent to talk to (from `CYRENE_AGENT_ID`)
    pub agent_id: Option<String>,

    /// Message base URL; when set, no directory lookup happens
    pub message_url: Option<String>,

    /// Answer with canned replies (from `CYRENE_USE_MOCK`)
    pub use_mock: bool,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable voice input/output
    pub enabled: bool,

    /// TTS endpoint
    pub tts_url: String,

    /// TTS provider backend
    pub tts_provider: TtsProvider,

    /// TTS voice identifier
    pub voice: String,

    /// Voice catalog URL
    pub voices_url: String,

    /// Whisper-compatible STT endpoint
    pub stt_url: String,

    /// STT model
    pub stt_model: String,

    /// STT API key (`OPENAI_API_KEY` when unset)
    pub stt_api_key: Option<String>,

    /// How long a capture waits for speech
    pub no_speech_timeout: Duration,
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if a value cannot be parsed
    pub fn load() -> Result<Self> {
        Self::load_with_options(false)
    }

    /// Load configuration, optionally forcing voice off
    ///
    /// # Errors
    ///
    /// Returns error if a value cannot be parsed
    pub fn load_with_options(disable_voice: bool) -> Result<Self> {
        let fc = file::load_config_file();
        let mut config = Self::from_sources(fc, |key| std::env::var(key).ok())?;
        if disable_voice {
            config.voice.enabled = false;
        }
        Ok(config)
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value cannot be parsed
    pub fn from_sources<F>(fc: file::CyreneConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let dirs = directories::ProjectDirs::from("com", "cyreneai", "cyrene");
        let data_dir = lookup("CYRENE_DATA_DIR")
            .or(fc.data_dir)
            .map(PathBuf::from)
            .or_else(|| dirs.as_ref().map(|d| d.data_dir().to_path_buf()))
            .unwrap_or_else(|| PathBuf::from(".cyrene"));
        let cache_dir = dirs
            .as_ref()
            .map_or_else(|| data_dir.join("cache"), |d| d.cache_dir().to_path_buf());

        let agent = AgentConfig {
            api_base_url: lookup("CYRENE_API_BASE_URL").or(fc.agent.api_base_url),
            node: lookup("CYRENE_AGENT_NODE")
                .or(fc.agent.node)
                .unwrap_or_else(|| DEFAULT_NODE.to_string()),
            agent_id: lookup("CYRENE_AGENT_ID").or(fc.agent.id),
            message_url: lookup("CYRENE_MESSAGE_URL").or(fc.agent.message_url),
            use_mock: lookup("CYRENE_USE_MOCK")
                .map(|v| parse_bool("CYRENE_USE_MOCK", &v))
                .transpose()?
                .or(fc.agent.use_mock)
                .unwrap_or(false),
        };

        let tts_provider = lookup("CYRENE_TTS_PROVIDER")
            .or(fc.voice.tts_provider)
            .map(|p| p.parse::<TtsProvider>())
            .transpose()?
            .unwrap_or(TtsProvider::Kokoro);

        let no_speech_timeout_secs = lookup("CYRENE_NO_SPEECH_TIMEOUT")
            .map(|v| {
                v.parse::<u64>().map_err(|e| {
                    Error::Config(format!("invalid CYRENE_NO_SPEECH_TIMEOUT {v:?}: {e}"))
                })
            })
            .transpose()?
            .or(fc.voice.no_speech_timeout_secs)
            .unwrap_or(8);

        let voice_disabled = lookup("CYRENE_DISABLE_VOICE")
            .map(|v| parse_bool("CYRENE_DISABLE_VOICE", &v))
            .transpose()?
            .unwrap_or(false);

        let voice = VoiceConfig {
            enabled: !voice_disabled && fc.voice.enabled.unwrap_or(true),
            tts_url: lookup("TTS_API_URL")
                .or(fc.voice.tts_url)
                .unwrap_or_else(|| DEFAULT_KOKORO_URL.to_string()),
            tts_provider,
            voice: lookup("CYRENE_TTS_VOICE")
                .or(fc.voice.voice)
                .unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            voices_url: lookup("CYRENE_VOICES_URL")
                .or(fc.voice.voices_url)
                .unwrap_or_else(|| DEFAULT_VOICES_URL.to_string()),
            stt_url: lookup("STT_API_URL")
                .or(fc.voice.stt_url)
                .unwrap_or_else(|| DEFAULT_STT_URL.to_string()),
            stt_model: lookup("STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
            stt_api_key: lookup("STT_API_KEY")
                .or(fc.voice.stt_api_key)
                .or_else(|| lookup("OPENAI_API_KEY")),
            no_speech_timeout: Duration::from_secs(no_speech_timeout_secs),
        };

        Ok(Self {
            user_id: lookup("CYRENE_USER_ID").or(fc.user_id),
            data_dir,
            cache_dir,
            agent,
            voice,
        })
    }

    /// Path of the transcript database
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("transcript.db")
    }

    /// Directory synthesized audio is cached in
    #[must_use]
    pub fn audio_dir(&self) -> PathBuf {
        self.cache_dir.join("audio")
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("invalid boolean for {key}: {other:?}"))),
    }
}
