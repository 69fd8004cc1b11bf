//! Text-to-speech (TTS) processing

use async_trait::async_trait;

use crate::{Error, Result};

/// Voice used when neither the caller nor the agent names one
pub const DEFAULT_VOICE: &str = "af_bella";

/// Remote speech synthesis
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with `voice`, returning encoded audio (MP3)
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or non-success status
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>>;
}

/// TTS provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TtsProvider {
    /// Front-end proxy accepting `{text, voice}` JSON
    Proxy,
    /// Kokoro server exposing the `OpenAI`-style speech endpoint
    Kokoro,
}

impl std::str::FromStr for TtsProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "proxy" => Ok(Self::Proxy),
            "kokoro" => Ok(Self::Kokoro),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Synthesizes speech from text over HTTP
pub struct TextToSpeech {
    client: reqwest::Client,
    endpoint: String,
    default_voice: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a TTS client posting `{text, voice}` to a proxy endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is empty
    pub fn new_proxy(endpoint: &str) -> Result<Self> {
        Self::build(endpoint, TtsProvider::Proxy)
    }

    /// Create a TTS client talking to a Kokoro server at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the base URL is empty
    pub fn new_kokoro(base_url: &str) -> Result<Self> {
        Self::build(base_url, TtsProvider::Kokoro)
    }

    /// Create a TTS client for the given provider
    ///
    /// # Errors
    ///
    /// Returns error if the URL is empty
    pub fn with_provider(url: &str, provider: TtsProvider) -> Result<Self> {
        Self::build(url, provider)
    }

    fn build(url: &str, provider: TtsProvider) -> Result<Self> {
        if url.trim().is_empty() {
            return Err(Error::Config("TTS API URL not configured".to_string()));
        }

        let url = url.trim_end_matches('/');
        let endpoint = match provider {
            TtsProvider::Proxy => url.to_string(),
            TtsProvider::Kokoro => format!("{url}/v1/audio/speech"),
        };

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            default_voice: DEFAULT_VOICE.to_string(),
            provider,
        })
    }

    /// Override the voice used when callers pass an empty voice id
    #[must_use]
    pub fn with_default_voice(mut self, voice: impl Into<String>) -> Self {
        self.default_voice = voice.into();
        self
    }

    /// Endpoint requests are sent to
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn resolve_voice<'a>(&'a self, voice: &'a str) -> &'a str {
        if voice.trim().is_empty() {
            &self.default_voice
        } else {
            voice
        }
    }

    /// Synthesize through the proxy contract
    async fn synthesize_proxy(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ProxyRequest<'a> {
            text: &'a str,
            voice: &'a str,
        }

        let request = ProxyRequest { text, voice };
        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("TTS proxy error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }

    /// Synthesize directly against Kokoro
    async fn synthesize_kokoro(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        #[allow(clippy::struct_excessive_bools)]
        struct Normalization {
            normalize: bool,
            unit_normalization: bool,
            url_normalization: bool,
            email_normalization: bool,
            optional_pluralization_normalization: bool,
        }

        #[derive(serde::Serialize)]
        struct KokoroRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            response_format: &'a str,
            download_format: &'a str,
            speed: f32,
            stream: bool,
            return_download_link: bool,
            lang_code: &'a str,
            normalization_options: Normalization,
        }

        let request = KokoroRequest {
            model: "kokoro",
            input: text,
            voice,
            response_format: "mp3",
            download_format: "mp3",
            speed: 1.0,
            stream: true,
            return_download_link: false,
            lang_code: "a",
            normalization_options: Normalization {
                normalize: true,
                unit_normalization: false,
                url_normalization: true,
                email_normalization: true,
                optional_pluralization_normalization: true,
            },
        };

        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("Kokoro TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        let voice = self.resolve_voice(voice);
        tracing::debug!(
            provider = ?self.provider,
            voice,
            chars = text.len(),
            "synthesizing speech"
        );

        match self.provider {
            TtsProvider::Proxy => self.synthesize_proxy(text, voice).await,
            TtsProvider::Kokoro => self.synthesize_kokoro(text, voice).await,
        }
    }
}
