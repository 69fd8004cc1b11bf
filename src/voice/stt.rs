//! Speech-to-text (STT) processing

use crate::{Error, Result};

/// Default Whisper-compatible transcription endpoint
pub const DEFAULT_STT_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Response from a Whisper-compatible transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes speech to text via a Whisper-compatible endpoint
pub struct SpeechToText {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

impl SpeechToText {
    /// Create a new STT client
    ///
    /// The API key is optional so self-hosted servers without auth work.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is empty
    pub fn new(url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(Error::Config("STT API URL not configured".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            url,
            api_key: api_key.filter(|k| !k.is_empty()),
            model: model.into(),
        })
    }

    /// Transcribe audio to text
    ///
    /// # Arguments
    ///
    /// * `audio` - WAV audio bytes
    ///
    /// # Errors
    ///
    /// Returns error if transcription fails
    pub async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let mut request = self.client.post(&self.url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "transcription request failed");
            e
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "STT API error");
            return Err(Error::Stt(format!("STT API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await?;
        let text = result.text.trim().to_string();

        tracing::info!(transcript = %text, "transcription complete");
        Ok(text)
    }
}
