//! Conversational agent endpoint client

use async_trait::async_trait;
use serde::Deserialize;

use crate::{Error, Result};

/// One user turn sent to the agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    /// User utterance or typed text
    pub text: String,

    /// Caller identity (wallet address or configured user id)
    pub user_id: String,

    /// Whether the reply will be spoken aloud
    pub voice_mode: bool,
}

/// Remote conversational agent
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Send a user turn and wait for the textual reply
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, non-success status or an
    /// unparseable reply
    async fn send_message(&self, request: &AgentRequest) -> Result<String>;
}

/// Reply entry returned by the agent endpoint
#[derive(Debug, Deserialize)]
struct ReplyEntry {
    text: String,
}

/// Agent reached over HTTP with multipart form submissions
pub struct HttpAgentClient {
    client: reqwest::Client,
    message_url: String,
}

impl HttpAgentClient {
    /// Create a client posting to `{base_url}/{agent_id}/message`
    ///
    /// # Errors
    ///
    /// Returns error if the base URL or agent id is empty
    pub fn new(base_url: &str, agent_id: &str) -> Result<Self> {
        if base_url.trim().is_empty() {
            return Err(Error::Config("message API URL not configured".to_string()));
        }
        if agent_id.trim().is_empty() {
            return Err(Error::Config("agent id not configured".to_string()));
        }

        let message_url = format!("{}/{agent_id}/message", base_url.trim_end_matches('/'));
        Ok(Self::with_message_url(message_url))
    }

    /// Create a client posting to an explicit message URL
    #[must_use]
    pub fn with_message_url(message_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            message_url: message_url.into(),
        }
    }

    /// URL turns are posted to
    #[must_use]
    pub fn message_url(&self) -> &str {
        &self.message_url
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn send_message(&self, request: &AgentRequest) -> Result<String> {
        tracing::debug!(
            url = %self.message_url,
            voice_mode = request.voice_mode,
            "sending message to agent"
        );

        let form = reqwest::multipart::Form::new()
            .text("text", request.text.clone())
            .text("userId", request.user_id.clone())
            .text("voice_mode", request.voice_mode.to_string());

        let response = self
            .client
            .post(&self.message_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "agent request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "agent API error");
            return Err(Error::Agent(format!("failed to send message: {status}")));
        }

        let replies: Vec<ReplyEntry> = response.json().await?;
        let reply = replies
            .into_iter()
            .next()
            .ok_or_else(|| Error::Agent("agent returned no reply".to_string()))?;

        tracing::debug!(chars = reply.text.len(), "agent replied");
        Ok(reply.text)
    }
}
