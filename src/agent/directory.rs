//! Agent directory lookups on the agent-hosting backend

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default hosting node agents are registered under
pub const DEFAULT_NODE: &str = "us01.erebrus.io";

/// Hosted agent as described by the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Agent identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Host the agent's message endpoint is served from
    pub domain: String,

    /// Run status ("active", "paused", "stopped")
    #[serde(default)]
    pub status: Option<String>,

    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,

    /// TTS voice the agent speaks with (e.g. "af_bella")
    #[serde(default)]
    pub voice_model: Option<String>,

    /// Owning organization
    #[serde(default)]
    pub organization: Option<String>,
}

impl AgentProfile {
    /// Base URL the agent's message endpoint lives under
    #[must_use]
    pub fn message_base_url(&self) -> String {
        if self.domain.starts_with("http://") || self.domain.starts_with("https://") {
            self.domain.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", self.domain.trim_end_matches('/'))
        }
    }
}

#[derive(Debug, Deserialize)]
struct AgentEnvelope {
    #[serde(default)]
    agent: Option<AgentProfile>,
}

#[derive(Debug, Deserialize)]
struct AgentListEnvelope {
    #[serde(default)]
    agents: Option<Vec<AgentProfile>>,
}

/// Looks up agents registered on a hosting node
pub struct AgentDirectory {
    client: reqwest::Client,
    base_url: String,
    node: String,
}

impl AgentDirectory {
    /// Create a directory client for `node` under `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            node: node.into(),
        }
    }

    /// Fetch a single agent
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the directory has no such agent, or an
    /// HTTP error if the request fails
    pub async fn get_agent(&self, id: &str) -> Result<AgentProfile> {
        if id.trim().is_empty() {
            return Err(Error::Config("agent id is required".to_string()));
        }

        let url = format!("{}/agents/{}/{id}", self.base_url, self.node);
        tracing::debug!(url = %url, "fetching agent");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("agent {id}")));
        }
        if !status.is_success() {
            return Err(Error::Agent(format!("failed to fetch agent {id}: {status}")));
        }

        let envelope: AgentEnvelope = response.json().await?;
        envelope
            .agent
            .ok_or_else(|| Error::NotFound(format!("agent {id}")))
    }

    /// List all agents on the node
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is malformed
    pub async fn list_agents(&self) -> Result<Vec<AgentProfile>> {
        let url = format!("{}/agents/{}", self.base_url, self.node);
        tracing::debug!(url = %url, "listing agents");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Agent(format!("failed to fetch agents: {status}")));
        }

        let envelope: AgentListEnvelope = response.json().await?;
        Ok(envelope.agents.unwrap_or_default())
    }
}
