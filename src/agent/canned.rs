//! Offline agent returning canned replies (development mode)

use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;

use super::{AgentClient, AgentRequest};
use crate::Result;

const CANNED_REPLIES: [&str; 4] = [
    "Hello! I'm doing great, thank you for asking. I'm here to help you explore the fascinating world of AI and technology. What would you like to know?",
    "I'm a multi-talented AI assistant with expertise in cybersecurity, blockchain, and decentralized systems. I can help with technical questions, provide guidance on various topics, and even engage in natural conversations with voice responses.",
    "That's a great question! I specialize in natural language processing, voice synthesis, and understanding complex technical concepts. I can help explain difficult topics in simple terms.",
    "I'd be happy to help you with that. My knowledge spans across various domains including AI, machine learning, cybersecurity, and blockchain technology.",
];

/// Agent that answers every turn with a random canned reply
pub struct CannedAgent {
    delay: Duration,
}

impl CannedAgent {
    /// Create a canned agent that waits `delay` before replying
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for CannedAgent {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl AgentClient for CannedAgent {
    async fn send_message(&self, request: &AgentRequest) -> Result<String> {
        tracing::debug!(voice_mode = request.voice_mode, "answering with canned reply");
        tokio::time::sleep(self.delay).await;

        let reply = CANNED_REPLIES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(CANNED_REPLIES[0]);
        Ok(reply.to_string())
    }
}
