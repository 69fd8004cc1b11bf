//! Remote conversational agent access
//!
//! `AgentClient` is the seam the session controller dispatches turns
//! through; `HttpAgentClient` talks to a hosted agent and `CannedAgent`
//! stands in for it when running offline.

mod canned;
mod client;
mod directory;

pub use canned::CannedAgent;
pub use client::{AgentClient, AgentRequest, HttpAgentClient};
pub use directory::{AgentDirectory, AgentProfile, DEFAULT_NODE};
