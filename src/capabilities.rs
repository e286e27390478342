//! External collaborator traits consumed by node executors.
//!
//! Text generation and search are opaque capabilities: the engine only knows
//! their call shape and failure mode. Concrete providers live outside this
//! crate and are injected into the compiler as trait objects.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::Message;

/// Failure surfaced by a capability call.
///
/// How a failure is treated is the calling executor's policy, not the
/// capability's: the chat executor escalates it to a fatal run error, the
/// search executor records it as an error output and continues.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("capability call failed: {0}")]
    Call(String),

    #[error("capability timed out after {0} ms")]
    Timeout(u64),
}

/// Generates an assistant reply from a window of chat messages.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Invoke the model with the given messages and return the assistant
    /// reply content.
    async fn generate(&self, messages: &[Message]) -> Result<String, CapabilityError>;
}

/// One hit returned by the search capability.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// Looks up external search results for a query string.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, CapabilityError>;
}
