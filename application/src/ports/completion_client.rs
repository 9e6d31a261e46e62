//! Completion client port
//!
//! Defines the interface for the text-completion service. Transport, model
//! selection and pricing live behind it and are not this crate's concern.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during a completion call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Empty response")]
    EmptyResponse,

    #[error("Cancelled")]
    Cancelled,
}

/// Text-completion service.
///
/// `context` carries document text separately from the user prompt so
/// adapters can place it wherever their transport expects (a separate
/// message, a prompt prefix, a cached block).
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn call(&self, system: &str, user: &str, context: &str) -> Result<String, CompletionError>;
}

#[async_trait]
impl<T: CompletionClient + ?Sized> CompletionClient for Arc<T> {
    async fn call(&self, system: &str, user: &str, context: &str) -> Result<String, CompletionError> {
        (**self).call(system, user, context).await
    }
}

/// Wraps a client and counts the calls made through it.
pub struct CountingClient {
    inner: Arc<dyn CompletionClient>,
    calls: AtomicU64,
}

impl CountingClient {
    pub fn new(inner: Arc<dyn CompletionClient>) -> Self {
        Self {
            inner,
            calls: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CompletionClient for CountingClient {
    async fn call(&self, system: &str, user: &str, context: &str) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.call(system, user, context).await
    }
}

/// Client that fails every call. Used where completions are disabled
/// (offline inspection commands).
pub struct DisabledClient;

#[async_trait]
impl CompletionClient for DisabledClient {
    async fn call(&self, _system: &str, _user: &str, _context: &str) -> Result<String, CompletionError> {
        Err(CompletionError::RequestFailed(
            "completion service is disabled".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl CompletionClient for Echo {
        async fn call(&self, _system: &str, user: &str, _context: &str) -> Result<String, CompletionError> {
            Ok(user.to_string())
        }
    }

    #[tokio::test]
    async fn test_counting_client() {
        let client = CountingClient::new(Arc::new(Echo));
        assert_eq!(client.call("s", "hello", "").await.unwrap(), "hello");
        client.call("s", "again", "").await.unwrap();
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn test_disabled_client() {
        assert!(DisabledClient.call("s", "u", "").await.is_err());
    }
}
