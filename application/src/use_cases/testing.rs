//! Scripted completion client and fixtures shared by use case tests.

use crate::ports::completion_client::{CompletionClient, CompletionError};
use agora_domain::{AgentDocument, DocumentStore};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A scripted reply
#[derive(Debug, Clone)]
pub(crate) enum Scripted {
    Text(String),
    Error(String),
    /// Sleep, then reply with the text
    Slow(Duration, String),
}

impl Scripted {
    pub(crate) fn text(s: &str) -> Self {
        Scripted::Text(s.to_string())
    }

    pub(crate) fn error(s: &str) -> Self {
        Scripted::Error(s.to_string())
    }
}

/// A call received by [`RoutedClient`].
#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub system: String,
    pub user: String,
    pub context: String,
}

/// Mock client routing each call by substring.
///
/// The first route whose needle occurs in the system prompt, user prompt or
/// context and still has replies queued answers the call. Unmatched calls get
/// the fallback text.
pub(crate) struct RoutedClient {
    routes: Mutex<Vec<(String, VecDeque<Scripted>)>>,
    fallback: String,
    calls: Mutex<Vec<RecordedCall>>,
}

impl RoutedClient {
    pub(crate) fn new(fallback: &str) -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
            fallback: fallback.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn route(self, needle: &str, replies: Vec<Scripted>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .push((needle.to_string(), replies.into()));
        self
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next_reply(&self, system: &str, user: &str, context: &str) -> Scripted {
        let mut routes = self.routes.lock().unwrap();
        for (needle, replies) in routes.iter_mut() {
            let matches = system.contains(needle.as_str())
                || user.contains(needle.as_str())
                || context.contains(needle.as_str());
            if matches && let Some(reply) = replies.pop_front() {
                return reply;
            }
        }
        Scripted::Text(self.fallback.clone())
    }
}

#[async_trait]
impl CompletionClient for RoutedClient {
    async fn call(&self, system: &str, user: &str, context: &str) -> Result<String, CompletionError> {
        self.calls.lock().unwrap().push(RecordedCall {
            system: system.to_string(),
            user: user.to_string(),
            context: context.to_string(),
        });
        match self.next_reply(system, user, context) {
            Scripted::Text(text) => Ok(text),
            Scripted::Error(e) => Err(CompletionError::RequestFailed(e)),
            Scripted::Slow(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
        }
    }
}

/// `n` meeting documents named "Meeting 1".."Meeting n", each mentioning decisions.
pub(crate) fn meetings(n: usize) -> DocumentStore {
    let docs = (1..=n)
        .map(|i| {
            AgentDocument::new(format!("m{}", i), format!("Meeting {}", i))
                .with_summary(format!("Meeting {} covered roadmap decisions and budget.", i))
                .with_key_points([format!("Decision {}: adopt plan {}", i, i)])
                .with_action_items([format!("Owner {} follows up on plan {}", i, i)])
                .with_transcript(format!("Discussion about decisions for plan {}.", i))
        })
        .collect();
    let mut store = DocumentStore::new();
    store.load(docs).unwrap();
    store
}
