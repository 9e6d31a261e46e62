//! Sandbox runtime port: interface for executing generated code.
//!
//! This port abstracts the scripting VM so that:
//! - The application layer doesn't depend on mlua
//! - Runs are synchronous and happen on a blocking thread, never on the
//!   async executor
//! - `sub_lm` calls cross back to the host through a [`SubLmBridge`]
//!
//! # `sub_lm` handshake
//!
//! ```text
//! sandbox thread                         host task
//! ──────────────                         ─────────
//! bridge.call(q, ctx)
//!   ├─ depth check ── exceeded ──▶ Err(DepthExceeded)
//!   ├─ send SubLmRequest ─────────────▶ rx.recv()
//!   └─ block on reply (timeout)          completion call
//!        ◀──────────────────────────────  reply.send(answer)
//! ```
//!
//! Depth and timeout failures are also recorded in the bridge so that a
//! script cannot hide them with `pcall`.

use agora_domain::{AgentDocument, SandboxLimits, SandboxOutput, SubLmMode};
use std::sync::mpsc::{RecvTimeoutError, SyncSender, sync_channel};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

/// Errors from a sandbox run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SandboxError {
    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Wall-clock limit of {0:?} exceeded")]
    Timeout(Duration),

    #[error("Memory limit exceeded")]
    MemoryLimit,

    #[error("Script finished without calling FINAL or FINAL_VAR")]
    NoFinal,

    #[error("sub_lm recursion depth exceeded ({depth} >= {max})")]
    DepthExceeded { depth: usize, max: usize },

    #[error("sub_lm call timed out after {0:?}")]
    SubLmTimeout(Duration),

    #[error("sub_lm failed: {0}")]
    SubLm(String),

    #[error("Sandbox unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised inside the sandbox by `sub_lm`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubLmError {
    #[error("recursion depth exceeded ({depth} >= {max})")]
    DepthExceeded { depth: usize, max: usize },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("host stopped answering")]
    HostGone,

    #[error("sub_lm is not available in this run")]
    Unavailable,

    #[error("{0}")]
    Failed(String),
}

impl SubLmError {
    /// Whether the error must fail the whole run even if the script catches it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SubLmError::DepthExceeded { .. } | SubLmError::Timeout(_) | SubLmError::HostGone
        )
    }
}

impl From<SubLmError> for SandboxError {
    fn from(e: SubLmError) -> Self {
        match e {
            SubLmError::DepthExceeded { depth, max } => SandboxError::DepthExceeded { depth, max },
            SubLmError::Timeout(d) => SandboxError::SubLmTimeout(d),
            other => SandboxError::SubLm(other.to_string()),
        }
    }
}

/// A `sub_lm` request sent from the sandbox thread to the host.
#[derive(Debug)]
pub struct SubLmRequest {
    pub query: String,
    pub context: String,
    /// Depth of the run that issued the call
    pub depth: usize,
    pub reply: SyncSender<Result<String, SubLmError>>,
}

/// A `sub_lm` call queued in deferred mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredCall {
    pub index: usize,
    pub query: String,
    pub context: String,
}

impl DeferredCall {
    /// Text returned to the script in place of the answer.
    pub fn placeholder(index: usize) -> String {
        format!("[[sub_lm:{}]]", index)
    }
}

/// Sandbox side of the `sub_lm` handshake.
#[derive(Clone)]
pub struct SubLmBridge {
    sender: Option<UnboundedSender<SubLmRequest>>,
    depth: usize,
    max_depth: usize,
    timeout: Duration,
    mode: SubLmMode,
    deferred: Arc<Mutex<Vec<DeferredCall>>>,
    fatal: Arc<Mutex<Option<SubLmError>>>,
}

impl SubLmBridge {
    pub fn new(sender: UnboundedSender<SubLmRequest>, limits: &SandboxLimits) -> Self {
        Self {
            sender: Some(sender),
            depth: limits.depth,
            max_depth: limits.max_depth,
            timeout: limits.sub_lm_timeout,
            mode: limits.sub_lm_mode,
            deferred: Arc::new(Mutex::new(Vec::new())),
            fatal: Arc::new(Mutex::new(None)),
        }
    }

    /// Bridge whose calls always fail with [`SubLmError::Unavailable`].
    pub fn disabled() -> Self {
        Self {
            sender: None,
            depth: 0,
            max_depth: 0,
            timeout: Duration::ZERO,
            mode: SubLmMode::Direct,
            deferred: Arc::new(Mutex::new(Vec::new())),
            fatal: Arc::new(Mutex::new(None)),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn mode(&self) -> SubLmMode {
        self.mode
    }

    /// Answer a `sub_lm` call. Blocks the calling thread in direct mode.
    pub fn call(&self, query: &str, context: &str) -> Result<String, SubLmError> {
        let Some(sender) = &self.sender else {
            return Err(SubLmError::Unavailable);
        };
        if self.depth + 1 >= self.max_depth {
            return Err(self.record(SubLmError::DepthExceeded {
                depth: self.depth + 1,
                max: self.max_depth,
            }));
        }

        if self.mode == SubLmMode::Deferred {
            let mut deferred = self
                .deferred
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let index = deferred.len();
            deferred.push(DeferredCall {
                index,
                query: query.to_string(),
                context: context.to_string(),
            });
            return Ok(DeferredCall::placeholder(index));
        }

        let (reply, answer) = sync_channel(1);
        let request = SubLmRequest {
            query: query.to_string(),
            context: context.to_string(),
            depth: self.depth,
            reply,
        };
        if sender.send(request).is_err() {
            return Err(self.record(SubLmError::HostGone));
        }
        match answer.recv_timeout(self.timeout) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(self.record(e)),
            Err(RecvTimeoutError::Timeout) => Err(self.record(SubLmError::Timeout(self.timeout))),
            Err(RecvTimeoutError::Disconnected) => Err(self.record(SubLmError::HostGone)),
        }
    }

    fn record(&self, error: SubLmError) -> SubLmError {
        if error.is_fatal() {
            let mut slot = self.fatal.lock().unwrap_or_else(|p| p.into_inner());
            if slot.is_none() {
                *slot = Some(error.clone());
            }
        }
        error
    }

    /// Whether a fatal error has been recorded and not yet taken.
    pub fn has_failed(&self) -> bool {
        self.fatal.lock().unwrap_or_else(|p| p.into_inner()).is_some()
    }

    /// First fatal error raised during the run, if any.
    pub fn take_fatal(&self) -> Option<SubLmError> {
        self.fatal.lock().unwrap_or_else(|p| p.into_inner()).take()
    }

    /// Calls queued in deferred mode, in call order.
    pub fn take_deferred(&self) -> Vec<DeferredCall> {
        std::mem::take(&mut *self.deferred.lock().unwrap_or_else(|p| p.into_inner()))
    }
}

/// Port for the sandboxed scripting VM.
///
/// `run` is synchronous: callers move it onto a blocking thread. A fresh,
/// isolated VM is used for every run.
pub trait SandboxRuntime: Send + Sync {
    fn run(
        &self,
        code: &str,
        documents: &[AgentDocument],
        limits: &SandboxLimits,
        bridge: SubLmBridge,
    ) -> Result<SandboxOutput, SandboxError>;

    /// Short runtime name for logs (e.g. "lua").
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_bridge() {
        let bridge = SubLmBridge::disabled();
        assert_eq!(bridge.call("q", ""), Err(SubLmError::Unavailable));
        assert!(bridge.take_fatal().is_none());
    }

    #[test]
    fn test_depth_exceeded_is_recorded() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let limits = SandboxLimits::default().with_depth(2, 3);
        let bridge = SubLmBridge::new(tx, &limits);
        let err = bridge.call("q", "").unwrap_err();
        assert_eq!(err, SubLmError::DepthExceeded { depth: 3, max: 3 });
        assert!(bridge.has_failed());
        assert_eq!(bridge.take_fatal(), Some(err));
        assert!(!bridge.has_failed());
    }

    #[test]
    fn test_direct_call_round_trip() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<SubLmRequest>();
        let bridge = SubLmBridge::new(tx, &SandboxLimits::default());
        let host = std::thread::spawn(move || {
            let request = rx.blocking_recv().unwrap();
            request
                .reply
                .send(Ok(format!("answer to {}", request.query)))
                .unwrap();
        });
        assert_eq!(bridge.call("q1", "ctx").unwrap(), "answer to q1");
        host.join().unwrap();
    }

    #[test]
    fn test_timeout_when_host_is_silent() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let limits = SandboxLimits::default().with_sub_lm_timeout(Duration::from_millis(20));
        let bridge = SubLmBridge::new(tx, &limits);
        let err = bridge.call("q", "").unwrap_err();
        assert_eq!(err, SubLmError::Timeout(Duration::from_millis(20)));
        assert!(bridge.take_fatal().is_some());
    }

    #[test]
    fn test_deferred_mode_queues_calls() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let limits = SandboxLimits::default().with_sub_lm_mode(SubLmMode::Deferred);
        let bridge = SubLmBridge::new(tx, &limits);
        assert_eq!(bridge.call("a", "").unwrap(), "[[sub_lm:0]]");
        assert_eq!(bridge.call("b", "x").unwrap(), "[[sub_lm:1]]");
        let calls = bridge.take_deferred();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].context, "x");
    }
}
