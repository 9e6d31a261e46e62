//! Sandboxed recursive executor
//!
//! Answers procedural queries by asking the completion service for Lua code,
//! validating it, and running it in a [`SandboxRuntime`] on a blocking thread.
//!
//! While the script runs, this task serves its `sub_lm` requests:
//!
//! ```text
//! host task                                   blocking thread
//! ─────────                                   ───────────────
//! spawn_blocking(runtime.run) ──────────────▶ script runs
//! select! {                                   sub_lm(q) blocks
//!   rx.recv()  ◀──────────────── SubLmRequest
//!     nested sandbox or completion call
//!     reply.send(answer) ───────────────────▶ sub_lm returns
//!   handle     ◀──────────────── FINAL(value)
//! }
//! ```
//!
//! A `sub_lm` query that is itself procedural runs a nested sandbox one level
//! deeper; anything else becomes a single completion call.

use crate::config::SandboxParams;
use crate::ports::completion_client::CompletionError;
use crate::ports::conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger};
use crate::ports::sandbox_runtime::{
    DeferredCall, SandboxError, SandboxRuntime, SubLmBridge, SubLmError, SubLmRequest,
};
use crate::use_cases::executor::SubQueryExecutor;
use agora_domain::{
    AgentDocument, CodeValidator, DocumentStore, PromptTemplate, ReplQueryKind, SandboxLimits,
    SandboxOutput, extract_code, should_use_repl,
};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that end a sandboxed run; the pipeline falls back on any of them
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecursiveRunError {
    #[error("Code generation failed after {attempts} attempt(s): {last_error}")]
    GenerationFailed { attempts: u32, last_error: String },

    #[error("Sandbox run failed: {0}")]
    Execution(#[from] SandboxError),

    #[error("Recursion depth {depth} reached the ceiling of {max}")]
    DepthExceeded { depth: usize, max: usize },

    #[error("Completion failed: {0}")]
    Completion(CompletionError),

    #[error("Cancelled")]
    Cancelled,
}

impl From<CompletionError> for RecursiveRunError {
    fn from(e: CompletionError) -> Self {
        match e {
            CompletionError::Cancelled => RecursiveRunError::Cancelled,
            other => RecursiveRunError::Completion(other),
        }
    }
}

/// A successful sandboxed answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecursiveOutcome {
    pub answer: String,
    /// Generation attempts used for the top-level script
    pub attempts: u32,
    pub depth: usize,
    pub sub_lm_calls: usize,
    /// `sub_lm` calls resolved after the run (deferred mode)
    pub deferred_calls: usize,
    pub printed: String,
    pub output_truncated: bool,
}

/// Use case for running generated code against the loaded documents
pub struct RecursiveExecutor {
    runtime: Arc<dyn SandboxRuntime>,
    executor: Arc<SubQueryExecutor>,
    params: SandboxParams,
    max_depth: usize,
    validator: CodeValidator,
    logger: Arc<dyn ConversationLogger>,
    cancel: CancellationToken,
}

impl RecursiveExecutor {
    /// `executor` answers generation and `sub_lm` calls; its depth ceiling
    /// applies here too.
    pub fn new(
        runtime: Arc<dyn SandboxRuntime>,
        executor: Arc<SubQueryExecutor>,
        params: SandboxParams,
    ) -> Self {
        let max_depth = executor.params().max_depth;
        let validator = CodeValidator::new(params.max_code_bytes);
        Self {
            runtime,
            executor,
            params,
            max_depth,
            validator,
            logger: Arc::new(NoConversationLogger),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Generate, validate and run code answering `query`.
    pub async fn run(
        &self,
        query: &str,
        store: &DocumentStore,
        memory: Option<&str>,
    ) -> Result<RecursiveOutcome, RecursiveRunError> {
        self.run_at_depth(query, store, memory, 0).await
    }

    fn run_at_depth<'a>(
        &'a self,
        query: &'a str,
        store: &'a DocumentStore,
        memory: Option<&'a str>,
        depth: usize,
    ) -> BoxFuture<'a, Result<RecursiveOutcome, RecursiveRunError>> {
        async move {
            if depth >= self.max_depth {
                return Err(RecursiveRunError::DepthExceeded {
                    depth,
                    max: self.max_depth,
                });
            }
            info!(
                "Sandbox run at depth {} using {} runtime",
                depth,
                self.runtime.name()
            );

            let (code, attempts) = self.generate(query, store, memory, depth).await?;
            let limits = self.params.limits_at(depth, self.max_depth);
            let (output, deferred) = self.execute(code, store, memory, limits).await?;

            let mut answer = output.final_answer.clone().unwrap_or_default();
            let deferred_calls = deferred.len();
            if !deferred.is_empty() {
                answer = self
                    .resolve_deferred(answer, deferred, store, memory, depth)
                    .await;
            }
            if answer.trim().is_empty() {
                return Err(SandboxError::NoFinal.into());
            }

            Ok(RecursiveOutcome {
                answer,
                attempts,
                depth,
                sub_lm_calls: output.sub_lm_calls,
                deferred_calls,
                printed: output.printed,
                output_truncated: output.output_truncated,
            })
        }
        .boxed()
    }

    // ==================== Generation ====================

    /// Ask for code until it passes validation or attempts run out.
    async fn generate(
        &self,
        query: &str,
        store: &DocumentStore,
        memory: Option<&str>,
        depth: usize,
    ) -> Result<(String, u32), RecursiveRunError> {
        let kind = ReplQueryKind::detect(query).unwrap_or(ReplQueryKind::Search);
        let overview = document_overview(store);
        let system = PromptTemplate::with_memory(PromptTemplate::sandbox_system(), memory);
        let timeout = self.executor.params().call_timeout;
        let mut last_error: Option<String> = None;

        for attempt in 1..=self.params.max_attempts {
            let user =
                PromptTemplate::sandbox_prompt(query, kind.example(), &overview, last_error.as_deref());
            let response = self
                .executor
                .execute_single(&system, &user, "", timeout)
                .await?;
            let code = extract_code(&response);

            match self.validator.validate(&code) {
                Ok(()) => {
                    debug!("Generated {} code accepted on attempt {}", kind, attempt);
                    self.log_attempt(attempt, depth, None);
                    return Ok((code, attempt));
                }
                Err(e) => {
                    warn!(
                        "Generated code rejected (attempt {}/{}): {}",
                        attempt, self.params.max_attempts, e
                    );
                    self.log_attempt(attempt, depth, Some(&e.to_string()));
                    last_error = Some(e.to_string());
                }
            }
        }

        Err(RecursiveRunError::GenerationFailed {
            attempts: self.params.max_attempts,
            last_error: last_error.unwrap_or_default(),
        })
    }

    fn log_attempt(&self, attempt: u32, depth: usize, rejection: Option<&str>) {
        self.logger.log(ConversationEvent::new(
            "sandbox_attempt",
            json!({
                "attempt": attempt,
                "depth": depth,
                "accepted": rejection.is_none(),
                "rejection": rejection,
            }),
        ));
    }

    // ==================== Execution ====================

    /// Run `code` on a blocking thread and serve its `sub_lm` calls.
    async fn execute(
        &self,
        code: String,
        store: &DocumentStore,
        memory: Option<&str>,
        limits: SandboxLimits,
    ) -> Result<(SandboxOutput, Vec<DeferredCall>), RecursiveRunError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<SubLmRequest>();
        let bridge = SubLmBridge::new(tx, &limits);
        let documents: Vec<AgentDocument> = store.enabled_documents().cloned().collect();
        let runtime = Arc::clone(&self.runtime);
        let run_bridge = bridge.clone();
        let sub_lm_timeout = limits.sub_lm_timeout;

        let mut handle = tokio::task::spawn_blocking(move || {
            runtime.run(&code, &documents, &limits, run_bridge)
        });

        let joined = loop {
            tokio::select! {
                joined = &mut handle => break joined,
                Some(request) = rx.recv() => {
                    // A nested run must not outlive the script's own wait.
                    let served = tokio::time::timeout(
                        sub_lm_timeout,
                        self.serve_sub_lm(&request, store, memory, sub_lm_timeout),
                    );
                    let reply = tokio::select! {
                        _ = self.cancel.cancelled() => return Err(RecursiveRunError::Cancelled),
                        served = served => served.unwrap_or_else(|_| {
                            warn!("sub_lm for \"{}\" outlasted {:?}", request.query, sub_lm_timeout);
                            Err(SubLmError::Timeout(sub_lm_timeout))
                        }),
                    };
                    // The script may already have given up waiting.
                    let _ = request.reply.send(reply);
                }
                _ = self.cancel.cancelled() => return Err(RecursiveRunError::Cancelled),
            }
        };

        let result = joined.map_err(|e| {
            SandboxError::Runtime(format!("sandbox thread did not finish: {}", e))
        })?;
        if let Some(fatal) = bridge.take_fatal() {
            warn!("Sandbox run failed inside sub_lm: {}", fatal);
            return Err(SandboxError::from(fatal).into());
        }
        let output = result?;
        Ok((output, bridge.take_deferred()))
    }

    async fn serve_sub_lm(
        &self,
        request: &SubLmRequest,
        store: &DocumentStore,
        memory: Option<&str>,
        timeout: std::time::Duration,
    ) -> Result<String, SubLmError> {
        let child_depth = request.depth + 1;
        if should_use_repl(&request.query) && child_depth < self.max_depth {
            debug!("Serving sub_lm with a nested sandbox at depth {}", child_depth);
            match self
                .run_at_depth(&request.query, store, memory, child_depth)
                .await
            {
                Ok(outcome) => return Ok(outcome.answer),
                Err(RecursiveRunError::Cancelled) => {
                    return Err(SubLmError::Failed("cancelled".to_string()));
                }
                Err(e) => warn!("Nested sandbox failed ({}); answering directly", e),
            }
        }
        self.answer_directly(&request.query, &request.context, memory, timeout)
            .await
            .map_err(|e| SubLmError::Failed(e.to_string()))
    }

    async fn answer_directly(
        &self,
        query: &str,
        context: &str,
        memory: Option<&str>,
        timeout: std::time::Duration,
    ) -> Result<String, CompletionError> {
        let system = PromptTemplate::with_memory(&PromptTemplate::sub_query_system(None), memory);
        self.executor
            .execute_single(&system, query, context, timeout)
            .await
    }

    /// Replace deferred placeholders with answers; append the ones the
    /// script did not embed in its final value.
    async fn resolve_deferred(
        &self,
        mut answer: String,
        calls: Vec<DeferredCall>,
        store: &DocumentStore,
        memory: Option<&str>,
        depth: usize,
    ) -> String {
        info!("Resolving {} deferred sub_lm call(s) at depth {}", calls.len(), depth);
        let mut appended = Vec::new();
        for call in calls {
            let nested = if should_use_repl(&call.query) && depth + 1 < self.max_depth {
                self.run_at_depth(&call.query, store, memory, depth + 1)
                    .await
                    .ok()
            } else {
                None
            };
            let resolved = match nested {
                Some(outcome) => Ok(outcome.answer),
                None => {
                    self.answer_directly(&call.query, &call.context, memory, self.params.sub_lm_timeout)
                        .await
                }
            };
            let resolved = resolved.unwrap_or_else(|e| format!("[sub_lm failed: {}]", e));

            let placeholder = DeferredCall::placeholder(call.index);
            if answer.contains(&placeholder) {
                answer = answer.replace(&placeholder, &resolved);
            } else {
                appended.push(format!("{}\n{}", call.query, resolved));
            }
        }
        if !appended.is_empty() {
            if !answer.is_empty() {
                answer.push_str("\n\n");
            }
            answer.push_str(&appended.join("\n\n"));
        }
        answer
    }
}

/// One line per enabled document, shown to the code generator.
fn document_overview(store: &DocumentStore) -> String {
    store
        .enabled_documents()
        .enumerate()
        .map(|(i, doc)| match doc.date {
            Some(date) => format!("agents[{}]: id={}, name={}, date={}", i + 1, doc.id, doc.label(), date),
            None => format!("agents[{}]: id={}, name={}", i + 1, doc.id, doc.label()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
