//! Query pipeline
//!
//! The session facade: owns the document store, query cache and memory
//! store, and runs each query through the fallback chain.
//!
//! ```text
//! process           cache ─▶ decompose ─▶ execute ─▶ aggregate
//! process_with_repl cache ─▶ sandbox ──(failure)──▶ decompose ─▶ ...
//! ```
//!
//! Cache and memory are written only once a run has fully completed and
//! produced a non-degraded answer.

pub mod types;

pub use types::{
    AnswerTier, PipelineResult, PipelineStats, ProcessMode, ProcessOptions, TierFailure,
};

use crate::config::{ExecutorParams, PipelineConfig};
use crate::ports::completion_client::{CompletionClient, CountingClient};
use crate::ports::conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger};
use crate::ports::progress::{NoProgress, PipelinePhase, PipelineProgress};
use crate::ports::sandbox_runtime::SandboxRuntime;
use crate::use_cases::aggregator::ResponseAggregator;
use crate::use_cases::executor::{ExecutionContext, SubQueryExecutor};
use crate::use_cases::recursive::RecursiveExecutor;
use agora_domain::{
    AgentDocument, CacheKey, DocumentStore, DomainError, ExecutionSummary, MemoryContext,
    MemoryStore, QueryCache, QueryDecomposer, QueryOptions, QueryClassifier,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One conversation session over a set of documents
pub struct Pipeline {
    config: PipelineConfig,
    store: DocumentStore,
    decomposer: QueryDecomposer,
    cache: QueryCache<PipelineResult>,
    memory: MemoryStore,
    stats: PipelineStats,
    sandbox: Option<Arc<dyn SandboxRuntime>>,
    logger: Arc<dyn ConversationLogger>,
    progress: Arc<dyn PipelineProgress>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let decomposer = QueryDecomposer::new(config.decomposer.clone());
        let cache = QueryCache::new(config.cache.capacity, config.cache.ttl);
        let memory = MemoryStore::new(config.memory.memory_config());
        Self {
            config,
            store: DocumentStore::new(),
            decomposer,
            cache,
            memory,
            stats: PipelineStats::default(),
            sandbox: None,
            logger: Arc::new(NoConversationLogger),
            progress: Arc::new(NoProgress),
            cancel: CancellationToken::new(),
        }
    }

    /// Enable the sandboxed path.
    pub fn with_sandbox(mut self, runtime: Arc<dyn SandboxRuntime>) -> Self {
        self.sandbox = Some(runtime);
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn PipelineProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Replace the query classifier used for decomposition and routing.
    pub fn with_classifier(mut self, classifier: Box<dyn QueryClassifier>) -> Self {
        self.decomposer = self.decomposer.with_classifier(classifier);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Replace the loaded documents. Returns the number of active ones.
    ///
    /// The query cache is invalidated; memory is kept.
    pub fn load_agents(&mut self, docs: Vec<AgentDocument>) -> Result<usize, DomainError> {
        self.store.load(docs)?;
        let dropped = self.cache.invalidate_all();
        let active = self.store.active_ids().len();
        info!(
            "Loaded {} documents ({} active), dropped {} cached results",
            self.store.len(),
            active,
            dropped
        );
        Ok(active)
    }

    // ==================== Routing ====================

    /// Whether `query` should go through decomposition. `auto = false` forces it.
    pub fn should_use_rlm(&self, query: &str, auto: bool) -> bool {
        if !auto {
            return true;
        }
        let classification = self.decomposer.classifier().classify(query);
        let config = self.decomposer.config();
        let relevant = self
            .store
            .query_agents(
                query,
                QueryOptions::default()
                    .with_max_results(config.max_relevant)
                    .with_min_score(config.min_relevance),
            )
            .len();
        agora_domain::should_use_rlm(&classification, self.store.active_ids().len(), relevant)
    }

    /// Whether `query` should go through the sandbox. `auto = false` forces
    /// it; never true when no sandbox is available.
    pub fn should_use_repl(&self, query: &str, auto: bool) -> bool {
        if !self.sandbox_available() {
            return false;
        }
        !auto || agora_domain::should_use_repl(query)
    }

    fn sandbox_available(&self) -> bool {
        self.sandbox.is_some() && self.config.sandbox.enabled
    }

    // ==================== Processing ====================

    /// Answer `query` through decomposition. Never fails: every failure
    /// ends up in the result's tier and failure list.
    pub async fn process(
        &mut self,
        query: &str,
        client: Arc<dyn CompletionClient>,
        options: &ProcessOptions,
    ) -> PipelineResult {
        let started = Instant::now();
        self.begin(query, ProcessMode::Rlm);

        if let Some(refused) = self.refuse(query, ProcessMode::Rlm) {
            return self.complete(None, refused, started, options, None);
        }
        let key = CacheKey::new(ProcessMode::Rlm.as_str(), &self.store.active_ids(), query);
        if let Some(hit) = self.lookup(&key, options) {
            return self.complete(None, hit, started, options, None);
        }

        let memory = self.memory_preamble(query);
        let preamble = memory.as_ref().map(|m| m.text.as_str());
        let counting = Arc::new(CountingClient::new(client));
        let mut result = self
            .run_decomposition(query, counting.clone(), preamble, ProcessMode::Rlm)
            .await;
        result.completion_calls = counting.calls();
        self.complete(Some(key), result, started, options, memory.as_ref())
    }

    /// Answer `query` with generated code, falling back to [`process`](Self::process)'s
    /// decomposition path when the sandbox is unavailable or fails.
    pub async fn process_with_repl(
        &mut self,
        query: &str,
        client: Arc<dyn CompletionClient>,
        options: &ProcessOptions,
    ) -> PipelineResult {
        let started = Instant::now();
        self.begin(query, ProcessMode::Repl);

        if let Some(refused) = self.refuse(query, ProcessMode::Repl) {
            return self.complete(None, refused, started, options, None);
        }
        let key = CacheKey::new(ProcessMode::Repl.as_str(), &self.store.active_ids(), query);
        if let Some(hit) = self.lookup(&key, options) {
            return self.complete(None, hit, started, options, None);
        }

        let memory = self.memory_preamble(query);
        let preamble = memory.as_ref().map(|m| m.text.as_str());
        let counting = Arc::new(CountingClient::new(client));

        let runtime = match &self.sandbox {
            Some(runtime) if self.config.sandbox.enabled => Arc::clone(runtime),
            _ => {
                debug!("Sandbox unavailable; using decomposition");
                let mut result = self
                    .run_decomposition(query, counting.clone(), preamble, ProcessMode::Repl)
                    .await;
                result
                    .failures
                    .insert(0, TierFailure::new(AnswerTier::Sandbox, "sandbox disabled"));
                result.completion_calls = counting.calls();
                return self.complete(Some(key), result, started, options, memory.as_ref());
            }
        };

        self.stats.sandbox_runs += 1;
        self.progress.on_phase_start(PipelinePhase::Sandbox, 1);
        let executor = SubQueryExecutor::new(counting.clone(), self.executor_params())
            .with_logger(Arc::clone(&self.logger))
            .with_cancellation(self.cancel.clone());
        let recursive =
            RecursiveExecutor::new(runtime, Arc::new(executor), self.config.sandbox.clone())
                .with_logger(Arc::clone(&self.logger))
                .with_cancellation(self.cancel.clone());
        let run = recursive.run(query, &self.store, preamble).await;
        self.progress.on_phase_complete(PipelinePhase::Sandbox);

        let mut result = match run {
            Ok(outcome) => {
                self.stats.sandbox_successes += 1;
                info!(
                    "Sandbox answered after {} attempt(s) with {} sub_lm call(s)",
                    outcome.attempts,
                    outcome.sub_lm_calls + outcome.deferred_calls
                );
                let mut result = PipelineResult::new(query, ProcessMode::Repl);
                result.answer = outcome.answer;
                result.tier = AnswerTier::Sandbox;
                result.agent_ids = self.store.active_ids();
                result.sources = result
                    .agent_ids
                    .iter()
                    .map(|id| self.store.label(id))
                    .collect();
                result
            }
            Err(e) => {
                warn!("Sandbox run failed ({}); falling back to decomposition", e);
                self.stats.sandbox_fallbacks += 1;
                let mut result = self
                    .run_decomposition(query, counting.clone(), preamble, ProcessMode::Repl)
                    .await;
                result
                    .failures
                    .insert(0, TierFailure::new(AnswerTier::Sandbox, e.to_string()));
                result
            }
        };
        result.completion_calls = counting.calls();
        self.complete(Some(key), result, started, options, memory.as_ref())
    }

    fn begin(&mut self, query: &str, mode: ProcessMode) {
        self.stats.queries += 1;
        self.logger.log(ConversationEvent::new(
            "pipeline_started",
            json!({
                "query": query,
                "mode": mode.as_str(),
                "active_documents": self.store.active_ids().len(),
            }),
        ));
    }

    /// A degraded result when the run cannot start at all.
    fn refuse(&self, query: &str, mode: ProcessMode) -> Option<PipelineResult> {
        if self.cancel.is_cancelled() {
            return Some(PipelineResult::degraded(query, mode, "pipeline terminated"));
        }
        if query.trim().is_empty() {
            return Some(PipelineResult::degraded(query, mode, "query is empty"));
        }
        if self.store.active_ids().is_empty() {
            return Some(PipelineResult::degraded(query, mode, "no documents loaded"));
        }
        None
    }

    fn lookup(&mut self, key: &CacheKey, options: &ProcessOptions) -> Option<PipelineResult> {
        if !self.config.cache.enabled || options.bypass_cache {
            return None;
        }
        if let Some(mut hit) = self.cache.get(key) {
            debug!("Cache hit for {}", key);
            self.stats.cache_hits += 1;
            hit.cached = true;
            hit.tier = AnswerTier::Cache;
            hit.completion_calls = 0;
            return Some(hit);
        }
        if self.config.cache.fuzzy_enabled
            && let Some(fuzzy) = self.cache.get_fuzzy(key, self.config.cache.fuzzy_threshold)
        {
            debug!(
                "Fuzzy cache hit ({:.2}) on \"{}\"",
                fuzzy.similarity, fuzzy.matched_query
            );
            self.stats.fuzzy_cache_hits += 1;
            let mut hit = fuzzy.value;
            hit.cached = true;
            hit.tier = AnswerTier::FuzzyCache;
            hit.similarity = Some(fuzzy.similarity);
            hit.completion_calls = 0;
            return Some(hit);
        }
        self.stats.cache_misses += 1;
        None
    }

    fn memory_preamble(&self, query: &str) -> Option<MemoryContext> {
        if !self.config.memory.enabled {
            return None;
        }
        let preamble = self.memory.render_context(query, Utc::now());
        if let Some(context) = &preamble {
            debug!(
                "Memory preamble of {} chars recalling {} slices",
                context.text.len(),
                context.slice_ids.len()
            );
        }
        preamble
    }

    /// Executor parameters with the aggregator's conflict thresholds, so
    /// debate tensions and final conflicts agree.
    fn executor_params(&self) -> ExecutorParams {
        self.config
            .executor
            .clone()
            .with_conflict(self.config.aggregator.conflict_config())
    }

    /// Decompose, execute and aggregate.
    async fn run_decomposition(
        &self,
        query: &str,
        client: Arc<dyn CompletionClient>,
        memory: Option<&str>,
        mode: ProcessMode,
    ) -> PipelineResult {
        self.progress.on_phase_start(PipelinePhase::Decompose, 1);
        let plan = match self.decomposer.decompose(query, &self.store) {
            Ok(plan) => plan,
            Err(e) => {
                warn!("Decomposition failed: {}", e);
                self.progress.on_phase_complete(PipelinePhase::Decompose);
                return PipelineResult::degraded(query, mode, e.to_string());
            }
        };
        self.progress.on_phase_complete(PipelinePhase::Decompose);
        info!(
            "Query classified as {} / {}; strategy {} with {} sub-queries",
            plan.classification.intent,
            plan.classification.complexity,
            plan.strategy,
            plan.sub_queries.len()
        );

        let mut result = PipelineResult::new(query, mode);
        result.strategy = Some(plan.strategy);
        result.intent = Some(plan.classification.intent);
        result.sub_queries = plan.sub_queries.len();

        let executor = SubQueryExecutor::new(Arc::clone(&client), self.executor_params())
            .with_logger(Arc::clone(&self.logger))
            .with_cancellation(self.cancel.clone());
        let ctx = ExecutionContext::new(&self.store)
            .with_memory(memory)
            .with_progress(self.progress.as_ref());
        let outcome = match executor.execute(&plan, &ctx).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Execution failed: {}", e);
                let mut degraded = PipelineResult::degraded(query, mode, e.to_string());
                degraded.strategy = result.strategy;
                degraded.intent = result.intent;
                degraded.sub_queries = result.sub_queries;
                return degraded;
            }
        };
        result.execution = ExecutionSummary::of(&outcome.results);

        self.progress.on_phase_start(PipelinePhase::Aggregate, 1);
        let aggregator = ResponseAggregator::new(client, self.config.aggregator.clone())
            .with_logger(Arc::clone(&self.logger))
            .with_cancellation(self.cancel.clone());
        let aggregated = aggregator
            .aggregate(query, plan.classification.intent, &outcome.results, memory)
            .await;
        self.progress.on_phase_complete(PipelinePhase::Aggregate);

        let mut agent_ids: Vec<String> = Vec::new();
        for id in outcome.successful().flat_map(|r| r.target_agent_ids.iter()) {
            if !agent_ids.contains(id) {
                agent_ids.push(id.clone());
            }
        }

        result.answer = aggregated.answer;
        result.tier = aggregated.tier;
        result.conflicts = aggregated.conflicts;
        result.failures = aggregated.failures;
        result.sources = aggregated.sources;
        result.agent_ids = agent_ids;
        result
    }

    /// Record stats, then cache and remember non-degraded fresh results.
    ///
    /// Slices recalled into `memory` are marked as retrieved only here.
    fn complete(
        &mut self,
        key: Option<CacheKey>,
        mut result: PipelineResult,
        started: Instant,
        options: &ProcessOptions,
        memory: Option<&MemoryContext>,
    ) -> PipelineResult {
        result.elapsed = started.elapsed();
        self.stats.completion_calls += result.completion_calls;
        if result.tier.is_degraded() {
            self.stats.degraded += 1;
        }
        if result
            .failures
            .iter()
            .any(|f| f.tier == AnswerTier::Synthesized)
        {
            self.stats.synthesis_fallbacks += 1;
        }

        if let Some(key) = key
            && !result.tier.is_degraded()
        {
            if self.config.cache.enabled {
                self.cache.set(key, result.clone(), options.cache_ttl);
            }
            if self.config.memory.enabled {
                let now = Utc::now();
                if let Some(recalled) = memory {
                    self.memory.mark_retrieved(&recalled.slice_ids, now);
                }
                let added = self.memory.ingest(&result.answer, &result.agent_ids, now);
                self.memory.record_turn(&result.query, &result.answer);
                debug!("Stored {} memory slices", added);
            }
        }

        self.logger.log(ConversationEvent::new(
            "pipeline_completed",
            json!({
                "query": result.query,
                "mode": result.mode.as_str(),
                "tier": result.tier.as_str(),
                "cached": result.cached,
                "completion_calls": result.completion_calls,
                "elapsed_ms": result.elapsed.as_millis() as u64,
                "failures": result.failures,
            }),
        ));
        info!(
            "Answered via {} in {:?} ({} completion calls)",
            result.tier, result.elapsed, result.completion_calls
        );
        result
    }

    // ==================== Lifecycle ====================

    pub fn get_stats(&self) -> PipelineStats {
        PipelineStats {
            memory_slices: self.memory.len(),
            active_documents: self.store.active_ids().len(),
            cache: self.cache.stats(),
            ..self.stats.clone()
        }
    }

    /// Drop prompts cached past their TTL. Returns how many were removed.
    pub fn prune_cache(&mut self) -> usize {
        self.cache.prune_expired()
    }

    /// Clear cache, memory and stats; keeps documents and revives a
    /// terminated pipeline.
    pub fn reset(&mut self) {
        self.cache.reset();
        self.memory.clear();
        self.stats = PipelineStats::default();
        self.cancel = CancellationToken::new();
        info!("Pipeline reset");
    }

    /// Token cancelled by [`terminate`](Self::terminate).
    ///
    /// A clone stays usable while a run holds `&mut self`; cancelling it stops
    /// that run. [`reset`](Self::reset) installs a fresh token, so fetch it
    /// again afterwards.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel in-flight work; later runs return degraded results until
    /// [`reset`](Self::reset).
    pub fn terminate(&self) {
        self.cancel.cancel();
        info!("Pipeline terminated");
    }

    pub fn is_terminated(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
