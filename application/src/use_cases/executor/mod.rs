//! Sub-query executor
//!
//! Runs a [`DecompositionPlan`] against the completion service.
//!
//! # Scheduling
//!
//! ```text
//! direct / parallel   ──▶ worker pool
//! map-reduce          ──▶ worker pool (maps) ──▶ reduce
//! map-reduce-debate   ──▶ worker pool (maps) ──▶ debate ──▶ reduce
//! iterative           ──▶ exploratory ──▶ follow-up (only on uncertainty)
//! ```
//!
//! The worker pool is a fixed number of tasks pulling jobs from a shared
//! cursor. Each call is retried with exponential backoff and raced against a
//! timeout. Failures are recorded per sub-query and never abort the batch.
//! Reduce and follow-up sub-queries start only once every dependency is
//! terminal.

pub(crate) mod retry;
pub mod types;

pub use types::{
    DebateOutcome, ExecutionContext, ExecutionOutcome, ExecutorError, StatusChange,
};

use crate::config::ExecutorParams;
use crate::ports::completion_client::{CompletionClient, CompletionError};
use crate::ports::conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger};
use crate::ports::progress::{PipelinePhase, PipelineProgress};
use agora_domain::decomposition::decomposer::has_uncertainty_markers;
use agora_domain::{
    BudgetRequest, ConflictDetector, ContextLevel, DecompositionPlan,
    DecompositionStrategy, ExecutionResult, Perspective, PromptTemplate, SubQuery,
    SubQueryStatus, SubQueryType,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use types::{CallJob, StatusBoard};

/// Use case for executing decomposition plans
pub struct SubQueryExecutor {
    client: Arc<dyn CompletionClient>,
    params: ExecutorParams,
    logger: Arc<dyn ConversationLogger>,
    cancel: CancellationToken,
}

impl SubQueryExecutor {
    pub fn new(client: Arc<dyn CompletionClient>, params: ExecutorParams) -> Self {
        Self {
            client,
            params,
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

    pub fn params(&self) -> &ExecutorParams {
        &self.params
    }

    /// Execute every sub-query of `plan` according to its strategy.
    pub async fn execute(
        &self,
        plan: &DecompositionPlan,
        ctx: &ExecutionContext<'_>,
    ) -> Result<ExecutionOutcome, ExecutorError> {
        if ctx.depth >= self.params.max_depth {
            return Err(ExecutorError::DepthExceeded {
                depth: ctx.depth,
                max: self.params.max_depth,
            });
        }
        if self.cancel.is_cancelled() {
            return Err(ExecutorError::Cancelled);
        }
        if !plan.targets_within(&ctx.store.active_ids()) {
            return Err(ExecutorError::InvalidPlan(
                "plan targets a document that is not active".to_string(),
            ));
        }

        info!(
            "Executing {} plan with {} sub-queries at depth {}",
            plan.strategy,
            plan.sub_queries.len(),
            ctx.depth
        );

        let board = Arc::new(StatusBoard::new(&plan.sub_queries));
        let mut outcome = match plan.strategy {
            DecompositionStrategy::Direct | DecompositionStrategy::Parallel => {
                let jobs = plan
                    .independent()
                    .map(|sq| self.job_for(sq, plan, ctx, self.params.call_timeout))
                    .collect();
                let results = self
                    .run_batch(PipelinePhase::Execute, jobs, &board, ctx.progress)
                    .await;
                ExecutionOutcome::from_results(results)
            }
            DecompositionStrategy::MapReduce | DecompositionStrategy::MapReduceDebate => {
                self.execute_map_reduce(plan, ctx, &board).await
            }
            DecompositionStrategy::Iterative => self.execute_iterative(plan, ctx, &board).await,
        };
        outcome.trace = board.take_trace();
        Ok(outcome)
    }

    /// One completion call without retries, used to answer `sub_lm`.
    pub async fn execute_single(
        &self,
        system: &str,
        user: &str,
        context: &str,
        timeout: Duration,
    ) -> Result<String, CompletionError> {
        retry::call_once(self.client.as_ref(), &self.cancel, system, user, context, timeout).await
    }

    // ==================== Strategies ====================

    async fn execute_map_reduce(
        &self,
        plan: &DecompositionPlan,
        ctx: &ExecutionContext<'_>,
        board: &Arc<StatusBoard>,
    ) -> ExecutionOutcome {
        let jobs = plan
            .of_type(SubQueryType::Map)
            .map(|sq| self.job_for(sq, plan, ctx, self.params.call_timeout))
            .collect();
        let mut results = self
            .run_batch(PipelinePhase::Execute, jobs, board, ctx.progress)
            .await;

        let debate = if plan.strategy == DecompositionStrategy::MapReduceDebate {
            self.run_debate(plan, &results, ctx, board).await
        } else {
            None
        };

        if let Some(reduce) = plan.of_type(SubQueryType::Reduce).next() {
            let reduced = self
                .run_reduce(reduce, &results, debate.as_ref(), ctx, board)
                .await;
            results.push(reduced);
        }

        ExecutionOutcome {
            results,
            debate,
            ..Default::default()
        }
    }

    async fn run_debate(
        &self,
        plan: &DecompositionPlan,
        map_results: &[ExecutionResult],
        ctx: &ExecutionContext<'_>,
        board: &Arc<StatusBoard>,
    ) -> Option<DebateOutcome> {
        let mut by_perspective: BTreeMap<Perspective, &ExecutionResult> = BTreeMap::new();
        for result in map_results.iter().filter(|r| r.text().is_some()) {
            if let Some(perspective) = result.perspective {
                by_perspective.entry(perspective).or_insert(result);
            }
        }

        if by_perspective.len() < self.params.debate_min_perspectives {
            info!(
                "Skipping debate: {} distinct perspectives, {} required",
                by_perspective.len(),
                self.params.debate_min_perspectives
            );
            return None;
        }

        let system = PromptTemplate::with_memory(PromptTemplate::debate_system(), ctx.memory);
        let mut jobs = Vec::new();
        for pairing in &self.params.debate_pairings {
            let (Some(first), Some(second)) = (
                by_perspective.get(&pairing.first),
                by_perspective.get(&pairing.second),
            ) else {
                debug!("Debate pairing {} has no results on one side", pairing);
                continue;
            };
            let user = PromptTemplate::debate_prompt(
                &plan.query,
                (pairing.first, first.text().unwrap_or_default()),
                (pairing.second, second.text().unwrap_or_default()),
            );
            let mut targets = first.target_agent_ids.clone();
            targets.extend(second.target_agent_ids.iter().cloned());
            let sub_query = SubQuery::new(
                format!("debate-{}", jobs.len() + 1),
                SubQueryType::Debate,
                Some(user.clone()),
                targets,
                ContextLevel::Summary,
            )
            .with_perspective(pairing.first);
            board.register(&sub_query);
            jobs.push(CallJob {
                sub_query,
                system: system.clone(),
                user,
                context: String::new(),
                source: pairing.to_string(),
                timeout: self.params.call_timeout,
            });
        }

        if jobs.is_empty() {
            info!("Skipping debate: no configured pairing is fully present");
            return None;
        }

        info!("Debate phase: {} pairings", jobs.len());
        let answers: Vec<(String, String)> = by_perspective
            .iter()
            .filter_map(|(perspective, r)| Some((perspective.to_string(), r.text()?.to_string())))
            .collect();
        let detector = ConflictDetector::new(self.params.conflict);
        let tensions = detector.detect(&answers);
        let tension_summary = detector.summarize(&tensions, &answers);

        let exchanges = self
            .run_batch(PipelinePhase::Debate, jobs, board, ctx.progress)
            .await;

        Some(DebateOutcome {
            exchanges,
            tensions,
            tension_summary,
        })
    }

    async fn run_reduce(
        &self,
        reduce: &SubQuery,
        map_results: &[ExecutionResult],
        debate: Option<&DebateOutcome>,
        ctx: &ExecutionContext<'_>,
        board: &Arc<StatusBoard>,
    ) -> ExecutionResult {
        if !board.all_terminal(&reduce.depends_on) {
            warn!("Reduce {} has unfinished dependencies; not starting", reduce.id);
            board.set(&reduce.id, SubQueryStatus::FailedFinal);
            return ExecutionResult::failed(reduce, "reduce", "dependencies did not finish", 0);
        }

        let findings: Vec<String> = map_results
            .iter()
            .filter(|r| reduce.depends_on.contains(&r.query_id))
            .filter_map(|r| Some(format!("--- {} ---\n{}", r.source, r.text()?)))
            .collect();
        if findings.is_empty() {
            warn!("No successful map results; reduce {} cannot run", reduce.id);
            board.set(&reduce.id, SubQueryStatus::FailedFinal);
            return ExecutionResult::failed(reduce, "reduce", "no successful map results", 0);
        }

        let mut context = findings.join("\n\n");
        if let Some(section) = debate.and_then(DebateOutcome::render) {
            context.push_str("\n\n");
            context.push_str(&section);
        }

        info!(
            "Reduce phase over {} of {} map results",
            findings.len(),
            reduce.depends_on.len()
        );
        let job = CallJob {
            sub_query: reduce.clone(),
            system: PromptTemplate::with_memory(PromptTemplate::reduce_system(), ctx.memory),
            user: reduce.query.clone().unwrap_or_default(),
            context,
            source: "reduce".to_string(),
            timeout: self.params.reduce_timeout,
        };
        self.run_batch(PipelinePhase::Reduce, vec![job], board, ctx.progress)
            .await
            .pop()
            .unwrap_or_else(|| ExecutionResult::failed(reduce, "reduce", "reduce did not run", 0))
    }

    async fn execute_iterative(
        &self,
        plan: &DecompositionPlan,
        ctx: &ExecutionContext<'_>,
        board: &Arc<StatusBoard>,
    ) -> ExecutionOutcome {
        let jobs = plan
            .of_type(SubQueryType::Exploratory)
            .map(|sq| self.job_for(sq, plan, ctx, self.params.call_timeout))
            .collect();
        let mut results = self
            .run_batch(PipelinePhase::Execute, jobs, board, ctx.progress)
            .await;

        let mut followup_ran = false;
        if let Some(followup) = plan.of_type(SubQueryType::Followup).next() {
            let previous = results
                .iter()
                .filter(|r| followup.depends_on.contains(&r.query_id))
                .find_map(|r| r.text())
                .map(str::to_string);
            match previous {
                Some(answer)
                    if has_uncertainty_markers(&answer)
                        && board.all_terminal(&followup.depends_on) =>
                {
                    info!(
                        "Exploratory answer is uncertain; following up over {} documents",
                        followup.target_agent_ids.len()
                    );
                    let mut generated = followup.clone();
                    generated.query = Some(PromptTemplate::followup_query(&plan.query, &answer));
                    let job = self.job_for(&generated, plan, ctx, self.params.reduce_timeout);
                    results.extend(
                        self.run_batch(PipelinePhase::Followup, vec![job], board, ctx.progress)
                            .await,
                    );
                    followup_ran = true;
                }
                Some(_) => debug!("Exploratory answer is confident; no follow-up"),
                None => warn!("Exploratory sub-query produced no answer; no follow-up"),
            }
        }

        ExecutionOutcome {
            results,
            followup_ran,
            ..Default::default()
        }
    }

    // ==================== Worker pool ====================

    /// Run `jobs` on the worker pool and return results in job order.
    async fn run_batch(
        &self,
        phase: PipelinePhase,
        jobs: Vec<CallJob>,
        board: &Arc<StatusBoard>,
        progress: &dyn PipelineProgress,
    ) -> Vec<ExecutionResult> {
        let total = jobs.len();
        if total == 0 {
            return Vec::new();
        }
        progress.on_phase_start(phase, total);

        let jobs = Arc::new(jobs);
        let cursor = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut join_set = JoinSet::new();
        let workers = self.params.concurrency.max(1).min(total);
        debug!("Phase {}: {} jobs on {} workers", phase, total, workers);

        for _ in 0..workers {
            let jobs = Arc::clone(&jobs);
            let cursor = Arc::clone(&cursor);
            let tx = tx.clone();
            let client = Arc::clone(&self.client);
            let params = self.params.clone();
            let cancel = self.cancel.clone();
            let board = Arc::clone(board);

            join_set.spawn(async move {
                loop {
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(job) = jobs.get(index) else {
                        break;
                    };
                    let result =
                        retry::call_with_retry(client.as_ref(), &params, &cancel, &board, job).await;
                    if tx.send((index, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut slots: Vec<Option<ExecutionResult>> = vec![None; total];
        while let Some((index, result)) = rx.recv().await {
            progress.on_sub_query_complete(phase, &result.query_id, result.success);
            self.logger.log(ConversationEvent::new(
                "subquery_completed",
                json!({
                    "query_id": result.query_id,
                    "query_type": result.query_type.as_str(),
                    "phase": phase.as_str(),
                    "source": result.source,
                    "success": result.success,
                    "attempts": result.attempts,
                    "error": result.error,
                }),
            ));
            slots[index] = Some(result);
        }

        while let Some(joined) = join_set.join_next().await {
            if let Err(e) = joined {
                warn!("Worker join error: {}", e);
            }
        }
        progress.on_phase_complete(phase);

        slots
            .into_iter()
            .zip(jobs.iter())
            .map(|(slot, job)| {
                slot.unwrap_or_else(|| {
                    board.set(&job.sub_query.id, SubQueryStatus::FailedFinal);
                    ExecutionResult::failed(
                        &job.sub_query,
                        job.source.clone(),
                        "worker stopped before finishing",
                        0,
                    )
                })
            })
            .collect()
    }

    // ==================== Job preparation ====================

    fn job_for(
        &self,
        sub_query: &SubQuery,
        plan: &DecompositionPlan,
        ctx: &ExecutionContext<'_>,
        timeout: Duration,
    ) -> CallJob {
        let system = PromptTemplate::with_memory(
            &PromptTemplate::sub_query_system(sub_query.perspective),
            ctx.memory,
        );
        CallJob {
            sub_query: sub_query.clone(),
            system,
            user: sub_query.query.clone().unwrap_or_else(|| plan.query.clone()),
            context: self.context_for(sub_query, plan, ctx),
            source: source_label(sub_query, ctx),
            timeout,
        }
    }

    fn context_for(
        &self,
        sub_query: &SubQuery,
        plan: &DecompositionPlan,
        ctx: &ExecutionContext<'_>,
    ) -> String {
        let Some(budget) = self.params.token_budget else {
            return ctx
                .store
                .render_documents(&sub_query.target_agent_ids, sub_query.context_level);
        };
        let request = BudgetRequest::new()
            .with_candidates(sub_query.target_agent_ids.clone())
            .with_query(plan.query.clone());
        let budgeted = ctx.store.get_context_with_budget(budget, &request);
        info!("Context for {}: {}", sub_query.id, budgeted.describe());
        if !budgeted.skipped.is_empty() {
            warn!(
                "Context for {} dropped {} document(s) over budget: {}",
                sub_query.id,
                budgeted.skipped.len(),
                budgeted.skipped.join(", ")
            );
        }
        budgeted.text
    }
}

/// Attribution label: target document names, or the sub-query type.
fn source_label(sub_query: &SubQuery, ctx: &ExecutionContext<'_>) -> String {
    if sub_query.target_agent_ids.is_empty() {
        return sub_query.query_type.to_string();
    }
    let names: Vec<String> = sub_query
        .target_agent_ids
        .iter()
        .map(|id| ctx.store.label(id))
        .collect();
    match sub_query.perspective {
        Some(perspective) => format!("{} ({})", names.join(", "), perspective),
        None => names.join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::testing::{RoutedClient, Scripted, meetings};
    use agora_domain::core::text::estimate_tokens;
    use agora_domain::{AgentDocument, ConflictConfig, DecomposerConfig, DocumentStore, QueryDecomposer};

    fn fast_params() -> ExecutorParams {
        ExecutorParams::default().with_backoff_base(Duration::from_millis(1))
    }

    fn executor(client: Arc<RoutedClient>) -> SubQueryExecutor {
        SubQueryExecutor::new(client, fast_params())
    }

    #[tokio::test]
    async fn test_depth_ceiling_fails_immediately() {
        let store = meetings(2);
        let plan = QueryDecomposer::default()
            .decompose("What did Meeting 1 decide?", &store)
            .unwrap();
        let client = Arc::new(RoutedClient::new("answer"));
        let ctx = ExecutionContext::new(&store).with_depth(3);
        let err = executor(Arc::clone(&client)).execute(&plan, &ctx).await.unwrap_err();
        assert_eq!(err, ExecutorError::DepthExceeded { depth: 3, max: 3 });
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_parallel_failure_is_not_fatal() {
        let store = meetings(2);
        let plan = QueryDecomposer::default()
            .decompose("Compare the action items between Meeting 1 and Meeting 2", &store)
            .unwrap();
        assert_eq!(plan.strategy, DecompositionStrategy::Parallel);

        let client = Arc::new(
            RoutedClient::new("fine").route(
                "adopt plan 2",
                vec![Scripted::error("boom"), Scripted::error("boom"), Scripted::error("boom")],
            ),
        );
        let outcome = executor(Arc::clone(&client))
            .execute(&plan, &ExecutionContext::new(&store))
            .await
            .unwrap();

        assert_eq!(outcome.results.len(), 2);
        let failed: Vec<_> = outcome.results.iter().filter(|r| !r.success).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].attempts, 3);
        assert_eq!(
            outcome.history_of(&failed[0].query_id),
            vec![
                SubQueryStatus::Executing,
                SubQueryStatus::FailedRetry,
                SubQueryStatus::Executing,
                SubQueryStatus::FailedRetry,
                SubQueryStatus::Executing,
                SubQueryStatus::FailedFinal,
            ]
        );
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let store = meetings(1);
        let plan = QueryDecomposer::default()
            .decompose("What did Meeting 1 decide?", &store)
            .unwrap();
        let client = Arc::new(
            RoutedClient::new("decided").route("Meeting 1", vec![Scripted::error("rate limited")]),
        );
        let outcome = executor(Arc::clone(&client))
            .execute(&plan, &ExecutionContext::new(&store))
            .await
            .unwrap();
        assert!(outcome.results[0].success);
        assert_eq!(outcome.results[0].attempts, 2);
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let store = meetings(1);
        let plan = QueryDecomposer::default()
            .decompose("What did Meeting 1 decide?", &store)
            .unwrap();
        let client = Arc::new(RoutedClient::new("late").route(
            "Meeting 1",
            vec![Scripted::Slow(Duration::from_millis(200), "late".into())],
        ));
        let params = fast_params()
            .with_max_retries(0)
            .with_call_timeout(Duration::from_millis(20));
        let outcome = SubQueryExecutor::new(client, params)
            .execute(&plan, &ExecutionContext::new(&store))
            .await
            .unwrap();
        assert!(!outcome.results[0].success);
        assert!(outcome.results[0].error.as_deref().unwrap().contains("Timed out"));
    }

    #[tokio::test]
    async fn test_map_reduce_waits_for_all_maps() {
        let store = meetings(4);
        let plan = QueryDecomposer::default()
            .decompose("What are all the decisions across every meeting?", &store)
            .unwrap();
        assert_eq!(plan.strategy, DecompositionStrategy::MapReduce);

        let client = Arc::new(
            RoutedClient::new("- a decision")
                .route("combine", vec![Scripted::text("combined decisions")]),
        );
        let outcome = executor(Arc::clone(&client))
            .execute(&plan, &ExecutionContext::new(&store))
            .await
            .unwrap();

        assert_eq!(outcome.results.len(), 5);
        let reduce = outcome.results.last().unwrap();
        assert_eq!(reduce.query_type, SubQueryType::Reduce);
        assert_eq!(reduce.response.as_deref(), Some("combined decisions"));

        // Every map is terminal before the reduce starts executing.
        let reduce_start = outcome
            .trace
            .iter()
            .position(|c| c.query_id == "reduce" && c.to == SubQueryStatus::Executing)
            .unwrap();
        for map_id in ["map-1", "map-2", "map-3", "map-4"] {
            let done = outcome
                .trace
                .iter()
                .position(|c| c.query_id == map_id && c.to.is_terminal())
                .unwrap();
            assert!(done < reduce_start);
        }

        let reduce_call = client
            .calls()
            .into_iter()
            .find(|c| c.user.contains("Combine"))
            .unwrap();
        assert!(reduce_call.context.contains("--- Meeting 1 ---"));
        assert!(reduce_call.context.contains("--- Meeting 4 ---"));
    }

    #[tokio::test]
    async fn test_reduce_fails_without_successful_maps() {
        let store = meetings(3);
        let plan = QueryDecomposer::default()
            .decompose("What are all the decisions across every meeting?", &store)
            .unwrap();
        let client = Arc::new(RoutedClient::new("").route("List all items", vec![]));
        let params = fast_params().with_max_retries(0);
        let outcome = SubQueryExecutor::new(client.clone(), params)
            .execute(&plan, &ExecutionContext::new(&store))
            .await
            .unwrap();
        let reduce = outcome.results.last().unwrap();
        assert!(!reduce.success);
        assert_eq!(
            outcome.history_of("reduce"),
            vec![SubQueryStatus::FailedFinal]
        );
        // Three maps, no reduce call.
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_debate_skipped_below_min_perspectives() {
        let store = meetings(2);
        let config = DecomposerConfig::default()
            .with_debate_enabled(true)
            .with_debate_min_perspectives(2);
        let plan = QueryDecomposer::new(config)
            .decompose("What are all the decisions across every meeting?", &store)
            .unwrap();
        assert_eq!(plan.strategy, DecompositionStrategy::MapReduceDebate);

        let client = Arc::new(RoutedClient::new("finding"));
        let outcome = executor(Arc::clone(&client))
            .execute(&plan, &ExecutionContext::new(&store))
            .await
            .unwrap();
        assert!(outcome.debate.is_none());
        assert!(
            !client
                .calls()
                .iter()
                .any(|c| c.system.contains("moderate a debate"))
        );
    }

    #[tokio::test]
    async fn test_debate_runs_configured_pairings() {
        let store = meetings(5);
        let config = DecomposerConfig::default().with_debate_enabled(true);
        let plan = QueryDecomposer::new(config)
            .decompose("What are all the decisions across every meeting?", &store)
            .unwrap();
        assert_eq!(plan.strategy, DecompositionStrategy::MapReduceDebate);

        let client = Arc::new(
            RoutedClient::new("finding")
                .route("moderate a debate", vec![
                    Scripted::text("agreement on plan"),
                    Scripted::text("tension on budget"),
                    Scripted::text("tension on owners"),
                ]),
        );
        let outcome = executor(Arc::clone(&client))
            .execute(&plan, &ExecutionContext::new(&store))
            .await
            .unwrap();

        let debate = outcome.debate.unwrap();
        assert_eq!(debate.exchanges.len(), 3);
        let reduce_call = client
            .calls()
            .into_iter()
            .find(|c| c.system.contains("combine findings"))
            .unwrap();
        assert!(reduce_call.context.contains("Debate between perspectives"));
    }

    #[tokio::test]
    async fn test_followup_only_on_uncertainty() {
        let store = meetings(3);
        let query = "Explain how the roadmap discussion might influence hiring, budget planning and \
                     vendor selection next year, and which open issues remain unresolved for the \
                     leadership team to settle";
        let plan = QueryDecomposer::default().decompose(query, &store).unwrap();
        assert_eq!(plan.strategy, DecompositionStrategy::Iterative);

        let confident = Arc::new(RoutedClient::new("Hiring grows by two."));
        let outcome = executor(Arc::clone(&confident))
            .execute(&plan, &ExecutionContext::new(&store))
            .await
            .unwrap();
        assert!(!outcome.followup_ran);
        assert_eq!(confident.call_count(), 1);

        let unsure = Arc::new(
            RoutedClient::new("Full answer.")
                .route("Explore", vec![Scripted::text("The budget is unclear.")]),
        );
        let outcome = executor(Arc::clone(&unsure))
            .execute(&plan, &ExecutionContext::new(&store))
            .await
            .unwrap();
        assert!(outcome.followup_ran);
        assert_eq!(outcome.results.len(), 2);
        let followup = unsure.calls().pop().unwrap();
        assert!(followup.user.contains("was uncertain"));
    }

    #[tokio::test]
    async fn test_cancelled_executor_refuses_to_start() {
        let store = meetings(2);
        let plan = QueryDecomposer::default()
            .decompose("What did Meeting 1 decide?", &store)
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = executor(Arc::new(RoutedClient::new("x")))
            .with_cancellation(cancel)
            .execute(&plan, &ExecutionContext::new(&store))
            .await
            .unwrap_err();
        assert_eq!(err, ExecutorError::Cancelled);
    }

    #[tokio::test]
    async fn test_token_budget_limits_context() {
        let docs = (1..=2)
            .map(|i| {
                AgentDocument::new(format!("m{}", i), format!("Meeting {}", i))
                    .with_summary(format!("Meeting {} covered roadmap decisions and budget.", i))
                    .with_key_points([format!("Decision {}: adopt plan {}", i, i)])
                    .with_action_items([format!("Owner {} follows up on plan {}", i, i)])
                    .with_transcript("verbatim remark ".repeat(200))
            })
            .collect();
        let mut store = DocumentStore::new();
        store.load(docs).unwrap();
        let plan = QueryDecomposer::default()
            .decompose("Compare the action items between Meeting 1 and Meeting 2", &store)
            .unwrap();

        let budget = 100;
        let client = Arc::new(RoutedClient::new("ok"));
        let params = fast_params().with_token_budget(Some(budget));
        SubQueryExecutor::new(client.clone(), params)
            .execute(&plan, &ExecutionContext::new(&store))
            .await
            .unwrap();

        let calls = client.calls();
        assert!(!calls.is_empty());
        for call in calls {
            assert!(estimate_tokens(&call.context) <= budget);
            assert!(!call.context.contains("verbatim remark"));
            assert!(!call.context.contains("Transcript:"));
            assert!(call.context.contains("Summary: Meeting"));
        }

        // Unbudgeted sub-queries would have carried the transcripts.
        let full = store.render_documents(&["m1".to_string()], ContextLevel::Full);
        assert!(estimate_tokens(&full) > budget);
    }

    async fn debate_tensions(params: ExecutorParams) -> Vec<agora_domain::Conflict> {
        let store = meetings(5);
        let config = DecomposerConfig::default().with_debate_enabled(true);
        let plan = QueryDecomposer::new(config)
            .decompose("What are all the decisions across every meeting?", &store)
            .unwrap();
        let client = Arc::new(RoutedClient::new("finding").route(
            "perspective of a critic",
            vec![Scripted::text(
                "However the vendor contract is a serious risk and delivery was delayed.",
            )],
        ));
        let outcome = SubQueryExecutor::new(client, params)
            .execute(&plan, &ExecutionContext::new(&store))
            .await
            .unwrap();
        outcome.debate.unwrap().tensions
    }

    #[tokio::test]
    async fn test_debate_tensions_follow_conflict_config() {
        let flagged = debate_tensions(fast_params()).await;
        assert!(flagged.iter().any(|c| c.first_source == "critic" || c.second_source == "critic"));

        let strict = fast_params().with_conflict(ConflictConfig {
            similarity_threshold: 0.0,
        });
        assert!(debate_tensions(strict).await.is_empty());
    }
}
