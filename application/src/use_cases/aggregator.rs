//! Response aggregator
//!
//! Turns executor results into one answer. Tiers are tried in order:
//!
//! 1. A successful reduce result is returned as is
//! 2. No successful result at all is a degraded answer
//! 3. A single successful result is returned verbatim
//! 4. Near-duplicate results skip synthesis and are merged
//! 5. Otherwise a synthesis call, told about detected conflicts; if it
//!    fails the results are merged

use crate::config::AggregatorParams;
use crate::ports::completion_client::CompletionClient;
use crate::ports::conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger};
use crate::use_cases::executor::retry::call_once;
use crate::use_cases::pipeline::types::{AnswerTier, TierFailure};
use agora_domain::{
    Conflict, ConflictDetector, ExecutionResult, PromptTemplate, QueryIntent, SubQueryType,
    is_near_duplicate_set, simple_merge,
};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Aggregated answer with the tier that produced it.
#[derive(Debug, Clone)]
pub struct AggregationOutcome {
    pub answer: String,
    pub tier: AnswerTier,
    pub conflicts: Vec<Conflict>,
    pub failures: Vec<TierFailure>,
    pub sources: Vec<String>,
}

impl AggregationOutcome {
    fn new(answer: String, tier: AnswerTier, sources: Vec<String>) -> Self {
        Self {
            answer,
            tier,
            conflicts: Vec::new(),
            failures: Vec::new(),
            sources,
        }
    }
}

/// Use case for aggregating sub-query results
pub struct ResponseAggregator {
    client: Arc<dyn CompletionClient>,
    params: AggregatorParams,
    logger: Arc<dyn ConversationLogger>,
    cancel: CancellationToken,
}

impl ResponseAggregator {
    pub fn new(client: Arc<dyn CompletionClient>, params: AggregatorParams) -> Self {
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

    pub async fn aggregate(
        &self,
        query: &str,
        intent: QueryIntent,
        results: &[ExecutionResult],
        memory: Option<&str>,
    ) -> AggregationOutcome {
        let outcome = self.aggregate_inner(query, intent, results, memory).await;
        info!(
            "Aggregated {} results via {} ({} conflicts)",
            results.len(),
            outcome.tier,
            outcome.conflicts.len()
        );
        self.logger.log(ConversationEvent::new(
            "aggregation_completed",
            json!({
                "tier": outcome.tier.as_str(),
                "results": results.len(),
                "sources": outcome.sources,
                "conflicts": outcome.conflicts.len(),
                "failures": outcome.failures.iter().map(|f| f.reason.as_str()).collect::<Vec<_>>(),
            }),
        ));
        outcome
    }

    async fn aggregate_inner(
        &self,
        query: &str,
        intent: QueryIntent,
        results: &[ExecutionResult],
        memory: Option<&str>,
    ) -> AggregationOutcome {
        let mut failures = Vec::new();

        if let Some(reduce) = results
            .iter()
            .rev()
            .find(|r| r.query_type == SubQueryType::Reduce)
        {
            match reduce.text() {
                Some(text) => {
                    return AggregationOutcome::new(
                        text.to_string(),
                        AnswerTier::Reduce,
                        vec![reduce.source.clone()],
                    );
                }
                None => {
                    let reason = reduce.error.clone().unwrap_or_else(|| "empty reduce answer".into());
                    warn!("Reduce produced nothing ({}); aggregating map results", reason);
                    failures.push(TierFailure::new(AnswerTier::Reduce, reason));
                }
            }
        }

        let answers: Vec<(String, String)> = results
            .iter()
            .filter(|r| !matches!(r.query_type, SubQueryType::Reduce | SubQueryType::Debate))
            .filter_map(|r| Some((r.source.clone(), r.text()?.to_string())))
            .collect();
        let sources: Vec<String> = answers.iter().map(|(s, _)| s.clone()).collect();

        let mut outcome = match answers.len() {
            0 => {
                let errors: Vec<String> = results.iter().filter_map(|r| r.error.clone()).collect();
                let reason = if errors.is_empty() {
                    "no sub-query produced an answer".to_string()
                } else {
                    format!("all {} sub-queries failed ({})", results.len(), errors[0])
                };
                failures.push(TierFailure::new(AnswerTier::Degraded, reason.clone()));
                AggregationOutcome::new(
                    format!("I could not produce an answer: {}", reason),
                    AnswerTier::Degraded,
                    sources,
                )
            }
            1 => AggregationOutcome::new(answers[0].1.clone(), AnswerTier::Direct, sources),
            _ => self.synthesize_or_merge(query, intent, &answers, memory, &mut failures).await,
        };
        outcome.failures.splice(0..0, failures);
        outcome
    }

    async fn synthesize_or_merge(
        &self,
        query: &str,
        intent: QueryIntent,
        answers: &[(String, String)],
        memory: Option<&str>,
        failures: &mut Vec<TierFailure>,
    ) -> AggregationOutcome {
        let sources: Vec<String> = answers.iter().map(|(s, _)| s.clone()).collect();
        let texts: Vec<&str> = answers.iter().map(|(_, t)| t.as_str()).collect();

        if is_near_duplicate_set(
            &texts,
            self.params.early_stop_similarity,
            self.params.early_stop_min_results,
        ) {
            debug!("Results are near-duplicates; skipping synthesis");
            return self.merge(answers, sources);
        }

        let detector = ConflictDetector::new(self.params.conflict_config());
        let conflicts = detector.detect(answers);
        let summary = detector.summarize(&conflicts, answers);
        if !conflicts.is_empty() {
            info!("Detected {} conflicting result pair(s)", conflicts.len());
        }

        let system = PromptTemplate::with_memory(&PromptTemplate::synthesis_system(intent), memory);
        let user = PromptTemplate::synthesis_prompt(query, answers, summary.as_deref());
        let synthesized = call_once(
            self.client.as_ref(),
            &self.cancel,
            &system,
            &user,
            "",
            self.params.synthesis_timeout,
        )
        .await;

        let mut outcome = match synthesized {
            Ok(answer) => AggregationOutcome::new(answer, AnswerTier::Synthesized, sources),
            Err(e) => {
                warn!("Synthesis failed: {}; falling back to simple merge", e);
                failures.push(TierFailure::new(AnswerTier::Synthesized, e.to_string()));
                self.merge(answers, sources)
            }
        };
        outcome.conflicts = conflicts;
        outcome
    }

    fn merge(&self, answers: &[(String, String)], sources: Vec<String>) -> AggregationOutcome {
        let merged = simple_merge(answers, &self.params.merge_config());
        if merged.collapsed > 0 || merged.truncated {
            debug!(
                "Simple merge collapsed {} answer(s), truncated: {}",
                merged.collapsed, merged.truncated
            );
        }
        AggregationOutcome::new(merged.text, AnswerTier::SimpleMerge, sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::testing::{RoutedClient, Scripted};
    use agora_domain::{ContextLevel, SubQuery};

    fn result(id: &str, query_type: SubQueryType, source: &str, text: Option<&str>) -> ExecutionResult {
        let sq = SubQuery::new(id, query_type, None, vec![], ContextLevel::Summary);
        match text {
            Some(t) => ExecutionResult::succeeded(&sq, source, t.to_string(), 1),
            None => ExecutionResult::failed(&sq, source, "boom", 3),
        }
    }

    fn aggregator(client: Arc<RoutedClient>) -> ResponseAggregator {
        ResponseAggregator::new(client, AggregatorParams::default())
    }

    #[tokio::test]
    async fn test_reduce_result_wins() {
        let client = Arc::new(RoutedClient::new("synth"));
        let results = vec![
            result("map-1", SubQueryType::Map, "A", Some("alpha")),
            result("reduce", SubQueryType::Reduce, "reduce", Some("combined")),
        ];
        let out = aggregator(client.clone())
            .aggregate("q", QueryIntent::Aggregative, &results, None)
            .await;
        assert_eq!(out.tier, AnswerTier::Reduce);
        assert_eq!(out.answer, "combined");
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_single_result_is_verbatim() {
        let client = Arc::new(RoutedClient::new("synth"));
        let results = vec![
            result("p1", SubQueryType::Direct, "A", Some("the answer")),
            result("p2", SubQueryType::Direct, "B", None),
        ];
        let out = aggregator(client.clone())
            .aggregate("q", QueryIntent::Factual, &results, None)
            .await;
        assert_eq!(out.tier, AnswerTier::Direct);
        assert_eq!(out.answer, "the answer");
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_all_failed_is_degraded() {
        let results = vec![result("p1", SubQueryType::Direct, "A", None)];
        let out = aggregator(Arc::new(RoutedClient::new("x")))
            .aggregate("q", QueryIntent::Factual, &results, None)
            .await;
        assert_eq!(out.tier, AnswerTier::Degraded);
        assert!(out.answer.contains("boom"));
    }

    #[tokio::test]
    async fn test_near_duplicates_skip_synthesis() {
        let client = Arc::new(RoutedClient::new("synth"));
        let results = vec![
            result("p1", SubQueryType::Direct, "A", Some("The beta ships in March with pricing unchanged")),
            result("p2", SubQueryType::Direct, "B", Some("The beta ships in March with pricing unchanged.")),
        ];
        let out = aggregator(client.clone())
            .aggregate("q", QueryIntent::Factual, &results, None)
            .await;
        assert_eq!(out.tier, AnswerTier::SimpleMerge);
        assert!(out.answer.starts_with("**A, B**"));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_conflicts_reach_synthesis_prompt() {
        let client = Arc::new(RoutedClient::new("balanced answer"));
        let results = vec![
            result("p1", SubQueryType::Direct, "Kickoff", Some("The launch is on track and the team agrees it confirms the plan.")),
            result("p2", SubQueryType::Direct, "Review", Some("However the vendor risk is serious, we disagree with the schedule and expect delays.")),
        ];
        let out = aggregator(client.clone())
            .aggregate("Is the launch on track?", QueryIntent::Analytical, &results, None)
            .await;
        assert_eq!(out.tier, AnswerTier::Synthesized);
        assert_eq!(out.conflicts.len(), 1);
        let call = client.calls().pop().unwrap();
        assert!(call.user.contains("Detected disagreements"));
    }

    #[tokio::test]
    async fn test_synthesis_failure_falls_back_to_merge() {
        let client = Arc::new(
            RoutedClient::new("unused").route("synthesize", vec![Scripted::error("overloaded")]),
        );
        let results = vec![
            result("p1", SubQueryType::Direct, "A", Some("Budget was approved for hiring")),
            result("p2", SubQueryType::Direct, "B", Some("Vendor contract renewal moved to May")),
        ];
        let out = aggregator(client)
            .aggregate("q", QueryIntent::Factual, &results, None)
            .await;
        assert_eq!(out.tier, AnswerTier::SimpleMerge);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].tier, AnswerTier::Synthesized);
        assert!(out.answer.contains("**A**"));
        assert!(out.answer.contains("**B**"));
    }

    #[tokio::test]
    async fn test_failed_reduce_is_recorded_and_maps_used() {
        let client = Arc::new(RoutedClient::new("synth"));
        let results = vec![
            result("map-1", SubQueryType::Map, "A", Some("only finding")),
            result("reduce", SubQueryType::Reduce, "reduce", None),
        ];
        let out = aggregator(client)
            .aggregate("q", QueryIntent::Aggregative, &results, None)
            .await;
        assert_eq!(out.tier, AnswerTier::Direct);
        assert_eq!(out.failures[0].tier, AnswerTier::Reduce);
    }
}
