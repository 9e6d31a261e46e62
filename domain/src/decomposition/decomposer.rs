//! Query decomposer: classification + strategy selection + sub-query generation.

use super::intent::{KeywordClassifier, QueryClassifier, QueryComplexity};
use super::perspective::Perspective;
use super::plan::DecompositionPlan;
use super::strategy::DecompositionStrategy;
use super::sub_query::{SubQuery, SubQueryType};
use crate::core::error::DomainError;
use crate::core::validation::{ConfigIssue, ConfigIssueCode};
use crate::document::{ContextLevel, DocumentStore, QueryOptions};
use crate::prompt::PromptTemplate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Phrases in an answer that signal the model did not find what it needed.
pub const UNCERTAINTY_MARKERS: &[&str] = &[
    "not sure",
    "unclear",
    "no information",
    "not mentioned",
    "no mention",
    "does not mention",
    "doesn't mention",
    "cannot determine",
    "can't determine",
    "not enough information",
    "insufficient information",
    "not specified",
    "i don't know",
    "unknown",
];

static DEBATE_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(pros and cons|perspectives?|viewpoints?|debate|trade-?offs?|disagree\w*|controvers\w*)\b",
    )
    .expect("valid debate cue pattern")
});

/// Returns `true` if `answer` contains any [`UNCERTAINTY_MARKERS`].
pub fn has_uncertainty_markers(answer: &str) -> bool {
    let lower = answer.to_lowercase();
    UNCERTAINTY_MARKERS.iter().any(|m| lower.contains(m))
}

/// Decomposer tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecomposerConfig {
    /// Maximum documents considered relevant
    pub max_relevant: usize,
    /// Minimum relevance score for a document to count as relevant
    pub min_relevance: f64,
    /// Simple queries touching at most this many documents run as one call
    pub direct_max_documents: usize,
    /// Maximum per-document sub-queries for the parallel strategy
    pub max_parallel: usize,
    /// Maximum map sub-queries in a map-reduce plan
    pub max_map_documents: usize,
    /// Documents read by the exploratory sub-query
    pub exploratory_documents: usize,
    /// Documents read by the follow-up sub-query
    pub followup_documents: usize,
    /// Always use map-reduce-debate for aggregate queries (not only on debate cues)
    pub debate_enabled: bool,
    /// Distinct perspectives required before debate is worthwhile
    pub debate_min_perspectives: usize,
}

impl Default for DecomposerConfig {
    fn default() -> Self {
        Self {
            max_relevant: 10,
            min_relevance: 1.0,
            direct_max_documents: 2,
            max_parallel: 3,
            max_map_documents: 10,
            exploratory_documents: 3,
            followup_documents: 5,
            debate_enabled: false,
            debate_min_perspectives: 3,
        }
    }
}

impl DecomposerConfig {
    pub fn with_debate_enabled(mut self, enabled: bool) -> Self {
        self.debate_enabled = enabled;
        self
    }

    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = max;
        self
    }

    pub fn with_debate_min_perspectives(mut self, min: usize) -> Self {
        self.debate_min_perspectives = min;
        self
    }

    /// Validate, returning human-readable issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.max_parallel == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange,
                "decomposer.max_parallel",
                "must be >= 1",
            ));
        }
        if self.max_map_documents == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange,
                "decomposer.max_map_documents",
                "must be >= 1",
            ));
        }
        if self.debate_min_perspectives < 2 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange,
                "decomposer.debate_min_perspectives",
                "must be >= 2",
            ));
        } else if self.debate_enabled && self.debate_min_perspectives > self.max_map_documents {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::DebateUnreachable,
                "decomposer.debate_min_perspectives",
                format!(
                    "debate needs {} perspectives but at most {} map sub-queries are planned",
                    self.debate_min_perspectives, self.max_map_documents
                ),
            ));
        }
        issues
    }
}

/// Turns a query into a [`DecompositionPlan`].
pub struct QueryDecomposer {
    classifier: Box<dyn QueryClassifier>,
    config: DecomposerConfig,
}

impl Default for QueryDecomposer {
    fn default() -> Self {
        Self::new(DecomposerConfig::default())
    }
}

impl QueryDecomposer {
    pub fn new(config: DecomposerConfig) -> Self {
        Self {
            classifier: Box::new(KeywordClassifier::new()),
            config,
        }
    }

    /// Swap in a different classifier.
    pub fn with_classifier(mut self, classifier: Box<dyn QueryClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &DecomposerConfig {
        &self.config
    }

    pub fn classifier(&self) -> &dyn QueryClassifier {
        self.classifier.as_ref()
    }

    /// Classify `query`, pick a strategy and generate sub-queries.
    ///
    /// Every generated target id is an enabled document of `store`.
    pub fn decompose(
        &self,
        query: &str,
        store: &DocumentStore,
    ) -> Result<DecompositionPlan, DomainError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(DomainError::InvalidQuery("query cannot be empty".to_string()));
        }

        let classification = self.classifier.classify(query);
        let relevant = store.query_agents(
            query,
            QueryOptions::default()
                .with_max_results(self.config.max_relevant)
                .with_min_score(self.config.min_relevance),
        );

        let active = store.active_ids();
        let candidates: Vec<String> = if relevant.is_empty() {
            active.iter().take(self.config.max_relevant).cloned().collect()
        } else {
            relevant.iter().map(|r| r.id.clone()).collect()
        };

        let strategy = self.select_strategy(query, classification.complexity, candidates.len());
        let intent = classification.intent;

        let sub_queries = match strategy {
            DecompositionStrategy::Direct => vec![SubQuery::new(
                "direct-1",
                SubQueryType::Direct,
                Some(PromptTemplate::direct_query(intent, query)),
                candidates.clone(),
                ContextLevel::Standard,
            )],
            DecompositionStrategy::Parallel => candidates
                .iter()
                .take(self.config.max_parallel)
                .enumerate()
                .map(|(i, id)| {
                    SubQuery::new(
                        format!("parallel-{}", i + 1),
                        SubQueryType::Direct,
                        Some(PromptTemplate::per_document_query(intent, query)),
                        vec![id.clone()],
                        ContextLevel::Standard,
                    )
                    .with_priority(i as u32)
                })
                .collect(),
            DecompositionStrategy::MapReduce | DecompositionStrategy::MapReduceDebate => {
                let debate = strategy == DecompositionStrategy::MapReduceDebate;
                let mut maps: Vec<SubQuery> = candidates
                    .iter()
                    .take(self.config.max_map_documents)
                    .enumerate()
                    .map(|(i, id)| {
                        let map = SubQuery::new(
                            format!("map-{}", i + 1),
                            SubQueryType::Map,
                            Some(PromptTemplate::map_query(intent, query)),
                            vec![id.clone()],
                            ContextLevel::Summary,
                        );
                        if debate {
                            map.with_perspective(Perspective::for_index(i))
                        } else {
                            map
                        }
                    })
                    .collect();
                let map_ids = maps.iter().map(|m| m.id.clone()).collect();
                maps.push(
                    SubQuery::new(
                        "reduce",
                        SubQueryType::Reduce,
                        Some(PromptTemplate::reduce_query(intent, query)),
                        Vec::new(),
                        ContextLevel::Summary,
                    )
                    .with_priority(1)
                    .with_depends_on(map_ids),
                );
                maps
            }
            DecompositionStrategy::Iterative => {
                let explore_targets: Vec<String> = candidates
                    .iter()
                    .take(self.config.exploratory_documents)
                    .cloned()
                    .collect();
                let mut expanded = candidates.clone();
                for id in &active {
                    if !expanded.contains(id) {
                        expanded.push(id.clone());
                    }
                }
                expanded.truncate(self.config.followup_documents);

                vec![
                    SubQuery::new(
                        "explore-1",
                        SubQueryType::Exploratory,
                        Some(PromptTemplate::exploratory_query(query)),
                        explore_targets,
                        ContextLevel::Standard,
                    ),
                    SubQuery::new(
                        "followup-1",
                        SubQueryType::Followup,
                        None,
                        expanded,
                        ContextLevel::Full,
                    )
                    .with_priority(1)
                    .with_depends_on(vec!["explore-1".to_string()]),
                ]
            }
        };

        Ok(DecompositionPlan {
            query: query.to_string(),
            classification,
            strategy,
            sub_queries,
            relevant,
        })
    }

    fn select_strategy(
        &self,
        query: &str,
        complexity: QueryComplexity,
        candidate_count: usize,
    ) -> DecompositionStrategy {
        match complexity {
            QueryComplexity::Simple if candidate_count <= self.config.direct_max_documents => {
                DecompositionStrategy::Direct
            }
            QueryComplexity::Comparative => DecompositionStrategy::Parallel,
            QueryComplexity::Aggregate => {
                let wants_debate = self.config.debate_enabled || DEBATE_CUE.is_match(query);
                if wants_debate && candidate_count >= self.config.debate_min_perspectives {
                    DecompositionStrategy::MapReduceDebate
                } else {
                    DecompositionStrategy::MapReduce
                }
            }
            QueryComplexity::Exploratory => DecompositionStrategy::Iterative,
            _ => DecompositionStrategy::Parallel,
        }
    }
}
