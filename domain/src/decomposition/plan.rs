//! Decomposition plan produced by the decomposer.

use super::intent::QueryClassification;
use super::strategy::DecompositionStrategy;
use super::sub_query::{SubQuery, SubQueryType};
use crate::document::ScoredAgent;
use serde::{Deserialize, Serialize};

/// A classified query together with the sub-queries that answer it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecompositionPlan {
    /// The original user query
    pub query: String,
    pub classification: QueryClassification,
    pub strategy: DecompositionStrategy,
    pub sub_queries: Vec<SubQuery>,
    /// Documents judged relevant, best first
    pub relevant: Vec<ScoredAgent>,
}

impl DecompositionPlan {
    pub fn get(&self, id: &str) -> Option<&SubQuery> {
        self.sub_queries.iter().find(|q| q.id == id)
    }

    /// Sub-queries of the given type, in plan order.
    pub fn of_type(&self, query_type: SubQueryType) -> impl Iterator<Item = &SubQuery> {
        self.sub_queries
            .iter()
            .filter(move |q| q.query_type == query_type)
    }

    /// Sub-queries with no dependencies.
    pub fn independent(&self) -> impl Iterator<Item = &SubQuery> {
        self.sub_queries.iter().filter(|q| !q.has_dependencies())
    }

    /// Sub-queries that wait on others (reduce, follow-up).
    pub fn dependent(&self) -> impl Iterator<Item = &SubQuery> {
        self.sub_queries.iter().filter(|q| q.has_dependencies())
    }

    /// Every document id referenced by any sub-query, deduplicated, in first-seen order.
    pub fn target_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for id in self.sub_queries.iter().flat_map(|q| &q.target_agent_ids) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }

    /// Whether every target id is in `active_ids`.
    pub fn targets_within(&self, active_ids: &[String]) -> bool {
        self.sub_queries
            .iter()
            .flat_map(|q| &q.target_agent_ids)
            .all(|id| active_ids.contains(id))
    }
}
