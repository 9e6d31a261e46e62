use crate::decomposition::{Perspective, SubQuery, SubQueryStatus, SubQueryType};
use serde::{Deserialize, Serialize};

/// Outcome of one sub-query.
///
/// Created once when the sub-query reaches a terminal status and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub query_id: String,
    pub query_type: SubQueryType,
    /// `None` when the sub-query failed
    pub response: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub perspective: Option<Perspective>,
    /// Human-readable source used for attribution (document names or phase)
    pub source: String,
    pub target_agent_ids: Vec<String>,
    pub depends_on: Vec<String>,
    /// Number of calls made, including retries
    pub attempts: u32,
    pub status: SubQueryStatus,
}

impl ExecutionResult {
    pub fn succeeded(sub_query: &SubQuery, source: impl Into<String>, response: String, attempts: u32) -> Self {
        Self {
            query_id: sub_query.id.clone(),
            query_type: sub_query.query_type,
            response: Some(response),
            success: true,
            error: None,
            perspective: sub_query.perspective,
            source: source.into(),
            target_agent_ids: sub_query.target_agent_ids.clone(),
            depends_on: sub_query.depends_on.clone(),
            attempts,
            status: SubQueryStatus::Succeeded,
        }
    }

    pub fn failed(sub_query: &SubQuery, source: impl Into<String>, error: impl Into<String>, attempts: u32) -> Self {
        Self {
            query_id: sub_query.id.clone(),
            query_type: sub_query.query_type,
            response: None,
            success: false,
            error: Some(error.into()),
            perspective: sub_query.perspective,
            source: source.into(),
            target_agent_ids: sub_query.target_agent_ids.clone(),
            depends_on: sub_query.depends_on.clone(),
            attempts,
            status: SubQueryStatus::FailedFinal,
        }
    }

    /// Non-empty response text of a successful result.
    pub fn text(&self) -> Option<&str> {
        if !self.success {
            return None;
        }
        self.response
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// Counts over a set of results, reported in pipeline metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub retries: u32,
}

impl ExecutionSummary {
    pub fn of(results: &[ExecutionResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            retries: results.iter().map(|r| r.attempts.saturating_sub(1)).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ContextLevel;

    fn map_query() -> SubQuery {
        SubQuery::new(
            "map-1",
            SubQueryType::Map,
            Some("List risks".into()),
            vec!["m1".into()],
            ContextLevel::Summary,
        )
    }

    #[test]
    fn test_text_ignores_blank_and_failed() {
        let q = map_query();
        assert_eq!(
            ExecutionResult::succeeded(&q, "Kickoff", " risks ".into(), 1).text(),
            Some("risks")
        );
        assert_eq!(ExecutionResult::succeeded(&q, "Kickoff", "  ".into(), 1).text(), None);
        assert_eq!(ExecutionResult::failed(&q, "Kickoff", "timeout", 3).text(), None);
    }

    #[test]
    fn test_summary_counts_retries() {
        let q = map_query();
        let results = vec![
            ExecutionResult::succeeded(&q, "a", "x".into(), 2),
            ExecutionResult::failed(&q, "b", "timeout", 3),
        ];
        let summary = ExecutionSummary::of(&results);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.retries, 3);
    }
}
