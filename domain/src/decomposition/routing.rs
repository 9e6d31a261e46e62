//! Routing heuristics: when to decompose, when to go through the sandbox.

use super::intent::{QueryClassification, QueryComplexity, QueryIntent};
use crate::sandbox::ReplQueryKind;

/// Whether a query benefits from multi-document decomposition.
///
/// Single-document sessions never do. Otherwise any non-factual intent, any
/// non-simple complexity, or a spread of relevant documents routes through
/// decomposition. A query that matched no document at all is ambiguous and
/// is decomposed too when several documents are loaded.
pub fn should_use_rlm(
    classification: &QueryClassification,
    active_documents: usize,
    relevant_documents: usize,
) -> bool {
    if active_documents <= 1 {
        return false;
    }
    if classification.intent != QueryIntent::Factual
        || classification.complexity != QueryComplexity::Simple
    {
        return true;
    }
    relevant_documents > 2 || (relevant_documents == 0 && active_documents > 2)
}

/// Whether a query looks procedural (search/list/count/filter/sort/aggregate).
pub fn should_use_repl(query: &str) -> bool {
    ReplQueryKind::detect(query).is_some()
}
