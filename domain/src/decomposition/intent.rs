//! Query intent and complexity classification.
//!
//! Classification is intentionally heuristic: ordered keyword patterns decide
//! the intent and a few punctuation/conjunction rules decide the complexity.
//! The [`QueryClassifier`] trait keeps the heuristic swappable.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// What the user is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryIntent {
    Factual,
    Comparative,
    Aggregative,
    Analytical,
    Temporal,
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::Factual => "factual",
            QueryIntent::Comparative => "comparative",
            QueryIntent::Aggregative => "aggregative",
            QueryIntent::Analytical => "analytical",
            QueryIntent::Temporal => "temporal",
        }
    }
}

impl fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How much decomposition the query needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryComplexity {
    Simple,
    Comparative,
    Aggregate,
    Exploratory,
}

impl fmt::Display for QueryComplexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryComplexity::Simple => "simple",
            QueryComplexity::Comparative => "comparative",
            QueryComplexity::Aggregate => "aggregate",
            QueryComplexity::Exploratory => "exploratory",
        };
        write!(f, "{}", s)
    }
}

/// Output of a [`QueryClassifier`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryClassification {
    pub intent: QueryIntent,
    pub complexity: QueryComplexity,
    /// The pattern fragment that decided the intent, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<String>,
}

/// Classifies a query into intent and complexity.
pub trait QueryClassifier: Send + Sync {
    fn classify(&self, query: &str) -> QueryClassification;
}

static COMPARATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(compare[sd]?|comparison|comparing|versus|vs\.?|differ(?:s|ence|ences|ent)?|contrast|similarit(?:y|ies)|between\b.+\band)\b",
    )
    .expect("valid comparative pattern")
});

static AGGREGATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(all|every|each|across|list|overall|total|summari[sz]e|combined|collectively)\b",
    )
    .expect("valid aggregative pattern")
});

static TEMPORAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(when|timeline|over time|chronolog\w*|before|after|since|trends?|evolv\w*|progress(?:ed|ion)?|history)\b",
    )
    .expect("valid temporal pattern")
});

static ANALYTICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(why|analy[sz]\w*|impacts?|implications?|evaluate|assess\w*|risks?|caus\w*|how (?:does|did|do|could|would|should))\b",
    )
    .expect("valid analytical pattern")
});

static TEMPORAL_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(over time|trends?|evolv\w*|timeline|across|progress\w*)\b")
        .expect("valid temporal span pattern")
});

static CONJUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(and|or|also|as well as|plus)\b").expect("valid conjunction pattern")
});

/// Word count above which a factual query is treated as exploratory.
const LONG_QUERY_WORDS: usize = 25;

/// Default classifier: ordered keyword patterns, factual when nothing matches.
///
/// Order: comparative, aggregative, temporal, analytical.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    fn intent(query: &str) -> (QueryIntent, Option<String>) {
        let ordered: [(&LazyLock<Regex>, QueryIntent); 4] = [
            (&COMPARATIVE, QueryIntent::Comparative),
            (&AGGREGATIVE, QueryIntent::Aggregative),
            (&TEMPORAL, QueryIntent::Temporal),
            (&ANALYTICAL, QueryIntent::Analytical),
        ];
        for (pattern, intent) in ordered {
            if let Some(m) = pattern.find(query) {
                return (intent, Some(m.as_str().to_lowercase()));
            }
        }
        (QueryIntent::Factual, None)
    }

    fn complexity(query: &str, intent: QueryIntent) -> QueryComplexity {
        match intent {
            QueryIntent::Comparative => QueryComplexity::Comparative,
            QueryIntent::Aggregative => QueryComplexity::Aggregate,
            QueryIntent::Analytical => QueryComplexity::Exploratory,
            QueryIntent::Temporal => {
                if TEMPORAL_SPAN.is_match(query) {
                    QueryComplexity::Aggregate
                } else {
                    QueryComplexity::Simple
                }
            }
            QueryIntent::Factual => {
                let questions = query.matches('?').count();
                let conjunctions = CONJUNCTION.find_iter(query).count();
                let words = query.split_whitespace().count();
                if questions > 1 || conjunctions >= 2 || words > LONG_QUERY_WORDS {
                    QueryComplexity::Exploratory
                } else {
                    QueryComplexity::Simple
                }
            }
        }
    }
}

impl QueryClassifier for KeywordClassifier {
    fn classify(&self, query: &str) -> QueryClassification {
        let (intent, matched) = Self::intent(query);
        QueryClassification {
            intent,
            complexity: Self::complexity(query, intent),
            matched,
        }
    }
}
