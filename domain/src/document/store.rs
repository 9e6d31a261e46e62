//! Document store: indexing, relevance scoring and context rendering.
//!
//! The store owns the loaded [`AgentDocument`]s for a session. Everything else
//! reads through it and never keeps copies beyond a single query.

use super::budget::{BudgetEntry, BudgetRequest, BudgetedContext};
use super::entities::{AgentDocument, ContextLevel};
use crate::core::error::DomainError;
use crate::core::text::{estimate_tokens, keyword_set, keywords};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

const NAME_WEIGHT: f64 = 10.0;
const SUMMARY_WEIGHT: f64 = 5.0;
const POINTS_WEIGHT: f64 = 3.0;
const TRANSCRIPT_WEIGHT: f64 = 1.0;
const GENERIC_WEIGHT: f64 = 0.5;

/// Days over which the recency boost decays linearly to zero.
const RECENCY_WINDOW_DAYS: f64 = 14.0;
/// Boost given to a document dated today.
const RECENCY_WEIGHT: f64 = 2.0;

/// Budgeted assembly stops once fewer than this many tokens remain.
pub const MIN_REMAINING_TOKENS: usize = 50;

/// Options for [`DocumentStore::query_agents`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    pub max_results: usize,
    pub min_score: f64,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            max_results: 5,
            min_score: 1.0,
        }
    }
}

impl QueryOptions {
    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    pub fn with_min_score(mut self, min: f64) -> Self {
        self.min_score = min;
        self
    }
}

/// A document id with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredAgent {
    pub id: String,
    pub score: f64,
}

/// Per-document keyword sets, one per weighted field.
#[derive(Debug, Clone, Default)]
struct KeywordIndex {
    name: HashSet<String>,
    summary: HashSet<String>,
    points: HashSet<String>,
    transcript: HashSet<String>,
    generic: HashSet<String>,
}

impl KeywordIndex {
    fn build(doc: &AgentDocument) -> Self {
        let mut points = HashSet::new();
        for item in doc.key_points.iter().chain(doc.action_items.iter()) {
            points.extend(keywords(item));
        }
        let mut generic = keyword_set(&doc.id);
        if let Some(sentiment) = &doc.sentiment {
            generic.extend(keywords(sentiment));
        }
        Self {
            name: keyword_set(&doc.display_name),
            summary: keyword_set(&doc.summary),
            points,
            transcript: doc
                .transcript
                .as_deref()
                .map(keyword_set)
                .unwrap_or_default(),
            generic,
        }
    }

    fn score(&self, terms: &[String]) -> f64 {
        terms
            .iter()
            .map(|term| {
                let mut hit = 0.0;
                if self.name.contains(term) {
                    hit += NAME_WEIGHT;
                }
                if self.summary.contains(term) {
                    hit += SUMMARY_WEIGHT;
                }
                if self.points.contains(term) {
                    hit += POINTS_WEIGHT;
                }
                if self.transcript.contains(term) {
                    hit += TRANSCRIPT_WEIGHT;
                }
                if self.generic.contains(term) {
                    hit += GENERIC_WEIGHT;
                }
                hit
            })
            .sum()
    }
}

/// Session-scoped store of agent documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    documents: Vec<AgentDocument>,
    index: HashMap<String, KeywordIndex>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the loaded set with `docs`.
    ///
    /// The batch is validated first; on error the previous set is kept.
    pub fn load(&mut self, docs: Vec<AgentDocument>) -> Result<(), DomainError> {
        let mut seen = HashSet::new();
        for doc in &docs {
            doc.validate()?;
            if !seen.insert(doc.id.clone()) {
                return Err(DomainError::DuplicateAgent(doc.id.clone()));
            }
        }

        self.index = docs
            .iter()
            .map(|doc| (doc.id.clone(), KeywordIndex::build(doc)))
            .collect();
        self.documents = docs;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&AgentDocument> {
        self.documents.iter().find(|d| d.id == id)
    }

    /// Enabled documents in load order.
    pub fn enabled_documents(&self) -> impl Iterator<Item = &AgentDocument> {
        self.documents.iter().filter(|d| d.enabled)
    }

    /// Ids of the enabled documents, in load order.
    pub fn active_ids(&self) -> Vec<String> {
        self.enabled_documents().map(|d| d.id.clone()).collect()
    }

    /// Display label for `id`, falling back to the id itself.
    pub fn label(&self, id: &str) -> String {
        self.get(id)
            .map(|d| d.label().to_string())
            .unwrap_or_else(|| id.to_string())
    }

    /// Score enabled documents against `text` and return the best matches.
    pub fn query_agents(&self, text: &str, options: QueryOptions) -> Vec<ScoredAgent> {
        self.query_agents_on(text, options, Utc::now().date_naive())
    }

    /// Same as [`query_agents`](Self::query_agents) with an explicit "today".
    pub fn query_agents_on(
        &self,
        text: &str,
        options: QueryOptions,
        today: NaiveDate,
    ) -> Vec<ScoredAgent> {
        let terms = keywords(text);
        let mut scored: Vec<ScoredAgent> = self
            .enabled_documents()
            .filter_map(|doc| {
                let index = self.index.get(&doc.id)?;
                let keyword_score = index.score(&terms);
                // Recency only breaks ties between documents that matched at all.
                let score = if keyword_score > 0.0 {
                    keyword_score + recency_boost(doc.date, today)
                } else {
                    0.0
                };
                (score >= options.min_score).then(|| ScoredAgent {
                    id: doc.id.clone(),
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(options.max_results);
        scored
    }

    /// Render a single document at `level`.
    pub fn get_context_slice(&self, id: &str, level: ContextLevel) -> Option<String> {
        self.get(id).map(|doc| render_document(doc, level))
    }

    /// Render several documents at the same level, separated by blank lines.
    pub fn render_documents(&self, ids: &[String], level: ContextLevel) -> String {
        ids.iter()
            .filter_map(|id| self.get_context_slice(id, level))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Pack candidates into `token_budget`, richest level first.
    ///
    /// Each candidate receives the richest of full → standard → summary that
    /// still fits the remaining budget. Candidates are visited in relevance
    /// order when a query is given, otherwise newest first. Assembly stops
    /// once the remaining budget drops below [`MIN_REMAINING_TOKENS`].
    pub fn get_context_with_budget(
        &self,
        token_budget: usize,
        request: &BudgetRequest,
    ) -> BudgetedContext {
        let ordered = self.budget_order(request);
        let mut result = BudgetedContext {
            budget: token_budget,
            ..Default::default()
        };
        let mut sections = Vec::new();

        for (position, doc) in ordered.iter().enumerate() {
            if result.remaining() < MIN_REMAINING_TOKENS {
                result
                    .skipped
                    .extend(ordered[position..].iter().map(|d| d.id.clone()));
                break;
            }

            let remaining = result.remaining();
            let placed = ContextLevel::richest_first().into_iter().find_map(|level| {
                let text = render_document(doc, level);
                let tokens = estimate_tokens(&text);
                (tokens <= remaining).then_some((level, text, tokens))
            });

            match placed {
                Some((level, text, tokens)) => {
                    result.used_tokens += tokens;
                    result.entries.push(BudgetEntry {
                        agent_id: doc.id.clone(),
                        level,
                        tokens,
                    });
                    sections.push(text);
                }
                None => result.skipped.push(doc.id.clone()),
            }
        }

        result.text = sections.join("\n\n");
        result
    }

    fn budget_order(&self, request: &BudgetRequest) -> Vec<&AgentDocument> {
        let mut candidates: Vec<&AgentDocument> = match &request.candidates {
            Some(ids) => self
                .enabled_documents()
                .filter(|d| ids.contains(&d.id))
                .collect(),
            None => self.enabled_documents().collect(),
        };

        // Newest first; undated documents last.
        candidates.sort_by(|a, b| b.date.cmp(&a.date));

        if let Some(query) = &request.query {
            let terms = keywords(query);
            let score_of = |doc: &AgentDocument| {
                self.index
                    .get(&doc.id)
                    .map(|index| index.score(&terms))
                    .unwrap_or(0.0)
            };
            // Stable sort keeps recency order among equal scores.
            candidates.sort_by(|a, b| score_of(b).total_cmp(&score_of(a)));
        }

        candidates
    }
}

fn recency_boost(date: Option<NaiveDate>, today: NaiveDate) -> f64 {
    let Some(date) = date else {
        return 0.0;
    };
    let age_days = (today - date).num_days().max(0) as f64;
    RECENCY_WEIGHT * (1.0 - age_days / RECENCY_WINDOW_DAYS).max(0.0)
}

fn render_document(doc: &AgentDocument, level: ContextLevel) -> String {
    let mut out = match doc.date {
        Some(date) => format!("### {} ({})\n", doc.label(), date),
        None => format!("### {}\n", doc.label()),
    };
    if !doc.summary.is_empty() {
        out.push_str(&format!("Summary: {}\n", doc.summary));
    }

    if level >= ContextLevel::Standard {
        push_list(&mut out, "Key points", &doc.key_points);
        push_list(&mut out, "Action items", &doc.action_items);
        if let Some(sentiment) = &doc.sentiment {
            out.push_str(&format!("Sentiment: {}\n", sentiment));
        }
    }

    if level == ContextLevel::Full
        && let Some(transcript) = &doc.transcript
    {
        out.push_str("Transcript:\n");
        out.push_str(transcript);
        out.push('\n');
    }

    out.trim_end().to_string()
}

fn push_list(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(heading);
    out.push_str(":\n");
    for item in items {
        out.push_str(&format!("- {}\n", item));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_store() -> DocumentStore {
        let mut store = DocumentStore::new();
        store
            .load(vec![
                AgentDocument::new("m1", "Budget Review")
                    .with_date(day(2024, 5, 10))
                    .with_summary("Reviewed the quarterly budget and hiring freeze")
                    .with_key_points(["Marketing spend cut by 10%"])
                    .with_action_items(["Alice to revise the forecast"])
                    .with_sentiment("tense")
                    .with_transcript("Alice: the budget is too tight. Bob: agreed."),
                AgentDocument::new("m2", "Product Sync")
                    .with_date(day(2024, 5, 1))
                    .with_summary("Roadmap priorities for the mobile launch")
                    .with_key_points(["Launch moved to June"])
                    .with_action_items(["Carol to update the roadmap"]),
                AgentDocument::new("m3", "Retired Notes")
                    .with_summary("Budget notes from last year")
                    .disabled(),
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_load_rejects_duplicates_and_keeps_previous_set() {
        let mut store = sample_store();
        let err = store
            .load(vec![AgentDocument::new("x", "X"), AgentDocument::new("x", "Y")])
            .unwrap_err();
        assert_eq!(err, DomainError::DuplicateAgent("x".to_string()));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_active_ids_excludes_disabled() {
        let store = sample_store();
        assert_eq!(store.active_ids(), vec!["m1", "m2"]);
    }

    #[test]
    fn test_name_hits_outweigh_summary_hits() {
        let store = sample_store();
        let results = store.query_agents_on("budget", QueryOptions::default(), day(2024, 6, 30));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "m1");
        // name (10) + summary (5) + transcript (1), no recency after 14 days
        assert_eq!(results[0].score, 16.0);
    }

    #[test]
    fn test_recency_boost_decays_linearly() {
        let today = day(2024, 5, 10);
        assert_eq!(recency_boost(Some(today), today), RECENCY_WEIGHT);
        assert_eq!(recency_boost(Some(day(2024, 5, 3)), today), RECENCY_WEIGHT * 0.5);
        assert_eq!(recency_boost(Some(day(2024, 4, 1)), today), 0.0);
        assert_eq!(recency_boost(None, today), 0.0);
    }

    #[test]
    fn test_query_respects_min_score_and_max_results() {
        let store = sample_store();
        let today = day(2024, 6, 30);
        let none = store.query_agents_on(
            "roadmap",
            QueryOptions::default().with_min_score(100.0),
            today,
        );
        assert!(none.is_empty());

        let one = store.query_agents_on(
            "budget roadmap",
            QueryOptions::default().with_max_results(1),
            today,
        );
        assert_eq!(one.len(), 1);
    }

    #[test]
    fn test_disabled_documents_never_score() {
        let store = sample_store();
        let results = store.query_agents_on("notes", QueryOptions::default(), day(2024, 6, 1));
        assert!(results.iter().all(|r| r.id != "m3"));
    }

    #[test]
    fn test_context_slice_levels() {
        let store = sample_store();
        let summary = store.get_context_slice("m1", ContextLevel::Summary).unwrap();
        let standard = store.get_context_slice("m1", ContextLevel::Standard).unwrap();
        let full = store.get_context_slice("m1", ContextLevel::Full).unwrap();

        assert!(!summary.contains("Key points"));
        assert!(standard.contains("Action items:\n- Alice to revise the forecast"));
        assert!(!standard.contains("Transcript"));
        assert!(full.contains("Transcript:"));
        assert!(store.get_context_slice("missing", ContextLevel::Full).is_none());
    }

    #[test]
    fn test_budget_assigns_richest_level_that_fits() {
        let store = sample_store();
        let full_tokens = estimate_tokens(&store.get_context_slice("m1", ContextLevel::Full).unwrap());
        let context = store.get_context_with_budget(
            full_tokens + MIN_REMAINING_TOKENS + 5,
            &BudgetRequest::new().with_candidates(["m1"]),
        );
        assert_eq!(context.level_of("m1"), Some(ContextLevel::Full));
        assert_eq!(context.used_tokens, full_tokens);
    }

    #[test]
    fn test_budget_degrades_level_when_tight() {
        let store = sample_store();
        let summary_tokens =
            estimate_tokens(&store.get_context_slice("m1", ContextLevel::Summary).unwrap());
        let standard_tokens =
            estimate_tokens(&store.get_context_slice("m1", ContextLevel::Standard).unwrap());
        assert!(summary_tokens < standard_tokens);
        assert!(summary_tokens >= MIN_REMAINING_TOKENS / 4);

        let budget = MIN_REMAINING_TOKENS.max(summary_tokens);
        let context =
            store.get_context_with_budget(budget, &BudgetRequest::new().with_candidates(["m1"]));
        let level = context.level_of("m1");
        assert!(level.is_some());
        assert!(level.unwrap() <= ContextLevel::Standard);
        assert!(context.used_tokens <= budget);
    }

    #[test]
    fn test_budget_floor_stops_assembly() {
        let store = sample_store();
        let context = store.get_context_with_budget(10, &BudgetRequest::new());
        assert!(context.is_empty());
        assert_eq!(context.skipped.len(), 2);
    }

    #[test]
    fn test_budget_orders_by_relevance_with_query() {
        let store = sample_store();
        let context = store.get_context_with_budget(
            10_000,
            &BudgetRequest::new().with_query("roadmap launch"),
        );
        assert_eq!(context.entries[0].agent_id, "m2");
        assert_eq!(context.entries.len(), 2);
    }

    #[test]
    fn test_budget_orders_by_recency_without_query() {
        let store = sample_store();
        let context = store.get_context_with_budget(10_000, &BudgetRequest::new());
        assert_eq!(context.entries[0].agent_id, "m1");
    }
}
