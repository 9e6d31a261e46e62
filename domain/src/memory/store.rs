//! Memory store: append-only slice log, state block and working window.

use super::extract::extract_slices;
use super::slice::MemorySlice;
use super::state_block::StateBlock;
use super::window::WorkingWindow;
use crate::core::text::{jaccard_of_sets, keyword_set};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// Tunables for [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryConfig {
    pub state_block_tokens: usize,
    pub per_type_cap: usize,
    pub window_user_turns: usize,
    pub window_summary_tokens: usize,
    /// Age at which recency has decayed to half
    pub recency_half_days: f64,
    /// Slices retrieved into the prompt preamble
    pub preamble_slices: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            state_block_tokens: 800,
            per_type_cap: 8,
            window_user_turns: 2,
            window_summary_tokens: 120,
            recency_half_days: 7.0,
            preamble_slices: 3,
        }
    }
}

/// Filters and diversity caps for [`MemoryStore::retrieve_slices`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalOptions {
    pub tags: Vec<String>,
    pub entities: Vec<String>,
    pub max_results: usize,
    /// At most this many results share a primary tag
    pub max_per_tag: usize,
    /// At most this many results share a primary source document
    pub max_per_agent: usize,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            entities: Vec::new(),
            max_results: 5,
            max_per_tag: 2,
            max_per_agent: 2,
        }
    }
}

impl RetrievalOptions {
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_entities(mut self, entities: Vec<String>) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }
}

/// A rendered memory preamble and the slices it recalled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryContext {
    pub text: String,
    pub slice_ids: Vec<String>,
}

const TAG_WEIGHT: f64 = 2.0;
const ENTITY_WEIGHT: f64 = 2.0;
const OVERLAP_WEIGHT: f64 = 3.0;

#[derive(Debug, Clone)]
pub struct MemoryStore {
    log: Vec<MemorySlice>,
    hashes: HashSet<String>,
    state: StateBlock,
    window: WorkingWindow,
    next_id: u64,
    config: MemoryConfig,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

impl MemoryStore {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            log: Vec::new(),
            hashes: HashSet::new(),
            state: StateBlock::new(config.per_type_cap, config.state_block_tokens),
            window: WorkingWindow::new(config.window_user_turns, config.window_summary_tokens),
            next_id: 1,
            config,
        }
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn slices(&self) -> &[MemorySlice] {
        &self.log
    }

    pub fn state_block(&self) -> &StateBlock {
        &self.state
    }

    pub fn window(&self) -> &WorkingWindow {
        &self.window
    }

    /// Extract slices from `answer` and merge the new ones.
    ///
    /// Returns how many slices were new; repeats (by content hash) are skipped.
    pub fn ingest(&mut self, answer: &str, source_agent_ids: &[String], now: DateTime<Utc>) -> usize {
        let extracted = extract_slices(answer, source_agent_ids, now, "mem", self.next_id);
        let mut added = 0;
        for slice in extracted {
            self.next_id += 1;
            if !self.hashes.insert(slice.content_hash.clone()) {
                continue;
            }
            self.state.insert(slice.clone());
            self.log.push(slice);
            added += 1;
        }
        added
    }

    pub fn record_turn(&mut self, user: &str, assistant: &str) {
        self.window.record_turn(user, assistant);
    }

    /// Score slices for `query` and return the best, honoring diversity caps.
    ///
    /// Read-only; see [`mark_retrieved`](Self::mark_retrieved) for the
    /// counter update.
    pub fn score_slices(
        &self,
        query: &str,
        options: &RetrievalOptions,
        now: DateTime<Utc>,
    ) -> Vec<&MemorySlice> {
        let query_keywords = keyword_set(query);
        let wanted_tags: HashSet<String> = options.tags.iter().map(|t| t.to_lowercase()).collect();
        let wanted_entities: HashSet<String> =
            options.entities.iter().map(|e| e.to_lowercase()).collect();

        let mut scored: Vec<(&MemorySlice, f64)> = Vec::new();
        for slice in &self.log {
            let tag_hits = slice
                .tags
                .iter()
                .filter(|t| wanted_tags.contains(&t.to_lowercase()))
                .count();
            let entity_hits = slice
                .entities
                .iter()
                .filter(|e| wanted_entities.contains(&e.to_lowercase()))
                .count();
            let overlap = jaccard_of_sets(&query_keywords, &keyword_set(&slice.text));
            let relevance = tag_hits as f64 * TAG_WEIGHT
                + entity_hits as f64 * ENTITY_WEIGHT
                + overlap * OVERLAP_WEIGHT;
            if relevance <= 0.0 && !query_keywords.is_empty() {
                continue;
            }
            let recency = slice.recency_at(now, self.config.recency_half_days);
            let score = relevance + recency + slice.importance * slice.confidence;
            scored.push((slice, score));
        }
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut per_tag: HashMap<String, usize> = HashMap::new();
        let mut per_agent: HashMap<String, usize> = HashMap::new();
        let mut picked = Vec::new();
        for (slice, _) in scored {
            if picked.len() >= options.max_results {
                break;
            }
            let tag = slice.tags.first().cloned().unwrap_or_default();
            let agent = slice.source_agent_ids.first().cloned().unwrap_or_default();
            if per_tag.get(&tag).copied().unwrap_or(0) >= options.max_per_tag
                || per_agent.get(&agent).copied().unwrap_or(0) >= options.max_per_agent
            {
                continue;
            }
            *per_tag.entry(tag).or_default() += 1;
            *per_agent.entry(agent).or_default() += 1;
            picked.push(slice);
        }
        picked
    }

    /// Count a retrieval of each slice in `ids` and refresh its recency.
    ///
    /// Returns how many ids matched a stored slice.
    pub fn mark_retrieved(&mut self, ids: &[String], now: DateTime<Utc>) -> usize {
        let half_days = self.config.recency_half_days;
        let mut marked = 0;
        for slice in self.log.iter_mut().filter(|s| ids.contains(&s.id)) {
            slice.retrieval_count += 1;
            slice.recency = slice.recency_at(now, half_days);
            marked += 1;
        }
        marked
    }

    /// [`score_slices`](Self::score_slices) followed by
    /// [`mark_retrieved`](Self::mark_retrieved) on the picked slices.
    pub fn retrieve_slices(
        &mut self,
        query: &str,
        options: &RetrievalOptions,
        now: DateTime<Utc>,
    ) -> Vec<MemorySlice> {
        let ids: Vec<String> = self
            .score_slices(query, options, now)
            .into_iter()
            .map(|s| s.id.clone())
            .collect();
        self.mark_retrieved(&ids, now);
        ids.iter()
            .filter_map(|id| self.log.iter().find(|s| &s.id == id).cloned())
            .collect()
    }

    /// Preamble appended to prompts: state block, working window and the
    /// slices most relevant to `query`. `None` when memory is empty.
    ///
    /// Leaves retrieval counters alone; the caller marks
    /// [`MemoryContext::slice_ids`] once the answer is accepted.
    pub fn render_context(&self, query: &str, now: DateTime<Utc>) -> Option<MemoryContext> {
        let mut sections = Vec::new();
        let state = self.state.render();
        if !state.is_empty() {
            sections.push(state);
        }
        if let Some(window) = self.window.render() {
            sections.push(window);
        }
        let options = RetrievalOptions::default().with_max_results(self.config.preamble_slices);
        let relevant = self.score_slices(query, &options, now);
        let slice_ids: Vec<String> = relevant.iter().map(|s| s.id.clone()).collect();
        if !relevant.is_empty() {
            let mut text = String::from("Relevant earlier findings:\n");
            for slice in relevant {
                text.push_str(&format!("- [{}] {}\n", slice.slice_type, slice.text));
            }
            sections.push(text);
        }
        if sections.is_empty() {
            None
        } else {
            Some(MemoryContext {
                text: sections.join("\n"),
                slice_ids,
            })
        }
    }

    pub fn clear(&mut self) {
        self.log.clear();
        self.hashes.clear();
        self.state.clear();
        self.window.clear();
        self.next_id = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::SliceType;
    use chrono::Duration;

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ingest_dedups_across_answers() {
        let mut store = MemoryStore::default();
        let now = Utc::now();
        let answer = "## Decisions\n- Ship the beta in March\n- Keep pricing unchanged";
        assert_eq!(store.ingest(answer, &ids(&["m1"]), now), 2);
        assert_eq!(store.ingest(answer, &ids(&["m2"]), now), 0);
        assert_eq!(store.len(), 2);
        assert_eq!(store.state_block().slices(SliceType::Decision).len(), 2);
    }

    #[test]
    fn test_retrieve_prefers_overlap_and_recency() {
        let mut store = MemoryStore::default();
        let now = Utc::now();
        store.ingest("## Risks\n- Vendor contract renewal may slip", &ids(&["m1"]), now - Duration::days(30));
        store.ingest("## Risks\n- Vendor pricing increase is likely", &ids(&["m2"]), now);
        store.ingest("## Decisions\n- Hiring freeze until June", &ids(&["m3"]), now);

        let results = store.retrieve_slices("vendor risks", &RetrievalOptions::default(), now);
        assert_eq!(results.len(), 2);
        assert!(results[0].text.contains("pricing"));
        assert_eq!(results[0].retrieval_count, 1);
    }

    #[test]
    fn test_retrieve_diversity_caps() {
        let mut store = MemoryStore::default();
        let now = Utc::now();
        store.ingest(
            "## Risks\n- Budget overrun on cloud\n- Budget overrun on travel\n- Budget overrun on hardware",
            &ids(&["m1"]),
            now,
        );
        let options = RetrievalOptions::default().with_tags(vec!["budget".into()]);
        let results = store.retrieve_slices("budget", &options, now);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_render_context() {
        let mut store = MemoryStore::default();
        let now = Utc::now();
        assert!(store.render_context("anything", now).is_none());
        store.ingest("## Decisions\n- Ship the beta in March", &ids(&["m1"]), now);
        store.record_turn("What did we decide?", "Ship the beta in March.");
        let context = store.render_context("beta launch", now).unwrap();
        assert!(context.text.contains("Decisions:"));
        assert!(context.text.contains("Recent questions:"));
        assert!(context.text.contains("Relevant earlier findings:"));
        assert_eq!(context.slice_ids.len(), 1);
    }

    #[test]
    fn test_render_context_leaves_counters_until_marked() {
        let mut store = MemoryStore::default();
        let now = Utc::now();
        store.ingest("## Decisions\n- Ship the beta in March", &ids(&["m1"]), now);

        let context = store.render_context("beta launch", now).unwrap();
        store.render_context("beta launch", now).unwrap();
        assert_eq!(store.slices()[0].retrieval_count, 0);

        assert_eq!(store.mark_retrieved(&context.slice_ids, now), 1);
        assert_eq!(store.slices()[0].retrieval_count, 1);
        assert_eq!(store.mark_retrieved(&["mem-missing".to_string()], now), 0);
    }
}
