//! StateBlock: one bounded list per slice type, capped by a token budget.

use super::slice::{MemorySlice, SliceType};
use crate::core::text::estimate_tokens;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone)]
pub struct StateBlock {
    lists: BTreeMap<SliceType, Vec<MemorySlice>>,
    hashes: HashSet<String>,
    per_type_cap: usize,
    token_budget: usize,
}

impl StateBlock {
    pub fn new(per_type_cap: usize, token_budget: usize) -> Self {
        Self {
            lists: BTreeMap::new(),
            hashes: HashSet::new(),
            per_type_cap: per_type_cap.max(1),
            token_budget,
        }
    }

    pub fn token_budget(&self) -> usize {
        self.token_budget
    }

    pub fn len(&self) -> usize {
        self.lists.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn slices(&self, slice_type: SliceType) -> &[MemorySlice] {
        self.lists.get(&slice_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Add a slice unless its content hash is already present.
    ///
    /// Returns `false` for duplicates. After insertion the per-type cap and
    /// token budget are enforced, trimming the oldest and least important
    /// slices first.
    pub fn insert(&mut self, slice: MemorySlice) -> bool {
        if !self.hashes.insert(slice.content_hash.clone()) {
            return false;
        }
        let list = self.lists.entry(slice.slice_type).or_default();
        list.push(slice);
        while list.len() > self.per_type_cap {
            let removed = list.remove(0);
            self.hashes.remove(&removed.content_hash);
        }
        self.enforce_budget();
        true
    }

    fn enforce_budget(&mut self) {
        while estimate_tokens(&self.render()) > self.token_budget {
            let victim = self
                .lists
                .iter()
                .flat_map(|(t, list)| list.iter().enumerate().map(move |(i, s)| (*t, i, s)))
                .min_by(|a, b| {
                    a.2.importance
                        .total_cmp(&b.2.importance)
                        .then_with(|| a.2.timestamp.cmp(&b.2.timestamp))
                })
                .map(|(t, i, _)| (t, i));
            let Some((slice_type, idx)) = victim else {
                return;
            };
            if let Some(list) = self.lists.get_mut(&slice_type) {
                let removed = list.remove(idx);
                self.hashes.remove(&removed.content_hash);
                if list.is_empty() {
                    self.lists.remove(&slice_type);
                }
            }
        }
    }

    /// Compact markdown rendering, one section per non-empty type.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for slice_type in SliceType::ALL {
            let list = self.slices(slice_type);
            if list.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(slice_type.heading());
            out.push_str(":\n");
            for slice in list {
                out.push_str("- ");
                out.push_str(&slice.text);
                out.push('\n');
            }
        }
        out
    }

    pub fn clear(&mut self) {
        self.lists.clear();
        self.hashes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn slice(id: &str, t: SliceType, text: &str, age_days: i64) -> MemorySlice {
        MemorySlice::new(id, t, text, Utc::now() - Duration::days(age_days))
    }

    #[test]
    fn test_dedup_by_hash() {
        let mut block = StateBlock::new(8, 800);
        assert!(block.insert(slice("a", SliceType::Decision, "Ship in March", 0)));
        assert!(!block.insert(slice("b", SliceType::Decision, "ship  in march", 0)));
        assert_eq!(block.len(), 1);
    }

    #[test]
    fn test_per_type_cap_drops_oldest() {
        let mut block = StateBlock::new(2, 800);
        block.insert(slice("a", SliceType::Risk, "first risk item", 3));
        block.insert(slice("b", SliceType::Risk, "second risk item", 2));
        block.insert(slice("c", SliceType::Risk, "third risk item", 1));
        let ids: Vec<&str> = block.slices(SliceType::Risk).iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_budget_trims_least_important_first() {
        let mut block = StateBlock::new(8, 20);
        block.insert(slice("d", SliceType::Decision, "Decision text that matters a lot", 0));
        block.insert(slice("e", SliceType::Episode, "An episode nobody needs to keep around", 0));
        assert!(estimate_tokens(&block.render()) <= 20);
        assert_eq!(block.slices(SliceType::Episode).len(), 0);
        assert_eq!(block.slices(SliceType::Decision).len(), 1);
    }

    #[test]
    fn test_render() {
        let mut block = StateBlock::new(8, 800);
        block.insert(slice("a", SliceType::Action, "Dana drafts the email", 0));
        block.insert(slice("b", SliceType::Decision, "Ship in March", 0));
        assert_eq!(
            block.render(),
            "Decisions:\n- Ship in March\n\nActions:\n- Dana drafts the email\n"
        );
    }
}
