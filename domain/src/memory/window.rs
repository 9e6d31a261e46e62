//! Working window: the last user turns plus a rolling assistant summary.

use crate::core::text::{estimate_tokens, first_sentence};
use std::collections::VecDeque;

pub const DEFAULT_USER_TURNS: usize = 2;
pub const DEFAULT_SUMMARY_TOKENS: usize = 120;

#[derive(Debug, Clone)]
pub struct WorkingWindow {
    user_turns: VecDeque<String>,
    /// One line per assistant answer, oldest first
    summary: VecDeque<String>,
    max_user_turns: usize,
    max_summary_tokens: usize,
}

impl Default for WorkingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_USER_TURNS, DEFAULT_SUMMARY_TOKENS)
    }
}

impl WorkingWindow {
    pub fn new(max_user_turns: usize, max_summary_tokens: usize) -> Self {
        Self {
            user_turns: VecDeque::new(),
            summary: VecDeque::new(),
            max_user_turns: max_user_turns.max(1),
            max_summary_tokens,
        }
    }

    pub fn record_turn(&mut self, user: &str, assistant: &str) {
        self.user_turns.push_back(user.trim().to_string());
        while self.user_turns.len() > self.max_user_turns {
            self.user_turns.pop_front();
        }
        let line = first_sentence(assistant);
        if !line.is_empty() {
            self.summary.push_back(line.to_string());
        }
        while self.summary.len() > 1 && self.summary_tokens() > self.max_summary_tokens {
            self.summary.pop_front();
        }
    }

    fn summary_tokens(&self) -> usize {
        self.summary.iter().map(|s| estimate_tokens(s)).sum()
    }

    pub fn user_turns(&self) -> impl Iterator<Item = &str> {
        self.user_turns.iter().map(String::as_str)
    }

    pub fn rolling_summary(&self) -> String {
        self.summary.iter().cloned().collect::<Vec<_>>().join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.user_turns.is_empty()
    }

    pub fn render(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let mut out = String::from("Recent questions:\n");
        for turn in &self.user_turns {
            out.push_str(&format!("- {}\n", turn));
        }
        let summary = self.rolling_summary();
        if !summary.is_empty() {
            out.push_str(&format!("Recent answers in brief: {}\n", summary));
        }
        Some(out)
    }

    pub fn clear(&mut self) {
        self.user_turns.clear();
        self.summary.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_last_two_user_turns() {
        let mut window = WorkingWindow::default();
        window.record_turn("q1", "a1.");
        window.record_turn("q2", "a2.");
        window.record_turn("q3", "a3.");
        assert_eq!(window.user_turns().collect::<Vec<_>>(), vec!["q2", "q3"]);
    }

    #[test]
    fn test_summary_is_bounded() {
        let mut window = WorkingWindow::new(2, 10);
        window.record_turn("q1", "The first answer is fairly long indeed. More text.");
        window.record_turn("q2", "Second answer here. Ignored tail.");
        assert_eq!(window.rolling_summary(), "Second answer here.");
    }

    #[test]
    fn test_render() {
        let mut window = WorkingWindow::default();
        assert!(window.render().is_none());
        window.record_turn("What was decided?", "Ship in March. Details follow.");
        let text = window.render().unwrap();
        assert!(text.contains("- What was decided?"));
        assert!(text.contains("Ship in March."));
    }
}
