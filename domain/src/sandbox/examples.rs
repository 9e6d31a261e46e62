//! Procedural query classes and the few-shot example shown for each.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Kind of procedural analysis a query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplQueryKind {
    Count,
    Sort,
    Aggregate,
    Filter,
    Search,
    List,
}

static PATTERNS: LazyLock<Vec<(ReplQueryKind, Regex)>> = LazyLock::new(|| {
    [
        (ReplQueryKind::Count, r"(?i)\b(how many|count|number of)\b"),
        (
            ReplQueryKind::Sort,
            r"(?i)\b(sort(?:ed)?|rank(?:ed|ing)?|order(?:ed)? by|top \d+|most|least|fewest)\b",
        ),
        (
            ReplQueryKind::Aggregate,
            r"(?i)\b(aggregate|sum|average|per meeting|group(?:ed)? by|breakdown|tally)\b",
        ),
        (
            ReplQueryKind::Filter,
            r"(?i)\b(filter|only those|which (?:meetings|documents|agents)|that (?:mention|contain|include))\b",
        ),
        (
            ReplQueryKind::Search,
            r"(?i)\b(find|search|look for|mention(?:s|ed)?|occurrences?)\b",
        ),
        (
            ReplQueryKind::List,
            r"(?i)\b(list|enumerate|show all|every)\b",
        ),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("valid repl pattern")))
    .collect()
});

impl ReplQueryKind {
    /// First matching kind, in the order count, sort, aggregate, filter, search, list.
    pub fn detect(query: &str) -> Option<ReplQueryKind> {
        PATTERNS
            .iter()
            .find(|(_, pattern)| pattern.is_match(query))
            .map(|(kind, _)| *kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReplQueryKind::Count => "count",
            ReplQueryKind::Sort => "sort",
            ReplQueryKind::Aggregate => "aggregate",
            ReplQueryKind::Filter => "filter",
            ReplQueryKind::Search => "search",
            ReplQueryKind::List => "list",
        }
    }

    /// Few-shot example shown to the code generator for this kind.
    pub fn example(&self) -> &'static str {
        match self {
            ReplQueryKind::Count => {
                r#"local count = 0
for _, agent in ipairs(agents) do
  count = count + #agent.action_items
end
FINAL("There are " .. count .. " action items across " .. #agents .. " meetings.")"#
            }
            ReplQueryKind::Sort => {
                r#"local ranked = {}
for _, agent in ipairs(agents) do
  table.insert(ranked, { name = agent.name, n = #agent.action_items })
end
table.sort(ranked, function(a, b) return a.n > b.n end)
local lines = {}
for i, entry in ipairs(ranked) do
  table.insert(lines, i .. ". " .. entry.name .. " (" .. entry.n .. " action items)")
end
FINAL(table.concat(lines, "\n"))"#
            }
            ReplQueryKind::Aggregate => {
                r#"local notes = {}
for _, agent in ipairs(agents) do
  local context = agent.summary .. "\n" .. table.concat(agent.key_points, "\n")
  local answer = sub_lm("What risks are mentioned?", context)
  table.insert(notes, agent.name .. ": " .. answer)
end
FINAL(table.concat(notes, "\n\n"))"#
            }
            ReplQueryKind::Filter => {
                r#"local matches = {}
for _, agent in ipairs(agents) do
  local sentiment = string.lower(agent.sentiment or "")
  if string.find(sentiment, "negative", 1, true) then
    table.insert(matches, agent.name)
  end
end
FINAL("Meetings with negative sentiment: " .. table.concat(matches, ", "))"#
            }
            ReplQueryKind::Search => {
                r#"local lines = {}
for _, agent in ipairs(search("budget")) do
  table.insert(lines, agent.name .. ": " .. agent.summary)
end
if #lines == 0 then
  FINAL("No meeting mentions the budget.")
else
  FINAL(table.concat(lines, "\n"))
end"#
            }
            ReplQueryKind::List => {
                r#"result = {}
for _, agent in ipairs(agents) do
  for _, item in ipairs(agent.action_items) do
    table.insert(result, "- " .. item .. " (" .. agent.name .. ")")
  end
end
FINAL_VAR("result")"#
            }
        }
    }
}

impl fmt::Display for ReplQueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::validator::CodeValidator;

    #[test]
    fn test_detect_order() {
        assert_eq!(
            ReplQueryKind::detect("How many meetings mention pricing?"),
            Some(ReplQueryKind::Count)
        );
        assert_eq!(
            ReplQueryKind::detect("Rank the meetings by action items"),
            Some(ReplQueryKind::Sort)
        );
        assert_eq!(
            ReplQueryKind::detect("Which meetings discussed hiring?"),
            Some(ReplQueryKind::Filter)
        );
        assert_eq!(
            ReplQueryKind::detect("Find where the budget came up"),
            Some(ReplQueryKind::Search)
        );
        assert_eq!(
            ReplQueryKind::detect("List the owners"),
            Some(ReplQueryKind::List)
        );
        assert_eq!(ReplQueryKind::detect("Why did the launch slip?"), None);
    }

    #[test]
    fn test_every_example_passes_validation() {
        let validator = CodeValidator::default();
        for kind in [
            ReplQueryKind::Count,
            ReplQueryKind::Sort,
            ReplQueryKind::Aggregate,
            ReplQueryKind::Filter,
            ReplQueryKind::Search,
            ReplQueryKind::List,
        ] {
            assert!(
                validator.validate(kind.example()).is_ok(),
                "example for {} should validate",
                kind
            );
        }
    }
}
