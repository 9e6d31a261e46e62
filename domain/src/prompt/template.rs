//! Prompt templates for decomposition, execution, aggregation and the sandbox

use crate::core::text::{keywords, truncate_str};
use crate::decomposition::intent::QueryIntent;
use crate::decomposition::perspective::Perspective;

/// How much of a previous answer is quoted into a follow-up query.
const FOLLOWUP_EXCERPT_BYTES: usize = 600;

/// Templates for generating prompts at each stage
pub struct PromptTemplate;

impl PromptTemplate {
    // ==================== Sub-query text ====================

    /// Topic phrase extracted from the query (its keywords).
    pub fn topic(query: &str) -> String {
        let kw = keywords(query);
        if kw.is_empty() {
            query.trim().to_string()
        } else {
            kw.join(" ")
        }
    }

    /// Single combined call over a few documents.
    pub fn direct_query(intent: QueryIntent, query: &str) -> String {
        match intent {
            QueryIntent::Temporal => format!(
                "{}\n\nAnswer using the documents below and include the relevant dates.",
                query
            ),
            QueryIntent::Analytical => format!(
                "{}\n\nExplain the reasoning, causes and implications found in the documents below.",
                query
            ),
            _ => format!("{}\n\nAnswer using only the documents below.", query),
        }
    }

    /// One document at a time, so results can be compared afterwards.
    pub fn per_document_query(intent: QueryIntent, query: &str) -> String {
        match intent {
            QueryIntent::Comparative => format!(
                "Focusing only on this document, describe everything relevant to: {}\n\
                 Be specific so the answer can be compared with other documents.",
                query
            ),
            _ => format!("Using only this document, answer: {}", query),
        }
    }

    /// Map phase text.
    pub fn map_query(intent: QueryIntent, query: &str) -> String {
        let topic = Self::topic(query);
        match intent {
            QueryIntent::Aggregative => format!(
                "List all items related to \"{}\" in this document. \
                 Use one bullet per item and keep names, owners and dates.\n\nOriginal question: {}",
                topic, query
            ),
            QueryIntent::Temporal => format!(
                "List every event related to \"{}\" in this document with its date.\n\nOriginal question: {}",
                topic, query
            ),
            QueryIntent::Analytical => format!(
                "Analyze what this document says about \"{}\": causes, implications and risks.\n\nOriginal question: {}",
                topic, query
            ),
            _ => format!(
                "Extract what this document says about \"{}\".\n\nOriginal question: {}",
                topic, query
            ),
        }
    }

    /// Reduce phase text.
    pub fn reduce_query(intent: QueryIntent, query: &str) -> String {
        let shape = match intent {
            QueryIntent::Temporal => "Order the combined findings chronologically.",
            QueryIntent::Comparative => "Organize the combined findings as a side-by-side comparison.",
            _ => "Group the combined findings by theme.",
        };
        format!(
            "Combine and organize the findings from each source below into one answer to: {}\n\
             Merge duplicates, keep source attribution, and do not invent items. {}",
            query, shape
        )
    }

    /// Broad first pass of an iterative plan.
    pub fn exploratory_query(query: &str) -> String {
        format!(
            "Explore the documents broadly to answer: {}\n\
             If any part of the answer is missing or unclear in the documents, say so explicitly.",
            query
        )
    }

    /// Follow-up generated when the exploratory answer signals uncertainty.
    pub fn followup_query(original: &str, previous_answer: &str) -> String {
        format!(
            "A first pass at the question \"{}\" was uncertain:\n\n{}\n\n\
             Using the full documents below, find the specific information that was missing \
             or unclear, and answer the original question as completely as possible.",
            original,
            truncate_str(previous_answer.trim(), FOLLOWUP_EXCERPT_BYTES)
        )
    }

    // ==================== System prompts ====================

    /// System prompt for direct, map and exploratory sub-queries.
    pub fn sub_query_system(perspective: Option<Perspective>) -> String {
        let mut prompt = String::from(
            "You answer questions about meeting documents. Use only the provided context. \
             Be concise and factual, cite the document name for each claim, and say clearly \
             when the documents do not contain the answer.",
        );
        if let Some(perspective) = perspective {
            prompt.push_str("\n\n");
            prompt.push_str(perspective.instruction());
        }
        prompt
    }

    /// System prompt for the reduce phase.
    pub fn reduce_system() -> &'static str {
        "You combine findings extracted from several documents into a single well-organized \
         answer. Preserve every distinct item, merge duplicates, keep source attribution and \
         surface disagreements instead of hiding them."
    }

    /// System prompt for the debate phase.
    pub fn debate_system() -> &'static str {
        "You moderate a debate between two analytical perspectives on the same documents. \
         Identify concrete points of agreement and points of tension. Be brief and specific."
    }

    /// User prompt for one debate pair.
    pub fn debate_prompt(
        query: &str,
        first: (Perspective, &str),
        second: (Perspective, &str),
    ) -> String {
        format!(
            "Question: {}\n\n--- {} ---\n{}\n\n--- {} ---\n{}\n\n\
             List the points of AGREEMENT and the points of TENSION between these two perspectives.",
            query, first.0, first.1, second.0, second.1
        )
    }

    /// System prompt for final synthesis, varied by intent.
    pub fn synthesis_system(intent: QueryIntent) -> String {
        let framing = match intent {
            QueryIntent::Comparative => {
                "Frame the answer as a contrast: show clearly where the sources differ and where they match."
            }
            QueryIntent::Aggregative => {
                "Frame the answer as a consolidated inventory: every distinct item once, grouped by theme."
            }
            QueryIntent::Temporal => {
                "Frame the answer as a timeline and note where sources disagree on dates."
            }
            QueryIntent::Analytical => {
                "Frame the answer as an analysis: converge on a consensus where the evidence supports it and explain remaining disagreement."
            }
            QueryIntent::Factual => {
                "Converge on a single consensus answer and mention any source that disagrees."
            }
        };
        format!(
            "You synthesize several partial answers about meeting documents into one coherent response. \
             Attribute claims to their sources. {}",
            framing
        )
    }

    /// User prompt for final synthesis.
    pub fn synthesis_prompt(
        query: &str,
        results: &[(String, String)],
        conflict_summary: Option<&str>,
    ) -> String {
        let mut prompt = format!("Question: {}\n\nPartial answers:\n", query);
        for (source, content) in results {
            prompt.push_str(&format!("\n--- {} ---\n{}\n", source, content));
        }
        if let Some(summary) = conflict_summary {
            prompt.push_str("\nDetected disagreements:\n");
            prompt.push_str(summary);
            prompt.push_str(
                "\n\nThese sources disagree. Surface the disagreement explicitly in your answer; \
                 do not average it away.\n",
            );
        }
        prompt.push_str("\nWrite the final answer.");
        prompt
    }

    // ==================== Sandbox ====================

    /// System prompt describing the sandbox code contract.
    pub fn sandbox_system() -> &'static str {
        r#"You write Lua 5.4 code that answers a question about meeting documents.

Available globals:
- agents: array of tables with fields id, name, date, summary, sentiment, transcript,
  key_points (array of strings) and action_items (array of strings)
- search(term): returns the agents whose text contains term (case-insensitive)
- sub_lm(query, context): asks a language model a question about the given context text
  and returns its answer as a string
- print(...): debug output
- FINAL(value): finish with value as the answer
- FINAL_VAR(name): finish with the global variable called name as the answer

Rules:
- Only the string, table, math and utf8 libraries exist. Never use os, io, require, load,
  loadstring, dofile, loadfile, debug, package, _G, _ENV, rawget, rawset, setmetatable,
  getmetatable, collectgarbage or string.dump.
- The code MUST end by calling FINAL or FINAL_VAR.
- Reply with a single ```lua code block and nothing else."#
    }

    /// User prompt for sandbox code generation.
    pub fn sandbox_prompt(
        query: &str,
        example: &str,
        document_overview: &str,
        previous_error: Option<&str>,
    ) -> String {
        let mut prompt = format!(
            "Example:\n```lua\n{}\n```\n\nDocuments loaded:\n{}\n\nQuestion: {}\n",
            example.trim(),
            document_overview,
            query
        );
        if let Some(error) = previous_error {
            prompt.push_str(&format!(
                "\nYour previous code was rejected: {}\nFix the problem and reply with corrected code.\n",
                error
            ));
        }
        prompt
    }

    /// Append a memory preamble to a system prompt.
    pub fn with_memory(system: &str, memory: Option<&str>) -> String {
        match memory {
            Some(memory) if !memory.trim().is_empty() => format!(
                "{}\n\nConversation memory (facts from earlier turns):\n{}",
                system,
                memory.trim()
            ),
            _ => system.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregative_map_query_lists_items() {
        let q = PromptTemplate::map_query(
            QueryIntent::Aggregative,
            "What are all the decisions across every meeting?",
        );
        assert!(q.starts_with("List all items related to \"decisions meeting\""));
    }

    #[test]
    fn test_reduce_query_asks_to_combine() {
        let q = PromptTemplate::reduce_query(QueryIntent::Aggregative, "All decisions?");
        assert!(q.contains("Combine and organize"));
    }

    #[test]
    fn test_sub_query_system_adds_perspective() {
        let plain = PromptTemplate::sub_query_system(None);
        let critic = PromptTemplate::sub_query_system(Some(Perspective::Critic));
        assert!(!plain.contains("critic"));
        assert!(critic.contains("perspective of a critic"));
    }

    #[test]
    fn test_synthesis_prompt_with_conflicts() {
        let results = vec![
            ("Budget Review".to_string(), "Costs are fine.".to_string()),
            ("Product Sync".to_string(), "Costs are a risk.".to_string()),
        ];
        let with = PromptTemplate::synthesis_prompt("Costs?", &results, Some("A vs B"));
        let without = PromptTemplate::synthesis_prompt("Costs?", &results, None);
        assert!(with.contains("Surface the disagreement"));
        assert!(!without.contains("Detected disagreements"));
        assert!(without.contains("--- Product Sync ---"));
    }

    #[test]
    fn test_followup_quotes_previous_answer() {
        let q = PromptTemplate::followup_query("Who owns hiring?", "It is unclear.");
        assert!(q.contains("It is unclear."));
        assert!(q.contains("Who owns hiring?"));
    }

    #[test]
    fn test_sandbox_prompt_includes_previous_error() {
        let p = PromptTemplate::sandbox_prompt("count", "FINAL(1)", "- m1", Some("uses os"));
        assert!(p.contains("previous code was rejected: uses os"));
        assert!(!PromptTemplate::sandbox_prompt("count", "FINAL(1)", "- m1", None)
            .contains("rejected"));
    }

    #[test]
    fn test_with_memory() {
        assert_eq!(PromptTemplate::with_memory("sys", None), "sys");
        assert_eq!(PromptTemplate::with_memory("sys", Some("  ")), "sys");
        assert!(PromptTemplate::with_memory("sys", Some("- decided X")).contains("decided X"));
    }
}
