//! Console and JSON formatting for inspection results

use agora_domain::{BudgetedContext, DecompositionPlan, DocumentStore, SandboxOutput};
use colored::Colorize;
use serde_json::json;

/// Which execution path the pipeline would take for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// Decompose instead of answering in one call
    pub decompose: bool,
    /// Try the sandboxed code path first
    pub sandbox: bool,
}

/// Formats inspection results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    pub fn format_plan(plan: &DecompositionPlan, store: &DocumentStore, route: Route) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Decomposition Plan"));
        output.push('\n');
        output.push_str(&format!("{} {}\n", "Query:".cyan().bold(), plan.query));
        output.push_str(&format!(
            "{} {} ({})",
            "Intent:".cyan().bold(),
            plan.classification.intent,
            plan.classification.complexity
        ));
        if let Some(matched) = &plan.classification.matched {
            output.push_str(&format!(" matched \"{}\"", matched));
        }
        output.push('\n');
        output.push_str(&format!("{} {}\n", "Strategy:".cyan().bold(), plan.strategy));
        output.push_str(&format!(
            "{} decompose={} sandbox={}\n",
            "Route:".cyan().bold(),
            route.decompose,
            route.sandbox
        ));

        output.push_str(&Self::section_header("Relevant documents"));
        if plan.relevant.is_empty() {
            output.push_str(&format!("  {}\n", "no keyword matches; all active documents are candidates".dimmed()));
        }
        for scored in &plan.relevant {
            output.push_str(&format!(
                "  {:>6.2}  {} ({})\n",
                scored.score,
                store.label(&scored.id),
                scored.id
            ));
        }

        output.push_str(&Self::section_header("Sub-queries"));
        for sub in &plan.sub_queries {
            output.push_str(&format!(
                "\n{} {} [{}] p{}\n",
                sub.id.yellow().bold(),
                sub.query_type,
                sub.context_level,
                sub.priority
            ));
            if !sub.target_agent_ids.is_empty() {
                output.push_str(&format!("  targets: {}\n", sub.target_agent_ids.join(", ")));
            }
            if !sub.depends_on.is_empty() {
                output.push_str(&format!("  after:   {}\n", sub.depends_on.join(", ")));
            }
            if let Some(perspective) = sub.perspective {
                output.push_str(&format!("  stance:  {}\n", perspective));
            }
            match &sub.query {
                Some(text) => output.push_str(&format!("  {}\n", first_line(text))),
                None => output.push_str(&format!("  {}\n", "(generated at run time)".dimmed())),
            }
        }

        output
    }

    pub fn format_context(context: &BudgetedContext) -> String {
        let mut output = String::new();
        output.push_str(&format!("{} {}\n", "Budget:".cyan().bold(), context.describe()));
        if !context.skipped.is_empty() {
            output.push_str(&format!(
                "{} {}\n",
                "Skipped:".yellow().bold(),
                context.skipped.join(", ")
            ));
        }
        output.push('\n');
        output.push_str(&context.text);
        output.push('\n');
        output
    }

    pub fn format_script(result: &SandboxOutput) -> String {
        let mut output = String::new();
        if !result.printed.is_empty() {
            output.push_str(&Self::section_header("Printed"));
            output.push_str(&result.printed);
            if result.output_truncated {
                output.push_str(&format!("\n{}", "(output truncated)".dimmed()));
            }
            output.push('\n');
        }
        output.push_str(&Self::section_header("FINAL"));
        output.push_str(result.final_answer.as_deref().unwrap_or(""));
        output.push('\n');
        output
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }
}

/// JSON renderings of the same results
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn format_plan(plan: &DecompositionPlan, route: Route) -> String {
        let value = json!({
            "plan": plan,
            "route": {"decompose": route.decompose, "sandbox": route.sandbox},
        });
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn format_context(context: &BudgetedContext) -> String {
        serde_json::to_string_pretty(context).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn format_script(result: &SandboxOutput) -> String {
        let value = json!({
            "final": result.final_answer,
            "printed": result.printed,
            "output_truncated": result.output_truncated,
            "sub_lm_calls": result.sub_lm_calls,
        });
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
    }
}

fn first_line(text: &str) -> &str {
    text.lines().find(|line| !line.trim().is_empty()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_domain::{AgentDocument, DecomposerConfig, QueryDecomposer};

    fn store() -> DocumentStore {
        let mut store = DocumentStore::new();
        store
            .load(vec![
                AgentDocument::new("a", "Meeting A").with_action_items(["Eve drafts the plan"]),
                AgentDocument::new("b", "Meeting B").with_action_items(["Frank books the venue"]),
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_plan_lists_every_sub_query() {
        colored::control::set_override(false);
        let store = store();
        let plan = QueryDecomposer::new(DecomposerConfig::default())
            .decompose("Compare the action items of Meeting A and Meeting B", &store)
            .unwrap();
        let route = Route {
            decompose: true,
            sandbox: false,
        };

        let text = ConsoleFormatter::format_plan(&plan, &store, route);
        for sub in &plan.sub_queries {
            assert!(text.contains(&sub.id), "missing {} in\n{}", sub.id, text);
        }
        assert!(text.contains("Strategy: parallel"));
        assert!(text.contains("decompose=true sandbox=false"));

        let value: serde_json::Value =
            serde_json::from_str(&JsonFormatter::format_plan(&plan, route)).unwrap();
        assert_eq!(value["route"]["decompose"], true);
        assert_eq!(
            value["plan"]["sub_queries"].as_array().unwrap().len(),
            plan.sub_queries.len()
        );
    }

    #[test]
    fn test_script_output() {
        colored::control::set_override(false);
        let result = SandboxOutput {
            final_answer: Some("2 meetings".to_string()),
            printed: "checking\n".to_string(),
            ..Default::default()
        };
        let text = ConsoleFormatter::format_script(&result);
        assert!(text.contains("checking"));
        assert!(text.trim_end().ends_with("2 meetings"));

        let value: serde_json::Value =
            serde_json::from_str(&JsonFormatter::format_script(&result)).unwrap();
        assert_eq!(value["final"], "2 meetings");
        assert_eq!(value["sub_lm_calls"], 0);
    }
}
