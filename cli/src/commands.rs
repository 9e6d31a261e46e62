//! CLI command definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for inspection commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

/// CLI arguments for agora
#[derive(Parser, Debug)]
#[command(name = "agora")]
#[command(author, version, about = "Inspect how queries over many documents are decomposed")]
#[command(long_about = r#"
agora answers questions over a collection of documents by splitting each
question into sub-queries, running them concurrently and merging the answers.
These commands inspect that machinery offline, without a completion service.

Documents are read from a JSON array of agent records:
  [{"id": "m1", "displayName": "Kickoff", "summary": "...", "actionItems": ["..."]}]

Configuration files are loaded from (in priority order):
1. --config <path>     Explicit config file
2. ./agora.toml        Project-level config
3. ~/.config/agora/config.toml   Global config

Example:
  agora plan meetings.json "Compare the action items of Kickoff and Retro"
  agora context meetings.json --budget 1500 --query "budget"
  agora script meetings.json count.lua
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Classify a query and print the decomposition plan
    Plan {
        /// JSON file of agent records
        documents: PathBuf,
        /// The query to decompose
        query: String,
    },

    /// Assemble document context within a token budget
    Context {
        /// JSON file of agent records
        documents: PathBuf,
        /// Token budget for the assembled context
        #[arg(short, long)]
        budget: usize,
        /// Rank documents by relevance to this query instead of recency
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Validate and run a Lua script against the documents (sub_lm disabled)
    Script {
        /// JSON file of agent records
        documents: PathBuf,
        /// Lua source file
        script: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan() {
        let cli = Cli::parse_from(["agora", "plan", "docs.json", "Compare A and B"]);
        match cli.command {
            Some(Command::Plan { documents, query }) => {
                assert_eq!(documents, PathBuf::from("docs.json"));
                assert_eq!(query, "Compare A and B");
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.output, OutputFormat::Text);
    }

    #[test]
    fn test_parse_context_with_global_flags() {
        let cli = Cli::parse_from([
            "agora", "context", "docs.json", "--budget", "500", "-q", "budget", "-vv", "-o",
            "json",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(
            cli.command,
            Some(Command::Context { budget: 500, query: Some(_), .. })
        ));
    }

    #[test]
    fn test_show_config_needs_no_command() {
        let cli = Cli::parse_from(["agora", "--show-config"]);
        assert!(cli.show_config);
        assert!(cli.command.is_none());
    }
}
