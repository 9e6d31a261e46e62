//! CLI entrypoint for agora
//!
//! Offline inspection commands that wire the layers together without a
//! completion service: decomposition plans, budgeted context and sandbox
//! script runs.

mod commands;
mod output;

use agora_application::{Pipeline, PipelineConfig};
use agora_domain::{AgentDocument, BudgetRequest, DocumentStore, QueryDecomposer};
use agora_infrastructure::{ConfigLoader, JsonAgentSource};
use anyhow::{Context, Result, bail};
use clap::Parser;
use commands::{Cli, Command, OutputFormat};
use output::{ConsoleFormatter, JsonFormatter, Route};
use std::path::Path;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_deref());
        return Ok(());
    }

    let file_config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())?
    };
    let (config, issues) = file_config.to_pipeline_config();
    for issue in &issues {
        warn!("{}", issue);
    }

    let Some(command) = cli.command else {
        bail!("A command is required. Use --help to list them.");
    };

    let rendered = match command {
        Command::Plan { documents, query } => plan(&config, &documents, &query, cli.output)?,
        Command::Context {
            documents,
            budget,
            query,
        } => context(&documents, budget, query, cli.output)?,
        Command::Script { documents, script } => {
            run_script(&config, &documents, &script, cli.output)?
        }
    };
    println!("{}", rendered);

    Ok(())
}

/// Install the stderr subscriber and, when requested, a non-blocking file layer.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("could not open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

fn load_documents(path: &Path) -> Result<Vec<AgentDocument>> {
    let loaded = JsonAgentSource::new(path).load()?;
    if loaded.documents.is_empty() {
        bail!("{} contains no usable agent records", path.display());
    }
    info!(
        "Loaded {} document(s) from {}",
        loaded.documents.len(),
        path.display()
    );
    Ok(loaded.documents)
}

fn build_pipeline(config: &PipelineConfig) -> Pipeline {
    let pipeline = Pipeline::new(config.clone());
    #[cfg(feature = "lua")]
    let pipeline = pipeline.with_sandbox(std::sync::Arc::new(
        agora_infrastructure::LuaSandboxRuntime::new(),
    ));
    pipeline
}

fn plan(
    config: &PipelineConfig,
    documents: &Path,
    query: &str,
    format: OutputFormat,
) -> Result<String> {
    let mut pipeline = build_pipeline(config);
    pipeline.load_agents(load_documents(documents)?)?;

    let plan = QueryDecomposer::new(config.decomposer.clone()).decompose(query, pipeline.store())?;
    let route = Route {
        decompose: pipeline.should_use_rlm(query, true),
        sandbox: pipeline.should_use_repl(query, true),
    };

    Ok(match format {
        OutputFormat::Text => ConsoleFormatter::format_plan(&plan, pipeline.store(), route),
        OutputFormat::Json => JsonFormatter::format_plan(&plan, route),
    })
}

fn context(
    documents: &Path,
    budget: usize,
    query: Option<String>,
    format: OutputFormat,
) -> Result<String> {
    let mut store = DocumentStore::new();
    store.load(load_documents(documents)?)?;

    let mut request = BudgetRequest::new();
    if let Some(query) = query {
        request = request.with_query(query);
    }
    let assembled = store.get_context_with_budget(budget, &request);

    Ok(match format {
        OutputFormat::Text => ConsoleFormatter::format_context(&assembled),
        OutputFormat::Json => JsonFormatter::format_context(&assembled),
    })
}

#[cfg(feature = "lua")]
fn run_script(
    config: &PipelineConfig,
    documents: &Path,
    script: &Path,
    format: OutputFormat,
) -> Result<String> {
    use agora_application::{SandboxRuntime, SubLmBridge};
    use agora_domain::CodeValidator;
    use agora_infrastructure::LuaSandboxRuntime;

    let code = std::fs::read_to_string(script)
        .with_context(|| format!("could not read {}", script.display()))?;
    CodeValidator::new(config.sandbox.max_code_bytes)
        .validate(&code)
        .with_context(|| format!("{} was rejected", script.display()))?;

    let mut store = DocumentStore::new();
    store.load(load_documents(documents)?)?;
    let active: Vec<AgentDocument> = store.enabled_documents().cloned().collect();

    let limits = config.sandbox.limits_at(0, config.executor.max_depth);
    let result = LuaSandboxRuntime::new().run(&code, &active, &limits, SubLmBridge::disabled())?;

    Ok(match format {
        OutputFormat::Text => ConsoleFormatter::format_script(&result),
        OutputFormat::Json => JsonFormatter::format_script(&result),
    })
}

#[cfg(not(feature = "lua"))]
fn run_script(
    _config: &PipelineConfig,
    _documents: &Path,
    _script: &Path,
    _format: OutputFormat,
) -> Result<String> {
    bail!("this build has no sandbox runtime; rebuild with the `lua` feature")
}
