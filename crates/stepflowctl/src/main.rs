mod input;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stepflow_engine::workflow::{parse_workflow_file, WorkflowDocument};
use stepflow_engine::{EngineConfig, RunOptions, StepStatus, WorkflowEngine};

#[derive(Parser)]
#[command(name = "stepflow")]
#[command(version, about = "Stepflow Command Line Tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Root directory for file-operation steps (overrides STEPFLOW_STORAGE_ROOT)
    #[arg(long, global = true)]
    storage_root: Option<PathBuf>,

    /// Text generation endpoint (overrides STEPFLOW_GENERATOR_URL)
    #[arg(long, global = true)]
    generator_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow
    ///
    /// The <WORKFLOW> can be:
    ///   - A built-in workflow name: content-review
    ///   - A workflow file: ./flows/greet.yaml, flows/greet.json
    ///
    /// Examples:
    ///     stepflow run ./flows/greet.yaml --set name=Ada
    ///     stepflow run content-review --payload '{"content": "draft", "publish": false}'
    ///     stepflow run ./flows/batch.yaml -i input.json --continue-on-error
    #[command(verbatim_doc_comment)]
    Run {
        /// Workflow name or file path
        #[arg(value_name = "WORKFLOW")]
        workflow: String,

        /// Set input values (format: key=value), can be repeated
        #[arg(long = "set", value_name = "KEY=VALUE")]
        variables: Vec<String>,

        /// Input as a JSON object
        #[arg(long, value_name = "JSON")]
        payload: Option<String>,

        /// Path to JSON file with input values
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Keep running after a failed step
        #[arg(long)]
        continue_on_error: bool,

        /// Print the execution record as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List available workflows
    List {
        /// Load additional workflow files before listing
        #[arg(short, long)]
        file: Vec<PathBuf>,

        /// Print as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show a workflow definition
    Show {
        /// Workflow name or file path
        #[arg(value_name = "WORKFLOW")]
        workflow: String,
    },

    /// Validate workflow files without running them
    Validate {
        /// Workflow files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,stepflow_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = EngineConfig::from_env().context("Failed to load configuration")?;
    if let Some(root) = cli.storage_root {
        config.storage_root = root;
    }
    if let Some(url) = cli.generator_url {
        config.generator_url = Some(url);
    }

    match cli.command {
        Commands::Run {
            workflow,
            variables,
            payload,
            input: input_file,
            continue_on_error,
            json,
        } => {
            let engine = WorkflowEngine::new(config)?;
            let name = resolve_reference(&engine, &workflow)?;
            let input = input::build_input(input_file.as_deref(), payload.as_deref(), &variables)?;
            let options = RunOptions { continue_on_error };

            let result = engine.run(&name, input, options).await;

            // The record exists for every run that got past name resolution.
            let record = engine.list_executions().pop();
            if json {
                if let Some(ref record) = record {
                    println!("{}", serde_json::to_string_pretty(record)?);
                }
            } else if let Some(ref record) = record {
                for outcome in &record.outcomes {
                    let marker = match outcome.status {
                        StepStatus::Completed => "ok",
                        StepStatus::Failed => "FAILED",
                    };
                    println!(
                        "  [{}] {} ({}, {} ms)",
                        marker, outcome.step.name, outcome.step.id, outcome.duration_ms
                    );
                    if let Some(ref error) = outcome.error {
                        println!("        {}", error);
                    }
                }
            }

            let summary = result?;
            if !json {
                println!(
                    "Execution {} completed in {} ms ({} steps)",
                    summary.execution_id, summary.duration_ms, summary.step_count
                );
                println!("{}", serde_json::to_string_pretty(&summary.results)?);
            }
        }
        Commands::List { file, json } => {
            let engine = WorkflowEngine::new(config)?;
            for path in &file {
                engine.register_document(load_workflow_file(path)?)?;
            }

            let workflows = engine.list_workflows();
            if json {
                println!("{}", serde_json::to_string_pretty(&workflows)?);
            } else {
                for wf in workflows {
                    println!(
                        "{:<24} {:<10} {:>3} steps  {}",
                        wf.name,
                        wf.source.to_string(),
                        wf.step_count,
                        wf.description.unwrap_or_default()
                    );
                }
            }
        }
        Commands::Show { workflow } => {
            let engine = WorkflowEngine::new(config)?;
            let name = resolve_reference(&engine, &workflow)?;
            let def = engine
                .get_workflow(&name)
                .with_context(|| format!("Workflow not found: {}", name))?;

            let doc = WorkflowDocument {
                name: def.name,
                description: def.description,
                steps: def.steps,
            };
            print!("{}", serde_yaml::to_string(&doc)?);
        }
        Commands::Validate { files } => {
            let mut failed = 0;
            for path in &files {
                match load_workflow_file(path) {
                    Ok(doc) => println!("{}: ok ({} steps)", path.display(), doc.steps.len()),
                    Err(e) => {
                        failed += 1;
                        println!("{}: {:#}", path.display(), e);
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{} of {} workflow files are invalid", failed, files.len());
            }
        }
    }

    Ok(())
}

/// Register a file reference and return its workflow name; names pass through.
fn resolve_reference(engine: &WorkflowEngine, reference: &str) -> Result<String> {
    if !input::is_file_reference(reference) {
        return Ok(reference.to_string());
    }

    let doc = load_workflow_file(Path::new(reference))?;
    let name = doc.name.clone();
    let id = engine.register_document(doc)?;
    tracing::debug!(workflow = %name, workflow_id = %id, path = %reference, "Registered workflow file");
    Ok(name)
}

fn load_workflow_file(path: &Path) -> Result<WorkflowDocument> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read workflow file: {}", path.display()))?;
    Ok(parse_workflow_file(path, &content)?)
}
