//! agentflow CLI - run, validate and convert flow files
//!
//! Flows run against the built-in mock provider (echo, or scripted with
//! `--reply`) and the built-in tools.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::{Map, Value};

use agentflow::ast::{Flow, RuntimeNode};
use agentflow::binding::{load_file_inputs, parse_input_value};
use agentflow::config::EngineConfig;
use agentflow::error::{FixSuggestion, FlowError, Result};
use agentflow::event::{read_trace, TraceWriter};
use agentflow::provider::{MockProvider, ProviderRegistry};
use agentflow::runtime::FlowExecutor;
use agentflow::tools::ToolRegistry;
use agentflow::{from_runtime, to_runtime};

#[derive(Parser)]
#[command(name = "agentflow")]
#[command(about = "agentflow - run agent flows defined as step trees")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a flow file (YAML or JSON)
    Run {
        file: PathBuf,

        /// Flow input as name=value (repeatable)
        #[arg(short, long = "input", value_name = "NAME=VALUE")]
        inputs: Vec<String>,

        /// Scripted mock reply, consumed in order (repeatable)
        #[arg(short, long = "reply")]
        replies: Vec<String>,

        /// Flow file callable as a sub-flow by its code (repeatable)
        #[arg(short, long = "subflow")]
        subflows: Vec<PathBuf>,

        /// Override default model
        #[arg(short, long)]
        model: Option<String>,

        /// Write events as NDJSON to this file
        #[arg(long)]
        trace: Option<PathBuf>,
    },

    /// Validate a flow file without running it
    Validate { file: PathBuf },

    /// Convert between step trees and runtime nodes
    Convert {
        file: PathBuf,

        #[arg(long, value_enum, default_value = "runtime")]
        to: Target,
    },

    /// Print the events of an NDJSON trace
    Trace { file: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum Target {
    /// Flow file → runtime node JSON
    Runtime,
    /// Runtime node JSON → step tree YAML
    Steps,
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            file,
            inputs,
            replies,
            subflows,
            model,
            trace,
        } => run_flow(&file, &inputs, replies, &subflows, model, trace).await,
        Commands::Validate { file } => validate_flow(&file),
        Commands::Convert { file, to } => convert(&file, to),
        Commands::Trace { file } => show_trace(&file),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

async fn run_flow(
    file: &Path,
    raw_inputs: &[String],
    replies: Vec<String>,
    subflows: &[PathBuf],
    model: Option<String>,
    trace: Option<PathBuf>,
) -> Result<()> {
    let flow = Flow::load(file)?;
    flow.validate()?;
    let input = parse_inputs(&flow, raw_inputs)?;

    let mut config = EngineConfig::load()?;
    config.default_provider = Some("mock".to_string());
    if model.is_some() {
        config.default_model = model;
    }

    let providers = ProviderRegistry::new();
    providers.register(Arc::new(MockProvider::with_responses(replies)));

    let mut executor = FlowExecutor::new(Arc::new(providers))
        .with_config(config)
        .with_tools(Arc::new(ToolRegistry::with_builtins()));
    for path in subflows {
        executor = executor.with_flow(Flow::load(path)?);
    }

    let mut root = to_runtime(flow.require_steps()?);
    let base_dir = file.parent().unwrap_or_else(|| Path::new("."));
    load_file_inputs(&mut root, base_dir).await?;

    let writer = trace.map(TraceWriter::create).transpose()?;
    let sink = writer.as_ref().map(TraceWriter::sink);

    println!(
        "{} Running flow: {} ({} nodes)",
        "→".cyan(),
        flow.code.cyan().bold(),
        root.count_nodes()
    );

    let result = executor.execute_runtime(&flow, root, input, sink).await?;
    if let Some(writer) = &writer {
        println!("  Trace: {}", writer.path().display());
    }

    if !result.success {
        return result.into_result().map(|_| ());
    }

    println!(
        "{} Flow '{}' completed ({} steps, {}ms)",
        "✓".green(),
        flow.code,
        result.steps,
        result.duration_ms
    );
    println!("{}", "Output:".cyan().bold());
    println!("{}", render(&result.output)?);
    Ok(())
}

/// `name=value` pairs typed by the flow's declarations
fn parse_inputs(flow: &Flow, raw: &[String]) -> Result<Value> {
    let mut map = Map::new();
    for pair in raw {
        let (name, value) = pair.split_once('=').ok_or_else(|| FlowError::ValidationError {
            reason: format!("input '{}' must look like name=value", pair),
        })?;
        let name = name.trim();
        let var_type = flow
            .inputs
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.var_type);
        map.insert(name.to_string(), parse_input_value(value, var_type));
    }
    Ok(Value::Object(map))
}

fn render(output: &Value) -> Result<String> {
    Ok(match output {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other)?,
    })
}

fn validate_flow(file: &Path) -> Result<()> {
    let flow = Flow::load(file)?;
    flow.validate()?;
    let root = to_runtime(flow.require_steps()?);

    println!("{} Flow '{}' is valid", "✓".green(), file.display());
    println!("  Code: {}", flow.code);
    println!("  Nodes: {}", root.count_nodes());
    println!("  Inputs: {}", flow.inputs.len());
    match &flow.agents {
        Some(agents) => println!("  Agents: {}", agents.len()),
        None => println!("  Agents: (default)"),
    }
    Ok(())
}

fn convert(file: &Path, to: Target) -> Result<()> {
    match to {
        Target::Runtime => {
            let flow = Flow::load(file)?;
            flow.validate()?;
            let root = to_runtime(flow.require_steps()?);
            println!("{}", serde_json::to_string_pretty(&root)?);
        }
        Target::Steps => {
            let source = std::fs::read_to_string(file)?;
            let root: RuntimeNode = serde_json::from_str(&source)?;
            root.validate()?;
            let step = from_runtime(&root)?;
            print!("{}", serde_yaml::to_string(&step)?);
        }
    }
    Ok(())
}

fn show_trace(file: &Path) -> Result<()> {
    let events = read_trace(file)?;
    println!("Trace: {}", file.display());
    println!("Events: {}\n", events.len());
    for event in events {
        let step = event.kind.step_id().unwrap_or("-");
        println!(
            "[{:>6}ms] #{:<4} {:<20} {}",
            event.timestamp_ms,
            event.id,
            event.kind.type_name(),
            step
        );
    }
    Ok(())
}
