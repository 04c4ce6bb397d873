use clap::{Parser, Subcommand};
use keiro::prelude::*;
use keiro::trace::replay;
use std::fs;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Inspect, validate and replay workflow documents from the command line
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to an editor settings JSON file
    #[arg(short, long, global = true)]
    settings: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a workflow document the way the backend does
    Validate {
        /// Path to the workflow JSON file
        workflow: String,
    },
    /// List the variables a node may reference
    Scope {
        /// Path to the workflow JSON file
        workflow: String,
        /// Id of the node to resolve
        node_id: String,
    },
    /// Load a document into the graph and serialize it back
    Roundtrip {
        /// Path to the workflow JSON file
        workflow: String,
    },
    /// Replay a captured run event stream and print its trace
    Trace {
        /// Path to a text/event-stream capture
        events: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("keiro=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = match &cli.settings {
        Some(path) => EditorSettings::from_file(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to load settings: {}", e))),
        None => EditorSettings::default(),
    };

    match cli.command {
        Command::Validate { workflow } => run_validate(&workflow),
        Command::Scope { workflow, node_id } => run_scope(&workflow, &node_id, settings),
        Command::Roundtrip { workflow } => run_roundtrip(&workflow, settings),
        Command::Trace { events } => run_trace(&events),
    }
}

fn load(path: &str) -> WorkflowConfig {
    WorkflowConfig::from_file(path)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to load workflow '{}': {}", path, e)))
}

fn run_validate(path: &str) {
    let total_start = Instant::now();
    let config = load(path);
    let load_duration = total_start.elapsed();

    let validate_start = Instant::now();
    let report = validate(&config);
    let validate_duration = validate_start.elapsed();

    if report.is_valid() {
        println!("Workflow is valid: {} nodes, {} edges", config.nodes.len(), config.edges.len());
    } else {
        println!("Workflow has {} problem(s):", report.issues.len());
        for issue in &report.issues {
            println!("  -> {}", issue);
        }
    }

    println!("\n--- Performance Summary ---");
    println!("File Loading:         {:?}", load_duration);
    println!("Validation:           {:?}", validate_duration);
    println!("-----------------------------");
    println!("Total Execution:      {:?}", total_start.elapsed());

    if !report.is_valid() {
        std::process::exit(1);
    }
}

fn run_scope(path: &str, node_id: &str, settings: EditorSettings) {
    let total_start = Instant::now();
    let graph = load(path)
        .into_graph(settings)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to build graph: {}", e)));
    let load_duration = total_start.elapsed();

    let resolve_start = Instant::now();
    let variables = resolve(&graph, node_id).unwrap_or_else(|e| exit_with_error(&e.to_string()));
    let resolve_duration = resolve_start.elapsed();

    println!("Variables in scope for '{}':", node_id);
    if variables.is_empty() {
        println!("  (none)");
    }
    for variable in &variables {
        println!(
            "  {:<40} {:<16} from {}",
            variable.value,
            variable.data_type.as_str(),
            variable.node.name
        );
    }

    println!("\n--- Performance Summary ---");
    println!("Graph Loading:        {:?}", load_duration);
    println!("Scope Resolution:     {:?}", resolve_duration);
    println!("-----------------------------");
    println!("Total Execution:      {:?}", total_start.elapsed());
}

fn run_roundtrip(path: &str, settings: EditorSettings) {
    let graph = load(path)
        .into_graph(settings)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to build graph: {}", e)));
    let json = graph
        .to_json_pretty()
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to serialize workflow: {}", e)));
    println!("{}", json);
}

fn run_trace(path: &str) {
    let total_start = Instant::now();
    let capture = fs::read_to_string(path)
        .unwrap_or_else(|e| {
            exit_with_error(&format!("Failed to read event capture '{}': {}", path, e))
        });

    let mut session = ChatSession::new();
    if let Err(e) = session.send("(replay)", Default::default()) {
        exit_with_error(&e.to_string());
    }
    let status = replay(&capture, &mut session);

    if let Some(trace) = session.current() {
        print!("{}", TraceFormatter::format_trace(trace));
    }
    println!("\n--- Performance Summary ---");
    println!("Replay:               {:?}", total_start.elapsed());
    println!("Final Status:         {:?}", status);
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
