use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use monitor_equation::{EditorConfig, KnownVariables, VariableCase};
use monitor_trace_search::TraceTree;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod report;

use report::{
    equation_report, parse_timeline, replay_edit_session, trace_search_report, Navigation,
};

#[derive(Debug, Parser)]
#[command(name = "monitor")]
#[command(about = "Check metric equations and search trace trees, emitting JSON reports.")]
struct Cli {
    /// JSON editor config (`settle_delay_ms`, `error_display_delay_ms`, `case`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse, validate and format a single equation.
    Equation(EquationArgs),
    /// Replay a `<ms>\t<text>` keystroke timeline through the debounced editor.
    EditSession(EditSessionArgs),
    /// Search a trace tree JSON file and optionally navigate the matches.
    TraceSearch(TraceSearchArgs),
}

#[derive(Debug, Parser)]
struct EquationArgs {
    equation: String,

    /// Comma-separated list of known query names (e.g. `A,B`).
    #[arg(long, value_delimiter = ',')]
    known: Vec<String>,

    /// Match query names ignoring ASCII case (overrides the config file).
    #[arg(long)]
    case_insensitive: bool,
}

#[derive(Debug, Parser)]
struct EditSessionArgs {
    /// Timeline file. If omitted, reads from stdin.
    #[arg(long)]
    input: Option<PathBuf>,

    #[arg(long, value_delimiter = ',')]
    known: Vec<String>,

    #[arg(long)]
    case_insensitive: bool,
}

#[derive(Debug, Parser)]
struct TraceSearchArgs {
    /// JSON array of trace rows (`[{"kind": "span", ...}]`).
    #[arg(long)]
    tree: PathBuf,

    #[arg(long)]
    query: String,

    /// Number of "next match" steps to apply after the search.
    #[arg(long, default_value_t = 0, conflicts_with = "previous")]
    next: usize,

    /// Number of "previous match" steps to apply after the search.
    #[arg(long, default_value_t = 0)]
    previous: usize,

    /// Scan the tree this many rows at a time instead of in one pass.
    #[arg(long)]
    chunk: Option<usize>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // Also installs the `log` bridge so library `log::` records reach stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    let Some(path) = path else {
        return Ok(EditorConfig::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            Ok(buf)
        }
    }
}

/// Print `value` as pretty JSON. A closed stdout is not an error.
fn write_json<T: Serialize>(value: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value).context("serializing report")?;
    json.push('\n');
    let mut stdout = io::stdout().lock();
    match stdout.write_all(json.as_bytes()).and_then(|()| stdout.flush()) {
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other.context("writing report"),
    }
}

fn with_case(mut config: EditorConfig, case_insensitive: bool) -> EditorConfig {
    if case_insensitive {
        config.case = VariableCase::Insensitive;
    }
    config
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;
    log::debug!("using editor config {config:?}");

    match cli.command {
        Command::Equation(args) => {
            let config = with_case(config, args.case_insensitive);
            let known = KnownVariables::new(&args.known, config.validate_options());
            let report = equation_report(&args.equation, &known);
            write_json(&report)?;
            Ok(if report.ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Command::EditSession(args) => {
            let config = with_case(config, args.case_insensitive);
            let timeline = parse_timeline(&read_input(args.input.as_deref())?)?;
            let events = replay_edit_session(config, &args.known, &timeline);
            write_json(&events)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::TraceSearch(args) => {
            let raw = read_input(Some(args.tree.as_path()))?;
            let tree = TraceTree::from_json(&raw)
                .with_context(|| format!("loading trace tree {}", args.tree.display()))?;
            let navigation = if args.previous > 0 {
                Navigation::Previous(args.previous)
            } else {
                Navigation::Next(args.next)
            };
            let report = trace_search_report(&tree, &args.query, args.chunk, navigation);
            write_json(&report)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}
