//! Replay a scripted conversation through the text tool-calling agent.
//!
//! The model is a JSON array of canned replies; the tools are the built-in
//! `calculator` and `think`. Logs go to stderr, the final answer to stdout.
//!
//! # Examples
//!
//! ```sh
//! # replies.json: ["TOOL:calculator:2+2", "The answer is 4."]
//! textcall --question "What is 2+2?" --replies replies.json
//!
//! # Lenient errors, capped concurrency, settings from a file
//! textcall --question "..." --replies replies.json \
//!   --config textcall.json --lenient --max-concurrent 2
//!
//! # One tool pass over a model answer on stdin
//! echo 'TOOL:calculator:3*(1+2)' | textcall --stage
//! ```

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use textcall::agent::{Agent, AgentConfig, LoggingHandler};
use textcall::api::ScriptedProvider;
use textcall::pipeline::{RunContext, Stage, ToolStage};
use textcall::tools::{Calculator, ThinkTool, ToolSet};
use tokio::io::AsyncWriteExt;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Replay a scripted conversation through the text tool-calling agent.
#[derive(Parser)]
#[command(name = "textcall")]
struct Cli {
    // ── Conversation ───────────────────────────────────────────
    /// The question for the agent
    #[arg(long, required_unless_present = "stage")]
    question: Option<String>,

    /// JSON file holding an array of model replies, served in order
    #[arg(long, required_unless_present = "stage")]
    replies: Option<PathBuf>,

    /// Run one tool pass over stdin instead of a full conversation
    #[arg(long, conflicts_with_all = ["question", "replies"])]
    stage: bool,

    // ── Settings ───────────────────────────────────────────────
    /// JSON config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum model turns
    #[arg(long)]
    max_turns: Option<u32>,

    /// Run deadline in seconds (0 = unbounded)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Report tool failures to the model instead of aborting
    #[arg(long)]
    lenient: bool,

    /// Maximum concurrent tool calls per turn (0 = unbounded)
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Include the model's own text above the tool results
    #[arg(long)]
    include_original: bool,

    /// Leading answer bytes inspected for tool syntax
    #[arg(long)]
    detection_buffer_bytes: Option<usize>,

    /// Debug-level logging
    #[arg(long, short)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Config file (if any) with command-line overrides applied.
fn build_config(cli: &Cli) -> Result<AgentConfig, String> {
    let mut config = match &cli.config {
        Some(path) => AgentConfig::from_json_file(path).map_err(|e| e.to_string())?,
        None => AgentConfig::default(),
    };
    if let Some(max_turns) = cli.max_turns {
        config = config.with_max_turns(max_turns);
    }
    if let Some(secs) = cli.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    if let Some(max) = cli.max_concurrent {
        config = config.with_max_concurrent(max);
    }
    if let Some(bytes) = cli.detection_buffer_bytes {
        config = config.with_detection_buffer_bytes(bytes);
    }
    if cli.lenient {
        config = config.with_lenient_errors(true);
    }
    if cli.include_original {
        config = config.with_include_original_text(true);
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn load_replies(path: &Path) -> Result<Vec<String>, String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read replies file {}: {e}", path.display()))?;
    serde_json::from_str(&raw)
        .map_err(|e| format!("replies file {} must be a JSON array of strings: {e}", path.display()))
}

async fn run(cli: &Cli) -> Result<(), String> {
    let config = build_config(cli)?;
    let tools = ToolSet::new().with(Calculator).with(ThinkTool);
    let mut stdout = tokio::io::stdout();

    if cli.stage {
        let ctx = RunContext::new(&tools).with_policy(config.policy.clone());
        let mut stdin = tokio::io::stdin();
        return ToolStage::new()
            .process(&ctx, &mut stdin, &mut stdout)
            .await
            .map_err(|e| e.to_string());
    }

    let (Some(question), Some(replies_path)) = (&cli.question, &cli.replies) else {
        return Err("--question and --replies are required without --stage".into());
    };
    let provider = ScriptedProvider::new(load_replies(replies_path)?);
    let handler = LoggingHandler;

    let summary = Agent::new(&provider, &tools, config)
        .with_event_handler(&handler)
        .run_into(question, &mut stdout)
        .await
        .map_err(|e| e.to_string())?;
    stdout.write_all(b"\n").await.map_err(|e| e.to_string())?;
    stdout.flush().await.map_err(|e| e.to_string())?;

    info!(
        "Done: {} turn(s), {} tool call(s), {} model call(s)",
        summary.turns_used,
        summary.tool_calls_executed,
        provider.call_count()
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
