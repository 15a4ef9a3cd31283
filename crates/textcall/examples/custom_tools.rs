//! Custom tools example: typed `FnTool` arguments, a stateful `impl Tool`,
//! and event handling around a scripted conversation.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=debug cargo run --example custom_tools
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use schemars::JsonSchema;
use serde::Deserialize;
use textcall::prelude::*;
use textcall::schemars;
use tracing_subscriber::EnvFilter;

// ── Typed arguments ─────────────────────────────────────────────────

/// Arguments for the `convert` tool.
#[derive(Deserialize, JsonSchema)]
struct ConvertArgs {
    /// Amount in the source unit.
    value: f64,
    /// `km` or `mi`.
    from: String,
}

fn convert_tool() -> FnTool {
    let def = ToolDef::new(
        "convert",
        "Convert a distance between kilometres and miles",
        json_schema_for::<ConvertArgs>(),
    );
    FnTool::new(def, |args: ConvertArgs| async move {
        match args.from.as_str() {
            "km" => Ok(format!("{:.2} mi", args.value * 0.621_371)),
            "mi" => Ok(format!("{:.2} km", args.value / 0.621_371)),
            other => Err(format!("unknown unit '{other}'")),
        }
    })
}

// ── Stateful tool ───────────────────────────────────────────────────

/// Looks up city distances and counts how often it was asked.
struct Distances {
    table: HashMap<String, f64>,
    lookups: AtomicUsize,
}

impl Tool for Distances {
    fn definition(&self) -> ToolDef {
        ToolDef::text("distance", "Road distance in km for a 'from-to' city pair")
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let key = arguments.trim().to_lowercase();
        Box::pin(async move {
            self.lookups.fetch_add(1, Ordering::Relaxed);
            self.table
                .get(&key)
                .map(|km| format!("{km} km"))
                .ok_or_else(|| format!("no distance known for '{key}'"))
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), AgentError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let distances = Distances {
        table: HashMap::from([("paris-lyon".to_string(), 465.0)]),
        lookups: AtomicUsize::new(0),
    };
    let tools = ToolSet::new()
        .with(distances)
        .with(convert_tool())
        .with(Calculator);

    // Two calls in one envelope, then a plain answer.
    let provider = ScriptedProvider::new([
        r#"{"tool_calls":[{"name":"distance","arguments":"paris-lyon","id":"d1"},{"name":"convert","arguments":{"value":465,"from":"km"},"id":"c1"}]}"#,
        "Paris to Lyon is 465 km, about 288.94 miles.",
    ]);

    let printer = FnEventHandler::new(|event| {
        if let AgentEvent::ToolResult { result, .. } = event {
            eprintln!("  {} -> {}", result.call.name, result.output);
        }
    });
    let handler = CompositeEventHandler::new()
        .with(LoggingHandler)
        .with(printer);

    let config = AgentConfig::default().with_max_turns(3).with_max_concurrent(2);
    let result = Agent::new(&provider, &tools, config)
        .with_event_handler(&handler)
        .run("How far is Paris from Lyon in miles?")
        .await?;

    println!("{}", result.text);
    Ok(())
}
