//! Text-based tool calling for completion models.
//!
//! `textcall` lets a plain text-completion model call tools mid-conversation
//! without native function-calling support. The model writes a call in one of
//! three textual conventions, the [`Agent`](agent::harness::Agent) detects and
//! parses it, executes the tools concurrently, and feeds the formatted results
//! back as the next prompt until the model answers in plain text.
//!
//! # Getting started
//!
//! ```ignore
//! use textcall::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AgentError> {
//!     let tools = ToolSet::new().with(Calculator);
//!     let provider = ScriptedProvider::new(["TOOL:calculator:2+2", "The answer is 4."]);
//!
//!     let config = AgentConfig::default().with_max_turns(3);
//!     let result = Agent::new(&provider, &tools, config)
//!         .with_event_handler(&LoggingHandler)
//!         .run("What is 2+2?")
//!         .await?;
//!
//!     println!("{}", result.text);
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Define tools:** the [`Tool`](tools::core::Tool) trait,
//!   [`FnTool`](tools::core::FnTool) for closures, and
//!   [`ToolSet`](tools::core::ToolSet), the per-invocation registry.
//! - **Call syntaxes:** [`tools::parser`] recognizes the
//!   `{"tool_calls":[…]}` envelope, `TOOL:<name>:<args>` markers and
//!   `<tool name="…">…</tool>` blocks.
//! - **Streaming vs buffering:** [`api::streaming::detect`] inspects a bounded
//!   prefix of the model output and picks a [`Route`](api::streaming::Route).
//! - **Execution policy:** [`tools::executor`] runs calls under a concurrency
//!   cap with strict or lenient error handling; [`tools::format`] renders
//!   the results for the next turn.
//! - **The loop:** [`Agent`](agent::harness::Agent) and
//!   [`AgentConfig`](agent::config::AgentConfig).
//! - **Composition:** [`pipeline::Stage`] is the byte-stream handler contract
//!   implemented by both the agent and the single-pass
//!   [`ToolStage`](pipeline::ToolStage).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | Agent loop, config, events, prompt rendering |
//! | [`tools`] | Tool trait, registry, parser, executor, formatter, built-ins |
//! | [`api`] | Model provider contract, streaming detector, scripted provider |
//! | [`pipeline`] | Stage contract, run context, stage composition |
//! | [`error`] | Typed failures |

pub mod agent;
pub mod api;
pub mod error;
pub mod pipeline;
pub mod prelude;
pub mod tools;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use error::{AgentError, ConfigError, ToolFailure};

// Re-export schemars for downstream crates.
pub use schemars;

// ── Constants ──────────────────────────────────────────────────────

/// Default number of model turns before the run fails.
pub const DEFAULT_MAX_TURNS: u32 = 5;

/// Default number of leading response bytes inspected by the detector.
pub const DEFAULT_DETECTION_BUFFER_BYTES: usize = 200;

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`.
///
/// # Example
///
/// ```
/// use textcall::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct SearchArgs {
///     query: String,
///     #[serde(default)]
///     limit: Option<u32>,
/// }
///
/// let schema = json_schema_for::<SearchArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"query".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Tool definitions ───────────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

/// Tool definition shown to the model (OpenAI function-calling shape, so
/// providers with native tool support can forward it unchanged).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    /// Create a function tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    /// Definition for a tool whose arguments are free text rather than JSON.
    pub fn text(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(
            name,
            description,
            serde_json::json!({"type": "string"}),
        )
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    pub fn description(&self) -> &str {
        &self.function.description
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}
